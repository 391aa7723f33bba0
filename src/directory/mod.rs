//! Room and user directories: CRUD with input rules, over the store traits.
//!
//! The booking engine reads the same stores directly for existence checks;
//! everything that creates or removes rooms and users goes through here.

mod rooms;
mod users;

pub use rooms::RoomDirectory;
pub use users::UserDirectory;

use crate::engine::EngineError;

/// Trim `value` and reject it when blank or longer than `max` bytes.
pub(crate) fn required_field(
    value: &str,
    blank: &'static str,
    max: usize,
    too_long: &'static str,
) -> Result<String, EngineError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidInput(blank));
    }
    if trimmed.len() > max {
        return Err(EngineError::LimitExceeded(too_long));
    }
    Ok(trimmed.to_string())
}
