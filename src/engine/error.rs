use ulid::Ulid;

use crate::model::Ms;
use crate::store::StoreError;

/// Coarse error class callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    TimeRangeInvalid,
    NotFound,
    Conflict,
    RoomUnavailable,
    Storage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    InvalidInput(&'static str),
    LimitExceeded(&'static str),
    TimeRangeInvalid { start: Ms, end: Ms },
    RoomNotFound(Ulid),
    UserNotFound(Ulid),
    BookingNotFound(Ulid),
    /// A store lookup missed an id the caller didn't label.
    NotFound(Ulid),
    /// A list that must not be empty was.
    NoneFound(&'static str),
    Conflict(String),
    RoomUnavailable { room_id: Ulid, conflicts: Vec<Ulid> },
    Storage(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::InvalidInput(_) | EngineError::LimitExceeded(_) => ErrorKind::InvalidInput,
            EngineError::TimeRangeInvalid { .. } => ErrorKind::TimeRangeInvalid,
            EngineError::RoomNotFound(_)
            | EngineError::UserNotFound(_)
            | EngineError::BookingNotFound(_)
            | EngineError::NotFound(_)
            | EngineError::NoneFound(_) => ErrorKind::NotFound,
            EngineError::Conflict(_) => ErrorKind::Conflict,
            EngineError::RoomUnavailable { .. } => ErrorKind::RoomUnavailable,
            EngineError::Storage(_) => ErrorKind::Storage,
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::TimeRangeInvalid { start, end } => {
                write!(f, "invalid time range: start {start} must be before end {end}")
            }
            EngineError::RoomNotFound(id) => write!(f, "room not found: {id}"),
            EngineError::UserNotFound(id) => write!(f, "user not found: {id}"),
            EngineError::BookingNotFound(id) => write!(f, "booking not found: {id}"),
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::NoneFound(what) => write!(f, "no {what} found"),
            EngineError::Conflict(msg) => write!(f, "conflict: {msg}"),
            EngineError::RoomUnavailable { room_id, conflicts } => {
                write!(f, "room {room_id} unavailable: overlaps")?;
                for (i, id) in conflicts.iter().enumerate() {
                    let sep = if i == 0 { " " } else { ", " };
                    write!(f, "{sep}{id}")?;
                }
                Ok(())
            }
            EngineError::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => EngineError::NotFound(id),
            StoreError::Duplicate(key) => EngineError::Conflict(format!("{key} already exists")),
            StoreError::AlreadyCancelled(id) => {
                EngineError::Conflict(format!("booking {id} already cancelled"))
            }
            StoreError::Wal(e) => EngineError::Storage(e),
        }
    }
}
