use crate::model::Ms;

const DAY: Ms = 86_400_000;

/// 2000-01-01T00:00:00Z
pub const MIN_VALID_TIMESTAMP_MS: Ms = 946_684_800_000;
/// 2100-01-01T00:00:00Z
pub const MAX_VALID_TIMESTAMP_MS: Ms = 4_102_444_800_000;

/// A single booking may not run longer than a week.
pub const MAX_BOOKING_DURATION_MS: Ms = 7 * DAY;
/// Availability and range queries are capped at one year.
pub const MAX_QUERY_WINDOW_MS: Ms = 366 * DAY;

pub const MAX_NAME_LEN: usize = 256;
pub const MAX_EMAIL_LEN: usize = 320;
pub const MAX_LOCATION_LEN: usize = 256;
pub const MAX_DESCRIPTION_LEN: usize = 4096;
pub const MAX_PURPOSE_LEN: usize = 1024;
pub const MAX_STATUS_LEN: usize = 64;
pub const MAX_AMENITIES: usize = 64;
