use crate::limits::*;
use crate::model::*;

use super::EngineError;

/// Store-free checks on a booking request. Returns the requested span.
pub(crate) fn validate_candidate(candidate: &NewBooking) -> Result<Span, EngineError> {
    if candidate.user_id.is_nil() || candidate.room_id.is_nil() {
        return Err(EngineError::InvalidInput("user_id and room_id are required"));
    }
    let span = validate_range(candidate.start, candidate.end)?;
    if span.start < MIN_VALID_TIMESTAMP_MS || span.end > MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    if span.duration_ms() > MAX_BOOKING_DURATION_MS {
        return Err(EngineError::LimitExceeded("booking too long"));
    }
    if candidate.purpose.len() > MAX_PURPOSE_LEN {
        return Err(EngineError::LimitExceeded("purpose too long"));
    }
    Ok(span)
}

pub(crate) fn validate_range(start: Ms, end: Ms) -> Result<Span, EngineError> {
    Span::try_new(start, end).ok_or(EngineError::TimeRangeInvalid { start, end })
}

/// Range check for read windows; wider than a booking may be.
pub(crate) fn validate_window(start: Ms, end: Ms) -> Result<Span, EngineError> {
    let span = validate_range(start, end)?;
    if span.duration_ms() > MAX_QUERY_WINDOW_MS {
        return Err(EngineError::LimitExceeded("query window too wide"));
    }
    Ok(span)
}

/// Confirmed bookings among `candidates` that truly overlap `span`.
/// The store may hand back a superset; this is the authoritative filter.
pub(crate) fn confirmed_conflicts(candidates: Vec<Booking>, span: &Span) -> Vec<Booking> {
    let mut conflicts: Vec<Booking> = candidates
        .into_iter()
        .filter(|b| b.is_confirmed() && span.overlaps(&b.span()))
        .collect();
    conflicts.sort_by_key(|b| (b.start, b.id));
    conflicts
}
