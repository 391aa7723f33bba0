use ulid::Ulid;

use crate::model::*;
use crate::observability::{BOOKINGS_ADMITTED_TOTAL, BOOKINGS_REJECTED_TOTAL, CANCELLATIONS_TOTAL};
use crate::store::StoreError;

use super::conflict::{confirmed_conflicts, validate_candidate};
use super::{Engine, EngineError};

impl Engine {
    /// Admit `candidate` if its room is free over `[start, end)`.
    ///
    /// Validation, then user and room resolution, all before the room lock.
    /// Under the lock: room re-check, probe, decide, write. Exactly one store
    /// write on success.
    pub async fn create_booking(&self, candidate: NewBooking) -> Result<Booking, EngineError> {
        let span = validate_candidate(&candidate).inspect_err(|e| reject("invalid", e))?;
        self.resolve_user(candidate.user_id)
            .await
            .inspect_err(|e| reject("not_found", e))?;
        self.resolve_room(candidate.room_id)
            .await
            .inspect_err(|e| reject("not_found", e))?;

        let _guard = self.lock_room(candidate.room_id).await;
        // The room may have been deleted while we waited for the lock.
        self.resolve_room(candidate.room_id)
            .await
            .inspect_err(|e| reject("not_found", e))?;
        let existing = self
            .bookings
            .get_by_room_and_time_range(candidate.room_id, span)
            .await?;
        let conflicts = confirmed_conflicts(existing, &span);
        if !conflicts.is_empty() {
            let err = EngineError::RoomUnavailable {
                room_id: candidate.room_id,
                conflicts: conflicts.iter().map(|b| b.id).collect(),
            };
            reject("unavailable", &err);
            return Err(err);
        }

        let now = now_ms();
        let booking = Booking {
            id: Ulid::new(),
            user_id: candidate.user_id,
            room_id: candidate.room_id,
            start: span.start,
            end: span.end,
            purpose: candidate.purpose,
            status: BookingStatus::Confirmed,
            created_at: now,
            updated_at: now,
        };
        self.bookings.create(&booking).await?;
        metrics::counter!(BOOKINGS_ADMITTED_TOTAL).increment(1);
        tracing::info!(
            "booking {} admitted on room {} [{}, {})",
            booking.id,
            booking.room_id,
            booking.start,
            booking.end
        );
        Ok(booking)
    }

    /// One-way transition to cancelled. A second cancel is a `Conflict`.
    pub async fn cancel_booking(&self, id: Ulid) -> Result<(), EngineError> {
        if id.is_nil() {
            return Err(EngineError::InvalidInput("booking id is required"));
        }
        let room_id = self.fetch_booking(id).await?.room_id;

        let _guard = self.lock_room(room_id).await;
        // Re-read under the lock; a concurrent cancel may have won.
        if !self.fetch_booking(id).await?.is_confirmed() {
            return Err(EngineError::Conflict(format!("booking {id} already cancelled")));
        }
        match self.bookings.cancel(id, now_ms()).await {
            Ok(_) => {}
            Err(StoreError::NotFound(_)) => return Err(EngineError::BookingNotFound(id)),
            Err(e) => return Err(e.into()),
        }
        metrics::counter!(CANCELLATIONS_TOTAL).increment(1);
        tracing::info!("booking {id} cancelled on room {room_id}");
        Ok(())
    }

    pub(super) async fn fetch_booking(&self, id: Ulid) -> Result<Booking, EngineError> {
        self.bookings.get_by_id(id).await.map_err(|e| match e {
            StoreError::NotFound(_) => EngineError::BookingNotFound(id),
            other => other.into(),
        })
    }
}

fn reject(reason: &'static str, err: &EngineError) {
    metrics::counter!(BOOKINGS_REJECTED_TOTAL, "reason" => reason).increment(1);
    tracing::debug!("booking rejected: {err}");
}
