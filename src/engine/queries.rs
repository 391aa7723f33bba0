use ulid::Ulid;

use crate::model::*;

use super::conflict::{confirmed_conflicts, validate_range, validate_window};
use super::{Engine, EngineError};

fn require(id: Ulid, what: &'static str) -> Result<(), EngineError> {
    if id.is_nil() {
        Err(EngineError::InvalidInput(what))
    } else {
        Ok(())
    }
}

impl Engine {
    /// Every booking on the room overlapping `[start, end)`, cancelled ones included.
    pub async fn get_bookings_by_room_and_time(
        &self,
        room_id: Ulid,
        start: Ms,
        end: Ms,
    ) -> Result<Vec<Booking>, EngineError> {
        require(room_id, "room id is required")?;
        let span = validate_window(start, end)?;
        let mut found: Vec<Booking> = self
            .bookings
            .get_by_room_and_time_range(room_id, span)
            .await?
            .into_iter()
            .filter(|b| span.overlaps(&b.span()))
            .collect();
        found.sort_by_key(|b| (b.start, b.id));
        Ok(found)
    }

    pub async fn check_availability(
        &self,
        room_id: Ulid,
        start: Ms,
        end: Ms,
    ) -> Result<Availability, EngineError> {
        require(room_id, "room id is required")?;
        self.resolve_room(room_id).await?;
        let span = validate_range(start, end)?;
        let candidates = self.bookings.get_by_room_and_time_range(room_id, span).await?;
        let conflicts = confirmed_conflicts(candidates, &span);
        Ok(Availability {
            room_id,
            available: conflicts.is_empty(),
            conflicts,
        })
    }

    pub async fn get_booking(&self, id: Ulid) -> Result<Booking, EngineError> {
        require(id, "booking id is required")?;
        self.fetch_booking(id).await
    }

    /// All bookings, newest start first. An empty system is `NotFound`.
    pub async fn list_bookings(&self) -> Result<Vec<Booking>, EngineError> {
        let all = self.bookings.get_all().await?;
        if all.is_empty() {
            return Err(EngineError::NoneFound("bookings"));
        }
        Ok(all)
    }

    pub async fn bookings_for_room(&self, room_id: Ulid) -> Result<Vec<Booking>, EngineError> {
        require(room_id, "room id is required")?;
        Ok(self.bookings.get_by_room(room_id).await?)
    }

    pub async fn bookings_for_user(&self, user_id: Ulid) -> Result<Vec<Booking>, EngineError> {
        require(user_id, "user id is required")?;
        Ok(self.bookings.get_by_user(user_id).await?)
    }

    /// Bookings whose start falls in `[start, end)`, across all rooms.
    pub async fn bookings_in_range(&self, start: Ms, end: Ms) -> Result<Vec<Booking>, EngineError> {
        let span = validate_window(start, end)?;
        Ok(self.bookings.get_by_date_range(span).await?)
    }

    /// Room bookings with owner and room attribution. A vanished owner leaves blank fields.
    pub async fn bookings_with_details_for_room(
        &self,
        room_id: Ulid,
    ) -> Result<Vec<BookingWithDetails>, EngineError> {
        require(room_id, "room id is required")?;
        let room = self.resolve_room(room_id).await?;
        let bookings = self.bookings.get_by_room(room_id).await?;
        let mut out = Vec::with_capacity(bookings.len());
        for booking in bookings {
            let (user_name, user_email) = match self.lookup_user(booking.user_id).await {
                Some(u) => (u.name, u.email),
                None => (String::new(), String::new()),
            };
            out.push(BookingWithDetails {
                booking,
                user_name,
                user_email,
                room_name: room.name.clone(),
                room_number: room.room_number,
            });
        }
        Ok(out)
    }
}
