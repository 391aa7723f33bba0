use ulid::Ulid;

use crate::model::*;

use super::{Engine, EngineError};

impl Engine {
    /// Confirmed bookings starting on the UTC day containing `date`, in start order.
    pub async fn get_room_schedule_by_date(
        &self,
        room_id: Ulid,
        date: Ms,
    ) -> Result<RoomSchedule, EngineError> {
        if room_id.is_nil() {
            return Err(EngineError::InvalidInput("room id is required"));
        }
        let room = self.resolve_room(room_id).await?;
        let day = Span::day_of(date);

        let mut bookings: Vec<Booking> = self
            .bookings
            .get_by_room_and_date(room_id, day)
            .await?
            .into_iter()
            .filter(|b| b.is_confirmed() && day.contains_instant(b.start))
            .collect();
        bookings.sort_by_key(|b| (b.start, b.id));

        let mut slots = Vec::with_capacity(bookings.len());
        for b in bookings {
            let user_name = self
                .lookup_user(b.user_id)
                .await
                .map(|u| u.name)
                .unwrap_or_default();
            slots.push(ScheduleSlot {
                start: format_rfc3339(b.start),
                end: format_rfc3339(b.end),
                is_booked: true,
                booking_id: b.id,
                user_name,
                purpose: b.purpose,
            });
        }

        Ok(RoomSchedule {
            room_id,
            room_name: room.name,
            room_number: room.room_number,
            date: format_date(day.start),
            slots,
        })
    }
}
