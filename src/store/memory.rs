use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ulid::Ulid;

use crate::model::*;

use super::{BookingStore, RoomStore, StoreError, StoreResult, UserStore};

/// Booking ids on one room, sorted by `span.start`.
#[derive(Debug, Default)]
struct RoomTimeline {
    entries: Vec<(Span, Ulid)>,
}

impl RoomTimeline {
    fn insert(&mut self, span: Span, id: Ulid) {
        let pos = self.entries.partition_point(|(s, _)| s.start <= span.start);
        self.entries.insert(pos, (span, id));
    }

    /// Ids whose span overlaps `query`.
    /// Everything at index >= right_bound starts at or after `query.end` and can't overlap.
    fn overlapping(&self, query: &Span) -> Vec<Ulid> {
        let right_bound = self.entries.partition_point(|(s, _)| s.start < query.end);
        self.entries[..right_bound]
            .iter()
            .filter(|(s, _)| s.end > query.start)
            .map(|(_, id)| *id)
            .collect()
    }

    /// Ids whose start falls within `window`.
    fn starting_within(&self, window: &Span) -> Vec<Ulid> {
        let lo = self.entries.partition_point(|(s, _)| s.start < window.start);
        let hi = self.entries.partition_point(|(s, _)| s.start < window.end);
        self.entries[lo..hi].iter().map(|(_, id)| *id).collect()
    }

    fn ids(&self) -> Vec<Ulid> {
        self.entries.iter().map(|(_, id)| *id).collect()
    }
}

/// Volatile adapter; also the index layer underneath [`super::WalStore`].
pub struct InMemoryStore {
    rooms: DashMap<Ulid, Room>,
    room_numbers: DashMap<i32, Ulid>,
    users: DashMap<Ulid, User>,
    /// Normalized email → user id.
    emails: DashMap<String, Ulid>,
    bookings: DashMap<Ulid, Booking>,
    timelines: DashMap<Ulid, RoomTimeline>,
    by_user: DashMap<Ulid, Vec<Ulid>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            room_numbers: DashMap::new(),
            users: DashMap::new(),
            emails: DashMap::new(),
            bookings: DashMap::new(),
            timelines: DashMap::new(),
            by_user: DashMap::new(),
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn booking_count(&self) -> usize {
        self.bookings.len()
    }

    /// Check that `event` would apply cleanly, without mutating anything.
    pub(crate) fn validate(&self, event: &Event) -> StoreResult<()> {
        match event {
            Event::RoomCreated(room) => {
                if self.rooms.contains_key(&room.id) {
                    return Err(StoreError::Duplicate(format!("room id {}", room.id)));
                }
                if self.room_numbers.contains_key(&room.room_number) {
                    return Err(StoreError::Duplicate(format!("room number {}", room.room_number)));
                }
            }
            Event::RoomStatusUpdated { id, .. } | Event::RoomDeleted { id } => {
                if !self.rooms.contains_key(id) {
                    return Err(StoreError::NotFound(*id));
                }
            }
            Event::UserCreated(user) => {
                if self.users.contains_key(&user.id) {
                    return Err(StoreError::Duplicate(format!("user id {}", user.id)));
                }
                if self.emails.contains_key(&normalize_email(&user.email)) {
                    return Err(StoreError::Duplicate(format!("email {}", user.email)));
                }
            }
            Event::UserDeleted { id } => {
                if !self.users.contains_key(id) {
                    return Err(StoreError::NotFound(*id));
                }
            }
            Event::BookingCreated(booking) => {
                if self.bookings.contains_key(&booking.id) {
                    return Err(StoreError::Duplicate(format!("booking id {}", booking.id)));
                }
            }
            Event::BookingCancelled { id, .. } => {
                let booking = self.bookings.get(id).ok_or(StoreError::NotFound(*id))?;
                if !booking.is_confirmed() {
                    return Err(StoreError::AlreadyCancelled(*id));
                }
            }
        }
        Ok(())
    }

    /// Apply an event to the indexes. Unique keys are claimed through the
    /// entry API so concurrent callers cannot both win.
    pub(crate) fn apply(&self, event: &Event) -> StoreResult<()> {
        self.validate(event)?;
        match event {
            Event::RoomCreated(room) => {
                match self.room_numbers.entry(room.room_number) {
                    Entry::Occupied(_) => {
                        return Err(StoreError::Duplicate(format!("room number {}", room.room_number)));
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(room.id);
                    }
                }
                self.rooms.insert(room.id, room.clone());
            }
            Event::RoomStatusUpdated { id, status, updated_at } => {
                let mut room = self.rooms.get_mut(id).ok_or(StoreError::NotFound(*id))?;
                room.status = status.clone();
                room.updated_at = *updated_at;
            }
            Event::RoomDeleted { id } => {
                let (_, room) = self.rooms.remove(id).ok_or(StoreError::NotFound(*id))?;
                self.room_numbers.remove_if(&room.room_number, |_, owner| owner == id);
            }
            Event::UserCreated(user) => {
                match self.emails.entry(normalize_email(&user.email)) {
                    Entry::Occupied(_) => {
                        return Err(StoreError::Duplicate(format!("email {}", user.email)));
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(user.id);
                    }
                }
                self.users.insert(user.id, user.clone());
            }
            Event::UserDeleted { id } => {
                let (_, user) = self.users.remove(id).ok_or(StoreError::NotFound(*id))?;
                self.emails
                    .remove_if(&normalize_email(&user.email), |_, owner| owner == id);
            }
            Event::BookingCreated(booking) => {
                self.timelines
                    .entry(booking.room_id)
                    .or_default()
                    .insert(booking.span(), booking.id);
                self.by_user.entry(booking.user_id).or_default().push(booking.id);
                self.bookings.insert(booking.id, booking.clone());
            }
            Event::BookingCancelled { id, updated_at, .. } => {
                let mut booking = self.bookings.get_mut(id).ok_or(StoreError::NotFound(*id))?;
                if !booking.is_confirmed() {
                    return Err(StoreError::AlreadyCancelled(*id));
                }
                booking.status = BookingStatus::Cancelled;
                booking.updated_at = *updated_at;
            }
        }
        Ok(())
    }

    /// Events that recreate the current state from scratch.
    pub(crate) fn snapshot(&self) -> Vec<Event> {
        let mut events: Vec<Event> = self
            .rooms
            .iter()
            .map(|e| Event::RoomCreated(e.value().clone()))
            .collect();
        events.extend(self.users.iter().map(|e| Event::UserCreated(e.value().clone())));
        let mut bookings: Vec<Booking> = self.bookings.iter().map(|e| e.value().clone()).collect();
        bookings.sort_by_key(|b| b.id);
        for booking in bookings {
            let cancelled = !booking.is_confirmed();
            let (id, room_id, updated_at) = (booking.id, booking.room_id, booking.updated_at);
            let mut created = booking;
            if cancelled {
                created.status = BookingStatus::Confirmed;
                created.updated_at = created.created_at;
            }
            events.push(Event::BookingCreated(created));
            if cancelled {
                events.push(Event::BookingCancelled { id, room_id, updated_at });
            }
        }
        events
    }

    fn collect_bookings(&self, ids: Vec<Ulid>) -> Vec<Booking> {
        ids.into_iter()
            .filter_map(|id| self.bookings.get(&id).map(|b| b.value().clone()))
            .collect()
    }

    fn room_ids(&self, room_id: Ulid, f: impl FnOnce(&RoomTimeline) -> Vec<Ulid>) -> Vec<Ulid> {
        self.timelines.get(&room_id).map(|t| f(t.value())).unwrap_or_default()
    }

    // ── Synchronous reads shared by both adapters ───────────────

    pub(crate) fn booking(&self, id: Ulid) -> StoreResult<Booking> {
        self.bookings
            .get(&id)
            .map(|b| b.value().clone())
            .ok_or(StoreError::NotFound(id))
    }

    pub(crate) fn all_bookings(&self) -> Vec<Booking> {
        let mut all: Vec<Booking> = self.bookings.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| b.start.cmp(&a.start).then(b.id.cmp(&a.id)));
        all
    }

    pub(crate) fn bookings_overlapping(&self, room_id: Ulid, span: Span) -> Vec<Booking> {
        self.collect_bookings(self.room_ids(room_id, |t| t.overlapping(&span)))
    }

    pub(crate) fn bookings_for_room(&self, room_id: Ulid) -> Vec<Booking> {
        self.collect_bookings(self.room_ids(room_id, RoomTimeline::ids))
    }

    pub(crate) fn bookings_for_room_starting_within(&self, room_id: Ulid, window: Span) -> Vec<Booking> {
        self.collect_bookings(self.room_ids(room_id, |t| t.starting_within(&window)))
    }

    pub(crate) fn bookings_for_user(&self, user_id: Ulid) -> Vec<Booking> {
        let ids = self
            .by_user
            .get(&user_id)
            .map(|ids| ids.value().clone())
            .unwrap_or_default();
        let mut bookings = self.collect_bookings(ids);
        bookings.sort_by_key(|b| (b.start, b.id));
        bookings
    }

    pub(crate) fn bookings_starting_within(&self, window: Span) -> Vec<Booking> {
        let mut hits: Vec<Booking> = self
            .bookings
            .iter()
            .filter(|b| window.contains_instant(b.start))
            .map(|b| b.value().clone())
            .collect();
        hits.sort_by_key(|b| (b.start, b.id));
        hits
    }

    pub(crate) fn room(&self, id: Ulid) -> StoreResult<Room> {
        self.rooms
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or(StoreError::NotFound(id))
    }

    pub(crate) fn rooms_matching(&self, filter: &RoomFilter) -> Vec<Room> {
        let mut rooms: Vec<Room> = self
            .rooms
            .iter()
            .filter(|r| filter.matches(r.value()))
            .map(|r| r.value().clone())
            .collect();
        rooms.sort_by_key(|r| r.room_number);
        rooms
    }

    pub(crate) fn user(&self, id: Ulid) -> StoreResult<User> {
        self.users
            .get(&id)
            .map(|u| u.value().clone())
            .ok_or(StoreError::NotFound(id))
    }

    pub(crate) fn user_by_email(&self, email: &str) -> Option<User> {
        let id = *self.emails.get(&normalize_email(email))?.value();
        self.users.get(&id).map(|u| u.value().clone())
    }

    pub(crate) fn all_users(&self) -> Vec<User> {
        let mut users: Vec<User> = self.users.iter().map(|u| u.value().clone()).collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        users
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn create(&self, booking: &Booking) -> StoreResult<()> {
        self.apply(&Event::BookingCreated(booking.clone()))
    }

    async fn get_by_id(&self, id: Ulid) -> StoreResult<Booking> {
        self.booking(id)
    }

    async fn get_all(&self) -> StoreResult<Vec<Booking>> {
        Ok(self.all_bookings())
    }

    async fn get_by_room_and_time_range(&self, room_id: Ulid, span: Span) -> StoreResult<Vec<Booking>> {
        Ok(self.bookings_overlapping(room_id, span))
    }

    async fn get_by_room(&self, room_id: Ulid) -> StoreResult<Vec<Booking>> {
        Ok(self.bookings_for_room(room_id))
    }

    async fn get_by_user(&self, user_id: Ulid) -> StoreResult<Vec<Booking>> {
        Ok(self.bookings_for_user(user_id))
    }

    async fn cancel(&self, id: Ulid, at: Ms) -> StoreResult<Booking> {
        let room_id = self.booking(id)?.room_id;
        self.apply(&Event::BookingCancelled { id, room_id, updated_at: at })?;
        self.booking(id)
    }

    async fn get_by_date_range(&self, span: Span) -> StoreResult<Vec<Booking>> {
        Ok(self.bookings_starting_within(span))
    }

    async fn get_by_room_and_date(&self, room_id: Ulid, day: Span) -> StoreResult<Vec<Booking>> {
        Ok(self.bookings_for_room_starting_within(room_id, day))
    }
}

#[async_trait]
impl RoomStore for InMemoryStore {
    async fn create(&self, room: &Room) -> StoreResult<()> {
        self.apply(&Event::RoomCreated(room.clone()))
    }

    async fn get_by_id(&self, id: Ulid) -> StoreResult<Room> {
        self.room(id)
    }

    async fn get_all(&self) -> StoreResult<Vec<Room>> {
        Ok(self.rooms_matching(&RoomFilter::default()))
    }

    async fn update_status(&self, id: Ulid, status: &str, at: Ms) -> StoreResult<Room> {
        self.apply(&Event::RoomStatusUpdated {
            id,
            status: status.to_string(),
            updated_at: at,
        })?;
        self.room(id)
    }

    async fn delete(&self, id: Ulid) -> StoreResult<()> {
        self.apply(&Event::RoomDeleted { id })
    }

    async fn search(&self, filter: &RoomFilter) -> StoreResult<Vec<Room>> {
        Ok(self.rooms_matching(filter))
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn create(&self, user: &User) -> StoreResult<()> {
        self.apply(&Event::UserCreated(user.clone()))
    }

    async fn get_by_id(&self, id: Ulid) -> StoreResult<User> {
        self.user(id)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.user_by_email(email))
    }

    async fn get_all(&self) -> StoreResult<Vec<User>> {
        Ok(self.all_users())
    }

    async fn delete(&self, id: Ulid) -> StoreResult<()> {
        self.apply(&Event::UserDeleted { id })
    }
}
