use super::*;

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio_test::{assert_err, assert_ok};

use crate::store::{InMemoryStore, StoreResult, WalStore};

const H: Ms = 3_600_000; // 1 hour in ms
const M: Ms = 60_000; // 1 minute in ms
/// 2025-03-10T00:00:00Z
const DAY0: Ms = 1_741_564_800_000;

fn at(hours: Ms, minutes: Ms) -> Ms {
    DAY0 + hours * H + minutes * M
}

fn engine_over(store: Arc<InMemoryStore>) -> Engine {
    Engine::new(store.clone(), store.clone(), store)
}

async fn seed_room(store: &dyn RoomStore, number: i32, capacity: i32) -> Room {
    let room = Room {
        id: Ulid::new(),
        name: format!("R{number}"),
        room_number: number,
        capacity,
        floor: 1,
        amenities: Default::default(),
        status: DEFAULT_ROOM_STATUS.into(),
        location: "HQ".into(),
        description: None,
        created_at: 0,
        updated_at: 0,
    };
    store.create(&room).await.unwrap();
    room
}

async fn seed_user(store: &dyn UserStore, name: &str) -> User {
    let user = User {
        id: Ulid::new(),
        name: name.into(),
        email: format!("{}@example.com", name.to_lowercase()),
        password: "pw".into(),
        role: Role::User,
        created_at: 0,
        updated_at: 0,
    };
    store.create(&user).await.unwrap();
    user
}

fn request(user: &User, room: &Room, start: Ms, end: Ms, purpose: &str) -> NewBooking {
    NewBooking {
        user_id: user.id,
        room_id: room.id,
        start,
        end,
        purpose: purpose.into(),
    }
}

struct Fixture {
    store: Arc<InMemoryStore>,
    engine: Engine,
    room: Room,
    user: User,
}

async fn fixture() -> Fixture {
    let store = Arc::new(InMemoryStore::new());
    let room = seed_room(store.as_ref(), 1, 4).await;
    let user = seed_user(store.as_ref(), "Una").await;
    Fixture {
        engine: engine_over(store.clone()),
        store,
        room,
        user,
    }
}

// ── Store wrappers ───────────────────────────────────────

/// Counts every call that reaches any store.
struct CountingStore {
    inner: InMemoryStore,
    calls: AtomicUsize,
}

impl CountingStore {
    fn new() -> Self {
        Self {
            inner: InMemoryStore::new(),
            calls: AtomicUsize::new(0),
        }
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BookingStore for CountingStore {
    async fn create(&self, booking: &Booking) -> StoreResult<()> {
        self.hit();
        BookingStore::create(&self.inner, booking).await
    }
    async fn get_by_id(&self, id: Ulid) -> StoreResult<Booking> {
        self.hit();
        BookingStore::get_by_id(&self.inner, id).await
    }
    async fn get_all(&self) -> StoreResult<Vec<Booking>> {
        self.hit();
        BookingStore::get_all(&self.inner).await
    }
    async fn get_by_room_and_time_range(&self, room_id: Ulid, span: Span) -> StoreResult<Vec<Booking>> {
        self.hit();
        self.inner.get_by_room_and_time_range(room_id, span).await
    }
    async fn get_by_room(&self, room_id: Ulid) -> StoreResult<Vec<Booking>> {
        self.hit();
        self.inner.get_by_room(room_id).await
    }
    async fn get_by_user(&self, user_id: Ulid) -> StoreResult<Vec<Booking>> {
        self.hit();
        self.inner.get_by_user(user_id).await
    }
    async fn cancel(&self, id: Ulid, at: Ms) -> StoreResult<Booking> {
        self.hit();
        self.inner.cancel(id, at).await
    }
    async fn get_by_date_range(&self, span: Span) -> StoreResult<Vec<Booking>> {
        self.hit();
        self.inner.get_by_date_range(span).await
    }
    async fn get_by_room_and_date(&self, room_id: Ulid, day: Span) -> StoreResult<Vec<Booking>> {
        self.hit();
        self.inner.get_by_room_and_date(room_id, day).await
    }
}

#[async_trait]
impl RoomStore for CountingStore {
    async fn create(&self, room: &Room) -> StoreResult<()> {
        self.hit();
        RoomStore::create(&self.inner, room).await
    }
    async fn get_by_id(&self, id: Ulid) -> StoreResult<Room> {
        self.hit();
        RoomStore::get_by_id(&self.inner, id).await
    }
    async fn get_all(&self) -> StoreResult<Vec<Room>> {
        self.hit();
        RoomStore::get_all(&self.inner).await
    }
    async fn update_status(&self, id: Ulid, status: &str, at: Ms) -> StoreResult<Room> {
        self.hit();
        self.inner.update_status(id, status, at).await
    }
    async fn delete(&self, id: Ulid) -> StoreResult<()> {
        self.hit();
        RoomStore::delete(&self.inner, id).await
    }
    async fn search(&self, filter: &RoomFilter) -> StoreResult<Vec<Room>> {
        self.hit();
        self.inner.search(filter).await
    }
}

#[async_trait]
impl UserStore for CountingStore {
    async fn create(&self, user: &User) -> StoreResult<()> {
        self.hit();
        UserStore::create(&self.inner, user).await
    }
    async fn get_by_id(&self, id: Ulid) -> StoreResult<User> {
        self.hit();
        UserStore::get_by_id(&self.inner, id).await
    }
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.hit();
        self.inner.find_by_email(email).await
    }
    async fn get_all(&self) -> StoreResult<Vec<User>> {
        self.hit();
        UserStore::get_all(&self.inner).await
    }
    async fn delete(&self, id: Ulid) -> StoreResult<()> {
        self.hit();
        UserStore::delete(&self.inner, id).await
    }
}

/// Booking store whose conflict probe yields for a while, widening any race window.
struct SlowBookings {
    inner: Arc<InMemoryStore>,
    delay: Duration,
}

#[async_trait]
impl BookingStore for SlowBookings {
    async fn create(&self, booking: &Booking) -> StoreResult<()> {
        tokio::time::sleep(self.delay).await;
        BookingStore::create(self.inner.as_ref(), booking).await
    }
    async fn get_by_id(&self, id: Ulid) -> StoreResult<Booking> {
        BookingStore::get_by_id(self.inner.as_ref(), id).await
    }
    async fn get_all(&self) -> StoreResult<Vec<Booking>> {
        BookingStore::get_all(self.inner.as_ref()).await
    }
    async fn get_by_room_and_time_range(&self, room_id: Ulid, span: Span) -> StoreResult<Vec<Booking>> {
        let found = self.inner.get_by_room_and_time_range(room_id, span).await;
        tokio::time::sleep(self.delay).await;
        found
    }
    async fn get_by_room(&self, room_id: Ulid) -> StoreResult<Vec<Booking>> {
        self.inner.get_by_room(room_id).await
    }
    async fn get_by_user(&self, user_id: Ulid) -> StoreResult<Vec<Booking>> {
        self.inner.get_by_user(user_id).await
    }
    async fn cancel(&self, id: Ulid, at: Ms) -> StoreResult<Booking> {
        tokio::time::sleep(self.delay).await;
        self.inner.cancel(id, at).await
    }
    async fn get_by_date_range(&self, span: Span) -> StoreResult<Vec<Booking>> {
        self.inner.get_by_date_range(span).await
    }
    async fn get_by_room_and_date(&self, room_id: Ulid, day: Span) -> StoreResult<Vec<Booking>> {
        self.inner.get_by_room_and_date(room_id, day).await
    }
}

fn slow_engine(store: Arc<InMemoryStore>) -> Arc<Engine> {
    let bookings = Arc::new(SlowBookings {
        inner: store.clone(),
        delay: Duration::from_millis(5),
    });
    Arc::new(Engine::new(bookings, store.clone(), store))
}

fn assert_no_overlaps(bookings: &[Booking]) {
    let confirmed: Vec<&Booking> = bookings.iter().filter(|b| b.is_confirmed()).collect();
    for (i, a) in confirmed.iter().enumerate() {
        for b in &confirmed[i + 1..] {
            assert!(
                a.room_id != b.room_id || !a.span().overlaps(&b.span()),
                "double booking: {a:?} and {b:?}"
            );
        }
    }
}

// ── Admission ────────────────────────────────────────────

#[tokio::test]
async fn standup_scenario() {
    let f = fixture().await;

    let standup = assert_ok!(
        f.engine
            .create_booking(request(&f.user, &f.room, at(9, 0), at(10, 0), "standup"))
            .await
    );
    assert_eq!(standup.status, BookingStatus::Confirmed);
    assert_eq!(standup.created_at, standup.updated_at);

    let err = assert_err!(
        f.engine
            .create_booking(request(&f.user, &f.room, at(9, 30), at(9, 45), "overlap"))
            .await
    );
    assert_eq!(err.kind(), ErrorKind::RoomUnavailable);
    assert_eq!(
        err,
        EngineError::RoomUnavailable { room_id: f.room.id, conflicts: vec![standup.id] }
    );

    let review = assert_ok!(
        f.engine
            .create_booking(request(&f.user, &f.room, at(10, 0), at(10, 30), "review"))
            .await
    );

    let avail = f.engine.check_availability(f.room.id, at(9, 0), at(10, 0)).await.unwrap();
    assert!(!avail.available);
    assert_eq!(avail.conflicts, vec![standup.clone()]);

    let schedule = f.engine.get_room_schedule_by_date(f.room.id, at(12, 0)).await.unwrap();
    assert_eq!(schedule.date, "2025-03-10");
    assert_eq!(schedule.room_name, "R1");
    assert_eq!(schedule.room_number, 1);
    let ids: Vec<Ulid> = schedule.slots.iter().map(|s| s.booking_id).collect();
    assert_eq!(ids, vec![standup.id, review.id]);
    assert!(schedule.slots.iter().all(|s| s.is_booked && s.user_name == "Una"));
    assert_eq!(schedule.slots[0].start, "2025-03-10T09:00:00Z");
    assert_eq!(schedule.slots[0].end, "2025-03-10T10:00:00Z");
    assert_eq!(schedule.slots[1].purpose, "review");
}

#[tokio::test]
async fn back_to_back_bookings_admitted() {
    let f = fixture().await;
    for hour in 8..12 {
        assert_ok!(
            f.engine
                .create_booking(request(&f.user, &f.room, at(hour, 0), at(hour + 1, 0), "slot"))
                .await
        );
    }
    assert_eq!(f.engine.bookings_for_room(f.room.id).await.unwrap().len(), 4);
}

#[tokio::test]
async fn containing_and_contained_requests_rejected() {
    let f = fixture().await;
    f.engine
        .create_booking(request(&f.user, &f.room, at(10, 0), at(11, 0), "base"))
        .await
        .unwrap();
    for (s, e) in [(at(9, 0), at(12, 0)), (at(10, 15), at(10, 45)), (at(10, 0), at(11, 0))] {
        let err = assert_err!(f.engine.create_booking(request(&f.user, &f.room, s, e, "x")).await);
        assert_eq!(err.kind(), ErrorKind::RoomUnavailable);
    }
}

#[tokio::test]
async fn other_rooms_do_not_conflict() {
    let f = fixture().await;
    let other = seed_room(f.store.as_ref(), 2, 8).await;
    f.engine
        .create_booking(request(&f.user, &f.room, at(9, 0), at(10, 0), "a"))
        .await
        .unwrap();
    assert_ok!(
        f.engine
            .create_booking(request(&f.user, &other, at(9, 0), at(10, 0), "b"))
            .await
    );
}

#[tokio::test]
async fn cancelled_booking_frees_the_slot() {
    let f = fixture().await;
    let first = f
        .engine
        .create_booking(request(&f.user, &f.room, at(9, 0), at(10, 0), "first"))
        .await
        .unwrap();
    f.engine.cancel_booking(first.id).await.unwrap();
    assert_ok!(
        f.engine
            .create_booking(request(&f.user, &f.room, at(9, 0), at(10, 0), "second"))
            .await
    );
    let avail = f.engine.check_availability(f.room.id, at(9, 0), at(10, 0)).await.unwrap();
    assert_eq!(avail.conflicts.len(), 1);
    assert_ne!(avail.conflicts[0].id, first.id);
}

#[tokio::test]
async fn unknown_user_or_room_is_not_found() {
    let f = fixture().await;
    let ghost_room = Room { id: Ulid::new(), ..f.room.clone() };
    let ghost_user = User { id: Ulid::new(), ..f.user.clone() };

    let err = assert_err!(
        f.engine
            .create_booking(request(&ghost_user, &f.room, at(9, 0), at(10, 0), "x"))
            .await
    );
    assert_eq!(err, EngineError::UserNotFound(ghost_user.id));

    let err = assert_err!(
        f.engine
            .create_booking(request(&f.user, &ghost_room, at(9, 0), at(10, 0), "x"))
            .await
    );
    assert_eq!(err, EngineError::RoomNotFound(ghost_room.id));
    assert_eq!(f.store.booking_count(), 0);
}

#[tokio::test]
async fn invalid_requests_touch_no_store() {
    let store = Arc::new(CountingStore::new());
    let engine = Engine::new(store.clone(), store.clone(), store.clone());
    let user = User {
        id: Ulid::new(),
        name: "n".into(),
        email: "n@example.com".into(),
        password: "p".into(),
        role: Role::User,
        created_at: 0,
        updated_at: 0,
    };
    let room = Room {
        id: Ulid::new(),
        name: "r".into(),
        room_number: 1,
        capacity: 1,
        floor: 0,
        amenities: Default::default(),
        status: DEFAULT_ROOM_STATUS.into(),
        location: "l".into(),
        description: None,
        created_at: 0,
        updated_at: 0,
    };

    let err = assert_err!(engine.create_booking(request(&user, &room, at(10, 0), at(9, 0), "x")).await);
    assert_eq!(err.kind(), ErrorKind::TimeRangeInvalid);
    let err = assert_err!(engine.create_booking(request(&user, &room, at(10, 0), at(10, 0), "x")).await);
    assert_eq!(err.kind(), ErrorKind::TimeRangeInvalid);

    let mut nil_user = request(&user, &room, at(9, 0), at(10, 0), "x");
    nil_user.user_id = Ulid::nil();
    let err = assert_err!(engine.create_booking(nil_user).await);
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let err = assert_err!(engine.cancel_booking(Ulid::nil()).await);
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn no_double_booking_after_many_requests() {
    let f = fixture().await;
    // Deterministic pseudo-random requests over one day.
    let mut seed: u64 = 0x9E37_79B9_7F4A_7C15;
    let mut admitted = 0;
    for _ in 0..300 {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let start = DAY0 + ((seed >> 33) % 96) as Ms * 15 * M;
        let len = (1 + (seed >> 20) % 8) as Ms * 15 * M;
        match f.engine.create_booking(request(&f.user, &f.room, start, start + len, "r")).await {
            Ok(_) => admitted += 1,
            Err(e) => assert_eq!(e.kind(), ErrorKind::RoomUnavailable),
        }
    }
    assert!(admitted > 0);
    let all = f.engine.list_bookings().await.unwrap();
    assert_eq!(all.len(), admitted);
    assert_no_overlaps(&all);
}

// ── Concurrency ──────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_overlapping_requests_admit_exactly_one() {
    let store = Arc::new(InMemoryStore::new());
    let room = seed_room(store.as_ref(), 1, 4).await;
    let user = seed_user(store.as_ref(), "Race").await;
    let engine = slow_engine(store.clone());

    let mut handles = Vec::new();
    for i in 0..16 {
        let engine = engine.clone();
        // Every request covers 10:00-10:05, with differing outer bounds.
        let req = request(&user, &room, at(10, 0) - i * M, at(10, 5) + i * M, "race");
        handles.push(tokio::spawn(async move { engine.create_booking(req).await }));
    }

    let mut ok = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(_) => ok += 1,
            Err(e) => assert_eq!(e.kind(), ErrorKind::RoomUnavailable),
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(store.booking_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_rooms_proceed_independently() {
    let store = Arc::new(InMemoryStore::new());
    let user = seed_user(store.as_ref(), "Multi").await;
    let mut rooms = Vec::new();
    for n in 1..=8 {
        rooms.push(seed_room(store.as_ref(), n, 2).await);
    }
    let engine = slow_engine(store.clone());

    let mut handles = Vec::new();
    for room in &rooms {
        let engine = engine.clone();
        let req = request(&user, room, at(14, 0), at(15, 0), "parallel");
        handles.push(tokio::spawn(async move { engine.create_booking(req).await }));
    }
    for h in handles {
        assert_ok!(h.await.unwrap());
    }
    assert_eq!(store.booking_count(), rooms.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_cancels_succeed_once() {
    let store = Arc::new(InMemoryStore::new());
    let room = seed_room(store.as_ref(), 1, 4).await;
    let user = seed_user(store.as_ref(), "Twice").await;
    let engine = slow_engine(store.clone());
    let booking = engine
        .create_booking(request(&user, &room, at(9, 0), at(10, 0), "x"))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move { engine.cancel_booking(booking.id).await }));
    }
    let mut ok = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(()) => ok += 1,
            Err(e) => assert_eq!(e.kind(), ErrorKind::Conflict),
        }
    }
    assert_eq!(ok, 1);
}

// ── Cancellation ─────────────────────────────────────────

#[tokio::test]
async fn cancel_is_one_way() {
    let f = fixture().await;
    let b = f
        .engine
        .create_booking(request(&f.user, &f.room, at(9, 0), at(10, 0), "x"))
        .await
        .unwrap();

    assert_ok!(f.engine.cancel_booking(b.id).await);
    let stored = f.engine.get_booking(b.id).await.unwrap();
    assert_eq!(stored.status, BookingStatus::Cancelled);
    assert!(stored.updated_at >= stored.created_at);

    let err = assert_err!(f.engine.cancel_booking(b.id).await);
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let missing = Ulid::new();
    assert_eq!(
        f.engine.cancel_booking(missing).await,
        Err(EngineError::BookingNotFound(missing))
    );
}

// ── Reads ────────────────────────────────────────────────

#[tokio::test]
async fn room_and_time_query_includes_cancelled() {
    let f = fixture().await;
    let keep = f
        .engine
        .create_booking(request(&f.user, &f.room, at(9, 0), at(10, 0), "keep"))
        .await
        .unwrap();
    let gone = f
        .engine
        .create_booking(request(&f.user, &f.room, at(10, 0), at(11, 0), "gone"))
        .await
        .unwrap();
    f.engine.cancel_booking(gone.id).await.unwrap();
    f.engine
        .create_booking(request(&f.user, &f.room, at(13, 0), at(14, 0), "later"))
        .await
        .unwrap();

    let found = f
        .engine
        .get_bookings_by_room_and_time(f.room.id, at(9, 30), at(10, 30))
        .await
        .unwrap();
    let ids: Vec<Ulid> = found.iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![keep.id, gone.id]);

    let none = f
        .engine
        .get_bookings_by_room_and_time(f.room.id, at(11, 0), at(13, 0))
        .await
        .unwrap();
    assert!(none.is_empty());

    let err = assert_err!(
        f.engine
            .get_bookings_by_room_and_time(f.room.id, at(11, 0), at(11, 0))
            .await
    );
    assert_eq!(err.kind(), ErrorKind::TimeRangeInvalid);
}

#[tokio::test]
async fn availability_checks_room_then_range() {
    let f = fixture().await;
    let ghost = Ulid::new();
    assert_eq!(
        f.engine.check_availability(ghost, at(9, 0), at(8, 0)).await,
        Err(EngineError::RoomNotFound(ghost))
    );
    let err = assert_err!(f.engine.check_availability(f.room.id, at(9, 0), at(8, 0)).await);
    assert_eq!(err.kind(), ErrorKind::TimeRangeInvalid);

    let free = f.engine.check_availability(f.room.id, at(9, 0), at(10, 0)).await.unwrap();
    assert!(free.available);
    assert!(free.conflicts.is_empty());
    assert_eq!(f.store.booking_count(), 0);
}

#[tokio::test]
async fn list_bookings_empty_is_not_found() {
    let f = fixture().await;
    assert_eq!(f.engine.list_bookings().await, Err(EngineError::NoneFound("bookings")));

    let early = f
        .engine
        .create_booking(request(&f.user, &f.room, at(8, 0), at(9, 0), "early"))
        .await
        .unwrap();
    let late = f
        .engine
        .create_booking(request(&f.user, &f.room, at(15, 0), at(16, 0), "late"))
        .await
        .unwrap();
    let all = f.engine.list_bookings().await.unwrap();
    assert_eq!(all.iter().map(|b| b.id).collect::<Vec<_>>(), vec![late.id, early.id]);
}

#[tokio::test]
async fn per_user_and_range_reads() {
    let f = fixture().await;
    let other_user = seed_user(f.store.as_ref(), "Otto").await;
    let mine = f
        .engine
        .create_booking(request(&f.user, &f.room, at(9, 0), at(10, 0), "mine"))
        .await
        .unwrap();
    let theirs = f
        .engine
        .create_booking(request(&other_user, &f.room, at(23, 0), at(25, 0), "theirs"))
        .await
        .unwrap();

    let for_user = f.engine.bookings_for_user(f.user.id).await.unwrap();
    assert_eq!(for_user, vec![mine.clone()]);
    assert!(f.engine.bookings_for_user(Ulid::new()).await.unwrap().is_empty());

    // Start-based: the late booking spills into the next day but starts on day 0.
    let day = f.engine.bookings_in_range(DAY0, DAY0 + DAY_MS).await.unwrap();
    assert_eq!(day.len(), 2);
    let next_day = f.engine.bookings_in_range(DAY0 + DAY_MS, DAY0 + 2 * DAY_MS).await.unwrap();
    assert!(next_day.is_empty());
    let evening = f.engine.bookings_in_range(at(20, 0), at(24, 0)).await.unwrap();
    assert_eq!(evening, vec![theirs]);
}

#[tokio::test]
async fn details_fall_back_when_owner_is_gone() {
    let f = fixture().await;
    let leaver = seed_user(f.store.as_ref(), "Leaver").await;
    f.engine
        .create_booking(request(&f.user, &f.room, at(9, 0), at(10, 0), "stay"))
        .await
        .unwrap();
    f.engine
        .create_booking(request(&leaver, &f.room, at(11, 0), at(12, 0), "left"))
        .await
        .unwrap();
    UserStore::delete(f.store.as_ref(), leaver.id).await.unwrap();

    let details = f.engine.bookings_with_details_for_room(f.room.id).await.unwrap();
    assert_eq!(details.len(), 2);
    assert_eq!(details[0].user_name, "Una");
    assert_eq!(details[0].user_email, "una@example.com");
    assert_eq!(details[1].user_name, "");
    assert_eq!(details[1].user_email, "");
    assert!(details.iter().all(|d| d.room_name == "R1" && d.room_number == 1));

    let ghost = Ulid::new();
    assert_eq!(
        f.engine.bookings_with_details_for_room(ghost).await,
        Err(EngineError::RoomNotFound(ghost))
    );
}

// ── Schedule ─────────────────────────────────────────────

#[tokio::test]
async fn schedule_keeps_confirmed_bookings_starting_that_day() {
    let f = fixture().await;
    // Starts the previous evening, runs past midnight: belongs to the previous day.
    let overnight = f
        .engine
        .create_booking(request(&f.user, &f.room, DAY0 - H, DAY0 + H, "overnight"))
        .await
        .unwrap();
    let cancelled = f
        .engine
        .create_booking(request(&f.user, &f.room, at(12, 0), at(13, 0), "dropped"))
        .await
        .unwrap();
    f.engine.cancel_booking(cancelled.id).await.unwrap();
    let late = f
        .engine
        .create_booking(request(&f.user, &f.room, at(16, 0), at(17, 0), "late"))
        .await
        .unwrap();
    let early = f
        .engine
        .create_booking(request(&f.user, &f.room, at(8, 0), at(9, 0), "early"))
        .await
        .unwrap();

    let schedule = f.engine.get_room_schedule_by_date(f.room.id, at(23, 59)).await.unwrap();
    let ids: Vec<Ulid> = schedule.slots.iter().map(|s| s.booking_id).collect();
    assert_eq!(ids, vec![early.id, late.id]);

    let prev = f.engine.get_room_schedule_by_date(f.room.id, DAY0 - 1).await.unwrap();
    assert_eq!(prev.date, "2025-03-09");
    assert_eq!(prev.slots.len(), 1);
    assert_eq!(prev.slots[0].booking_id, overnight.id);
}

#[tokio::test]
async fn schedule_attribution_is_soft() {
    let f = fixture().await;
    let gone = seed_user(f.store.as_ref(), "Gone").await;
    f.engine
        .create_booking(request(&gone, &f.room, at(9, 0), at(10, 0), "orphan"))
        .await
        .unwrap();
    UserStore::delete(f.store.as_ref(), gone.id).await.unwrap();

    let schedule = f.engine.get_room_schedule_by_date(f.room.id, DAY0).await.unwrap();
    assert_eq!(schedule.slots.len(), 1);
    assert_eq!(schedule.slots[0].user_name, "");
    assert_eq!(schedule.slots[0].purpose, "orphan");

    let empty = f.engine.get_room_schedule_by_date(f.room.id, DAY0 + DAY_MS).await.unwrap();
    assert!(empty.slots.is_empty());

    let ghost = Ulid::new();
    assert_eq!(
        f.engine.get_room_schedule_by_date(ghost, DAY0).await,
        Err(EngineError::RoomNotFound(ghost))
    );
}

// ── Durable adapter ──────────────────────────────────────

fn test_wal_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("roombook_test_engine");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    path
}

#[tokio::test]
async fn wal_backed_engine_replays_admissions_and_cancellations() {
    let path = test_wal_path("engine_replay.wal");
    let (room, user, kept, dropped) = {
        let store = Arc::new(WalStore::open(&path).unwrap());
        let room = seed_room(store.as_ref(), 5, 10).await;
        let user = seed_user(store.as_ref(), "Wal").await;
        let engine = Engine::new(store.clone(), store.clone(), store);
        let kept = engine
            .create_booking(request(&user, &room, at(9, 0), at(10, 0), "kept"))
            .await
            .unwrap();
        let dropped = engine
            .create_booking(request(&user, &room, at(10, 0), at(11, 0), "dropped"))
            .await
            .unwrap();
        engine.cancel_booking(dropped.id).await.unwrap();
        (room, user, kept, dropped)
    };

    let store = Arc::new(WalStore::open(&path).unwrap());
    let engine = Engine::new(store.clone(), store.clone(), store);
    assert_eq!(engine.get_booking(kept.id).await.unwrap(), kept);
    assert_eq!(
        engine.get_booking(dropped.id).await.unwrap().status,
        BookingStatus::Cancelled
    );
    let err = assert_err!(
        engine
            .create_booking(request(&user, &room, at(9, 30), at(9, 45), "clash"))
            .await
    );
    assert_eq!(err.kind(), ErrorKind::RoomUnavailable);
    assert_ok!(
        engine
            .create_booking(request(&user, &room, at(10, 0), at(11, 0), "retry"))
            .await
    );
}

#[tokio::test]
async fn group_commit_under_concurrent_rooms() {
    let path = test_wal_path("group_commit_rooms.wal");
    let store = Arc::new(WalStore::open(&path).unwrap());
    let user = seed_user(store.as_ref(), "Batch").await;
    let mut rooms = Vec::new();
    for n in 1..=20 {
        rooms.push(seed_room(store.as_ref(), n, 2).await);
    }
    let engine = Arc::new(Engine::new(store.clone(), store.clone(), store.clone()));

    let mut handles = Vec::new();
    for room in &rooms {
        let engine = engine.clone();
        let req = request(&user, room, at(9, 0), at(10, 0), "batch");
        handles.push(tokio::spawn(async move { engine.create_booking(req).await }));
    }
    for h in handles {
        h.await.unwrap().unwrap();
    }
    drop(engine);

    let replayed = WalStore::open(&path).unwrap();
    assert_eq!(BookingStore::get_all(&replayed).await.unwrap().len(), rooms.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn compaction_during_admissions_loses_nothing_on_reopen() {
    let path = test_wal_path("compact_during_admissions.wal");
    let store = Arc::new(WalStore::open(&path).unwrap());
    let user = seed_user(store.as_ref(), "Busy").await;
    let mut rooms = Vec::new();
    for n in 1..=6 {
        rooms.push(seed_room(store.as_ref(), n, 4).await);
    }
    let engine = Arc::new(Engine::new(store.clone(), store.clone(), store.clone()));

    let done = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let compactor = {
        let store = store.clone();
        let done = done.clone();
        tokio::spawn(async move {
            while !done.load(Ordering::Relaxed) {
                store.compact().await.unwrap();
                tokio::task::yield_now().await;
            }
        })
    };

    let mut handles = Vec::new();
    for room in rooms.clone() {
        let engine = engine.clone();
        let user = user.clone();
        handles.push(tokio::spawn(async move {
            let mut confirmed = Vec::new();
            let mut cancelled = Vec::new();
            for slot in 0..48 {
                let start = at(0, 0) + slot * 30 * M;
                let b = engine
                    .create_booking(request(&user, &room, start, start + 30 * M, "slot"))
                    .await
                    .unwrap();
                if slot % 4 == 0 {
                    engine.cancel_booking(b.id).await.unwrap();
                    cancelled.push(b.id);
                } else {
                    confirmed.push(b.id);
                }
            }
            (confirmed, cancelled)
        }));
    }
    let (mut confirmed, mut cancelled) = (Vec::new(), Vec::new());
    for h in handles {
        let (c, x) = h.await.unwrap();
        confirmed.extend(c);
        cancelled.extend(x);
    }
    done.store(true, Ordering::Relaxed);
    compactor.await.unwrap();

    let reopened = Arc::new(WalStore::open(&path).unwrap());
    let engine = Engine::new(reopened.clone(), reopened.clone(), reopened);
    for id in confirmed {
        assert_eq!(engine.get_booking(id).await.unwrap().status, BookingStatus::Confirmed);
    }
    for id in cancelled {
        assert_eq!(engine.get_booking(id).await.unwrap().status, BookingStatus::Cancelled);
    }
}

#[tokio::test]
async fn room_deleted_while_admission_waits_is_not_booked() {
    let f = fixture().await;
    let rooms = crate::directory::RoomDirectory::new(f.store.clone())
        .with_room_locks(f.engine.room_locks());
    let engine = Arc::new(f.engine);

    // Hold the room's admission lock so both contenders queue behind it.
    let held = engine.lock_room(f.room.id).await;
    let delete = {
        let room_id = f.room.id;
        tokio::spawn(async move { rooms.delete_room(room_id).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    let create = {
        let engine = engine.clone();
        let req = request(&f.user, &f.room, at(9, 0), at(10, 0), "late");
        tokio::spawn(async move { engine.create_booking(req).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    drop(held);

    assert_ok!(delete.await.unwrap());
    let err = assert_err!(create.await.unwrap());
    assert_eq!(err, EngineError::RoomNotFound(f.room.id));
    assert_eq!(f.store.booking_count(), 0);
}
