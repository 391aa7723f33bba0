use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds (UTC). The only time type.
pub type Ms = i64;

pub const DAY_MS: Ms = 86_400_000;

/// True iff `start` is strictly before `end`. Equal or inverted bounds are invalid.
pub fn is_valid_range(start: Ms, end: Ms) -> bool {
    start < end
}

/// Half-open intersection test: `[a_start, a_end)` and `[b_start, b_end)` share
/// at least one instant. Back-to-back intervals do not overlap.
pub fn overlaps(a_start: Ms, a_end: Ms, b_start: Ms, b_end: Ms) -> bool {
    a_start < b_end && b_start < a_end
}

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    /// Checked constructor for untrusted bounds.
    pub fn try_new(start: Ms, end: Ms) -> Option<Self> {
        is_valid_range(start, end).then_some(Self { start, end })
    }

    /// The UTC day containing `instant`.
    pub fn day_of(instant: Ms) -> Self {
        let start = instant.div_euclid(DAY_MS) * DAY_MS;
        Self::new(start, start + DAY_MS)
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        overlaps(self.start, self.end, other.start, other.end)
    }

    pub fn contains_instant(&self, t: Ms) -> bool {
        self.start <= t && t < self.end
    }
}

// ── Rooms ────────────────────────────────────────────────────────

pub const DEFAULT_ROOM_STATUS: &str = "Available";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: Ulid,
    pub name: String,
    pub room_number: i32,
    pub capacity: i32,
    pub floor: i32,
    pub amenities: BTreeSet<String>,
    pub status: String,
    pub location: String,
    pub description: Option<String>,
    pub created_at: Ms,
    pub updated_at: Ms,
}

/// Admin input for a new room; identity and timestamps are assigned on insert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewRoom {
    pub name: String,
    pub room_number: i32,
    pub capacity: i32,
    pub floor: i32,
    pub amenities: BTreeSet<String>,
    pub status: Option<String>,
    pub location: String,
    pub description: Option<String>,
}

/// Room search filter. Zero capacity bounds mean "unbounded".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomFilter {
    pub min_capacity: i32,
    pub max_capacity: i32,
    pub floor: Option<i32>,
    pub amenities: BTreeSet<String>,
}

impl RoomFilter {
    pub fn matches(&self, room: &Room) -> bool {
        if self.min_capacity > 0 && room.capacity < self.min_capacity {
            return false;
        }
        if self.max_capacity > 0 && room.capacity > self.max_capacity {
            return false;
        }
        if self.floor.is_some_and(|f| f != room.floor) {
            return false;
        }
        self.amenities.is_subset(&room.amenities)
    }
}

// ── Users ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "user" => Some(Role::User),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Ulid,
    pub name: String,
    pub email: String,
    /// Opaque credential; never interpreted here.
    pub password: String,
    pub role: Role,
    pub created_at: Ms,
    pub updated_at: Ms,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
}

/// Emails are unique case-insensitively.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

// ── Bookings ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub user_id: Ulid,
    pub room_id: Ulid,
    pub start: Ms,
    pub end: Ms,
    pub purpose: String,
    pub status: BookingStatus,
    pub created_at: Ms,
    pub updated_at: Ms,
}

impl Booking {
    pub fn span(&self) -> Span {
        Span::new(self.start, self.end)
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == BookingStatus::Confirmed
    }
}

/// A booking request before admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBooking {
    pub user_id: Ulid,
    pub room_id: Ulid,
    pub start: Ms,
    pub end: Ms,
    pub purpose: String,
}

// ── Derived views ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingWithDetails {
    pub booking: Booking,
    pub user_name: String,
    pub user_email: String,
    pub room_name: String,
    pub room_number: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Availability {
    pub room_id: Ulid,
    pub available: bool,
    pub conflicts: Vec<Booking>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleSlot {
    pub start: String,
    pub end: String,
    /// Always true: only booked slots are emitted.
    pub is_booked: bool,
    pub booking_id: Ulid,
    pub user_name: String,
    pub purpose: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSchedule {
    pub room_id: Ulid,
    pub room_name: String,
    pub room_number: i32,
    /// `YYYY-MM-DD`, UTC.
    pub date: String,
    pub slots: Vec<ScheduleSlot>,
}

// ── Time formatting (UTC) ────────────────────────────────────────

pub fn format_rfc3339(ms: Ms) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

pub fn format_date(ms: Ms) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.date_naive().format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Parse `YYYY-MM-DD` into UTC midnight.
pub fn parse_date(s: &str) -> Option<Ms> {
    let date = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis())
}

pub fn parse_rfc3339(s: &str) -> Option<Ms> {
    DateTime::parse_from_rfc3339(s.trim())
        .ok()
        .map(|dt| dt.timestamp_millis())
}

pub fn now_ms() -> Ms {
    Utc::now().timestamp_millis()
}

// ── WAL records ──────────────────────────────────────────────────

/// WAL record format. Flat, no nesting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    RoomCreated(Room),
    RoomStatusUpdated {
        id: Ulid,
        status: String,
        updated_at: Ms,
    },
    RoomDeleted {
        id: Ulid,
    },
    UserCreated(User),
    UserDeleted {
        id: Ulid,
    },
    BookingCreated(Booking),
    BookingCancelled {
        id: Ulid,
        room_id: Ulid,
        updated_at: Ms,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_range() {
        assert!(is_valid_range(0, 1));
        assert!(!is_valid_range(5, 5));
        assert!(!is_valid_range(6, 5));
    }

    #[test]
    fn overlap_matches_definition() {
        let points = [0, 5, 10, 15, 20, 25];
        for &a in &points {
            for &b in &points {
                for &c in &points {
                    for &d in &points {
                        if a < b && c < d {
                            assert_eq!(overlaps(a, b, c, d), a < d && c < b);
                            assert_eq!(overlaps(a, b, c, d), overlaps(c, d, a, b));
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn back_to_back_does_not_overlap() {
        assert!(!overlaps(0, 10, 10, 20));
        assert!(!Span::new(10, 20).overlaps(&Span::new(0, 10)));
        assert!(overlaps(0, 11, 10, 20));
    }

    #[test]
    fn span_basics() {
        let s = Span::new(100, 200);
        assert_eq!(s.duration_ms(), 100);
        assert!(s.contains_instant(100));
        assert!(s.contains_instant(199));
        assert!(!s.contains_instant(200)); // half-open
        assert_eq!(Span::try_new(200, 200), None);
    }

    #[test]
    fn day_bucket_is_utc() {
        // 2025-03-10T23:59:59.999Z
        let late = 1_741_651_199_999;
        let day = Span::day_of(late);
        assert_eq!(day.start, 1_741_564_800_000);
        assert_eq!(day.duration_ms(), DAY_MS);
        assert!(!day.contains_instant(late + 1));
        assert_eq!(format_date(day.start), "2025-03-10");
    }

    #[test]
    fn day_bucket_before_epoch() {
        let day = Span::day_of(-1);
        assert_eq!(day.start, -DAY_MS);
    }

    #[test]
    fn date_and_timestamp_parsing() {
        assert_eq!(parse_date("2025-03-10"), Some(1_741_564_800_000));
        assert_eq!(parse_date("10/03/2025"), None);
        assert_eq!(
            parse_rfc3339("2025-03-10T09:00:00Z"),
            Some(1_741_564_800_000 + 9 * 3_600_000)
        );
        assert_eq!(format_rfc3339(1_741_564_800_000), "2025-03-10T00:00:00Z");
    }

    #[test]
    fn room_filter() {
        let room = Room {
            id: Ulid::new(),
            name: "Orion".into(),
            room_number: 101,
            capacity: 8,
            floor: 1,
            amenities: ["projector".to_string(), "whiteboard".to_string()].into(),
            status: DEFAULT_ROOM_STATUS.into(),
            location: "North wing".into(),
            description: None,
            created_at: 0,
            updated_at: 0,
        };
        assert!(RoomFilter::default().matches(&room));
        assert!(RoomFilter { min_capacity: 8, ..Default::default() }.matches(&room));
        assert!(!RoomFilter { min_capacity: 9, ..Default::default() }.matches(&room));
        assert!(!RoomFilter { max_capacity: 4, ..Default::default() }.matches(&room));
        assert!(!RoomFilter { floor: Some(2), ..Default::default() }.matches(&room));
        let wants_tv = RoomFilter {
            amenities: ["tv".to_string()].into(),
            ..Default::default()
        };
        assert!(!wants_tv.matches(&room));
    }

    #[test]
    fn role_parsing() {
        assert_eq!(Role::parse(" Admin "), Some(Role::Admin));
        assert_eq!(Role::parse("user"), Some(Role::User));
        assert_eq!(Role::parse("owner"), None);
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = Event::BookingCancelled {
            id: Ulid::new(),
            room_id: Ulid::new(),
            updated_at: 42,
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }
}
