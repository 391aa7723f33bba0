//! Storage seams consumed by the engine and the directories.
//!
//! Every adapter implements all three traits; which one is active is decided
//! once at startup (`InMemoryStore` without a data dir, `WalStore` with one).

mod memory;
mod wal_store;

pub use memory::InMemoryStore;
pub use wal_store::WalStore;

use async_trait::async_trait;
use ulid::Ulid;

use crate::model::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    NotFound(Ulid),
    /// Unique key already taken (room number, email, id).
    Duplicate(String),
    AlreadyCancelled(Ulid),
    Wal(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound(id) => write!(f, "not found: {id}"),
            StoreError::Duplicate(key) => write!(f, "duplicate key: {key}"),
            StoreError::AlreadyCancelled(id) => write!(f, "booking {id} already cancelled"),
            StoreError::Wal(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn create(&self, booking: &Booking) -> StoreResult<()>;
    async fn get_by_id(&self, id: Ulid) -> StoreResult<Booking>;
    async fn get_all(&self) -> StoreResult<Vec<Booking>>;
    /// Every booking on the room whose interval overlaps `span`, any status.
    async fn get_by_room_and_time_range(&self, room_id: Ulid, span: Span) -> StoreResult<Vec<Booking>>;
    async fn get_by_room(&self, room_id: Ulid) -> StoreResult<Vec<Booking>>;
    async fn get_by_user(&self, user_id: Ulid) -> StoreResult<Vec<Booking>>;
    /// Flip a confirmed booking to cancelled and return the updated record.
    async fn cancel(&self, id: Ulid, at: Ms) -> StoreResult<Booking>;
    /// Bookings whose start falls within `span`.
    async fn get_by_date_range(&self, span: Span) -> StoreResult<Vec<Booking>>;
    /// Bookings on the room whose start falls within `day`.
    async fn get_by_room_and_date(&self, room_id: Ulid, day: Span) -> StoreResult<Vec<Booking>>;
}

#[async_trait]
pub trait RoomStore: Send + Sync {
    async fn create(&self, room: &Room) -> StoreResult<()>;
    async fn get_by_id(&self, id: Ulid) -> StoreResult<Room>;
    async fn get_all(&self) -> StoreResult<Vec<Room>>;
    async fn update_status(&self, id: Ulid, status: &str, at: Ms) -> StoreResult<Room>;
    async fn delete(&self, id: Ulid) -> StoreResult<()>;
    async fn search(&self, filter: &RoomFilter) -> StoreResult<Vec<Room>>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, user: &User) -> StoreResult<()>;
    async fn get_by_id(&self, id: Ulid) -> StoreResult<User>;
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn get_all(&self) -> StoreResult<Vec<User>>;
    async fn delete(&self, id: Ulid) -> StoreResult<()>;
}
