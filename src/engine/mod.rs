mod conflict;
mod error;
mod mutations;
mod queries;
mod schedule;
#[cfg(test)]
mod tests;

pub use error::{EngineError, ErrorKind};

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use ulid::Ulid;

use crate::model::*;
use crate::store::{BookingStore, RoomStore, UserStore};

/// Per-room admission locks, shared by the engine and the room directory so a
/// room cannot be deleted while a booking on it is being admitted.
#[derive(Clone, Default)]
pub struct RoomLocks(Arc<DashMap<Ulid, Arc<Mutex<()>>>>);

impl RoomLocks {
    pub async fn lock(&self, room_id: Ulid) -> OwnedMutexGuard<()> {
        // Clone the Arc out first so no DashMap shard guard is held across the await.
        let lock = self
            .0
            .entry(room_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        lock.lock_owned().await
    }
}

/// Booking admission and conflict resolution over injected stores.
///
/// Writes to one room are serialized by that room's admission lock, held
/// across the conflict probe and the store write. Reads take no lock.
pub struct Engine {
    pub(super) bookings: Arc<dyn BookingStore>,
    pub(super) rooms: Arc<dyn RoomStore>,
    pub(super) users: Arc<dyn UserStore>,
    room_locks: RoomLocks,
}

impl Engine {
    pub fn new(
        bookings: Arc<dyn BookingStore>,
        rooms: Arc<dyn RoomStore>,
        users: Arc<dyn UserStore>,
    ) -> Self {
        Self {
            bookings,
            rooms,
            users,
            room_locks: RoomLocks::default(),
        }
    }

    pub fn room_locks(&self) -> RoomLocks {
        self.room_locks.clone()
    }

    /// Acquire the admission lock for `room_id`.
    pub(super) async fn lock_room(&self, room_id: Ulid) -> OwnedMutexGuard<()> {
        self.room_locks.lock(room_id).await
    }

    /// Hard lookups: a miss is reported with the entity's own variant.
    pub(super) async fn resolve_room(&self, room_id: Ulid) -> Result<Room, EngineError> {
        self.rooms.get_by_id(room_id).await.map_err(|e| match e {
            crate::store::StoreError::NotFound(_) => EngineError::RoomNotFound(room_id),
            other => other.into(),
        })
    }

    pub(super) async fn resolve_user(&self, user_id: Ulid) -> Result<User, EngineError> {
        self.users.get_by_id(user_id).await.map_err(|e| match e {
            crate::store::StoreError::NotFound(_) => EngineError::UserNotFound(user_id),
            other => other.into(),
        })
    }

    /// Soft lookup for attribution; any failure yields `None`.
    pub(super) async fn lookup_user(&self, user_id: Ulid) -> Option<User> {
        match self.users.get_by_id(user_id).await {
            Ok(u) => Some(u),
            Err(e) => {
                tracing::debug!("user lookup for {user_id} failed: {e}");
                None
            }
        }
    }
}
