use std::collections::BTreeSet;
use std::sync::Arc;

use ulid::Ulid;

use crate::engine::{EngineError, RoomLocks};
use crate::limits::*;
use crate::model::*;
use crate::store::{RoomStore, StoreError};

use super::required_field;

pub struct RoomDirectory {
    store: Arc<dyn RoomStore>,
    locks: RoomLocks,
}

fn normalize_amenities(raw: &BTreeSet<String>) -> Result<BTreeSet<String>, EngineError> {
    let mut out = BTreeSet::new();
    for a in raw {
        let a = a.trim();
        if a.is_empty() {
            continue;
        }
        if a.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("amenity too long"));
        }
        out.insert(a.to_string());
    }
    if out.len() > MAX_AMENITIES {
        return Err(EngineError::LimitExceeded("too many amenities"));
    }
    Ok(out)
}

fn validate_status(status: &str) -> Result<String, EngineError> {
    required_field(status, "status is required", MAX_STATUS_LEN, "status too long")
}

impl RoomDirectory {
    pub fn new(store: Arc<dyn RoomStore>) -> Self {
        Self {
            store,
            locks: RoomLocks::default(),
        }
    }

    /// Share the engine's admission locks so deletes wait out in-flight bookings.
    pub fn with_room_locks(self, locks: RoomLocks) -> Self {
        Self { locks, ..self }
    }

    async fn fetch(&self, id: Ulid) -> Result<Room, EngineError> {
        if id.is_nil() {
            return Err(EngineError::InvalidInput("room id is required"));
        }
        self.store.get_by_id(id).await.map_err(|e| match e {
            StoreError::NotFound(_) => EngineError::RoomNotFound(id),
            other => other.into(),
        })
    }

    pub async fn add_room(&self, new: NewRoom) -> Result<Room, EngineError> {
        let name = required_field(&new.name, "room name is required", MAX_NAME_LEN, "room name too long")?;
        let location = required_field(
            &new.location,
            "room location is required",
            MAX_LOCATION_LEN,
            "room location too long",
        )?;
        if new.capacity <= 0 {
            return Err(EngineError::InvalidInput("capacity must be positive"));
        }
        if new.room_number <= 0 {
            return Err(EngineError::InvalidInput("room number must be positive"));
        }
        if new.floor < 0 {
            return Err(EngineError::InvalidInput("floor must not be negative"));
        }
        let description = match new.description.as_deref().map(str::trim) {
            Some(d) if d.len() > MAX_DESCRIPTION_LEN => {
                return Err(EngineError::LimitExceeded("description too long"));
            }
            Some(d) if !d.is_empty() => Some(d.to_string()),
            _ => None,
        };
        let status = match new.status.as_deref() {
            Some(s) if !s.trim().is_empty() => validate_status(s)?,
            _ => DEFAULT_ROOM_STATUS.to_string(),
        };

        let now = now_ms();
        let room = Room {
            id: Ulid::new(),
            name,
            room_number: new.room_number,
            capacity: new.capacity,
            floor: new.floor,
            amenities: normalize_amenities(&new.amenities)?,
            status,
            location,
            description,
            created_at: now,
            updated_at: now,
        };
        self.store.create(&room).await.map_err(|e| match e {
            StoreError::Duplicate(_) => {
                EngineError::Conflict(format!("room number {} already exists", room.room_number))
            }
            other => other.into(),
        })?;
        tracing::info!("room {} (#{}) added", room.id, room.room_number);
        Ok(room)
    }

    pub async fn get_room(&self, id: Ulid) -> Result<Room, EngineError> {
        self.fetch(id).await
    }

    pub async fn list_rooms(&self) -> Result<Vec<Room>, EngineError> {
        let rooms = self.store.get_all().await?;
        if rooms.is_empty() {
            return Err(EngineError::NoneFound("rooms"));
        }
        Ok(rooms)
    }

    pub async fn update_status(&self, id: Ulid, status: &str) -> Result<Room, EngineError> {
        let status = validate_status(status)?;
        self.fetch(id).await?;
        let room = self.store.update_status(id, &status, now_ms()).await?;
        tracing::info!("room {id} status -> {status}");
        Ok(room)
    }

    /// Existing bookings on the room are kept; they simply stop resolving a room.
    pub async fn delete_room(&self, id: Ulid) -> Result<(), EngineError> {
        self.fetch(id).await?;
        let _guard = self.locks.lock(id).await;
        self.store.delete(id).await.map_err(|e| match e {
            StoreError::NotFound(_) => EngineError::RoomNotFound(id),
            other => other.into(),
        })?;
        tracing::info!("room {id} deleted");
        Ok(())
    }

    /// Rooms matching every given criterion, ordered by room number.
    pub async fn search_rooms(&self, filter: RoomFilter) -> Result<Vec<Room>, EngineError> {
        if filter.min_capacity < 0 || filter.max_capacity < 0 {
            return Err(EngineError::InvalidInput("capacity bounds must not be negative"));
        }
        if filter.min_capacity > 0 && filter.max_capacity > 0 && filter.min_capacity > filter.max_capacity {
            return Err(EngineError::InvalidInput("min capacity exceeds max capacity"));
        }
        let filter = RoomFilter {
            amenities: normalize_amenities(&filter.amenities)?,
            ..filter
        };
        Ok(self.store.search(&filter).await?)
    }
}
