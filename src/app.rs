use std::io;
use std::path::Path;
use std::sync::Arc;

use crate::compactor;
use crate::directory::{RoomDirectory, UserDirectory};
use crate::engine::Engine;
use crate::store::{BookingStore, InMemoryStore, RoomStore, UserStore, WalStore};

const WAL_FILE: &str = "roombook.wal";

/// Engine plus directories, all wired to one storage adapter.
pub struct App {
    pub engine: Engine,
    pub rooms: RoomDirectory,
    pub users: UserDirectory,
}

impl App {
    pub fn new<S>(store: Arc<S>) -> Self
    where
        S: BookingStore + RoomStore + UserStore + 'static,
    {
        let bookings: Arc<dyn BookingStore> = store.clone();
        let rooms: Arc<dyn RoomStore> = store.clone();
        let users: Arc<dyn UserStore> = store;
        let engine = Engine::new(bookings, rooms.clone(), users.clone());
        Self {
            rooms: RoomDirectory::new(rooms).with_room_locks(engine.room_locks()),
            users: UserDirectory::new(users),
            engine,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()))
    }

    /// Durable app over `<data_dir>/roombook.wal`, with a background compactor.
    /// Must run inside a tokio runtime.
    pub fn open(data_dir: &Path, compact_threshold: u64) -> io::Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let store = Arc::new(WalStore::open(&data_dir.join(WAL_FILE))?);
        let compactor_store = store.clone();
        tokio::spawn(async move {
            compactor::run_compactor(compactor_store, compact_threshold).await;
        });
        Ok(Self::new(store))
    }
}
