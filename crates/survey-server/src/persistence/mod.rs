//! Persistence layer for the survey server.
//!
//! Provides SQLite-backed storage for missions and drones, with an in-memory
//! alternative behind the same `MissionStore` trait.

pub mod db;
pub mod drones;
pub mod memory;
pub mod missions;
pub mod store;

pub use db::{init_database, init_database_with, ConnectPolicy, Database};
pub use memory::MemoryStore;
pub use store::{MissionStore, SqliteStore, StoreBackend};
