//! Core reconciliation engine for contactsync.
//! Keeps groups and contacts consistent across several directory accounts.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod snapshot;
pub mod store;
pub mod sync;

pub use config::{ConfigError, SyncConfig, WritePolicy};
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{
    default_log_level, init_logging, init_stderr_logging, logging_status, LogTarget,
};
pub use model::contact::{Contact, ContactField, ContactValue, ValueSource};
pub use model::group::{Group, GroupField};
pub use model::uid::{Uid, UidTags};
pub use snapshot::{Snapshot, SnapshotError, SnapshotStore, SqliteSnapshotStore};
pub use store::{
    AccountStore, DirectoryState, FileDirectory, MemoryDirectory, StoreError, StoreRegistry,
    StoreRegistryError, StoreResult,
};
pub use sync::{SyncEngine, SyncError, SyncReport, SyncResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
