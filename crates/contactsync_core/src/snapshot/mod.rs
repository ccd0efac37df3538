//! Per-account run snapshots.
//!
//! # Responsibility
//! - Persist, per account, the map contact UID -> modification marker seen at
//!   the end of the previous run.
//! - Keep storage details behind the `SnapshotStore` contract.
//!
//! # Invariants
//! - An account that was never saved loads as an empty snapshot.
//! - `save` replaces an account's entries as a whole.
//! - Snapshots are a diff baseline only, never an identity source.

use crate::db::DbError;
use crate::model::uid::Uid;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod sqlite;

pub use sqlite::SqliteSnapshotStore;

/// Contact UID -> last observed modification marker.
pub type Snapshot = BTreeMap<Uid, String>;

pub type SnapshotResult<T> = Result<T, SnapshotError>;

#[derive(Debug)]
pub enum SnapshotError {
    Db(DbError),
    InvalidData(String),
}

impl Display for SnapshotError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid snapshot data: {message}"),
        }
    }
}

impl Error for SnapshotError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for SnapshotError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for SnapshotError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Load/save contract for run snapshots.
pub trait SnapshotStore {
    fn load(&self, account: &str) -> SnapshotResult<Snapshot>;
    fn save(&self, account: &str, snapshot: &Snapshot) -> SnapshotResult<()>;
}
