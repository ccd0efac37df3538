//! Multi-master reconciliation engine.
//!
//! # Responsibility
//! - Give every eligible group and contact one stable cross-account UID.
//! - Converge group identity and naming across accounts.
//! - Replicate contact creates/updates, enforce privacy, propagate deletions.
//!
//! # Invariants
//! - Phases run strictly in order over the full account set: identity,
//!   groups, private-group resolution, contacts, snapshot write.
//! - Accounts are visited in configured order in every phase.
//! - A fatal error aborts the run before any snapshot is written.

use crate::config::ConfigError;
use crate::snapshot::SnapshotError;
use crate::store::{StoreError, StoreRegistryError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod account;
pub mod contacts;
pub mod engine;
pub mod groups;
pub mod identity;
pub mod membership;
pub mod report;

pub use account::Account;
pub use contacts::ContactState;
pub use engine::SyncEngine;
pub use membership::{remap_memberships, GroupTable};
pub use report::{AccountReport, SyncReport};

pub type SyncResult<T> = Result<T, SyncError>;

/// Fatal reconciliation errors. Any of these aborts the run.
#[derive(Debug)]
pub enum SyncError {
    Config(ConfigError),
    Registry(StoreRegistryError),
    /// A store call failed for good (after retries where applicable).
    Store { account: String, source: StoreError },
    Snapshot {
        account: String,
        source: SnapshotError,
    },
    /// Logic error: something tried to rename or re-identify a system group.
    SystemGroupMutation { account: String, group: String },
}

impl SyncError {
    pub(crate) fn store(account: &str, source: StoreError) -> Self {
        Self::Store {
            account: account.to_string(),
            source,
        }
    }

    pub(crate) fn snapshot(account: &str, source: SnapshotError) -> Self {
        Self::Snapshot {
            account: account.to_string(),
            source,
        }
    }
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Registry(err) => write!(f, "{err}"),
            Self::Store { account, source } => write!(f, "account `{account}`: {source}"),
            Self::Snapshot { account, source } => {
                write!(f, "snapshot of account `{account}`: {source}")
            }
            Self::SystemGroupMutation { account, group } => write!(
                f,
                "refusing to modify system group `{group}` in account `{account}`"
            ),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Registry(err) => Some(err),
            Self::Store { source, .. } => Some(source),
            Self::Snapshot { source, .. } => Some(source),
            Self::SystemGroupMutation { .. } => None,
        }
    }
}

impl From<ConfigError> for SyncError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<StoreRegistryError> for SyncError {
    fn from(value: StoreRegistryError) -> Self {
        Self::Registry(value)
    }
}
