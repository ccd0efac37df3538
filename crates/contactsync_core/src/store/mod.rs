//! Account store contract and local backends.
//!
//! # Responsibility
//! - Define the per-account CRUD surface the engine consumes.
//! - Isolate remote-service details from reconciliation logic.
//!
//! # Invariants
//! - Stores assign resource identifiers, concurrency tokens and markers.
//! - Updates to system groups are refused with `SystemGroupImmutable`.
//! - `list_contacts` returns eligible records only.

use crate::model::contact::{Contact, ContactField};
use crate::model::group::{Group, GroupField};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod directory;
pub mod registry;

pub use directory::{DirectoryState, FileDirectory, MemoryDirectory};
pub use registry::{StoreRegistry, StoreRegistryError};

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure reported by an account store.
#[derive(Debug)]
pub enum StoreError {
    /// Credentials missing, expired or rejected.
    Unauthorized(String),
    /// Backing directory cannot be reached at all.
    Unavailable(String),
    /// Target resource does not exist.
    NotFound(String),
    /// Attempted to change a built-in group.
    SystemGroupImmutable(String),
    /// Rate limit or network hiccup; the call may succeed if retried.
    Transient(String),
    /// Request refused, e.g. stale concurrency token or read-only field.
    Rejected(String),
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl StoreError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthorized(message) => write!(f, "unauthorized: {message}"),
            Self::Unavailable(message) => write!(f, "store unavailable: {message}"),
            Self::NotFound(resource) => write!(f, "resource not found: {resource}"),
            Self::SystemGroupImmutable(resource) => {
                write!(f, "system group cannot be modified: {resource}")
            }
            Self::Transient(message) => write!(f, "transient store failure: {message}"),
            Self::Rejected(message) => write!(f, "request rejected: {message}"),
            Self::Io(err) => write!(f, "{err}"),
            Self::Json(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Per-account CRUD surface of a remote directory service.
///
/// Calls are blocking. Returned records reflect the server's view after the
/// call, including fresh markers and concurrency tokens.
pub trait AccountStore {
    fn list_groups(&mut self) -> StoreResult<Vec<Group>>;
    fn list_contacts(&mut self) -> StoreResult<Vec<Contact>>;
    fn create_group(&mut self, group: &Group) -> StoreResult<Group>;
    fn update_group(&mut self, group: &Group, fields: &[GroupField]) -> StoreResult<Group>;
    fn create_contact(&mut self, contact: &Contact) -> StoreResult<Contact>;
    fn update_contact(&mut self, contact: &Contact, fields: &[ContactField])
        -> StoreResult<Contact>;
    fn delete_contact(&mut self, contact: &Contact) -> StoreResult<()>;
}
