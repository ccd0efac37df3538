//! Group domain model.
//!
//! # Responsibility
//! - Define the account-scoped group record.
//! - Resolve a group's cross-account identity.
//!
//! # Invariants
//! - A system group's UID is its resource identifier and never changes.
//! - Two groups in different accounts with the same UID are one logical group.

use crate::model::uid::UidTags;
use serde::{Deserialize, Serialize};

/// Fields of a group that an update call may change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupField {
    Name,
    UidTags,
}

/// One group as stored in one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// UID tags stored on the remote record. Ignored for system groups.
    #[serde(default)]
    pub uid_tags: UidTags,
    /// Display name.
    pub name: String,
    /// Account-local identifier assigned by the store. Empty before creation.
    #[serde(default)]
    pub resource_id: String,
    /// Built-in group provided by the service itself.
    #[serde(default)]
    pub system: bool,
    /// Last modification marker.
    #[serde(default)]
    pub updated: Option<String>,
}

impl Group {
    /// Creates a user group tagged with `uid`, not yet stored anywhere.
    pub fn new(name: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            uid_tags: UidTags::single(uid),
            name: name.into(),
            resource_id: String::new(),
            system: false,
            updated: None,
        }
    }

    /// Creates a built-in group.
    pub fn system(name: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            uid_tags: UidTags::new(),
            name: name.into(),
            resource_id: resource_id.into(),
            system: true,
            updated: None,
        }
    }

    /// Cross-account identity, if any.
    pub fn uid(&self) -> Option<&str> {
        if self.system {
            return Some(self.resource_id.as_str());
        }
        self.uid_tags.primary()
    }

    pub fn is_tagged(&self) -> bool {
        self.uid().is_some()
    }
}
