//! Cross-account identity tags.
//!
//! # Responsibility
//! - Mint fresh UIDs for groups and contacts.
//! - Model the UID-tagged extended properties found on one remote record.
//!
//! # Invariants
//! - A minted UID is never reused for another logical entity.
//! - After repair a record carries at most one tag.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Engine-assigned, cross-account-stable identity string.
///
/// Kept as a type alias: system groups use their fixed resource identifier
/// as UID, so the value space is wider than UUIDs.
pub type Uid = String;

/// Mints a fresh UID.
pub fn new_uid() -> Uid {
    Uuid::new_v4().to_string()
}

/// UID tags stored on one remote record, in the order the store returned them.
///
/// Externally triggered record merges can leave more than one tag behind;
/// `collapse_to` repairs that.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UidTags(Vec<Uid>);

impl UidTags {
    /// Creates an empty tag list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a tag list holding exactly `uid`.
    pub fn single(uid: impl Into<Uid>) -> Self {
        Self(vec![uid.into()])
    }

    /// First tag, used as the record's identity.
    pub fn primary(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the record carries more than one tag.
    pub fn is_multiple(&self) -> bool {
        self.0.len() > 1
    }

    pub fn contains(&self, uid: &str) -> bool {
        self.0.iter().any(|tag| tag == uid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Replaces every tag with `uid`.
    pub fn collapse_to(&mut self, uid: impl Into<Uid>) {
        self.0 = vec![uid.into()];
    }

    /// Adds a tag unless already present.
    pub fn push(&mut self, uid: impl Into<Uid>) {
        let uid = uid.into();
        if !self.contains(&uid) {
            self.0.push(uid);
        }
    }
}

impl From<Vec<Uid>> for UidTags {
    fn from(value: Vec<Uid>) -> Self {
        Self(value)
    }
}
