//! Group identity lookup and membership remapping.
//!
//! Memberships are stored as account-local group resource identifiers. They
//! travel between accounts as group UIDs.

use crate::model::contact::Contact;
use crate::model::group::Group;
use crate::model::uid::Uid;
use log::debug;
use std::collections::{BTreeSet, HashMap, HashSet};

/// UID, resource identifier and name of every tagged group in one account.
#[derive(Debug, Clone, Default)]
pub struct GroupTable {
    resource_by_uid: HashMap<Uid, String>,
    uid_by_resource: HashMap<String, Uid>,
    name_by_uid: HashMap<Uid, String>,
}

impl GroupTable {
    /// Indexes `groups`. Untagged groups are skipped.
    pub fn from_groups(groups: &[Group]) -> Self {
        let mut table = Self::default();
        for group in groups {
            let Some(uid) = group.uid() else {
                continue;
            };
            table
                .resource_by_uid
                .insert(uid.to_string(), group.resource_id.clone());
            table
                .uid_by_resource
                .insert(group.resource_id.clone(), uid.to_string());
            table.name_by_uid.insert(uid.to_string(), group.name.clone());
        }
        table
    }

    pub fn len(&self) -> usize {
        self.resource_by_uid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resource_by_uid.is_empty()
    }

    pub fn resource_for(&self, uid: &str) -> Option<&str> {
        self.resource_by_uid.get(uid).map(String::as_str)
    }

    pub fn uid_for(&self, resource_id: &str) -> Option<&str> {
        self.uid_by_resource.get(resource_id).map(String::as_str)
    }

    pub fn name_for(&self, uid: &str) -> Option<&str> {
        self.name_by_uid.get(uid).map(String::as_str)
    }

    /// UIDs of groups whose name is in `names`.
    pub fn uids_named(&self, names: &BTreeSet<String>) -> HashSet<Uid> {
        self.name_by_uid
            .iter()
            .filter(|(_, name)| names.contains(*name))
            .map(|(uid, _)| uid.clone())
            .collect()
    }

    /// Group UIDs of `contact`'s memberships, in membership order.
    ///
    /// Memberships pointing at unknown groups are dropped.
    pub fn membership_uids(&self, contact: &Contact) -> Vec<Uid> {
        let mut uids: Vec<Uid> = Vec::with_capacity(contact.memberships.len());
        for resource_id in &contact.memberships {
            match self.uid_for(resource_id) {
                Some(uid) if !uids.iter().any(|seen| seen == uid) => uids.push(uid.to_string()),
                Some(_) => {}
                None => debug!(
                    "event=membership_unknown module=sync status=dropped resource_id={}",
                    resource_id
                ),
            }
        }
        uids
    }

    /// Whether `contact` belongs to any group in `private_uids`.
    pub fn is_private(&self, contact: &Contact, private_uids: &HashSet<Uid>) -> bool {
        contact
            .memberships
            .iter()
            .filter_map(|resource_id| self.uid_for(resource_id))
            .any(|uid| private_uids.contains(uid))
    }
}

/// Maps group UIDs to resource identifiers in the `target` account.
///
/// UIDs with no counterpart in `target` are dropped and duplicates collapse.
pub fn remap_memberships(uids: &[Uid], target: &GroupTable) -> Vec<String> {
    let mut resources: Vec<String> = Vec::with_capacity(uids.len());
    for uid in uids {
        match target.resource_for(uid) {
            Some(resource_id) if !resources.iter().any(|seen| seen == resource_id) => {
                resources.push(resource_id.to_string())
            }
            Some(_) => {}
            None => debug!(
                "event=membership_remap module=sync status=dropped group_uid={}",
                uid
            ),
        }
    }
    resources
}
