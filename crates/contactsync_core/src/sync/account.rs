//! Per-account working cache.
//!
//! # Responsibility
//! - Load one account's groups and eligible contacts once per run.
//! - Funnel every mutating store call through pacing, retry and dry-run.
//! - Keep the cache consistent with what the store reports after each write.
//!
//! # Invariants
//! - Cached contacts are keyed by primary UID; untagged contacts are held
//!   separately until identity assignment tags them.
//! - In dry-run mode the store is never called for writes, but the cache
//!   still reflects the intended change.
//! - System groups are never passed to `update_group`.

use crate::config::WritePolicy;
use crate::model::contact::{Contact, ContactField};
use crate::model::group::{Group, GroupField};
use crate::model::uid::{Uid, UidTags};
use crate::snapshot::Snapshot;
use crate::store::{AccountStore, StoreResult};
use crate::sync::{SyncError, SyncResult};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::thread;
use std::time::Instant;
use uuid::Uuid;

/// One account's store plus its in-memory view for the current run.
pub struct Account {
    name: String,
    store: Box<dyn AccountStore>,
    dry_run: bool,
    policy: WritePolicy,
    last_write: Option<Instant>,
    writes: usize,
    groups: Vec<Group>,
    contacts: BTreeMap<Uid, Contact>,
    untagged: Vec<Contact>,
}

impl Account {
    /// Lists groups and contacts from `store` and builds the cache.
    ///
    /// Ineligible contacts are dropped. When two records share a primary UID
    /// the first one listed is kept and the rest are ignored for this run.
    pub fn load(
        name: &str,
        mut store: Box<dyn AccountStore>,
        dry_run: bool,
        policy: WritePolicy,
    ) -> SyncResult<Self> {
        let groups = store
            .list_groups()
            .map_err(|err| SyncError::store(name, err))?;
        let listed = store
            .list_contacts()
            .map_err(|err| SyncError::store(name, err))?;

        let mut contacts = BTreeMap::new();
        let mut untagged = Vec::new();
        let mut skipped = 0usize;
        for contact in listed {
            if !contact.is_eligible() {
                skipped += 1;
                continue;
            }
            let Some(uid) = contact.uid().map(str::to_string) else {
                untagged.push(contact);
                continue;
            };
            if contacts.contains_key(&uid) {
                warn!(
                    "event=contact_duplicate_uid module=sync status=skipped account={} uid={} resource_id={}",
                    name,
                    uid,
                    contact.resource_id.as_deref().unwrap_or("")
                );
                continue;
            }
            contacts.insert(uid, contact);
        }

        info!(
            "event=account_load module=sync status=ok account={} groups={} contacts={} untagged={} ineligible={}",
            name,
            groups.len(),
            contacts.len(),
            untagged.len(),
            skipped
        );
        Ok(Self {
            name: name.to_string(),
            store,
            dry_run,
            policy,
            last_write: None,
            writes: 0,
            groups,
            contacts,
            untagged,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn contacts(&self) -> &BTreeMap<Uid, Contact> {
        &self.contacts
    }

    pub fn contact(&self, uid: &str) -> Option<&Contact> {
        self.contacts.get(uid)
    }

    /// Whether a cached contact has `uid` as its primary tag.
    pub fn holds(&self, uid: &str) -> bool {
        self.contacts.contains_key(uid)
    }

    pub fn untagged(&self) -> &[Contact] {
        &self.untagged
    }

    /// Hands untagged contacts over to identity assignment.
    pub fn take_untagged(&mut self) -> Vec<Contact> {
        std::mem::take(&mut self.untagged)
    }

    /// Primary UIDs of cached contacts that carry more than one tag.
    pub fn multi_tagged_uids(&self) -> Vec<Uid> {
        self.contacts
            .iter()
            .filter(|(_, contact)| contact.uid_tags.is_multiple())
            .map(|(uid, _)| uid.clone())
            .collect()
    }

    /// Mutating store calls issued so far, retries excluded.
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Primary UID to marker for every cached contact.
    pub fn current_snapshot(&self) -> Snapshot {
        self.contacts
            .iter()
            .map(|(uid, contact)| (uid.clone(), contact.updated.clone().unwrap_or_default()))
            .collect()
    }

    pub fn create_group(&mut self, group: Group) -> SyncResult<()> {
        let created = if self.dry_run {
            Group {
                resource_id: dry_run_resource_id(),
                ..group
            }
        } else {
            self.call_store("create_group", |store| store.create_group(&group))?
        };
        debug!(
            "event=group_create module=sync status=ok account={} name={} resource_id={}",
            self.name, created.name, created.resource_id
        );
        self.groups.push(created);
        Ok(())
    }

    /// Writes `fields` of `group` over the cached group at `index`.
    pub fn update_group(
        &mut self,
        index: usize,
        group: Group,
        fields: &[GroupField],
    ) -> SyncResult<()> {
        let Some(current) = self.groups.get(index) else {
            return Err(SyncError::store(
                &self.name,
                crate::store::StoreError::NotFound(group.resource_id),
            ));
        };
        if current.system {
            return Err(SyncError::SystemGroupMutation {
                account: self.name.clone(),
                group: current.name.clone(),
            });
        }
        let updated = if self.dry_run {
            group
        } else {
            self.call_store("update_group", |store| store.update_group(&group, fields))?
        };
        debug!(
            "event=group_update module=sync status=ok account={} name={} resource_id={}",
            self.name, updated.name, updated.resource_id
        );
        self.groups[index] = updated;
        Ok(())
    }

    /// Stores `uid` as the only tag of a previously untagged contact.
    pub fn tag_contact(&mut self, mut contact: Contact, uid: Uid) -> SyncResult<()> {
        contact.uid_tags = UidTags::single(uid.clone());
        let stored = self.write_contact(contact, &[ContactField::UidTags])?;
        self.contacts.insert(uid, stored);
        Ok(())
    }

    /// Collapses the tags of the contact held under `current` to `canonical`.
    pub fn retag_contact(&mut self, current: &str, canonical: &str) -> SyncResult<()> {
        let Some(mut contact) = self.contacts.remove(current) else {
            return Ok(());
        };
        contact.uid_tags.collapse_to(canonical);
        let stored = self.write_contact(contact, &[ContactField::UidTags])?;
        self.contacts.insert(canonical.to_string(), stored);
        Ok(())
    }

    pub fn create_contact(&mut self, contact: Contact) -> SyncResult<()> {
        let Some(uid) = contact.uid().map(str::to_string) else {
            return Ok(());
        };
        let created = if self.dry_run {
            Contact {
                resource_id: Some(dry_run_resource_id()),
                ..contact
            }
        } else {
            self.call_store("create_contact", |store| store.create_contact(&contact))?
        };
        self.contacts.insert(uid, created);
        Ok(())
    }

    /// Writes `fields` of a cached contact back to the store.
    pub fn update_contact(&mut self, contact: Contact, fields: &[ContactField]) -> SyncResult<()> {
        let Some(uid) = contact.uid().map(str::to_string) else {
            return Ok(());
        };
        let stored = self.write_contact(contact, fields)?;
        self.contacts.insert(uid, stored);
        Ok(())
    }

    /// Deletes the contact held under `uid`. Returns whether one was held.
    pub fn delete_contact(&mut self, uid: &str) -> SyncResult<bool> {
        let Some(contact) = self.contacts.remove(uid) else {
            return Ok(false);
        };
        if !self.dry_run {
            self.call_store("delete_contact", |store| store.delete_contact(&contact))?;
        }
        Ok(true)
    }

    fn write_contact(&mut self, contact: Contact, fields: &[ContactField]) -> SyncResult<Contact> {
        if self.dry_run {
            return Ok(contact);
        }
        self.call_store("update_contact", |store| {
            store.update_contact(&contact, fields)
        })
    }

    /// Issues one mutating call with pacing and bounded retry.
    fn call_store<T>(
        &mut self,
        operation: &str,
        mut call: impl FnMut(&mut dyn AccountStore) -> StoreResult<T>,
    ) -> SyncResult<T> {
        let attempts = self.policy.attempts();
        let mut attempt = 1;
        loop {
            self.pace();
            let result = call(self.store.as_mut());
            self.last_write = Some(Instant::now());
            match result {
                Ok(value) => {
                    self.writes += 1;
                    return Ok(value);
                }
                Err(err) if err.is_transient() && attempt < attempts => {
                    warn!(
                        "event=store_retry module=sync status=retrying account={} operation={} attempt={} error={}",
                        self.name, operation, attempt, err
                    );
                    thread::sleep(self.policy.retry_delay());
                    attempt += 1;
                }
                Err(err) => {
                    warn!(
                        "event=store_write module=sync status=error account={} operation={} attempts={} error={}",
                        self.name, operation, attempt, err
                    );
                    return Err(SyncError::store(&self.name, err));
                }
            }
        }
    }

    fn pace(&self) {
        let interval = self.policy.min_interval();
        if interval.is_zero() {
            return;
        }
        if let Some(last) = self.last_write {
            let elapsed = last.elapsed();
            if elapsed < interval {
                thread::sleep(interval - elapsed);
            }
        }
    }
}

fn dry_run_resource_id() -> String {
    format!("dry-run/{}", Uuid::new_v4())
}
