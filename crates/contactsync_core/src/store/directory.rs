//! Local directory backends for the account store contract.
//!
//! # Responsibility
//! - Emulate remote directory semantics in memory: resource identifier
//!   assignment, concurrency tokens, modification markers, system groups.
//! - Persist one account's directory as a JSON file for CLI use.
//! - Offer a shared, instrumented handle for tests.
//!
//! # Invariants
//! - Markers strictly increase within one directory and track wall-clock
//!   time, so markers from different directories compare by recency.
//! - Updates require the current concurrency token.
//! - Externally sourced values are rejected on write.

use crate::model::contact::{Contact, ContactField};
use crate::model::group::{Group, GroupField};
use crate::store::{AccountStore, StoreError, StoreResult};
use chrono::{DateTime, SecondsFormat, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Resource identifier of the built-in "all contacts" group.
pub const MY_CONTACTS_RESOURCE_ID: &str = "contactGroups/myContacts";
/// Display name of the built-in "all contacts" group.
pub const MY_CONTACTS_NAME: &str = "myContacts";

const GROUP_RESOURCE_PREFIX: &str = "contactGroups/";
const CONTACT_RESOURCE_PREFIX: &str = "people/";

/// Serializable contents of one account directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryState {
    /// Last issued marker, in epoch microseconds.
    clock_micros: i64,
    /// Last issued resource number.
    next_id: u64,
    groups: Vec<Group>,
    contacts: Vec<Contact>,
}

impl Default for DirectoryState {
    fn default() -> Self {
        Self {
            clock_micros: 0,
            next_id: 0,
            groups: vec![Group::system(MY_CONTACTS_NAME, MY_CONTACTS_RESOURCE_ID)],
            contacts: Vec::new(),
        }
    }
}

impl DirectoryState {
    /// Creates a directory holding only the built-in groups.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// All stored contacts, including ineligible ones.
    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn group_named(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|group| group.name == name)
    }

    pub fn contact_named(&self, name: &str) -> Option<&Contact> {
        self.contacts
            .iter()
            .find(|contact| contact.print_name() == Some(name))
    }

    pub fn contact_by_uid(&self, uid: &str) -> Option<&Contact> {
        self.contacts
            .iter()
            .find(|contact| contact.uid_tags.contains(uid))
    }

    /// Stores a group the way a user editing this account directly would.
    pub fn insert_group(&mut self, group: Group) -> Group {
        let mut stored = group;
        stored.resource_id = self.next_resource_id(GROUP_RESOURCE_PREFIX);
        stored.updated = Some(self.tick());
        self.groups.push(stored.clone());
        stored
    }

    /// Stores a contact the way a user editing this account directly would.
    pub fn insert_contact(&mut self, contact: Contact) -> Contact {
        let mut stored = contact;
        stored.resource_id = Some(self.next_resource_id(CONTACT_RESOURCE_PREFIX));
        stored.etag = Some(self.tick());
        stored.updated = stored.etag.clone();
        self.contacts.push(stored.clone());
        stored
    }

    /// Applies a direct user edit to a contact and bumps its marker.
    pub fn edit_contact(
        &mut self,
        resource_id: &str,
        edit: impl FnOnce(&mut Contact),
    ) -> StoreResult<Contact> {
        let marker = self.tick();
        let contact = self.contact_mut(resource_id)?;
        edit(contact);
        contact.etag = Some(marker.clone());
        contact.updated = Some(marker);
        Ok(contact.clone())
    }

    /// Applies a direct user rename to a group and bumps its marker.
    pub fn rename_group(&mut self, resource_id: &str, name: &str) -> StoreResult<Group> {
        let marker = self.tick();
        let group = self.group_mut(resource_id)?;
        group.name = name.to_string();
        group.updated = Some(marker);
        Ok(group.clone())
    }

    /// Deletes a contact the way a user editing this account directly would.
    pub fn remove_contact(&mut self, resource_id: &str) -> StoreResult<Contact> {
        let index = self
            .contacts
            .iter()
            .position(|contact| contact.resource_id.as_deref() == Some(resource_id))
            .ok_or_else(|| StoreError::NotFound(resource_id.to_string()))?;
        Ok(self.contacts.remove(index))
    }

    fn tick(&mut self) -> String {
        let now = Utc::now().timestamp_micros();
        self.clock_micros = now.max(self.clock_micros.saturating_add(1));
        DateTime::from_timestamp_micros(self.clock_micros)
            .map(|at| at.to_rfc3339_opts(SecondsFormat::Micros, true))
            .unwrap_or_else(|| self.clock_micros.to_string())
    }

    fn next_resource_id(&mut self, prefix: &str) -> String {
        self.next_id = self.next_id.saturating_add(1);
        format!("{prefix}{}", self.next_id)
    }

    fn group_mut(&mut self, resource_id: &str) -> StoreResult<&mut Group> {
        self.groups
            .iter_mut()
            .find(|group| group.resource_id == resource_id)
            .ok_or_else(|| StoreError::NotFound(resource_id.to_string()))
    }

    fn contact_mut(&mut self, resource_id: &str) -> StoreResult<&mut Contact> {
        self.contacts
            .iter_mut()
            .find(|contact| contact.resource_id.as_deref() == Some(resource_id))
            .ok_or_else(|| StoreError::NotFound(resource_id.to_string()))
    }
}

impl AccountStore for DirectoryState {
    fn list_groups(&mut self) -> StoreResult<Vec<Group>> {
        Ok(self.groups.clone())
    }

    fn list_contacts(&mut self) -> StoreResult<Vec<Contact>> {
        Ok(self
            .contacts
            .iter()
            .filter(|contact| contact.is_eligible())
            .cloned()
            .collect())
    }

    fn create_group(&mut self, group: &Group) -> StoreResult<Group> {
        if group.system {
            return Err(StoreError::Rejected(format!(
                "cannot create system group `{}`",
                group.name
            )));
        }
        Ok(self.insert_group(group.clone()))
    }

    fn update_group(&mut self, group: &Group, fields: &[GroupField]) -> StoreResult<Group> {
        let marker = self.tick();
        let stored = self.group_mut(&group.resource_id)?;
        if stored.system {
            return Err(StoreError::SystemGroupImmutable(group.resource_id.clone()));
        }
        for field in fields {
            match field {
                GroupField::Name => stored.name = group.name.clone(),
                GroupField::UidTags => stored.uid_tags = group.uid_tags.clone(),
            }
        }
        stored.updated = Some(marker);
        Ok(stored.clone())
    }

    fn create_contact(&mut self, contact: &Contact) -> StoreResult<Contact> {
        ensure_writable(contact)?;
        let mut fresh = contact.clone();
        fresh.photo_url = None;
        Ok(self.insert_contact(fresh))
    }

    fn update_contact(
        &mut self,
        contact: &Contact,
        fields: &[ContactField],
    ) -> StoreResult<Contact> {
        let resource_id = contact
            .resource_id
            .clone()
            .ok_or_else(|| StoreError::Rejected("update without resource id".to_string()))?;
        ensure_writable(contact)?;
        let marker = self.tick();
        let stored = self.contact_mut(&resource_id)?;
        if stored.etag != contact.etag {
            return Err(StoreError::Rejected(format!(
                "stale etag for {resource_id}"
            )));
        }
        for field in fields {
            match field {
                ContactField::Names => stored.name = contact.name.clone(),
                ContactField::Organizations => stored.organization = contact.organization.clone(),
                ContactField::EmailAddresses => stored.emails = contact.emails.clone(),
                ContactField::PhoneNumbers => stored.phones = contact.phones.clone(),
                ContactField::Addresses => stored.addresses = contact.addresses.clone(),
                ContactField::Biographies => stored.note = contact.note.clone(),
                ContactField::Memberships => stored.memberships = contact.memberships.clone(),
                ContactField::UidTags => stored.uid_tags = contact.uid_tags.clone(),
            }
        }
        stored.etag = Some(marker.clone());
        stored.updated = Some(marker);
        Ok(stored.clone())
    }

    fn delete_contact(&mut self, contact: &Contact) -> StoreResult<()> {
        let resource_id = contact
            .resource_id
            .as_deref()
            .ok_or_else(|| StoreError::Rejected("delete without resource id".to_string()))?;
        self.remove_contact(resource_id).map(|_| ())
    }
}

fn ensure_writable(contact: &Contact) -> StoreResult<()> {
    let read_only = contact
        .emails
        .iter()
        .chain(contact.phones.iter())
        .chain(contact.addresses.iter())
        .find(|value| !value.is_writable());
    match read_only {
        Some(value) => Err(StoreError::Rejected(format!(
            "field `{}` is sourced outside the contact and cannot be written",
            value.label
        ))),
        None => Ok(()),
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    state: DirectoryState,
    writes: usize,
    revoked: bool,
    failing_writes: u32,
}

/// Shared in-memory directory handle.
///
/// Clones share one directory, so a test can hand one clone to the engine and
/// inspect the other afterwards. Single-threaded by construction.
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    inner: Rc<RefCell<MemoryInner>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a handle over existing directory contents.
    pub fn from_state(state: DirectoryState) -> Self {
        Self {
            inner: Rc::new(RefCell::new(MemoryInner {
                state,
                ..MemoryInner::default()
            })),
        }
    }

    /// Copy of the current directory contents.
    pub fn snapshot(&self) -> DirectoryState {
        self.inner.borrow().state.clone()
    }

    /// Runs `f` against the directory as a direct user edit.
    ///
    /// Edits made here are not counted as store writes.
    pub fn edit<T>(&self, f: impl FnOnce(&mut DirectoryState) -> T) -> T {
        f(&mut self.inner.borrow_mut().state)
    }

    /// Number of successful mutating calls made through `AccountStore`.
    pub fn write_count(&self) -> usize {
        self.inner.borrow().writes
    }

    /// Makes every subsequent call fail with `Unauthorized`.
    pub fn revoke_access(&self) {
        self.inner.borrow_mut().revoked = true;
    }

    /// Makes the next `count` mutating calls fail with `Transient`.
    pub fn fail_next_writes(&self, count: u32) {
        self.inner.borrow_mut().failing_writes = count;
    }

    fn read<T>(
        &mut self,
        call: impl FnOnce(&mut DirectoryState) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut inner = self.inner.borrow_mut();
        if inner.revoked {
            return Err(StoreError::Unauthorized("access revoked".to_string()));
        }
        call(&mut inner.state)
    }

    fn write<T>(
        &mut self,
        call: impl FnOnce(&mut DirectoryState) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut inner = self.inner.borrow_mut();
        if inner.revoked {
            return Err(StoreError::Unauthorized("access revoked".to_string()));
        }
        if inner.failing_writes > 0 {
            inner.failing_writes -= 1;
            return Err(StoreError::Transient("injected failure".to_string()));
        }
        let result = call(&mut inner.state)?;
        inner.writes += 1;
        Ok(result)
    }
}

impl AccountStore for MemoryDirectory {
    fn list_groups(&mut self) -> StoreResult<Vec<Group>> {
        self.read(|state| state.list_groups())
    }

    fn list_contacts(&mut self) -> StoreResult<Vec<Contact>> {
        self.read(|state| state.list_contacts())
    }

    fn create_group(&mut self, group: &Group) -> StoreResult<Group> {
        self.write(|state| state.create_group(group))
    }

    fn update_group(&mut self, group: &Group, fields: &[GroupField]) -> StoreResult<Group> {
        self.write(|state| state.update_group(group, fields))
    }

    fn create_contact(&mut self, contact: &Contact) -> StoreResult<Contact> {
        self.write(|state| state.create_contact(contact))
    }

    fn update_contact(
        &mut self,
        contact: &Contact,
        fields: &[ContactField],
    ) -> StoreResult<Contact> {
        self.write(|state| state.update_contact(contact, fields))
    }

    fn delete_contact(&mut self, contact: &Contact) -> StoreResult<()> {
        self.write(|state| state.delete_contact(contact))
    }
}

/// Directory persisted as a JSON file, rewritten after every mutating call.
#[derive(Debug)]
pub struct FileDirectory {
    path: PathBuf,
    state: DirectoryState,
}

impl FileDirectory {
    /// Opens an existing directory file.
    ///
    /// # Errors
    /// - `Unavailable` when the file does not exist.
    /// - `Io`/`Json` when it cannot be read or parsed.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(StoreError::Unavailable(format!(
                "directory file `{}` does not exist",
                path.display()
            )));
        }
        let raw = std::fs::read_to_string(&path)?;
        let state = serde_json::from_str(&raw)?;
        debug!(
            "event=directory_open module=store status=ok path={}",
            path.display()
        );
        Ok(Self { path, state })
    }

    /// Creates a new directory file holding only built-in groups.
    ///
    /// # Errors
    /// - `Rejected` when the file already exists.
    pub fn create(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            return Err(StoreError::Rejected(format!(
                "directory file `{}` already exists",
                path.display()
            )));
        }
        let directory = Self {
            path,
            state: DirectoryState::new(),
        };
        directory.persist()?;
        Ok(directory)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> &DirectoryState {
        &self.state
    }

    fn persist(&self) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let staging = self.path.with_extension("json.tmp");
        std::fs::write(&staging, serde_json::to_string_pretty(&self.state)?)?;
        std::fs::rename(&staging, &self.path)?;
        Ok(())
    }

    fn write<T>(
        &mut self,
        call: impl FnOnce(&mut DirectoryState) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let result = call(&mut self.state)?;
        self.persist()?;
        Ok(result)
    }
}

impl AccountStore for FileDirectory {
    fn list_groups(&mut self) -> StoreResult<Vec<Group>> {
        self.state.list_groups()
    }

    fn list_contacts(&mut self) -> StoreResult<Vec<Contact>> {
        self.state.list_contacts()
    }

    fn create_group(&mut self, group: &Group) -> StoreResult<Group> {
        self.write(|state| state.create_group(group))
    }

    fn update_group(&mut self, group: &Group, fields: &[GroupField]) -> StoreResult<Group> {
        self.write(|state| state.update_group(group, fields))
    }

    fn create_contact(&mut self, contact: &Contact) -> StoreResult<Contact> {
        self.write(|state| state.create_contact(contact))
    }

    fn update_contact(
        &mut self,
        contact: &Contact,
        fields: &[ContactField],
    ) -> StoreResult<Contact> {
        self.write(|state| state.update_contact(contact, fields))
    }

    fn delete_contact(&mut self, contact: &Contact) -> StoreResult<()> {
        self.write(|state| state.delete_contact(contact))
    }
}
