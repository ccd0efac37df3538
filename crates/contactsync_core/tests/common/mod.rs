#![allow(dead_code)]

use contactsync_core::store::directory::MY_CONTACTS_RESOURCE_ID;
use contactsync_core::{
    Contact, Group, MemoryDirectory, SqliteSnapshotStore, StoreRegistry, SyncConfig, SyncEngine,
    SyncReport, SyncResult, UidTags, WritePolicy,
};
use rusqlite::Connection;

/// Untagged contact in the built-in group only.
pub fn member(name: &str) -> Contact {
    let mut contact = Contact::named(name);
    contact.memberships = vec![MY_CONTACTS_RESOURCE_ID.to_string()];
    contact
}

/// Contact in the built-in group carrying `uid`.
pub fn tagged(name: &str, uid: &str) -> Contact {
    let mut contact = member(name);
    contact.uid_tags = UidTags::single(uid);
    contact
}

pub fn untagged_group(name: &str) -> Group {
    Group {
        uid_tags: UidTags::new(),
        ..Group::new(name, "")
    }
}

pub fn config(accounts: &[&str]) -> SyncConfig {
    let mut config = SyncConfig::new(accounts.iter().copied());
    config.write_policy = WritePolicy::immediate();
    config
}

/// Runs the engine over shared handles of `accounts`.
pub fn run(
    config: SyncConfig,
    accounts: &[(&str, &MemoryDirectory)],
    conn: &Connection,
) -> SyncResult<SyncReport> {
    let mut registry = StoreRegistry::new();
    for (name, directory) in accounts {
        registry
            .register(name, Box::new((*directory).clone()))
            .unwrap();
    }
    let engine = SyncEngine::new(config)?;
    engine.run(registry, &SqliteSnapshotStore::new(conn))
}

pub fn total_writes(directories: &[&MemoryDirectory]) -> usize {
    directories
        .iter()
        .map(|directory| directory.write_count())
        .sum()
}

/// Primary UID of the first contact named `name`.
pub fn uid_of(directory: &MemoryDirectory, name: &str) -> String {
    directory
        .snapshot()
        .contact_named(name)
        .and_then(|contact| contact.uid().map(str::to_string))
        .unwrap()
}
