mod common;

use common::{config, member, run, total_writes, uid_of, untagged_group};
use contactsync_core::db::open_db_in_memory;
use contactsync_core::store::directory::MY_CONTACTS_RESOURCE_ID;
use contactsync_core::{
    ContactValue, MemoryDirectory, SnapshotStore, SqliteSnapshotStore, StoreError, SyncError,
};

#[test]
fn new_contact_replicates_with_remapped_memberships() {
    let conn = open_db_in_memory().unwrap();
    let home = MemoryDirectory::new();
    let work = MemoryDirectory::new();
    let spare = MemoryDirectory::new();
    home.edit(|state| {
        let friends = state.insert_group(untagged_group("Friends"));
        let mut ada = member("Ada Lovelace");
        ada.memberships.push(friends.resource_id);
        ada.emails.push(ContactValue::new("home", "ada@example.com"));
        state.insert_contact(ada);
    });

    let report = run(
        config(&["home", "work", "spare"]),
        &[("home", &home), ("work", &work), ("spare", &spare)],
        &conn,
    )
    .unwrap();

    assert_eq!(report.contacts_created, 2);
    let uid = uid_of(&home, "Ada Lovelace");
    for directory in [&work, &spare] {
        let state = directory.snapshot();
        let copy = state.contact_by_uid(&uid).unwrap();
        let friends = state.group_named("Friends").unwrap();
        assert_eq!(
            copy.memberships,
            vec![MY_CONTACTS_RESOURCE_ID.to_string(), friends.resource_id.clone()]
        );
        assert_eq!(copy.emails[0].value, "ada@example.com");
    }
}

#[test]
fn second_run_without_changes_issues_no_writes() {
    let conn = open_db_in_memory().unwrap();
    let home = MemoryDirectory::new();
    let work = MemoryDirectory::new();
    home.edit(|state| {
        state.insert_group(untagged_group("Friends"));
        state.insert_contact(member("Ada"));
    });
    work.edit(|state| {
        state.insert_contact(member("Grace"));
    });
    let accounts = [("home", &home), ("work", &work)];

    run(config(&["home", "work"]), &accounts, &conn).unwrap();
    let after_first = total_writes(&[&home, &work]);
    assert!(after_first > 0);

    let report = run(config(&["home", "work"]), &accounts, &conn).unwrap();
    assert_eq!(total_writes(&[&home, &work]), after_first);
    assert_eq!(report.total_writes(), 0);
}

#[test]
fn edit_in_one_account_overwrites_other_copies() {
    let conn = open_db_in_memory().unwrap();
    let home = MemoryDirectory::new();
    let work = MemoryDirectory::new();
    home.edit(|state| {
        let mut ada = member("Ada");
        ada.photo_url = Some("https://photos.example/ada".to_string());
        state.insert_contact(ada);
    });
    let accounts = [("home", &home), ("work", &work)];
    run(config(&["home", "work"]), &accounts, &conn).unwrap();

    let uid = uid_of(&home, "Ada");
    let resource_id = work
        .snapshot()
        .contact_by_uid(&uid)
        .and_then(|contact| contact.resource_id.clone())
        .unwrap();
    work.edit(|state| {
        state
            .edit_contact(&resource_id, |contact| {
                contact.phones.push(ContactValue::new("mobile", "+1 555 0100"))
            })
            .unwrap();
    });

    let report = run(config(&["home", "work"]), &accounts, &conn).unwrap();
    assert_eq!(report.contacts_updated, 1);

    let state = home.snapshot();
    let original = state.contact_by_uid(&uid).unwrap();
    assert_eq!(original.phones[0].value, "+1 555 0100");
    assert_eq!(
        original.photo_url.as_deref(),
        Some("https://photos.example/ada")
    );

    let writes = total_writes(&[&home, &work]);
    run(config(&["home", "work"]), &accounts, &conn).unwrap();
    assert_eq!(total_writes(&[&home, &work]), writes);
}

#[test]
fn concurrent_edits_resolve_to_later_account() {
    let conn = open_db_in_memory().unwrap();
    let home = MemoryDirectory::new();
    let work = MemoryDirectory::new();
    home.edit(|state| {
        state.insert_contact(member("Ada"));
    });
    let accounts = [("home", &home), ("work", &work)];
    run(config(&["home", "work"]), &accounts, &conn).unwrap();
    let uid = uid_of(&home, "Ada");

    for (directory, note) in [(&home, "from home"), (&work, "from work")] {
        let resource_id = directory
            .snapshot()
            .contact_by_uid(&uid)
            .and_then(|contact| contact.resource_id.clone())
            .unwrap();
        directory.edit(|state| {
            state
                .edit_contact(&resource_id, |contact| contact.note = Some(note.to_string()))
                .unwrap();
        });
    }

    run(config(&["home", "work"]), &accounts, &conn).unwrap();
    for directory in [&home, &work] {
        let state = directory.snapshot();
        assert_eq!(
            state.contact_by_uid(&uid).unwrap().note.as_deref(),
            Some("from work")
        );
    }
}

#[test]
fn private_membership_deletes_other_copies() {
    let conn = open_db_in_memory().unwrap();
    let home = MemoryDirectory::new();
    let work = MemoryDirectory::new();
    let family_id = home.edit(|state| {
        let family = state.insert_group(untagged_group("Family"));
        state.insert_contact(member("Ada"));
        family.resource_id
    });
    let accounts = [("home", &home), ("work", &work)];
    let private = || config(&["home", "work"]).with_private_group("Family");

    run(private(), &accounts, &conn).unwrap();
    let uid = uid_of(&home, "Ada");
    assert!(work.snapshot().contact_by_uid(&uid).is_some());

    let resource_id = home
        .snapshot()
        .contact_by_uid(&uid)
        .and_then(|contact| contact.resource_id.clone())
        .unwrap();
    home.edit(|state| {
        state
            .edit_contact(&resource_id, |contact| {
                contact.memberships.push(family_id.clone())
            })
            .unwrap();
    });

    let report = run(private(), &accounts, &conn).unwrap();
    assert_eq!(report.contacts_deleted_private, 1);
    assert!(work.snapshot().contact_by_uid(&uid).is_none());
    assert!(home.snapshot().contact_by_uid(&uid).is_some());

    let snapshots = SqliteSnapshotStore::new(&conn);
    assert!(!snapshots.load("work").unwrap().contains_key(&uid));
    assert!(snapshots.load("home").unwrap().contains_key(&uid));

    let writes = total_writes(&[&home, &work]);
    run(private(), &accounts, &conn).unwrap();
    assert_eq!(total_writes(&[&home, &work]), writes);
}

#[test]
fn private_contact_is_never_replicated() {
    let conn = open_db_in_memory().unwrap();
    let home = MemoryDirectory::new();
    let work = MemoryDirectory::new();
    home.edit(|state| {
        let family = state.insert_group(untagged_group("Family"));
        let mut ada = member("Ada");
        ada.memberships.push(family.resource_id);
        state.insert_contact(ada);
    });

    let report = run(
        config(&["home", "work"]).with_private_group("Family"),
        &[("home", &home), ("work", &work)],
        &conn,
    )
    .unwrap();

    assert_eq!(report.contacts_created, 0);
    assert!(work.snapshot().contact_named("Ada").is_none());
    assert!(work.snapshot().group_named("Family").is_some());
}

#[test]
fn deletion_propagates_to_every_account() {
    let conn = open_db_in_memory().unwrap();
    let home = MemoryDirectory::new();
    let work = MemoryDirectory::new();
    let spare = MemoryDirectory::new();
    home.edit(|state| {
        state.insert_contact(member("Ada"));
    });
    let accounts = [("home", &home), ("work", &work), ("spare", &spare)];
    let names = ["home", "work", "spare"];
    run(config(&names), &accounts, &conn).unwrap();
    let uid = uid_of(&home, "Ada");

    let resource_id = home
        .snapshot()
        .contact_by_uid(&uid)
        .and_then(|contact| contact.resource_id.clone())
        .unwrap();
    home.edit(|state| state.remove_contact(&resource_id).unwrap());

    let report = run(config(&names), &accounts, &conn).unwrap();
    assert_eq!(report.contacts_deleted_propagated, 2);
    for directory in [&home, &work, &spare] {
        assert!(directory.snapshot().contact_by_uid(&uid).is_none());
    }
    let snapshots = SqliteSnapshotStore::new(&conn);
    for name in names {
        assert!(!snapshots.load(name).unwrap().contains_key(&uid));
    }

    let writes = total_writes(&[&home, &work, &spare]);
    run(config(&names), &accounts, &conn).unwrap();
    assert_eq!(total_writes(&[&home, &work, &spare]), writes);
}

#[test]
fn concurrent_edit_recreates_deleted_copy() {
    let conn = open_db_in_memory().unwrap();
    let home = MemoryDirectory::new();
    let work = MemoryDirectory::new();
    home.edit(|state| {
        state.insert_contact(member("Ada"));
    });
    let accounts = [("home", &home), ("work", &work)];
    run(config(&["home", "work"]), &accounts, &conn).unwrap();
    let uid = uid_of(&home, "Ada");

    let home_id = home
        .snapshot()
        .contact_by_uid(&uid)
        .and_then(|contact| contact.resource_id.clone())
        .unwrap();
    let work_id = work
        .snapshot()
        .contact_by_uid(&uid)
        .and_then(|contact| contact.resource_id.clone())
        .unwrap();
    home.edit(|state| state.remove_contact(&home_id).unwrap());
    work.edit(|state| {
        state
            .edit_contact(&work_id, |contact| contact.note = Some("edited".to_string()))
            .unwrap();
    });

    let report = run(config(&["home", "work"]), &accounts, &conn).unwrap();
    assert_eq!(report.contacts_created, 1);
    assert_eq!(report.contacts_deleted_propagated, 0);
    for directory in [&home, &work] {
        let state = directory.snapshot();
        let copy = state.contact_by_uid(&uid).unwrap();
        assert_eq!(copy.note.as_deref(), Some("edited"));
    }
    let snapshots = SqliteSnapshotStore::new(&conn);
    assert!(snapshots.load("home").unwrap().contains_key(&uid));

    let writes = total_writes(&[&home, &work]);
    run(config(&["home", "work"]), &accounts, &conn).unwrap();
    assert_eq!(total_writes(&[&home, &work]), writes);
}

#[test]
fn deletion_propagates_when_no_copy_was_edited() {
    let conn = open_db_in_memory().unwrap();
    let home = MemoryDirectory::new();
    let work = MemoryDirectory::new();
    work.edit(|state| {
        state.insert_contact(member("Ada"));
    });
    let accounts = [("home", &home), ("work", &work)];
    run(config(&["home", "work"]), &accounts, &conn).unwrap();
    let uid = uid_of(&work, "Ada");

    let home_id = home
        .snapshot()
        .contact_by_uid(&uid)
        .and_then(|contact| contact.resource_id.clone())
        .unwrap();
    home.edit(|state| state.remove_contact(&home_id).unwrap());

    let report = run(config(&["home", "work"]), &accounts, &conn).unwrap();
    assert_eq!(report.contacts_created, 0);
    assert_eq!(report.contacts_deleted_propagated, 1);
    assert!(work.snapshot().contact_by_uid(&uid).is_none());
}

#[test]
fn dry_run_issues_no_writes_and_saves_no_snapshot() {
    let conn = open_db_in_memory().unwrap();
    let home = MemoryDirectory::new();
    let work = MemoryDirectory::new();
    home.edit(|state| {
        state.insert_group(untagged_group("Friends"));
        state.insert_contact(member("Ada"));
    });
    let mut dry = config(&["home", "work"]);
    dry.dry_run = true;

    let report = run(dry, &[("home", &home), ("work", &work)], &conn).unwrap();

    assert!(report.dry_run);
    assert!(!report.snapshots_saved);
    assert_eq!(report.contacts_created, 1);
    assert_eq!(report.groups_created, 1);
    assert_eq!(total_writes(&[&home, &work]), 0);
    assert!(work.snapshot().contact_named("Ada").is_none());
    assert!(home.snapshot().contact_named("Ada").unwrap().uid().is_none());
    assert_eq!(
        SqliteSnapshotStore::new(&conn).saved_at("home").unwrap(),
        None
    );
}

#[test]
fn transient_write_failures_are_retried() {
    let conn = open_db_in_memory().unwrap();
    let home = MemoryDirectory::new();
    let work = MemoryDirectory::new();
    home.edit(|state| {
        state.insert_contact(member("Ada"));
    });
    work.fail_next_writes(2);

    let report = run(
        config(&["home", "work"]),
        &[("home", &home), ("work", &work)],
        &conn,
    )
    .unwrap();

    assert_eq!(report.contacts_created, 1);
    assert!(work.snapshot().contact_named("Ada").is_some());
}

#[test]
fn unauthorized_account_aborts_before_any_write() {
    let conn = open_db_in_memory().unwrap();
    let home = MemoryDirectory::new();
    let work = MemoryDirectory::new();
    home.edit(|state| {
        state.insert_contact(member("Ada"));
    });
    work.revoke_access();

    let err = run(
        config(&["home", "work"]),
        &[("home", &home), ("work", &work)],
        &conn,
    )
    .unwrap_err();

    match err {
        SyncError::Store { account, source } => {
            assert_eq!(account, "work");
            assert!(matches!(source, StoreError::Unauthorized(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(home.write_count(), 0);
    assert_eq!(
        SqliteSnapshotStore::new(&conn).saved_at("home").unwrap(),
        None
    );
}

#[test]
fn ineligible_contacts_are_never_touched() {
    let conn = open_db_in_memory().unwrap();
    let home = MemoryDirectory::new();
    let work = MemoryDirectory::new();
    home.edit(|state| {
        state.insert_contact(contactsync_core::Contact::named("No Groups"));
        let mut nameless = member("");
        nameless.name = None;
        state.insert_contact(nameless);
    });
    let before = home.snapshot();

    let report = run(
        config(&["home", "work"]),
        &[("home", &home), ("work", &work)],
        &conn,
    )
    .unwrap();

    assert_eq!(report.contacts_created, 0);
    assert_eq!(report.uids_minted, 0);
    assert_eq!(home.snapshot().contacts(), before.contacts());
    assert!(work.snapshot().contacts().is_empty());
}

#[test]
fn single_account_is_tagged_and_snapshotted() {
    let conn = open_db_in_memory().unwrap();
    let home = MemoryDirectory::new();
    home.edit(|state| {
        state.insert_contact(member("Ada"));
    });

    let report = run(config(&["home"]), &[("home", &home)], &conn).unwrap();

    assert_eq!(report.uids_minted, 1);
    assert_eq!(report.contacts_created, 0);
    let uid = uid_of(&home, "Ada");
    let saved = SqliteSnapshotStore::new(&conn).load("home").unwrap();
    assert!(saved.contains_key(&uid));
}
