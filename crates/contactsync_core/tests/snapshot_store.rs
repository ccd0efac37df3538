use contactsync_core::db::open_db_in_memory;
use contactsync_core::{Snapshot, SnapshotError, SnapshotStore, SqliteSnapshotStore};

fn snapshot(entries: &[(&str, &str)]) -> Snapshot {
    entries
        .iter()
        .map(|(uid, marker)| (uid.to_string(), marker.to_string()))
        .collect()
}

#[test]
fn never_saved_account_loads_empty() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteSnapshotStore::new(&conn);

    assert!(store.load("home").unwrap().is_empty());
    assert_eq!(store.saved_at("home").unwrap(), None);
}

#[test]
fn save_replaces_previous_entries() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteSnapshotStore::new(&conn);

    store
        .save("home", &snapshot(&[("u1", "2024-01-01"), ("u2", "2024-01-02")]))
        .unwrap();
    store.save("home", &snapshot(&[("u2", "2024-02-02")])).unwrap();

    assert_eq!(store.load("home").unwrap(), snapshot(&[("u2", "2024-02-02")]));
    assert!(store.saved_at("home").unwrap().is_some());
}

#[test]
fn accounts_are_isolated() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteSnapshotStore::new(&conn);

    store.save("home", &snapshot(&[("u1", "m1")])).unwrap();
    store.save("work", &snapshot(&[("u9", "m9")])).unwrap();
    store.save("home", &Snapshot::new()).unwrap();

    assert!(store.load("home").unwrap().is_empty());
    assert_eq!(store.load("work").unwrap(), snapshot(&[("u9", "m9")]));
}

#[test]
fn file_backed_snapshot_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.db");

    {
        let conn = contactsync_core::open_db(&path).unwrap();
        SqliteSnapshotStore::new(&conn)
            .save("home", &snapshot(&[("u1", "m1")]))
            .unwrap();
    }

    let conn = contactsync_core::open_db(&path).unwrap();
    let loaded = SqliteSnapshotStore::new(&conn).load("home").unwrap();
    assert_eq!(loaded, snapshot(&[("u1", "m1")]));
}

#[test]
fn empty_uid_row_is_invalid_data() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO snapshot_accounts (account, saved_at_ms) VALUES ('home', 0);
         INSERT INTO snapshot_entries (account, uid, marker) VALUES ('home', '', 'm');",
    )
    .unwrap();

    let err = SqliteSnapshotStore::new(&conn).load("home").unwrap_err();
    assert!(matches!(err, SnapshotError::InvalidData(_)));
}
