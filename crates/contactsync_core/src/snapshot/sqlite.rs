//! SQLite-backed snapshot store.

use crate::snapshot::{Snapshot, SnapshotError, SnapshotResult, SnapshotStore};
use chrono::Utc;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};

/// Snapshot store over a migrated state database connection.
pub struct SqliteSnapshotStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSnapshotStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Epoch milliseconds of the last save for `account`, if any.
    pub fn saved_at(&self, account: &str) -> SnapshotResult<Option<i64>> {
        let saved_at = self
            .conn
            .query_row(
                "SELECT saved_at_ms FROM snapshot_accounts WHERE account = ?1;",
                [account],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(saved_at)
    }
}

impl SnapshotStore for SqliteSnapshotStore<'_> {
    fn load(&self, account: &str) -> SnapshotResult<Snapshot> {
        let mut stmt = self.conn.prepare(
            "SELECT uid, marker
             FROM snapshot_entries
             WHERE account = ?1
             ORDER BY uid ASC;",
        )?;
        let mut rows = stmt.query([account])?;
        let mut snapshot = Snapshot::new();

        while let Some(row) = rows.next()? {
            let uid: String = row.get("uid")?;
            if uid.is_empty() {
                return Err(SnapshotError::InvalidData(format!(
                    "empty uid in snapshot of account `{account}`"
                )));
            }
            snapshot.insert(uid, row.get("marker")?);
        }

        debug!(
            "event=snapshot_load module=snapshot status=ok account={} entries={}",
            account,
            snapshot.len()
        );
        Ok(snapshot)
    }

    fn save(&self, account: &str, snapshot: &Snapshot) -> SnapshotResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO snapshot_accounts (account, saved_at_ms)
             VALUES (?1, ?2)
             ON CONFLICT(account) DO UPDATE SET saved_at_ms = excluded.saved_at_ms;",
            params![account, Utc::now().timestamp_millis()],
        )?;
        tx.execute(
            "DELETE FROM snapshot_entries WHERE account = ?1;",
            [account],
        )?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO snapshot_entries (account, uid, marker) VALUES (?1, ?2, ?3);",
            )?;
            for (uid, marker) in snapshot {
                insert.execute(params![account, uid, marker])?;
            }
        }
        tx.commit()?;

        debug!(
            "event=snapshot_save module=snapshot status=ok account={} entries={}",
            account,
            snapshot.len()
        );
        Ok(())
    }
}
