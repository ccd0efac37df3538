//! Run summary.

use serde::Serialize;
use std::fmt::{Display, Formatter};

/// Per-account figures after a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccountReport {
    pub account: String,
    pub groups: usize,
    pub contacts: usize,
    /// Mutating store calls issued for this account.
    pub writes: usize,
}

/// Counters collected across all phases of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub dry_run: bool,
    pub uids_minted: usize,
    pub uids_adopted: usize,
    pub uid_tags_repaired: usize,
    pub groups_renamed: usize,
    pub groups_retagged: usize,
    pub groups_created: usize,
    pub contacts_created: usize,
    pub contacts_updated: usize,
    pub contacts_deleted_private: usize,
    pub contacts_deleted_propagated: usize,
    pub snapshots_saved: bool,
    pub accounts: Vec<AccountReport>,
}

impl SyncReport {
    /// Total mutating store calls across accounts.
    pub fn total_writes(&self) -> usize {
        self.accounts.iter().map(|account| account.writes).sum()
    }
}

impl Display for SyncReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "uids: minted={} adopted={} repaired={}",
            self.uids_minted, self.uids_adopted, self.uid_tags_repaired
        )?;
        writeln!(
            f,
            "groups: renamed={} retagged={} created={}",
            self.groups_renamed, self.groups_retagged, self.groups_created
        )?;
        writeln!(
            f,
            "contacts: created={} updated={} deleted_private={} deleted_propagated={}",
            self.contacts_created,
            self.contacts_updated,
            self.contacts_deleted_private,
            self.contacts_deleted_propagated
        )?;
        for account in &self.accounts {
            writeln!(
                f,
                "account {}: groups={} contacts={} writes={}",
                account.account, account.groups, account.contacts, account.writes
            )?;
        }
        if self.dry_run {
            write!(f, "dry run: no writes issued, snapshots not saved")
        } else {
            write!(f, "snapshots saved: {}", self.snapshots_saved)
        }
    }
}
