//! Contact reconciliation.
//!
//! # Responsibility
//! - Classify every (UID, account) pair against the prior snapshot.
//! - Enforce privacy, replicate creates and edits, then propagate deletions.
//!
//! # Invariants
//! - Deletions are detected after replication, against each account's
//!   current holdings; a copy dropped for privacy is not a deletion.
//! - Each UID is resolved once per run with at most one source account.
//! - Memberships are always remapped into the target account's groups.
//! - No write is issued when the target already carries the source payload.

use crate::model::contact::REPLICATED_FIELDS;
use crate::model::marker::is_newer;
use crate::model::uid::Uid;
use crate::snapshot::Snapshot;
use crate::sync::account::Account;
use crate::sync::membership::{remap_memberships, GroupTable};
use crate::sync::report::SyncReport;
use crate::sync::SyncResult;
use log::{debug, info, warn};
use std::collections::HashSet;

/// Change state of one contact copy relative to its account's prior snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactState {
    /// Not recorded in the prior snapshot.
    New,
    /// Recorded, and the current marker is strictly newer.
    Modified,
    Unchanged,
}

impl ContactState {
    pub fn classify(prior: Option<&str>, current: Option<&str>) -> Self {
        match prior {
            None => Self::New,
            Some(prior) if is_newer(current, Some(prior)) => Self::Modified,
            Some(_) => Self::Unchanged,
        }
    }
}

/// Resolves every contact UID across `accounts`.
///
/// `priors[i]`, `tables[i]` belong to `accounts[i]`. Replication and privacy
/// run first; deletions are then detected against each account's state after
/// replication, so an edit made elsewhere re-creates a deleted copy.
pub fn reconcile_contacts(
    accounts: &mut [Account],
    priors: &[Snapshot],
    tables: &[GroupTable],
    private_uids: &HashSet<Uid>,
    report: &mut SyncReport,
) -> SyncResult<()> {
    let mut baselines = priors.to_vec();
    for uid in uids_in_order(accounts) {
        let holders: Vec<usize> = (0..accounts.len())
            .filter(|index| accounts[*index].holds(&uid))
            .collect();
        let private_in = holders.iter().copied().find(|index| {
            accounts[*index]
                .contact(&uid)
                .is_some_and(|contact| tables[*index].is_private(contact, private_uids))
        });
        if let Some(keeper) = private_in {
            enforce_privacy(accounts, &mut baselines, &uid, keeper, report)?;
            continue;
        }

        replicate(accounts, priors, tables, &uid, &holders, report)?;
    }

    propagate_deletions(accounts, &baselines, report)?;

    info!(
        "event=contact_reconcile module=sync status=ok created={} updated={} deleted_private={} deleted_propagated={}",
        report.contacts_created,
        report.contacts_updated,
        report.contacts_deleted_private,
        report.contacts_deleted_propagated
    );
    Ok(())
}

/// Deletes, everywhere else, each UID an account recorded but no longer holds.
fn propagate_deletions(
    accounts: &mut [Account],
    baselines: &[Snapshot],
    report: &mut SyncReport,
) -> SyncResult<()> {
    for (deleted_by, baseline) in baselines.iter().enumerate() {
        let gone: Vec<Uid> = baseline
            .keys()
            .filter(|uid| !accounts[deleted_by].holds(uid))
            .cloned()
            .collect();
        for uid in gone {
            propagate_deletion(accounts, &uid, deleted_by, report)?;
        }
    }
    Ok(())
}

/// Every held UID, accounts in configured order, first appearance kept.
fn uids_in_order(accounts: &[Account]) -> Vec<Uid> {
    let mut seen = HashSet::new();
    let mut order = Vec::new();
    for account in accounts {
        for uid in account.contacts().keys() {
            if seen.insert(uid.clone()) {
                order.push(uid.clone());
            }
        }
    }
    order
}

fn propagate_deletion(
    accounts: &mut [Account],
    uid: &str,
    deleted_by: usize,
    report: &mut SyncReport,
) -> SyncResult<()> {
    let origin = accounts[deleted_by].name().to_string();
    for (index, account) in accounts.iter_mut().enumerate() {
        if index == deleted_by {
            continue;
        }
        if account.delete_contact(uid)? {
            info!(
                "event=contact_delete module=sync status=ok reason=deleted account={} uid={} deleted_in={}",
                account.name(),
                uid,
                origin
            );
            report.contacts_deleted_propagated += 1;
        }
    }
    Ok(())
}

fn enforce_privacy(
    accounts: &mut [Account],
    baselines: &mut [Snapshot],
    uid: &str,
    keeper: usize,
    report: &mut SyncReport,
) -> SyncResult<()> {
    let private_in = accounts[keeper].name().to_string();
    for (index, account) in accounts.iter_mut().enumerate() {
        if index == keeper {
            continue;
        }
        if account.delete_contact(uid)? {
            info!(
                "event=contact_delete module=sync status=ok reason=private account={} uid={} private_in={}",
                account.name(),
                uid,
                private_in
            );
            baselines[index].remove(uid);
            report.contacts_deleted_private += 1;
        }
    }
    Ok(())
}

fn replicate(
    accounts: &mut [Account],
    priors: &[Snapshot],
    tables: &[GroupTable],
    uid: &str,
    holders: &[usize],
    report: &mut SyncReport,
) -> SyncResult<()> {
    let Some(&first_holder) = holders.first() else {
        return Ok(());
    };
    let modified_in = holders.iter().rev().copied().find(|index| {
        let current = accounts[*index]
            .contact(uid)
            .and_then(|contact| contact.updated.as_deref());
        let prior = priors[*index].get(uid).map(String::as_str);
        ContactState::classify(prior, current) == ContactState::Modified
    });
    let source_index = modified_in.unwrap_or(first_holder);
    let Some(source) = accounts[source_index].contact(uid).cloned() else {
        return Ok(());
    };
    let group_uids = tables[source_index].membership_uids(&source);
    let source_name = accounts[source_index].name().to_string();

    for (index, account) in accounts.iter_mut().enumerate() {
        if index == source_index {
            continue;
        }
        let memberships = remap_memberships(&group_uids, &tables[index]);
        match account.contact(uid).cloned() {
            Some(mut target) => {
                if modified_in.is_none() {
                    continue;
                }
                if memberships.is_empty() {
                    warn!(
                        "event=contact_update module=sync status=skipped reason=no_groups account={} uid={}",
                        account.name(),
                        uid
                    );
                    continue;
                }
                if !target.overwrite_from(&source, memberships) {
                    debug!(
                        "event=contact_update module=sync status=noop account={} uid={}",
                        account.name(),
                        uid
                    );
                    continue;
                }
                info!(
                    "event=contact_update module=sync status=ok account={} uid={} from_account={}",
                    account.name(),
                    uid,
                    source_name
                );
                account.update_contact(target, REPLICATED_FIELDS)?;
                report.contacts_updated += 1;
            }
            None => {
                if modified_in.is_none() && priors[index].contains_key(uid) {
                    continue;
                }
                if memberships.is_empty() {
                    warn!(
                        "event=contact_create module=sync status=skipped reason=no_groups account={} uid={}",
                        account.name(),
                        uid
                    );
                    continue;
                }
                info!(
                    "event=contact_create module=sync status=ok account={} uid={} from_account={}",
                    account.name(),
                    uid,
                    source_name
                );
                account.create_contact(source.replica(memberships))?;
                report.contacts_created += 1;
            }
        }
    }
    Ok(())
}
