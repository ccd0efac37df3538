//! Group reconciliation.
//!
//! # Responsibility
//! - Converge every logical group to one UID and one name across accounts.
//! - Create missing groups so memberships can be remapped everywhere.
//!
//! # Invariants
//! - Passes run in order, each over all accounts in configured order.
//! - System groups are never renamed or re-tagged.
//! - After `reconcile_groups`, every account holds one group per bucketed
//!   name, all sharing one UID.

use crate::model::group::{Group, GroupField};
use crate::model::marker::is_newer;
use crate::model::uid::{new_uid, Uid};
use crate::sync::account::Account;
use crate::sync::membership::GroupTable;
use crate::sync::report::SyncReport;
use crate::sync::{SyncError, SyncResult};
use log::{info, warn};
use std::collections::HashMap;

struct CanonicalName {
    name: String,
    updated: Option<String>,
}

struct NameBucket {
    name: String,
    slots: Vec<Option<usize>>,
}

/// Runs the four group passes over `accounts`.
pub fn reconcile_groups(accounts: &mut [Account], report: &mut SyncReport) -> SyncResult<()> {
    let (canonical, order) = collect_canonical_names(accounts);
    propagate_renames(accounts, &canonical, report)?;

    let mut uid_by_name: HashMap<String, Uid> = HashMap::new();
    for uid in &order {
        if let Some(entry) = canonical.get(uid) {
            uid_by_name
                .entry(entry.name.clone())
                .or_insert_with(|| uid.clone());
        }
    }

    let buckets = bucket_by_name(accounts);
    merge_buckets(accounts, &buckets, &uid_by_name, report)?;

    info!(
        "event=group_reconcile module=sync status=ok renamed={} retagged={} created={}",
        report.groups_renamed, report.groups_retagged, report.groups_created
    );
    Ok(())
}

/// Builds the per-account lookup tables used by contact reconciliation.
pub fn build_group_tables(accounts: &[Account]) -> Vec<GroupTable> {
    accounts
        .iter()
        .map(|account| GroupTable::from_groups(account.groups()))
        .collect()
}

/// Pass 1: UID to the most recently modified name, plus first-seen UID order.
fn collect_canonical_names(accounts: &[Account]) -> (HashMap<Uid, CanonicalName>, Vec<Uid>) {
    let mut canonical: HashMap<Uid, CanonicalName> = HashMap::new();
    let mut order = Vec::new();
    for account in accounts {
        for group in account.groups() {
            let Some(uid) = group.uid() else {
                continue;
            };
            match canonical.get_mut(uid) {
                Some(entry) => {
                    if is_newer(group.updated.as_deref(), entry.updated.as_deref()) {
                        entry.name = group.name.clone();
                        entry.updated = group.updated.clone();
                    }
                }
                None => {
                    canonical.insert(
                        uid.to_string(),
                        CanonicalName {
                            name: group.name.clone(),
                            updated: group.updated.clone(),
                        },
                    );
                    order.push(uid.to_string());
                }
            }
        }
    }
    (canonical, order)
}

/// Pass 2: rename tagged user groups to their canonical name.
fn propagate_renames(
    accounts: &mut [Account],
    canonical: &HashMap<Uid, CanonicalName>,
    report: &mut SyncReport,
) -> SyncResult<()> {
    for account in accounts.iter_mut() {
        for index in 0..account.groups().len() {
            let group = &account.groups()[index];
            if group.system {
                continue;
            }
            let Some(entry) = group.uid().and_then(|uid| canonical.get(uid)) else {
                continue;
            };
            if entry.name == group.name {
                continue;
            }
            let mut renamed = group.clone();
            renamed.name = entry.name.clone();
            info!(
                "event=group_rename module=sync status=ok account={} group_uid={} from={} to={}",
                account.name(),
                renamed.uid().unwrap_or(""),
                group.name,
                renamed.name
            );
            account.update_group(index, renamed, &[GroupField::Name])?;
            report.groups_renamed += 1;
        }
    }
    Ok(())
}

/// Pass 3: one slot per account for every distinct group name.
fn bucket_by_name(accounts: &[Account]) -> Vec<NameBucket> {
    let mut buckets: Vec<NameBucket> = Vec::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();
    for (account_index, account) in accounts.iter().enumerate() {
        for (group_index, group) in account.groups().iter().enumerate() {
            let bucket_index = *by_name.entry(group.name.clone()).or_insert_with(|| {
                buckets.push(NameBucket {
                    name: group.name.clone(),
                    slots: vec![None; accounts.len()],
                });
                buckets.len() - 1
            });
            let slot = &mut buckets[bucket_index].slots[account_index];
            if slot.is_some() {
                warn!(
                    "event=group_duplicate_name module=sync status=skipped account={} name={} resource_id={}",
                    account.name(),
                    group.name,
                    group.resource_id
                );
                continue;
            }
            *slot = Some(group_index);
        }
    }
    buckets
}

/// Pass 4: give every bucket one UID and fill the accounts that lack it.
fn merge_buckets(
    accounts: &mut [Account],
    buckets: &[NameBucket],
    uid_by_name: &HashMap<String, Uid>,
    report: &mut SyncReport,
) -> SyncResult<()> {
    for bucket in buckets {
        let uid = uid_by_name
            .get(&bucket.name)
            .cloned()
            .unwrap_or_else(new_uid);
        for (account, slot) in accounts.iter_mut().zip(&bucket.slots) {
            let Some(group_index) = *slot else {
                info!(
                    "event=group_create module=sync status=ok account={} name={} group_uid={}",
                    account.name(),
                    bucket.name,
                    uid
                );
                account.create_group(Group::new(bucket.name.clone(), uid.clone()))?;
                report.groups_created += 1;
                continue;
            };
            let group = &account.groups()[group_index];
            if group.uid() == Some(uid.as_str()) {
                continue;
            }
            if group.system {
                return Err(SyncError::SystemGroupMutation {
                    account: account.name().to_string(),
                    group: group.name.clone(),
                });
            }
            let mut retagged = group.clone();
            retagged.uid_tags.collapse_to(uid.as_str());
            info!(
                "event=group_retag module=sync status=ok account={} name={} group_uid={}",
                account.name(),
                bucket.name,
                uid
            );
            account.update_group(group_index, retagged, &[GroupField::UidTags])?;
            report.groups_retagged += 1;
        }
    }
    Ok(())
}
