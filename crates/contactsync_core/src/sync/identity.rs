//! UID assignment and multiplicity repair.
//!
//! # Responsibility
//! - Tag every untagged eligible contact with a UID and persist the tag.
//! - Reduce records carrying several UID tags to exactly one.
//!
//! # Invariants
//! - A UID, once written, is never replaced by a value that was not already
//!   one of the record's tags.
//! - One account never holds two contacts under the same primary UID.

use crate::model::group::GroupField;
use crate::model::uid::{new_uid, Uid};
use crate::snapshot::Snapshot;
use crate::sync::account::Account;
use crate::sync::report::SyncReport;
use crate::sync::SyncResult;
use log::{debug, info, warn};
use std::collections::HashMap;

/// Collapses multi-tagged non-system groups to one tag each.
///
/// Prefers the first tag also used by a group in another account.
pub fn repair_group_uids(accounts: &mut [Account], report: &mut SyncReport) -> SyncResult<()> {
    let mut repairs = Vec::new();
    for (index, account) in accounts.iter().enumerate() {
        for (group_index, group) in account.groups().iter().enumerate() {
            if group.system || !group.uid_tags.is_multiple() {
                continue;
            }
            let shared = group.uid_tags.iter().find(|tag| {
                accounts
                    .iter()
                    .enumerate()
                    .filter(|(other, _)| *other != index)
                    .any(|(_, other)| other.groups().iter().any(|g| g.uid() == Some(*tag)))
            });
            let canonical = shared.or_else(|| group.uid_tags.primary());
            if let Some(canonical) = canonical {
                repairs.push((index, group_index, canonical.to_string()));
            }
        }
    }

    for (index, group_index, canonical) in repairs {
        let account = &mut accounts[index];
        let mut group = account.groups()[group_index].clone();
        group.uid_tags.collapse_to(canonical.as_str());
        info!(
            "event=uid_repair module=sync status=ok kind=group account={} uid={}",
            account.name(),
            canonical
        );
        account.update_group(group_index, group, &[GroupField::UidTags])?;
        report.uid_tags_repaired += 1;
    }
    Ok(())
}

/// Collapses multi-tagged contacts to one tag each.
///
/// Prefers the first tag already recorded in that account's prior snapshot.
/// Tags held by another contact in the same account are never chosen.
pub fn repair_contact_uids(
    accounts: &mut [Account],
    priors: &[Snapshot],
    report: &mut SyncReport,
) -> SyncResult<()> {
    for (account, prior) in accounts.iter_mut().zip(priors) {
        for current in account.multi_tagged_uids() {
            let Some(contact) = account.contact(&current) else {
                continue;
            };
            let free = |tag: &str| tag == current || !account.holds(tag);
            let canonical = contact
                .uid_tags
                .iter()
                .find(|tag| prior.contains_key(*tag) && free(*tag))
                .unwrap_or(current.as_str())
                .to_string();
            info!(
                "event=uid_repair module=sync status=ok kind=contact account={} uid={}",
                account.name(),
                canonical
            );
            account.retag_contact(&current, &canonical)?;
            report.uid_tags_repaired += 1;
        }
    }
    Ok(())
}

/// Tags every untagged contact, adopting UIDs by display name in bootstrap mode.
pub fn assign_contact_uids(
    accounts: &mut [Account],
    bootstrap: bool,
    report: &mut SyncReport,
) -> SyncResult<()> {
    let lookup = if bootstrap {
        bootstrap_lookup(accounts)
    } else {
        HashMap::new()
    };

    for account in accounts.iter_mut() {
        for contact in account.take_untagged() {
            let adopted = contact
                .print_name()
                .and_then(|name| lookup.get(name))
                .map(|(uid, owner)| (uid.clone(), owner.clone()));
            let uid = match adopted {
                Some((uid, _)) if account.holds(&uid) => {
                    warn!(
                        "event=uid_adopt module=sync status=conflict account={} uid={} action=mint",
                        account.name(),
                        uid
                    );
                    report.uids_minted += 1;
                    new_uid()
                }
                Some((uid, owner)) => {
                    info!(
                        "event=uid_adopt module=sync status=ok account={} uid={} from_account={}",
                        account.name(),
                        uid,
                        owner
                    );
                    report.uids_adopted += 1;
                    uid
                }
                None => {
                    report.uids_minted += 1;
                    new_uid()
                }
            };
            debug!(
                "event=uid_assign module=sync status=ok account={} uid={} name={}",
                account.name(),
                uid,
                contact.print_name().unwrap_or("")
            );
            account.tag_contact(contact, uid)?;
        }
    }
    Ok(())
}

/// Display name to (UID, account) over already tagged contacts; first match wins.
fn bootstrap_lookup(accounts: &[Account]) -> HashMap<String, (Uid, String)> {
    let mut lookup = HashMap::new();
    for account in accounts {
        for (uid, contact) in account.contacts() {
            if let Some(name) = contact.print_name() {
                lookup
                    .entry(name.to_string())
                    .or_insert_with(|| (uid.clone(), account.name().to_string()));
            }
        }
    }
    lookup
}
