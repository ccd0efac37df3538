//! Run orchestration.

use crate::config::SyncConfig;
use crate::model::uid::Uid;
use crate::snapshot::{Snapshot, SnapshotStore};
use crate::store::StoreRegistry;
use crate::sync::account::Account;
use crate::sync::contacts::reconcile_contacts;
use crate::sync::groups::{build_group_tables, reconcile_groups};
use crate::sync::identity::{assign_contact_uids, repair_contact_uids, repair_group_uids};
use crate::sync::report::{AccountReport, SyncReport};
use crate::sync::{SyncError, SyncResult};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::time::Instant;

/// Runs reconciliation for one validated configuration.
#[derive(Debug, Clone)]
pub struct SyncEngine {
    config: SyncConfig,
}

impl SyncEngine {
    /// Validates `config` and builds an engine for it.
    pub fn new(config: SyncConfig) -> SyncResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Executes one full run.
    ///
    /// Every configured account is loaded before anything is written, so an
    /// unreachable or unauthorized account aborts the run untouched. Snapshots
    /// are saved only after every phase succeeded, and never in dry-run mode.
    pub fn run(
        &self,
        mut registry: StoreRegistry,
        snapshots: &dyn SnapshotStore,
    ) -> SyncResult<SyncReport> {
        let started = Instant::now();
        let config = &self.config;
        info!(
            "event=sync_run module=sync status=start accounts={} dry_run={} adding_new_account={}",
            config.accounts.len(),
            config.dry_run,
            config.adding_new_account
        );

        let mut accounts = Vec::with_capacity(config.accounts.len());
        for name in &config.accounts {
            let store = registry.take(name)?;
            accounts.push(Account::load(
                name,
                store,
                config.dry_run,
                config.write_policy,
            )?);
        }
        if !registry.is_empty() {
            warn!(
                "event=sync_run module=sync status=ignored_stores accounts={}",
                registry.account_names().join(",")
            );
        }

        let mut priors: Vec<Snapshot> = Vec::with_capacity(accounts.len());
        for account in &accounts {
            let prior = snapshots
                .load(account.name())
                .map_err(|err| SyncError::snapshot(account.name(), err))?;
            priors.push(prior);
        }

        let mut report = SyncReport {
            dry_run: config.dry_run,
            ..SyncReport::default()
        };

        repair_group_uids(&mut accounts, &mut report)?;
        repair_contact_uids(&mut accounts, &priors, &mut report)?;
        assign_contact_uids(&mut accounts, config.adding_new_account, &mut report)?;
        info!(
            "event=phase module=sync phase=identity status=ok minted={} adopted={} repaired={}",
            report.uids_minted, report.uids_adopted, report.uid_tags_repaired
        );

        reconcile_groups(&mut accounts, &mut report)?;
        let tables = build_group_tables(&accounts);

        let private_uids: HashSet<Uid> = tables
            .iter()
            .flat_map(|table| table.uids_named(&config.private_groups))
            .collect();
        debug!(
            "event=phase module=sync phase=private_groups status=ok names={} uids={}",
            config.private_groups.len(),
            private_uids.len()
        );

        reconcile_contacts(&mut accounts, &priors, &tables, &private_uids, &mut report)?;

        if !config.dry_run {
            for account in &accounts {
                let fresh = account.current_snapshot();
                snapshots
                    .save(account.name(), &fresh)
                    .map_err(|err| SyncError::snapshot(account.name(), err))?;
            }
            report.snapshots_saved = true;
        }

        report.accounts = accounts
            .iter()
            .map(|account| AccountReport {
                account: account.name().to_string(),
                groups: account.groups().len(),
                contacts: account.contacts().len(),
                writes: account.writes(),
            })
            .collect();

        info!(
            "event=sync_run module=sync status=ok duration_ms={} writes={} snapshots_saved={}",
            started.elapsed().as_millis(),
            report.total_writes(),
            report.snapshots_saved
        );
        Ok(report)
    }
}
