use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "contactsync")]
#[command(about = "Reconcile contacts and groups across directory accounts")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run one reconciliation pass over the configured accounts.
    Sync(SyncArgs),
    /// Print the stored end-of-run snapshot of one account.
    Snapshot {
        #[arg(long = "state-db")]
        state_db: PathBuf,
        #[arg(long)]
        account: String,
    },
    /// Create an empty directory file for a new account.
    InitAccount {
        #[arg(long = "directory-dir")]
        directory_dir: PathBuf,
        #[arg(long)]
        account: String,
    },
    Version,
}

#[derive(Args)]
pub struct SyncArgs {
    /// Account names in processing order. Overrides the config file list.
    #[arg(long = "account")]
    pub accounts: Vec<String>,
    /// Group names whose members are never replicated.
    #[arg(long = "private")]
    pub private_groups: Vec<String>,
    #[arg(long)]
    pub dry_run: bool,
    /// Adopt existing UIDs by display name for untagged contacts, this run only.
    #[arg(long)]
    pub adding_new_account: bool,
    #[arg(long)]
    pub verbose: bool,
    /// JSON file holding a `SyncConfig`; flags override its values.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Directory holding one `<account>.json` file per account.
    #[arg(long = "directory-dir")]
    pub directory_dir: PathBuf,
    #[arg(long = "state-db")]
    pub state_db: PathBuf,
    /// Absolute directory for rolling log files; stderr when omitted.
    #[arg(long = "log-dir")]
    pub log_dir: Option<String>,
    #[arg(long = "min-write-interval-ms")]
    pub min_write_interval_ms: Option<u64>,
}
