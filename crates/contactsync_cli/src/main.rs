//! `contactsync` command line entry point.
//!
//! # Responsibility
//! - Wire file-backed account directories and the SQLite snapshot store into
//!   one engine run.
//! - Report fatal errors with their cause chain and a non-zero exit status.

mod cli;

use clap::Parser;
use cli::{Cli, Command, SyncArgs};
use contactsync_core::{
    core_version, default_log_level, init_logging, init_stderr_logging, open_db, FileDirectory,
    SnapshotStore, SqliteSnapshotStore, StoreRegistry, SyncConfig, SyncEngine,
};
use log::error;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

type CliResult<T> = Result<T, Box<dyn Error>>;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.cmd {
        Command::Sync(args) => run_sync(args),
        Command::Snapshot { state_db, account } => print_snapshot(&state_db, &account),
        Command::InitAccount {
            directory_dir,
            account,
        } => init_account(&directory_dir, &account),
        Command::Version => {
            println!("contactsync {}", core_version());
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_exit module=cli status=error error={}", err);
            eprintln!("error: {err}");
            let mut source = err.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

fn run_sync(args: SyncArgs) -> CliResult<()> {
    let config = build_config(&args)?;

    let level = if config.verbose {
        "debug"
    } else {
        default_log_level()
    };
    match args.log_dir.as_deref() {
        Some(dir) => init_logging(level, dir)?,
        None => init_stderr_logging(level)?,
    }

    let engine = SyncEngine::new(config)?;
    let mut registry = StoreRegistry::new();
    for account in &engine.config().accounts {
        let path = account_file(&args.directory_dir, account);
        let store = FileDirectory::open(&path)
            .map_err(|err| format!("account `{account}` ({}): {err}", path.display()))?;
        registry.register(account, Box::new(store))?;
    }

    let conn = open_db(&args.state_db)?;
    let snapshots = SqliteSnapshotStore::new(&conn);
    let report = engine.run(registry, &snapshots)?;
    println!("{report}");
    Ok(())
}

fn build_config(args: &SyncArgs) -> CliResult<SyncConfig> {
    let mut config = match &args.config {
        Some(path) => SyncConfig::from_json_file(path)?,
        None => SyncConfig::default(),
    };
    if !args.accounts.is_empty() {
        config.accounts = args.accounts.clone();
    }
    config
        .private_groups
        .extend(args.private_groups.iter().cloned());
    config.dry_run |= args.dry_run;
    config.adding_new_account |= args.adding_new_account;
    config.verbose |= args.verbose;
    if let Some(interval) = args.min_write_interval_ms {
        config.write_policy.min_write_interval_ms = interval;
    }
    config.validate()?;
    Ok(config)
}

fn print_snapshot(state_db: &Path, account: &str) -> CliResult<()> {
    let conn = open_db(state_db)?;
    let store = SqliteSnapshotStore::new(&conn);
    match store.saved_at(account)? {
        Some(saved_at_ms) => println!("account {account} saved_at_ms={saved_at_ms}"),
        None => println!("account {account} has no saved snapshot"),
    }
    for (uid, marker) in store.load(account)? {
        println!("{uid}\t{marker}");
    }
    Ok(())
}

fn init_account(directory_dir: &Path, account: &str) -> CliResult<()> {
    let config = SyncConfig::new([account]);
    config.validate()?;
    std::fs::create_dir_all(directory_dir)?;
    let path = account_file(directory_dir, account);
    FileDirectory::create(&path)?;
    println!("created {}", path.display());
    Ok(())
}

fn account_file(directory_dir: &Path, account: &str) -> PathBuf {
    directory_dir.join(format!("{account}.json"))
}
