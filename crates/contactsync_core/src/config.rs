//! Run configuration.
//!
//! # Responsibility
//! - Describe one reconciliation run: accounts, private groups and flags.
//! - Load configuration from JSON and validate it before any store is touched.
//!
//! # Invariants
//! - At least one account is configured.
//! - Account names are unique and safe to use as file names.
//! - Account order is preserved; it drives tie-breaking during reconciliation.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::Duration;

static ACCOUNT_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.@-]*$").expect("valid account name regex")
});

/// Returns whether `value` is usable as an account name.
pub fn is_valid_account_name(value: &str) -> bool {
    if value.contains("..") {
        return false;
    }
    ACCOUNT_NAME_RE.is_match(value)
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    NoAccounts,
    InvalidAccountName(String),
    DuplicateAccount(String),
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoAccounts => write!(f, "at least one account must be configured"),
            Self::InvalidAccountName(name) => write!(f, "invalid account name `{name}`"),
            Self::DuplicateAccount(name) => write!(f, "account `{name}` is listed twice"),
            Self::Io(err) => write!(f, "{err}"),
            Self::Json(err) => write!(f, "invalid config file: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Pacing and retry applied to mutating store calls, per account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WritePolicy {
    /// Minimum delay between two successive writes to the same account.
    pub min_write_interval_ms: u64,
    /// Attempts per call, including the first. Values below 1 count as 1.
    pub max_attempts: u32,
    /// Delay before retrying a transient failure.
    pub retry_delay_ms: u64,
}

impl Default for WritePolicy {
    fn default() -> Self {
        Self {
            min_write_interval_ms: 0,
            max_attempts: 3,
            retry_delay_ms: 1_000,
        }
    }
}

impl WritePolicy {
    /// No pacing and no delay between retries.
    pub fn immediate() -> Self {
        Self {
            min_write_interval_ms: 0,
            retry_delay_ms: 0,
            ..Self::default()
        }
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_write_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Options for one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Account names in processing order.
    pub accounts: Vec<String>,
    /// Group names whose members are never replicated.
    pub private_groups: BTreeSet<String>,
    /// Suppress every mutating store call and the snapshot write.
    pub dry_run: bool,
    /// Adopt UIDs of existing contacts by display name for untagged records.
    pub adding_new_account: bool,
    /// Extra diagnostics only.
    pub verbose: bool,
    pub write_policy: WritePolicy,
}

impl SyncConfig {
    pub fn new<I, S>(accounts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            accounts: accounts.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_private_group(mut self, name: impl Into<String>) -> Self {
        self.private_groups.insert(name.into());
        self
    }

    /// Reads a JSON configuration file.
    ///
    /// The result is not validated; call `validate` before use.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Checks account list invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.accounts.is_empty() {
            return Err(ConfigError::NoAccounts);
        }
        let mut seen = HashSet::new();
        for account in &self.accounts {
            if !is_valid_account_name(account) {
                return Err(ConfigError::InvalidAccountName(account.clone()));
            }
            if !seen.insert(account.as_str()) {
                return Err(ConfigError::DuplicateAccount(account.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{is_valid_account_name, ConfigError, SyncConfig, WritePolicy};

    #[test]
    fn account_names_must_be_file_safe() {
        assert!(is_valid_account_name("work"));
        assert!(is_valid_account_name("jane.doe@example.com"));
        assert!(!is_valid_account_name(""));
        assert!(!is_valid_account_name("../etc"));
        assert!(!is_valid_account_name("a/b"));
        assert!(!is_valid_account_name(".hidden"));
        assert!(!is_valid_account_name("a..b"));
        assert!(!is_valid_account_name("work account"));
    }

    #[test]
    fn validate_rejects_empty_and_duplicate_accounts() {
        let empty = SyncConfig::default();
        assert!(matches!(empty.validate(), Err(ConfigError::NoAccounts)));

        let duplicate = SyncConfig::new(["home", "home"]);
        assert!(matches!(
            duplicate.validate(),
            Err(ConfigError::DuplicateAccount(name)) if name == "home"
        ));

        SyncConfig::new(["home", "work"]).validate().unwrap();
    }

    #[test]
    fn json_config_fills_defaults() {
        let config: SyncConfig = serde_json::from_str(
            r#"{ "accounts": ["home", "work"], "private_groups": ["Family"] }"#,
        )
        .unwrap();
        assert_eq!(config.accounts, vec!["home", "work"]);
        assert!(config.private_groups.contains("Family"));
        assert!(!config.dry_run);
        assert_eq!(config.write_policy, WritePolicy::default());
    }

    #[test]
    fn write_policy_always_allows_one_attempt() {
        let policy = WritePolicy {
            max_attempts: 0,
            ..WritePolicy::default()
        };
        assert_eq!(policy.attempts(), 1);
    }
}
