//! Named account store registry.

use crate::config::is_valid_account_name;
use crate::store::AccountStore;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Store registration/lookup errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreRegistryError {
    InvalidAccountName(String),
    DuplicateAccount(String),
    AccountNotFound(String),
}

impl Display for StoreRegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidAccountName(value) => write!(f, "account name is invalid: {value}"),
            Self::DuplicateAccount(value) => {
                write!(f, "account already registered: {value}")
            }
            Self::AccountNotFound(value) => write!(f, "no store registered for account: {value}"),
        }
    }
}

impl Error for StoreRegistryError {}

/// Account stores keyed by account name.
#[derive(Default)]
pub struct StoreRegistry {
    stores: BTreeMap<String, Box<dyn AccountStore>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the store backing one account.
    pub fn register(
        &mut self,
        account: &str,
        store: Box<dyn AccountStore>,
    ) -> Result<(), StoreRegistryError> {
        let account = account.trim().to_string();
        if !is_valid_account_name(&account) {
            return Err(StoreRegistryError::InvalidAccountName(account));
        }
        if self.stores.contains_key(account.as_str()) {
            return Err(StoreRegistryError::DuplicateAccount(account));
        }

        self.stores.insert(account, store);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    /// Returns sorted account names.
    pub fn account_names(&self) -> Vec<String> {
        self.stores.keys().cloned().collect()
    }

    pub fn contains(&self, account: &str) -> bool {
        self.stores.contains_key(account.trim())
    }

    /// Removes and returns the store for one account.
    pub fn take(&mut self, account: &str) -> Result<Box<dyn AccountStore>, StoreRegistryError> {
        let normalized = account.trim();
        self.stores
            .remove(normalized)
            .ok_or_else(|| StoreRegistryError::AccountNotFound(normalized.to_string()))
    }
}
