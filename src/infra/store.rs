//! Settings persistence boundary.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("settings record could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("settings storage failed: {message}")]
    Backend { message: String },
}

impl StoreError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

/// Persistence collaborator for the option mapping, keyed by the logical
/// owner identity (one record per extension). `load` answers `None` when no
/// record exists; `save` replaces the prior record wholesale.
pub trait SettingsStore: Send + Sync {
    fn load(&self, owner: &str) -> Result<Option<BTreeMap<String, String>>, StoreError>;
    fn save(&self, owner: &str, settings: &BTreeMap<String, String>) -> Result<(), StoreError>;
}

/// In-memory store holding each record as a serialized flat mapping, the
/// same shape a database-backed implementation would persist. Suitable for
/// tests and hosts without durable settings storage.
#[derive(Debug, Default)]
pub struct InMemorySettingsStore {
    records: RwLock<HashMap<String, String>>,
}

impl InMemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records_read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, String>> {
        match self.records.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn records_write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, String>> {
        match self.records.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl SettingsStore for InMemorySettingsStore {
    fn load(&self, owner: &str) -> Result<Option<BTreeMap<String, String>>, StoreError> {
        let records = self.records_read();
        match records.get(owner) {
            Some(serialized) => Ok(Some(serde_json::from_str(serialized)?)),
            None => Ok(None),
        }
    }

    fn save(&self, owner: &str, settings: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let serialized = serde_json::to_string(settings)?;
        self.records_write().insert(owner.to_string(), serialized);
        Ok(())
    }
}
