//! Settings workflows over the persistence collaborator.
//!
//! The store owns durability; this service owns the rules: activation
//! resets to factory defaults, form submissions are sanitized before they
//! are persisted, and resolution merges the persisted record with the
//! file/env override layer into the effective configuration.

use std::{collections::BTreeMap, sync::Arc};

use thiserror::Error;
use tracing::{debug, info};

use crate::config::{self, ConfigSource, HookConfig, OptionOverrides, OptionSet};
use crate::infra::store::{SettingsStore, StoreError};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Current settings as the admin form should present them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormState {
    /// Complete option mapping, effective values included.
    pub values: BTreeMap<String, String>,
    /// True whenever something other than the persisted record is in charge
    /// (a file/env override layer, or no record at all); the form is then
    /// informational only and edits are rejected upstream.
    pub read_only: bool,
}

/// Service wiring the option layer rules to a settings store.
pub struct SettingsService {
    store: Arc<dyn SettingsStore>,
    owner: String,
}

impl SettingsService {
    pub fn new(store: Arc<dyn SettingsStore>, owner: impl Into<String>) -> Self {
        Self {
            store,
            owner: owner.into(),
        }
    }

    /// Activation: persist a complete factory-default record under this
    /// extension's identity and return the defaults.
    pub fn activate(&self) -> Result<OptionSet, SettingsError> {
        let options = OptionSet::factory();
        self.store.save(&self.owner, &options.to_map())?;
        info!(owner = %self.owner, "Settings reset to factory defaults");
        Ok(options)
    }

    /// Persist a submitted settings form.
    ///
    /// The raw submission is sanitized first: unknown fields are dropped
    /// and absent checkboxes become `no`, so a browser omitting unchecked
    /// boxes cannot resurrect stale values.
    pub fn save_submission(
        &self,
        form: &BTreeMap<String, String>,
    ) -> Result<OptionSet, SettingsError> {
        let options = OptionSet::sanitize(form);
        self.store.save(&self.owner, &options.to_map())?;
        info!(owner = %self.owner, "Settings saved");
        Ok(options)
    }

    /// Resolve the effective configuration from the persisted record plus
    /// an optional file/env override layer. A missing record is a normal
    /// first-run condition, not an error.
    pub fn resolve(
        &self,
        file_overrides: Option<&OptionOverrides>,
    ) -> Result<HookConfig, SettingsError> {
        let record = self.store.load(&self.owner)?;
        if record.is_none() {
            debug!(owner = %self.owner, "No persisted settings record; using defaults");
        }
        Ok(config::resolve(file_overrides, record.as_ref()))
    }

    /// Effective values for the settings form, flagged read-only whenever
    /// something other than the persisted record is in charge.
    pub fn form_state(
        &self,
        file_overrides: Option<&OptionOverrides>,
    ) -> Result<FormState, SettingsError> {
        let resolved = self.resolve(file_overrides)?;
        Ok(FormState {
            values: resolved.options.to_map(),
            read_only: resolved.source != ConfigSource::Database,
        })
    }
}
