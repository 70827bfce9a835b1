// SPDX-License-Identifier: Apache-2.0

//! Layered lookup for the warehouse table coordinates: an ordered list of
//! configuration sources, first hit wins. The runtime layer is mutable while
//! the process runs and persists to a JSON file, so a table changed through
//! the settings surface applies to the next query without a restart.

use rentroll_model::{
    TableSettings, ValidationError, DEFAULT_COMPETITION_TABLE, DEFAULT_PROJECT_ID,
    DEFAULT_RENTROLL_TABLE,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{info, warn};

pub const KEY_PROJECT_ID: &str = "project_id";
pub const KEY_RENTROLL_TABLE: &str = "rentroll_table";
pub const KEY_COMPETITION_TABLE: &str = "competition_table";

const GOVERNED_KEYS: [&str; 3] = [KEY_PROJECT_ID, KEY_RENTROLL_TABLE, KEY_COMPETITION_TABLE];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingSource {
    Settings,
    Env,
    Default,
}

impl SettingSource {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Settings => "settings",
            Self::Env => "env",
            Self::Default => "default",
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid settings: {0}")]
    Invalid(#[from] ValidationError),
    #[error("settings persistence failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Partial update to the runtime layer. Absent keys are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsPatch {
    pub project_id: Option<String>,
    pub rentroll_table: Option<String>,
    pub competition_table: Option<String>,
}

impl SettingsPatch {
    fn get(&self, key: &str) -> Option<&str> {
        match key {
            KEY_PROJECT_ID => self.project_id.as_deref(),
            KEY_RENTROLL_TABLE => self.rentroll_table.as_deref(),
            KEY_COMPETITION_TABLE => self.competition_table.as_deref(),
            _ => None,
        }
    }

    fn is_empty(&self) -> bool {
        self.project_id.is_none() && self.rentroll_table.is_none() && self.competition_table.is_none()
    }
}

/// One configuration source in the precedence chain.
trait ConfigLayer: Send + Sync {
    fn source(&self) -> SettingSource;
    fn get(&self, key: &str) -> Option<String>;
}

struct RuntimeLayer {
    values: Arc<RwLock<SettingsPatch>>,
}

impl ConfigLayer for RuntimeLayer {
    fn source(&self) -> SettingSource {
        SettingSource::Settings
    }

    fn get(&self, key: &str) -> Option<String> {
        self.values
            .read()
            .ok()
            .and_then(|patch| patch.get(key).map(str::to_string))
    }
}

enum EnvLookup {
    Process,
    Fixed(BTreeMap<String, String>),
}

struct EnvLayer {
    lookup: EnvLookup,
}

impl EnvLayer {
    fn var(&self, name: &str) -> Option<String> {
        let value = match &self.lookup {
            EnvLookup::Process => std::env::var(name).ok(),
            EnvLookup::Fixed(map) => map.get(name).cloned(),
        };
        value.filter(|v| !v.trim().is_empty())
    }
}

impl ConfigLayer for EnvLayer {
    fn source(&self) -> SettingSource {
        SettingSource::Env
    }

    fn get(&self, key: &str) -> Option<String> {
        match key {
            KEY_PROJECT_ID => self
                .var("GCP_PROJECT_ID")
                .or_else(|| self.var("GOOGLE_CLOUD_PROJECT")),
            KEY_RENTROLL_TABLE => self.var("BIGQUERY_RENTROLL_TABLE"),
            KEY_COMPETITION_TABLE => self.var("BIGQUERY_COMPETITION_TABLE"),
            _ => None,
        }
    }
}

struct DefaultLayer;

impl ConfigLayer for DefaultLayer {
    fn source(&self) -> SettingSource {
        SettingSource::Default
    }

    fn get(&self, key: &str) -> Option<String> {
        match key {
            KEY_PROJECT_ID => Some(DEFAULT_PROJECT_ID.to_string()),
            KEY_RENTROLL_TABLE => Some(DEFAULT_RENTROLL_TABLE.to_string()),
            KEY_COMPETITION_TABLE => Some(DEFAULT_COMPETITION_TABLE.to_string()),
            _ => None,
        }
    }
}

/// Effective settings plus, per key, the layer that supplied the value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveSettings {
    pub tables: TableSettings,
    pub sources: BTreeMap<String, String>,
}

pub struct SettingsStore {
    file_path: PathBuf,
    runtime: Arc<RwLock<SettingsPatch>>,
    layers: Vec<Box<dyn ConfigLayer>>,
}

impl SettingsStore {
    /// Load from the settings file (if present) with the process environment
    /// as the middle layer. Unreadable or malformed files are ignored, the
    /// lower layers still apply.
    #[must_use]
    pub fn load(file_path: &Path) -> Self {
        Self::new(file_path, EnvLookup::Process)
    }

    /// Test constructor: the env layer reads from `pairs` instead of the
    /// process environment.
    #[must_use]
    pub fn with_env_pairs(file_path: &Path, pairs: BTreeMap<String, String>) -> Self {
        Self::new(file_path, EnvLookup::Fixed(pairs))
    }

    fn new(file_path: &Path, lookup: EnvLookup) -> Self {
        let initial = match std::fs::read(file_path) {
            Ok(bytes) => match serde_json::from_slice::<SettingsPatch>(&bytes) {
                Ok(patch) => {
                    info!(path = %file_path.display(), "loaded runtime settings");
                    patch
                }
                Err(err) => {
                    warn!(path = %file_path.display(), %err, "ignoring malformed settings file");
                    SettingsPatch::default()
                }
            },
            Err(_) => SettingsPatch::default(),
        };
        let runtime = Arc::new(RwLock::new(initial));
        let layers: Vec<Box<dyn ConfigLayer>> = vec![
            Box::new(RuntimeLayer {
                values: Arc::clone(&runtime),
            }),
            Box::new(EnvLayer { lookup }),
            Box::new(DefaultLayer),
        ];
        Self {
            file_path: file_path.to_path_buf(),
            runtime,
            layers,
        }
    }

    /// First layer that knows `key` wins.
    #[must_use]
    pub fn resolve(&self, key: &str) -> Option<(String, SettingSource)> {
        self.layers
            .iter()
            .find_map(|layer| layer.get(key).map(|value| (value, layer.source())))
    }

    /// Resolve all governed keys and validate the result as a whole.
    pub fn effective(&self) -> Result<EffectiveSettings, SettingsError> {
        let mut values = BTreeMap::new();
        let mut sources = BTreeMap::new();
        for key in GOVERNED_KEYS {
            // The default layer answers every governed key.
            if let Some((value, source)) = self.resolve(key) {
                values.insert(key, value);
                sources.insert(key.to_string(), source.as_str().to_string());
            }
        }
        let tables = TableSettings::new(
            values.get(KEY_PROJECT_ID).map_or("", String::as_str),
            values.get(KEY_RENTROLL_TABLE).map_or("", String::as_str),
            values.get(KEY_COMPETITION_TABLE).map_or("", String::as_str),
        )?;
        Ok(EffectiveSettings { tables, sources })
    }

    /// Merge `patch` into the runtime layer, validate the resulting effective
    /// settings, and persist. On validation failure the runtime layer is left
    /// unchanged.
    pub fn apply(&self, patch: &SettingsPatch) -> Result<EffectiveSettings, SettingsError> {
        let merged = {
            let current = self
                .runtime
                .read()
                .map_err(|_| ValidationError("settings lock poisoned".to_string()))
                .map_err(SettingsError::Invalid)?;
            SettingsPatch {
                project_id: patch.project_id.clone().or_else(|| current.project_id.clone()),
                rentroll_table: patch
                    .rentroll_table
                    .clone()
                    .or_else(|| current.rentroll_table.clone()),
                competition_table: patch
                    .competition_table
                    .clone()
                    .or_else(|| current.competition_table.clone()),
            }
        };

        // Validate against the full chain before committing.
        let candidate = self.effective_with_runtime(&merged)?;

        {
            let mut runtime = self
                .runtime
                .write()
                .map_err(|_| ValidationError("settings lock poisoned".to_string()))
                .map_err(SettingsError::Invalid)?;
            *runtime = merged.clone();
        }

        if merged.is_empty() {
            let _ = std::fs::remove_file(&self.file_path);
        } else {
            let body = serde_json::to_vec_pretty(&merged)?;
            std::fs::write(&self.file_path, body)?;
        }
        info!(path = %self.file_path.display(), "runtime settings saved");
        Ok(candidate)
    }

    fn effective_with_runtime(
        &self,
        runtime: &SettingsPatch,
    ) -> Result<EffectiveSettings, SettingsError> {
        let mut sources = BTreeMap::new();
        let mut values = BTreeMap::new();
        for key in GOVERNED_KEYS {
            if let Some(value) = runtime.get(key) {
                values.insert(key, value.to_string());
                sources.insert(key.to_string(), SettingSource::Settings.as_str().to_string());
                continue;
            }
            for layer in self.layers.iter().skip(1) {
                if let Some(value) = layer.get(key) {
                    values.insert(key, value);
                    sources.insert(key.to_string(), layer.source().as_str().to_string());
                    break;
                }
            }
        }
        let tables = TableSettings::new(
            values.get(KEY_PROJECT_ID).map_or("", String::as_str),
            values.get(KEY_RENTROLL_TABLE).map_or("", String::as_str),
            values.get(KEY_COMPETITION_TABLE).map_or("", String::as_str),
        )?;
        Ok(EffectiveSettings { tables, sources })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir, env: &[(&str, &str)]) -> SettingsStore {
        let pairs = env
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        SettingsStore::with_env_pairs(&dir.path().join("app_settings.json"), pairs)
    }

    #[test]
    fn defaults_when_nothing_set() {
        let dir = TempDir::new().expect("tempdir");
        let s = store(&dir, &[]);
        let eff = s.effective().expect("effective");
        assert_eq!(eff.tables, TableSettings::default());
        assert!(eff.sources.values().all(|v| v == "default"));
    }

    #[test]
    fn env_beats_default() {
        let dir = TempDir::new().expect("tempdir");
        let s = store(
            &dir,
            &[("BIGQUERY_RENTROLL_TABLE", "acme.rentroll.units_v2")],
        );
        let eff = s.effective().expect("effective");
        assert_eq!(eff.tables.rentroll_table.as_str(), "acme.rentroll.units_v2");
        assert_eq!(eff.sources["rentroll_table"], "env");
        assert_eq!(eff.sources["competition_table"], "default");
    }

    #[test]
    fn settings_beat_env() {
        let dir = TempDir::new().expect("tempdir");
        let s = store(
            &dir,
            &[("BIGQUERY_RENTROLL_TABLE", "acme.rentroll.units_v2")],
        );
        s.apply(&SettingsPatch {
            rentroll_table: Some("acme.rentroll.units_v3".to_string()),
            ..SettingsPatch::default()
        })
        .expect("apply");

        let eff = s.effective().expect("effective");
        assert_eq!(eff.tables.rentroll_table.as_str(), "acme.rentroll.units_v3");
        assert_eq!(eff.sources["rentroll_table"], "settings");
    }

    #[test]
    fn apply_persists_across_reload() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("app_settings.json");
        let s = SettingsStore::with_env_pairs(&path, BTreeMap::new());
        s.apply(&SettingsPatch {
            project_id: Some("acme-prod".to_string()),
            ..SettingsPatch::default()
        })
        .expect("apply");

        let reloaded = SettingsStore::with_env_pairs(&path, BTreeMap::new());
        let eff = reloaded.effective().expect("effective");
        assert_eq!(eff.tables.project_id, "acme-prod");
        assert_eq!(eff.sources["project_id"], "settings");
    }

    #[test]
    fn invalid_patch_leaves_runtime_untouched() {
        let dir = TempDir::new().expect("tempdir");
        let s = store(&dir, &[]);
        let err = s.apply(&SettingsPatch {
            rentroll_table: Some("not a table".to_string()),
            ..SettingsPatch::default()
        });
        assert!(err.is_err());

        let eff = s.effective().expect("effective");
        assert_eq!(eff.tables, TableSettings::default());
    }

    #[test]
    fn malformed_file_is_ignored() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("app_settings.json");
        std::fs::write(&path, b"{not json").expect("write");
        let s = SettingsStore::with_env_pairs(&path, BTreeMap::new());
        let eff = s.effective().expect("effective");
        assert_eq!(eff.tables, TableSettings::default());
    }
}
