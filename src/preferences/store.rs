//! Persisted UI preferences.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::config::PreferencesConfig;

/// How cost lists are laid out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    Table,
    Cards,
}

/// Everything the store persists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// ISO 4217 code used to display amounts.
    pub currency: String,

    /// Panel id → visible. Panels not listed are visible.
    pub panels: BTreeMap<String, bool>,

    pub view_mode: ViewMode,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            currency: "USD".to_string(),
            panels: BTreeMap::new(),
            view_mode: ViewMode::Table,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid currency code '{0}'")]
    InvalidCurrency(String),

    #[error("preference file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("preference file is malformed: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Normalize a currency code to three uppercase ASCII letters.
pub fn normalize_currency(code: &str) -> Result<String, StoreError> {
    let code = code.trim();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(code.to_ascii_uppercase())
    } else {
        Err(StoreError::InvalidCurrency(code.to_string()))
    }
}

/// Owned handle to one session's preferences.
///
/// Opened at session start, written through on every effective change,
/// consumed by [`PreferenceStore::close`] at session end.
#[derive(Debug)]
pub struct PreferenceStore {
    state: RwLock<Preferences>,
    persistence_path: Option<PathBuf>,
}

impl PreferenceStore {
    /// Store that never touches disk.
    pub fn in_memory(defaults: Preferences) -> Self {
        Self {
            state: RwLock::new(defaults),
            persistence_path: None,
        }
    }

    /// Load from `path` if it exists, otherwise start from `defaults`.
    pub fn open(path: Option<PathBuf>, defaults: Preferences) -> Result<Self, StoreError> {
        let Some(path) = path else {
            return Ok(Self::in_memory(defaults));
        };

        let prefs = if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            let mut prefs: Preferences = serde_json::from_reader(reader)?;
            prefs.currency = normalize_currency(&prefs.currency)?;
            tracing::info!(path = %path.display(), currency = %prefs.currency, "Loaded preferences");
            prefs
        } else {
            tracing::debug!(path = %path.display(), "No preference file, using defaults");
            defaults
        };

        Ok(Self {
            state: RwLock::new(prefs),
            persistence_path: Some(path),
        })
    }

    /// Open the store described by the `[preferences]` config section.
    pub fn from_config(config: &PreferencesConfig) -> Result<Self, StoreError> {
        let defaults = Preferences {
            currency: normalize_currency(&config.default_currency)?,
            ..Preferences::default()
        };
        Self::open(config.persistence_path.as_ref().map(PathBuf::from), defaults)
    }

    pub fn snapshot(&self) -> Preferences {
        self.read().clone()
    }

    pub fn currency(&self) -> String {
        self.read().currency.clone()
    }

    /// Returns whether the value changed.
    pub fn set_currency(&self, code: &str) -> Result<bool, StoreError> {
        let code = normalize_currency(code)?;
        self.update(|prefs| {
            if prefs.currency == code {
                return false;
            }
            prefs.currency = code;
            true
        })
    }

    pub fn panel_visible(&self, panel: &str) -> bool {
        self.read().panels.get(panel).copied().unwrap_or(true)
    }

    pub fn set_panel_visible(&self, panel: &str, visible: bool) -> Result<bool, StoreError> {
        self.update(|prefs| {
            if prefs.panels.get(panel).copied().unwrap_or(true) == visible {
                return false;
            }
            prefs.panels.insert(panel.to_string(), visible);
            true
        })
    }

    pub fn view_mode(&self) -> ViewMode {
        self.read().view_mode
    }

    pub fn set_view_mode(&self, mode: ViewMode) -> Result<bool, StoreError> {
        self.update(|prefs| {
            if prefs.view_mode == mode {
                return false;
            }
            prefs.view_mode = mode;
            true
        })
    }

    /// End the session, flushing the final state.
    pub fn close(self) -> Result<(), StoreError> {
        let prefs = self.snapshot();
        self.save(&prefs)?;
        tracing::debug!("Preference store closed");
        Ok(())
    }

    fn read(&self) -> RwLockReadGuard<'_, Preferences> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `f` to a copy, persist it, then publish it.
    ///
    /// The write lock is held across the save so writes reach disk in the
    /// same order they reach memory.
    fn update(&self, f: impl FnOnce(&mut Preferences) -> bool) -> Result<bool, StoreError> {
        let mut prefs = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = prefs.clone();
        if !f(&mut next) {
            return Ok(false);
        }

        self.save(&next)?;
        *prefs = next;
        Ok(true)
    }

    fn save(&self, prefs: &Preferences) -> Result<(), StoreError> {
        if let Some(path) = &self.persistence_path {
            write_preferences(path, prefs)?;
        }
        Ok(())
    }
}

/// Write to a sibling temp file, then rename it over `path`.
fn write_preferences(path: &Path, prefs: &Preferences) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir)?;
    let mut writer = BufWriter::new(temp.as_file_mut());
    serde_json::to_writer_pretty(&mut writer, prefs)?;
    writer.flush()?;
    drop(writer);

    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_currency() {
        assert_eq!(normalize_currency("eur").unwrap(), "EUR");
        assert_eq!(normalize_currency(" BRL ").unwrap(), "BRL");
        assert!(matches!(
            normalize_currency("EURO"),
            Err(StoreError::InvalidCurrency(_))
        ));
        assert!(normalize_currency("U$D").is_err());
    }

    #[test]
    fn test_in_memory_changes() {
        let store = PreferenceStore::in_memory(Preferences::default());
        assert_eq!(store.currency(), "USD");
        assert!(store.set_currency("gbp").unwrap());
        assert!(!store.set_currency("GBP").unwrap());
        assert_eq!(store.currency(), "GBP");

        assert!(store.panel_visible("summary"));
        assert!(store.set_panel_visible("summary", false).unwrap());
        assert!(!store.panel_visible("summary"));

        assert!(!store.set_view_mode(ViewMode::Table).unwrap());
        assert!(store.set_view_mode(ViewMode::Cards).unwrap());
        assert_eq!(store.view_mode(), ViewMode::Cards);
    }

    #[test]
    fn test_from_config_uses_default_currency() {
        let config = PreferencesConfig {
            persistence_path: None,
            default_currency: "jpy".into(),
        };
        let store = PreferenceStore::from_config(&config).unwrap();
        assert_eq!(store.currency(), "JPY");
    }

    #[test]
    fn test_invalid_currency_leaves_state_alone() {
        let store = PreferenceStore::in_memory(Preferences::default());
        assert!(store.set_currency("dollars").is_err());
        assert_eq!(store.currency(), "USD");
    }

    #[test]
    fn test_persists_across_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        let store = PreferenceStore::open(Some(path.clone()), Preferences::default()).unwrap();
        store.set_currency("JPY").unwrap();
        store.set_panel_visible("charts", false).unwrap();
        store.close().unwrap();

        let reopened = PreferenceStore::open(Some(path), Preferences::default()).unwrap();
        assert_eq!(reopened.currency(), "JPY");
        assert!(!reopened.panel_visible("charts"));
        assert_eq!(reopened.view_mode(), ViewMode::Table);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = PreferenceStore::open(Some(path), Preferences::default()).unwrap_err();
        assert!(matches!(err, StoreError::Parse(_)));
    }

    #[test]
    fn test_failed_save_keeps_previous_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("prefs.json");

        let store = PreferenceStore::open(Some(path.clone()), Preferences::default()).unwrap();
        let err = store.set_currency("EUR").unwrap_err();

        assert!(matches!(err, StoreError::Io(_)));
        assert_eq!(store.currency(), "USD");
        assert!(!path.exists());
    }

    #[test]
    fn test_save_replaces_file_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        let store = PreferenceStore::open(Some(path.clone()), Preferences::default()).unwrap();
        store.set_currency("CAD").unwrap();
        store.set_view_mode(ViewMode::Cards).unwrap();

        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);

        let saved: Preferences =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved.currency, "CAD");
        assert_eq!(saved.view_mode, ViewMode::Cards);
    }
}
