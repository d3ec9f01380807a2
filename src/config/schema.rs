//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.
//! Every field has a default so an empty file is a valid config.

use serde::{Deserialize, Serialize};

use crate::resilience::profiles::{self, ProfileTable};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Breaker profiles by name. Names not listed fall back to built-ins.
    pub breakers: ProfileTable,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Preference store settings.
    pub preferences: PreferencesConfig,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            breakers: profiles::builtin_table(),
            observability: ObservabilityConfig::default(),
            preferences: PreferencesConfig::default(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Tracing filter directive used when `RUST_LOG` is unset.
    pub log_filter: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "expense_guard=info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Preference store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PreferencesConfig {
    /// JSON file to persist preferences to. In-memory when unset.
    pub persistence_path: Option<String>,

    /// Display currency for sessions without a saved preference.
    pub default_currency: String,
}

impl Default for PreferencesConfig {
    fn default() -> Self {
        Self {
            persistence_path: None,
            default_currency: "USD".to_string(),
        }
    }
}
