//! Preconfigured breaker profiles.
//!
//! Writes trip early and stay open long; cache lookups tolerate more noise
//! and recover quickly.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::resilience::circuit_breaker::{
    CircuitBreakerConfig, DEFAULT_HALF_OPEN_SUCCESSES, DEFAULT_MONITORING_WINDOW_MS,
};

/// Profile name → settings. Ordered so listings are stable.
pub type ProfileTable = BTreeMap<String, BreakerProfile>;

/// Breaker settings without a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerProfile {
    pub failure_threshold: u32,
    pub reset_timeout_ms: u64,
    pub monitoring_window_ms: u64,
    pub success_threshold: u32,
}

impl Default for BreakerProfile {
    fn default() -> Self {
        API
    }
}

impl BreakerProfile {
    /// Bind the profile to a breaker name.
    pub fn config(&self, name: impl Into<String>) -> CircuitBreakerConfig {
        CircuitBreakerConfig::new(name, self.failure_threshold, self.reset_timeout_ms)
            .with_monitoring_window(self.monitoring_window_ms)
            .with_success_threshold(self.success_threshold)
    }
}

/// Create/update/delete of cost records.
pub const MUTATION: BreakerProfile = BreakerProfile {
    failure_threshold: 3,
    reset_timeout_ms: 30_000,
    monitoring_window_ms: DEFAULT_MONITORING_WINDOW_MS,
    success_threshold: DEFAULT_HALF_OPEN_SUCCESSES,
};

/// Read paths (lists, dashboards).
pub const QUERY: BreakerProfile = BreakerProfile {
    failure_threshold: 5,
    reset_timeout_ms: 15_000,
    monitoring_window_ms: DEFAULT_MONITORING_WINDOW_MS,
    success_threshold: DEFAULT_HALF_OPEN_SUCCESSES,
};

/// Cache reads and revalidation.
pub const CACHE: BreakerProfile = BreakerProfile {
    failure_threshold: 10,
    reset_timeout_ms: 5_000,
    monitoring_window_ms: 30_000,
    success_threshold: DEFAULT_HALF_OPEN_SUCCESSES,
};

/// Third-party HTTP APIs (exchange rates, identity provider).
pub const API: BreakerProfile = BreakerProfile {
    failure_threshold: 5,
    reset_timeout_ms: 60_000,
    monitoring_window_ms: 120_000,
    success_threshold: DEFAULT_HALF_OPEN_SUCCESSES,
};

const BUILTIN: [(&str, BreakerProfile); 4] = [
    ("api", API),
    ("cache", CACHE),
    ("mutation", MUTATION),
    ("query", QUERY),
];

/// Look up a built-in profile by name.
pub fn builtin(name: &str) -> Option<BreakerProfile> {
    BUILTIN
        .iter()
        .find(|(profile, _)| *profile == name)
        .map(|(_, profile)| *profile)
}

pub fn builtin_table() -> ProfileTable {
    BUILTIN
        .iter()
        .map(|(name, profile)| (name.to_string(), *profile))
        .collect()
}
