//! Named breaker registry.
//!
//! # Responsibilities
//! - Hand every call site guarding the same dependency the same breaker
//! - Resolve profiles from configuration, falling back to built-ins
//! - Accept profile tables from config hot reload
//!
//! # Design Decisions
//! - Breakers are created lazily on first use
//! - Reloading profiles only affects breakers created afterwards;
//!   live breakers keep their settings and history

use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use thiserror::Error;

use crate::clock::{Clock, SystemClock};
use crate::resilience::circuit_breaker::{BreakerStatus, CircuitBreaker};
use crate::resilience::profiles::{self, BreakerProfile, ProfileTable};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown breaker profile '{0}'")]
    UnknownProfile(String),
}

pub struct BreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    profiles: ArcSwap<ProfileTable>,
    clock: Arc<dyn Clock>,
}

impl BreakerRegistry {
    pub fn new(profiles: ProfileTable) -> Self {
        Self::with_clock(profiles, Arc::new(SystemClock))
    }

    pub fn with_clock(profiles: ProfileTable, clock: Arc<dyn Clock>) -> Self {
        Self {
            breakers: DashMap::new(),
            profiles: ArcSwap::from_pointee(profiles),
            clock,
        }
    }

    /// Fetch the breaker called `name`, creating it from `profile` if needed.
    pub fn get_or_create(
        &self,
        name: &str,
        profile: &str,
    ) -> Result<Arc<CircuitBreaker>, RegistryError> {
        if let Some(existing) = self.breakers.get(name) {
            return Ok(existing.value().clone());
        }

        let profile = self.resolve(profile)?;
        let breaker = self
            .breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!(breaker = name, "Creating circuit breaker");
                Arc::new(CircuitBreaker::with_clock(
                    profile.config(name),
                    self.clock.clone(),
                ))
            })
            .value()
            .clone();

        Ok(breaker)
    }

    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).map(|r| r.value().clone())
    }

    /// Status of every breaker, sorted by name.
    pub fn statuses(&self) -> Vec<BreakerStatus> {
        let mut statuses: Vec<_> = self.breakers.iter().map(|r| r.value().status()).collect();
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        statuses
    }

    pub fn reset_all(&self) {
        for r in self.breakers.iter() {
            r.value().reset();
        }
    }

    /// Replace the profile table used for breakers created from now on.
    pub fn apply_profiles(&self, table: ProfileTable) {
        tracing::info!(profiles = table.len(), "Breaker profiles updated");
        self.profiles.store(Arc::new(table));
    }

    /// Settings a breaker created now under `profile` would get.
    pub fn profile(&self, profile: &str) -> Option<BreakerProfile> {
        self.resolve(profile).ok()
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    fn resolve(&self, profile: &str) -> Result<BreakerProfile, RegistryError> {
        self.profiles
            .load()
            .get(profile)
            .copied()
            .or_else(|| profiles::builtin(profile))
            .ok_or_else(|| RegistryError::UnknownProfile(profile.to_string()))
    }
}

impl Default for BreakerRegistry {
    fn default() -> Self {
        Self::new(profiles::builtin_table())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::resilience::CircuitState;

    fn registry() -> BreakerRegistry {
        BreakerRegistry::with_clock(ProfileTable::new(), Arc::new(ManualClock::new(1_000)))
    }

    #[test]
    fn test_same_name_shares_breaker() {
        let reg = registry();
        let a = reg.get_or_create("costs.update", "mutation").unwrap();
        let b = reg.get_or_create("costs.update", "cache").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.config().failure_threshold, 3);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_unknown_profile() {
        let reg = registry();
        let err = reg.get_or_create("x", "nope").unwrap_err();
        assert_eq!(err, RegistryError::UnknownProfile("nope".into()));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_configured_profile_overrides_builtin() {
        let mut table = ProfileTable::new();
        table.insert(
            "mutation".into(),
            BreakerProfile {
                failure_threshold: 1,
                ..profiles::MUTATION
            },
        );
        let reg = BreakerRegistry::with_clock(table, Arc::new(ManualClock::new(0)));
        let cb = reg.get_or_create("costs.delete", "mutation").unwrap();
        assert_eq!(cb.config().failure_threshold, 1);
    }

    #[test]
    fn test_apply_profiles_affects_new_breakers_only() {
        let reg = registry();
        let before = reg.get_or_create("a", "query").unwrap();

        let mut table = ProfileTable::new();
        table.insert(
            "query".into(),
            BreakerProfile {
                failure_threshold: 99,
                ..profiles::QUERY
            },
        );
        reg.apply_profiles(table);

        let after = reg.get_or_create("b", "query").unwrap();
        assert_eq!(before.config().failure_threshold, 5);
        assert_eq!(after.config().failure_threshold, 99);
        assert_eq!(reg.profile("query").unwrap().failure_threshold, 99);
        assert_eq!(reg.profile("cache"), Some(profiles::CACHE));
        assert!(reg.profile("missing").is_none());
    }

    #[test]
    fn test_statuses_sorted_and_reset_all() {
        let reg = registry();
        reg.get_or_create("zeta", "api").unwrap().force_open(10_000);
        reg.get_or_create("alpha", "api").unwrap();

        let names: Vec<_> = reg.statuses().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);

        reg.reset_all();
        assert_eq!(reg.get("zeta").unwrap().state(), CircuitState::Closed);
    }
}
