//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds and timeouts > 0)
//! - Check formats serde cannot (currency codes, socket addresses)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GuardConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GuardConfig;
use crate::preferences::store::normalize_currency;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("breaker profile '{profile}': failure_threshold must be > 0")]
    ZeroFailureThreshold { profile: String },

    #[error("breaker profile '{profile}': reset_timeout_ms must be > 0")]
    ZeroResetTimeout { profile: String },

    #[error("breaker profile '{profile}': success_threshold must be > 0")]
    ZeroSuccessThreshold { profile: String },

    #[error("preferences.default_currency '{0}' is not a three-letter code")]
    InvalidCurrency(String),

    #[error("observability.metrics_address '{0}' is not a socket address")]
    InvalidMetricsAddress(String),
}

pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (name, profile) in &config.breakers {
        if profile.failure_threshold == 0 {
            errors.push(ValidationError::ZeroFailureThreshold {
                profile: name.clone(),
            });
        }
        if profile.reset_timeout_ms == 0 {
            errors.push(ValidationError::ZeroResetTimeout {
                profile: name.clone(),
            });
        }
        if profile.success_threshold == 0 {
            errors.push(ValidationError::ZeroSuccessThreshold {
                profile: name.clone(),
            });
        }
    }

    if normalize_currency(&config.preferences.default_currency).is_err() {
        errors.push(ValidationError::InvalidCurrency(
            config.preferences.default_currency.clone(),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::profiles::{BreakerProfile, MUTATION};

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GuardConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = GuardConfig::default();
        config.breakers.insert(
            "broken".into(),
            BreakerProfile {
                failure_threshold: 0,
                reset_timeout_ms: 0,
                ..MUTATION
            },
        );
        config.preferences.default_currency = "euro".into();
        config.observability.metrics_enabled = true;
        config.observability.metrics_address = "nowhere".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::ZeroFailureThreshold {
            profile: "broken".into()
        }));
        assert!(errors.contains(&ValidationError::InvalidMetricsAddress("nowhere".into())));
    }

    #[test]
    fn test_metrics_address_ignored_when_disabled() {
        let mut config = GuardConfig::default();
        config.observability.metrics_address = "nowhere".into();
        assert!(validate_config(&config).is_ok());
    }
}
