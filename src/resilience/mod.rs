//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to backend:
//!     → registry.rs (look up the breaker for this dependency)
//!     → circuit_breaker.rs (reject fast if open, else run and record outcome)
//!     → caller (decides whether and when to retry)
//! ```
//!
//! # Design Decisions
//! - Circuit breaker prevents cascading failures
//! - Breaker settings come from named profiles (profiles.rs)
//! - Retries are never automatic

pub mod circuit_breaker;
pub mod profiles;
pub mod registry;

pub use circuit_breaker::{
    BreakerStatus, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState,
    ExecuteError,
};
pub use profiles::{BreakerProfile, ProfileTable};
pub use registry::{BreakerRegistry, RegistryError};
