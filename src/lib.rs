//! Resilience and state-coordination core for the expense tracker client.
//!
//! # Architecture Overview
//!
//! ```text
//!   UI action (edit cell, create row)
//!        │
//!        ▼
//!   ┌──────────────┐   guarded call   ┌──────────────────┐
//!   │   editing    │─────────────────▶│    resilience    │──▶ backend
//!   │ InlineEditor │                  │ CircuitBreaker   │
//!   └──────┬───────┘                  └──────────────────┘
//!          │ batches
//!          ▼
//!   ┌──────────────────────┐  one unit  ┌─────────────┐
//!   │       batching       │───────────▶│  scheduler  │──▶ host state setters
//!   │ BatchedStateCoord.   │            └─────────────┘
//!   └──────────────────────┘
//!
//!   Cross-cutting: config (TOML + hot reload), observability (tracing,
//!   metrics), clock (injectable time), preferences (session store)
//! ```

pub mod batching;
pub mod clock;
pub mod config;
pub mod editing;
pub mod observability;
pub mod preferences;
pub mod resilience;

pub use batching::{BatchRequest, BatchedStateCoordinator, StateSetters, StateUpdateOperation};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::GuardConfig;
pub use editing::{CellEdit, InlineEditor};
pub use preferences::PreferenceStore;
pub use resilience::{BreakerRegistry, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState, ExecuteError};
