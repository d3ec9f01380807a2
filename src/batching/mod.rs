//! Batched state coordination subsystem.
//!
//! # Data Flow
//! ```text
//! Call site (e.g. inline cell edit):
//!     → ops.rs (build StateUpdateOperation values)
//!     → coordinator.rs (group by kind, fold each group into one updater)
//!     → scheduler.rs (one commit unit per batch)
//!     → setter.rs (one set_state call per kind, host-owned state)
//!     → on_complete / on_error callbacks
//! ```
//!
//! # Design Decisions
//! - Operations are a tagged enum, one variant per state kind
//! - Scheduling is injected; the grouping logic never depends on a UI runtime
//! - Setter failures are reported to callbacks, never to the submitter

pub mod coordinator;
pub mod operation;
pub mod ops;
pub mod scheduler;
pub mod setter;

pub use coordinator::{BatchError, BatchRequest, BatchedStateCoordinator, SharedSetter, StateSetters};
pub use operation::{FormFields, MapOp, StateKind, StateMap, StateUpdateOperation};
pub use scheduler::{CommitScheduler, CommitUnit, DeferredScheduler, ImmediateScheduler};
pub use setter::{SetStateAction, SetterError, StateCell, StateSetter};
