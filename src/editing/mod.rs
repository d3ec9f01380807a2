//! Editing flows that combine the breaker with batched state updates.
//!
//! # Data Flow
//! ```text
//! User edits a cell:
//!     → start batch (loading on, optimistic value, clear stale error)
//!     → circuit breaker guards the persistence call
//!     → settle batch (loading off, optimistic cleared, error or editing off)
//! ```

pub mod inline;

pub use inline::{CellEdit, InlineEditor};
