//! User preference state.
//!
//! # Responsibilities
//! - Hold the display currency, panel visibility and list view mode
//! - Load on session start, write through on change, flush on close
//!
//! # Design Decisions
//! - An explicit handle owned by the session, never a process-wide global
//! - JSON file persistence; in-memory when no path is configured
//! - Writes happen only when a value actually changes

pub mod store;

pub use store::{PreferenceStore, Preferences, StoreError, ViewMode};
