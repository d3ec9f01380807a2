//! Shared harness for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use serde_json::Value;

use expense_guard::batching::{FormFields, StateCell, StateMap, StateSetters};
use expense_guard::clock::ManualClock;
use expense_guard::resilience::{CircuitBreaker, CircuitBreakerConfig};

/// Host-side state for every category, backed by counting cells.
#[derive(Default)]
pub struct HostState {
    pub loading: Arc<StateCell<StateMap<bool>>>,
    pub optimistic: Arc<StateCell<StateMap<Value>>>,
    pub errors: Arc<StateCell<StateMap<String>>>,
    pub editing_cells: Arc<StateCell<StateMap<bool>>>,
    pub new_row_forms: Arc<StateCell<StateMap<FormFields>>>,
    pub hovered_rows: Arc<StateCell<StateMap<bool>>>,
    pub new_rows: Arc<StateCell<StateMap<Value>>>,
}

impl HostState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Setters for all seven categories.
    pub fn setters(&self) -> StateSetters {
        StateSetters::new(
            self.loading.clone(),
            self.optimistic.clone(),
            self.errors.clone(),
            self.editing_cells.clone(),
        )
        .with_new_row_forms(self.new_row_forms.clone())
        .with_hovered_rows(self.hovered_rows.clone())
        .with_new_rows(self.new_rows.clone())
    }

    /// Total setter calls across every category.
    pub fn total_commits(&self) -> usize {
        self.loading.commits()
            + self.optimistic.commits()
            + self.errors.commits()
            + self.editing_cells.commits()
            + self.new_row_forms.commits()
            + self.hovered_rows.commits()
            + self.new_rows.commits()
    }
}

/// Breaker on a manual clock starting at t=0.
pub fn manual_breaker(
    name: &str,
    failure_threshold: u32,
    reset_timeout_ms: u64,
) -> (Arc<CircuitBreaker>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(0));
    let breaker = Arc::new(CircuitBreaker::with_clock(
        CircuitBreakerConfig::new(name, failure_threshold, reset_timeout_ms),
        clock.clone(),
    ));
    (breaker, clock)
}

/// Backend stand-in that fails its first `failures` calls.
pub struct FlakyBackend {
    calls: AtomicU32,
    failures: u32,
}

impl FlakyBackend {
    pub fn new(failures: u32) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            failures,
        })
    }

    pub async fn call(&self) -> Result<u32, String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::task::yield_now().await;
        if n <= self.failures {
            Err(format!("backend unavailable (call {n})"))
        } else {
            Ok(n)
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}
