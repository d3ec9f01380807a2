//! Circuit breaker for backend protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: probing whether the dependency recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= failure_threshold
//! Open → Half-Open: first call at or after next_attempt_time
//! Half-Open → Closed: success_threshold consecutive successes
//! Half-Open → Open: any failure
//! ```
//!
//! # Design Decisions
//! - One breaker per guarded dependency (see `registry.rs`)
//! - Fail fast in Open state; the wrapped operation is never invoked
//! - No automatic retries; the caller decides when to try again
//! - The state lock is never held while the wrapped operation runs

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::{Clock, SystemClock};
use crate::observability::metrics;

/// Consecutive half-open successes needed to close the circuit.
pub const DEFAULT_HALF_OPEN_SUCCESSES: u32 = 2;

/// Failures further apart than this no longer count as one streak.
pub const DEFAULT_MONITORING_WINDOW_MS: u64 = 60_000;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    #[default]
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    /// Label form used for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }

    /// Gauge value: 0=closed, 1=open, 2=half-open.
    pub fn code(&self) -> u8 {
        match self {
            CircuitState::Closed => 0,
            CircuitState::Open => 1,
            CircuitState::HalfOpen => 2,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Construction-time settings for a breaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Identifier for logs and metrics.
    pub name: String,

    /// Consecutive failures that trip the circuit.
    pub failure_threshold: u32,

    /// How long the circuit stays open before a probe is allowed.
    pub reset_timeout_ms: u64,

    /// Maximum gap between failures for them to count as one streak.
    /// Zero disables the window.
    pub monitoring_window_ms: u64,

    /// Consecutive half-open successes required to close.
    pub success_threshold: u32,
}

impl CircuitBreakerConfig {
    pub fn new(name: impl Into<String>, failure_threshold: u32, reset_timeout_ms: u64) -> Self {
        Self {
            name: name.into(),
            failure_threshold,
            reset_timeout_ms,
            monitoring_window_ms: DEFAULT_MONITORING_WINDOW_MS,
            success_threshold: DEFAULT_HALF_OPEN_SUCCESSES,
        }
    }

    pub fn with_monitoring_window(mut self, window_ms: u64) -> Self {
        self.monitoring_window_ms = window_ms;
        self
    }

    pub fn with_success_threshold(mut self, successes: u32) -> Self {
        self.success_threshold = successes;
        self
    }
}

/// Raised instead of running the operation while the circuit is open.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("circuit breaker '{name}' is {state}; retry in {retry_after_ms}ms")]
pub struct CircuitBreakerError {
    pub name: String,
    pub state: CircuitState,
    pub retry_after_ms: u64,
}

/// Outcome of a guarded call that did not succeed.
///
/// `Operation` carries the wrapped operation's own error untouched.
#[derive(Debug, Error)]
pub enum ExecuteError<E> {
    #[error(transparent)]
    Rejected(#[from] CircuitBreakerError),

    #[error("{0}")]
    Operation(E),
}

impl<E> ExecuteError<E> {
    pub fn is_rejected(&self) -> bool {
        matches!(self, ExecuteError::Rejected(_))
    }

    pub fn rejection(&self) -> Option<&CircuitBreakerError> {
        match self {
            ExecuteError::Rejected(e) => Some(e),
            ExecuteError::Operation(_) => None,
        }
    }

    /// The wrapped operation's error, if the operation actually ran.
    pub fn into_operation(self) -> Option<E> {
        match self {
            ExecuteError::Rejected(_) => None,
            ExecuteError::Operation(e) => Some(e),
        }
    }
}

/// Point-in-time snapshot returned by [`CircuitBreaker::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerStatus {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub failure_threshold: u32,
    pub last_failure_time: u64,
    pub next_attempt_time: u64,
    pub is_open: bool,
    pub can_attempt: bool,
}

#[derive(Debug, Default)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    last_failure_time: u64,
    next_attempt_time: u64,
    successes_in_half_open: u32,
}

/// Guards a fallible operation against a persistently failing dependency.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a breaker on the wall clock.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Zero thresholds and timeouts are raised to 1 so an open circuit
    /// always has `next_attempt_time > last_failure_time`.
    pub fn with_clock(mut config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        config.failure_threshold = config.failure_threshold.max(1);
        config.reset_timeout_ms = config.reset_timeout_ms.max(1);
        config.success_threshold = config.success_threshold.max(1);
        metrics::record_breaker_state(&config.name, CircuitState::Closed);
        Self {
            config,
            clock,
            inner: Mutex::new(BreakerState::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Run an async operation through the breaker.
    ///
    /// # Errors
    ///
    /// [`ExecuteError::Rejected`] when the circuit is open and the reset
    /// timeout has not elapsed (the operation is not invoked), otherwise
    /// [`ExecuteError::Operation`] with whatever the operation returned.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, ExecuteError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.acquire()?;

        match operation().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(e) => {
                self.on_failure();
                Err(ExecuteError::Operation(e))
            }
        }
    }

    /// Synchronous counterpart of [`CircuitBreaker::execute`].
    pub fn execute_sync<F, T, E>(&self, operation: F) -> Result<T, ExecuteError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        self.acquire()?;

        match operation() {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(e) => {
                self.on_failure();
                Err(ExecuteError::Operation(e))
            }
        }
    }

    pub fn status(&self) -> BreakerStatus {
        let now = self.clock.now_ms();
        let st = self.lock();
        let state = st.state;

        BreakerStatus {
            name: self.config.name.clone(),
            state,
            failure_count: st.failure_count,
            failure_threshold: self.config.failure_threshold,
            last_failure_time: st.last_failure_time,
            next_attempt_time: st.next_attempt_time,
            is_open: state == CircuitState::Open,
            can_attempt: state != CircuitState::Open || now >= st.next_attempt_time,
        }
    }

    /// Clear all history and close the circuit.
    pub fn reset(&self) {
        let mut st = self.lock();
        self.transition(&mut st, CircuitState::Closed);
        st.failure_count = 0;
        st.last_failure_time = 0;
        st.next_attempt_time = 0;
        st.successes_in_half_open = 0;

        tracing::info!(breaker = %self.config.name, "Circuit breaker reset");
    }

    /// Open the circuit for `duration_ms` (at least 1) regardless of
    /// failure history.
    pub fn force_open(&self, duration_ms: u64) {
        let now = self.clock.now_ms();
        let mut st = self.lock();
        st.next_attempt_time = now.saturating_add(duration_ms.max(1));
        st.successes_in_half_open = 0;
        self.transition(&mut st, CircuitState::Open);

        tracing::warn!(
            breaker = %self.config.name,
            duration_ms,
            next_attempt_time = st.next_attempt_time,
            "Circuit breaker forced open"
        );
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decide whether a call may run, moving Open → Half-Open when due.
    fn acquire(&self) -> Result<(), CircuitBreakerError> {
        let now = self.clock.now_ms();
        let mut st = self.lock();

        if st.state == CircuitState::Open {
            if now < st.next_attempt_time {
                metrics::record_breaker_rejection(&self.config.name);
                tracing::debug!(
                    breaker = %self.config.name,
                    retry_after_ms = st.next_attempt_time - now,
                    "Call rejected: circuit open"
                );
                return Err(CircuitBreakerError {
                    name: self.config.name.clone(),
                    state: CircuitState::Open,
                    retry_after_ms: st.next_attempt_time - now,
                });
            }

            st.successes_in_half_open = 0;
            self.transition(&mut st, CircuitState::HalfOpen);
        }

        Ok(())
    }

    fn on_success(&self) {
        let mut st = self.lock();
        match st.state {
            CircuitState::Closed => st.failure_count = 0,
            CircuitState::HalfOpen => {
                st.successes_in_half_open += 1;
                if st.successes_in_half_open >= self.config.success_threshold {
                    st.failure_count = 0;
                    st.successes_in_half_open = 0;
                    self.transition(&mut st, CircuitState::Closed);
                }
            }
            // Admitted before a force_open; the forced window wins.
            CircuitState::Open => {}
        }
    }

    fn on_failure(&self) {
        let now = self.clock.now_ms();
        let mut st = self.lock();
        metrics::record_breaker_failure(&self.config.name);

        match st.state {
            CircuitState::Closed => {
                let window = self.config.monitoring_window_ms;
                if window > 0
                    && st.last_failure_time > 0
                    && now.saturating_sub(st.last_failure_time) > window
                {
                    st.failure_count = 0;
                }

                st.failure_count = st.failure_count.saturating_add(1);
                st.last_failure_time = now;

                if st.failure_count >= self.config.failure_threshold {
                    self.trip(&mut st, now);
                }
            }
            CircuitState::HalfOpen => {
                st.failure_count = st.failure_count.saturating_add(1);
                st.last_failure_time = now;
                self.trip(&mut st, now);
            }
            CircuitState::Open => {}
        }
    }

    fn trip(&self, st: &mut BreakerState, now: u64) {
        st.next_attempt_time = now.saturating_add(self.config.reset_timeout_ms);
        st.successes_in_half_open = 0;
        self.transition(st, CircuitState::Open);
    }

    fn transition(&self, st: &mut BreakerState, to: CircuitState) {
        let from = st.state;
        if from == to {
            return;
        }
        st.state = to;
        metrics::record_breaker_transition(&self.config.name, from, to);

        match to {
            CircuitState::Open => tracing::warn!(
                breaker = %self.config.name,
                from = %from,
                failure_count = st.failure_count,
                next_attempt_time = st.next_attempt_time,
                "Circuit opened"
            ),
            CircuitState::HalfOpen => tracing::info!(
                breaker = %self.config.name,
                "Circuit half-open, probing"
            ),
            CircuitState::Closed => tracing::info!(
                breaker = %self.config.name,
                from = %from,
                "Circuit closed"
            ),
        }
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::cell::Cell;

    const START: u64 = 1_700_000_000_000;

    fn breaker(threshold: u32, reset_ms: u64) -> (CircuitBreaker, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(START));
        let config = CircuitBreakerConfig::new("test", threshold, reset_ms);
        (CircuitBreaker::with_clock(config, clock.clone()), clock)
    }

    fn fail(cb: &CircuitBreaker) {
        let _ = cb.execute_sync(|| Err::<(), _>("boom"));
    }

    fn succeed(cb: &CircuitBreaker) {
        cb.execute_sync(|| Ok::<_, &str>(())).unwrap();
    }

    #[test]
    fn test_stays_closed_below_threshold() {
        let (cb, _) = breaker(5, 1_000);
        for n in 1..5 {
            fail(&cb);
            let status = cb.status();
            assert_eq!(status.state, CircuitState::Closed);
            assert_eq!(status.failure_count, n);
        }
    }

    #[test]
    fn test_opens_at_threshold() {
        let (cb, _) = breaker(3, 1_000);
        for _ in 0..3 {
            fail(&cb);
        }
        let status = cb.status();
        assert_eq!(status.state, CircuitState::Open);
        assert_eq!(status.failure_count, 3);
        assert!(status.is_open);
        assert!(!status.can_attempt);
        assert_eq!(status.next_attempt_time, START + 1_000);
        assert!(status.next_attempt_time > status.last_failure_time);
    }

    #[test]
    fn test_success_resets_failure_count() {
        let (cb, _) = breaker(3, 1_000);
        fail(&cb);
        fail(&cb);
        succeed(&cb);
        assert_eq!(cb.status().failure_count, 0);
        fail(&cb);
        fail(&cb);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_open_rejects_without_invoking() {
        let (cb, clock) = breaker(1, 1_000);
        fail(&cb);

        let calls = Cell::new(0);
        clock.advance(999);
        let result = cb.execute_sync(|| {
            calls.set(calls.get() + 1);
            Ok::<_, &str>(())
        });

        let err = result.unwrap_err();
        assert!(err.is_rejected());
        let rejection = err.rejection().unwrap();
        assert_eq!(rejection.name, "test");
        assert_eq!(rejection.state, CircuitState::Open);
        assert_eq!(rejection.retry_after_ms, 1);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_half_open_closes_after_two_successes() {
        let (cb, clock) = breaker(2, 500);
        fail(&cb);
        fail(&cb);
        clock.advance(500);
        assert!(cb.status().can_attempt);

        succeed(&cb);
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        succeed(&cb);
        let status = cb.status();
        assert_eq!(status.state, CircuitState::Closed);
        assert_eq!(status.failure_count, 0);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let (cb, clock) = breaker(2, 500);
        fail(&cb);
        fail(&cb);
        clock.advance(600);
        succeed(&cb);
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        clock.advance(50);
        fail(&cb);
        let status = cb.status();
        assert_eq!(status.state, CircuitState::Open);
        assert_eq!(status.next_attempt_time, START + 650 + 500);

        // The earlier half-open success must not count toward closing.
        clock.advance(500);
        succeed(&cb);
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn test_operation_error_passes_through() {
        let (cb, _) = breaker(3, 1_000);
        let err = cb.execute_sync(|| Err::<(), _>(42u32)).unwrap_err();
        assert_eq!(err.into_operation(), Some(42));
    }

    #[test]
    fn test_reset_clears_everything() {
        let (cb, _) = breaker(1, 1_000);
        fail(&cb);
        assert_eq!(cb.state(), CircuitState::Open);

        cb.reset();
        let status = cb.status();
        assert_eq!(status.state, CircuitState::Closed);
        assert_eq!(status.failure_count, 0);
        assert_eq!(status.last_failure_time, 0);
        assert_eq!(status.next_attempt_time, 0);
    }

    #[test]
    fn test_force_open_from_closed() {
        let (cb, clock) = breaker(10, 1_000);
        cb.force_open(5_000);
        let status = cb.status();
        assert_eq!(status.state, CircuitState::Open);
        assert_eq!(status.next_attempt_time, START + 5_000);

        clock.advance(4_999);
        assert!(cb.execute_sync(|| Ok::<_, &str>(())).unwrap_err().is_rejected());
        clock.advance(1);
        succeed(&cb);
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn test_stale_failures_fall_out_of_window() {
        let clock = Arc::new(ManualClock::new(START));
        let config = CircuitBreakerConfig::new("windowed", 3, 1_000).with_monitoring_window(10_000);
        let cb = CircuitBreaker::with_clock(config, clock.clone());

        fail(&cb);
        fail(&cb);
        clock.advance(10_001);
        fail(&cb);
        let status = cb.status();
        assert_eq!(status.state, CircuitState::Closed);
        assert_eq!(status.failure_count, 1);
    }

    #[test]
    fn test_state_serializes_screaming_case() {
        let json = serde_json::to_string(&CircuitState::HalfOpen).unwrap();
        assert_eq!(json, "\"HALF_OPEN\"");
        assert_eq!(CircuitState::HalfOpen.to_string(), "HALF_OPEN");
    }

    #[test]
    fn test_zero_settings_are_raised_to_one() {
        let (cb, clock) = breaker(0, 0);
        assert_eq!(cb.config().failure_threshold, 1);
        assert_eq!(cb.config().reset_timeout_ms, 1);

        fail(&cb);
        let status = cb.status();
        assert_eq!(status.state, CircuitState::Open);
        assert!(status.next_attempt_time > status.last_failure_time);

        clock.advance(1);
        succeed(&cb);
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn test_force_open_zero_still_ahead_of_last_failure() {
        let (cb, _clock) = breaker(3, 1_000);
        fail(&cb);
        cb.force_open(0);

        let status = cb.status();
        assert!(status.is_open);
        assert!(status.next_attempt_time > status.last_failure_time);
        assert!(cb.execute_sync(|| Ok::<_, &str>(())).unwrap_err().is_rejected());
    }
}
