//! Commit scheduling.
//!
//! The host decides when a batch becomes visible. The coordinator hands it
//! one [`CommitUnit`] per batch and never runs setters outside of it.

use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError};

/// Everything one batch does, run as a single update pass.
pub type CommitUnit = Box<dyn FnOnce() + Send>;

pub trait CommitScheduler: Send + Sync {
    fn schedule(&self, unit: CommitUnit);
}

/// Runs each unit as soon as it is scheduled.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateScheduler;

impl CommitScheduler for ImmediateScheduler {
    fn schedule(&self, unit: CommitUnit) {
        unit();
    }
}

/// Queues units until the host's next update pass calls [`flush`].
///
/// [`flush`]: DeferredScheduler::flush
#[derive(Default)]
pub struct DeferredScheduler {
    queue: Mutex<VecDeque<CommitUnit>>,
}

impl DeferredScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Run every unit queued before this call, oldest first.
    ///
    /// Units scheduled while flushing wait for the next flush, so a commit
    /// that triggers another batch cannot spin this pass forever.
    pub fn flush(&self) -> usize {
        let units: Vec<CommitUnit> = self
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();

        let count = units.len();
        for unit in units {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(unit)) {
                tracing::error!(
                    panic = %panic_message(payload.as_ref()),
                    "Commit unit panicked, continuing flush"
                );
            }
        }
        count
    }
}

impl CommitScheduler for DeferredScheduler {
    fn schedule(&self, unit: CommitUnit) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(unit);
    }
}

impl fmt::Debug for DeferredScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredScheduler")
            .field("pending", &self.pending())
            .finish()
    }
}

/// Text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_deferred_runs_in_order_on_flush() {
        let scheduler = DeferredScheduler::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let log = log.clone();
            scheduler.schedule(Box::new(move || log.lock().unwrap().push(i)));
        }
        assert_eq!(scheduler.pending(), 3);
        assert!(log.lock().unwrap().is_empty());

        assert_eq!(scheduler.flush(), 3);
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_units_scheduled_during_flush_wait() {
        let scheduler = Arc::new(DeferredScheduler::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let inner_scheduler = scheduler.clone();
        let inner_runs = runs.clone();
        scheduler.schedule(Box::new(move || {
            inner_runs.fetch_add(1, Ordering::SeqCst);
            let again = inner_runs.clone();
            inner_scheduler.schedule(Box::new(move || {
                again.fetch_add(1, Ordering::SeqCst);
            }));
        }));

        assert_eq!(scheduler.flush(), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending(), 1);
        assert_eq!(scheduler.flush(), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_panicking_unit_does_not_drop_later_units() {
        let scheduler = DeferredScheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let before = runs.clone();
        scheduler.schedule(Box::new(move || {
            before.fetch_add(1, Ordering::SeqCst);
        }));
        scheduler.schedule(Box::new(|| panic!("unit failed")));
        let after = runs.clone();
        scheduler.schedule(Box::new(move || {
            after.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(scheduler.flush(), 3);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_panic_message_variants() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn Any + Send> = Box::new("borrowed");
        let other: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(borrowed.as_ref()), "borrowed");
        assert_eq!(panic_message(other.as_ref()), "unknown panic");
    }
}
