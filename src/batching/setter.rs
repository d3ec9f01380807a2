//! State setter contract.
//!
//! A setter accepts either a replacement value or an updater over the
//! previous value, the same shape as a UI framework's `setState`. The host
//! owns the state; the coordinator only ever calls setters.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;

/// What a setter should do with its current value.
pub enum SetStateAction<V> {
    Replace(V),
    Update(Box<dyn FnOnce(V) -> V + Send>),
}

impl<V> SetStateAction<V> {
    /// Compute the next value from `prev`.
    pub fn resolve(self, prev: V) -> V {
        match self {
            SetStateAction::Replace(next) => next,
            SetStateAction::Update(updater) => updater(prev),
        }
    }
}

/// A setter refused or failed to apply an update.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("state setter failed: {message}")]
pub struct SetterError {
    pub message: String,
}

impl SetterError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub trait StateSetter<V>: Send + Sync {
    fn set_state(&self, action: SetStateAction<V>) -> Result<(), SetterError>;
}

impl<V, F> StateSetter<V> for F
where
    F: Fn(SetStateAction<V>) -> Result<(), SetterError> + Send + Sync,
{
    fn set_state(&self, action: SetStateAction<V>) -> Result<(), SetterError> {
        self(action)
    }
}

/// Owned state container usable as a setter.
///
/// Counts commits so hosts and tests can see how many setter calls a batch
/// produced.
#[derive(Debug, Default)]
pub struct StateCell<V> {
    value: Mutex<V>,
    commits: AtomicUsize,
}

impl<V> StateCell<V> {
    pub fn new(initial: V) -> Self {
        Self {
            value: Mutex::new(initial),
            commits: AtomicUsize::new(0),
        }
    }

    /// Number of `set_state` calls applied so far.
    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Read the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&V) -> R) -> R {
        f(&*self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, V> {
        self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<V: Clone> StateCell<V> {
    pub fn get(&self) -> V {
        self.lock().clone()
    }
}

/// The updater works on a copy; the cell keeps its value if it panics.
impl<V: Clone + Send> StateSetter<V> for StateCell<V> {
    fn set_state(&self, action: SetStateAction<V>) -> Result<(), SetterError> {
        let mut guard = self.lock();
        let next = action.resolve(guard.clone());
        *guard = next;
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
