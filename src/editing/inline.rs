//! Inline cell editing.
//!
//! Guards the persistence call with a breaker and reports each phase as one
//! batch: start (loading + optimistic value), then success or failure.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use crate::batching::{ops, BatchedStateCoordinator, FormFields};
use crate::resilience::{CircuitBreaker, ExecuteError};

/// Loading kind for in-place updates of existing rows.
pub const UPDATING: &str = "updating";

/// Loading kind for rows being created from the new-row form.
pub const CREATING: &str = "creating";

/// Shown instead of the operation's error when the breaker refused the call.
pub const TEMPORARILY_UNAVAILABLE: &str = "Temporarily unavailable, please retry in a moment";

/// A pending change to one cell.
#[derive(Debug, Clone, PartialEq)]
pub struct CellEdit {
    pub row_id: String,
    pub field: String,
    pub value: Value,
}

impl CellEdit {
    pub fn new(row_id: impl Into<String>, field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            row_id: row_id.into(),
            field: field.into(),
            value: value.into(),
        }
    }

    /// Key used for this cell's optimistic value, error and editing flag.
    pub fn cell_key(&self) -> String {
        format!("{}-{}", self.row_id, self.field)
    }
}

pub struct InlineEditor {
    breaker: Arc<CircuitBreaker>,
    coordinator: BatchedStateCoordinator,
}

impl InlineEditor {
    pub fn new(breaker: Arc<CircuitBreaker>, coordinator: BatchedStateCoordinator) -> Self {
        Self {
            breaker,
            coordinator,
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Persist one cell edit through `update`, which receives the new value.
    ///
    /// The outcome is returned unchanged; the UI state is settled either way.
    pub async fn commit<F, Fut, T, E>(&self, edit: CellEdit, update: F) -> Result<T, ExecuteError<E>>
    where
        F: FnOnce(Value) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let key = edit.cell_key();
        self.coordinator.execute_batched_update(vec![
            ops::loading(UPDATING, &edit.row_id, true),
            ops::optimistic(key.clone(), edit.value.clone()),
            ops::clear_error(key.clone()),
        ]);

        let value = edit.value;
        let result = self.breaker.execute(|| update(value)).await;

        match &result {
            Ok(_) => self.coordinator.execute_batched_update(vec![
                ops::loading(UPDATING, &edit.row_id, false),
                ops::clear_optimistic(key.clone()),
                ops::editing_cell(key, false),
            ]),
            Err(e) => {
                let message = failure_message(e);
                tracing::warn!(
                    row_id = %edit.row_id,
                    field = %edit.field,
                    rejected = e.is_rejected(),
                    error = %message,
                    "Cell update failed"
                );
                self.coordinator.execute_batched_update(vec![
                    ops::loading(UPDATING, &edit.row_id, false),
                    ops::clear_optimistic(key.clone()),
                    ops::error(key, message),
                ]);
            }
        }

        result
    }

    /// Submit the new-row form for `temp_id` through `create`.
    ///
    /// On success the draft row and its form are discarded; on failure the
    /// draft stays so the user can fix and resubmit.
    pub async fn create_row<F, Fut, T, E>(
        &self,
        temp_id: &str,
        form: FormFields,
        create: F,
    ) -> Result<T, ExecuteError<E>>
    where
        F: FnOnce(FormFields) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.coordinator.execute_batched_update(vec![
            ops::loading(CREATING, temp_id, true),
            ops::clear_error(temp_id),
        ]);

        let result = self.breaker.execute(|| create(form)).await;

        match &result {
            Ok(_) => self.coordinator.execute_batched_update(vec![
                ops::loading(CREATING, temp_id, false),
                ops::remove_new_row(temp_id),
                ops::clear_new_row_form(temp_id),
            ]),
            Err(e) => self.coordinator.execute_batched_update(vec![
                ops::loading(CREATING, temp_id, false),
                ops::error(temp_id, failure_message(e)),
            ]),
        }

        result
    }
}

fn failure_message<E: Display>(e: &ExecuteError<E>) -> String {
    match e {
        ExecuteError::Rejected(_) => TEMPORARILY_UNAVAILABLE.to_string(),
        ExecuteError::Operation(e) => e.to_string(),
    }
}
