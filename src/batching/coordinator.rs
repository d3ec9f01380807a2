//! Batched state coordinator.
//!
//! # Responsibilities
//! - Group a batch's operations by state kind
//! - Fold each group into one updater and call its setter exactly once
//! - Commit all groups of a batch inside one scheduled unit
//! - Report the outcome through the batch's callbacks, never to the caller
//!
//! # Design Decisions
//! - Within a group, operations apply in list order (last write wins)
//! - Groups commit in a fixed kind order; no atomicity across groups
//! - The coordinator keeps no state between batches

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::batching::operation::{FormFields, MapOp, StateKind, StateMap, StateUpdateOperation};
use crate::batching::scheduler::{panic_message, CommitScheduler, ImmediateScheduler};
use crate::batching::setter::{SetStateAction, SetterError, StateSetter};
use crate::observability::metrics;

/// A setter for one state map.
pub type SharedSetter<V> = Arc<dyn StateSetter<StateMap<V>>>;

/// Setters for every state category the host exposes.
///
/// Loading, optimistic, error and editing-cell state are always present;
/// tables without row creation or hover tracking leave the rest unset.
#[derive(Clone)]
pub struct StateSetters {
    pub loading: SharedSetter<bool>,
    pub optimistic: SharedSetter<Value>,
    pub errors: SharedSetter<String>,
    pub editing_cells: SharedSetter<bool>,
    pub new_row_forms: Option<SharedSetter<FormFields>>,
    pub hovered_rows: Option<SharedSetter<bool>>,
    pub new_rows: Option<SharedSetter<Value>>,
}

impl StateSetters {
    pub fn new(
        loading: SharedSetter<bool>,
        optimistic: SharedSetter<Value>,
        errors: SharedSetter<String>,
        editing_cells: SharedSetter<bool>,
    ) -> Self {
        Self {
            loading,
            optimistic,
            errors,
            editing_cells,
            new_row_forms: None,
            hovered_rows: None,
            new_rows: None,
        }
    }

    pub fn with_new_row_forms(mut self, setter: SharedSetter<FormFields>) -> Self {
        self.new_row_forms = Some(setter);
        self
    }

    pub fn with_hovered_rows(mut self, setter: SharedSetter<bool>) -> Self {
        self.hovered_rows = Some(setter);
        self
    }

    pub fn with_new_rows(mut self, setter: SharedSetter<Value>) -> Self {
        self.new_rows = Some(setter);
        self
    }

    fn has(&self, kind: StateKind) -> bool {
        match kind {
            StateKind::Loading
            | StateKind::Optimistic
            | StateKind::Error
            | StateKind::EditingCells => true,
            StateKind::NewRowForm => self.new_row_forms.is_some(),
            StateKind::HoveredRows => self.hovered_rows.is_some(),
            StateKind::NewRows => self.new_rows.is_some(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BatchError {
    #[error("no setter registered for {0} state")]
    MissingSetter(StateKind),

    #[error("{kind} setter failed")]
    Setter {
        kind: StateKind,
        #[source]
        source: SetterError,
    },

    #[error("{kind} setter panicked: {message}")]
    SetterPanicked { kind: StateKind, message: String },
}

type Callback = Box<dyn FnOnce() + Send>;
type ErrorCallback = Box<dyn FnOnce(BatchError) + Send>;

/// A list of operations to commit together, plus outcome callbacks.
pub struct BatchRequest {
    pub id: Uuid,
    operations: Vec<StateUpdateOperation>,
    on_complete: Option<Callback>,
    on_error: Option<ErrorCallback>,
}

impl BatchRequest {
    pub fn new(operations: Vec<StateUpdateOperation>) -> Self {
        Self {
            id: Uuid::new_v4(),
            operations,
            on_complete: None,
            on_error: None,
        }
    }

    /// Called after every setter of the batch succeeded.
    pub fn on_complete(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    /// Called once with the first failure; `on_complete` is then skipped.
    pub fn on_error(mut self, f: impl FnOnce(BatchError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    pub fn operations(&self) -> &[StateUpdateOperation] {
        &self.operations
    }
}

impl From<Vec<StateUpdateOperation>> for BatchRequest {
    fn from(operations: Vec<StateUpdateOperation>) -> Self {
        Self::new(operations)
    }
}

/// A batch's operations split by kind, list order preserved per kind.
#[derive(Default)]
struct Groups {
    loading: Vec<MapOp<bool>>,
    optimistic: Vec<MapOp<Value>>,
    errors: Vec<MapOp<String>>,
    editing_cells: Vec<MapOp<bool>>,
    new_row_forms: Vec<MapOp<FormFields>>,
    hovered_rows: Vec<MapOp<bool>>,
    new_rows: Vec<MapOp<Value>>,
}

impl Groups {
    fn split(operations: Vec<StateUpdateOperation>) -> Self {
        let mut groups = Groups::default();
        for op in operations {
            match op {
                StateUpdateOperation::Loading(op) => groups.loading.push(op),
                StateUpdateOperation::Optimistic(op) => groups.optimistic.push(op),
                StateUpdateOperation::Error(op) => groups.errors.push(op),
                StateUpdateOperation::EditingCells(op) => groups.editing_cells.push(op),
                StateUpdateOperation::NewRowForm(op) => groups.new_row_forms.push(op),
                StateUpdateOperation::HoveredRows(op) => groups.hovered_rows.push(op),
                StateUpdateOperation::NewRows(op) => groups.new_rows.push(op),
            }
        }
        groups
    }

    fn kinds(&self) -> Vec<StateKind> {
        let lens = [
            (StateKind::Loading, self.loading.len()),
            (StateKind::Optimistic, self.optimistic.len()),
            (StateKind::Error, self.errors.len()),
            (StateKind::EditingCells, self.editing_cells.len()),
            (StateKind::NewRowForm, self.new_row_forms.len()),
            (StateKind::HoveredRows, self.hovered_rows.len()),
            (StateKind::NewRows, self.new_rows.len()),
        ];
        lens.into_iter()
            .filter(|(_, len)| *len > 0)
            .map(|(kind, _)| kind)
            .collect()
    }

    /// Apply every non-empty group through its setter. Returns setter calls made.
    fn commit(self, setters: &StateSetters) -> Result<usize, BatchError> {
        let kinds = self.kinds();
        if let Some(missing) = kinds.iter().find(|kind| !setters.has(**kind)) {
            return Err(BatchError::MissingSetter(*missing));
        }

        commit_group(StateKind::Loading, Some(&setters.loading), self.loading)?;
        commit_group(StateKind::Optimistic, Some(&setters.optimistic), self.optimistic)?;
        commit_group(StateKind::Error, Some(&setters.errors), self.errors)?;
        commit_group(StateKind::EditingCells, Some(&setters.editing_cells), self.editing_cells)?;
        commit_group(StateKind::NewRowForm, setters.new_row_forms.as_ref(), self.new_row_forms)?;
        commit_group(StateKind::HoveredRows, setters.hovered_rows.as_ref(), self.hovered_rows)?;
        commit_group(StateKind::NewRows, setters.new_rows.as_ref(), self.new_rows)?;

        Ok(kinds.len())
    }
}

fn commit_group<V: Send + 'static>(
    kind: StateKind,
    setter: Option<&SharedSetter<V>>,
    ops: Vec<MapOp<V>>,
) -> Result<(), BatchError> {
    if ops.is_empty() {
        return Ok(());
    }
    let setter = setter.ok_or(BatchError::MissingSetter(kind))?;

    metrics::record_setter_call(kind);
    let merged = move |prev: StateMap<V>| ops.into_iter().fold(prev, |map, op| op.apply(map));

    // Updaters run inside the setter, so this also covers a panicking MapOp::update.
    match panic::catch_unwind(AssertUnwindSafe(|| {
        setter.set_state(SetStateAction::Update(Box::new(merged)))
    })) {
        Ok(result) => result.map_err(|source| BatchError::Setter { kind, source }),
        Err(payload) => Err(BatchError::SetterPanicked {
            kind,
            message: panic_message(payload.as_ref()),
        }),
    }
}

/// Applies batches of state operations through host-provided setters.
#[derive(Clone)]
pub struct BatchedStateCoordinator {
    setters: Arc<StateSetters>,
    scheduler: Arc<dyn CommitScheduler>,
}

impl BatchedStateCoordinator {
    pub fn new(setters: StateSetters, scheduler: Arc<dyn CommitScheduler>) -> Self {
        Self {
            setters: Arc::new(setters),
            scheduler,
        }
    }

    /// Coordinator that commits each batch as soon as it is submitted.
    pub fn immediate(setters: StateSetters) -> Self {
        Self::new(setters, Arc::new(ImmediateScheduler))
    }

    /// Schedule `request` as one commit unit.
    ///
    /// Never fails from the caller's point of view; the outcome is reported
    /// to the request's callbacks when the unit runs.
    pub fn execute_batched_update(&self, request: impl Into<BatchRequest>) {
        let BatchRequest {
            id,
            operations,
            on_complete,
            on_error,
        } = request.into();

        let op_count = operations.len();
        let groups = Groups::split(operations);
        let setters = self.setters.clone();

        self.scheduler.schedule(Box::new(move || match groups.commit(&setters) {
            Ok(setter_calls) => {
                tracing::debug!(
                    batch_id = %id,
                    operations = op_count,
                    setter_calls,
                    "Batch committed"
                );
                metrics::record_batch("committed");
                if let Some(on_complete) = on_complete {
                    on_complete();
                }
            }
            Err(e) => {
                tracing::warn!(batch_id = %id, error = %e, "Batch failed");
                metrics::record_batch("failed");
                if let Some(on_error) = on_error {
                    on_error(e);
                }
            }
        }));
    }
}
