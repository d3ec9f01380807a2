//! Constructors for [`StateUpdateOperation`].
//!
//! Pure: nothing here touches state, the coordinator applies the result.

use std::fmt::Display;

use serde_json::Value;

use crate::batching::operation::{FormFields, MapOp, StateMap, StateUpdateOperation};

/// Key under which a loading flag is stored, e.g. `"updating-42"`.
pub fn loading_key(kind: &str, id: impl Display) -> String {
    format!("{kind}-{id}")
}

pub fn loading(kind: &str, id: impl Display, is_loading: bool) -> StateUpdateOperation {
    StateUpdateOperation::Loading(MapOp::set(loading_key(kind, id), is_loading))
}

pub fn clear_loading(kind: &str, id: impl Display) -> StateUpdateOperation {
    StateUpdateOperation::Loading(MapOp::remove(loading_key(kind, id)))
}

pub fn optimistic(key: impl Into<String>, value: impl Into<Value>) -> StateUpdateOperation {
    StateUpdateOperation::Optimistic(MapOp::set(key, value.into()))
}

pub fn clear_optimistic(key: impl Into<String>) -> StateUpdateOperation {
    StateUpdateOperation::Optimistic(MapOp::remove(key))
}

pub fn error(key: impl Into<String>, message: impl Into<String>) -> StateUpdateOperation {
    StateUpdateOperation::Error(MapOp::set(key, message.into()))
}

pub fn clear_error(key: impl Into<String>) -> StateUpdateOperation {
    StateUpdateOperation::Error(MapOp::remove(key))
}

pub fn editing_cell(key: impl Into<String>, is_editing: bool) -> StateUpdateOperation {
    StateUpdateOperation::EditingCells(MapOp::set(key, is_editing))
}

/// Merge `patch` into the form of `row_id`, keeping fields it does not name.
pub fn new_row_form(row_id: impl Into<String>, patch: FormFields) -> StateUpdateOperation {
    let row_id = row_id.into();
    StateUpdateOperation::NewRowForm(MapOp::update(move |mut forms: StateMap<FormFields>| {
        let form = forms.entry(row_id).or_default();
        for (field, value) in patch {
            form.insert(field, value);
        }
        forms
    }))
}

pub fn clear_new_row_form(row_id: impl Into<String>) -> StateUpdateOperation {
    StateUpdateOperation::NewRowForm(MapOp::remove(row_id))
}

/// Only hovered rows are kept in the map.
pub fn hovered_row(row_id: impl Into<String>, hovered: bool) -> StateUpdateOperation {
    if hovered {
        StateUpdateOperation::HoveredRows(MapOp::set(row_id, true))
    } else {
        StateUpdateOperation::HoveredRows(MapOp::remove(row_id))
    }
}

pub fn new_row(row_id: impl Into<String>, row: impl Into<Value>) -> StateUpdateOperation {
    StateUpdateOperation::NewRows(MapOp::set(row_id, row.into()))
}

pub fn remove_new_row(row_id: impl Into<String>) -> StateUpdateOperation {
    StateUpdateOperation::NewRows(MapOp::remove(row_id))
}
