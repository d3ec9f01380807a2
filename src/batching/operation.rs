//! Pending state mutations.
//!
//! Each [`StateUpdateOperation`] targets exactly one state category and
//! carries a [`MapOp`] over that category's value type, so grouping by kind
//! is checked at compile time.

use std::collections::HashMap;
use std::fmt;

use serde_json::{Map, Value};

/// One state container: entity key → value.
pub type StateMap<V> = HashMap<String, V>;

/// Field values of a partially filled new-row form.
pub type FormFields = Map<String, Value>;

/// Pure transformation of a whole state map.
pub type Updater<V> = Box<dyn FnOnce(StateMap<V>) -> StateMap<V> + Send>;

/// A single change to one state map.
pub enum MapOp<V> {
    /// Overwrite `key` with `value`.
    Set { key: String, value: V },
    /// Derive the next map from the previous one.
    Update(Updater<V>),
}

impl<V: Send + 'static> MapOp<V> {
    pub fn set(key: impl Into<String>, value: V) -> Self {
        MapOp::Set {
            key: key.into(),
            value,
        }
    }

    pub fn update<F>(f: F) -> Self
    where
        F: FnOnce(StateMap<V>) -> StateMap<V> + Send + 'static,
    {
        MapOp::Update(Box::new(f))
    }

    /// Drop `key` from the map, reading whatever the map holds at apply time.
    pub fn remove(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::update(move |mut map| {
            map.remove(&key);
            map
        })
    }
}

impl<V> MapOp<V> {
    pub(crate) fn apply(self, mut map: StateMap<V>) -> StateMap<V> {
        match self {
            MapOp::Set { key, value } => {
                map.insert(key, value);
                map
            }
            MapOp::Update(updater) => updater(map),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for MapOp<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapOp::Set { key, value } => f
                .debug_struct("Set")
                .field("key", key)
                .field("value", value)
                .finish(),
            MapOp::Update(_) => f.write_str("Update(..)"),
        }
    }
}

/// The state categories a batch can touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StateKind {
    Loading,
    Optimistic,
    Error,
    EditingCells,
    NewRowForm,
    HoveredRows,
    NewRows,
}

impl StateKind {
    pub const ALL: [StateKind; 7] = [
        StateKind::Loading,
        StateKind::Optimistic,
        StateKind::Error,
        StateKind::EditingCells,
        StateKind::NewRowForm,
        StateKind::HoveredRows,
        StateKind::NewRows,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StateKind::Loading => "loading",
            StateKind::Optimistic => "optimistic",
            StateKind::Error => "error",
            StateKind::EditingCells => "editing_cells",
            StateKind::NewRowForm => "new_row_form",
            StateKind::HoveredRows => "hovered_rows",
            StateKind::NewRows => "new_rows",
        }
    }
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One pending mutation, tagged by the state category it targets.
#[derive(Debug)]
pub enum StateUpdateOperation {
    Loading(MapOp<bool>),
    Optimistic(MapOp<Value>),
    Error(MapOp<String>),
    EditingCells(MapOp<bool>),
    NewRowForm(MapOp<FormFields>),
    HoveredRows(MapOp<bool>),
    NewRows(MapOp<Value>),
}

impl StateUpdateOperation {
    pub fn kind(&self) -> StateKind {
        match self {
            StateUpdateOperation::Loading(_) => StateKind::Loading,
            StateUpdateOperation::Optimistic(_) => StateKind::Optimistic,
            StateUpdateOperation::Error(_) => StateKind::Error,
            StateUpdateOperation::EditingCells(_) => StateKind::EditingCells,
            StateUpdateOperation::NewRowForm(_) => StateKind::NewRowForm,
            StateUpdateOperation::HoveredRows(_) => StateKind::HoveredRows,
            StateUpdateOperation::NewRows(_) => StateKind::NewRows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_overwrites() {
        let map = MapOp::set("a", 1).apply(StateMap::from([("a".to_string(), 0)]));
        assert_eq!(map.get("a"), Some(&1));
    }

    #[test]
    fn test_remove_reads_current_map() {
        let map = StateMap::from([("a".to_string(), true), ("b".to_string(), true)]);
        let map = MapOp::remove("a").apply(map);
        assert!(!map.contains_key("a"));
        assert!(map.contains_key("b"));
    }

    #[test]
    fn test_kind_names_are_distinct() {
        let mut names: Vec<_> = StateKind::ALL.iter().map(|k| k.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), StateKind::ALL.len());
    }
}
