//! Partial updates: plain column assignments plus collection and counter modifiers.
//!
//! Modifiers are resolved against the stored value of the column while the table
//! is exclusively locked, then merged like any other assignment.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, WideRowError},
    row::canonical_name,
    Row, Value,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Modifier {
    ListAppend(Vec<Value>),
    ListPrepend(Vec<Value>),
    /// Removes every element equal to one of the given values.
    ListRemove(Vec<Value>),
    ListSetAtIndex(usize, Value),
    /// Inserts or replaces the given map entries.
    MapSetFields(Vec<(Value, Value)>),
    CounterIncrement(i64),
}

impl Modifier {
    pub fn name(&self) -> &'static str {
        match self {
            Modifier::ListAppend(_) => "list append",
            Modifier::ListPrepend(_) => "list prepend",
            Modifier::ListRemove(_) => "list remove",
            Modifier::ListSetAtIndex(..) => "list set at index",
            Modifier::MapSetFields(_) => "map set fields",
            Modifier::CounterIncrement(_) => "counter increment",
        }
    }

    fn invalid(&self, column: &str, reason: impl Into<String>) -> WideRowError {
        WideRowError::InvalidModifier {
            column: column.to_string(),
            modifier: self.name(),
            reason: reason.into(),
        }
    }

    fn list(&self, column: &str, current: Option<&Value>) -> Result<Vec<Value>> {
        match current {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::List(items)) => Ok(items.clone()),
            Some(other) => Err(self.invalid(column, format!("stored value is a {}", other.kind()))),
        }
    }

    /// Computes the new value of `column` from its stored value.
    pub fn apply(&self, column: &str, current: Option<&Value>) -> Result<Value> {
        let value = match self {
            Modifier::ListAppend(items) => {
                let mut list = self.list(column, current)?;
                list.extend(items.iter().cloned());
                Value::List(list)
            }
            Modifier::ListPrepend(items) => {
                let list = self.list(column, current)?;
                Value::List(items.iter().cloned().chain(list).collect())
            }
            Modifier::ListRemove(items) => {
                let mut list = self.list(column, current)?;
                list.retain(|element| !items.iter().any(|item| item.canonical_eq(element)));
                Value::List(list)
            }
            Modifier::ListSetAtIndex(index, item) => {
                let mut list = self.list(column, current)?;
                let len = list.len();
                let slot = list.get_mut(*index).ok_or_else(|| {
                    self.invalid(column, format!("index {index} out of bounds for list of {len}"))
                })?;
                *slot = item.clone();
                Value::List(list)
            }
            Modifier::MapSetFields(fields) => {
                let mut entries = match current {
                    None | Some(Value::Null) => Vec::new(),
                    Some(Value::Map(entries)) => entries.clone(),
                    Some(other) => {
                        return Err(self.invalid(column, format!("stored value is a {}", other.kind())))
                    }
                };
                for (key, value) in fields {
                    match entries.iter_mut().find(|(k, _)| k.canonical_eq(key)) {
                        Some(entry) => entry.1 = value.clone(),
                        None => entries.push((key.clone(), value.clone())),
                    }
                }
                Value::Map(entries)
            }
            Modifier::CounterIncrement(delta) => {
                let count = match current {
                    None | Some(Value::Null) => 0,
                    Some(stored) => i64::try_from(stored.clone())
                        .map_err(|_| self.invalid(column, format!("stored value is a {}", stored.kind())))?,
                };
                let next = count
                    .checked_add(*delta)
                    .ok_or_else(|| self.invalid(column, "counter overflow"))?;
                Value::I64(next)
            }
        };
        Ok(value)
    }
}

/// New content for one column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ColumnUpdate {
    Set(Value),
    Modify(Modifier),
}

impl From<Value> for ColumnUpdate {
    fn from(value: Value) -> Self {
        ColumnUpdate::Set(value)
    }
}

impl From<Modifier> for ColumnUpdate {
    fn from(modifier: Modifier) -> Self {
        ColumnUpdate::Modify(modifier)
    }
}

/// The column set of a partial update.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Changes {
    columns: BTreeMap<String, ColumnUpdate>,
}

impl Changes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<C: AsRef<str>, V: Into<Value>>(mut self, column: C, value: V) -> Self {
        self.columns
            .insert(canonical_name(column.as_ref()), ColumnUpdate::Set(value.into()));
        self
    }

    pub fn modify<C: AsRef<str>>(mut self, column: C, modifier: Modifier) -> Self {
        self.columns
            .insert(canonical_name(column.as_ref()), ColumnUpdate::Modify(modifier));
        self
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Applies every change to `row`. Nothing is written if a modifier fails.
    pub fn apply_to(&self, row: &mut Row) -> Result<()> {
        let mut resolved = Vec::with_capacity(self.columns.len());
        for (column, update) in &self.columns {
            let value = match update {
                ColumnUpdate::Set(value) => value.clone(),
                ColumnUpdate::Modify(modifier) => modifier.apply(column, row.get(column))?,
            };
            resolved.push((column, value));
        }
        for (column, value) in resolved {
            row.insert(column, value);
        }
        Ok(())
    }
}

impl From<Row> for Changes {
    fn from(row: Row) -> Self {
        Changes {
            columns: row
                .into_iter()
                .map(|(column, value)| (column, ColumnUpdate::Set(value)))
                .collect(),
        }
    }
}

impl<C: AsRef<str>, V: Into<Value>> FromIterator<(C, V)> for Changes {
    fn from_iter<I: IntoIterator<Item = (C, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Changes::new(), |changes, (column, value)| changes.set(column, value))
    }
}
