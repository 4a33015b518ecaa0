use std::{collections::BTreeMap, ops::Deref};

use serde::{Deserialize, Serialize};

use crate::Value;

/// A row as the storage core sees it: column name to value. Column names are
/// case-insensitive and stored lower-cased.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    values: BTreeMap<String, Value>,
}

pub(crate) fn canonical_name(name: &str) -> String {
    name.to_lowercase()
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with<K: AsRef<str>, V: Into<Value>>(mut self, column: K, value: V) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert<K: AsRef<str>, V: Into<Value>>(&mut self, column: K, value: V) -> Option<Value> {
        self.values
            .insert(canonical_name(column.as_ref()), value.into())
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(&canonical_name(column))
    }

    pub fn get_mut(&mut self, column: &str) -> Option<&mut Value> {
        self.values.get_mut(&canonical_name(column))
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.values.remove(&canonical_name(column))
    }

    pub fn contains(&self, column: &str) -> bool {
        self.values.contains_key(&canonical_name(column))
    }

    /// Overlays `other` onto this row, keeping columns `other` does not mention.
    pub fn merge(&mut self, other: Row) {
        self.values.extend(other.values);
    }

    /// Keeps only the named columns.
    pub fn project(mut self, columns: &[String]) -> Row {
        let keep: Vec<String> = columns.iter().map(|c| canonical_name(c)).collect();
        self.values.retain(|name, _| keep.contains(name));
        self
    }

    pub fn into_inner(self) -> BTreeMap<String, Value> {
        self.values
    }
}

impl Deref for Row {
    type Target = BTreeMap<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.values
    }
}

impl<K: AsRef<str>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (k, v) in iter {
            row.insert(k, v);
        }
        row
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}
