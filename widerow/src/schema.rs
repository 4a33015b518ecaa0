use serde::{Deserialize, Serialize};

use crate::{
    codec::{ClusteringKey, ClusteringOrder, CompositeKey},
    error::{Result, WideRowError},
    row::canonical_name,
    Row, Value,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusteringColumn {
    pub name: String,
    #[serde(default)]
    pub order: ClusteringOrder,
}

impl ClusteringColumn {
    pub fn new<S: AsRef<str>>(name: S, order: ClusteringOrder) -> Self {
        Self {
            name: canonical_name(name.as_ref()),
            order,
        }
    }
}

/// Key schema of one table. Immutable once the table exists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: String,
    pub partition_keys: Vec<String>,
    pub clustering_columns: Vec<ClusteringColumn>,
}

impl TableDefinition {
    /// Builds a definition with ascending clustering columns.
    pub fn new<N, P, C>(name: N, partition_keys: P, clustering_columns: C) -> Result<Self>
    where
        N: Into<String>,
        P: IntoIterator,
        P::Item: AsRef<str>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        let clustering = clustering_columns
            .into_iter()
            .map(|c| ClusteringColumn::new(c, ClusteringOrder::Asc))
            .collect();
        Self::with_clustering_order(name, partition_keys, clustering)
    }

    pub fn with_clustering_order<N, P>(
        name: N,
        partition_keys: P,
        clustering_columns: Vec<ClusteringColumn>,
    ) -> Result<Self>
    where
        N: Into<String>,
        P: IntoIterator,
        P::Item: AsRef<str>,
    {
        let definition = Self {
            name: name.into(),
            partition_keys: partition_keys
                .into_iter()
                .map(|p| canonical_name(p.as_ref()))
                .collect(),
            clustering_columns: clustering_columns
                .into_iter()
                .map(|c| ClusteringColumn::new(c.name, c.order))
                .collect(),
        };
        definition.validate()?;
        Ok(definition)
    }

    fn invalid(&self, reason: impl Into<String>) -> WideRowError {
        WideRowError::InvalidSchema {
            table: self.name.clone(),
            reason: reason.into(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(self.invalid("table name is empty"));
        }
        if self.partition_keys.is_empty() {
            return Err(self.invalid("at least one partition key column is required"));
        }
        let mut seen: Vec<&str> = Vec::new();
        for column in self.key_columns() {
            if column.is_empty() {
                return Err(self.invalid("key column name is empty"));
            }
            if seen.contains(&column) {
                return Err(self.invalid(format!(
                    "column '{column}' appears more than once in the primary key"
                )));
            }
            seen.push(column);
        }
        Ok(())
    }

    /// Partition columns followed by clustering columns, in declared order.
    pub fn key_columns(&self) -> impl Iterator<Item = &str> {
        self.partition_keys
            .iter()
            .map(String::as_str)
            .chain(self.clustering_columns.iter().map(|c| c.name.as_str()))
    }

    pub fn clustering_names(&self) -> Vec<String> {
        self.clustering_columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn is_partition_key(&self, column: &str) -> bool {
        self.partition_keys.iter().any(|p| p == column)
    }

    pub fn is_clustering_column(&self, column: &str) -> bool {
        self.clustering_columns.iter().any(|c| c.name == column)
    }

    pub fn is_key_column(&self, column: &str) -> bool {
        self.is_partition_key(column) || self.is_clustering_column(column)
    }

    fn key_value<'r>(&self, row: &'r Row, column: &str) -> Result<&'r Value> {
        row.get(column)
            .ok_or_else(|| WideRowError::MissingKeyPart(column.to_string()))
    }

    /// Splits the key of a full row. Every partition and clustering column must be
    /// present.
    pub fn row_keys(&self, row: &Row) -> Result<(CompositeKey, ClusteringKey)> {
        let partition_values = self
            .partition_keys
            .iter()
            .map(|c| self.key_value(row, c))
            .collect::<Result<Vec<_>>>()?;
        let clustering_values = self
            .clustering_columns
            .iter()
            .map(|c| self.key_value(row, &c.name).map(|v| (v, c.order)))
            .collect::<Result<Vec<_>>>()?;
        Ok((
            CompositeKey::from_values(partition_values)?,
            ClusteringKey::from_values(clustering_values)?,
        ))
    }

    /// Encodes a clustering prefix of `values.len()` columns.
    pub(crate) fn clustering_prefix(&self, values: &[Value]) -> Result<ClusteringKey> {
        ClusteringKey::from_values(
            values
                .iter()
                .zip(self.clustering_columns.iter().map(|c| c.order)),
        )
    }
}
