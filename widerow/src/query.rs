//! Turns relation sets into store operations.
//!
//! Every request is resolved the same way: partition keys first, then the clustering
//! selection inside each partition, then whatever relations are left over (those on
//! regular columns) are evaluated against the retrieved rows.
use std::collections::HashSet;

use tracing::{debug, trace, warn};

use crate::{
    codec::{ClusteringKey, CompositeKey},
    error::{Result, WideRowError},
    modifier::Changes,
    options::Options,
    relation::{apply_filters, describe, resolve_clustering, resolve_partition_keys, Relation},
    schema::TableDefinition,
    store::PartitionStore,
    Row, Value,
};

/// A table: its key schema, its contents and its default options.
#[derive(Debug)]
pub struct Table {
    definition: TableDefinition,
    store: PartitionStore,
    options: Options,
}

impl Table {
    pub fn new(definition: TableDefinition, options: Options) -> Self {
        Self {
            store: PartitionStore::new(definition.name.clone()),
            definition,
            options,
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn definition(&self) -> &TableDefinition {
        &self.definition
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    fn key_columns(&self, row: &Row) -> Row {
        self.definition
            .key_columns()
            .filter_map(|column| row.get(column).map(|v| (column, v.clone())))
            .collect()
    }

    /// Writes a full row, replacing whatever was stored under its key.
    pub fn set(&self, row: Row) -> Result<()> {
        let (partition, clustering) = self.definition.row_keys(&row)?;
        let keys = self.key_columns(&row);
        self.store.upsert(partition, clustering, keys, row, false);
        Ok(())
    }

    pub fn filter<I: IntoIterator<Item = Relation>>(&self, relations: I) -> Filter<'_> {
        Filter {
            table: self,
            relations: relations.into_iter().collect(),
        }
    }

    pub fn truncate(&self) {
        self.store.truncate();
    }

    pub fn partition_count(&self) -> usize {
        self.store.partition_count()
    }

    pub fn row_count(&self) -> usize {
        self.store.row_count()
    }
}

/// A relation set bound to a table.
#[derive(Debug)]
pub struct Filter<'t> {
    table: &'t Table,
    relations: Vec<Relation>,
}

/// A resolved partition key: its column values and its encoded form.
struct ResolvedPartition {
    values: Vec<Value>,
    key: CompositeKey,
}

struct Plan {
    partitions: Vec<ResolvedPartition>,
    prefix_values: Vec<Vec<Value>>,
    prefixes: Vec<ClusteringKey>,
    range: Vec<Relation>,
    residual: Vec<Relation>,
}

impl Plan {
    fn matches(&self, clustering: &ClusteringKey, row: &Row) -> bool {
        self.prefixes.iter().any(|p| clustering.starts_with(p))
            && apply_filters(row, self.range.iter().chain(&self.residual))
    }
}

impl<'t> Filter<'t> {
    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    fn plan(&self) -> Result<Plan> {
        let definition = &self.table.definition;

        let mut partitions: Vec<ResolvedPartition> = Vec::new();
        let mut seen = HashSet::new();
        for values in resolve_partition_keys(&definition.partition_keys, &self.relations)? {
            let key = CompositeKey::from_values(&values)?;
            if seen.insert(key.clone()) {
                partitions.push(ResolvedPartition { values, key });
            }
        }

        let selection = resolve_clustering(&definition.clustering_columns, &self.relations)?;
        let prefixes = selection
            .prefixes
            .iter()
            .map(|values| definition.clustering_prefix(values))
            .collect::<Result<Vec<_>>>()?;
        let residual = self
            .relations
            .iter()
            .filter(|r| !definition.is_key_column(r.column()))
            .cloned()
            .collect();

        Ok(Plan {
            partitions,
            prefix_values: selection.prefixes,
            prefixes,
            range: selection.range,
            residual,
        })
    }

    /// Rows matching the relations: partitions in the order their keys were
    /// resolved, clustering order inside each, truncated to `limit` overall.
    pub fn read(&self, options: &Options) -> Result<Vec<Row>> {
        let options = self.table.options.merge(options);
        let plan = self.plan()?;
        if !plan.residual.is_empty() && !options.allow_filtering {
            debug!(
                table = %self.table.name(),
                relations = %describe(&plan.residual),
                "Filtering on regular columns"
            );
        }

        let limit = options.limit.unwrap_or(usize::MAX);
        let mut rows = Vec::new();
        for partition in &plan.partitions {
            if rows.len() >= limit {
                break;
            }
            let scanned = self
                .table
                .store
                .scan_selection(&partition.key, &plan.prefixes, &plan.range);
            rows.extend(
                scanned
                    .into_iter()
                    .filter(|row| apply_filters(row, &plan.residual))
                    .take(limit - rows.len()),
            );
        }
        trace!(table = %self.table.name(), count = rows.len(), "Read rows");

        if options.select.is_empty() {
            Ok(rows)
        } else {
            Ok(rows.into_iter().map(|row| row.project(&options.select)).collect())
        }
    }

    /// The first matching row. No match is [`WideRowError::RowNotFound`].
    pub fn read_one(&self, options: &Options) -> Result<Row> {
        let options = options.clone().with_limit(1);
        self.read(&options)?
            .into_iter()
            .next()
            .ok_or_else(|| WideRowError::RowNotFound {
                table: self.table.name().to_string(),
                relations: describe(&self.relations),
            })
    }

    /// Applies `changes` to every row the relations name. The relations must bind
    /// the whole primary key and nothing else; an IN on the last column of either
    /// key fans out to several rows, each written independently.
    pub fn update(&self, changes: Changes) -> Result<()> {
        let definition = &self.table.definition;
        if let Some(relation) = self
            .relations
            .iter()
            .find(|r| !definition.is_key_column(r.column()))
        {
            return Err(WideRowError::invalid_key_usage(
                relation.column(),
                "updates can only be restricted by primary key columns",
            ));
        }
        if let Some(column) = changes.columns().find(|c| definition.is_key_column(c)) {
            return Err(WideRowError::invalid_key_usage(
                column,
                "primary key columns cannot be updated",
            ));
        }

        let plan = self.plan()?;
        if let Some(relation) = plan.range.first() {
            return Err(WideRowError::invalid_key_usage(
                relation.column(),
                "updates need equality or IN on clustering columns",
            ));
        }
        let bound = plan
            .prefix_values
            .first()
            .map_or(definition.clustering_columns.len(), Vec::len);
        if let Some(column) = definition.clustering_columns.get(bound) {
            return Err(WideRowError::MissingKeyPart(column.name.clone()));
        }

        for partition in &plan.partitions {
            for (prefix, clustering) in plan.prefix_values.iter().zip(&plan.prefixes) {
                let keys: Row = definition
                    .partition_keys
                    .iter()
                    .zip(&partition.values)
                    .chain(definition.clustering_columns.iter().map(|c| &c.name).zip(prefix))
                    .map(|(column, value)| (column, value.clone()))
                    .collect();
                self.table
                    .store
                    .modify(partition.key.clone(), clustering.clone(), keys, |row| {
                        changes.apply_to(row)
                    })
                    .map_err(|e| {
                        warn!(table = %self.table.name(), error = %e, "Update failed");
                        e
                    })?;
            }
        }
        Ok(())
    }

    /// Deletes every matching row and returns how many were removed.
    pub fn delete(&self) -> Result<usize> {
        let plan = self.plan()?;
        let removed: usize = plan
            .partitions
            .iter()
            .map(|partition| {
                self.table
                    .store
                    .delete_matching(&partition.key, |clustering, row| plan.matches(clustering, row))
            })
            .sum();
        debug!(
            table = %self.table.name(),
            relations = %describe(&self.relations),
            removed,
            "Deleted rows"
        );
        Ok(removed)
    }
}
