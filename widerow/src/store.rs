//! In-memory contents of one table.
//!
//! A table is a map from partition key to partition, and a partition is an ordered
//! map from clustering key to the column group stored under it. The whole map sits
//! behind one reader/writer lock: writers hold it exclusively for the structural
//! change, readers hold it shared while they copy matching column groups out.
use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::{
    codec::{ClusteringKey, CompositeKey},
    error::Result,
    relation::{apply_filters, Relation},
    Row,
};

pub type Partition = BTreeMap<ClusteringKey, Row>;

#[derive(Debug, Default)]
pub struct PartitionStore {
    table: String,
    partitions: RwLock<HashMap<CompositeKey, Partition>>,
}

impl PartitionStore {
    pub fn new<S: Into<String>>(table: S) -> Self {
        Self {
            table: table.into(),
            partitions: RwLock::default(),
        }
    }

    /// A snapshot of the partition, which is created empty first if absent.
    pub fn get_or_create(&self, partition: CompositeKey) -> Partition {
        let mut partitions = self.partitions.write();
        let groups = partitions.entry(partition).or_default();
        trace!(table = %self.table, rows = groups.len(), "Fetched partition");
        groups.clone()
    }

    /// Writes one column group. With `merge` the columns are overlaid on the stored
    /// group; without it they replace it. The key columns are written last in both
    /// cases so a stored row always carries its own key.
    pub fn upsert(
        &self,
        partition: CompositeKey,
        clustering: ClusteringKey,
        key_columns: Row,
        columns: Row,
        merge: bool,
    ) {
        let mut partitions = self.partitions.write();
        let group = partitions
            .entry(partition)
            .or_default()
            .entry(clustering)
            .or_default();
        if !merge {
            *group = Row::new();
        }
        group.merge(columns);
        group.merge(key_columns);
        debug!(table = %self.table, merge, row = ?group, "Upserted column group");
    }

    /// Read-modify-write of one column group under the exclusive lock. Nothing is
    /// created or changed when `f` fails.
    pub fn modify<F>(
        &self,
        partition: CompositeKey,
        clustering: ClusteringKey,
        key_columns: Row,
        f: F,
    ) -> Result<()>
    where
        F: FnOnce(&mut Row) -> Result<()>,
    {
        let mut partitions = self.partitions.write();
        let mut group = partitions
            .get(&partition)
            .and_then(|p| p.get(&clustering))
            .cloned()
            .unwrap_or_default();
        f(&mut group)?;
        group.merge(key_columns);
        debug!(table = %self.table, row = ?group, "Modified column group");
        partitions
            .entry(partition)
            .or_default()
            .insert(clustering, group);
        Ok(())
    }

    /// Every column group of a partition in clustering order.
    pub fn scan(&self, partition: &CompositeKey) -> Vec<Row> {
        let partitions = self.partitions.read();
        partitions
            .get(partition)
            .map(|p| p.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Column groups under any of `prefixes` that also satisfy `range`, in
    /// clustering order. An empty prefix selects the whole partition.
    pub fn scan_selection(
        &self,
        partition: &CompositeKey,
        prefixes: &[ClusteringKey],
        range: &[Relation],
    ) -> Vec<Row> {
        let mut prefixes = prefixes.to_vec();
        prefixes.sort();
        prefixes.dedup();

        let partitions = self.partitions.read();
        let Some(groups) = partitions.get(partition) else {
            trace!(table = %self.table, ?partition, "Scanned absent partition");
            return Vec::new();
        };
        let rows: Vec<Row> = prefixes
            .iter()
            .flat_map(|prefix| {
                groups
                    .range(prefix.clone()..)
                    .take_while(move |(key, _)| key.starts_with(prefix))
                    .map(|(_, row)| row)
            })
            .filter(|row| apply_filters(row, range))
            .cloned()
            .collect();
        trace!(table = %self.table, ?partition, count = rows.len(), "Scanned partition");
        rows
    }

    /// Removes every column group of a partition matching `predicate` and returns
    /// how many were removed. An absent partition is not an error.
    pub fn delete_matching<P>(&self, partition: &CompositeKey, predicate: P) -> usize
    where
        P: Fn(&ClusteringKey, &Row) -> bool,
    {
        let mut partitions = self.partitions.write();
        let Some(groups) = partitions.get_mut(partition) else {
            return 0;
        };
        let before = groups.len();
        groups.retain(|key, row| !predicate(key, row));
        let removed = before - groups.len();
        if groups.is_empty() {
            partitions.remove(partition);
        }
        debug!(table = %self.table, removed, "Deleted column groups");
        removed
    }

    pub fn truncate(&self) {
        self.partitions.write().clear();
        debug!(table = %self.table, "Truncated table");
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.read().len()
    }

    pub fn row_count(&self) -> usize {
        self.partitions.read().values().map(BTreeMap::len).sum()
    }
}
