//! In-process emulation of a partitioned, clustered wide-column store.
//!
//! Tables are registered in a [`Keyspace`]. Rows are written and read through
//! relation sets ([`eq`], [`is_in`], [`gt`], ...) resolved against the table's
//! partition and clustering keys. On top of that sit the recipe tables:
//! [`MapTable`], [`MultimapTable`], [`TimeSeriesTable`] and [`FlakeSeriesTable`].
mod bucket;
mod codec;
mod error;
mod flake;
mod flakeseries;
mod keyspace;
mod map_table;
mod modifier;
mod multimap_table;
mod options;
mod query;
mod recipe;
mod relation;
mod row;
mod schema;
mod store;
mod timeseries;
mod value;

pub use bucket::{buckets_covering, BucketBound, BucketCursor, Bucketer, FixedBucketer};
pub use codec::{compare, encode, ClusteringKey, ClusteringOrder, ComparableKey, CompositeKey};
pub use error::{Result, WideRowError};
pub use flake::{FlakeGenerator, FlakeId};
pub use flakeseries::FlakeSeriesTable;
pub use keyspace::Keyspace;
pub use map_table::MapTable;
pub use modifier::{Changes, ColumnUpdate, Modifier};
pub use multimap_table::MultimapTable;
pub use options::Options;
pub use query::{Filter, Table};
pub use recipe::BUCKET_COLUMN;
pub use relation::{
    apply_filters, describe, eq, gt, gte, is_in, lt, lte, resolve_clustering,
    resolve_partition_keys, ClusteringSelection, Comparison, Relation,
};
pub use row::Row;
pub use schema::{ClusteringColumn, TableDefinition};
pub use store::{Partition, PartitionStore};
pub use timeseries::TimeSeriesTable;
pub use value::Value;

#[cfg(test)]
mod test;
