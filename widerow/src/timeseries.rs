//! Time-ordered rows under an index, split into time buckets.
//!
//! The physical table is partitioned by `(index fields..., bucket)` and clustered by
//! `(time field, id fields...)`. Writers never name the bucket: it is derived from
//! the row's time. Range reads enumerate the buckets covering the range and read
//! them in order, so results come back in time order across buckets.
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::{
    bucket::{buckets_covering, BucketBound, BucketCursor, Bucketer},
    error::Result,
    keyspace::Keyspace,
    modifier::Changes,
    options::Options,
    query::{Filter, Table},
    recipe::{
        canonical_fields, index_relations, key_relations, physical_name, table_options,
        timestamp_of, BUCKET_COLUMN,
    },
    relation::{eq, gte, is_in, lt},
    row::canonical_name,
    schema::TableDefinition,
    Row,
};

#[derive(Clone, Debug)]
pub struct TimeSeriesTable {
    table: Arc<Table>,
    index_fields: Vec<String>,
    time_field: String,
    id_fields: Vec<String>,
    bucketer: Arc<dyn Bucketer>,
}

impl TimeSeriesTable {
    pub fn new(
        keyspace: &Keyspace,
        name: &str,
        index_fields: &[&str],
        time_field: &str,
        id_fields: &[&str],
        bucketer: Arc<dyn Bucketer>,
        options: Options,
    ) -> Result<Self> {
        let index_fields = canonical_fields(index_fields);
        let time_field = canonical_name(time_field);
        let id_fields = canonical_fields(id_fields);

        let mut partition = index_fields.clone();
        partition.push(BUCKET_COLUMN.to_string());
        let mut clustering = vec![time_field.clone()];
        clustering.extend(id_fields.iter().cloned());

        let name = physical_name(
            name,
            "timeseries",
            &[index_fields.as_slice(), clustering.as_slice()],
            &options,
        );
        let definition = TableDefinition::new(name, partition, clustering)?;
        let table = keyspace.table_with_options(definition, table_options(&options))?;
        Ok(Self {
            table,
            index_fields,
            time_field,
            id_fields,
            bucketer,
        })
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Stores a row under the bucket of its time field, replacing any row with the
    /// same key.
    pub fn set(&self, mut row: Row) -> Result<()> {
        let time = timestamp_of(&row, &self.time_field)?;
        row.insert(BUCKET_COLUMN, self.bucketer.bucket(time));
        self.table.set(row)
    }

    /// The single row named by `key`, which holds the index fields, the time field
    /// and the id fields.
    fn by_key(&self, key: &Row) -> Result<Filter<'_>> {
        let time = timestamp_of(key, &self.time_field)?;
        let mut relations = index_relations(&self.index_fields, key)?;
        relations.push(eq(BUCKET_COLUMN, self.bucketer.bucket(time)));
        relations.push(eq(&self.time_field, time));
        relations.extend(key_relations(&self.id_fields, key)?);
        Ok(self.table.filter(relations))
    }

    pub fn update(&self, key: &Row, changes: Changes) -> Result<()> {
        self.by_key(key)?.update(changes)
    }

    pub fn delete(&self, key: &Row) -> Result<usize> {
        self.by_key(key)?.delete()
    }

    pub fn read(&self, key: &Row) -> Result<Row> {
        self.by_key(key)?.read_one(&Options::default())
    }

    /// Rows under `index` with `start <= time < end`, in time order.
    pub fn list(&self, index: &Row, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Row>> {
        self.list_with(index, start, end, &Options::default())
    }

    pub fn list_with(
        &self,
        index: &Row,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        options: &Options,
    ) -> Result<Vec<Row>> {
        let mut relations = index_relations(&self.index_fields, index)?;
        let buckets =
            buckets_covering(self.bucketer.as_ref(), start, end, BucketBound::ContainingEnd)?;
        debug!(
            table = %self.table.name(),
            %start,
            %end,
            buckets = buckets.len(),
            "Listing time series"
        );

        relations.push(is_in(BUCKET_COLUMN, buckets));
        relations.push(gte(&self.time_field, start));
        relations.push(lt(&self.time_field, end));
        self.table.filter(relations).read(options)
    }

    /// A cursor over the buckets of this table, positioned at the bucket of `start`.
    pub fn buckets(&self, start: DateTime<Utc>) -> BucketCursor {
        BucketCursor::new(self.bucketer.clone(), start)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use crate::{bucket::FixedBucketer, Value, WideRowError};

    use super::*;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 5, 1, h, m, s).unwrap()
    }

    fn trips(keyspace: &Keyspace) -> TimeSeriesTable {
        let bucketer = Arc::new(FixedBucketer::new(Duration::minutes(1)).unwrap());
        TimeSeriesTable::new(
            keyspace,
            "trips",
            &["city"],
            "Time",
            &["id"],
            bucketer,
            Options::default(),
        )
        .unwrap()
    }

    fn trip(id: &str, time: DateTime<Utc>) -> Row {
        Row::new().with("city", "london").with("time", time).with("id", id)
    }

    fn ids(rows: &[Row]) -> Vec<Value> {
        rows.iter().filter_map(|r| r.get("id").cloned()).collect()
    }

    #[test]
    fn list_spans_buckets_in_time_order() -> Result<()> {
        let keyspace = Keyspace::new("test");
        let trips = trips(&keyspace);
        trips.set(trip("d", at(15, 5, 1)))?;
        trips.set(trip("b", at(15, 4, 0)))?;
        trips.set(trip("a", at(15, 3, 59)))?;
        trips.set(trip("c", at(15, 4, 1)))?;
        assert_eq!(trips.table().partition_count(), 3);

        let index = Row::new().with("city", "london");
        let rows = trips.list(&index, at(15, 3, 58), at(15, 5, 2))?;
        assert_eq!(ids(&rows), ["a", "b", "c", "d"].map(Value::from));

        let rows = trips.list(&index, at(15, 4, 0), at(15, 5, 1))?;
        assert_eq!(ids(&rows), ["b", "c"].map(Value::from));

        let limited = Options::default().with_limit(1);
        let rows = trips.list_with(&index, at(15, 0, 0), at(16, 0, 0), &limited)?;
        assert_eq!(ids(&rows), vec![Value::from("a")]);
        Ok(())
    }

    #[test]
    fn list_requires_full_index() {
        let keyspace = Keyspace::new("test");
        let err = trips(&keyspace)
            .list(&Row::new().with("country", "uk"), at(15, 0, 0), at(16, 0, 0))
            .unwrap_err();
        assert!(matches!(err, WideRowError::IncompleteIndex(ref m) if m == &["city"]));
    }

    #[test]
    fn crud_by_key() -> Result<()> {
        let keyspace = Keyspace::new("test");
        let trips = trips(&keyspace);
        trips.set(trip("a", at(15, 3, 59)).with("fare", 10))?;

        let key = trip("a", at(15, 3, 59));
        trips.update(&key, Changes::new().set("fare", 12))?;
        assert_eq!(trips.read(&key)?.get("fare"), Some(&Value::from(12)));
        assert_eq!(
            trips.read(&key)?.get(BUCKET_COLUMN),
            Some(&Value::from(at(15, 3, 0).timestamp_millis()))
        );

        assert_eq!(trips.delete(&key)?, 1);
        assert!(trips.read(&key).unwrap_err().is_not_found());

        let err = trips.read(&Row::new().with("city", "london").with("id", "a")).unwrap_err();
        assert!(matches!(err, WideRowError::MissingKeyPart(ref c) if c == "time"));
        Ok(())
    }

    #[test]
    fn cursor_starts_at_bucket_of_start() {
        let keyspace = Keyspace::new("test");
        let cursor = trips(&keyspace).buckets(at(15, 4, 30));
        assert_eq!(cursor.time(), Some(at(15, 4, 0)));
        assert_eq!(cursor.next().time(), Some(at(15, 5, 0)));
    }
}
