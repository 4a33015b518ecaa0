//! Time series keyed by flake ids.
//!
//! Like [`crate::timeseries::TimeSeriesTable`], but a row has no separate time
//! column: its instant, and with it its bucket, is decoded from the id. The table is
//! partitioned by `(index fields..., bucket)` and clustered by the id alone.
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::{
    bucket::{buckets_covering, BucketBound, Bucketer},
    error::{Result, WideRowError},
    flake::FlakeId,
    keyspace::Keyspace,
    modifier::Changes,
    options::Options,
    query::{Filter, Table},
    recipe::{canonical_fields, index_relations, physical_name, table_options, BUCKET_COLUMN},
    relation::{eq, gt, gte, is_in, lt, Relation},
    row::canonical_name,
    schema::TableDefinition,
    Row,
};

#[derive(Clone, Debug)]
pub struct FlakeSeriesTable {
    table: Arc<Table>,
    index_fields: Vec<String>,
    id_field: String,
    bucketer: Arc<dyn Bucketer>,
}

impl FlakeSeriesTable {
    pub fn new(
        keyspace: &Keyspace,
        name: &str,
        index_fields: &[&str],
        id_field: &str,
        bucketer: Arc<dyn Bucketer>,
        options: Options,
    ) -> Result<Self> {
        let index_fields = canonical_fields(index_fields);
        let id_field = canonical_name(id_field);

        let mut partition = index_fields.clone();
        partition.push(BUCKET_COLUMN.to_string());
        let clustering = vec![id_field.clone()];

        let name = physical_name(
            name,
            "flakeseries",
            &[index_fields.as_slice(), clustering.as_slice()],
            &options,
        );
        let definition = TableDefinition::new(name, partition, clustering)?;
        let table = keyspace.table_with_options(definition, table_options(&options))?;
        Ok(Self {
            table,
            index_fields,
            id_field,
            bucketer,
        })
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    fn bucket_of(&self, id: &FlakeId) -> Result<i64> {
        Ok(self.bucketer.bucket(id.timestamp()?))
    }

    /// Stores a row under the bucket of its id, replacing any row with the same id.
    /// The id is stored in its canonical text form.
    pub fn set(&self, mut row: Row) -> Result<()> {
        let id = match row.get(&self.id_field) {
            Some(value) => FlakeId::try_from(value)?,
            None => return Err(WideRowError::MissingKeyPart(self.id_field.clone())),
        };
        row.insert(&self.id_field, id);
        row.insert(BUCKET_COLUMN, self.bucket_of(&id)?);
        self.table.set(row)
    }

    fn by_id(&self, index: &Row, id: &FlakeId) -> Result<Filter<'_>> {
        let mut relations = index_relations(&self.index_fields, index)?;
        relations.push(eq(BUCKET_COLUMN, self.bucket_of(id)?));
        relations.push(eq(&self.id_field, *id));
        Ok(self.table.filter(relations))
    }

    pub fn update(&self, index: &Row, id: &FlakeId, changes: Changes) -> Result<()> {
        self.by_id(index, id)?.update(changes)
    }

    pub fn delete(&self, index: &Row, id: &FlakeId) -> Result<usize> {
        self.by_id(index, id)?.delete()
    }

    pub fn read(&self, index: &Row, id: &FlakeId) -> Result<Row> {
        self.by_id(index, id)?.read_one(&Options::default())
    }

    fn window(
        &self,
        index: &Row,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        lower: Relation,
    ) -> Result<Vec<Relation>> {
        let mut relations = index_relations(&self.index_fields, index)?;
        let buckets =
            buckets_covering(self.bucketer.as_ref(), start, end, BucketBound::ContainingEnd)?;
        debug!(
            table = %self.table.name(),
            %start,
            %end,
            buckets = buckets.len(),
            "Listing flake series"
        );
        relations.push(is_in(BUCKET_COLUMN, buckets));
        relations.push(lower);
        relations.push(lt(&self.id_field, FlakeId::min_for(end)));
        Ok(relations)
    }

    /// Rows under `index` whose id was minted in `[start, end)`, in id order.
    pub fn list(&self, index: &Row, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Row>> {
        let lower = gte(&self.id_field, FlakeId::min_for(start));
        let relations = self.window(index, start, end, lower)?;
        self.table.filter(relations).read(&Options::default())
    }

    /// Rows under `index` with ids after `since`, minted before `since`'s instant
    /// plus `window`. A zero window reaches up to now, and a window past the last
    /// representable instant reaches to the end of time. A limit of zero means no
    /// limit.
    pub fn list_since(
        &self,
        index: &Row,
        since: &FlakeId,
        window: Duration,
        limit: usize,
    ) -> Result<Vec<Row>> {
        let start = since.timestamp()?;
        let end = if window == Duration::zero() {
            Utc::now()
        } else {
            start
                .checked_add_signed(window)
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        };
        let relations = self.window(index, start, end, gt(&self.id_field, *since))?;
        let options = match limit {
            0 => Options::default(),
            n => Options::default().with_limit(n),
        };
        self.table.filter(relations).read(&options)
    }
}
