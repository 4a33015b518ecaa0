//! Key/value access: one row per id, the id being the whole partition key.
use std::sync::Arc;

use crate::{
    error::Result,
    keyspace::Keyspace,
    modifier::Changes,
    options::Options,
    query::Table,
    recipe::{canonical_fields, physical_name, table_options},
    relation::{eq, is_in},
    row::canonical_name,
    schema::TableDefinition,
    Row, Value,
};

#[derive(Clone, Debug)]
pub struct MapTable {
    table: Arc<Table>,
    id_field: String,
}

impl MapTable {
    pub fn new(keyspace: &Keyspace, name: &str, id_field: &str, options: Options) -> Result<Self> {
        let id_field = canonical_name(id_field);
        let ids = canonical_fields([&id_field]);
        let definition = TableDefinition::new(
            physical_name(name, "map", &[ids.as_slice()], &options),
            ids,
            Vec::<String>::new(),
        )?;
        let table = keyspace.table_with_options(definition, table_options(&options))?;
        Ok(Self { table, id_field })
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Stores a row, replacing any row with the same id.
    pub fn set(&self, row: Row) -> Result<()> {
        self.table.set(row)
    }

    pub fn update<V: Into<Value>>(&self, id: V, changes: Changes) -> Result<()> {
        self.table.filter([eq(&self.id_field, id)]).update(changes)
    }

    pub fn delete<V: Into<Value>>(&self, id: V) -> Result<usize> {
        self.table.filter([eq(&self.id_field, id)]).delete()
    }

    pub fn read<V: Into<Value>>(&self, id: V) -> Result<Row> {
        self.table
            .filter([eq(&self.id_field, id)])
            .read_one(&Options::default())
    }

    /// Rows for several ids, in the order the ids are given. Unknown ids are skipped.
    pub fn multi_read<I>(&self, ids: I) -> Result<Vec<Row>>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.table
            .filter([is_in(&self.id_field, ids)])
            .read(&Options::default())
    }
}
