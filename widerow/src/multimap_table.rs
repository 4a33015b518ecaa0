//! One-to-many access: rows grouped under a field value and ordered by id.
use std::sync::Arc;

use crate::{
    error::Result,
    keyspace::Keyspace,
    modifier::Changes,
    options::Options,
    query::Table,
    recipe::{canonical_fields, physical_name, table_options},
    relation::{eq, gte, is_in, Relation},
    row::canonical_name,
    schema::TableDefinition,
    Row, Value,
};

#[derive(Clone, Debug)]
pub struct MultimapTable {
    table: Arc<Table>,
    field: String,
    id_field: String,
}

impl MultimapTable {
    pub fn new(
        keyspace: &Keyspace,
        name: &str,
        field: &str,
        id_field: &str,
        options: Options,
    ) -> Result<Self> {
        let field = canonical_name(field);
        let id_field = canonical_name(id_field);
        let partition = canonical_fields([&field]);
        let clustering = canonical_fields([&id_field]);
        let definition = TableDefinition::new(
            physical_name(
                name,
                "multimap",
                &[partition.as_slice(), clustering.as_slice()],
                &options,
            ),
            partition,
            clustering,
        )?;
        let table = keyspace.table_with_options(definition, table_options(&options))?;
        Ok(Self {
            table,
            field,
            id_field,
        })
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    fn key<F: Into<Value>, I: Into<Value>>(&self, value: F, id: I) -> Vec<Relation> {
        vec![eq(&self.field, value), eq(&self.id_field, id)]
    }

    pub fn set(&self, row: Row) -> Result<()> {
        self.table.set(row)
    }

    pub fn update<F, I>(&self, value: F, id: I, changes: Changes) -> Result<()>
    where
        F: Into<Value>,
        I: Into<Value>,
    {
        self.table.filter(self.key(value, id)).update(changes)
    }

    pub fn delete<F: Into<Value>, I: Into<Value>>(&self, value: F, id: I) -> Result<usize> {
        self.table.filter(self.key(value, id)).delete()
    }

    /// Deletes every row stored under `value`.
    pub fn delete_all<F: Into<Value>>(&self, value: F) -> Result<usize> {
        self.table.filter([eq(&self.field, value)]).delete()
    }

    pub fn read<F: Into<Value>, I: Into<Value>>(&self, value: F, id: I) -> Result<Row> {
        self.table
            .filter(self.key(value, id))
            .read_one(&Options::default())
    }

    /// Rows for several ids under one value, in id order.
    pub fn multi_read<F, I>(&self, value: F, ids: I) -> Result<Vec<Row>>
    where
        F: Into<Value>,
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.table
            .filter([eq(&self.field, value), is_in(&self.id_field, ids)])
            .read(&Options::default())
    }

    /// Rows under `value` in id order, starting at `start_id` when given. A limit of
    /// zero means no limit.
    pub fn list<F>(&self, value: F, start_id: Option<Value>, limit: usize) -> Result<Vec<Row>>
    where
        F: Into<Value>,
    {
        let mut relations = vec![eq(&self.field, value)];
        if let Some(start) = start_id {
            relations.push(gte(&self.id_field, start));
        }
        let options = match limit {
            0 => Options::default(),
            n => Options::default().with_limit(n),
        };
        self.table.filter(relations).read(&options)
    }
}
