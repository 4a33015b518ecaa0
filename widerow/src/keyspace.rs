//! Registry of the tables of one keyspace.
//!
//! A `Keyspace` is an ordinary value: create one per process or per test and pass
//! it to whatever needs tables. Tables are created on first request and live until
//! they are dropped.
use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::{
    error::{Result, WideRowError},
    options::Options,
    query::Table,
    schema::TableDefinition,
};

#[derive(Debug)]
pub struct Keyspace {
    name: String,
    options: Options,
    tables: RwLock<HashMap<String, Arc<Table>>>,
}

impl Keyspace {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self::with_options(name, Options::default())
    }

    /// A keyspace whose tables start from `options` for every operation.
    pub fn with_options<S: Into<String>>(name: S, options: Options) -> Self {
        Self {
            name: name.into(),
            options,
            tables: RwLock::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Returns the table named by `definition`, creating it if needed.
    pub fn table(&self, definition: TableDefinition) -> Result<Arc<Table>> {
        self.table_with_options(definition, Options::default())
    }

    /// As [`Keyspace::table`], with table-level options layered over the
    /// keyspace's own. Options only apply when the table is created.
    pub fn table_with_options(
        &self,
        definition: TableDefinition,
        options: Options,
    ) -> Result<Arc<Table>> {
        if let Some(table) = self.tables.read().get(&definition.name) {
            return Self::check_definition(table, &definition);
        }

        let mut tables = self.tables.write();
        if let Some(table) = tables.get(&definition.name) {
            return Self::check_definition(table, &definition);
        }
        info!(
            keyspace = %self.name,
            table = %definition.name,
            partition_keys = ?definition.partition_keys,
            clustering_columns = ?definition.clustering_names(),
            "Creating table"
        );
        let table = Arc::new(Table::new(definition, self.options.merge(&options)));
        tables.insert(table.name().to_string(), table.clone());
        Ok(table)
    }

    fn check_definition(table: &Arc<Table>, definition: &TableDefinition) -> Result<Arc<Table>> {
        if table.definition() != definition {
            warn!(table = %definition.name, "Conflicting table definition");
            return Err(WideRowError::InvalidSchema {
                table: definition.name.clone(),
                reason: "a table with this name already exists with a different key".to_string(),
            });
        }
        Ok(table.clone())
    }

    pub fn get_table(&self, name: &str) -> Result<Arc<Table>> {
        self.tables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| WideRowError::TableNotFound(name.to_string()))
    }

    /// Removes a table. Handles held elsewhere keep working on the detached contents.
    pub fn drop_table(&self, name: &str) -> Result<()> {
        match self.tables.write().remove(name) {
            Some(table) => {
                info!(keyspace = %self.name, table = %name, rows = table.row_count(), "Dropped table");
                Ok(())
            }
            None => Err(WideRowError::TableNotFound(name.to_string())),
        }
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        debug!(keyspace = %self.name, count = names.len(), "Listed tables");
        names
    }
}
