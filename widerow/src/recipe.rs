//! Pieces shared by the recipe tables.
use chrono::{DateTime, Utc};

use crate::{
    error::{Result, WideRowError},
    options::Options,
    relation::{eq, Relation},
    row::canonical_name,
    Row, Value,
};

/// Partition key column holding the time bucket.
pub const BUCKET_COLUMN: &str = "bucket";

pub(crate) fn canonical_fields<I>(fields: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fields
        .into_iter()
        .map(|f| canonical_name(f.as_ref()))
        .collect()
}

/// The physical table name: the override from `options`, else `name` followed by
/// the recipe kind and its key fields.
pub(crate) fn physical_name(name: &str, kind: &str, fields: &[&[String]], options: &Options) -> String {
    if let Some(table_name) = &options.table_name {
        return table_name.clone();
    }
    let mut parts = vec![name.to_string(), kind.to_string()];
    parts.extend(fields.iter().flat_map(|f| f.iter().cloned()));
    parts.join("_")
}

/// Options a recipe hands to its table: everything but the name override.
pub(crate) fn table_options(options: &Options) -> Options {
    Options {
        table_name: None,
        ..options.clone()
    }
}

/// Equalities binding every index field. Missing fields are reported together.
pub(crate) fn index_relations(fields: &[String], index: &Row) -> Result<Vec<Relation>> {
    let missing: Vec<String> = fields
        .iter()
        .filter(|f| !index.contains(f))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(WideRowError::IncompleteIndex(missing));
    }
    Ok(fields
        .iter()
        .filter_map(|f| index.get(f).map(|v| eq(f, v.clone())))
        .collect())
}

/// Equalities binding every key field.
pub(crate) fn key_relations(fields: &[String], key: &Row) -> Result<Vec<Relation>> {
    fields
        .iter()
        .map(|f| {
            key.get(f)
                .map(|v| eq(f, v.clone()))
                .ok_or_else(|| WideRowError::MissingKeyPart(f.clone()))
        })
        .collect()
}

pub(crate) fn timestamp_of(row: &Row, field: &str) -> Result<DateTime<Utc>> {
    match row.get(field) {
        Some(Value::Timestamp(t)) => Ok(*t),
        Some(other) => Err(WideRowError::conversion(other, "DateTime<Utc>")),
        None => Err(WideRowError::MissingKeyPart(field.to_string())),
    }
}
