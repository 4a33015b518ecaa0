//! Per-operation options.
use std::{fs::File, io::Read, path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;

/// Options accepted by reads and writes. Only `limit` and `select` change what the
/// in-memory engine returns; `ttl` is accepted and not enforced.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Maximum number of rows returned by a read, over all partitions.
    pub limit: Option<usize>,
    pub ttl: Option<Duration>,
    /// Physical table name used by recipes instead of the derived one.
    pub table_name: Option<String>,
    /// Columns to project. Empty selects every column.
    pub select: Vec<String>,
    pub allow_filtering: bool,
}

impl Options {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_table_name<S: Into<String>>(mut self, name: S) -> Self {
        self.table_name = Some(name.into());
        self
    }

    pub fn with_select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Overlays `other` onto `self`. Fields set in `other` win.
    pub fn merge(&self, other: &Options) -> Options {
        Options {
            limit: other.limit.or(self.limit),
            ttl: other.ttl.or(self.ttl),
            table_name: other.table_name.clone().or_else(|| self.table_name.clone()),
            select: if other.select.is_empty() {
                self.select.clone()
            } else {
                other.select.clone()
            },
            allow_filtering: self.allow_filtering || other.allow_filtering,
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading options from: {:?}", path);
        let options = Self::from_reader(File::open(path)?)?;
        debug!(?options, "Loaded options");
        Ok(options)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!("Saving options to: {:?}", path);
        serde_json::to_writer_pretty(File::create(path)?, self)?;
        Ok(())
    }
}
