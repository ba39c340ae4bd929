//! Input data access for simulation components.

pub mod keys;
pub mod loader;
pub mod transform;

use std::path::Path;

use arrow::record_batch::RecordBatch;
use itertools::Itertools;
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::utils::io::{find_parquet_files, load_parquet_files_parallel};

pub use transform::{
    PARAMETER_COLUMN, VALUE_COLUMN, drop_columns, merge_value_columns,
    no_anemia_responsive_proportion, pivot_categorical, responsive_proportion, sum_available,
};

/// Keyed store of input tables
///
/// Record batches share their buffers, so handing out clones is cheap.
#[derive(Debug, Clone, Default)]
pub struct DataRegistry {
    tables: FxHashMap<String, RecordBatch>,
}

impl DataRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `<key>.parquet` file in `dir`, in parallel
    pub fn from_directory(dir: &Path) -> Result<Self> {
        let files = find_parquet_files(dir)?;
        let keys = files
            .iter()
            .map(|path| {
                path.file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .ok_or_else(|| Error::validation(format!("bad data file name {}", path.display())))
            })
            .collect::<Result<Vec<_>>>()?;
        let batches = load_parquet_files_parallel(&files)?;

        let registry = Self {
            tables: keys.into_iter().zip(batches).collect(),
        };
        log::info!("Loaded {} input tables from {}", registry.len(), dir.display());
        Ok(registry)
    }

    /// Add or replace a table
    pub fn insert(&mut self, key: impl Into<String>, table: RecordBatch) {
        self.tables.insert(key.into(), table);
    }

    /// Table stored under `key`
    ///
    /// # Errors
    /// Returns `Error::DataNotFound` if the key is absent
    pub fn load(&self, key: &str) -> Result<RecordBatch> {
        self.load_optional(key).ok_or_else(|| Error::DataNotFound {
            key: key.to_string(),
        })
    }

    /// Table stored under `key`, if any
    #[must_use]
    pub fn load_optional(&self, key: &str) -> Option<RecordBatch> {
        self.tables.get(key).cloned()
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.tables.contains_key(key)
    }

    /// Stored keys in sorted order
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).sorted().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
