//! Parquet and CSV file operations
//!
//! Input tables and run outputs are stored as Parquet. Each file holds one
//! logical table, so readers concatenate the file's record batches.

use std::fs::File;
use std::path::{Path, PathBuf};

use arrow::compute::concat_batches;
use arrow::datatypes::Schema;
use arrow::record_batch::{RecordBatch, RecordBatchReader};
use itertools::Itertools;
use parquet::arrow::ArrowWriter;
use parquet::arrow::{ProjectionMask, arrow_reader::ParquetRecordBatchReaderBuilder};
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::utils::logging::{log_operation_complete, log_operation_start, log_warning};

/// Validates that a directory exists and is a directory
pub fn validate_directory(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        return Err(Error::DataNotFound {
            key: dir.display().to_string(),
        });
    }
    Ok(())
}

/// Helper for creating a projection mask from requested column names
///
/// Columns missing from the file are skipped with a warning. Returns `None`
/// when nothing matched so the caller reads every column.
#[must_use]
pub fn create_projection(
    columns: &[&str],
    file_schema: &Schema,
    parquet_schema: &parquet::schema::types::SchemaDescriptor,
) -> Option<ProjectionMask> {
    let projection = columns
        .iter()
        .filter_map(|name| {
            file_schema.index_of(name).map_or_else(
                |_| {
                    log_warning(
                        &format!("Field {name} not found in parquet file, skipping"),
                        None,
                    );
                    None
                },
                Some,
            )
        })
        .collect_vec();

    if projection.is_empty() {
        log_warning(
            "No matching fields found in schema projection, reading all columns",
            None,
        );
        None
    } else {
        Some(ProjectionMask::roots(parquet_schema, projection))
    }
}

/// Read a Parquet file into a single record batch
///
/// # Arguments
/// * `path` - Path to the Parquet file
/// * `columns` - Optional subset of columns to read
pub fn read_parquet(path: &Path, columns: Option<&[&str]>) -> Result<RecordBatch> {
    let start = std::time::Instant::now();
    log_operation_start("Reading parquet file", path.display());

    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let projection = columns
        .and_then(|columns| create_projection(columns, builder.schema(), builder.parquet_schema()));
    let builder = match projection {
        Some(mask) => builder.with_projection(mask),
        None => builder,
    };
    let reader = builder.build()?;
    let schema = reader.schema();

    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    let batch = concat_batches(&schema, &batches)?;

    log_operation_complete("read", path.display(), batch.num_rows(), Some(start.elapsed()));
    Ok(batch)
}

/// Write a record batch to a Parquet file, replacing any existing file
pub fn write_parquet(path: &Path, batch: &RecordBatch) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(batch)?;
    writer.close()?;
    log_operation_complete("wrote", path.display(), batch.num_rows(), None);
    Ok(())
}

/// Write a record batch to a CSV file with a header row
pub fn write_csv(path: &Path, batch: &RecordBatch) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = arrow::csv::WriterBuilder::new().with_header(true).build(file);
    writer.write(batch)?;
    log_operation_complete("wrote", path.display(), batch.num_rows(), None);
    Ok(())
}

/// Find all Parquet files in a directory, sorted by name
pub fn find_parquet_files(dir: &Path) -> Result<Vec<PathBuf>> {
    log_operation_start("Searching for parquet files in", dir.display());
    validate_directory(dir)?;

    let parquet_files = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .filter_ok(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "parquet"))
        .collect::<std::result::Result<Vec<_>, _>>()?
        .into_iter()
        .sorted()
        .collect_vec();

    if parquet_files.is_empty() {
        log_warning("No Parquet files found in directory", Some(&dir.display()));
    } else {
        log_operation_complete("found", dir.display(), parquet_files.len(), None);
    }
    Ok(parquet_files)
}

/// Read several Parquet files in parallel, keeping the input order
pub fn load_parquet_files_parallel(paths: &[PathBuf]) -> Result<Vec<RecordBatch>> {
    let batches = paths
        .par_iter()
        .map(|path| read_parquet(path, None))
        .collect::<Result<Vec<_>>>()?;

    log::info!(
        "Successfully loaded {} rows from {} Parquet files",
        batches.iter().map(RecordBatch::num_rows).sum::<usize>(),
        paths.len()
    );
    Ok(batches)
}
