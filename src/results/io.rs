//! Wide per-run output tables.
//!
//! One row per run: the run's identifying columns followed by one Float64
//! column per observation key, in key order.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, StringArray, new_null_array};
use arrow::compute::{cast, concat_batches};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use itertools::Itertools;

use crate::config::SimulationConfig;
use crate::error::{Error, Result};
use crate::observers::Counter;
use crate::utils::io::{load_parquet_files_parallel, write_parquet};

pub const INPUT_DRAW_COLUMN: &str = "input_draw";
pub const RANDOM_SEED_COLUMN: &str = "random_seed";
pub const SCENARIO_COLUMN: &str = "scenario";

/// Columns identifying a run rather than holding a count
pub const ID_COLUMNS: [&str; 3] = [INPUT_DRAW_COLUMN, RANDOM_SEED_COLUMN, SCENARIO_COLUMN];

fn id_fields() -> Vec<Field> {
    vec![
        Field::new(INPUT_DRAW_COLUMN, DataType::Int64, false),
        Field::new(RANDOM_SEED_COLUMN, DataType::Int64, false),
        Field::new(SCENARIO_COLUMN, DataType::Utf8, false),
    ]
}

/// The single output row of a finished run
pub fn run_output(config: &SimulationConfig, metrics: &Counter) -> Result<RecordBatch> {
    let seed = i64::try_from(config.random_seed).map_err(|_| {
        Error::validation(format!("random seed {} does not fit an output column", config.random_seed))
    })?;
    let entries = metrics.sorted();

    let mut fields = id_fields();
    let mut arrays: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from(vec![config.input_draw])),
        Arc::new(Int64Array::from(vec![seed])),
        Arc::new(StringArray::from(vec![config.scenario.as_str()])),
    ];
    for (key, value) in entries {
        fields.push(Field::new(key, DataType::Float64, true));
        arrays.push(Arc::new(Float64Array::from(vec![value])));
    }
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}

/// Write the output row of a run to `path`
pub fn write_run_output(path: &Path, config: &SimulationConfig, metrics: &Counter) -> Result<()> {
    write_parquet(path, &run_output(config, metrics)?)
}

/// Stack run outputs whose key columns may differ
///
/// The result has the id columns followed by the sorted union of key
/// columns; keys a run did not produce are null for that run.
pub fn combine_run_outputs(batches: &[RecordBatch]) -> Result<RecordBatch> {
    let keys = batches
        .iter()
        .flat_map(|batch| {
            batch
                .schema()
                .fields()
                .iter()
                .map(|f| f.name().clone())
                .collect_vec()
        })
        .filter(|name| !ID_COLUMNS.contains(&name.as_str()))
        .sorted()
        .dedup()
        .collect_vec();

    let mut fields = id_fields();
    fields.extend(keys.iter().map(|key| Field::new(key, DataType::Float64, true)));
    let schema = Arc::new(Schema::new(fields));

    let aligned = batches
        .iter()
        .map(|batch| {
            let columns = schema
                .fields()
                .iter()
                .map(|field| match batch.column_by_name(field.name()) {
                    Some(column) if column.data_type() == field.data_type() => Ok(Arc::clone(column)),
                    Some(column) => Ok(cast(column, field.data_type())?),
                    None if ID_COLUMNS.contains(&field.name().as_str()) => {
                        Err(Error::ColumnNotFound {
                            column: field.name().clone(),
                        })
                    }
                    None => Ok(new_null_array(field.data_type(), batch.num_rows())),
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(RecordBatch::try_new(Arc::clone(&schema), columns)?)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(concat_batches(&schema, &aligned)?)
}

/// Read run output files in parallel and stack them
pub fn read_run_outputs(paths: &[PathBuf]) -> Result<RecordBatch> {
    if paths.is_empty() {
        return Err(Error::DataNotFound {
            key: "run outputs".to_string(),
        });
    }
    combine_run_outputs(&load_parquet_files_parallel(paths)?)
}
