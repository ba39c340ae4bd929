//! Post-processing of stacked run outputs into per-measure count tables.
//!
//! The stages mirror how results are consumed: drop incomplete draws, sum
//! the remaining seeds, turn observation keys back into strata, then split
//! by kind of measure.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use arrow::array::{ArrayRef, Float64Array, Int32Array, Int64Array, StringArray, UInt32Array};
use arrow::compute::{SortColumn, lexsort_to_indices, take_record_batch};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::results::io::{
    ID_COLUMNS, INPUT_DRAW_COLUMN, RANDOM_SEED_COLUMN, SCENARIO_COLUMN, read_run_outputs,
};
use crate::results::naming::ObservationKey;
use crate::utils::arrow::{downcast_array, get_column, int_values, string_values};
use crate::utils::io::{write_csv, write_parquet};
use crate::utils::logging::{log_operation_complete, log_operation_start, log_warning};

/// Directory under the output directory receiving the measure tables
pub const COUNT_DATA_DIR: &str = "count_data";

const PERSON_TIME_SUFFIX: &str = "_person_time";
const EVENT_COUNT_SUFFIX: &str = "_event_count";
const YLDS_PREFIX: &str = "ylds_due_to_";

/// The runs a batch of parallel simulations was launched with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyspace {
    #[serde(alias = "input_draws")]
    pub input_draw: Vec<i64>,
    #[serde(alias = "random_seeds")]
    pub random_seed: Vec<i64>,
    #[serde(alias = "scenarios", alias = "branch_name.scenario")]
    pub scenario: Vec<String>,
}

impl Keyspace {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }
}

/// Keep, per draw, only seeds that completed for every scenario
///
/// Draws absent from the keyspace are dropped. Rows keep the keyspace's
/// draw order and their original order within a draw.
pub fn filter_out_incomplete(data: &RecordBatch, keyspace: &Keyspace) -> Result<RecordBatch> {
    let draws = int_values(data, INPUT_DRAW_COLUMN)?;
    let seeds = int_values(data, RANDOM_SEED_COLUMN)?;
    let scenarios = string_values(data, SCENARIO_COLUMN)?;

    let mut keep: Vec<u32> = Vec::new();
    for &draw in &keyspace.input_draw {
        let mut complete: FxHashSet<i64> = keyspace.random_seed.iter().copied().collect();
        for scenario in &keyspace.scenario {
            let present: FxHashSet<i64> = (0..data.num_rows())
                .filter(|&row| draws[row] == draw && scenarios[row] == *scenario)
                .map(|row| seeds[row])
                .collect();
            complete.retain(|seed| present.contains(seed));
        }
        for row in 0..data.num_rows() {
            if draws[row] == draw && complete.contains(&seeds[row]) {
                keep.push(u32::try_from(row).map_err(|_| {
                    Error::validation(format!("row {row} exceeds the addressable range"))
                })?);
            }
        }
    }

    log::debug!("Keeping {} of {} run rows", keep.len(), data.num_rows());
    Ok(take_record_batch(data, &UInt32Array::from(keep))?)
}

/// Sum every count column over seeds, grouped by draw and scenario
///
/// Groups are sorted by draw, then scenario. Null counts add nothing.
pub fn aggregate_over_seed(data: &RecordBatch) -> Result<RecordBatch> {
    let draws = int_values(data, INPUT_DRAW_COLUMN)?;
    let scenarios = string_values(data, SCENARIO_COLUMN)?;
    let schema = data.schema();
    let count_columns: Vec<&Field> = schema
        .fields()
        .iter()
        .map(|f| &**f)
        .filter(|f| !ID_COLUMNS.contains(&f.name().as_str()))
        .collect();

    let mut groups: BTreeMap<(i64, String), usize> = BTreeMap::new();
    for (draw, scenario) in draws.iter().zip(&scenarios) {
        let next = groups.len();
        groups.entry((*draw, scenario.clone())).or_insert(next);
    }
    let group_of: Vec<usize> = draws
        .iter()
        .zip(&scenarios)
        .map(|(draw, scenario)| groups[&(*draw, scenario.clone())])
        .collect();

    let mut columns: Vec<ArrayRef> = Vec::with_capacity(count_columns.len() + 2);
    let ordered: Vec<(&(i64, String), &usize)> = groups.iter().collect();
    columns.push(Arc::new(Int64Array::from(
        ordered.iter().map(|((draw, _), _)| *draw).collect::<Vec<_>>(),
    )));
    columns.push(Arc::new(StringArray::from(
        ordered
            .iter()
            .map(|((_, scenario), _)| scenario.as_str())
            .collect::<Vec<_>>(),
    )));
    for field in &count_columns {
        let values = downcast_array::<Float64Array>(
            get_column(data, field.name())?,
            field.name(),
            "Float64",
        )?;
        let mut sums = vec![0.0; groups.len()];
        for (row, value) in values.iter().enumerate() {
            sums[group_of[row]] += value.unwrap_or(0.0);
        }
        columns.push(Arc::new(Float64Array::from(
            ordered.iter().map(|(_, group)| sums[**group]).collect::<Vec<_>>(),
        )));
    }

    let mut fields = vec![
        Field::new(INPUT_DRAW_COLUMN, DataType::Int64, false),
        Field::new(SCENARIO_COLUMN, DataType::Utf8, false),
    ];
    fields.extend(
        count_columns
            .iter()
            .map(|f| Field::new(f.name(), DataType::Float64, false)),
    );
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

/// One value of the long format
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub input_draw: i64,
    pub scenario: String,
    pub key: ObservationKey,
    pub value: f64,
}

/// Unpivot aggregated counts and decode their keys
pub fn pivot_and_split(aggregated: &RecordBatch) -> Result<Vec<Observation>> {
    let draws = int_values(aggregated, INPUT_DRAW_COLUMN)?;
    let scenarios = string_values(aggregated, SCENARIO_COLUMN)?;
    let schema = aggregated.schema();
    let mut observations = Vec::new();
    for field in schema.fields() {
        let name = field.name();
        if name == INPUT_DRAW_COLUMN || name == SCENARIO_COLUMN {
            continue;
        }
        let key = ObservationKey::parse(name)?;
        let values = downcast_array::<Float64Array>(get_column(aggregated, name)?, name, "Float64")?;
        for (row, value) in values.iter().enumerate() {
            observations.push(Observation {
                input_draw: draws[row],
                scenario: scenarios[row].clone(),
                key: key.clone(),
                value: value.unwrap_or(0.0),
            });
        }
    }
    Ok(observations)
}

/// The kind of quantity an observation key measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeasureKind {
    StatePersonTime,
    TransitionCount,
    Ylds,
}

impl MeasureKind {
    pub const ALL: [Self; 3] = [Self::StatePersonTime, Self::TransitionCount, Self::Ylds];

    /// Value of the `measure` column and the output file stem
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StatePersonTime => "state_person_time",
            Self::TransitionCount => "transition_count",
            Self::Ylds => "ylds",
        }
    }

    /// Split a raw measure into its kind and cause
    #[must_use]
    pub fn classify(measure: &str) -> Option<(Self, &str)> {
        if let Some(cause) = measure.strip_prefix(YLDS_PREFIX) {
            Some((Self::Ylds, cause))
        } else if let Some(state) = measure.strip_suffix(PERSON_TIME_SUFFIX) {
            Some((Self::StatePersonTime, state))
        } else {
            measure
                .strip_suffix(EVENT_COUNT_SUFFIX)
                .map(|transition| (Self::TransitionCount, transition))
        }
    }
}

/// Long-format count tables, one per kind of measure
#[derive(Debug, Clone)]
pub struct MeasureData {
    tables: Vec<(MeasureKind, RecordBatch)>,
}

impl MeasureData {
    #[must_use]
    pub fn get(&self, kind: MeasureKind) -> Option<&RecordBatch> {
        self.tables.iter().find(|(k, _)| *k == kind).map(|(_, t)| t)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MeasureKind, &RecordBatch)> {
        self.tables.iter().map(|(kind, table)| (*kind, table))
    }

    /// Write each table as `<measure>.parquet` and `<measure>.csv` in `dir`
    pub fn dump(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        for (kind, table) in self.iter() {
            write_parquet(&dir.join(format!("{}.parquet", kind.as_str())), table)?;
            write_csv(&dir.join(format!("{}.csv", kind.as_str())), table)?;
        }
        Ok(())
    }
}

fn optional_strings<'a>(rows: &[&'a Observation], slot: impl Fn(&'a ObservationKey) -> Option<&'a str>) -> Option<ArrayRef> {
    let values: Vec<Option<&str>> = rows.iter().map(|o| slot(&o.key)).collect();
    if values.iter().all(Option::is_none) {
        None
    } else {
        Some(Arc::new(StringArray::from(values)))
    }
}

/// Build the sorted table of one kind of measure
fn measure_table(kind: MeasureKind, rows: &[&Observation]) -> Result<RecordBatch> {
    let causes: Vec<&str> = rows
        .iter()
        .map(|o| MeasureKind::classify(&o.key.measure).map_or("", |(_, cause)| cause))
        .collect();

    let mut fields = vec![
        Field::new("year", DataType::Int32, true),
        Field::new("sex", DataType::Utf8, true),
        Field::new("age", DataType::Utf8, true),
        Field::new(SCENARIO_COLUMN, DataType::Utf8, false),
        Field::new("cause", DataType::Utf8, false),
        Field::new("measure", DataType::Utf8, false),
        Field::new(INPUT_DRAW_COLUMN, DataType::Int64, false),
    ];
    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(Int32Array::from(rows.iter().map(|o| o.key.year).collect::<Vec<_>>())),
        Arc::new(StringArray::from(
            rows.iter().map(|o| o.key.sex.as_deref()).collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from(
            rows.iter().map(|o| o.key.age_group.as_deref()).collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from(
            rows.iter().map(|o| o.scenario.as_str()).collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from(causes)),
        Arc::new(StringArray::from(vec![kind.as_str(); rows.len()])),
        Arc::new(Int64Array::from(rows.iter().map(|o| o.input_draw).collect::<Vec<_>>())),
    ];
    let sort_width = columns.len();
    for (name, column) in [
        ("vitamin_a_category", optional_strings(rows, |k| k.vitamin_a.as_deref())),
        ("zinc_category", optional_strings(rows, |k| k.zinc.as_deref())),
    ] {
        if let Some(column) = column {
            fields.push(Field::new(name, DataType::Utf8, true));
            columns.push(column);
        }
    }
    fields.push(Field::new("value", DataType::Float64, false));
    columns.push(Arc::new(Float64Array::from(
        rows.iter().map(|o| o.value).collect::<Vec<_>>(),
    )));

    let table = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?;
    if table.num_rows() == 0 {
        return Ok(table);
    }
    let sort_columns: Vec<SortColumn> = table.columns()[..sort_width]
        .iter()
        .map(|column| SortColumn {
            values: Arc::clone(column),
            options: None,
        })
        .collect();
    let indices = lexsort_to_indices(&sort_columns, None)?;
    Ok(take_record_batch(&table, &indices)?)
}

/// Split observations into person time, transition and YLD tables
///
/// Observations of any other measure are skipped with a warning.
pub fn make_measure_data(observations: &[Observation]) -> Result<MeasureData> {
    let mut by_kind: FxHashMap<MeasureKind, Vec<&Observation>> = FxHashMap::default();
    let mut unknown: FxHashSet<&str> = FxHashSet::default();
    for observation in observations {
        match MeasureKind::classify(&observation.key.measure) {
            Some((kind, _)) => by_kind.entry(kind).or_default().push(observation),
            None => {
                if unknown.insert(observation.key.measure.as_str()) {
                    log_warning("Skipping unrecognized measure", Some(&observation.key.measure));
                }
            }
        }
    }

    let tables = MeasureKind::ALL
        .into_iter()
        .map(|kind| {
            let rows = by_kind.remove(&kind).unwrap_or_default();
            Ok((kind, measure_table(kind, &rows)?))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(MeasureData { tables })
}

/// Run the whole post-processing chain over run output files
///
/// Any previous `count_data` directory under `out_dir` is replaced.
pub fn build_results(files: &[PathBuf], keyspace: &Keyspace, out_dir: &Path) -> Result<MeasureData> {
    let start = Instant::now();
    let measure_dir = out_dir.join(COUNT_DATA_DIR);
    if measure_dir.exists() {
        std::fs::remove_dir_all(&measure_dir)?;
    }
    std::fs::create_dir_all(&measure_dir)?;

    log_operation_start("Reading run outputs from", format!("{} files", files.len()));
    let data = read_run_outputs(files)?;

    log::info!("Filtering incomplete data from outputs");
    let rows = data.num_rows();
    let data = filter_out_incomplete(&data, keyspace)?;
    log::info!(
        "Filtered {} rows due to incomplete information, {} remaining",
        rows - data.num_rows(),
        data.num_rows()
    );

    let aggregated = aggregate_over_seed(&data)?;
    log::info!("Computing count data");
    let measure_data = make_measure_data(&pivot_and_split(&aggregated)?)?;

    log::info!("Writing count data to {}", measure_dir.display());
    measure_data.dump(&measure_dir)?;
    log_operation_complete(
        "processed",
        out_dir.display(),
        measure_data.iter().map(|(_, t)| t.num_rows()).sum(),
        Some(start.elapsed()),
    );
    Ok(measure_data)
}
