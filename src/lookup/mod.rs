//! Stratified lookup tables.
//!
//! A lookup table resolves one row of values per simulant: discrete key
//! columns (e.g. `sex`) must match exactly and every parameter column
//! (e.g. `age`, `year`) must fall inside the row's `[<param>_start, <param>_end)`
//! bin. Rows are expected to tile the supported domain; a simulant that
//! matches nothing is a data defect and fails the lookup.

use arrow::array::UInt32Array;
use arrow::compute::take_record_batch;
use arrow::record_batch::RecordBatch;
use itertools::Itertools;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::population::{PopulationTable, SimulationClock};
use crate::utils::arrow::{float_values, string_values};

/// Parameter column resolved from the clock rather than the population table
pub const YEAR_PARAMETER: &str = "year";

#[derive(Debug, Clone)]
struct BinnedRow {
    bounds: SmallVec<[(f64, f64); 2]>,
    row: u32,
}

impl BinnedRow {
    fn contains(&self, covariates: &[f64]) -> bool {
        self.bounds
            .iter()
            .zip(covariates)
            .all(|(&(start, end), &value)| start <= value && value < end)
    }

    fn overlaps(&self, other: &Self) -> bool {
        self.bounds
            .iter()
            .zip(&other.bounds)
            .all(|(&(a_start, a_end), &(b_start, b_end))| a_start < b_end && b_start < a_end)
    }
}

/// Table of stratum values resolved per simulant
#[derive(Debug, Clone)]
pub struct LookupTable {
    name: String,
    key_columns: Vec<String>,
    parameter_columns: Vec<String>,
    groups: FxHashMap<Vec<String>, Vec<BinnedRow>>,
    values: RecordBatch,
}

impl LookupTable {
    /// Build a lookup table from stratified input data
    ///
    /// # Arguments
    /// * `name` - Name used in error messages
    /// * `data` - Input rows; every column that is neither a key nor a bin edge is a value column
    /// * `key_columns` - Utf8 columns matched exactly against population columns
    /// * `parameter_columns` - Names `p` with Float64 `p_start`/`p_end` bin edges
    pub fn build(
        name: &str,
        data: &RecordBatch,
        key_columns: &[&str],
        parameter_columns: &[&str],
    ) -> Result<Self> {
        let keys = key_columns
            .iter()
            .map(|c| string_values(data, c))
            .collect::<Result<Vec<_>>>()?;
        let edges = parameter_columns
            .iter()
            .map(|p| {
                Ok((
                    float_values(data, &format!("{p}_start"))?,
                    float_values(data, &format!("{p}_end"))?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut groups: FxHashMap<Vec<String>, Vec<BinnedRow>> = FxHashMap::default();
        for row in 0..data.num_rows() {
            let key: Vec<String> = keys.iter().map(|column| column[row].clone()).collect();
            let bounds = edges.iter().map(|(start, end)| (start[row], end[row])).collect();
            groups.entry(key).or_default().push(BinnedRow {
                bounds,
                row: row as u32,
            });
        }

        for (key, rows) in &groups {
            for (a, b) in rows.iter().tuple_combinations() {
                if a.overlaps(b) {
                    return Err(Error::configuration(format!(
                        "Lookup table '{name}' has overlapping strata for key {key:?} (rows {} and {})",
                        a.row, b.row
                    )));
                }
            }
        }

        let reserved: Vec<String> = key_columns
            .iter()
            .map(|c| (*c).to_string())
            .chain(
                parameter_columns
                    .iter()
                    .flat_map(|p| [format!("{p}_start"), format!("{p}_end")]),
            )
            .collect();
        let schema = data.schema();
        let value_positions: Vec<usize> = schema
            .fields()
            .iter()
            .enumerate()
            .filter(|(_, f)| !reserved.contains(f.name()))
            .map(|(i, _)| i)
            .collect();
        if value_positions.is_empty() {
            return Err(Error::configuration(format!(
                "Lookup table '{name}' has no value columns"
            )));
        }

        Ok(Self {
            name: name.to_string(),
            key_columns: key_columns.iter().map(|c| (*c).to_string()).collect(),
            parameter_columns: parameter_columns.iter().map(|c| (*c).to_string()).collect(),
            groups,
            values: data.project(&value_positions)?,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Population columns this table reads (keys and non-year parameters)
    #[must_use]
    pub fn required_columns(&self) -> Vec<String> {
        self.key_columns
            .iter()
            .chain(self.parameter_columns.iter().filter(|p| *p != YEAR_PARAMETER))
            .cloned()
            .collect()
    }

    /// Names of the value columns
    #[must_use]
    pub fn value_columns(&self) -> Vec<String> {
        self.values
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    /// Resolve the value row of every simulant in `index`
    ///
    /// # Errors
    /// Returns `Error::LookupMiss` if a simulant's covariates match no row
    pub fn lookup(
        &self,
        population: &PopulationTable,
        clock: &SimulationClock,
        index: &[usize],
    ) -> Result<RecordBatch> {
        let required = self.required_columns();
        let covariate_rows = population
            .view(&required.iter().map(String::as_str).collect::<Vec<_>>())?
            .get(index)?;
        let keys = self
            .key_columns
            .iter()
            .map(|c| string_values(&covariate_rows, c))
            .collect::<Result<Vec<_>>>()?;
        let parameters = self
            .parameter_columns
            .iter()
            .map(|p| {
                if p == YEAR_PARAMETER {
                    Ok(vec![clock.decimal_year(); index.len()])
                } else {
                    float_values(&covariate_rows, p)
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let mut rows = Vec::with_capacity(index.len());
        let mut key = Vec::with_capacity(keys.len());
        let mut covariates: SmallVec<[f64; 2]> = SmallVec::new();
        for position in 0..index.len() {
            key.clear();
            key.extend(keys.iter().map(|column| column[position].clone()));
            covariates.clear();
            covariates.extend(parameters.iter().map(|column| column[position]));

            let row = self
                .groups
                .get(&key)
                .and_then(|candidates| candidates.iter().find(|r| r.contains(&covariates)))
                .map(|r| r.row)
                .ok_or_else(|| self.miss(&key, &covariates))?;
            rows.push(row);
        }

        Ok(take_record_batch(&self.values, &UInt32Array::from(rows))?)
    }

    fn miss(&self, key: &[String], covariates: &[f64]) -> Error {
        let described = self
            .key_columns
            .iter()
            .zip(key)
            .map(|(c, v)| format!("{c}={v}"))
            .chain(
                self.parameter_columns
                    .iter()
                    .zip(covariates)
                    .map(|(p, v)| format!("{p}={v}")),
            )
            .join(", ");
        Error::LookupMiss {
            table: self.name.clone(),
            covariates: described,
        }
    }
}

/// Pick, for every row, the Float64 value in the column named by `labels[row]`
///
/// Used to read per-severity values (e.g. `mild`, `moderate`) out of a lookup result.
pub fn select_by_label<S: AsRef<str>>(rows: &RecordBatch, labels: &[S]) -> Result<Vec<f64>> {
    if labels.len() != rows.num_rows() {
        return Err(Error::validation(format!(
            "{} labels for {} lookup rows",
            labels.len(),
            rows.num_rows()
        )));
    }
    let mut columns: FxHashMap<&str, Vec<f64>> = FxHashMap::default();
    let mut selected = Vec::with_capacity(labels.len());
    for (row, label) in labels.iter().enumerate() {
        let label = label.as_ref();
        if !columns.contains_key(label) {
            columns.insert(label, float_values(rows, label)?);
        }
        selected.push(columns[label][row]);
    }
    Ok(selected)
}
