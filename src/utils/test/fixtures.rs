//! Synthetic input tables and populations
//!
//! Every table covers both sexes, ages [0, 125) and years [1900, 2100), so
//! lookups built from them resolve for any simulant a test creates.

use std::path::PathBuf;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;

use crate::data::keys::{self, iron_deficiency, vitamin_a};
use crate::data::{DataRegistry, PARAMETER_COLUMN, VALUE_COLUMN};
use crate::error::Result;
use crate::population::{
    ALIVE, ColumnSpec, PopulationTable, PopulationUpdate, SimulationClock, columns,
};

pub const SEXES: [&str; 2] = ["Male", "Female"];
pub const AGE_BOUNDS: (f64, f64) = (0.0, 125.0);
pub const YEAR_BOUNDS: (f64, f64) = (1900.0, 2100.0);

fn stratum_fields() -> Vec<Field> {
    vec![
        Field::new("sex", DataType::Utf8, false),
        Field::new("age_start", DataType::Float64, false),
        Field::new("age_end", DataType::Float64, false),
        Field::new("year_start", DataType::Float64, false),
        Field::new("year_end", DataType::Float64, false),
    ]
}

/// Stratum columns for rows `(sex, age_start, age_end)`
fn stratum_columns(rows: &[(&str, f64, f64)]) -> Vec<ArrayRef> {
    vec![
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.0))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.1))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.2))),
        Arc::new(Float64Array::from(vec![YEAR_BOUNDS.0; rows.len()])),
        Arc::new(Float64Array::from(vec![YEAR_BOUNDS.1; rows.len()])),
    ]
}

/// One row per sex with a constant Float64 column per `(name, value)`
pub fn uniform_table(values: &[(&str, f64)]) -> Result<RecordBatch> {
    let rows = SEXES.map(|sex| (sex, AGE_BOUNDS.0, AGE_BOUNDS.1));
    let mut fields = stratum_fields();
    let mut arrays = stratum_columns(&rows);
    for (name, value) in values {
        fields.push(Field::new(*name, DataType::Float64, false));
        arrays.push(Arc::new(Float64Array::from(vec![*value; rows.len()])));
    }
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}

/// Two age bins per sex, split at `split_age`, with a `value` column
pub fn age_split_table(split_age: f64, young: f64, old: f64) -> Result<RecordBatch> {
    let rows = SEXES
        .iter()
        .flat_map(|&sex| [(sex, AGE_BOUNDS.0, split_age), (sex, split_age, AGE_BOUNDS.1)])
        .collect::<Vec<_>>();
    let values = rows
        .iter()
        .map(|&(_, start, _)| if start < split_age { young } else { old })
        .collect::<Vec<_>>();
    let mut fields = stratum_fields();
    let mut arrays = stratum_columns(&rows);
    fields.push(Field::new(VALUE_COLUMN, DataType::Float64, false));
    arrays.push(Arc::new(Float64Array::from(values)));
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}

/// Long-format categorical table: one `parameter`/`value` row per sex and category
pub fn categorical_exposure_table(categories: &[(&str, f64)]) -> Result<RecordBatch> {
    let rows = SEXES
        .iter()
        .flat_map(|&sex| categories.iter().map(move |_| (sex, AGE_BOUNDS.0, AGE_BOUNDS.1)))
        .collect::<Vec<_>>();
    let parameters = SEXES
        .iter()
        .flat_map(|_| categories.iter().map(|(name, _)| *name))
        .collect::<Vec<_>>();
    let values = SEXES
        .iter()
        .flat_map(|_| categories.iter().map(|(_, value)| *value))
        .collect::<Vec<_>>();

    let mut fields = stratum_fields();
    let mut arrays = stratum_columns(&rows);
    fields.push(Field::new(PARAMETER_COLUMN, DataType::Utf8, false));
    fields.push(Field::new(VALUE_COLUMN, DataType::Float64, false));
    arrays.push(Arc::new(StringArray::from(parameters)));
    arrays.push(Arc::new(Float64Array::from(values)));
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}

/// Constant model inputs used to assemble a [`DataRegistry`]
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInputs {
    pub hemoglobin_mean: f64,
    pub hemoglobin_sd: f64,
    /// Iron-responsive proportion of every anemic severity
    pub iron_responsive_proportion: f64,
    /// Disability weights for mild, moderate and severe anemia
    pub anemia_disability_weights: [f64; 3],
    pub vitamin_a_exposure: f64,
    pub vitamin_a_disability_weight: f64,
    pub neural_tube_defects_birth_prevalence: f64,
}

impl Default for ModelInputs {
    fn default() -> Self {
        Self {
            hemoglobin_mean: 120.0,
            hemoglobin_sd: 15.0,
            iron_responsive_proportion: 0.5,
            anemia_disability_weights: [0.004, 0.052, 0.149],
            vitamin_a_exposure: 0.3,
            vitamin_a_disability_weight: 0.1,
            neural_tube_defects_birth_prevalence: 0.01,
        }
    }
}

/// Registry holding every table the standard components load
pub fn model_registry(inputs: &ModelInputs) -> Result<DataRegistry> {
    let mut registry = DataRegistry::new();
    registry.insert(
        iron_deficiency::EXPOSURE,
        categorical_exposure_table(&[("continuous", inputs.hemoglobin_mean)])?,
    );
    registry.insert(
        iron_deficiency::EXPOSURE_SD,
        uniform_table(&[(VALUE_COLUMN, inputs.hemoglobin_sd)])?,
    );

    let levels = [
        (
            iron_deficiency::MILD_ANEMIA_IRON_RESPONSIVE_PROPORTION,
            iron_deficiency::MILD_ANEMIA_DISABILITY_WEIGHT,
        ),
        (
            iron_deficiency::MODERATE_ANEMIA_IRON_RESPONSIVE_PROPORTION,
            iron_deficiency::MODERATE_ANEMIA_DISABILITY_WEIGHT,
        ),
        (
            iron_deficiency::SEVERE_ANEMIA_IRON_RESPONSIVE_PROPORTION,
            iron_deficiency::SEVERE_ANEMIA_DISABILITY_WEIGHT,
        ),
    ];
    for ((proportion_key, weight_key), weight) in levels.into_iter().zip(inputs.anemia_disability_weights) {
        registry.insert(
            proportion_key,
            uniform_table(&[(VALUE_COLUMN, inputs.iron_responsive_proportion)])?,
        );
        registry.insert(weight_key, uniform_table(&[(VALUE_COLUMN, weight)])?);
    }

    registry.insert(
        vitamin_a::EXPOSURE,
        categorical_exposure_table(&[
            ("cat1", inputs.vitamin_a_exposure),
            ("cat2", 1.0 - inputs.vitamin_a_exposure),
        ])?,
    );
    registry.insert(
        vitamin_a::DISABILITY_WEIGHT,
        uniform_table(&[(VALUE_COLUMN, inputs.vitamin_a_disability_weight)])?,
    );
    registry.insert(
        keys::birth_prevalence(keys::NEURAL_TUBE_DEFECTS),
        uniform_table(&[(VALUE_COLUMN, inputs.neural_tube_defects_birth_prevalence)])?,
    );
    Ok(registry)
}

/// Population with `age`, `sex` and `alive` columns, everyone alive
pub fn population(ages: &[f64], sexes: &[&str]) -> Result<PopulationTable> {
    let mut table = PopulationTable::new(ages.len())?;
    table.add_columns(&[
        ColumnSpec::new(columns::AGE, DataType::Float64),
        ColumnSpec::new(columns::SEX, DataType::Utf8),
        ColumnSpec::new(columns::ALIVE, DataType::Utf8),
    ])?;
    let sexes = (0..ages.len())
        .map(|i| sexes.get(i % sexes.len().max(1)).copied().unwrap_or(SEXES[0]))
        .collect::<Vec<_>>();
    let update = PopulationUpdate::new(table.full_index())
        .with_floats(columns::AGE, ages.to_vec())
        .with_strings(columns::SEX, &sexes)
        .with_strings(columns::ALIVE, &vec![ALIVE; ages.len()]);
    table.update(update)?;
    Ok(table)
}

/// Clock running through 2020 with the given step size
#[must_use]
pub fn clock(step_size_days: i64) -> SimulationClock {
    let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default();
    let end = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap_or_default();
    SimulationClock::new(start, end, step_size_days)
}

/// Fresh empty directory under the system temp dir
pub fn scratch_dir(name: &str) -> Result<PathBuf> {
    let dir = std::env::temp_dir().join(format!("lsff-sim-{name}-{}", std::process::id()));
    if dir.exists() {
        std::fs::remove_dir_all(&dir)?;
    }
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::arrow::{float_values, string_values};

    #[test]
    fn test_uniform_table_shape() {
        let table = uniform_table(&[("mean", 120.0), ("sd", 15.0)]).unwrap();
        assert_eq!(table.num_rows(), 2);
        assert_eq!(string_values(&table, "sex").unwrap(), vec!["Male", "Female"]);
        assert_eq!(float_values(&table, "sd").unwrap(), vec![15.0, 15.0]);
    }

    #[test]
    fn test_categorical_table_is_long() {
        let table = categorical_exposure_table(&[("cat1", 0.2), ("cat2", 0.8)]).unwrap();
        assert_eq!(table.num_rows(), 4);
        assert_eq!(
            string_values(&table, PARAMETER_COLUMN).unwrap(),
            vec!["cat1", "cat2", "cat1", "cat2"]
        );
        assert_eq!(float_values(&table, VALUE_COLUMN).unwrap(), vec![0.2, 0.8, 0.2, 0.8]);
    }

    #[test]
    fn test_model_registry_is_complete() {
        let registry = model_registry(&ModelInputs::default()).unwrap();
        assert!(registry.contains(iron_deficiency::SEVERE_ANEMIA_DISABILITY_WEIGHT));
        assert!(registry.contains(&keys::birth_prevalence(keys::NEURAL_TUBE_DEFECTS)));
    }

    #[test]
    fn test_population_alternates_sexes() {
        let table = population(&[0.5, 1.0, 2.0], &SEXES).unwrap();
        assert_eq!(
            table.string_values(columns::SEX, &table.full_index()).unwrap(),
            vec!["Male", "Female", "Male"]
        );
        assert_eq!(table.alive_index(&table.full_index()).unwrap(), vec![0, 1, 2]);
    }
}
