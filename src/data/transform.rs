//! Reshaping of stratified input tables.
//!
//! Input measures arrive in long form: stratum columns (`sex`, `age_start`,
//! `age_end`, `year_start`, `year_end`, ...) plus a Float64 `value` column.
//! Lookup tables want one row per stratum with one column per quantity, so
//! these helpers align measures on their stratum columns and widen them.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, UInt32Array};
use arrow::compute::take_record_batch;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::display::array_value_to_string;
use itertools::Itertools;
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::utils::arrow::{float_values, get_column, string_values};

/// Name of the measure column in long-form input tables
pub const VALUE_COLUMN: &str = "value";
/// Name of the category column in long-form categorical exposures
pub const PARAMETER_COLUMN: &str = "parameter";

/// Columns that identify a stratum, i.e. every column except `excluded`
fn stratum_columns(batch: &RecordBatch, excluded: &[&str]) -> Vec<String> {
    batch
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .filter(|name| !excluded.contains(&name.as_str()))
        .collect()
}

fn stratum_keys(batch: &RecordBatch, strata: &[String]) -> Result<Vec<String>> {
    let columns = strata
        .iter()
        .map(|name| get_column(batch, name).map(|c| c.as_ref()))
        .collect::<Result<Vec<&dyn Array>>>()?;
    (0..batch.num_rows())
        .map(|row| {
            let parts = columns
                .iter()
                .map(|column| array_value_to_string(*column, row))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(parts.join("|"))
        })
        .collect()
}

fn project(batch: &RecordBatch, columns: &[String]) -> Result<RecordBatch> {
    let schema = batch.schema();
    let indices = columns
        .iter()
        .map(|name| {
            schema.index_of(name).map_err(|_| Error::ColumnNotFound {
                column: name.clone(),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(batch.project(&indices)?)
}

/// Append Float64 columns to a batch
fn with_float_columns(batch: &RecordBatch, columns: Vec<(String, Vec<f64>)>) -> Result<RecordBatch> {
    let schema = batch.schema();
    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    let mut arrays: Vec<ArrayRef> = batch.columns().to_vec();
    for (name, values) in columns {
        fields.push(Field::new(name, DataType::Float64, false));
        arrays.push(Arc::new(Float64Array::from(values)));
    }
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}

/// Values of `table`'s `value` column, reordered to match `keys`
fn aligned_values(table: &RecordBatch, strata: &[String], keys: &[String]) -> Result<Vec<f64>> {
    let table_keys = stratum_keys(table, strata)?;
    let values = float_values(table, VALUE_COLUMN)?;
    let by_key: FxHashMap<&str, f64> = table_keys
        .iter()
        .map(String::as_str)
        .zip(values.iter().copied())
        .collect();
    keys.iter()
        .map(|key| {
            by_key.get(key.as_str()).copied().ok_or_else(|| {
                Error::validation(format!("stratum [{key}] missing from aligned measure"))
            })
        })
        .collect()
}

/// Replace the `value` column of a long-form table
fn with_values(table: &RecordBatch, values: Vec<f64>) -> Result<RecordBatch> {
    let strata = stratum_columns(table, &[VALUE_COLUMN]);
    with_float_columns(&project(table, &strata)?, vec![(VALUE_COLUMN.to_string(), values)])
}

/// Remove columns from a batch, ignoring names that are not present
pub fn drop_columns(batch: &RecordBatch, columns: &[&str]) -> Result<RecordBatch> {
    let kept = stratum_columns(batch, columns);
    project(batch, &kept)
}

/// Widen a long-form categorical exposure into one column per category
///
/// Rows are grouped by every column other than `parameter` and `value`;
/// category columns are sorted by name. A stratum lacking a category fails.
pub fn pivot_categorical(data: &RecordBatch) -> Result<RecordBatch> {
    let parameters = string_values(data, PARAMETER_COLUMN)?;
    let values = float_values(data, VALUE_COLUMN)?;
    let strata = stratum_columns(data, &[PARAMETER_COLUMN, VALUE_COLUMN]);
    let keys = stratum_keys(data, &strata)?;

    let categories = parameters.iter().unique().sorted().cloned().collect_vec();
    let category_position: FxHashMap<&str, usize> = categories
        .iter()
        .enumerate()
        .map(|(i, c)| (c.as_str(), i))
        .collect();

    let mut group_of: FxHashMap<&str, usize> = FxHashMap::default();
    let mut first_rows: Vec<u32> = Vec::new();
    let mut cells: Vec<Vec<Option<f64>>> = vec![Vec::new(); categories.len()];
    for (row, key) in keys.iter().enumerate() {
        let group = *group_of.entry(key.as_str()).or_insert_with(|| {
            first_rows.push(row as u32);
            for column in &mut cells {
                column.push(None);
            }
            first_rows.len() - 1
        });
        cells[category_position[parameters[row].as_str()]][group] = Some(values[row]);
    }

    let columns = categories
        .iter()
        .zip(cells)
        .map(|(category, column)| {
            let filled = column
                .into_iter()
                .enumerate()
                .map(|(group, cell)| {
                    cell.ok_or_else(|| {
                        Error::validation(format!(
                            "stratum [{}] has no '{category}' value",
                            keys[first_rows[group] as usize]
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok((category.clone(), filled))
        })
        .collect::<Result<Vec<_>>>()?;

    let stratum_rows = take_record_batch(&project(data, &strata)?, &UInt32Array::from(first_rows))?;
    with_float_columns(&stratum_rows, columns)
}

/// Combine single-measure tables into one table with a named column per measure
///
/// # Arguments
/// * `tables` - `(column name, long-form table)` pairs sharing the same strata
/// * `fill` - Optional constant column appended to every row
pub fn merge_value_columns(
    tables: &[(&str, &RecordBatch)],
    fill: Option<(&str, f64)>,
) -> Result<RecordBatch> {
    let Some((_, first)) = tables.first() else {
        return Err(Error::validation("no tables to merge"));
    };
    let strata = stratum_columns(first, &[VALUE_COLUMN]);
    let keys = stratum_keys(first, &strata)?;

    let mut columns = tables
        .iter()
        .map(|(name, table)| Ok(((*name).to_string(), aligned_values(table, &strata, &keys)?)))
        .collect::<Result<Vec<_>>>()?;
    if let Some((name, value)) = fill {
        columns.push((name.to_string(), vec![value; keys.len()]));
    }
    with_float_columns(&project(first, &strata)?, columns)
}

/// Sum the `value` columns of the tables that are present
///
/// Absent measures are skipped. Returns `None` when nothing is present.
pub fn sum_available(tables: &[Option<RecordBatch>]) -> Result<Option<RecordBatch>> {
    let mut present = tables.iter().flatten();
    let Some(first) = present.next() else {
        return Ok(None);
    };
    let strata = stratum_columns(first, &[VALUE_COLUMN]);
    let keys = stratum_keys(first, &strata)?;
    let mut total = float_values(first, VALUE_COLUMN)?;
    for table in present {
        for (sum, value) in total.iter_mut().zip(aligned_values(table, &strata, &keys)?) {
            *sum += value;
        }
    }

    let skipped = tables.iter().filter(|t| t.is_none()).count();
    if skipped > 0 {
        log::debug!("Summed {} measures, skipped {skipped} absent", tables.len() - skipped);
    }
    with_values(first, total).map(Some)
}

/// Share of prevalence that is iron responsive, `r / (r + n)`
///
/// A missing side counts as zero prevalence and a zero denominator yields zero.
pub fn responsive_proportion(
    responsive: Option<&RecordBatch>,
    non_responsive: Option<&RecordBatch>,
) -> Result<RecordBatch> {
    let base = responsive.or(non_responsive).ok_or_else(|| Error::DataNotFound {
        key: "responsive and non-responsive prevalence".to_string(),
    })?;
    let strata = stratum_columns(base, &[VALUE_COLUMN]);
    let keys = stratum_keys(base, &strata)?;
    let side = |table: Option<&RecordBatch>| match table {
        Some(table) => aligned_values(table, &strata, &keys),
        None => Ok(vec![0.0; keys.len()]),
    };
    let responsive = side(responsive)?;
    let non_responsive = side(non_responsive)?;

    let proportion = responsive
        .iter()
        .zip(&non_responsive)
        .map(|(&r, &n)| if r + n == 0.0 { 0.0 } else { r / (r + n) })
        .collect();
    with_values(base, proportion)
}

/// Iron-responsive proportion among simulants without anemia
///
/// `1 - all - (reverse_causal - (all - responsive)) / (1 - all)`, with zero
/// where the expression is NaN. Infinite values are kept.
pub fn no_anemia_responsive_proportion(
    all_prevalence: &RecordBatch,
    responsive_prevalence: &RecordBatch,
    reverse_causal_prevalence: &RecordBatch,
) -> Result<RecordBatch> {
    let strata = stratum_columns(all_prevalence, &[VALUE_COLUMN]);
    let keys = stratum_keys(all_prevalence, &strata)?;
    let all = float_values(all_prevalence, VALUE_COLUMN)?;
    let responsive = aligned_values(responsive_prevalence, &strata, &keys)?;
    let reverse = aligned_values(reverse_causal_prevalence, &strata, &keys)?;

    let proportion = all
        .iter()
        .zip(responsive.iter().zip(&reverse))
        .map(|(&all, (&responsive, &reverse))| {
            let non_responsive = all - responsive;
            let value = 1.0 - all - (reverse - non_responsive) / (1.0 - all);
            if value.is_nan() { 0.0 } else { value }
        })
        .collect();
    with_values(all_prevalence, proportion)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::StringArray;

    fn measure(sexes: &[&str], values: &[f64]) -> RecordBatch {
        let schema = Schema::new(vec![
            Field::new("sex", DataType::Utf8, false),
            Field::new("age_start", DataType::Float64, false),
            Field::new(VALUE_COLUMN, DataType::Float64, false),
        ]);
        RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(StringArray::from(sexes.to_vec())),
                Arc::new(Float64Array::from(vec![0.0; sexes.len()])),
                Arc::new(Float64Array::from(values.to_vec())),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_pivot_categorical() {
        let schema = Schema::new(vec![
            Field::new("sex", DataType::Utf8, false),
            Field::new(PARAMETER_COLUMN, DataType::Utf8, false),
            Field::new(VALUE_COLUMN, DataType::Float64, false),
        ]);
        let long = RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(StringArray::from(vec!["Male", "Male", "Female", "Female"])),
                Arc::new(StringArray::from(vec!["cat2", "cat1", "cat1", "cat2"])),
                Arc::new(Float64Array::from(vec![0.7, 0.3, 0.4, 0.6])),
            ],
        )
        .unwrap();
        let wide = pivot_categorical(&long).unwrap();
        assert_eq!(wide.num_rows(), 2);
        assert_eq!(string_values(&wide, "sex").unwrap(), vec!["Male", "Female"]);
        assert_eq!(float_values(&wide, "cat1").unwrap(), vec![0.3, 0.4]);
        assert_eq!(float_values(&wide, "cat2").unwrap(), vec![0.7, 0.6]);

        let incomplete = long.slice(0, 3);
        assert!(pivot_categorical(&incomplete).is_err());
    }

    #[test]
    fn test_merge_aligns_on_strata() {
        let mild = measure(&["Male", "Female"], &[0.1, 0.2]);
        let severe = measure(&["Female", "Male"], &[0.4, 0.3]);
        let merged = merge_value_columns(&[("mild", &mild), ("severe", &severe)], Some(("none", 1.0)))
            .unwrap();
        assert_eq!(float_values(&merged, "mild").unwrap(), vec![0.1, 0.2]);
        assert_eq!(float_values(&merged, "severe").unwrap(), vec![0.3, 0.4]);
        assert_eq!(float_values(&merged, "none").unwrap(), vec![1.0, 1.0]);
        assert!(merged.column_by_name(VALUE_COLUMN).is_none());

        let partial = measure(&["Male"], &[0.5]);
        assert!(merge_value_columns(&[("mild", &mild), ("other", &partial)], None).is_err());
    }

    #[test]
    fn test_sum_available_skips_absent() {
        let a = measure(&["Male", "Female"], &[0.1, 0.2]);
        let b = measure(&["Female", "Male"], &[0.3, 0.4]);
        let total = sum_available(&[Some(a), None, Some(b)]).unwrap().unwrap();
        let values = float_values(&total, VALUE_COLUMN).unwrap();
        assert!((values[0] - 0.5).abs() < 1e-12 && (values[1] - 0.5).abs() < 1e-12);
        assert!(sum_available(&[None, None]).unwrap().is_none());
    }

    #[test]
    fn test_responsive_proportion_zero_denominator() {
        let responsive = measure(&["Male", "Female"], &[0.0, 0.3]);
        let non_responsive = measure(&["Male", "Female"], &[0.0, 0.1]);
        let proportion = responsive_proportion(Some(&responsive), Some(&non_responsive)).unwrap();
        let values = float_values(&proportion, VALUE_COLUMN).unwrap();
        assert_eq!(values[0], 0.0);
        assert!((values[1] - 0.75).abs() < 1e-12);

        let only_responsive = responsive_proportion(Some(&responsive), None).unwrap();
        assert_eq!(float_values(&only_responsive, VALUE_COLUMN).unwrap(), vec![0.0, 1.0]);
        assert!(responsive_proportion(None, None).is_err());
    }

    #[test]
    fn test_no_anemia_proportion() {
        let all = measure(&["Male", "Female"], &[0.5, 1.0]);
        let responsive = measure(&["Male", "Female"], &[0.3, 0.5]);
        let reverse = measure(&["Male", "Female"], &[0.2, 0.1]);
        let proportion = no_anemia_responsive_proportion(&all, &responsive, &reverse).unwrap();
        let values = float_values(&proportion, VALUE_COLUMN).unwrap();
        // 1 - 0.5 - (0.2 - 0.2) / 0.5
        assert!((values[0] - 0.5).abs() < 1e-12);
        // Everyone anemic: 0 - (0.1 - 0.5) / 0 diverges and is kept
        assert_eq!(values[1], f64::INFINITY);

        // Everyone anemic with a balanced numerator: 0 / 0 becomes zero
        let all = measure(&["Male", "Female"], &[1.0, 1.0]);
        let responsive = measure(&["Male", "Female"], &[0.5, 0.5]);
        let reverse = measure(&["Male", "Female"], &[0.5, 0.7]);
        let proportion = no_anemia_responsive_proportion(&all, &responsive, &reverse).unwrap();
        let values = float_values(&proportion, VALUE_COLUMN).unwrap();
        assert_eq!(values[0], 0.0);
        assert_eq!(values[1], f64::NEG_INFINITY);
    }
}
