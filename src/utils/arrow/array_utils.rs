//! Utilities for working with Arrow arrays.
//!
//! This module provides functions for safely extracting typed data from
//! Arrow arrays and record batches with descriptive errors.

use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::record_batch::RecordBatch;

use crate::error::{Error, Result};

/// Get a column from a record batch by name
///
/// # Errors
/// Returns `Error::ColumnNotFound` if the batch has no such column
pub fn get_column<'a>(batch: &'a RecordBatch, column_name: &str) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(column_name)
        .ok_or_else(|| Error::ColumnNotFound {
            column: column_name.to_string(),
        })
}

/// Downcast an array reference to a concrete Arrow array type
///
/// # Arguments
/// * `array` - The array to downcast
/// * `column_name` - Column name used in the error message
/// * `expected_type_name` - Human readable name of the expected type
pub fn downcast_array<'a, A: Array + 'static>(
    array: &'a ArrayRef,
    column_name: &str,
    expected_type_name: &str,
) -> Result<&'a A> {
    array
        .as_any()
        .downcast_ref::<A>()
        .ok_or_else(|| Error::ColumnType {
            column: column_name.to_string(),
            expected: expected_type_name.to_string(),
            actual: array.data_type().to_string(),
        })
}

/// Copy a Float64 column into a vector, nulls become NaN
pub fn float_values(batch: &RecordBatch, column_name: &str) -> Result<Vec<f64>> {
    let array = downcast_array::<Float64Array>(get_column(batch, column_name)?, column_name, "Float64")?;
    Ok(array
        .iter()
        .map(|value| value.unwrap_or(f64::NAN))
        .collect())
}

/// Copy an Int64 column into a vector, nulls become zero
pub fn int_values(batch: &RecordBatch, column_name: &str) -> Result<Vec<i64>> {
    let array = downcast_array::<Int64Array>(get_column(batch, column_name)?, column_name, "Int64")?;
    Ok(array.iter().map(Option::unwrap_or_default).collect())
}

/// Copy a Utf8 column into a vector of owned strings, nulls become empty strings
pub fn string_values(batch: &RecordBatch, column_name: &str) -> Result<Vec<String>> {
    let array = downcast_array::<StringArray>(get_column(batch, column_name)?, column_name, "Utf8")?;
    Ok(array
        .iter()
        .map(|value| value.unwrap_or_default().to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn batch() -> RecordBatch {
        let schema = Schema::new(vec![
            Field::new("sex", DataType::Utf8, true),
            Field::new("mean", DataType::Float64, true),
        ]);
        RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(StringArray::from(vec![Some("Male"), None])),
                Arc::new(Float64Array::from(vec![Some(1.5), None])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_typed_extraction() {
        let batch = batch();
        assert_eq!(string_values(&batch, "sex").unwrap(), vec!["Male".to_string(), String::new()]);
        let means = float_values(&batch, "mean").unwrap();
        assert_eq!(means[0], 1.5);
        assert!(means[1].is_nan());
    }

    #[test]
    fn test_wrong_type_and_missing_column() {
        let batch = batch();
        assert!(matches!(float_values(&batch, "sex"), Err(Error::ColumnType { .. })));
        assert!(matches!(float_values(&batch, "sd"), Err(Error::ColumnNotFound { .. })));
    }
}
