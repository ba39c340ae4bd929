//! Columnar simulant table backed by an Arrow record batch.
//!
//! Simulants are addressed by their row position, which stays stable for the
//! whole run. Columns are declared during setup (null filled) and populated
//! by initialization updates.

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, Date32Array, Float64Array, Int64Array, StringArray,
    UInt32Array, new_null_array,
};
use arrow::compute::{interleave, take_record_batch};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use chrono::NaiveDate;

use crate::error::{Error, Result};
use crate::population::ALIVE;
use crate::utils::arrow::{date32_to_naive_date, downcast_array, naive_date_to_date32};

/// Name and Arrow type of a column created by a component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub data_type: DataType,
}

impl ColumnSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// The population table
#[derive(Debug, Clone)]
pub struct PopulationTable {
    batch: RecordBatch,
}

impl PopulationTable {
    /// Create a table of `size` simulants with no columns
    pub fn new(size: usize) -> Result<Self> {
        let options = RecordBatchOptions::new().with_row_count(Some(size));
        let batch =
            RecordBatch::try_new_with_options(Arc::new(Schema::empty()), Vec::new(), &options)?;
        Ok(Self { batch })
    }

    /// Number of simulants
    #[must_use]
    pub fn size(&self) -> usize {
        self.batch.num_rows()
    }

    /// Index covering every simulant in row order
    #[must_use]
    pub fn full_index(&self) -> Vec<usize> {
        (0..self.size()).collect()
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.batch.schema().index_of(name).is_ok()
    }

    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    /// The underlying record batch
    #[must_use]
    pub const fn as_record_batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Add null-filled columns
    ///
    /// # Errors
    /// Returns `Error::DuplicateRegistration` if a column already exists
    pub fn add_columns(&mut self, specs: &[ColumnSpec]) -> Result<()> {
        if specs.is_empty() {
            return Ok(());
        }
        let schema = self.batch.schema();
        let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
        let mut columns: Vec<ArrayRef> = self.batch.columns().to_vec();

        for spec in specs {
            if fields.iter().any(|f| f.name() == &spec.name) {
                return Err(Error::DuplicateRegistration {
                    name: spec.name.clone(),
                });
            }
            fields.push(Field::new(&spec.name, spec.data_type.clone(), true));
            columns.push(new_null_array(&spec.data_type, self.size()));
        }

        let options = RecordBatchOptions::new().with_row_count(Some(self.size()));
        self.batch =
            RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), columns, &options)?;
        Ok(())
    }

    /// Get a full column by name
    pub fn column(&self, name: &str) -> Result<&ArrayRef> {
        self.batch
            .column_by_name(name)
            .ok_or_else(|| Error::ColumnNotFound {
                column: name.to_string(),
            })
    }

    /// Scoped read access to a subset of columns
    pub fn view(&self, columns: &[&str]) -> Result<PopulationView<'_>> {
        for column in columns {
            self.column(column)?;
        }
        Ok(PopulationView {
            table: self,
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
        })
    }

    fn check_index(&self, index: &[usize]) -> Result<()> {
        let size = self.size();
        match index.iter().find(|&&i| i >= size) {
            Some(&bad) => Err(Error::IndexOutOfBounds { index: bad, size }),
            None => Ok(()),
        }
    }

    /// Float64 values for the simulants in `index`, nulls become NaN
    pub fn float_values(&self, name: &str, index: &[usize]) -> Result<Vec<f64>> {
        self.check_index(index)?;
        let array = downcast_array::<Float64Array>(self.column(name)?, name, "Float64")?;
        Ok(index
            .iter()
            .map(|&i| if array.is_null(i) { f64::NAN } else { array.value(i) })
            .collect())
    }

    /// Int64 values for the simulants in `index`, nulls become zero
    pub fn int_values(&self, name: &str, index: &[usize]) -> Result<Vec<i64>> {
        self.check_index(index)?;
        let array = downcast_array::<Int64Array>(self.column(name)?, name, "Int64")?;
        Ok(index
            .iter()
            .map(|&i| if array.is_null(i) { 0 } else { array.value(i) })
            .collect())
    }

    /// Utf8 values for the simulants in `index`, nulls become empty strings
    pub fn string_values(&self, name: &str, index: &[usize]) -> Result<Vec<String>> {
        self.check_index(index)?;
        let array = downcast_array::<StringArray>(self.column(name)?, name, "Utf8")?;
        Ok(index
            .iter()
            .map(|&i| {
                if array.is_null(i) {
                    String::new()
                } else {
                    array.value(i).to_string()
                }
            })
            .collect())
    }

    /// Date32 values for the simulants in `index`
    pub fn date_values(&self, name: &str, index: &[usize]) -> Result<Vec<Option<NaiveDate>>> {
        self.check_index(index)?;
        let array = downcast_array::<Date32Array>(self.column(name)?, name, "Date32")?;
        Ok(index
            .iter()
            .map(|&i| (!array.is_null(i)).then(|| date32_to_naive_date(array.value(i))))
            .collect())
    }

    /// The subset of `index` whose `alive` column reads "alive"
    pub fn alive_index(&self, index: &[usize]) -> Result<Vec<usize>> {
        let status = self.string_values(crate::population::columns::ALIVE, index)?;
        Ok(index
            .iter()
            .zip(status)
            .filter(|(_, s)| s == ALIVE)
            .map(|(&i, _)| i)
            .collect())
    }

    /// Write the columns of `update` for its index
    ///
    /// Rows outside the update's index keep their values. When the index covers
    /// the whole table in row order the column is replaced outright.
    pub fn update(&mut self, update: PopulationUpdate) -> Result<()> {
        self.check_index(&update.index)?;
        if update.columns.is_empty() {
            return Ok(());
        }
        let schema = self.batch.schema();
        let mut columns: Vec<ArrayRef> = self.batch.columns().to_vec();
        let whole_table = update.index.len() == self.size()
            && update.index.iter().enumerate().all(|(pos, &row)| pos == row);

        for (name, values) in update.columns {
            let position = schema.index_of(&name).map_err(|_| Error::ColumnNotFound {
                column: name.clone(),
            })?;
            let existing = Arc::clone(&columns[position]);
            if existing.data_type() != values.data_type() {
                return Err(Error::ColumnType {
                    column: name,
                    expected: existing.data_type().to_string(),
                    actual: values.data_type().to_string(),
                });
            }
            if values.len() != update.index.len() {
                return Err(Error::validation(format!(
                    "Update for column '{name}' has {} values for {} simulants",
                    values.len(),
                    update.index.len()
                )));
            }

            columns[position] = if whole_table {
                values
            } else {
                let mut sources: Vec<(usize, usize)> = (0..self.size()).map(|row| (0, row)).collect();
                for (pos, &row) in update.index.iter().enumerate() {
                    sources[row] = (1, pos);
                }
                interleave(&[existing.as_ref(), values.as_ref()], &sources)?
            };
        }

        let options = RecordBatchOptions::new().with_row_count(Some(self.size()));
        self.batch = RecordBatch::try_new_with_options(schema, columns, &options)?;
        Ok(())
    }
}

/// Read access to a subset of the population table's columns
#[derive(Debug, Clone)]
pub struct PopulationView<'a> {
    table: &'a PopulationTable,
    columns: Vec<String>,
}

impl PopulationView<'_> {
    /// Projected rows for the simulants in `index`, in index order
    pub fn get(&self, index: &[usize]) -> Result<RecordBatch> {
        self.table.check_index(index)?;
        let schema = self.table.batch.schema();
        let projection = self
            .columns
            .iter()
            .map(|c| {
                schema.index_of(c).map_err(|_| Error::ColumnNotFound {
                    column: c.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let projected = self.table.batch.project(&projection)?;
        if projection.is_empty() {
            let options = RecordBatchOptions::new().with_row_count(Some(index.len()));
            return Ok(RecordBatch::try_new_with_options(projected.schema(), Vec::new(), &options)?);
        }
        let rows = UInt32Array::from(index.iter().map(|&i| i as u32).collect::<Vec<_>>());
        Ok(take_record_batch(&projected, &rows)?)
    }
}

/// Column values to write for a set of simulants
#[derive(Debug, Clone, Default)]
pub struct PopulationUpdate {
    index: Vec<usize>,
    columns: Vec<(String, ArrayRef)>,
}

impl PopulationUpdate {
    #[must_use]
    pub const fn new(index: Vec<usize>) -> Self {
        Self {
            index,
            columns: Vec::new(),
        }
    }

    #[must_use]
    pub fn index(&self) -> &[usize] {
        &self.index
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Names of the columns carried by this update
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    #[must_use]
    pub fn with_array(mut self, name: impl Into<String>, values: ArrayRef) -> Self {
        self.columns.push((name.into(), values));
        self
    }

    #[must_use]
    pub fn with_floats(self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.with_array(name, Arc::new(Float64Array::from(values)))
    }

    #[must_use]
    pub fn with_ints(self, name: impl Into<String>, values: Vec<i64>) -> Self {
        self.with_array(name, Arc::new(Int64Array::from(values)))
    }

    #[must_use]
    pub fn with_strings<S: AsRef<str>>(self, name: impl Into<String>, values: &[S]) -> Self {
        let array = StringArray::from_iter_values(values.iter().map(AsRef::as_ref));
        self.with_array(name, Arc::new(array))
    }

    #[must_use]
    pub fn with_bools(self, name: impl Into<String>, values: Vec<bool>) -> Self {
        self.with_array(name, Arc::new(BooleanArray::from(values)))
    }

    #[must_use]
    pub fn with_dates(self, name: impl Into<String>, values: &[Option<NaiveDate>]) -> Self {
        let array: Date32Array = values.iter().map(|d| d.map(naive_date_to_date32)).collect();
        self.with_array(name, Arc::new(array))
    }
}
