//! Values flowing through pipelines.

use arrow::record_batch::RecordBatch;

use crate::error::{Error, Result};

/// The output of a pipeline for an index of simulants
///
/// Every variant holds exactly one entry per simulant in the index the
/// pipeline was evaluated for (the `List` variant holds one vector per
/// contribution, each of index length).
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineValue {
    Float(Vec<f64>),
    Bool(Vec<bool>),
    Category(Vec<String>),
    List(Vec<Vec<f64>>),
    Frame(RecordBatch),
}

impl PipelineValue {
    /// Name of the variant, used in error messages
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Float(_) => "float",
            Self::Bool(_) => "bool",
            Self::Category(_) => "category",
            Self::List(_) => "list",
            Self::Frame(_) => "frame",
        }
    }

    fn mismatch(&self, expected: &'static str) -> Error {
        Error::ValueType {
            expected,
            actual: self.kind(),
        }
    }

    pub fn into_float(self) -> Result<Vec<f64>> {
        match self {
            Self::Float(values) => Ok(values),
            other => Err(other.mismatch("float")),
        }
    }

    pub fn into_bool(self) -> Result<Vec<bool>> {
        match self {
            Self::Bool(values) => Ok(values),
            other => Err(other.mismatch("bool")),
        }
    }

    pub fn into_category(self) -> Result<Vec<String>> {
        match self {
            Self::Category(values) => Ok(values),
            other => Err(other.mismatch("category")),
        }
    }

    pub fn into_list(self) -> Result<Vec<Vec<f64>>> {
        match self {
            Self::List(values) => Ok(values),
            other => Err(other.mismatch("list")),
        }
    }

    pub fn into_frame(self) -> Result<RecordBatch> {
        match self {
            Self::Frame(batch) => Ok(batch),
            other => Err(other.mismatch("frame")),
        }
    }

    pub fn as_float(&self) -> Result<&[f64]> {
        match self {
            Self::Float(values) => Ok(values),
            other => Err(other.mismatch("float")),
        }
    }

    /// Number of simulants the value covers
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Float(v) => v.len(),
            Self::Bool(v) => v.len(),
            Self::Category(v) => v.len(),
            Self::List(v) => v.first().map_or(0, Vec::len),
            Self::Frame(batch) => batch.num_rows(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
