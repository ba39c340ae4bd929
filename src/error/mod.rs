//! Error handling for the simulation.
//!
//! Configuration errors are raised while the simulation is being wired
//! together and abort the run before the first time step. Everything else
//! surfaces while stepping or while post-processing results.

use std::io;

use arrow::error::ArrowError;
use parquet::errors::ParquetError;

/// Errors produced by the simulation core
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A pipeline was requested or required but never registered
    #[error("Unknown pipeline '{name}'")]
    UnknownPipeline { name: String },

    /// The declared pipeline dependencies contain a cycle
    #[error("Dependency cycle between pipelines: {}", .pipelines.join(" -> "))]
    DependencyCycle { pipelines: Vec<String> },

    /// A pipeline or a column was registered twice
    #[error("Duplicate registration of '{name}'")]
    DuplicateRegistration { name: String },

    /// Wiring problem detected during setup
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No stratum row matched a simulant's covariates
    #[error("Lookup error: no row in '{table}' matches {covariates}")]
    LookupMiss { table: String, covariates: String },

    /// Column missing from the population table or an input table
    #[error("Column not found: {column}")]
    ColumnNotFound { column: String },

    /// Column exists but has an unexpected Arrow type
    #[error("Column '{column}' has type {actual}, expected {expected}")]
    ColumnType {
        column: String,
        expected: String,
        actual: String,
    },

    /// Simulant index outside of the population table
    #[error("Simulant index {index} out of bounds for population of {size}")]
    IndexOutOfBounds { index: usize, size: usize },

    /// A pipeline value was read as the wrong kind
    #[error("Pipeline value is {actual}, expected {expected}")]
    ValueType {
        expected: &'static str,
        actual: &'static str,
    },

    /// Requested input data is absent
    #[error("Input data not found: {key}")]
    DataNotFound { key: String },

    /// An observation key cannot be written or read by the output grammar
    #[error("Output naming error: {0}")]
    Grammar(String),

    /// Generic validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Shorthand for a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether this error belongs to the setup-time wiring class
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnknownPipeline { .. }
                | Self::DependencyCycle { .. }
                | Self::DuplicateRegistration { .. }
                | Self::Configuration(_)
        )
    }
}

/// Result type for simulation operations
pub type Result<T> = std::result::Result<T, Error>;
