//! Shared test support
//!
//! Synthetic inputs used by unit tests and the integration tests.

pub mod fixtures;

pub use fixtures::{
    ModelInputs, age_split_table, categorical_exposure_table, clock, model_registry, population,
    scratch_dir, uniform_table,
};
