//! IO utilities for file operations
//!
//! Parquet is the storage format for input tables and run outputs; CSV is
//! written alongside processed results for inspection.

pub mod parquet;

pub use parquet::{
    find_parquet_files, load_parquet_files_parallel, read_parquet, validate_directory, write_csv,
    write_parquet,
};
