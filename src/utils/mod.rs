//! Utility modules shared across the crate
//!
//! Arrow helpers, Parquet/CSV IO, logging and test support.

pub mod arrow;
pub mod io;
pub mod logging;
pub mod test;
