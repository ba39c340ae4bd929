//! Arrow data handling utilities
//!
//! Helpers for pulling typed values out of Arrow arrays and record batches
//! and for converting between Arrow dates and `chrono` dates.

pub mod array_utils;
pub mod conversion;

pub use array_utils::{
    downcast_array, float_values, get_column, int_values, string_values,
};
pub use conversion::{date32_to_naive_date, naive_date_to_date32};
