//! Logging utilities
//!
//! This module provides standardized logging functions for operations.

use std::fmt::Display;

/// Log an operation start with consistent format
///
/// # Arguments
/// * `operation` - Description of the operation
/// * `target` - What is being operated on (a path, a run, a table)
pub fn log_operation_start(operation: &str, target: impl Display) {
    log::info!("{operation} {target}");
}

/// Log an operation completion with consistent format
///
/// # Arguments
/// * `operation` - Description of the operation
/// * `target` - What was operated on
/// * `items` - Number of items processed
/// * `elapsed` - Optional elapsed time
pub fn log_operation_complete(
    operation: &str,
    target: impl Display,
    items: usize,
    elapsed: Option<std::time::Duration>,
) {
    if let Some(duration) = elapsed {
        log::info!("Successfully {operation} {items} items for {target} in {duration:?}");
    } else {
        log::info!("Successfully {operation} {items} items for {target}");
    }
}

/// Log an operation warning with consistent format
///
/// # Arguments
/// * `message` - Warning message
/// * `target` - Optional subject related to the warning
pub fn log_warning(message: &str, target: Option<&dyn Display>) {
    if let Some(target) = target {
        log::warn!("{message}: {target}");
    } else {
        log::warn!("{message}");
    }
}
