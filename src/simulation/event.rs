//! Data handed to component and observer handlers.

use chrono::{Duration, NaiveDate};

use crate::population::to_years;

/// A time step as seen by its listeners
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Simulants the step applies to
    pub index: Vec<usize>,
    /// Clock time at the end of the step
    pub time: NaiveDate,
    pub step_size: Duration,
}

impl Event {
    #[must_use]
    pub fn step_size_years(&self) -> f64 {
        to_years(self.step_size)
    }
}

/// Simulants created in one initialization pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulantData {
    pub index: Vec<usize>,
    pub creation_time: NaiveDate,
    /// Length of the window the simulants were created in
    pub creation_window: Duration,
}
