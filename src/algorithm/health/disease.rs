//! Two-state disease models.
//!
//! A disease model names its states after the cause: the with-condition
//! state is `<cause>` and the susceptible state is `susceptible_to_<cause>`.

use std::fmt;

use crate::algorithm::exposure::ExposureCategory;
use crate::error::{Error, Result};

/// Status of a simulant in a two-state disease model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiseaseStatus {
    Susceptible,
    WithCondition,
}

impl DiseaseStatus {
    pub const ALL: [Self; 2] = [Self::Susceptible, Self::WithCondition];

    /// A risk-attributed disease is present exactly when the risk is exposed
    #[must_use]
    pub const fn from_exposure(category: ExposureCategory) -> Self {
        match category {
            ExposureCategory::Cat1 => Self::WithCondition,
            ExposureCategory::Cat2 => Self::Susceptible,
        }
    }

    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Susceptible => Self::WithCondition,
            Self::WithCondition => Self::Susceptible,
        }
    }
}

/// State names and transitions of one cause
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiseaseModel {
    cause: String,
    susceptible: String,
}

impl DiseaseModel {
    #[must_use]
    pub fn new(cause: impl Into<String>) -> Self {
        let cause = cause.into();
        let susceptible = format!("susceptible_to_{cause}");
        Self { cause, susceptible }
    }

    #[must_use]
    pub fn cause(&self) -> &str {
        &self.cause
    }

    /// State label written to the population table
    #[must_use]
    pub fn state_name(&self, status: DiseaseStatus) -> &str {
        match status {
            DiseaseStatus::Susceptible => &self.susceptible,
            DiseaseStatus::WithCondition => &self.cause,
        }
    }

    #[must_use]
    pub fn state_names(&self) -> [&str; 2] {
        DiseaseStatus::ALL.map(|status| self.state_name(status))
    }

    /// Parse a state label of this model
    pub fn status_of(&self, label: &str) -> Result<DiseaseStatus> {
        if label == self.cause {
            Ok(DiseaseStatus::WithCondition)
        } else if label == self.susceptible {
            Ok(DiseaseStatus::Susceptible)
        } else {
            Err(Error::validation(format!(
                "'{label}' is not a state of the {} model",
                self.cause
            )))
        }
    }

    /// `<from>_to_<to>` label of a transition between two states
    #[must_use]
    pub fn transition_label(&self, from: DiseaseStatus, to: DiseaseStatus) -> String {
        format!("{}_to_{}", self.state_name(from), self.state_name(to))
    }

    /// Both transitions the model can make
    #[must_use]
    pub fn transitions(&self) -> [(DiseaseStatus, DiseaseStatus); 2] {
        DiseaseStatus::ALL.map(|from| (from, from.other()))
    }

    /// Column holding the time a simulant last entered `status`
    #[must_use]
    pub fn event_time_column(&self, status: DiseaseStatus) -> String {
        format!("{}_event_time", self.state_name(status))
    }

    /// Column counting how often a simulant entered `status`
    #[must_use]
    pub fn event_count_column(&self, status: DiseaseStatus) -> String {
        format!("{}_event_count", self.state_name(status))
    }
}

impl fmt::Display for DiseaseModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cause)
    }
}
