//! Anemia severity classification from hemoglobin exposure.
//!
//! Cutoffs depend on whether the simulant is neonatal (younger than 28 days).
//! For either age class the bands are half-open and disjoint, and every value
//! outside of them classifies as [`AnemiaSeverity::None`].

use std::fmt;

use crate::error::{Error, Result};
use crate::population::DAYS_PER_YEAR;

/// Age (years) below which neonatal cutoffs apply
pub const NEONATAL_AGE_LIMIT: f64 = 28.0 / DAYS_PER_YEAR;

/// Anemia severity levels, ordered from none to severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AnemiaSeverity {
    None,
    Mild,
    Moderate,
    Severe,
}

/// Half-open hemoglobin cutoffs (g/L) for one age class
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeverityCutoffs {
    /// Upper bound of the mild band
    pub mild_upper: f64,
    /// Lower bound of mild, upper bound of moderate
    pub mild_lower: f64,
    /// Lower bound of moderate, upper bound of severe
    pub moderate_lower: f64,
}

impl SeverityCutoffs {
    pub const NEONATAL: Self = Self {
        mild_upper: 150.0,
        mild_lower: 130.0,
        moderate_lower: 90.0,
    };

    pub const NON_NEONATAL: Self = Self {
        mild_upper: 110.0,
        mild_lower: 100.0,
        moderate_lower: 70.0,
    };

    #[must_use]
    pub fn for_age(age: f64) -> Self {
        if age < NEONATAL_AGE_LIMIT {
            Self::NEONATAL
        } else {
            Self::NON_NEONATAL
        }
    }

    #[must_use]
    pub fn classify(&self, exposure: f64) -> AnemiaSeverity {
        if exposure < self.moderate_lower {
            AnemiaSeverity::Severe
        } else if exposure < self.mild_lower {
            AnemiaSeverity::Moderate
        } else if exposure < self.mild_upper {
            AnemiaSeverity::Mild
        } else {
            AnemiaSeverity::None
        }
    }
}

impl AnemiaSeverity {
    /// All levels in ascending order of severity
    pub const ALL: [Self; 4] = [Self::None, Self::Mild, Self::Moderate, Self::Severe];

    /// Label used in pipeline values, lookup columns and output keys
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Mild => "mild",
            Self::Moderate => "moderate",
            Self::Severe => "severe",
        }
    }

    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == label)
    }

    /// Parse a label, failing on anything outside the closed set
    pub fn parse(label: &str) -> Result<Self> {
        Self::from_label(label)
            .ok_or_else(|| Error::validation(format!("unknown anemia severity '{label}'")))
    }

    /// Classify a hemoglobin value for a simulant of the given age (years)
    #[must_use]
    pub fn classify(exposure: f64, age: f64) -> Self {
        SeverityCutoffs::for_age(age).classify(exposure)
    }
}

impl fmt::Display for AnemiaSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Element-wise [`AnemiaSeverity::classify`]
pub fn classify_all(exposures: &[f64], ages: &[f64]) -> Result<Vec<AnemiaSeverity>> {
    if exposures.len() != ages.len() {
        return Err(Error::validation(format!(
            "{} exposures for {} ages",
            exposures.len(),
            ages.len()
        )));
    }
    Ok(exposures
        .iter()
        .zip(ages)
        .map(|(&exposure, &age)| AnemiaSeverity::classify(exposure, age))
        .collect())
}
