//! Threshold sampling for dichotomous categorical exposures.

use std::fmt;

use crate::error::{Error, Result};

/// Category of a dichotomous risk exposure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExposureCategory {
    /// Exposed
    Cat1,
    /// Unexposed
    Cat2,
}

impl ExposureCategory {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cat1 => "cat1",
            Self::Cat2 => "cat2",
        }
    }

    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "cat1" => Some(Self::Cat1),
            "cat2" => Some(Self::Cat2),
            _ => None,
        }
    }

    #[must_use]
    pub const fn all() -> [Self; 2] {
        [Self::Cat1, Self::Cat2]
    }

    /// Exposed iff the propensity is strictly below the exposed proportion
    #[must_use]
    pub fn sample(propensity: f64, exposed_proportion: f64) -> Self {
        if propensity < exposed_proportion {
            Self::Cat1
        } else {
            Self::Cat2
        }
    }
}

impl fmt::Display for ExposureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Element-wise [`ExposureCategory::sample`]
pub fn sample_categories(
    propensities: &[f64],
    exposed_proportions: &[f64],
) -> Result<Vec<ExposureCategory>> {
    if propensities.len() != exposed_proportions.len() {
        return Err(Error::validation(format!(
            "{} propensities for {} exposure proportions",
            propensities.len(),
            exposed_proportions.len()
        )));
    }
    Ok(propensities
        .iter()
        .zip(exposed_proportions)
        .map(|(&p, &proportion)| ExposureCategory::sample(p, proportion))
        .collect())
}

/// Scale base proportions by the complement of the joint attenuation
pub fn attenuate(base: &[f64], joint_attenuation: &[f64]) -> Result<Vec<f64>> {
    if base.len() != joint_attenuation.len() {
        return Err(Error::validation(format!(
            "{} base values for {} attenuation fractions",
            base.len(),
            joint_attenuation.len()
        )));
    }
    Ok(base
        .iter()
        .zip(joint_attenuation)
        .map(|(&b, &paf)| b * (1.0 - paf))
        .collect())
}
