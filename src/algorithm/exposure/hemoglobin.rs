//! Hemoglobin exposure as a fixed gamma / mirrored Gumbel mixture.

use std::f64::consts::PI;

use rayon::prelude::*;

use crate::algorithm::exposure::clip;
use crate::algorithm::exposure::special::{EULER_GAMMA, gamma_ppf, gumbel_ppf};
use crate::error::{Error, Result};

/// Weight of the gamma component
pub const WEIGHT_GAMMA: f64 = 0.4;
/// Weight of the mirrored Gumbel component
pub const WEIGHT_GUMBEL: f64 = 0.6;
/// Upper cap the Gumbel component is mirrored about (g/L)
pub const EXPOSURE_MAX: f64 = 220.0;

/// Two-component hemoglobin distribution parameterized per stratum by mean and sd
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HemoglobinDistribution {
    weight_gamma: f64,
    weight_gumbel: f64,
    exposure_max: f64,
}

impl Default for HemoglobinDistribution {
    fn default() -> Self {
        Self {
            weight_gamma: WEIGHT_GAMMA,
            weight_gumbel: WEIGHT_GUMBEL,
            exposure_max: EXPOSURE_MAX,
        }
    }
}

impl HemoglobinDistribution {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Exposure at `propensity` for a stratum with the given mean and sd
    ///
    /// The propensity is clipped first, so the result is finite for any input in [0, 1].
    #[must_use]
    pub fn ppf(&self, propensity: f64, mean: f64, sd: f64) -> f64 {
        let propensity = clip(propensity);
        self.weight_gamma * Self::gamma_component(propensity, mean, sd)
            + self.weight_gumbel * self.mirrored_gumbel_component(propensity, mean, sd)
    }

    /// Element-wise [`Self::ppf`]
    pub fn ppf_batch(&self, propensities: &[f64], means: &[f64], sds: &[f64]) -> Result<Vec<f64>> {
        if propensities.len() != means.len() || propensities.len() != sds.len() {
            return Err(Error::validation(format!(
                "ppf inputs differ in length: {} propensities, {} means, {} sds",
                propensities.len(),
                means.len(),
                sds.len()
            )));
        }
        Ok(propensities
            .par_iter()
            .zip(means.par_iter().zip(sds.par_iter()))
            .map(|(&p, (&mean, &sd))| self.ppf(p, mean, sd))
            .collect())
    }

    fn gamma_component(propensity: f64, mean: f64, sd: f64) -> f64 {
        let shape = (mean / sd).powi(2);
        let scale = sd * sd / mean;
        gamma_ppf(propensity, shape, scale)
    }

    fn mirrored_gumbel_component(&self, propensity: f64, mean: f64, sd: f64) -> f64 {
        let scale = sd * 6f64.sqrt() / PI;
        let location = self.exposure_max - mean - EULER_GAMMA * scale;
        self.exposure_max - gumbel_ppf(1.0 - propensity, location, scale)
    }
}
