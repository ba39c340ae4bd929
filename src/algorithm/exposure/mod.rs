//! Exposure distribution models.
//!
//! Continuous exposures map a frozen propensity through a quantile function;
//! categorical exposures compare the propensity against a proportion.

pub mod categorical;
pub mod hemoglobin;
pub mod special;

pub use categorical::{ExposureCategory, attenuate, sample_categories};
pub use hemoglobin::HemoglobinDistribution;

/// Smallest propensity passed to a quantile function
pub const PROPENSITY_LOWER: f64 = 0.001;
/// Largest propensity passed to a quantile function
pub const PROPENSITY_UPPER: f64 = 0.999;

/// Clip a propensity into the range the quantile functions are evaluated on
#[must_use]
pub fn clip(propensity: f64) -> f64 {
    propensity.clamp(PROPENSITY_LOWER, PROPENSITY_UPPER)
}
