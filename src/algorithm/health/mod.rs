//! Health state classification.

pub mod disease;
pub mod severity;

pub use disease::{DiseaseModel, DiseaseStatus};
pub use severity::{AnemiaSeverity, NEONATAL_AGE_LIMIT, SeverityCutoffs, classify_all};
