//! Statistical algorithms behind the simulation components.
//!
//! Exposure distributions turn propensities into exposures; health
//! classification turns exposures into discrete states.

pub mod exposure;
pub mod health;
