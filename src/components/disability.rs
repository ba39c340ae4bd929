//! The shared `disability_weight` pipeline.
//!
//! Causes contribute their own weight as a union modifier, so the total is
//! `1 - prod(1 - w_i)` and never exceeds one.

use crate::components::Component;
use crate::error::Result;
use crate::pipeline::{Combiner, PipelineValue, Requirements};
use crate::simulation::SimulationBuilder;

/// Name of the combined disability weight pipeline
pub const DISABILITY_WEIGHT: &str = "disability_weight";

/// Register `<cause>.disability_weight` as a contributor to the total weight
pub fn register_disability_weight(builder: &mut SimulationBuilder<'_>, cause_pipeline: &str) {
    let source = cause_pipeline.to_string();
    builder.values().register_modifier(
        DISABILITY_WEIGHT,
        move |ctx, index, _| ctx.value(&source, index),
        Combiner::ListUnion,
        Requirements::new().values(&[cause_pipeline]),
    );
}

/// Produces the total disability weight of every simulant
#[derive(Debug, Default)]
pub struct Disability;

impl Disability {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Component for Disability {
    fn name(&self) -> &str {
        "disability"
    }

    fn setup(&mut self, builder: &mut SimulationBuilder<'_>) -> Result<()> {
        builder.values().register_producer(
            DISABILITY_WEIGHT,
            |_, _| Ok(PipelineValue::List(Vec::new())),
            Combiner::ListUnion,
            Requirements::new(),
        )?;
        Ok(())
    }
}
