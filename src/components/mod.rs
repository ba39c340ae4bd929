//! Simulation components.
//!
//! Components own the population columns they create and the pipelines they
//! produce. Handlers never write to the table themselves: they return a
//! [`PopulationUpdate`] that the engine applies.

pub mod base_population;
pub mod birth_prevalence;
pub mod disability;
pub mod iron_deficiency;
pub mod vitamin_a;

use std::fmt::Debug;

use crate::error::{Error, Result};
use crate::pipeline::EvalContext;
use crate::population::{PopulationUpdate, RandomnessStream};
use crate::simulation::{Event, SimulantData, SimulationBuilder};

pub use base_population::BasePopulation;
pub use birth_prevalence::BirthPrevalenceDisease;
pub use disability::Disability;
pub use iron_deficiency::IronDeficiency;
pub use vitamin_a::VitaminADeficiency;

/// A participant in the simulation that owns state and pipelines
pub trait Component: Debug + Send {
    /// Unique component name
    fn name(&self) -> &str;

    /// Register pipelines, streams and created columns
    ///
    /// Called exactly once, before the population exists.
    fn setup(&mut self, builder: &mut SimulationBuilder<'_>) -> Result<()>;

    /// Populate the columns this component created for new simulants
    ///
    /// # Arguments
    /// * `ctx` - Table, pipelines and clock; earlier initializers have already run
    /// * `pop_data` - The simulants being created
    ///
    /// # Returns
    /// * `Result<Option<PopulationUpdate>>` - Values for the created columns, if any
    fn on_initialize_simulants(
        &mut self,
        _ctx: &EvalContext<'_>,
        _pop_data: &SimulantData,
    ) -> Result<Option<PopulationUpdate>> {
        Ok(None)
    }

    /// React to a time step
    ///
    /// # Returns
    /// * `Result<Option<PopulationUpdate>>` - State changes for this step, if any
    fn on_time_step(
        &mut self,
        _ctx: &EvalContext<'_>,
        _event: &Event,
    ) -> Result<Option<PopulationUpdate>> {
        Ok(None)
    }
}

/// The stream a component took during setup
pub(crate) fn stream<'s>(
    stream: Option<&'s RandomnessStream>,
    component: &str,
) -> Result<&'s RandomnessStream> {
    stream.ok_or_else(|| {
        Error::configuration(format!("component '{component}' used before setup"))
    })
}
