//! Observers accumulate stratified measures over the course of a run.
//!
//! An observer reads the population in two phases of every step: before any
//! component mutates state (`prepare`) and after all of them have
//! (`collect`). Each observer owns its [`Counter`]; the engine merges them
//! when metrics are requested.

pub mod anemia;
pub mod counter;
pub mod disability;
pub mod disease;
pub mod stratifier;

use std::fmt::Debug;

use crate::error::Result;
use crate::pipeline::EvalContext;
use crate::population::PopulationUpdate;
use crate::simulation::{Event, SimulantData, SimulationBuilder};

pub use anemia::AnemiaObserver;
pub use counter::Counter;
pub use disability::DisabilityObserver;
pub use disease::DiseaseObserver;
pub use stratifier::{AgeGroup, Partition, Stratifier, Stratum};

/// A read-mostly participant that records measures
pub trait Observer: Debug + Send {
    /// Unique observer name
    fn name(&self) -> &str;

    /// Declare the columns and pipelines this observer reads
    fn setup(&mut self, builder: &mut SimulationBuilder<'_>) -> Result<()>;

    /// Populate shadow columns for new simulants
    fn on_initialize_simulants(
        &mut self,
        _ctx: &EvalContext<'_>,
        _pop_data: &SimulantData,
    ) -> Result<Option<PopulationUpdate>> {
        Ok(None)
    }

    /// Observe the state as it was at the start of the step
    fn on_time_step_prepare(&mut self, _ctx: &EvalContext<'_>, _event: &Event) -> Result<()> {
        Ok(())
    }

    /// Observe the state after the step's changes
    ///
    /// # Returns
    /// * `Result<Option<PopulationUpdate>>` - Refreshed shadow columns, if any
    fn on_collect_metrics(
        &mut self,
        _ctx: &EvalContext<'_>,
        _event: &Event,
    ) -> Result<Option<PopulationUpdate>> {
        Ok(None)
    }

    /// Everything observed so far
    fn counter(&self) -> &Counter;
}

/// Add `count * step_years` of person time per stratum for each of `states`
///
/// `labels` holds the state of each simulant of the partitioned index.
/// States with no simulants in a stratum are recorded as zero.
pub(crate) fn observe_person_time(
    counter: &mut Counter,
    partition: &Partition,
    year: Option<i32>,
    labels: &[String],
    states: &[&str],
    measure: impl Fn(&str) -> String,
    step_years: f64,
) -> Result<()> {
    for (stratum, members) in partition.iter() {
        for state in states {
            let count = members.iter().filter(|&&p| labels[p] == *state).count();
            counter.observe(&stratum.key(&measure(state), year), count as f64 * step_years)?;
        }
    }
    Ok(())
}
