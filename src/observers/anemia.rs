//! Person time in each anemia severity level.

use crate::algorithm::health::AnemiaSeverity;
use crate::components::iron_deficiency::ANEMIA_SEVERITY;
use crate::config::MetricsConfig;
use crate::error::Result;
use crate::observers::{Counter, Observer, Stratifier, observe_person_time};
use crate::pipeline::EvalContext;
use crate::simulation::{Event, SimulationBuilder};

pub const ANEMIA_OBSERVER: &str = "anemia_observer";

#[derive(Debug)]
pub struct AnemiaObserver {
    stratifier: Stratifier,
    person_time: Counter,
}

impl AnemiaObserver {
    #[must_use]
    pub fn new(metrics: MetricsConfig) -> Self {
        Self {
            stratifier: Stratifier::new(metrics),
            person_time: Counter::new(),
        }
    }
}

impl Observer for AnemiaObserver {
    fn name(&self) -> &str {
        ANEMIA_OBSERVER
    }

    fn setup(&mut self, builder: &mut SimulationBuilder<'_>) -> Result<()> {
        self.stratifier.setup(ANEMIA_OBSERVER, builder);
        builder.values().require_value(ANEMIA_OBSERVER, ANEMIA_SEVERITY);
        Ok(())
    }

    // Counted before this step's changes; a step spanning a new year is
    // credited entirely to the current year.
    fn on_time_step_prepare(&mut self, ctx: &EvalContext<'_>, event: &Event) -> Result<()> {
        let alive = ctx.population.alive_index(&event.index)?;
        let severity = ctx.value(ANEMIA_SEVERITY, &alive)?.into_category()?;
        let partition = self.stratifier.partition(ctx, &alive)?;
        let states = AnemiaSeverity::ALL.map(AnemiaSeverity::as_str);
        observe_person_time(
            &mut self.person_time,
            &partition,
            self.stratifier.year(ctx),
            &severity,
            &states,
            |state| format!("anemia_{state}_person_time"),
            event.step_size_years(),
        )
    }

    fn counter(&self) -> &Counter {
        &self.person_time
    }
}
