//! Years lived with disability, by cause and in total.

use crate::components::disability::DISABILITY_WEIGHT;
use crate::config::MetricsConfig;
use crate::error::Result;
use crate::observers::{Counter, Observer, Stratifier};
use crate::pipeline::EvalContext;
use crate::simulation::{Event, SimulationBuilder};

pub const DISABILITY_OBSERVER: &str = "disability_observer";
pub const ALL_CAUSES: &str = "all_causes";

#[derive(Debug)]
struct Measure {
    name: String,
    pipeline: String,
}

/// Accumulates `ylds_due_to_<cause>` from each cause's weight pipeline
#[derive(Debug)]
pub struct DisabilityObserver {
    stratifier: Stratifier,
    measures: Vec<Measure>,
    ylds: Counter,
}

impl DisabilityObserver {
    /// Observe `causes` plus the combined weight of all causes
    #[must_use]
    pub fn new(metrics: MetricsConfig, causes: &[&str]) -> Self {
        let mut measures: Vec<Measure> = causes
            .iter()
            .map(|cause| Measure {
                name: format!("ylds_due_to_{cause}"),
                pipeline: format!("{cause}.disability_weight"),
            })
            .collect();
        measures.push(Measure {
            name: format!("ylds_due_to_{ALL_CAUSES}"),
            pipeline: DISABILITY_WEIGHT.to_string(),
        });
        Self {
            stratifier: Stratifier::new(metrics),
            measures,
            ylds: Counter::new(),
        }
    }
}

impl Observer for DisabilityObserver {
    fn name(&self) -> &str {
        DISABILITY_OBSERVER
    }

    fn setup(&mut self, builder: &mut SimulationBuilder<'_>) -> Result<()> {
        self.stratifier.setup(DISABILITY_OBSERVER, builder);
        for measure in &self.measures {
            builder.values().require_value(DISABILITY_OBSERVER, &measure.pipeline);
        }
        Ok(())
    }

    fn on_time_step_prepare(&mut self, ctx: &EvalContext<'_>, event: &Event) -> Result<()> {
        let alive = ctx.population.alive_index(&event.index)?;
        let partition = self.stratifier.partition(ctx, &alive)?;
        let year = self.stratifier.year(ctx);
        let step_years = event.step_size_years();
        for measure in &self.measures {
            let weights = ctx.value(&measure.pipeline, &alive)?.into_float()?;
            for (stratum, members) in partition.iter() {
                let total: f64 = members.iter().map(|&p| weights[p]).sum();
                self.ylds.observe(&stratum.key(&measure.name, year), total * step_years)?;
            }
        }
        Ok(())
    }

    fn counter(&self) -> &Counter {
        &self.ylds
    }
}
