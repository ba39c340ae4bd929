//! State person time and transition counts of a two-state disease.

use arrow::datatypes::DataType;
use chrono::Datelike;

use crate::algorithm::health::DiseaseModel;
use crate::config::{MetricsConfig, StratificationConfig};
use crate::error::Result;
use crate::observers::{Counter, Observer, Stratifier, observe_person_time};
use crate::pipeline::{EvalContext, Requirements};
use crate::population::{ColumnSpec, PopulationUpdate};
use crate::simulation::{Event, SimulantData, SimulationBuilder};

/// Observes the state column named after `disease`
///
/// Keeps a `previous_<disease>` shadow column holding the state at the end
/// of the previous step.
#[derive(Debug)]
pub struct DiseaseObserver {
    name: String,
    model: DiseaseModel,
    previous_column: String,
    stratifier: Stratifier,
    counts: Counter,
}

impl DiseaseObserver {
    pub fn new(
        disease: impl Into<String>,
        metrics: MetricsConfig,
        stratification: &StratificationConfig,
    ) -> Self {
        let model = DiseaseModel::new(disease);
        Self {
            name: format!("disease_observer.{}", model.cause()),
            previous_column: format!("previous_{}", model.cause()),
            stratifier: Stratifier::with_exposures(metrics, stratification),
            model,
            counts: Counter::new(),
        }
    }

    #[must_use]
    pub fn previous_column(&self) -> &str {
        &self.previous_column
    }
}

impl Observer for DiseaseObserver {
    fn name(&self) -> &str {
        &self.name
    }

    fn setup(&mut self, builder: &mut SimulationBuilder<'_>) -> Result<()> {
        self.stratifier.setup(&self.name, builder);
        builder.initializes_simulants(
            &self.name,
            vec![ColumnSpec::new(&self.previous_column, DataType::Utf8)],
            Requirements::new().columns(&[self.model.cause()]),
        );
        Ok(())
    }

    fn on_initialize_simulants(
        &mut self,
        ctx: &EvalContext<'_>,
        pop_data: &SimulantData,
    ) -> Result<Option<PopulationUpdate>> {
        let current = ctx.population.string_values(self.model.cause(), &pop_data.index)?;
        Ok(Some(
            PopulationUpdate::new(pop_data.index.clone())
                .with_strings(&self.previous_column, &current),
        ))
    }

    fn on_time_step_prepare(&mut self, ctx: &EvalContext<'_>, event: &Event) -> Result<()> {
        let alive = ctx.population.alive_index(&event.index)?;
        let states = ctx.population.string_values(self.model.cause(), &alive)?;
        let partition = self.stratifier.partition(ctx, &alive)?;
        observe_person_time(
            &mut self.counts,
            &partition,
            self.stratifier.year(ctx),
            &states,
            &self.model.state_names(),
            |state| format!("{state}_person_time"),
            event.step_size_years(),
        )
    }

    fn on_collect_metrics(
        &mut self,
        ctx: &EvalContext<'_>,
        event: &Event,
    ) -> Result<Option<PopulationUpdate>> {
        let previous = ctx.population.string_values(&self.previous_column, &event.index)?;
        let current = ctx.population.string_values(self.model.cause(), &event.index)?;
        let partition = self.stratifier.partition(ctx, &event.index)?;
        // Transitions happened during the step, so they belong to its end.
        let year = self.stratifier.year(ctx).map(|_| event.time.year());

        for (from, to) in self.model.transitions() {
            let (from_state, to_state) = (self.model.state_name(from), self.model.state_name(to));
            let measure = format!("{}_event_count", self.model.transition_label(from, to));
            for (stratum, members) in partition.iter() {
                let count = members
                    .iter()
                    .filter(|&&p| previous[p] == from_state && current[p] == to_state)
                    .count();
                self.counts.observe(&stratum.key(&measure, year), count as f64)?;
            }
        }

        Ok(Some(
            PopulationUpdate::new(event.index.clone()).with_strings(&self.previous_column, &current),
        ))
    }

    fn counter(&self) -> &Counter {
        &self.counts
    }
}
