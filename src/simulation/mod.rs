//! The simulation engine.
//!
//! A run is set up once, initializes its simulants at time step 0 and then
//! advances in fixed steps. Each step runs three phases over the whole
//! population:
//!
//! 1. prepare: observers snapshot the state before anything changes
//! 2. time step: components compute and the engine applies their updates
//! 3. collect: observers record what changed and refresh shadow columns
//!
//! The engine is the only writer of the population table.

pub mod builder;
pub mod event;

use std::time::Instant;

use crate::components::iron_deficiency::IRON_DEFICIENCY;
use crate::components::vitamin_a::VITAMIN_A_DEFICIENCY;
use crate::components::{
    BasePopulation, BirthPrevalenceDisease, Component, Disability, IronDeficiency,
    VitaminADeficiency,
};
use crate::config::SimulationConfig;
use crate::data::DataRegistry;
use crate::data::keys::NEURAL_TUBE_DEFECTS;
use crate::error::{Error, Result};
use crate::observers::{AnemiaObserver, Counter, DisabilityObserver, DiseaseObserver, Observer};
use crate::pipeline::{EvalContext, PipelineValue, ValuePipelineGraph};
use crate::population::{PopulationTable, PopulationUpdate, SimulationClock};
use crate::utils::logging::{create_main_progress_bar, finish_progress_bar};

pub use builder::{SetupOutput, SimulationBuilder};
pub use event::{Event, SimulantData};

/// A configured, runnable simulation
#[derive(Debug)]
pub struct Simulation {
    config: SimulationConfig,
    clock: SimulationClock,
    population: PopulationTable,
    values: ValuePipelineGraph,
    components: Vec<Box<dyn Component>>,
    observers: Vec<Box<dyn Observer>>,
    initialized: bool,
}

impl Simulation {
    /// Set up `components` and `observers`, in that order
    ///
    /// # Errors
    /// Any wiring problem is reported here, before a population exists.
    pub fn setup(
        config: SimulationConfig,
        data: &DataRegistry,
        mut components: Vec<Box<dyn Component>>,
        mut observers: Vec<Box<dyn Observer>>,
    ) -> Result<Self> {
        config.validate()?;
        let start = Instant::now();

        let mut builder = SimulationBuilder::new(&config, data);
        for component in &mut components {
            log::debug!("Setting up component '{}'", component.name());
            component.setup(&mut builder)?;
        }
        for observer in &mut observers {
            log::debug!("Setting up observer '{}'", observer.name());
            observer.setup(&mut builder)?;
        }
        let SetupOutput { values, columns, .. } = builder.finish()?;

        let mut population = PopulationTable::new(config.population_size)?;
        population.add_columns(&columns)?;
        let clock = SimulationClock::new(config.start_date, config.end_date, config.step_size_days);

        log::info!(
            "Simulation set up with {} components and {} observers in {:?}",
            components.len(),
            observers.len(),
            start.elapsed()
        );
        Ok(Self {
            config,
            clock,
            population,
            values,
            components,
            observers,
            initialized: false,
        })
    }

    /// The standard model: demographics, iron deficiency, vitamin A
    /// deficiency and neural tube defects, with their observers
    pub fn standard(config: SimulationConfig, data: &DataRegistry) -> Result<Self> {
        let stratification = config.stratification.clone();
        let metrics = config.metrics;
        let components: Vec<Box<dyn Component>> = vec![
            Box::new(BasePopulation::new()),
            Box::new(Disability::new()),
            Box::new(IronDeficiency::new()),
            Box::new(VitaminADeficiency::new()),
            Box::new(BirthPrevalenceDisease::new(NEURAL_TUBE_DEFECTS)),
        ];
        let observers: Vec<Box<dyn Observer>> = vec![
            Box::new(AnemiaObserver::new(metrics)),
            Box::new(DiseaseObserver::new(VITAMIN_A_DEFICIENCY, metrics, &stratification)),
            Box::new(DisabilityObserver::new(
                metrics,
                &[IRON_DEFICIENCY, VITAMIN_A_DEFICIENCY],
            )),
        ];
        Self::setup(config, data, components, observers)
    }

    #[must_use]
    pub const fn config(&self) -> &SimulationConfig {
        &self.config
    }

    #[must_use]
    pub const fn clock(&self) -> &SimulationClock {
        &self.clock
    }

    #[must_use]
    pub const fn population(&self) -> &PopulationTable {
        &self.population
    }

    #[must_use]
    pub const fn values(&self) -> &ValuePipelineGraph {
        &self.values
    }

    /// Evaluate pipeline `name` against the current state
    pub fn value(&self, name: &str, index: &[usize]) -> Result<PipelineValue> {
        let ctx = EvalContext::new(&self.population, &self.values, &self.clock);
        ctx.value(name, index)
    }

    /// Create the initial population (time step 0)
    ///
    /// Initializers run in setup order and each sees the columns written by
    /// the ones before it.
    pub fn initialize_simulants(&mut self) -> Result<()> {
        if self.initialized {
            return Err(Error::validation("simulants are already initialized"));
        }
        let start = Instant::now();
        let pop_data = SimulantData {
            index: self.population.full_index(),
            creation_time: self.clock.time(),
            creation_window: self.clock.step_size(),
        };

        for component in &mut self.components {
            let ctx = EvalContext::new(&self.population, &self.values, &self.clock);
            let update = component.on_initialize_simulants(&ctx, &pop_data)?;
            apply(&mut self.population, update)?;
        }
        for observer in &mut self.observers {
            let ctx = EvalContext::new(&self.population, &self.values, &self.clock);
            let update = observer.on_initialize_simulants(&ctx, &pop_data)?;
            apply(&mut self.population, update)?;
        }

        self.initialized = true;
        log::info!(
            "Initialized {} simulants in {:?}",
            self.population.size(),
            start.elapsed()
        );
        Ok(())
    }

    /// Advance the simulation by one time step
    pub fn step(&mut self) -> Result<()> {
        if !self.initialized {
            return Err(Error::validation("initialize simulants before stepping"));
        }
        let event = Event {
            index: self.population.full_index(),
            time: self.clock.next_time(),
            step_size: self.clock.step_size(),
        };
        log::debug!("Time step {} -> {}", self.clock.time(), event.time);

        {
            let ctx = EvalContext::new(&self.population, &self.values, &self.clock);
            for observer in &mut self.observers {
                observer.on_time_step_prepare(&ctx, &event)?;
            }
        }

        for component in &mut self.components {
            let ctx = EvalContext::new(&self.population, &self.values, &self.clock);
            let update = component.on_time_step(&ctx, &event)?;
            apply(&mut self.population, update)?;
        }

        let mut updates = Vec::with_capacity(self.observers.len());
        {
            let ctx = EvalContext::new(&self.population, &self.values, &self.clock);
            for observer in &mut self.observers {
                updates.push(observer.on_collect_metrics(&ctx, &event)?);
            }
        }
        for update in updates {
            apply(&mut self.population, update)?;
        }

        self.clock.advance();
        Ok(())
    }

    /// Initialize if needed and step until the end date
    pub fn run(&mut self) -> Result<()> {
        if !self.initialized {
            self.initialize_simulants()?;
        }
        let start = Instant::now();
        let steps = self.clock.remaining_steps();
        let progress = create_main_progress_bar(steps, Some("Simulating"));
        while !self.clock.is_finished() {
            self.step()?;
            progress.inc(1);
        }
        finish_progress_bar(&progress, "Simulation complete");
        log::info!("Ran {steps} time steps in {:?}", start.elapsed());
        Ok(())
    }

    /// Counters of every observer merged into one
    #[must_use]
    pub fn metrics(&self) -> Counter {
        let mut metrics = Counter::new();
        for observer in &self.observers {
            metrics.merge(observer.counter());
        }
        metrics
    }
}

fn apply(population: &mut PopulationTable, update: Option<PopulationUpdate>) -> Result<()> {
    match update {
        Some(update) if !update.is_empty() => population.update(update),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test::{ModelInputs, model_registry};
    use chrono::NaiveDate;

    fn config() -> SimulationConfig {
        SimulationConfig {
            population_size: 200,
            start_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2020, 1, 29).unwrap(),
            step_size_days: 7,
            ..Default::default()
        }
    }

    #[test]
    fn test_standard_model_runs() {
        let data = model_registry(&ModelInputs::default()).unwrap();
        let mut simulation = Simulation::standard(config(), &data).unwrap();
        assert!(simulation.step().is_err());
        simulation.run().unwrap();
        assert!(simulation.clock().is_finished());
        assert!(simulation.initialize_simulants().is_err());

        let metrics = simulation.metrics();
        assert!(!metrics.is_empty());
        assert!(metrics.values().all(|v| v >= 0.0));
    }

    #[test]
    fn test_missing_input_fails_setup() {
        let full = model_registry(&ModelInputs::default()).unwrap();
        let mut data = DataRegistry::new();
        for key in full.keys() {
            if key != crate::data::keys::vitamin_a::EXPOSURE {
                data.insert(key, full.load(key).unwrap());
            }
        }
        let err = Simulation::standard(config(), &data).unwrap_err();
        assert!(matches!(err, Error::DataNotFound { .. }));
    }

    #[test]
    fn test_same_seed_same_population() {
        let data = model_registry(&ModelInputs::default()).unwrap();
        let mut first = Simulation::standard(config(), &data).unwrap();
        let mut second = Simulation::standard(config(), &data).unwrap();
        first.initialize_simulants().unwrap();
        second.initialize_simulants().unwrap();
        assert_eq!(
            first.population().as_record_batch(),
            second.population().as_record_batch()
        );
    }
}
