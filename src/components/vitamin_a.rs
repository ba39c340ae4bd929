//! Vitamin A deficiency, a disease fully attributed to a categorical risk.
//!
//! The with-condition state is the `cat1` exposure. A simulant's propensity
//! is drawn once; the exposure proportion it is compared against is
//! re-evaluated every step, so simulants can move in both directions.

use std::sync::Arc;

use arrow::datatypes::DataType;

use crate::algorithm::exposure::{ExposureCategory, attenuate, sample_categories};
use crate::algorithm::health::{DiseaseModel, DiseaseStatus};
use crate::components::disability::register_disability_weight;
use crate::components::{Component, stream};
use crate::data::{VALUE_COLUMN, keys, loader};
use crate::error::{Error, Result};
use crate::pipeline::{Combiner, EvalContext, PipelineValue, Requirements};
use crate::population::{ALIVE, ColumnSpec, PopulationUpdate, RandomnessStream, columns};
use crate::simulation::{Event, SimulantData, SimulationBuilder};
use crate::utils::arrow::float_values;

pub const VITAMIN_A_DEFICIENCY: &str = "vitamin_a_deficiency";

pub const EXPOSURE_PARAMETERS: &str = "vitamin_a_deficiency.exposure_parameters";
/// Joint attenuation of the exposed proportion; interventions add union modifiers
pub const EXPOSURE_PAF: &str = "vitamin_a_deficiency.exposure_parameters.paf";
pub const EXPOSURE: &str = "vitamin_a_deficiency.exposure";
pub const DISABILITY_WEIGHT: &str = "vitamin_a_deficiency.disability_weight";

pub const INITIAL_STATES_STREAM: &str = "vitamin_a_deficiency_initial_states";
pub const PROPENSITY_COLUMN: &str = "vitamin_a_deficiency_propensity";

/// Vitamin A deficiency risk and disease model
#[derive(Debug)]
pub struct VitaminADeficiency {
    model: DiseaseModel,
    randomness: Option<RandomnessStream>,
}

impl Default for VitaminADeficiency {
    fn default() -> Self {
        Self {
            model: DiseaseModel::new(VITAMIN_A_DEFICIENCY),
            randomness: None,
        }
    }
}

fn statuses(categories: &[String]) -> Result<Vec<DiseaseStatus>> {
    categories
        .iter()
        .map(|label| {
            ExposureCategory::from_label(label)
                .map(DiseaseStatus::from_exposure)
                .ok_or_else(|| Error::validation(format!("unknown exposure category '{label}'")))
        })
        .collect()
}

impl VitaminADeficiency {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn model(&self) -> &DiseaseModel {
        &self.model
    }

    fn created_columns(&self) -> Vec<ColumnSpec> {
        let mut created = vec![ColumnSpec::new(self.model.cause(), DataType::Utf8)];
        for status in DiseaseStatus::ALL {
            created.push(ColumnSpec::new(self.model.event_time_column(status), DataType::Date32));
            created.push(ColumnSpec::new(self.model.event_count_column(status), DataType::Int64));
        }
        created.push(ColumnSpec::new(PROPENSITY_COLUMN, DataType::Float64));
        created
    }

    fn state_labels(&self, statuses: &[DiseaseStatus]) -> Vec<&str> {
        statuses.iter().map(|&s| self.model.state_name(s)).collect()
    }
}

impl Component for VitaminADeficiency {
    fn name(&self) -> &str {
        VITAMIN_A_DEFICIENCY
    }

    fn setup(&mut self, builder: &mut SimulationBuilder<'_>) -> Result<()> {
        self.randomness = Some(builder.randomness_stream(INITIAL_STATES_STREAM)?);

        let data = builder.data();
        let base_exposure = Arc::new(
            builder.lookup_table(EXPOSURE_PARAMETERS, &loader::vitamin_a_exposure(data)?)?,
        );
        let base_weight = Arc::new(
            builder.lookup_table(DISABILITY_WEIGHT, &data.load(keys::vitamin_a::DISABILITY_WEIGHT)?)?,
        );
        let demographics = [columns::AGE, columns::SEX];
        let cause = self.model.cause().to_string();

        let values = builder.values();
        values.register_producer(
            EXPOSURE_PAF,
            |_, _| Ok(PipelineValue::List(Vec::new())),
            Combiner::ListUnion,
            Requirements::new(),
        )?;
        values.register_producer(
            EXPOSURE_PARAMETERS,
            move |ctx, index| {
                let rows = ctx.lookup(&base_exposure, index)?;
                let base = float_values(&rows, ExposureCategory::Cat1.as_str())?;
                let paf = ctx.value(EXPOSURE_PAF, index)?.into_float()?;
                Ok(PipelineValue::Float(attenuate(&base, &paf)?))
            },
            Combiner::Replace,
            Requirements::new().columns(&demographics).values(&[EXPOSURE_PAF]),
        )?;
        values.register_producer(
            EXPOSURE,
            |ctx, index| {
                let propensity = ctx.population.float_values(PROPENSITY_COLUMN, index)?;
                let proportion = ctx.value(EXPOSURE_PARAMETERS, index)?.into_float()?;
                let categories = sample_categories(&propensity, &proportion)?;
                Ok(PipelineValue::Category(
                    categories.iter().map(ToString::to_string).collect(),
                ))
            },
            Combiner::Replace,
            Requirements::new()
                .columns(&[PROPENSITY_COLUMN])
                .values(&[EXPOSURE_PARAMETERS]),
        )?;
        values.register_producer(
            DISABILITY_WEIGHT,
            move |ctx, index| {
                let state = ctx.population.string_values(&cause, index)?;
                let alive = ctx.population.string_values(columns::ALIVE, index)?;
                let base = float_values(&ctx.lookup(&base_weight, index)?, VALUE_COLUMN)?;
                Ok(PipelineValue::Float(
                    base.iter()
                        .zip(state.iter().zip(&alive))
                        .map(|(&w, (s, a))| if a == ALIVE && *s == cause { w } else { 0.0 })
                        .collect(),
                ))
            },
            Combiner::Replace,
            Requirements::new()
                .columns(&[columns::AGE, columns::SEX, columns::ALIVE, VITAMIN_A_DEFICIENCY]),
        )?;
        register_disability_weight(builder, DISABILITY_WEIGHT);

        builder.initializes_simulants(
            VITAMIN_A_DEFICIENCY,
            self.created_columns(),
            Requirements::new()
                .columns(&demographics)
                .streams(&[INITIAL_STATES_STREAM]),
        );
        Ok(())
    }

    fn on_initialize_simulants(
        &mut self,
        ctx: &EvalContext<'_>,
        pop_data: &SimulantData,
    ) -> Result<Option<PopulationUpdate>> {
        let index = &pop_data.index;
        let propensity = stream(self.randomness.as_ref(), VITAMIN_A_DEFICIENCY)?.get_draw(index, None);
        let proportion = ctx.value(EXPOSURE_PARAMETERS, index)?.into_float()?;
        let status = sample_categories(&propensity, &proportion)?
            .into_iter()
            .map(DiseaseStatus::from_exposure)
            .collect::<Vec<_>>();

        let mut update = PopulationUpdate::new(index.clone())
            .with_strings(self.model.cause(), &self.state_labels(&status));
        for status in DiseaseStatus::ALL {
            update = update
                .with_dates(self.model.event_time_column(status), &vec![None; index.len()])
                .with_ints(self.model.event_count_column(status), vec![0; index.len()]);
        }
        Ok(Some(update.with_floats(PROPENSITY_COLUMN, propensity)))
    }

    fn on_time_step(
        &mut self,
        ctx: &EvalContext<'_>,
        event: &Event,
    ) -> Result<Option<PopulationUpdate>> {
        let alive = ctx.population.alive_index(&event.index)?;
        let current = statuses(&ctx.value(EXPOSURE, &alive)?.into_category()?)?;
        let previous = ctx
            .population
            .string_values(self.model.cause(), &alive)?
            .iter()
            .map(|label| self.model.status_of(label))
            .collect::<Result<Vec<_>>>()?;

        let mut update = PopulationUpdate::new(alive.clone())
            .with_strings(self.model.cause(), &self.state_labels(&current));
        let mut transitions = 0usize;
        for entered in DiseaseStatus::ALL {
            let time_column = self.model.event_time_column(entered);
            let count_column = self.model.event_count_column(entered);
            let mut times = ctx.population.date_values(&time_column, &alive)?;
            let mut counts = ctx.population.int_values(&count_column, &alive)?;
            for (position, (&old, &new)) in previous.iter().zip(&current).enumerate() {
                if old != entered && new == entered {
                    times[position] = Some(event.time);
                    counts[position] += 1;
                    transitions += 1;
                }
            }
            update = update
                .with_dates(time_column, &times)
                .with_ints(count_column, counts);
        }
        log::debug!("{transitions} vitamin A deficiency transitions at {}", event.time);
        Ok(Some(update))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{BasePopulation, Disability};
    use crate::config::SimulationConfig;
    use crate::pipeline::joint_union;
    use crate::simulation::Simulation;
    use crate::utils::test::{ModelInputs, model_registry};
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Debug)]
    struct ConstantPaf(f64);

    impl Component for ConstantPaf {
        fn name(&self) -> &str {
            "constant_paf"
        }

        fn setup(&mut self, builder: &mut SimulationBuilder<'_>) -> Result<()> {
            let paf = self.0;
            builder.values().register_modifier(
                EXPOSURE_PAF,
                move |_, index, _| Ok(PipelineValue::Float(vec![paf; index.len()])),
                Combiner::ListUnion,
                Requirements::new(),
            );
            Ok(())
        }
    }

    fn simulation(extra: Vec<Box<dyn Component>>) -> Simulation {
        let config = SimulationConfig {
            population_size: 400,
            ..Default::default()
        };
        let data = model_registry(&ModelInputs::default()).unwrap();
        let mut components: Vec<Box<dyn Component>> = vec![
            Box::new(BasePopulation::new()),
            Box::new(Disability::new()),
            Box::new(VitaminADeficiency::new()),
        ];
        components.extend(extra);
        let mut simulation = Simulation::setup(config, &data, components, Vec::new()).unwrap();
        simulation.initialize_simulants().unwrap();
        simulation
    }

    #[test]
    fn test_attenuation_combines_pafs() {
        let simulation = simulation(vec![Box::new(ConstantPaf(0.5)), Box::new(ConstantPaf(0.5))]);
        let index = simulation.population().full_index();
        let proportion = simulation
            .value(EXPOSURE_PARAMETERS, &index)
            .unwrap()
            .into_float()
            .unwrap();
        let expected = 0.3 * (1.0 - joint_union(&[0.5, 0.5]));
        assert!(proportion.iter().all(|p| (p - expected).abs() < 1e-12));
    }

    #[test]
    fn test_initial_state_matches_exposure() {
        let simulation = simulation(Vec::new());
        let index = simulation.population().full_index();
        let exposure = simulation.value(EXPOSURE, &index).unwrap().into_category().unwrap();
        let state = simulation
            .population()
            .string_values(VITAMIN_A_DEFICIENCY, &index)
            .unwrap();
        for (category, label) in exposure.iter().zip(&state) {
            let with_condition = label == VITAMIN_A_DEFICIENCY;
            assert_eq!(with_condition, category == "cat1");
        }
        let weight = simulation
            .value(DISABILITY_WEIGHT, &index)
            .unwrap()
            .into_float()
            .unwrap();
        for (w, label) in weight.iter().zip(&state) {
            let expected = if label == VITAMIN_A_DEFICIENCY { 0.1 } else { 0.0 };
            assert_eq!(*w, expected);
        }
    }

    #[test]
    fn test_constant_exposure_has_no_transitions() {
        let mut simulation = simulation(Vec::new());
        let index = simulation.population().full_index();
        let before = simulation
            .population()
            .string_values(VITAMIN_A_DEFICIENCY, &index)
            .unwrap();
        simulation.step().unwrap();
        let after = simulation
            .population()
            .string_values(VITAMIN_A_DEFICIENCY, &index)
            .unwrap();
        assert_eq!(before, after);
        let model = DiseaseModel::new(VITAMIN_A_DEFICIENCY);
        for status in DiseaseStatus::ALL {
            let counts = simulation
                .population()
                .int_values(&model.event_count_column(status), &index)
                .unwrap();
            assert!(counts.iter().all(|&c| c == 0));
        }
    }

    #[derive(Debug)]
    struct SwitchablePaf(Arc<AtomicBool>);

    impl Component for SwitchablePaf {
        fn name(&self) -> &str {
            "switchable_paf"
        }

        fn setup(&mut self, builder: &mut SimulationBuilder<'_>) -> Result<()> {
            let enabled = Arc::clone(&self.0);
            builder.values().register_modifier(
                EXPOSURE_PAF,
                move |_, index, _| {
                    let paf = if enabled.load(Ordering::Relaxed) { 1.0 } else { 0.0 };
                    Ok(PipelineValue::Float(vec![paf; index.len()]))
                },
                Combiner::ListUnion,
                Requirements::new(),
            );
            Ok(())
        }
    }

    #[test]
    fn test_remission_is_recorded() {
        let enabled = Arc::new(AtomicBool::new(false));
        let mut simulation = simulation(vec![Box::new(SwitchablePaf(Arc::clone(&enabled)))]);
        let index = simulation.population().full_index();
        let exposed: Vec<bool> = simulation
            .population()
            .string_values(VITAMIN_A_DEFICIENCY, &index)
            .unwrap()
            .iter()
            .map(|s| s == VITAMIN_A_DEFICIENCY)
            .collect();
        assert!(exposed.iter().any(|&e| e));

        enabled.store(true, Ordering::Relaxed);
        let end_of_step = simulation.clock().next_time();
        simulation.step().unwrap();

        let model = DiseaseModel::new(VITAMIN_A_DEFICIENCY);
        let population = simulation.population();
        let state = population.string_values(VITAMIN_A_DEFICIENCY, &index).unwrap();
        assert!(state.iter().all(|s| s == model.state_name(DiseaseStatus::Susceptible)));

        let counts = population
            .int_values(&model.event_count_column(DiseaseStatus::Susceptible), &index)
            .unwrap();
        let times = population
            .date_values(&model.event_time_column(DiseaseStatus::Susceptible), &index)
            .unwrap();
        for ((&was_exposed, count), time) in exposed.iter().zip(&counts).zip(&times) {
            if was_exposed {
                assert_eq!(*count, 1);
                assert_eq!(*time, Some(end_of_step));
            } else {
                assert_eq!(*count, 0);
                assert_eq!(*time, None);
            }
        }
        let incident = population
            .int_values(&model.event_count_column(DiseaseStatus::WithCondition), &index)
            .unwrap();
        assert!(incident.iter().all(|&c| c == 0));
    }
}
