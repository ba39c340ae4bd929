//! Iron deficiency: hemoglobin exposure, anemia severity and iron responsiveness.
//!
//! Pipelines, in dependency order:
//!
//! * `iron_deficiency.exposure_parameters` - per-simulant `mean`/`sd` rows
//! * `iron_deficiency.raw_exposure` - hemoglobin from the frozen propensity
//! * `iron_deficiency.exposure` - public exposure, open to modifiers
//! * `anemia_severity` - severity of the public exposure
//! * `iron_responsive` - responsiveness from the severity of the raw exposure
//! * `iron_deficiency.disability_weight` - weight of the current severity

use std::sync::Arc;

use arrow::datatypes::DataType;

use crate::algorithm::exposure::HemoglobinDistribution;
use crate::algorithm::health::{AnemiaSeverity, classify_all};
use crate::components::disability::register_disability_weight;
use crate::components::{Component, stream};
use crate::data::loader;
use crate::error::Result;
use crate::lookup::select_by_label;
use crate::pipeline::{Combiner, EvalContext, PipelineValue, Requirements};
use crate::population::{ColumnSpec, PopulationUpdate, RandomnessStream, columns};
use crate::simulation::{SimulantData, SimulationBuilder};
use crate::utils::arrow::float_values;

pub const IRON_DEFICIENCY: &str = "iron_deficiency";

pub const EXPOSURE_PARAMETERS: &str = "iron_deficiency.exposure_parameters";
pub const RAW_EXPOSURE: &str = "iron_deficiency.raw_exposure";
pub const EXPOSURE: &str = "iron_deficiency.exposure";
pub const ANEMIA_SEVERITY: &str = "anemia_severity";
pub const IRON_RESPONSIVE: &str = "iron_responsive";
pub const DISABILITY_WEIGHT: &str = "iron_deficiency.disability_weight";

pub const PROPENSITY_STREAM: &str = "iron_deficiency.propensity";
/// Additional key separating the responsiveness draw from the exposure draw
pub const RESPONSIVENESS_KEY: &str = "iron_responsiveness";
pub const PROPENSITY_COLUMN: &str = "iron_deficiency_propensity";
pub const RESPONSIVENESS_PROPENSITY_COLUMN: &str = "iron_responsiveness_propensity";

/// Hemoglobin exposure and the anemia it implies
#[derive(Debug, Default)]
pub struct IronDeficiency {
    distribution: HemoglobinDistribution,
    randomness: Option<RandomnessStream>,
}

impl IronDeficiency {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Severity of `exposure` for each simulant of `index`
fn severities(ctx: &EvalContext<'_>, index: &[usize], exposure: &[f64]) -> Result<Vec<AnemiaSeverity>> {
    let ages = ctx.population.float_values(columns::AGE, index)?;
    classify_all(exposure, &ages)
}

fn labels(severities: &[AnemiaSeverity]) -> Vec<&'static str> {
    severities.iter().map(|s| s.as_str()).collect()
}

impl Component for IronDeficiency {
    fn name(&self) -> &str {
        IRON_DEFICIENCY
    }

    fn setup(&mut self, builder: &mut SimulationBuilder<'_>) -> Result<()> {
        self.randomness = Some(builder.randomness_stream(PROPENSITY_STREAM)?);

        let data = builder.data();
        let parameters = Arc::new(
            builder.lookup_table(EXPOSURE_PARAMETERS, &loader::iron_exposure_parameters(data)?)?,
        );
        let thresholds = Arc::new(builder.lookup_table(
            "iron_deficiency.responsive_proportion",
            &loader::iron_responsiveness_thresholds(data)?,
        )?);
        let weights = Arc::new(builder.lookup_table(
            "iron_deficiency.severity_disability_weight",
            &loader::iron_disability_weights(data)?,
        )?);
        let distribution = self.distribution;
        let demographics = [columns::AGE, columns::SEX];

        let values = builder.values();
        values.register_producer(
            EXPOSURE_PARAMETERS,
            move |ctx, index| Ok(PipelineValue::Frame(ctx.lookup(&parameters, index)?)),
            Combiner::Replace,
            Requirements::new().columns(&demographics),
        )?;
        values.register_producer(
            RAW_EXPOSURE,
            move |ctx, index| {
                let propensity = ctx.population.float_values(PROPENSITY_COLUMN, index)?;
                let parameters = ctx.value(EXPOSURE_PARAMETERS, index)?.into_frame()?;
                let exposure = distribution.ppf_batch(
                    &propensity,
                    &float_values(&parameters, "mean")?,
                    &float_values(&parameters, "sd")?,
                )?;
                Ok(PipelineValue::Float(exposure))
            },
            Combiner::Replace,
            Requirements::new()
                .columns(&[PROPENSITY_COLUMN])
                .values(&[EXPOSURE_PARAMETERS]),
        )?;
        values.register_producer(
            EXPOSURE,
            |ctx, index| ctx.value(RAW_EXPOSURE, index),
            Combiner::Replace,
            Requirements::new().values(&[RAW_EXPOSURE]),
        )?;
        values.register_producer(
            ANEMIA_SEVERITY,
            |ctx, index| {
                let exposure = ctx.value(EXPOSURE, index)?.into_float()?;
                let severity = severities(ctx, index, &exposure)?;
                Ok(PipelineValue::Category(
                    severity.iter().map(ToString::to_string).collect(),
                ))
            },
            Combiner::Replace,
            Requirements::new().columns(&[columns::AGE]).values(&[EXPOSURE]),
        )?;
        values.register_producer(
            IRON_RESPONSIVE,
            move |ctx, index| {
                let propensity = ctx
                    .population
                    .float_values(RESPONSIVENESS_PROPENSITY_COLUMN, index)?;
                let raw = ctx.value(RAW_EXPOSURE, index)?.into_float()?;
                let severity = severities(ctx, index, &raw)?;
                let threshold = select_by_label(&ctx.lookup(&thresholds, index)?, &labels(&severity))?;
                Ok(PipelineValue::Bool(
                    propensity.iter().zip(threshold).map(|(&p, t)| p < t).collect(),
                ))
            },
            Combiner::Replace,
            Requirements::new()
                .columns(&[columns::AGE, columns::SEX, RESPONSIVENESS_PROPENSITY_COLUMN])
                .values(&[RAW_EXPOSURE]),
        )?;
        values.register_producer(
            DISABILITY_WEIGHT,
            move |ctx, index| {
                let severity = ctx.value(ANEMIA_SEVERITY, index)?.into_category()?;
                let rows = ctx.lookup(&weights, index)?;
                Ok(PipelineValue::Float(select_by_label(&rows, &severity)?))
            },
            Combiner::Replace,
            Requirements::new()
                .columns(&demographics)
                .values(&[ANEMIA_SEVERITY]),
        )?;
        register_disability_weight(builder, DISABILITY_WEIGHT);

        builder.initializes_simulants(
            IRON_DEFICIENCY,
            vec![
                ColumnSpec::new(PROPENSITY_COLUMN, DataType::Float64),
                ColumnSpec::new(RESPONSIVENESS_PROPENSITY_COLUMN, DataType::Float64),
            ],
            Requirements::new()
                .columns(&demographics)
                .streams(&[PROPENSITY_STREAM]),
        );
        Ok(())
    }

    fn on_initialize_simulants(
        &mut self,
        _ctx: &EvalContext<'_>,
        pop_data: &SimulantData,
    ) -> Result<Option<PopulationUpdate>> {
        let randomness = stream(self.randomness.as_ref(), IRON_DEFICIENCY)?;
        let propensity = randomness.get_draw(&pop_data.index, None);
        let responsiveness = randomness.get_draw(&pop_data.index, Some(RESPONSIVENESS_KEY));
        Ok(Some(
            PopulationUpdate::new(pop_data.index.clone())
                .with_floats(PROPENSITY_COLUMN, propensity)
                .with_floats(RESPONSIVENESS_PROPENSITY_COLUMN, responsiveness),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{BasePopulation, Disability};
    use crate::config::SimulationConfig;
    use crate::simulation::Simulation;
    use crate::utils::test::{ModelInputs, model_registry};

    fn simulation(inputs: &ModelInputs) -> Simulation {
        let config = SimulationConfig {
            population_size: 500,
            ..Default::default()
        };
        let data = model_registry(inputs).unwrap();
        let mut simulation = Simulation::setup(
            config,
            &data,
            vec![
                Box::new(BasePopulation::new()),
                Box::new(Disability::new()),
                Box::new(IronDeficiency::new()),
            ],
            Vec::new(),
        )
        .unwrap();
        simulation.initialize_simulants().unwrap();
        simulation
    }

    #[test]
    fn test_exposure_matches_distribution() {
        let simulation = simulation(&ModelInputs::default());
        let index = simulation.population().full_index();
        let exposure = simulation.value(EXPOSURE, &index).unwrap().into_float().unwrap();
        let propensity = simulation
            .population()
            .float_values(PROPENSITY_COLUMN, &index)
            .unwrap();
        let distribution = HemoglobinDistribution::new();
        for (e, p) in exposure.iter().zip(&propensity) {
            assert!((e - distribution.ppf(*p, 120.0, 15.0)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_severity_and_weights_agree() {
        let simulation = simulation(&ModelInputs::default());
        let index = simulation.population().full_index();
        let severity = simulation
            .value(ANEMIA_SEVERITY, &index)
            .unwrap()
            .into_category()
            .unwrap();
        let weight = simulation
            .value(DISABILITY_WEIGHT, &index)
            .unwrap()
            .into_float()
            .unwrap();
        let expected = |label: &str| match AnemiaSeverity::parse(label).unwrap() {
            AnemiaSeverity::None => 0.0,
            AnemiaSeverity::Mild => 0.004,
            AnemiaSeverity::Moderate => 0.052,
            AnemiaSeverity::Severe => 0.149,
        };
        for (label, w) in severity.iter().zip(&weight) {
            assert_eq!(*w, expected(label));
        }
        let total = simulation
            .value(crate::components::disability::DISABILITY_WEIGHT, &index)
            .unwrap()
            .into_float()
            .unwrap();
        assert_eq!(total, weight);
    }

    #[test]
    fn test_responsiveness_is_idempotent_and_thresholded() {
        let inputs = ModelInputs {
            iron_responsive_proportion: 0.0,
            ..Default::default()
        };
        let simulation = simulation(&inputs);
        let index = simulation.population().full_index();
        let first = simulation.value(IRON_RESPONSIVE, &index).unwrap();
        let second = simulation.value(IRON_RESPONSIVE, &index).unwrap();
        assert_eq!(first, second);

        // Anemic simulants are never responsive at a zero proportion; the
        // `none` level is always responsive.
        let severity = simulation
            .value(ANEMIA_SEVERITY, &index)
            .unwrap()
            .into_category()
            .unwrap();
        for (label, responsive) in severity.iter().zip(first.into_bool().unwrap()) {
            assert_eq!(responsive, label == "none");
        }
    }

    #[test]
    fn test_responsiveness_ignores_exposure_modifiers() {
        let config = SimulationConfig {
            population_size: 300,
            ..Default::default()
        };
        let data = model_registry(&ModelInputs::default()).unwrap();

        #[derive(Debug)]
        struct Fortification;
        impl Component for Fortification {
            fn name(&self) -> &str {
                "fortification"
            }
            fn setup(&mut self, builder: &mut SimulationBuilder<'_>) -> Result<()> {
                builder.values().register_modifier(
                    EXPOSURE,
                    |ctx, index, current| {
                        let responsive = ctx.value(IRON_RESPONSIVE, index)?.into_bool()?;
                        Ok(PipelineValue::Float(
                            current
                                .as_float()?
                                .iter()
                                .zip(responsive)
                                .map(|(e, r)| if r { e + 10.0 } else { *e })
                                .collect(),
                        ))
                    },
                    Combiner::Replace,
                    Requirements::new().values(&[IRON_RESPONSIVE]),
                );
                Ok(())
            }
        }

        let mut simulation = Simulation::setup(
            config,
            &data,
            vec![
                Box::new(BasePopulation::new()),
                Box::new(Disability::new()),
                Box::new(IronDeficiency::new()),
                Box::new(Fortification),
            ],
            Vec::new(),
        )
        .unwrap();
        simulation.initialize_simulants().unwrap();
        let index = simulation.population().full_index();
        let raw = simulation.value(RAW_EXPOSURE, &index).unwrap().into_float().unwrap();
        let shifted = simulation.value(EXPOSURE, &index).unwrap().into_float().unwrap();
        assert!(shifted.iter().zip(&raw).all(|(s, r)| s >= r));
        assert!(shifted.iter().zip(&raw).any(|(s, r)| s > r));
    }
}
