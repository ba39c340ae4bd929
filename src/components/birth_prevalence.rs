//! Conditions present from birth.
//!
//! The state is assigned once at initialization from the attenuated birth
//! prevalence and is never resampled.

use std::sync::Arc;

use arrow::datatypes::DataType;
use rustc_hash::FxHashSet;

use crate::algorithm::exposure::attenuate;
use crate::algorithm::health::{DiseaseModel, DiseaseStatus};
use crate::components::{Component, stream};
use crate::data::{VALUE_COLUMN, loader};
use crate::error::Result;
use crate::pipeline::{Combiner, EvalContext, PipelineValue, Requirements};
use crate::population::{ColumnSpec, PopulationUpdate, RandomnessStream, columns};
use crate::simulation::{SimulantData, SimulationBuilder};
use crate::utils::arrow::float_values;

/// A two-state condition sampled at birth
#[derive(Debug)]
pub struct BirthPrevalenceDisease {
    model: DiseaseModel,
    prevalence_pipeline: String,
    paf_pipeline: String,
    stream_key: String,
    randomness: Option<RandomnessStream>,
}

impl BirthPrevalenceDisease {
    pub fn new(cause: impl Into<String>) -> Self {
        let model = DiseaseModel::new(cause);
        let prevalence_pipeline = format!("{}.birth_prevalence", model.cause());
        Self {
            paf_pipeline: format!("{prevalence_pipeline}.population_attributable_fraction"),
            stream_key: format!("{}_initial_states", model.cause()),
            prevalence_pipeline,
            model,
            randomness: None,
        }
    }

    #[must_use]
    pub const fn model(&self) -> &DiseaseModel {
        &self.model
    }

    /// Attenuated birth prevalence pipeline
    #[must_use]
    pub fn prevalence_pipeline(&self) -> &str {
        &self.prevalence_pipeline
    }

    /// Union pipeline that interventions modify to lower the prevalence
    #[must_use]
    pub fn paf_pipeline(&self) -> &str {
        &self.paf_pipeline
    }
}

impl Component for BirthPrevalenceDisease {
    fn name(&self) -> &str {
        self.model.cause()
    }

    fn setup(&mut self, builder: &mut SimulationBuilder<'_>) -> Result<()> {
        self.randomness = Some(builder.randomness_stream(&self.stream_key)?);
        let data = builder.data();
        let base = Arc::new(builder.lookup_table(
            &self.prevalence_pipeline,
            &loader::birth_prevalence(data, self.model.cause())?,
        )?);
        let paf_pipeline = self.paf_pipeline.clone();

        let values = builder.values();
        values.register_producer(
            &self.paf_pipeline,
            |_, _| Ok(PipelineValue::List(Vec::new())),
            Combiner::ListUnion,
            Requirements::new(),
        )?;
        values.register_producer(
            &self.prevalence_pipeline,
            move |ctx, index| {
                let prevalence = float_values(&ctx.lookup(&base, index)?, VALUE_COLUMN)?;
                let paf = ctx.value(&paf_pipeline, index)?.into_float()?;
                Ok(PipelineValue::Float(attenuate(&prevalence, &paf)?))
            },
            Combiner::Replace,
            Requirements::new()
                .columns(&[columns::AGE, columns::SEX])
                .values(&[self.paf_pipeline.as_str()]),
        )?;

        builder.initializes_simulants(
            self.model.cause(),
            vec![ColumnSpec::new(self.model.cause(), DataType::Utf8)],
            Requirements::new()
                .columns(&[columns::AGE, columns::SEX])
                .values(&[self.prevalence_pipeline.as_str()])
                .streams(&[self.stream_key.as_str()]),
        );
        Ok(())
    }

    fn on_initialize_simulants(
        &mut self,
        ctx: &EvalContext<'_>,
        pop_data: &SimulantData,
    ) -> Result<Option<PopulationUpdate>> {
        let index = &pop_data.index;
        let prevalence = ctx.value(&self.prevalence_pipeline, index)?.into_float()?;
        let born_with: FxHashSet<usize> = stream(self.randomness.as_ref(), self.model.cause())?
            .filter_for_probability(index, &prevalence, None)
            .into_iter()
            .collect();
        let states = index
            .iter()
            .map(|simulant| {
                let status = if born_with.contains(simulant) {
                    DiseaseStatus::WithCondition
                } else {
                    DiseaseStatus::Susceptible
                };
                self.model.state_name(status)
            })
            .collect::<Vec<_>>();
        let cases = states.iter().filter(|s| **s == self.model.cause()).count();
        log::debug!("{cases} simulants born with {}", self.model);
        Ok(Some(
            PopulationUpdate::new(index.clone()).with_strings(self.model.cause(), &states),
        ))
    }
}
