//! Demographic columns: age, sex and vital status.

use arrow::datatypes::DataType;

use crate::components::{Component, stream};
use crate::error::Result;
use crate::pipeline::{EvalContext, Requirements};
use crate::population::{ALIVE, ColumnSpec, PopulationUpdate, RandomnessStream, columns};
use crate::simulation::{Event, SimulantData, SimulationBuilder};

pub const AGE_STREAM: &str = "age_initialization";
pub const SEX_STREAM: &str = "sex_initialization";

pub const MALE: &str = "Male";
pub const FEMALE: &str = "Female";

/// Creates the demographic columns and ages living simulants
#[derive(Debug, Default)]
pub struct BasePopulation {
    age_start: f64,
    age_end: f64,
    age_randomness: Option<RandomnessStream>,
    sex_randomness: Option<RandomnessStream>,
}

impl BasePopulation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Component for BasePopulation {
    fn name(&self) -> &str {
        "base_population"
    }

    fn setup(&mut self, builder: &mut SimulationBuilder<'_>) -> Result<()> {
        let config = builder.config();
        self.age_start = config.age_start;
        self.age_end = config.age_end;
        self.age_randomness = Some(builder.randomness_stream(AGE_STREAM)?);
        self.sex_randomness = Some(builder.randomness_stream(SEX_STREAM)?);

        builder.initializes_simulants(
            self.name(),
            vec![
                ColumnSpec::new(columns::AGE, DataType::Float64),
                ColumnSpec::new(columns::SEX, DataType::Utf8),
                ColumnSpec::new(columns::ALIVE, DataType::Utf8),
            ],
            Requirements::new().streams(&[AGE_STREAM, SEX_STREAM]),
        );
        Ok(())
    }

    fn on_initialize_simulants(
        &mut self,
        _ctx: &EvalContext<'_>,
        pop_data: &SimulantData,
    ) -> Result<Option<PopulationUpdate>> {
        let index = &pop_data.index;
        let span = self.age_end - self.age_start;
        let ages = stream(self.age_randomness.as_ref(), self.name())?
            .get_draw(index, None)
            .into_iter()
            .map(|draw| self.age_start + draw * span)
            .collect();
        let sexes = stream(self.sex_randomness.as_ref(), self.name())?
            .get_draw(index, None)
            .into_iter()
            .map(|draw| if draw < 0.5 { MALE } else { FEMALE })
            .collect::<Vec<_>>();

        Ok(Some(
            PopulationUpdate::new(index.clone())
                .with_floats(columns::AGE, ages)
                .with_strings(columns::SEX, &sexes)
                .with_strings(columns::ALIVE, &vec![ALIVE; index.len()]),
        ))
    }

    fn on_time_step(
        &mut self,
        ctx: &EvalContext<'_>,
        event: &Event,
    ) -> Result<Option<PopulationUpdate>> {
        let alive = ctx.population.alive_index(&event.index)?;
        let step = event.step_size_years();
        let ages = ctx
            .population
            .float_values(columns::AGE, &alive)?
            .into_iter()
            .map(|age| age + step)
            .collect();
        Ok(Some(PopulationUpdate::new(alive).with_floats(columns::AGE, ages)))
    }
}
