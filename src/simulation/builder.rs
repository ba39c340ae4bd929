//! Single-pass setup of components and observers.
//!
//! Every component and observer gets the builder exactly once, in
//! registration order. It registers pipelines, takes its randomness
//! streams and declares the columns it creates at initialization.
//! [`SimulationBuilder::finish`] checks the whole wiring before the
//! population table is created.

use arrow::record_batch::RecordBatch;
use rustc_hash::FxHashSet;

use crate::config::SimulationConfig;
use crate::data::DataRegistry;
use crate::error::{Error, Result};
use crate::lookup::{LookupTable, YEAR_PARAMETER};
use crate::pipeline::{PipelineGraphBuilder, Requirements, ValuePipelineGraph};
use crate::population::{ColumnSpec, RandomnessManager, RandomnessStream, columns};

/// Discrete keys of the standard stratified input tables
pub const LOOKUP_KEY_COLUMNS: [&str; 1] = [columns::SEX];
/// Binned parameters of the standard stratified input tables
pub const LOOKUP_PARAMETER_COLUMNS: [&str; 2] = [columns::AGE, YEAR_PARAMETER];

#[derive(Debug)]
struct Initializer {
    owner: String,
    creates: Vec<ColumnSpec>,
    requires: Requirements,
}

/// Output of a successful setup pass
#[derive(Debug)]
pub struct SetupOutput {
    pub values: ValuePipelineGraph,
    /// Columns to create, in initialization order
    pub columns: Vec<ColumnSpec>,
    pub randomness: RandomnessManager,
}

/// Registration surface passed to `setup`
#[derive(Debug)]
pub struct SimulationBuilder<'a> {
    config: &'a SimulationConfig,
    data: &'a DataRegistry,
    values: PipelineGraphBuilder,
    randomness: RandomnessManager,
    initializers: Vec<Initializer>,
}

impl<'a> SimulationBuilder<'a> {
    #[must_use]
    pub fn new(config: &'a SimulationConfig, data: &'a DataRegistry) -> Self {
        Self {
            config,
            data,
            values: PipelineGraphBuilder::new(),
            randomness: RandomnessManager::new(config.random_seed),
            initializers: Vec::new(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &'a SimulationConfig {
        self.config
    }

    /// Input tables available to components
    #[must_use]
    pub const fn data(&self) -> &'a DataRegistry {
        self.data
    }

    /// Pipeline registrations
    pub fn values(&mut self) -> &mut PipelineGraphBuilder {
        &mut self.values
    }

    /// Take the randomness stream `key`; each stream has a single owner
    pub fn randomness_stream(&mut self, key: &str) -> Result<RandomnessStream> {
        self.randomness.get_stream(key)
    }

    /// Build a lookup table keyed by sex and binned by age and year
    ///
    /// The population columns the table reads are declared under `name`, so
    /// they must be created by a component set up earlier.
    pub fn lookup_table(&mut self, name: &str, data: &RecordBatch) -> Result<LookupTable> {
        let table = LookupTable::build(name, data, &LOOKUP_KEY_COLUMNS, &LOOKUP_PARAMETER_COLUMNS)?;
        self.reads_columns(name, &table.required_columns());
        Ok(table)
    }

    /// Declare the columns `owner` creates when simulants are initialized
    ///
    /// # Arguments
    /// * `owner` - Component or observer name, used in error messages
    /// * `creates` - New columns, populated by the owner's initializer
    /// * `requires` - Columns that must have been created by an earlier
    ///   initializer and streams the initializer draws from
    pub fn initializes_simulants(
        &mut self,
        owner: &str,
        creates: Vec<ColumnSpec>,
        requires: Requirements,
    ) {
        self.initializers.push(Initializer {
            owner: owner.to_string(),
            creates,
            requires,
        });
    }

    /// Declare columns `owner` reads but does not create
    ///
    /// The columns must be created by a component set up before `owner`.
    pub fn reads_columns<S: AsRef<str>>(&mut self, owner: &str, columns: &[S]) {
        self.initializes_simulants(owner, Vec::new(), Requirements::new().columns(columns));
    }

    /// Validate the wiring and hand back the pieces of a runnable simulation
    ///
    /// # Errors
    /// Returns a configuration error if a column is created twice, an
    /// initializer needs a column no earlier initializer created, a stream
    /// was never taken, an initializer reads an unregistered pipeline, or
    /// the pipeline graph does not resolve.
    pub fn finish(self) -> Result<SetupOutput> {
        let Self {
            values,
            randomness,
            initializers,
            ..
        } = self;

        let mut created: FxHashSet<String> = FxHashSet::default();
        let mut columns = Vec::new();
        let mut required_values: Vec<(String, String)> = Vec::new();
        for initializer in initializers {
            if let Some(missing) = initializer
                .requires
                .columns
                .iter()
                .find(|c| !created.contains(*c))
            {
                return Err(Error::configuration(format!(
                    "'{}' requires column '{missing}' before any initializer creates it",
                    initializer.owner
                )));
            }
            if let Some(stream) = initializer
                .requires
                .streams
                .iter()
                .find(|s| !randomness.has_stream(s))
            {
                return Err(Error::configuration(format!(
                    "'{}' requires unregistered randomness stream '{stream}'",
                    initializer.owner
                )));
            }
            for spec in initializer.creates {
                if !created.insert(spec.name.clone()) {
                    return Err(Error::DuplicateRegistration { name: spec.name });
                }
                columns.push(spec);
            }
            required_values.extend(
                initializer
                    .requires
                    .values
                    .into_iter()
                    .map(|value| (initializer.owner.clone(), value)),
            );
        }

        let values = values.build()?;
        values.validate_requirements(&created, &randomness)?;
        if let Some((owner, name)) = required_values.into_iter().find(|(_, v)| !values.contains(v)) {
            log::error!("'{owner}' requires pipeline '{name}' which is never registered");
            return Err(Error::UnknownPipeline { name });
        }
        log::info!(
            "Setup complete: {} columns, {} pipelines",
            columns.len(),
            values.evaluation_order().len()
        );
        Ok(SetupOutput {
            values,
            columns,
            randomness,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Combiner, PipelineValue};
    use crate::utils::test::uniform_table;
    use arrow::datatypes::DataType;

    #[test]
    fn test_initializer_order_is_enforced() {
        let config = SimulationConfig::default();
        let data = DataRegistry::new();
        let mut builder = SimulationBuilder::new(&config, &data);
        builder.initializes_simulants(
            "exposure",
            vec![ColumnSpec::new("exposure_propensity", DataType::Float64)],
            Requirements::new().columns(&[columns::AGE]),
        );
        builder.initializes_simulants(
            "population",
            vec![ColumnSpec::new(columns::AGE, DataType::Float64)],
            Requirements::new(),
        );
        let err = builder.finish().unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_initializer_value_requirements_must_resolve() {
        let config = SimulationConfig::default();
        let data = DataRegistry::new();
        let mut builder = SimulationBuilder::new(&config, &data);
        builder.initializes_simulants(
            "neural_tube_defects",
            vec![ColumnSpec::new("neural_tube_defects", DataType::Utf8)],
            Requirements::new().values(&["neural_tube_defects.birth_prevalence"]),
        );
        let err = builder.finish().unwrap_err();
        assert!(err.is_configuration());
        assert!(matches!(
            err,
            Error::UnknownPipeline { name } if name == "neural_tube_defects.birth_prevalence"
        ));

        let mut builder = SimulationBuilder::new(&config, &data);
        builder
            .values()
            .register_producer(
                "neural_tube_defects.birth_prevalence",
                |_, index| Ok(PipelineValue::Float(vec![0.0; index.len()])),
                Combiner::Replace,
                Requirements::new(),
            )
            .unwrap();
        builder.initializes_simulants(
            "neural_tube_defects",
            vec![ColumnSpec::new("neural_tube_defects", DataType::Utf8)],
            Requirements::new().values(&["neural_tube_defects.birth_prevalence"]),
        );
        assert!(builder.finish().is_ok());
    }

    #[test]
    fn test_lookup_table_declares_its_reads() {
        let config = SimulationConfig::default();
        let data = DataRegistry::new();
        let table = uniform_table(&[("value", 0.5)]).unwrap();

        let mut builder = SimulationBuilder::new(&config, &data);
        let lookup = builder.lookup_table("exposure", &table).unwrap();
        assert_eq!(lookup.required_columns(), vec![columns::SEX.to_string(), columns::AGE.to_string()]);
        assert!(builder.finish().unwrap_err().is_configuration());

        let mut builder = SimulationBuilder::new(&config, &data);
        builder.initializes_simulants(
            "population",
            vec![
                ColumnSpec::new(columns::AGE, DataType::Float64),
                ColumnSpec::new(columns::SEX, DataType::Utf8),
            ],
            Requirements::new(),
        );
        builder.lookup_table("exposure", &table).unwrap();
        assert!(builder.finish().is_ok());
    }

    #[test]
    fn test_duplicate_columns_and_missing_streams() {
        let config = SimulationConfig::default();
        let data = DataRegistry::new();
        let mut builder = SimulationBuilder::new(&config, &data);
        for owner in ["a", "b"] {
            builder.initializes_simulants(
                owner,
                vec![ColumnSpec::new("shared", DataType::Utf8)],
                Requirements::new(),
            );
        }
        assert!(matches!(
            builder.finish(),
            Err(Error::DuplicateRegistration { name }) if name == "shared"
        ));

        let mut builder = SimulationBuilder::new(&config, &data);
        builder.initializes_simulants(
            "a",
            Vec::new(),
            Requirements::new().streams(&["a_initial_states"]),
        );
        assert!(builder.finish().is_err());

        let mut builder = SimulationBuilder::new(&config, &data);
        builder.randomness_stream("a_initial_states").unwrap();
        assert!(builder.randomness_stream("a_initial_states").is_err());
        builder.initializes_simulants(
            "a",
            Vec::new(),
            Requirements::new().streams(&["a_initial_states"]),
        );
        assert!(builder.finish().is_ok());
    }
}
