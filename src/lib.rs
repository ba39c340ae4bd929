//! A discrete-time population microsimulation of nutritional risk
//! exposures (iron and vitamin A deficiency), the disease states they drive
//! and the stratified outcome counters used to compare fortification
//! scenarios.
//!
//! Components register named value pipelines and population columns with a
//! [`SimulationBuilder`]; the [`Simulation`] engine validates the wiring once,
//! then advances the whole population one step at a time. Observers turn
//! each step into counters keyed by the [`results::naming`] grammar, and
//! [`results::process`] turns stacked run outputs back into count tables.

pub mod algorithm;
pub mod components;
pub mod config;
pub mod data;
pub mod error;
pub mod lookup;
pub mod observers;
pub mod pipeline;
pub mod population;
pub mod results;
pub mod simulation;
pub mod utils;

// Core types
pub use config::{MetricsConfig, SimulationConfig, StratificationConfig};
pub use data::DataRegistry;
pub use error::{Error, Result};
pub use simulation::{Simulation, SimulationBuilder};

// Model building blocks
pub use components::Component;
pub use observers::{Counter, Observer};
pub use pipeline::{Combiner, PipelineValue, ValuePipelineGraph};
pub use population::{PopulationTable, PopulationUpdate, RandomnessStream, SimulationClock};

// Results
pub use results::{Keyspace, MeasureData, ObservationKey, build_results};

// Arrow types
pub use arrow::record_batch::RecordBatch;
