//! Simulation outputs: key grammar, per-run tables and post-processing.

pub mod io;
pub mod naming;
pub mod process;

pub use io::{read_run_outputs, run_output, write_run_output};
pub use naming::ObservationKey;
pub use process::{
    Keyspace, MeasureData, MeasureKind, aggregate_over_seed, build_results,
    filter_out_incomplete, make_measure_data, pivot_and_split,
};
