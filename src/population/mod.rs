//! Population state: the columnar simulant table, randomness streams and the clock.

pub mod clock;
pub mod randomness;
pub mod table;

pub use clock::{DAYS_PER_YEAR, SimulationClock, to_years};
pub use randomness::{RandomnessManager, RandomnessStream};
pub use table::{ColumnSpec, PopulationTable, PopulationUpdate, PopulationView};

/// Value of the `alive` column for living simulants
pub const ALIVE: &str = "alive";
/// Value of the `alive` column for dead simulants
pub const DEAD: &str = "dead";

/// Standard demographic column names
pub mod columns {
    pub const AGE: &str = "age";
    pub const SEX: &str = "sex";
    pub const ALIVE: &str = "alive";
}
