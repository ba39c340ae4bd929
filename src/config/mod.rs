//! Configuration for a simulation run.

use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration for a single simulation run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of simulants created at time step 0
    pub population_size: usize,
    /// Seed shared by every randomness stream
    pub random_seed: u64,
    /// Input draw this run belongs to (carried into the output rows)
    pub input_draw: i64,
    /// Scenario name this run belongs to (carried into the output rows)
    pub scenario: String,
    /// Date of the first time step
    pub start_date: NaiveDate,
    /// The run stops once the clock reaches this date
    pub end_date: NaiveDate,
    /// Length of one time step in days
    pub step_size_days: i64,
    /// Lower bound of the initial age range (years)
    pub age_start: f64,
    /// Upper bound of the initial age range (years, exclusive)
    pub age_end: f64,
    /// Which demographic axes the observers stratify by
    pub metrics: MetricsConfig,
    /// Optional extra stratification axes
    pub stratification: StratificationConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            population_size: 10_000,
            random_seed: 0,
            input_draw: 0,
            scenario: "baseline".to_string(),
            start_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default(),
            end_date: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap_or_default(),
            step_size_days: 1,
            age_start: 0.0,
            age_end: 5.0,
            metrics: MetricsConfig::default(),
            stratification: StratificationConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Read a configuration from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let config: Self = serde_json::from_reader(std::io::BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values that can never produce a run
    pub fn validate(&self) -> Result<()> {
        if self.population_size == 0 {
            return Err(Error::validation("population_size must be positive"));
        }
        if self.step_size_days <= 0 {
            return Err(Error::validation("step_size_days must be positive"));
        }
        if self.end_date <= self.start_date {
            return Err(Error::validation(format!(
                "end_date {} must be after start_date {}",
                self.end_date, self.start_date
            )));
        }
        if !(self.age_start >= 0.0 && self.age_end > self.age_start) {
            return Err(Error::validation(format!(
                "invalid initial age range [{}, {})",
                self.age_start, self.age_end
            )));
        }
        Ok(())
    }
}

/// Demographic stratification switches for the observers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Stratify by age group
    pub by_age: bool,
    /// Stratify by calendar year
    pub by_year: bool,
    /// Stratify by sex
    pub by_sex: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            by_age: true,
            by_year: true,
            by_sex: true,
        }
    }
}

/// Extra stratification axes applied by the disease observers
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StratificationConfig {
    /// Pipeline producing the vitamin A exposure category, if stratifying by it
    pub vitamin_a: Option<String>,
    /// Pipeline or column producing the zinc exposure category, if stratifying by it
    pub zinc: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.metrics.by_age && config.metrics.by_sex && config.metrics.by_year);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SimulationConfig = serde_json::from_str(
            r#"{"population_size": 250, "start_date": "2021-01-01", "end_date": "2021-02-01",
                "metrics": {"by_age": false}}"#,
        )
        .unwrap();
        assert_eq!(config.population_size, 250);
        assert_eq!(config.step_size_days, 1);
        assert!(!config.metrics.by_age);
        assert!(config.metrics.by_sex);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_reversed_dates() {
        let config = SimulationConfig {
            end_date: NaiveDate::from_ymd_opt(2019, 1, 1).unwrap(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Validation(_))));
    }
}
