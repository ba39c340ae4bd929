//! Discrete simulation clock.

use chrono::{Datelike, Duration, NaiveDate};

/// Days per year used when converting durations to years
pub const DAYS_PER_YEAR: f64 = 365.25;

/// Convert a duration into (fractional) years
#[must_use]
pub fn to_years(duration: Duration) -> f64 {
    duration.num_seconds() as f64 / (DAYS_PER_YEAR * 86_400.0)
}

/// Calendar clock that advances in fixed steps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationClock {
    current: NaiveDate,
    end: NaiveDate,
    step_size: Duration,
}

impl SimulationClock {
    /// Create a clock running from `start` until it reaches `end`
    #[must_use]
    pub fn new(start: NaiveDate, end: NaiveDate, step_size_days: i64) -> Self {
        Self {
            current: start,
            end,
            step_size: Duration::days(step_size_days),
        }
    }

    /// Current simulation date (the start of the pending step)
    #[must_use]
    pub const fn time(&self) -> NaiveDate {
        self.current
    }

    /// Date at the end of the pending step
    #[must_use]
    pub fn next_time(&self) -> NaiveDate {
        self.current + self.step_size
    }

    #[must_use]
    pub const fn step_size(&self) -> Duration {
        self.step_size
    }

    /// Length of one step in years
    #[must_use]
    pub fn step_size_years(&self) -> f64 {
        to_years(self.step_size)
    }

    /// Calendar year of the current date
    #[must_use]
    pub fn year(&self) -> i32 {
        self.current.year()
    }

    /// Current date as a decimal year, used for bucketed year lookups
    #[must_use]
    pub fn decimal_year(&self) -> f64 {
        f64::from(self.current.year()) + f64::from(self.current.ordinal0()) / DAYS_PER_YEAR
    }

    /// Move the clock forward by one step
    pub fn advance(&mut self) {
        self.current += self.step_size;
    }

    /// Whether the run has reached its end date
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.current >= self.end
    }

    /// Number of steps left before the end date
    #[must_use]
    pub fn remaining_steps(&self) -> u64 {
        let remaining = (self.end - self.current).num_seconds();
        let step = self.step_size.num_seconds();
        if remaining <= 0 || step <= 0 {
            return 0;
        }
        ((remaining + step - 1) / step) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_step_size_in_years() {
        let clock = SimulationClock::new(date(2020, 1, 1), date(2021, 1, 1), 28);
        assert!((clock.step_size_years() - 28.0 / 365.25).abs() < 1e-12);
        assert_eq!(clock.remaining_steps(), 14);
    }

    #[test]
    fn test_advance_until_finished() {
        let mut clock = SimulationClock::new(date(2020, 12, 20), date(2021, 1, 5), 7);
        let mut steps = 0;
        while !clock.is_finished() {
            clock.advance();
            steps += 1;
        }
        assert_eq!(steps, 3);
        assert_eq!(clock.year(), 2021);
    }
}
