//! Accumulated observations keyed by formatted observation key.

use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::results::naming::ObservationKey;

/// Additive counters owned by one observer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Counter {
    counts: FxHashMap<String, f64>,
}

impl Counter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `amount` to `key`, creating it at zero
    pub fn add(&mut self, key: impl Into<String>, amount: f64) {
        *self.counts.entry(key.into()).or_insert(0.0) += amount;
    }

    /// Format `key` and add `amount` to it
    ///
    /// # Errors
    /// Returns `Error::Grammar` if the key cannot be formatted.
    pub fn observe(&mut self, key: &ObservationKey, amount: f64) -> Result<()> {
        self.add(key.format()?, amount);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<f64> {
        self.counts.get(key).copied()
    }

    /// Add every count of `other` into `self`
    pub fn merge(&mut self, other: &Self) {
        for (key, value) in &other.counts {
            self.add(key.as_str(), *value);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.counts.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.counts.values().copied()
    }

    /// Entries sorted by key
    #[must_use]
    pub fn sorted(&self) -> Vec<(&str, f64)> {
        let mut entries: Vec<_> = self.counts.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_is_commutative() {
        let mut a = Counter::new();
        a.add("x", 1.0);
        a.add("y", 2.0);
        let mut b = Counter::new();
        b.add("y", 0.5);
        b.add("z", 4.0);

        let mut ab = a.clone();
        ab.merge(&b);
        let mut ba = b.clone();
        ba.merge(&a);
        assert_eq!(ab, ba);
        assert_eq!(ab.get("y"), Some(2.5));
        assert_eq!(ab.sorted(), vec![("x", 1.0), ("y", 2.5), ("z", 4.0)]);
    }

    #[test]
    fn test_zero_observations_are_kept() {
        let mut counter = Counter::new();
        counter
            .observe(&ObservationKey::new("anemia_none_person_time").in_year(2020), 0.0)
            .unwrap();
        assert_eq!(counter.get("anemia_none_person_time_in_2020"), Some(0.0));
        assert!(
            counter
                .observe(&ObservationKey::new("bad_in_key"), 1.0)
                .is_err()
        );
    }
}
