//! Flat observation keys.
//!
//! ```text
//! {measure}[_in_{year}][_among_{sex}][_in_age_group_{age_group}][_VA_{va}][_ZINC_{zinc}]
//! ```
//!
//! Keys are decoded by stripping slots from the right. No slot value may
//! contain a separator, and [`ObservationKey::format`] refuses any key that
//! would not decode back to itself.

use std::fmt;

use crate::error::{Error, Result};

pub const YEAR_SEPARATOR: &str = "_in_";
pub const SEX_SEPARATOR: &str = "_among_";
pub const AGE_GROUP_SEPARATOR: &str = "_in_age_group_";
pub const VITAMIN_A_SEPARATOR: &str = "_VA_";
pub const ZINC_SEPARATOR: &str = "_ZINC_";

/// Separators in the order they are stripped when parsing
pub const RESERVED_SEPARATORS: [&str; 5] = [
    ZINC_SEPARATOR,
    VITAMIN_A_SEPARATOR,
    AGE_GROUP_SEPARATOR,
    SEX_SEPARATOR,
    YEAR_SEPARATOR,
];

/// One stratified observation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ObservationKey {
    pub measure: String,
    pub year: Option<i32>,
    pub sex: Option<String>,
    pub age_group: Option<String>,
    pub vitamin_a: Option<String>,
    pub zinc: Option<String>,
}

fn check_slot(slot: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::Grammar(format!("empty {slot} in observation key")));
    }
    if let Some(separator) = RESERVED_SEPARATORS.iter().find(|s| value.contains(**s)) {
        return Err(Error::Grammar(format!(
            "{slot} '{value}' contains reserved separator '{separator}'"
        )));
    }
    Ok(())
}

fn strip_slot(key: &mut String, separator: &str) -> Option<String> {
    let (head, tail) = key.rsplit_once(separator)?;
    let (head, tail) = (head.to_string(), tail.to_string());
    *key = head;
    Some(tail)
}

impl ObservationKey {
    pub fn new(measure: impl Into<String>) -> Self {
        Self {
            measure: measure.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn in_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    #[must_use]
    pub fn among(mut self, sex: impl Into<String>) -> Self {
        self.sex = Some(sex.into());
        self
    }

    #[must_use]
    pub fn in_age_group(mut self, age_group: impl Into<String>) -> Self {
        self.age_group = Some(age_group.into());
        self
    }

    #[must_use]
    pub fn with_vitamin_a(mut self, category: impl Into<String>) -> Self {
        self.vitamin_a = Some(category.into());
        self
    }

    #[must_use]
    pub fn with_zinc(mut self, category: impl Into<String>) -> Self {
        self.zinc = Some(category.into());
        self
    }

    fn render(&self) -> String {
        let mut key = self.measure.clone();
        if let Some(year) = self.year {
            key.push_str(&format!("{YEAR_SEPARATOR}{year}"));
        }
        let optional = [
            (SEX_SEPARATOR, &self.sex),
            (AGE_GROUP_SEPARATOR, &self.age_group),
            (VITAMIN_A_SEPARATOR, &self.vitamin_a),
            (ZINC_SEPARATOR, &self.zinc),
        ];
        for (separator, value) in optional {
            if let Some(value) = value {
                key.push_str(separator);
                key.push_str(value);
            }
        }
        key
    }

    /// Encode the key
    ///
    /// # Errors
    /// Returns `Error::Grammar` if a slot is empty, contains a separator, or
    /// the encoded key would not parse back to `self`.
    pub fn format(&self) -> Result<String> {
        check_slot("measure", &self.measure)?;
        for (slot, value) in [
            ("sex", &self.sex),
            ("age group", &self.age_group),
            ("vitamin A category", &self.vitamin_a),
            ("zinc category", &self.zinc),
        ] {
            if let Some(value) = value {
                check_slot(slot, value)?;
            }
        }
        let key = self.render();
        if Self::parse(&key)? != *self {
            return Err(Error::Grammar(format!("'{key}' does not decode to its own slots")));
        }
        Ok(key)
    }

    /// Decode a key produced by [`ObservationKey::format`]
    pub fn parse(key: &str) -> Result<Self> {
        let mut rest = key.to_string();
        let zinc = strip_slot(&mut rest, ZINC_SEPARATOR);
        let vitamin_a = strip_slot(&mut rest, VITAMIN_A_SEPARATOR);
        let age_group = strip_slot(&mut rest, AGE_GROUP_SEPARATOR);
        let sex = strip_slot(&mut rest, SEX_SEPARATOR);
        let year = match strip_slot(&mut rest, YEAR_SEPARATOR) {
            Some(year) => Some(year.parse::<i32>().map_err(|_| {
                Error::Grammar(format!("'{year}' in '{key}' is not a year"))
            })?),
            None => None,
        };
        if rest.is_empty() {
            return Err(Error::Grammar(format!("'{key}' has no measure")));
        }
        Ok(Self {
            measure: rest,
            year,
            sex,
            age_group,
            vitamin_a,
            zinc,
        })
    }
}

impl fmt::Display for ObservationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_key() {
        let key = ObservationKey::new("vitamin_a_deficiency_person_time")
            .in_year(2021)
            .among("female")
            .in_age_group("1_to_4")
            .with_vitamin_a("cat1")
            .with_zinc("cat2");
        let encoded = key.format().unwrap();
        assert_eq!(
            encoded,
            "vitamin_a_deficiency_person_time_in_2021_among_female_in_age_group_1_to_4_VA_cat1_ZINC_cat2"
        );
        assert_eq!(ObservationKey::parse(&encoded).unwrap(), key);
    }

    #[test]
    fn test_partial_keys() {
        let only_measure = ObservationKey::new("ylds_due_to_all_causes");
        assert_eq!(only_measure.format().unwrap(), "ylds_due_to_all_causes");
        assert_eq!(
            ObservationKey::parse("ylds_due_to_all_causes").unwrap(),
            only_measure
        );

        let key = ObservationKey::new("anemia_mild_person_time").in_age_group("early_neonatal");
        let encoded = key.format().unwrap();
        assert_eq!(encoded, "anemia_mild_person_time_in_age_group_early_neonatal");
        assert_eq!(ObservationKey::parse(&encoded).unwrap(), key);
    }

    #[test]
    fn test_reserved_separators_rejected() {
        let key = ObservationKey::new("deaths_in_hospital").in_year(2020);
        assert!(matches!(key.format(), Err(Error::Grammar(_))));
        let key = ObservationKey::new("x").with_vitamin_a("a_ZINC_b");
        assert!(key.format().is_err());
        assert!(ObservationKey::new("").format().is_err());
    }

    #[test]
    fn test_ambiguous_concatenation_rejected() {
        // "ZINC_x" alone is not a separator, but after "_VA_" it forms one.
        let key = ObservationKey::new("x").with_vitamin_a("ZINC_x");
        assert!(matches!(key.format(), Err(Error::Grammar(_))));
    }

    #[test]
    fn test_bad_year() {
        assert!(ObservationKey::parse("x_in_twenty").is_err());
        assert!(ObservationKey::parse("_in_2020").is_err());
    }
}
