//! Model-facing input tables built from the registry.
//!
//! Each function returns a wide, lookup-ready table: stratum columns plus one
//! Float64 column per quantity the component reads.

use arrow::record_batch::RecordBatch;

use crate::algorithm::exposure::ExposureCategory;
use crate::algorithm::health::AnemiaSeverity;
use crate::data::keys::{self, AnemiaSequelae, iron_deficiency, vitamin_a};
use crate::data::transform::{
    PARAMETER_COLUMN, drop_columns, merge_value_columns, no_anemia_responsive_proportion,
    pivot_categorical, responsive_proportion, sum_available,
};
use crate::data::DataRegistry;
use crate::error::Result;
use crate::utils::logging::log_warning;

const ANEMIA_LEVELS: [(AnemiaSeverity, &str, &str, AnemiaSequelae); 3] = [
    (
        AnemiaSeverity::Mild,
        iron_deficiency::MILD_ANEMIA_IRON_RESPONSIVE_PROPORTION,
        iron_deficiency::MILD_ANEMIA_DISABILITY_WEIGHT,
        keys::MILD_ANEMIA_SEQUELAE,
    ),
    (
        AnemiaSeverity::Moderate,
        iron_deficiency::MODERATE_ANEMIA_IRON_RESPONSIVE_PROPORTION,
        iron_deficiency::MODERATE_ANEMIA_DISABILITY_WEIGHT,
        keys::MODERATE_ANEMIA_SEQUELAE,
    ),
    (
        AnemiaSeverity::Severe,
        iron_deficiency::SEVERE_ANEMIA_IRON_RESPONSIVE_PROPORTION,
        iron_deficiency::SEVERE_ANEMIA_DISABILITY_WEIGHT,
        keys::SEVERE_ANEMIA_SEQUELAE,
    ),
];

/// Hemoglobin `mean` and `sd` per stratum
pub fn iron_exposure_parameters(registry: &DataRegistry) -> Result<RecordBatch> {
    let mean = drop_columns(&registry.load(iron_deficiency::EXPOSURE)?, &[PARAMETER_COLUMN])?;
    let sd = registry.load(iron_deficiency::EXPOSURE_SD)?;
    merge_value_columns(&[("mean", &mean), ("sd", &sd)], None)
}

/// Iron-responsive proportion per severity, with `none` fixed at 1
pub fn iron_responsiveness_thresholds(registry: &DataRegistry) -> Result<RecordBatch> {
    severity_table(registry, |level| level.1, 1.0)
}

/// Disability weight per severity, with `none` fixed at 0
pub fn iron_disability_weights(registry: &DataRegistry) -> Result<RecordBatch> {
    severity_table(registry, |level| level.2, 0.0)
}

fn severity_table(
    registry: &DataRegistry,
    key_of: impl Fn(&(AnemiaSeverity, &'static str, &'static str, AnemiaSequelae)) -> &'static str,
    none_value: f64,
) -> Result<RecordBatch> {
    let tables = ANEMIA_LEVELS
        .iter()
        .map(|level| Ok((level.0.as_str(), registry.load(key_of(level))?)))
        .collect::<Result<Vec<_>>>()?;
    let named = tables.iter().map(|(name, table)| (*name, table)).collect::<Vec<_>>();
    merge_value_columns(&named, Some((AnemiaSeverity::None.as_str(), none_value)))
}

/// Exposed (`cat1`) proportion of vitamin A deficiency per stratum
pub fn vitamin_a_exposure(registry: &DataRegistry) -> Result<RecordBatch> {
    let wide = pivot_categorical(&registry.load(vitamin_a::EXPOSURE)?)?;
    drop_columns(&wide, &[ExposureCategory::Cat2.as_str()])
}

fn sum_prevalence(registry: &DataRegistry, keys: impl Iterator<Item = String>) -> Result<Option<RecordBatch>> {
    let tables = keys.map(|key| registry.load_optional(&key)).collect::<Vec<_>>();
    sum_available(&tables)
}

/// Fill in iron-responsive proportions from sequela prevalence
///
/// Proportions already present in the registry are kept. Sequelae without
/// recorded prevalence are skipped; a severity with no recorded sequelae at
/// all is left absent with a warning.
pub fn derive_iron_responsive_proportions(registry: &mut DataRegistry) -> Result<()> {
    for (severity, key, _, sequelae) in ANEMIA_LEVELS {
        if registry.contains(key) {
            continue;
        }
        let responsive = sum_prevalence(
            registry,
            sequelae.responsive.iter().map(|&id| keys::sequela_prevalence(id)),
        )?;
        let non_responsive = sum_prevalence(
            registry,
            sequelae.non_responsive.iter().map(|&id| keys::sequela_prevalence(id)),
        )?;
        if responsive.is_none() && non_responsive.is_none() {
            log_warning("No sequela prevalence recorded for anemia severity", Some(&severity));
            continue;
        }
        let proportion = responsive_proportion(responsive.as_ref(), non_responsive.as_ref())?;
        registry.insert(key, proportion);
    }

    if !registry.contains(iron_deficiency::NO_ANEMIA_IRON_RESPONSIVE_PROPORTION) {
        derive_no_anemia_proportion(registry)?;
    }
    Ok(())
}

fn derive_no_anemia_proportion(registry: &mut DataRegistry) -> Result<()> {
    let responsive_ids = || {
        ANEMIA_LEVELS
            .iter()
            .flat_map(|level| level.3.responsive.iter().copied())
    };
    let all_ids = responsive_ids().chain(
        ANEMIA_LEVELS
            .iter()
            .flat_map(|level| level.3.non_responsive.iter().copied()),
    );

    let all = sum_prevalence(registry, all_ids.map(keys::sequela_prevalence))?;
    let responsive = sum_prevalence(registry, responsive_ids().map(keys::sequela_prevalence))?;
    let reverse_causal = keys::REVERSE_CAUSAL_CAUSES
        .iter()
        .map(|cause| registry.load(&keys::cause_prevalence(cause)))
        .collect::<Result<Vec<_>>>()
        .ok()
        .map(|tables| tables.into_iter().map(Some).collect::<Vec<_>>());

    match (all, responsive, reverse_causal) {
        (Some(all), Some(responsive), Some(reverse_causal)) => {
            if let Some(reverse_causal) = sum_available(&reverse_causal)? {
                let proportion =
                    no_anemia_responsive_proportion(&all, &responsive, &reverse_causal)?;
                registry.insert(iron_deficiency::NO_ANEMIA_IRON_RESPONSIVE_PROPORTION, proportion);
            }
        }
        _ => log_warning(
            "Insufficient prevalence data for",
            Some(&iron_deficiency::NO_ANEMIA_IRON_RESPONSIVE_PROPORTION),
        ),
    }
    Ok(())
}

/// Birth prevalence of `cause` per stratum
pub fn birth_prevalence(registry: &DataRegistry, cause: &str) -> Result<RecordBatch> {
    registry.load(&keys::birth_prevalence(cause))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::transform::VALUE_COLUMN;
    use crate::utils::arrow::float_values;
    use crate::utils::test::fixtures::{categorical_exposure_table, uniform_table};

    #[test]
    fn test_exposure_parameters() {
        let mut registry = DataRegistry::new();
        let sd = uniform_table(&[(VALUE_COLUMN, 15.0)]).unwrap();
        registry.insert(iron_deficiency::EXPOSURE, categorical_exposure_table(&[("continuous", 120.0)]).unwrap());
        registry.insert(iron_deficiency::EXPOSURE_SD, sd.clone());
        let parameters = iron_exposure_parameters(&registry).unwrap();
        assert_eq!(float_values(&parameters, "mean").unwrap(), vec![120.0, 120.0]);
        assert_eq!(float_values(&parameters, "sd").unwrap(), vec![15.0, 15.0]);
        assert!(parameters.column_by_name(PARAMETER_COLUMN).is_none());

        registry.insert(iron_deficiency::EXPOSURE_SD, sd.slice(0, 1));
        assert!(iron_exposure_parameters(&registry).is_err());
    }

    #[test]
    fn test_threshold_and_weight_tables() {
        let mut registry = DataRegistry::new();
        for (_, proportion, weight, _) in ANEMIA_LEVELS {
            registry.insert(proportion, uniform_table(&[(VALUE_COLUMN, 0.5)]).unwrap());
            registry.insert(weight, uniform_table(&[(VALUE_COLUMN, 0.1)]).unwrap());
        }
        let thresholds = iron_responsiveness_thresholds(&registry).unwrap();
        assert_eq!(float_values(&thresholds, "none").unwrap(), vec![1.0, 1.0]);
        assert_eq!(float_values(&thresholds, "severe").unwrap(), vec![0.5, 0.5]);
        let weights = iron_disability_weights(&registry).unwrap();
        assert_eq!(float_values(&weights, "none").unwrap(), vec![0.0, 0.0]);
        assert_eq!(float_values(&weights, "mild").unwrap(), vec![0.1, 0.1]);
    }

    #[test]
    fn test_vitamin_a_exposure_keeps_cat1() {
        let mut registry = DataRegistry::new();
        registry.insert(
            vitamin_a::EXPOSURE,
            categorical_exposure_table(&[("cat1", 0.3), ("cat2", 0.7)]).unwrap(),
        );
        let exposure = vitamin_a_exposure(&registry).unwrap();
        assert_eq!(float_values(&exposure, "cat1").unwrap(), vec![0.3, 0.3]);
        assert!(exposure.column_by_name("cat2").is_none());
    }

    #[test]
    fn test_derived_proportions_skip_missing_sequelae() {
        let mut registry = DataRegistry::new();
        registry.insert(keys::sequela_prevalence(144), uniform_table(&[(VALUE_COLUMN, 0.03)]).unwrap());
        registry.insert(keys::sequela_prevalence(172), uniform_table(&[(VALUE_COLUMN, 0.03)]).unwrap());
        registry.insert(keys::sequela_prevalence(531), uniform_table(&[(VALUE_COLUMN, 0.02)]).unwrap());
        for cause in keys::REVERSE_CAUSAL_CAUSES {
            registry.insert(keys::cause_prevalence(cause), uniform_table(&[(VALUE_COLUMN, 0.01)]).unwrap());
        }
        derive_iron_responsive_proportions(&mut registry).unwrap();

        let mild = registry.load(iron_deficiency::MILD_ANEMIA_IRON_RESPONSIVE_PROPORTION).unwrap();
        let values = float_values(&mild, VALUE_COLUMN).unwrap();
        assert!((values[0] - 0.75).abs() < 1e-12);
        assert!(!registry.contains(iron_deficiency::SEVERE_ANEMIA_IRON_RESPONSIVE_PROPORTION));

        let no_anemia = registry
            .load(iron_deficiency::NO_ANEMIA_IRON_RESPONSIVE_PROPORTION)
            .unwrap();
        // all = 0.08, non-responsive = 0.02, reverse = 0.03
        let expected = 1.0 - 0.08 - (0.03 - 0.02) / (1.0 - 0.08);
        let values = float_values(&no_anemia, VALUE_COLUMN).unwrap();
        assert!((values[0] - expected).abs() < 1e-12);
    }
}
