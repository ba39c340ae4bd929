use chrono::NaiveDate;
use lsff_sim::components::iron_deficiency::{ANEMIA_SEVERITY, EXPOSURE as IRON_EXPOSURE};
use lsff_sim::components::vitamin_a::{EXPOSURE, VITAMIN_A_DEFICIENCY};
use lsff_sim::population::columns;
use lsff_sim::utils::test::{ModelInputs, model_registry};
use lsff_sim::{MetricsConfig, Simulation, SimulationConfig};

fn config(population_size: usize) -> SimulationConfig {
    SimulationConfig {
        population_size,
        random_seed: 11,
        start_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2020, 3, 1).unwrap(),
        step_size_days: 7,
        metrics: MetricsConfig {
            by_age: false,
            by_year: true,
            by_sex: false,
        },
        ..Default::default()
    }
}

/// One step of 1000 simulants at a constant 0.3 exposure without attenuation
#[test]
fn test_constant_exposure_single_step() -> lsff_sim::Result<()> {
    let data = model_registry(&ModelInputs::default())?;
    let mut simulation = Simulation::standard(config(1_000), &data)?;
    simulation.initialize_simulants()?;
    let step_years = simulation.clock().step_size_years();
    simulation.step()?;

    let index = simulation.population().full_index();
    let cases = simulation
        .population()
        .string_values(VITAMIN_A_DEFICIENCY, &index)?
        .iter()
        .filter(|s| *s == VITAMIN_A_DEFICIENCY)
        .count();
    // Binomial(1000, 0.3) has a standard deviation of about 14.5.
    assert!((240..=360).contains(&cases), "{cases} with-condition simulants");

    let metrics = simulation.metrics();
    let person_time = metrics
        .get("vitamin_a_deficiency_person_time_in_2020")
        .unwrap();
    assert!((person_time - cases as f64 * step_years).abs() < 1e-9);
    assert_eq!(
        metrics.get("susceptible_to_vitamin_a_deficiency_to_vitamin_a_deficiency_event_count_in_2020"),
        Some(0.0)
    );
    Ok(())
}

#[test]
fn test_full_run_accounts_all_person_time() -> lsff_sim::Result<()> {
    let data = model_registry(&ModelInputs::default())?;
    let mut simulation = Simulation::standard(config(300), &data)?;
    let steps = simulation.clock().remaining_steps() as f64;
    let step_years = simulation.clock().step_size_years();
    simulation.run()?;

    let metrics = simulation.metrics();
    let anemia_total: f64 = ["none", "mild", "moderate", "severe"]
        .iter()
        .map(|s| metrics.get(&format!("anemia_{s}_person_time_in_2020")).unwrap())
        .sum();
    assert!((anemia_total - 300.0 * steps * step_years).abs() < 1e-6);

    let disease_total = metrics.get("vitamin_a_deficiency_person_time_in_2020").unwrap()
        + metrics
            .get("susceptible_to_vitamin_a_deficiency_person_time_in_2020")
            .unwrap();
    assert!((disease_total - anemia_total).abs() < 1e-6);

    let all_causes = metrics.get("ylds_due_to_all_causes_in_2020").unwrap();
    assert!(all_causes > 0.0);
    assert!(all_causes <= 300.0 * steps * step_years);
    Ok(())
}

#[test]
fn test_pipelines_are_referentially_transparent() -> lsff_sim::Result<()> {
    let data = model_registry(&ModelInputs::default())?;
    let mut simulation = Simulation::standard(config(200), &data)?;
    simulation.initialize_simulants()?;
    let index = simulation.population().full_index();

    for name in [IRON_EXPOSURE, ANEMIA_SEVERITY, EXPOSURE, "iron_responsive"] {
        let first = simulation.value(name, &index)?;
        let second = simulation.value(name, &index)?;
        assert_eq!(first, second, "{name} changed between reads");
    }

    let ages = simulation.population().float_values(columns::AGE, &index)?;
    assert!(ages.iter().all(|&a| (0.0..5.0).contains(&a)));
    Ok(())
}

#[test]
fn test_stratified_keys_cover_keyspace() -> lsff_sim::Result<()> {
    let data = model_registry(&ModelInputs::default())?;
    let mut config = config(100);
    config.metrics = MetricsConfig::default();
    config.stratification.vitamin_a = Some(EXPOSURE.to_string());
    let mut simulation = Simulation::standard(config, &data)?;
    simulation.initialize_simulants()?;
    simulation.step()?;

    let metrics = simulation.metrics();
    // Every (sex, age group, VA category) combination is present, empty or not.
    for sex in ["male", "female"] {
        for age_group in ["early_neonatal", "late_neonatal", "post_neonatal", "1_to_4"] {
            for category in ["cat1", "cat2"] {
                let key = format!(
                    "vitamin_a_deficiency_person_time_in_2020_among_{sex}_in_age_group_{age_group}_VA_{category}"
                );
                assert!(metrics.get(&key).is_some(), "missing {key}");
            }
        }
    }
    Ok(())
}
