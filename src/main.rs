use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, bail};
use log::info;
use lsff_sim::data::loader::derive_iron_responsive_proportions;
use lsff_sim::results::{Keyspace, build_results, write_run_output};
use lsff_sim::{DataRegistry, Simulation, SimulationConfig};

const USAGE: &str = "usage:
  lsff-sim run <config.json> <data_dir> <output.parquet>
  lsff-sim results <keyspace.json> <out_dir> <run_output.parquet>...";

fn run(config_path: &Path, data_dir: &Path, output: &Path) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = SimulationConfig::from_json_file(config_path)
        .with_context(|| format!("reading configuration {}", config_path.display()))?;
    let mut data = DataRegistry::from_directory(data_dir)
        .with_context(|| format!("loading input data from {}", data_dir.display()))?;
    derive_iron_responsive_proportions(&mut data)?;

    info!(
        "Running draw {} seed {} of scenario '{}' with {} simulants",
        config.input_draw, config.random_seed, config.scenario, config.population_size
    );
    let mut simulation = Simulation::standard(config, &data).context("setting up the simulation")?;
    simulation.run()?;

    let metrics = simulation.metrics();
    write_run_output(output, simulation.config(), &metrics)
        .with_context(|| format!("writing {}", output.display()))?;
    info!(
        "Wrote {} metrics to {} in {:?}",
        metrics.len(),
        output.display(),
        start.elapsed()
    );
    Ok(())
}

fn results(keyspace_path: &Path, out_dir: &Path, files: &[PathBuf]) -> anyhow::Result<()> {
    let keyspace = Keyspace::from_json_file(keyspace_path)
        .with_context(|| format!("reading keyspace {}", keyspace_path.display()))?;
    let measure_data = build_results(files, &keyspace, out_dir)?;
    for (kind, table) in measure_data.iter() {
        info!("{}: {} rows", kind.as_str(), table.num_rows());
    }
    info!("**DONE**");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [command, config, data_dir, output] if command == "run" => {
            run(Path::new(config), Path::new(data_dir), Path::new(output))
        }
        [command, keyspace, out_dir, files @ ..] if command == "results" && !files.is_empty() => {
            let files: Vec<PathBuf> = files.iter().map(PathBuf::from).collect();
            results(Path::new(keyspace), Path::new(out_dir), &files)
        }
        _ => bail!("{USAGE}"),
    }
}
