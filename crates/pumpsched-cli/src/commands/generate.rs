//! Synthetic dataset generation command

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use pumpsched_core::data::{load_matrix, write_matrix};
use pumpsched_core::synthetic::{generate_dataset, ProfilePattern, BASE_FLOW_PROFILE};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use crate::settings::Config;

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Number of days to generate
    #[arg(short, long, default_value_t = 365)]
    pub days: usize,

    /// Directory receiving profiles.csv and prices.csv
    #[arg(short, long, default_value = "data")]
    pub output_dir: PathBuf,

    /// Observed flow table whose hourly statistics shape the profiles
    #[arg(long)]
    pub base_profiles: Option<PathBuf>,

    /// RNG seed (defaults to training.seed)
    #[arg(long)]
    pub seed: Option<u64>,
}

pub fn run(args: GenerateArgs, config_path: Option<&Path>) -> Result<()> {
    let config = Config::load(config_path)?;
    anyhow::ensure!(args.days > 0, "--days must be positive");

    let pattern = match &args.base_profiles {
        Some(path) => {
            let history = load_matrix(path, "base profiles", config.data.table_options())
                .with_context(|| format!("Failed to load base profiles {}", path.display()))?;
            info!("Deriving hourly pattern from {} observed days", history.nrows());
            ProfilePattern::from_days(history.view())?
        }
        None => ProfilePattern::from_profile(&BASE_FLOW_PROFILE),
    };

    let seed = args.seed.unwrap_or(config.training.seed);
    let mut rng = StdRng::seed_from_u64(seed);
    let dataset = generate_dataset(args.days, &pattern, &config.synthetic, &mut rng)
        .context("Failed to generate synthetic data")?;

    fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Failed to create {}", args.output_dir.display()))?;
    let profiles_path = args.output_dir.join("profiles.csv");
    let prices_path = args.output_dir.join("prices.csv");
    write_matrix(&profiles_path, &dataset.profiles().to_owned())?;
    write_matrix(&prices_path, &dataset.prices().to_owned())?;

    let stats = dataset.stats();
    info!(
        "Generated {} days (seed {}), prices {:.1}..{:.1}, flows {:.2}..{:.2}",
        dataset.len(),
        seed,
        stats.prices.min,
        stats.prices.max,
        stats.profiles.min,
        stats.profiles.max
    );

    println!("Generated {} days", dataset.len());
    println!("Profiles: {}", profiles_path.display());
    println!("Prices:   {}", prices_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pumpsched_core::data::load_dataset;
    use pumpsched_core::TableOptions;

    #[test]
    fn test_generate_writes_loadable_tables() {
        let dir = tempfile::tempdir().unwrap();
        let output_dir = dir.path().join("data");
        let config_path = dir.path().join("pumpsched.toml");
        fs::write(&config_path, "").unwrap();

        run(
            GenerateArgs {
                days: 6,
                output_dir: output_dir.clone(),
                base_profiles: None,
                seed: Some(3),
            },
            Some(&config_path),
        )
        .unwrap();

        let dataset = load_dataset(
            &output_dir.join("profiles.csv"),
            &output_dir.join("prices.csv"),
            TableOptions::default(),
        )
        .unwrap();
        assert_eq!(dataset.len(), 6);
    }
}
