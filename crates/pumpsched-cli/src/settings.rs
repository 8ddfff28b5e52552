//! Configuration loading for the pumpsched CLI

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{ConfigBuilder, Environment, File};
use pumpsched_core::data::load_dataset;
use pumpsched_core::synthetic::SyntheticConfig;
use pumpsched_core::{Dataset, TableOptions};
use pumpsched_rl::{
    BalanceTracker, Evaluator, PolicyConfig, RewardConfig, RewardEvaluator, Trainer,
    TrainingConfig, ViolationConfig,
};
use serde::{Deserialize, Serialize};

/// Name of the configuration file looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "pumpsched.toml";

/// Effective configuration: file, then `PUMPSCHED__SECTION__KEY` variables
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data: DataConfig,
    pub training: TrainingConfig,
    pub policy: PolicyConfig,
    pub violation: ViolationConfig,
    pub reward: RewardConfig,
    pub synthetic: SyntheticConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub profiles_path: PathBuf,
    pub prices_path: PathBuf,
    /// Tables carry a leading day-label column
    pub day_label_column: bool,
    /// Negate every flow value on load
    pub flip_profile_sign: bool,
    /// Leading share of days used for training; the rest is held out
    pub train_fraction: f64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            profiles_path: PathBuf::from("data/profiles.csv"),
            prices_path: PathBuf::from("data/prices.csv"),
            day_label_column: false,
            flip_profile_sign: false,
            train_fraction: 0.8,
        }
    }
}

impl DataConfig {
    pub fn table_options(&self) -> TableOptions {
        TableOptions {
            day_label_column: self.day_label_column,
        }
    }

    /// Load both tables, applying the configured sign flip
    pub fn load(&self) -> Result<Dataset> {
        let dataset = load_dataset(&self.profiles_path, &self.prices_path, self.table_options())
            .with_context(|| {
                format!(
                    "Failed to load dataset from {} and {}",
                    self.profiles_path.display(),
                    self.prices_path.display()
                )
            })?;
        if self.flip_profile_sign {
            tracing::info!("Flipping profile sign");
            Ok(dataset.with_flipped_profiles())
        } else {
            Ok(dataset)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub checkpoint_path: PathBuf,
    /// JSON summary written after training
    pub report_path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            checkpoint_path: PathBuf::from("models/policy.json"),
            report_path: PathBuf::from("models/training_report.json"),
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// An explicit path must exist; otherwise the usual locations are searched.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config_path = match explicit {
            Some(path) => {
                anyhow::ensure!(path.exists(), "Config file not found: {}", path.display());
                Some(path.to_path_buf())
            }
            None => Self::find_config_file(),
        };

        let mut builder = ConfigBuilder::<config::builder::DefaultState>::default();

        if let Some(path) = &config_path {
            tracing::debug!("Loading config from: {:?}", path);
            builder = builder.add_source(File::from(path.clone()).required(false));
        } else {
            tracing::debug!("No config file found, using defaults");
        }

        // PUMPSCHED__TRAINING__EPOCHS=50 overrides training.epochs
        builder = builder.add_source(
            Environment::with_prefix("PUMPSCHED")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Find the configuration file
    pub fn find_config_file() -> Option<PathBuf> {
        // Check in order: PUMPSCHED_CONFIG env, ./pumpsched.toml,
        // ~/.config/pumpsched/pumpsched.toml
        if let Ok(path) = std::env::var("PUMPSCHED_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return Some(local);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".config").join("pumpsched").join(CONFIG_FILE_NAME);
            if user_config.exists() {
                return Some(user_config);
            }
        }

        None
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    pub fn reward_evaluator(&self) -> RewardEvaluator {
        RewardEvaluator::new(self.reward.clone())
    }

    pub fn balance_tracker(&self) -> BalanceTracker {
        BalanceTracker::new(self.violation.clone())
    }

    pub fn evaluator(&self) -> Evaluator {
        Evaluator::new(self.reward_evaluator(), self.balance_tracker())
    }

    pub fn trainer(&self) -> Result<Trainer> {
        Trainer::new(
            self.training.clone(),
            self.reward_evaluator(),
            self.balance_tracker(),
        )
        .context("Invalid training configuration")
    }
}
