//! CLI command modules

pub mod config;
pub mod evaluate;
pub mod generate;
pub mod optimize;
pub mod train;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use pumpsched_rl::{Checkpoint, MlpPolicy};

use crate::settings::DataConfig;

/// Table overrides shared by the commands that read a dataset
#[derive(Args, Debug, Clone, Default)]
pub struct DataArgs {
    /// Flow profile table (overrides data.profiles_path)
    #[arg(long)]
    pub profiles: Option<PathBuf>,

    /// Price table (overrides data.prices_path)
    #[arg(long)]
    pub prices: Option<PathBuf>,

    /// Negate every flow value on load
    #[arg(long)]
    pub flip_sign: bool,

    /// Tables carry a leading day-label column
    #[arg(long)]
    pub day_labels: bool,
}

impl DataArgs {
    pub fn apply(&self, data: &mut DataConfig) {
        if let Some(path) = &self.profiles {
            data.profiles_path.clone_from(path);
        }
        if let Some(path) = &self.prices {
            data.prices_path.clone_from(path);
        }
        data.flip_profile_sign |= self.flip_sign;
        data.day_label_column |= self.day_labels;
    }
}

/// Load a trained policy, or `None` with a warning when no checkpoint exists
pub fn load_policy(path: &Path) -> Result<Option<(MlpPolicy, usize)>> {
    let Some(checkpoint) = Checkpoint::load_if_present(path)
        .with_context(|| format!("Failed to read checkpoint {}", path.display()))?
    else {
        tracing::warn!("No checkpoint at {}; train a policy first", path.display());
        return Ok(None);
    };
    let epochs = checkpoint.trained_epochs;
    let policy = checkpoint
        .into_policy()
        .with_context(|| {
            format!("Checkpoint {} does not match the policy layout", path.display())
        })?;
    Ok(Some((policy, epochs)))
}
