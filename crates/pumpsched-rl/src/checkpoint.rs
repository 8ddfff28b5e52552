//! JSON checkpoints of trained policy parameters

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use ndarray::ArrayD;
use pumpsched_core::{Result, SchedError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::policy::{MlpPolicy, PolicyConfig};

/// Bumped whenever the parameter layout changes
pub const CHECKPOINT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub format_version: u32,
    pub policy: PolicyConfig,
    pub tensors: Vec<ArrayD<f64>>,
    pub trained_epochs: usize,
    pub saved_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn from_policy(policy: &MlpPolicy, trained_epochs: usize) -> Self {
        Self {
            format_version: CHECKPOINT_FORMAT_VERSION,
            policy: policy.config().clone(),
            tensors: policy.tensors(),
            trained_epochs,
            saved_at: Utc::now(),
        }
    }

    /// Rebuild the policy, validating every tensor shape
    pub fn into_policy(self) -> Result<MlpPolicy> {
        MlpPolicy::from_tensors(self.policy, self.tensors)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(self)?;
        fs::write(path, json)?;
        info!("Checkpoint saved to {} ({} epochs)", path.display(), self.trained_epochs);
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SchedError::CheckpointMissing(path.to_path_buf()));
        }
        let text = fs::read_to_string(path)?;
        let checkpoint: Self = serde_json::from_str(&text)?;
        if checkpoint.format_version != CHECKPOINT_FORMAT_VERSION {
            return Err(SchedError::Checkpoint(format!(
                "unsupported format version {} (expected {})",
                checkpoint.format_version, CHECKPOINT_FORMAT_VERSION
            )));
        }
        debug!(
            "Loaded checkpoint from {} saved at {}",
            path.display(),
            checkpoint.saved_at
        );
        Ok(checkpoint)
    }

    /// `Ok(None)` when nothing exists at `path`
    pub fn load_if_present(path: &Path) -> Result<Option<Self>> {
        match Self::load(path) {
            Ok(checkpoint) => Ok(Some(checkpoint)),
            Err(e) if e.is_missing_checkpoint() => Ok(None),
            Err(e) => Err(e),
        }
    }
}
