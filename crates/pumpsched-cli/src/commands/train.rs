//! Policy training command

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use pumpsched_rl::{Checkpoint, EvaluationReport, MlpPolicy, TrainingReport};
use serde::Serialize;
use tracing::info;

use super::{load_policy, DataArgs};
use crate::settings::Config;

#[derive(Args, Debug)]
pub struct TrainArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Number of epochs (overrides training.epochs)
    #[arg(short, long)]
    pub epochs: Option<usize>,

    /// Days per batch (overrides training.batch_size)
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Initial learning rate (overrides training.learning_rate)
    #[arg(long)]
    pub learning_rate: Option<f64>,

    /// Seed for parameter init and batch shuffling
    #[arg(long)]
    pub seed: Option<u64>,

    /// Checkpoint to write (overrides output.checkpoint_path)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Continue from the existing checkpoint instead of a fresh policy
    #[arg(long)]
    pub resume: bool,
}

impl TrainArgs {
    fn apply(&self, config: &mut Config) {
        self.data.apply(&mut config.data);
        if let Some(epochs) = self.epochs {
            config.training.epochs = epochs;
        }
        if let Some(batch_size) = self.batch_size {
            config.training.batch_size = batch_size;
        }
        if let Some(learning_rate) = self.learning_rate {
            config.training.learning_rate = learning_rate;
        }
        if let Some(seed) = self.seed {
            config.training.seed = seed;
            config.policy.seed = seed;
        }
        if let Some(path) = &self.output {
            config.output.checkpoint_path.clone_from(path);
        }
    }
}

/// Written next to the checkpoint after every run
#[derive(Debug, Serialize)]
struct RunSummary<'a> {
    train_days: usize,
    held_out_days: usize,
    trained_epochs: usize,
    training: &'a TrainingReport,
    held_out: Option<EvaluationReport>,
}

pub fn run(args: TrainArgs, config_path: Option<&Path>) -> Result<()> {
    let mut config = Config::load(config_path)?;
    args.apply(&mut config);

    let dataset = config.data.load()?;
    let (train, held_out) = dataset.split(config.data.train_fraction);
    info!(
        "Split {} days into {} training and {} held-out",
        dataset.len(),
        train.len(),
        held_out.len()
    );

    let checkpoint_path = config.output.checkpoint_path.clone();
    let resumed = if args.resume {
        load_policy(&checkpoint_path)?
    } else {
        None
    };
    let (mut policy, previous_epochs) = match resumed {
        Some((policy, epochs)) => {
            info!("Resuming from {} after {} epochs", checkpoint_path.display(), epochs);
            (policy, epochs)
        }
        None => (
            MlpPolicy::new(config.policy.clone()).context("Invalid policy configuration")?,
            0,
        ),
    };

    let trainer = config.trainer()?;
    let report = trainer
        .train_from(&mut policy, &train, previous_epochs)
        .context("Training failed")?;
    let trained_epochs = previous_epochs + report.epochs.len();

    Checkpoint::from_policy(&policy, trained_epochs)
        .save(&checkpoint_path)
        .with_context(|| format!("Failed to save checkpoint {}", checkpoint_path.display()))?;

    let held_out_report = if held_out.is_empty() {
        info!("No held-out days; skipping evaluation");
        None
    } else {
        let evaluation = config.evaluator().evaluate(&policy, &held_out)?;
        evaluation.log();
        Some(evaluation)
    };

    let summary = RunSummary {
        train_days: train.len(),
        held_out_days: held_out.len(),
        trained_epochs,
        training: &report,
        held_out: held_out_report,
    };
    write_summary(&config.output.report_path, &summary)?;

    println!("Training complete");
    println!("{}", "=".repeat(40));
    println!("Epochs:            {}", report.epochs.len());
    println!("Optimizer steps:   {}", report.optimizer_steps);
    println!("Skipped batches:   {}", report.skipped_batches());
    if let Some(last) = report.last() {
        println!("Final loss:        {:.4}", last.loss);
        println!("Final violation:   {:.4}", last.violation);
    }
    if let Some(evaluation) = &summary.held_out {
        println!("Held-out savings:  {:.2}%", evaluation.mean_savings_pct);
        println!("Held-out violation:{:>8.4}", evaluation.mean_violation);
    }
    println!("Checkpoint:        {}", checkpoint_path.display());

    Ok(())
}

fn write_summary(path: &Path, summary: &RunSummary<'_>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(summary)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Training summary written to {}", path.display());
    Ok(())
}
