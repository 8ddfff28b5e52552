//! Held-out evaluation command

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use pumpsched_rl::{EvaluationReport, ZeroPolicy};
use tracing::{info, warn};

use super::{load_policy, DataArgs};
use crate::settings::Config;

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Checkpoint to evaluate (overrides output.checkpoint_path)
    #[arg(short, long)]
    pub checkpoint: Option<PathBuf>,

    /// Score every day instead of the held-out split
    #[arg(long)]
    pub all: bool,

    /// Also score the all-zero baseline
    #[arg(long)]
    pub baseline: bool,
}

pub fn run(args: EvaluateArgs, config_path: Option<&Path>) -> Result<()> {
    let mut config = Config::load(config_path)?;
    args.data.apply(&mut config.data);
    let checkpoint_path = args
        .checkpoint
        .unwrap_or_else(|| config.output.checkpoint_path.clone());

    let Some((policy, epochs)) = load_policy(&checkpoint_path)? else {
        return Ok(());
    };
    info!("Evaluating policy trained for {} epochs", epochs);

    let dataset = config.data.load()?;
    let days = if args.all {
        dataset
    } else {
        dataset.split(config.data.train_fraction).1
    };
    if days.is_empty() {
        warn!("No days to evaluate; lower data.train_fraction or pass --all");
        return Ok(());
    }

    let evaluator = config.evaluator();
    let report = evaluator.evaluate(&policy, &days)?;
    report.log();

    let baseline = if args.baseline {
        Some(evaluator.evaluate(&ZeroPolicy, &days)?)
    } else {
        None
    };

    print_report(&report, baseline.as_ref());
    Ok(())
}

fn print_report(policy: &EvaluationReport, baseline: Option<&EvaluationReport>) {
    println!("Evaluation over {} days", policy.days);
    println!("{}", "=".repeat(56));
    println!("{:<32} {:>10} {:>12}", "METRIC", "POLICY", "BASELINE");
    println!("{}", "-".repeat(56));

    let rows: [(&str, fn(&EvaluationReport) -> f64); 7] = [
        ("Cost savings (%)", |r| r.mean_savings_pct),
        ("Mean |adjustment| (%)", |r| r.mean_abs_adjustment_pct),
        ("Expensive-hour adjustment (%)", |r| r.expensive_hour_adjustment_pct),
        ("Cheap-hour adjustment (%)", |r| r.cheap_hour_adjustment_pct),
        ("Hourly change (%)", |r| r.hourly_change_pct),
        ("Balance violation", |r| r.mean_violation),
        ("Reward", |r| r.mean_reward),
    ];
    for (label, metric) in rows {
        let reference = baseline.map_or_else(|| "-".to_string(), |b| format!("{:.4}", metric(b)));
        println!("{label:<32} {:>10.4} {reference:>12}", metric(policy));
    }
}
