//! Single-day schedule optimization command

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use pumpsched_core::synthetic::{BASE_FLOW_PROFILE, BASE_PRICE_SHAPE};
use pumpsched_core::{DayProfile, PriceSeries};
use pumpsched_rl::{optimize_day, ScheduleReport};

use super::{load_policy, DataArgs};
use crate::settings::Config;

#[derive(Args, Debug)]
pub struct OptimizeArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Checkpoint to apply (overrides output.checkpoint_path)
    #[arg(short, long)]
    pub checkpoint: Option<PathBuf>,

    /// Day index within the tables
    #[arg(short, long, default_value_t = 0)]
    pub day: usize,

    /// Use the built-in sample day instead of the tables
    #[arg(long, conflicts_with = "day")]
    pub sample: bool,

    /// Write the hourly plan as CSV
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn run(args: OptimizeArgs, config_path: Option<&Path>) -> Result<()> {
    let mut config = Config::load(config_path)?;
    args.data.apply(&mut config.data);
    let checkpoint_path = args
        .checkpoint
        .clone()
        .unwrap_or_else(|| config.output.checkpoint_path.clone());

    let Some((policy, _)) = load_policy(&checkpoint_path)? else {
        return Ok(());
    };

    let (profile, prices) = select_day(&args, &config)?;
    let report = optimize_day(&policy, &profile, &prices, &config.balance_tracker())?;
    report.log();
    print_plan(&report);

    if let Some(path) = &args.output {
        report
            .write_csv(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("\nPlan written to {}", path.display());
    }
    Ok(())
}

fn select_day(args: &OptimizeArgs, config: &Config) -> Result<(DayProfile, PriceSeries)> {
    if args.sample {
        return Ok((
            DayProfile::new(BASE_FLOW_PROFILE.to_vec())?,
            PriceSeries::new(BASE_PRICE_SHAPE.to_vec())?,
        ));
    }
    let dataset = config.data.load()?;
    let (profile, prices) = dataset.day(args.day).with_context(|| {
        format!("Day {} out of range; the tables hold {} days", args.day, dataset.len())
    })?;
    Ok((DayProfile::new(profile.to_vec())?, PriceSeries::new(prices.to_vec())?))
}

fn print_plan(report: &ScheduleReport) {
    println!(
        "{:<6} {:>12} {:>12} {:>10} {:>10}",
        "HOUR", "ORIGINAL", "OPTIMIZED", "PRICE", "ADJ %"
    );
    println!("{}", "-".repeat(54));
    for hour in &report.hours {
        println!(
            "{:<6} {:>12.3} {:>12.3} {:>10.2} {:>+10.1}",
            hour.hour, hour.original_flow, hour.optimized_flow, hour.price, hour.adjustment_pct
        );
    }
    println!("{}", "-".repeat(54));
    println!("Cost savings:        {:>8.2}%", report.cost_savings_pct);
    println!("Mean |adjustment|:   {:>8.2}%", report.mean_abs_adjustment_pct);
    println!("Max increase:        {:>8.2}%", report.max_increase_pct);
    println!("Max decrease:        {:>8.2}%", report.max_decrease_pct);
    println!("Balance error:       {:>8.2}%", report.balance_error_pct);
    println!("Balance violation:   {:>8.4}", report.violation);
}
