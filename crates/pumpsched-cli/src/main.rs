//! pumpsched CLI - train, evaluate and apply pump schedule policies
//!
//! Typical flow: `generate` (or bring your own tables), `train`, then
//! `evaluate` on the held-out days and `optimize` a single day.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::module_name_repetitions)]

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod settings;

use commands::{config, evaluate, generate, optimize, train};

#[derive(Parser)]
#[command(name = "pumpsched")]
#[command(author, version, about = "pumpsched - pump station scheduling", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to PUMPSCHED_CONFIG or ./pumpsched.toml)
    #[arg(long, global = true, env = "PUMPSCHED_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a policy on the configured tables
    Train(train::TrainArgs),

    /// Score a trained policy on held-out days
    Evaluate(evaluate::EvaluateArgs),

    /// Apply a trained policy to one day
    Optimize(optimize::OptimizeArgs),

    /// Write synthetic profile and price tables
    Generate(generate::GenerateArgs),

    /// Configuration management
    #[command(subcommand)]
    Config(config::ConfigCommands),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = if cli.verbose { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("pumpsched={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Train(args) => train::run(args, config_path),
        Commands::Evaluate(args) => evaluate::run(args, config_path),
        Commands::Optimize(args) => optimize::run(args, config_path),
        Commands::Generate(args) => generate::run(args, config_path),
        Commands::Config(cmd) => config::run(cmd, config_path),
    }
}
