//! Configuration management commands

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::settings::{Config, CONFIG_FILE_NAME};

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Initialize configuration file
    Init {
        /// Where to write the file
        #[arg(long, default_value = CONFIG_FILE_NAME)]
        path: PathBuf,
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

pub fn run(cmd: ConfigCommands, config_path: Option<&Path>) -> Result<()> {
    match cmd {
        ConfigCommands::Show => show(config_path),
        ConfigCommands::Init { path, force } => init(&path, force).map(|_| ()),
    }
}

fn show(config_path: Option<&Path>) -> Result<()> {
    let source = config_path
        .map(Path::to_path_buf)
        .or_else(Config::find_config_file);
    let config = Config::load(config_path)?;

    println!("Current Configuration");
    println!("=====================\n");
    match source {
        Some(path) => println!("# Config file: {}", path.display()),
        None => println!("# No configuration file found. Using defaults."),
    }
    println!("# Environment overrides: PUMPSCHED__<SECTION>__<KEY>\n");
    println!("{}", config.to_toml()?);
    Ok(())
}

/// Returns whether the file was written
fn init(path: &Path, force: bool) -> Result<bool> {
    if path.exists() && !force {
        println!("Configuration file already exists: {}", path.display());
        println!("Use --force to overwrite");
        return Ok(false);
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let rendered = Config::default().to_toml()?;
    fs::write(path, rendered).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Configuration written to {}", path.display());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join(CONFIG_FILE_NAME);

        assert!(init(&path, false).unwrap());
        fs::write(&path, "[training]\nepochs = 5\n").unwrap();

        assert!(!init(&path, false).unwrap());
        assert_eq!(Config::load(Some(&path)).unwrap().training.epochs, 5);

        assert!(init(&path, true).unwrap());
        assert_eq!(Config::load(Some(&path)).unwrap().training.epochs, 100);
    }
}
