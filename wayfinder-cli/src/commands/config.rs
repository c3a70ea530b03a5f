//! Configuration management commands.

use std::path::Path;

use clap::Subcommand;
use console::style;
use wayfinder::config::{config_file_path, ensure_exists, WayfinderConfig};

use super::common::load_config;
use crate::error::CliError;

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the config file path
    Path,

    /// Create the config file with defaults if it doesn't exist
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the effective configuration
    Show,
}

/// Run a config subcommand against `path`, or the default location.
pub fn run(action: ConfigAction, path: Option<&Path>) -> Result<(), CliError> {
    let target = path.map(Path::to_path_buf).unwrap_or_else(config_file_path);

    match action {
        ConfigAction::Path => {
            println!("{}", target.display());
        }
        ConfigAction::Init { force } => init(&target, force)?,
        ConfigAction::Show => show(&load_config(Some(target.as_path()))?, &target),
    }
    Ok(())
}

fn init(target: &Path, force: bool) -> Result<(), CliError> {
    if force {
        WayfinderConfig::default().save_to(target)?;
    } else if !ensure_exists(target)? {
        println!(
            "Config already exists at {} (use --force to overwrite)",
            target.display()
        );
        return Ok(());
    }
    println!("{} {}", style("Created").green(), target.display());
    Ok(())
}

fn show(config: &WayfinderConfig, source: &Path) {
    let origin = if source.exists() { "" } else { " (defaults)" };
    println!("{}{}", style(source.display()).bold(), origin);

    println!("[proxy]");
    println!("  base_url = {}", config.proxy.base_url);
    println!("  timeout_secs = {}", config.proxy.timeout_secs);
    println!("[cache]");
    println!("  max_size = {}", config.cache.max_size);
    println!("  ttl_secs = {}", config.cache.ttl_secs);
    println!("[geolocation]");
    println!("  initial_timeout_ms = {}", config.geolocation.initial_timeout_ms);
    println!("  timeout_step_ms = {}", config.geolocation.timeout_step_ms);
    println!("  max_timeout_ms = {}", config.geolocation.max_timeout_ms);
    println!("  excellent_window_ms = {}", config.geolocation.excellent_window_ms);
    println!("[status]");
    println!("  dismiss_ms = {}", config.status.dismiss_ms);
    println!("[logging]");
    match &config.logging.directory {
        Some(dir) => println!("  directory = {}", dir.display()),
        None => println!("  directory = (stdout only)"),
    }
    println!("  file = {}", config.logging.file);
}
