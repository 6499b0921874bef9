//! netdiff - CLI entry point

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use netdiff::query::QueryEngine;
use netdiff::{AnalysisContext, Config};

#[derive(Parser)]
#[command(name = "netdiff")]
#[command(about = "Analyze pre/post change captures from network devices")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a capture directory and print a change summary
    Analyze {
        /// Directory containing one subdirectory per device
        dir: PathBuf,
        /// Masking profile (minimal, standard, strict, all)
        #[arg(long)]
        profile: Option<String>,
        /// Print statistics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Analyze a capture directory and answer a question about it
    Ask {
        /// Directory containing one subdirectory per device
        dir: PathBuf,
        /// Question, e.g. "what interfaces went down?"
        question: String,
        /// Masking profile (minimal, standard, strict, all)
        #[arg(long)]
        profile: Option<String>,
    },

    /// List devices from an analyzed capture directory
    Devices {
        /// Directory containing one subdirectory per device
        dir: PathBuf,
        /// Only show devices with changes
        #[arg(long)]
        changed: bool,
    },

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Show the configuration file path
    Path,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze { dir, profile, json } => cmd_analyze(&dir, profile.as_deref(), json),
        Commands::Ask {
            dir,
            question,
            profile,
        } => cmd_ask(&dir, &question, profile.as_deref()),
        Commands::Devices { dir, changed } => cmd_devices(&dir, changed),
        Commands::Config(cmd) => match cmd {
            ConfigCommands::Show => cmd_config_show(),
            ConfigCommands::Path => cmd_config_path(),
        },
    }
}

fn cmd_analyze(dir: &Path, profile: Option<&str>, json: bool) -> Result<()> {
    let ctx = AnalysisContext::new(Config::load()?);
    let session = ctx.analyze(dir, profile)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&session.statistics())?);
        return Ok(());
    }

    let engine = QueryEngine::new(&session.captures, &session.device_diffs);
    println!("{}", engine.change_summary().summary);

    let stats = session.statistics();
    println!();
    println!(
        "{} device(s), {} command(s), {} command(s) changed",
        stats.total_devices, stats.total_commands, stats.commands_with_changes
    );
    Ok(())
}

fn cmd_ask(dir: &Path, question: &str, profile: Option<&str>) -> Result<()> {
    let ctx = AnalysisContext::new(Config::load()?);
    let session = ctx.analyze(dir, profile)?;

    let engine = QueryEngine::new(&session.captures, &session.device_diffs);
    let result = engine.query(question)?;
    println!("{}", result.summary);
    Ok(())
}

fn cmd_devices(dir: &Path, changed_only: bool) -> Result<()> {
    let ctx = AnalysisContext::new(Config::load()?);
    let session = ctx.analyze(dir, None)?;

    for device in session.devices.values() {
        if changed_only && device.commands_with_changes == 0 {
            continue;
        }
        println!(
            "{}  {}  ({}/{} commands changed)",
            device.hostname,
            device.status.as_str(),
            device.commands_with_changes,
            device.total_commands
        );
    }
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config = Config::load()?;
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn cmd_config_path() -> Result<()> {
    println!("{}", Config::config_path()?.display());
    Ok(())
}
