//! missionfsm - check, export and simulate mission state machines.

mod commands;
mod config;

use clap::{Parser, Subcommand};
use colored::Colorize;
use config::Config;
use missionfsm_core::CoreError;
use missionfsm_mission::MissionError;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "missionfsm")]
#[command(about = "Hierarchical state machines for AUV missions", version)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, env = "MISSIONFSM_CONFIG")]
    config: Option<PathBuf>,

    /// Log every engine step
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load a rulebook and validate the resulting machine
    Check {
        /// Rulebook file
        rulebook: PathBuf,
        /// Machine name (defaults to the file stem)
        #[arg(short, long)]
        name: Option<String>,
        /// Use bare INIT/ABORTED/DONE lifecycle names
        #[arg(long)]
        plain: bool,
    },

    /// Print the normalised rendering of a rulebook
    Export {
        /// Rulebook file
        rulebook: PathBuf,
    },

    /// Write the Graphviz diagram of a rulebook machine
    Diagram {
        /// Rulebook file
        rulebook: PathBuf,
        /// Machine name (defaults to the file stem)
        #[arg(short, long)]
        name: Option<String>,
        /// Use bare INIT/ABORTED/DONE lifecycle names
        #[arg(long)]
        plain: bool,
        /// Output directory
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Run a reach mission against scripted perception
    Simulate {
        /// Mission instance name
        #[arg(long, default_value = "gate")]
        name: String,
        /// Camera the target is seen with
        #[arg(long, default_value = "front")]
        camera: String,
        /// Object to reach
        #[arg(short, long, default_value = "gate")]
        target: String,
        /// Visibility checks that miss the target before it is found
        #[arg(long, default_value_t = 0)]
        visible_after: usize,
        /// Approach on which the target is reached
        #[arg(long, default_value_t = 1)]
        arrive_after: usize,
        /// Obstacle to avoid before each approach (repeatable)
        #[arg(long)]
        avoid: Vec<String>,
        /// Keep the configured settle and arrival delays
        #[arg(long)]
        realtime: bool,
    },

    /// Print the effective configuration
    Config,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    };
    if cli.verbose {
        config.engine.verbose = true;
    }

    match commands::execute(&config, cli.command) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            match error_code(e.as_ref()) {
                Some(code) => eprintln!("{} [{}]: {}", "Error".red(), code.yellow(), e),
                None => eprintln!("{}: {}", "Error".red(), e),
            }
            std::process::exit(1);
        }
    }
}

fn error_code(e: &(dyn std::error::Error + 'static)) -> Option<&'static str> {
    if let Some(e) = e.downcast_ref::<CoreError>() {
        return Some(e.error_code());
    }
    e.downcast_ref::<MissionError>().map(MissionError::error_code)
}
