//! # facetkit CLI
//!
//! Command-line interface for validating facet configurations and replaying
//! scripted navigation sessions against a facet.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "facetkit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate a console configuration
    Check {
        /// Path to the configuration file
        config: PathBuf,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Replay a scripted session against one facet
    Simulate {
        /// Path to the configuration file
        config: PathBuf,

        /// Facet to drive (`name` or `entity/name`)
        #[arg(long)]
        facet: String,

        /// Script of steps to replay
        #[arg(long)]
        script: PathBuf,

        /// Container the facet mounts into
        #[arg(long, default_value = "main")]
        container: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries command output
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(if cli.verbose {
                tracing::Level::DEBUG.into()
            } else {
                tracing::Level::INFO.into()
            }),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Check { config, json } => commands::check_config(&config, json),
        Commands::Simulate {
            config,
            facet,
            script,
            container,
        } => commands::simulate(&config, &facet, &script, &container),
    }
}
