//! Tank Combat - Development Tools

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tank_tools::simulate::{run_scenario, RunOptions};
use tank_tools::validate::{load_scenario, validate_data_directory};
use tank_tools::{ToolError, ToolResult};

#[derive(Parser)]
#[command(name = "tank-tools")]
#[command(about = "Development tools for the tank combat core")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate loadout and scenario files
    Validate {
        /// RON file, or directory searched recursively
        #[arg(default_value = "assets/data")]
        path: PathBuf,
    },

    /// Run a scenario headlessly and report the outcome as JSON
    Simulate {
        /// Scenario file to run
        scenario: PathBuf,

        /// Tick budget (defaults to the scenario's duration)
        #[arg(long)]
        ticks: Option<u64>,

        /// Override the scenario's seed
        #[arg(long)]
        seed: Option<u64>,

        /// Write the report here instead of stdout
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

fn main() {
    // Logs go to stderr so stdout stays clean for reports
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { path } => cmd_validate(&path),
        Commands::Simulate {
            scenario,
            ticks,
            seed,
            report,
        } => cmd_simulate(&scenario, RunOptions { ticks, seed }, report.as_deref()),
    };

    if let Err(e) = result {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

fn cmd_validate(path: &Path) -> ToolResult<()> {
    tracing::info!("Validating data files in: {}", path.display());
    let summary = validate_data_directory(path)?;
    for (file, error) in &summary.failures {
        eprintln!("FAIL {}: {error}", file.display());
    }
    if summary.is_ok() {
        tracing::info!("Validation passed");
        Ok(())
    } else {
        tracing::error!("Validation failed: {} of {} files", summary.failures.len(), summary.checked());
        std::process::exit(1);
    }
}

fn cmd_simulate(path: &Path, options: RunOptions, report_path: Option<&Path>) -> ToolResult<()> {
    let scenario = load_scenario(path)?;
    let report = run_scenario(&scenario, options).map_err(|source| ToolError::Invalid {
        path: path.to_path_buf(),
        source,
    })?;
    let json = serde_json::to_string_pretty(&report)?;

    match report_path {
        Some(out) => {
            std::fs::write(out, json).map_err(|source| ToolError::Io {
                path: out.to_path_buf(),
                source,
            })?;
            tracing::info!("Report written to {}", out.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
