//! gcpspectre - GCP resource waste auditor
//!
//! Scans compute instances, persistent disks, static IPs, snapshots,
//! instance groups, Cloud SQL instances, firewall rules, Cloud NAT,
//! Cloud Functions, load balancers, and Pub/Sub across projects, and
//! reports estimated monthly waste in USD for each finding.

mod commands;
mod config;
mod errors;
mod output;

use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{run_init, run_scan, ScanArgs};
use errors::CliError;

/// gcpspectre finds idle, orphaned, and oversized GCP resources that cost
/// money for nothing.
#[derive(Parser)]
#[command(name = "gcpspectre", version, about = "GCP resource waste auditor")]
struct Cli {
    /// GCP project ID (repeatable)
    #[arg(long = "project", global = true)]
    projects: Vec<String>,

    /// Enable verbose logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan GCP resources for waste
    Scan(ScanArgs),

    /// Generate a sample configuration file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Print version information
    Version,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Scan(args) => run_scan(args, cli.projects, cli.verbose).await,
        Commands::Init { force } => run_init(force),
        Commands::Version => {
            println!("gcpspectre {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        match &err {
            CliError::ThresholdExceeded { severity, count } => {
                warn!(count = *count, severity = %severity, "Findings met the fail-on threshold");
            }
            _ => output::print_error(&err.to_string()),
        }
        std::process::exit(err.exit_code());
    }
}
