//! fleetd — the fleet autoscaler daemon.
//!
//! Single binary that assembles:
//! - Validated fleet configuration (TOML)
//! - In-memory sample store, fed over the API
//! - Simulated capacity executor
//! - Alert sinks (log + in-memory ring for the API)
//! - One reconciliation worker per managed service
//! - REST API + Prometheus exposition
//!
//! # Usage
//!
//! ```text
//! fleetd run --config fleet.toml --port 8080
//! fleetd validate --config fleet.toml
//! ```

mod daemon;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use fleet_core::FleetConfig;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,fleetd=debug,fleet=debug";

#[derive(Parser)]
#[command(name = "fleetd", about = "Fleet capacity autoscaler daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the controller and the API server until interrupted.
    Run {
        /// Path to the fleet configuration file.
        #[arg(long, default_value = "fleet.toml")]
        config: PathBuf,

        /// Port for the API server.
        #[arg(long, default_value = "8080")]
        port: u16,

        /// Emit logs as JSON lines.
        #[arg(long)]
        log_json: bool,
    },
    /// Load and validate a configuration file, then exit.
    Validate {
        /// Path to the fleet configuration file.
        #[arg(long, default_value = "fleet.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            port,
            log_json,
        } => {
            init_tracing(log_json);
            daemon::run(&config, port).await
        }
        Command::Validate { config } => {
            init_tracing(false);
            validate(&config)
        }
    }
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn validate(path: &Path) -> anyhow::Result<()> {
    let config = FleetConfig::from_file(path)?;
    println!(
        "{}: {} services, {} overrides",
        path.display(),
        config.services.len(),
        config.overrides.len()
    );
    for line in config.precedence_summary() {
        println!("  {line}");
    }
    Ok(())
}
