//! leasectl - node lease lifecycle scenario runner
//!
//! Runs the disruptive node lease scenario against a control plane (or the
//! built-in simulator) and inspects node and lease state.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod client;
mod commands;
mod config;
mod error;
mod output;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    if cli.log_json() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    if let Err(e) = cli.run().await {
        error::print_error(&e);
        std::process::exit(error::exit_code(&e));
    }

    Ok(())
}
