//! CLI commands.

mod nodes;
mod run;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::client::ControlPlaneClient;
use crate::config::Config;
use crate::output::OutputFormat;

/// leasectl - Verify that node leases follow node membership.
#[derive(Debug, Parser)]
#[command(name = "leasectl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format (table or json).
    #[arg(long, global = true, default_value = "table")]
    format: String,

    /// Control plane URL, overriding the config file.
    #[arg(long, global = true, env = "NODELEASE_API_URL")]
    api_url: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the node lease scenario. Shrinks and restores a node group.
    Run(run::RunCommand),

    /// List ready nodes and whether each has a lease.
    Nodes(nodes::NodesCommand),

    /// Show CLI version.
    Version,
}

impl Cli {
    /// Whether logs should be emitted as JSON.
    pub fn log_json(&self) -> bool {
        self.log_json
    }

    /// Run the CLI command.
    pub async fn run(self) -> Result<()> {
        let format = OutputFormat::parse(&self.format);

        let mut config = Config::load()?;
        if let Some(api_url) = self.api_url {
            config.api_url = api_url;
        }

        let ctx = CommandContext { config, format };

        match self.command {
            Commands::Run(cmd) => cmd.run(ctx).await,
            Commands::Nodes(cmd) => cmd.run(ctx).await,
            Commands::Version => {
                println!("leasectl {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
        }
    }
}

/// Shared command context.
pub struct CommandContext {
    pub config: Config,
    pub format: OutputFormat,
}

impl CommandContext {
    /// Get a control plane client.
    pub fn client(&self) -> Result<ControlPlaneClient> {
        ControlPlaneClient::new(&self.config)
    }
}
