//! Node commands.

use anyhow::Result;
use clap::Args;
use nodelease_cluster::{LeaseRegistry, NodeLister};
use nodelease_e2e::config::LEASE_NAMESPACE_VAR;
use nodelease_id::Namespace;
use serde::Serialize;
use tabled::Tabled;
use tracing::warn;

use crate::error::CliError;
use crate::output::print_output;

use super::CommandContext;

/// List ready nodes with their lease status.
#[derive(Debug, Args)]
pub struct NodesCommand {
    /// Namespace holding node leases.
    #[arg(long, env = LEASE_NAMESPACE_VAR, default_value = "kube-node-lease")]
    lease_namespace: Namespace,
}

/// One row of node output.
#[derive(Debug, Clone, Serialize, Tabled)]
struct NodeRow {
    #[tabled(rename = "Node")]
    name: String,

    #[tabled(rename = "Lease")]
    lease: String,

    #[tabled(rename = "Renewed", display = "display_option")]
    renewed: Option<String>,
}

fn display_option(opt: &Option<String>) -> String {
    opt.clone().unwrap_or_else(|| "-".to_string())
}

impl NodesCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let client = ctx.client()?;

        let nodes = client
            .list_ready_schedulable_nodes()
            .await
            .map_err(CliError::from)?;

        let mut rows = Vec::with_capacity(nodes.len());
        for node in &nodes {
            let row = match client.get_lease(&self.lease_namespace, &node.name).await {
                Ok(Some(lease)) => NodeRow {
                    name: node.name.to_string(),
                    lease: "present".to_string(),
                    renewed: lease.renew_time.map(|t| t.to_rfc3339()),
                },
                Ok(None) => NodeRow {
                    name: node.name.to_string(),
                    lease: "missing".to_string(),
                    renewed: None,
                },
                Err(e) => {
                    warn!(node = %node.name, error = %e, "Lease lookup failed");
                    NodeRow {
                        name: node.name.to_string(),
                        lease: "unknown".to_string(),
                        renewed: None,
                    }
                }
            };
            rows.push(row);
        }

        print_output(&rows, ctx.format);
        Ok(())
    }
}
