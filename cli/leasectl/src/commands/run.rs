//! Scenario run command.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use nodelease_cluster::{ClusterHandle, NodeSet};
use nodelease_e2e::config::{
    NODE_COUNT_VAR, NODE_GROUPS_VAR, PROVIDER_VAR, TUNNEL_GRACE_VAR,
};
use nodelease_e2e::{NodeLeaseScenario, ScenarioConfig, ScenarioOutcome, ScenarioReport};
use nodelease_id::NodeName;
use nodelease_testing::{SimCluster, SimConfig};
use serde::Serialize;
use tracing::info;

use crate::error::CliError;
use crate::output::{print_info, print_single, print_success, OutputFormat};

use super::CommandContext;

/// Run the node lease scenario.
#[derive(Debug, Args)]
pub struct RunCommand {
    /// Run against the built-in simulated cluster instead of the control plane.
    #[arg(long)]
    simulate: bool,

    /// Infrastructure provider (gce, gke, aws).
    #[arg(long)]
    provider: Option<String>,

    /// Comma separated node groups. Exactly one is supported.
    #[arg(long)]
    node_groups: Option<String>,

    /// Number of nodes the cluster is provisioned with.
    #[arg(long)]
    node_count: Option<u32>,

    /// Seconds to wait after restoring the group size.
    #[arg(long)]
    tunnel_grace_secs: Option<u64>,
}

/// Machine-readable run result.
#[derive(Debug, Serialize)]
struct RunSummary<'a> {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    removed: Option<&'a NodeName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    baseline: Option<&'a NodeSet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    disrupted: Option<&'a NodeSet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_pods: Option<usize>,
}

impl RunCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let config = self.scenario_config()?;

        let cluster = if self.simulate {
            let sim = simulated_cluster(&config)?;
            info!(group = %sim.group(), nodes = config.node_count, "Using simulated cluster");
            ClusterHandle::from_backend(Arc::new(sim))
        } else {
            info!(api_url = %ctx.config.api_url(), "Using control plane");
            ClusterHandle::from_backend(Arc::new(ctx.client()?))
        };

        let scenario = NodeLeaseScenario::new(config, cluster);
        info!(
            provider = %scenario.config().provider,
            nodes = scenario.config().node_count,
            "Starting node lease scenario"
        );
        let outcome = scenario.run().await.map_err(CliError::from)?;

        print_outcome(&outcome, ctx.format);
        Ok(())
    }

    /// Resolve the scenario config. Flags win over environment variables.
    fn scenario_config(&self) -> Result<ScenarioConfig> {
        let mut overrides: HashMap<&'static str, String> = HashMap::new();
        if let Some(provider) = &self.provider {
            overrides.insert(PROVIDER_VAR, provider.clone());
        }
        if let Some(groups) = &self.node_groups {
            overrides.insert(NODE_GROUPS_VAR, groups.clone());
        }
        if let Some(count) = self.node_count {
            overrides.insert(NODE_COUNT_VAR, count.to_string());
        }
        if let Some(secs) = self.tunnel_grace_secs {
            overrides.insert(TUNNEL_GRACE_VAR, secs.to_string());
        }

        let simulate = self.simulate;
        let config = ScenarioConfig::from_lookup(|var| {
            overrides
                .get(var)
                .cloned()
                .or_else(|| std::env::var(var).ok())
                .or_else(|| simulate.then(|| simulated_default(var)).flatten())
        })
        .map_err(|e| CliError::from(nodelease_e2e::ScenarioError::from(e)))?;

        Ok(config)
    }
}

/// Defaults that let `--simulate` run with no configuration at all.
fn simulated_default(var: &str) -> Option<String> {
    let default = SimConfig::default();
    match var {
        PROVIDER_VAR => Some("gce".to_string()),
        NODE_GROUPS_VAR => Some(default.group.to_string()),
        NODE_COUNT_VAR => Some(default.initial_nodes.to_string()),
        _ => None,
    }
}

/// Build a simulator matching the scenario config, with short delays.
fn simulated_cluster(config: &ScenarioConfig) -> Result<SimCluster> {
    let defaults = SimConfig::default();
    let sim_config = SimConfig {
        group: config
            .node_groups
            .first()
            .cloned()
            .unwrap_or(defaults.group),
        initial_nodes: config.node_count,
        provision_delay: Duration::from_secs(3),
        boot_delay: Duration::from_secs(2),
        lease_lag: Duration::from_secs(1),
        lease_namespace: config.lease_namespace.clone(),
        system_namespace: config.system_namespace.clone(),
        ..defaults
    };

    SimCluster::new(sim_config).context("Failed to build simulated cluster")
}

fn print_outcome(outcome: &ScenarioOutcome, format: OutputFormat) {
    match (outcome, format) {
        (ScenarioOutcome::Passed(report), OutputFormat::Table) => {
            print_success(&format!(
                "node lease for {} was deleted, {} surviving leases intact, {} system pods restored",
                report.removed,
                report.disrupted.len(),
                report.system_pods
            ));
        }
        (ScenarioOutcome::Skipped(reason), OutputFormat::Table) => {
            print_info(&format!("node lease scenario skipped: {}", reason));
        }
        (ScenarioOutcome::Passed(report), OutputFormat::Json) => {
            print_single(&passed_summary(report));
        }
        (ScenarioOutcome::Skipped(reason), OutputFormat::Json) => {
            print_single(&RunSummary {
                status: "skipped",
                reason: Some(reason.to_string()),
                removed: None,
                baseline: None,
                disrupted: None,
                system_pods: None,
            });
        }
    }
}

fn passed_summary(report: &ScenarioReport) -> RunSummary<'_> {
    RunSummary {
        status: "passed",
        reason: None,
        removed: Some(&report.removed),
        baseline: Some(&report.baseline),
        disrupted: Some(&report.disrupted),
        system_pods: Some(report.system_pods),
    }
}
