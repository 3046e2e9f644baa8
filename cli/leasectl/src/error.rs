//! Error handling and display for the CLI.

use colored::Colorize;
use nodelease_cluster::ClusterError;
use nodelease_e2e::ScenarioError;
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Cluster(#[from] ClusterError),

    #[error("node lease scenario failed: {0}")]
    Scenario(#[from] ScenarioError),
}

/// Process exit code for an error: 2 when the run or the shared cluster is
/// compromised, 1 for an ordinary failure.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<CliError>() {
        Some(CliError::Scenario(e)) if e.is_fatal() => 2,
        _ => 1,
    }
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {}", "Error:".red().bold(), err);

    // Check for specific error types and provide hints
    if let Some(cli_err) = err.downcast_ref::<CliError>() {
        match cli_err {
            CliError::Scenario(ScenarioError::Restore { .. }) => {
                eprintln!(
                    "\n{}",
                    "Hint: The cluster was not restored. Restore the node group before running other scenarios."
                        .yellow()
                );
            }
            CliError::Scenario(ScenarioError::Config(_)) => {
                eprintln!(
                    "\n{}",
                    "Hint: Configure exactly one node group with --node-groups or NODELEASE_NODE_GROUPS."
                        .yellow()
                );
            }
            CliError::Cluster(e) if e.is_transient() => {
                eprintln!(
                    "\n{}",
                    "Hint: Check your network connection and API endpoint.".yellow()
                );
            }
            CliError::Cluster(ClusterError::Api { status: 401, .. }) => {
                eprintln!(
                    "\n{}",
                    "Hint: Set NODELEASE_API_TOKEN or add a token to the config file.".yellow()
                );
            }
            _ => {}
        }
    }
}
