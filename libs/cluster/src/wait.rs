//! Convergence waits over the cluster handle.

use std::time::Duration;

use nodelease_id::Namespace;
use nodelease_reconcile::{
    eventually, PollPolicy, ReconcileError, POD_POLL_INTERVAL, READY_NODES_POLL_INTERVAL,
};
use tracing::info;

use crate::handle::ClusterHandle;
use crate::model::NodeSet;

/// Wait until exactly `count` nodes are ready and schedulable.
///
/// Returns the snapshot that satisfied the check.
pub async fn wait_for_ready_nodes(
    cluster: &ClusterHandle,
    count: usize,
    timeout: Duration,
) -> Result<NodeSet, ReconcileError> {
    let resource = format!("{count} ready schedulable nodes");
    let policy = PollPolicy::new(timeout, READY_NODES_POLL_INTERVAL);

    let nodes = eventually(&resource, policy, || async move {
        let nodes = cluster
            .nodes()
            .list_ready_schedulable_nodes()
            .await
            .map_err(|e| format!("failed to list nodes: {e}"))?;
        if nodes.len() == count {
            Ok(nodes)
        } else {
            Err(format!("{} ready nodes, want {count}", nodes.len()))
        }
    })
    .await?;

    info!(count, "Cluster has expected number of ready nodes");
    Ok(nodes)
}

/// Wait until at least `min_pods` pods in `namespace` are running and ready,
/// with at most `allowed_not_ready` pods lagging behind.
///
/// Succeeded pods and controller-owned failed pods are ignored.
pub async fn wait_for_pods_running_ready(
    cluster: &ClusterHandle,
    namespace: &Namespace,
    min_pods: usize,
    allowed_not_ready: usize,
    timeout: Duration,
) -> Result<(), ReconcileError> {
    let resource = format!("{min_pods} running ready pods in {namespace}");
    let policy = PollPolicy::new(timeout, POD_POLL_INTERVAL);

    eventually(&resource, policy, || async move {
        let pods = cluster
            .pods()
            .list_pods(namespace)
            .await
            .map_err(|e| format!("failed to list pods in {namespace}: {e}"))?;

        let active: Vec<_> = pods
            .iter()
            .filter(|p| !p.is_ignored_for_readiness())
            .collect();
        let ready = active.iter().filter(|p| p.is_running_ready()).count();
        let not_ready = active.len() - ready;

        if ready >= min_pods && not_ready <= allowed_not_ready {
            Ok(())
        } else {
            let lagging: Vec<_> = active
                .iter()
                .filter(|p| !p.is_running_ready())
                .map(|p| p.name.as_str())
                .collect();
            Err(format!(
                "{ready}/{min_pods} pods ready in {namespace}, not ready: [{}]",
                lagging.join(", ")
            ))
        }
    })
    .await?;

    info!(%namespace, min_pods, "Pods are running and ready");
    Ok(())
}
