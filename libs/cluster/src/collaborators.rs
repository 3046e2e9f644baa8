//! Collaborator interfaces.
//!
//! The scenario never reconciles anything itself. It reads leases, nodes and
//! pods and asks a node group to change size, all through these traits.

use std::time::Duration;

use async_trait::async_trait;
use nodelease_id::{GroupName, Namespace, NodeName};
use nodelease_reconcile::{eventually, PollPolicy, ReconcileError, GROUP_RESIZE_POLL_INTERVAL};
use tracing::info;

use crate::error::ClusterError;
use crate::model::{Lease, NodeSet, Pod};

/// Keyed lookup of node leases.
#[async_trait]
pub trait LeaseRegistry: Send + Sync {
    /// Fetch the lease named after `node`. Absence is `Ok(None)`.
    async fn get_lease(
        &self,
        namespace: &Namespace,
        node: &NodeName,
    ) -> Result<Option<Lease>, ClusterError>;
}

/// Authoritative node count oracle.
#[async_trait]
pub trait NodeLister: Send + Sync {
    /// Nodes that are both ready and schedulable.
    async fn list_ready_schedulable_nodes(&self) -> Result<NodeSet, ClusterError>;
}

/// An externally managed pool of compute instances.
///
/// `resize` records intent; `wait_for_size` observes convergence. Callers
/// always pair the two.
#[async_trait]
pub trait NodeGroupScaler: Send + Sync {
    /// Request a new target size.
    async fn resize(&self, group: &GroupName, size: u32) -> Result<(), ClusterError>;

    /// Number of instances currently running in the group.
    async fn group_size(&self, group: &GroupName) -> Result<u32, ClusterError>;

    /// Block until the group reports `size` instances or `timeout` elapses.
    async fn wait_for_size(
        &self,
        group: &GroupName,
        size: u32,
        timeout: Duration,
    ) -> Result<(), ReconcileError> {
        let resource = format!("node group {group} to reach size {size}");
        let policy = PollPolicy::new(timeout, GROUP_RESIZE_POLL_INTERVAL);

        eventually(&resource, policy, || async move {
            match self.group_size(group).await {
                Ok(current) if current == size => Ok(()),
                Ok(current) => Err(format!("group {group} has size {current}, want {size}")),
                Err(e) => Err(format!("failed to read size of group {group}: {e}")),
            }
        })
        .await?;

        info!(%group, size, "Node group reached target size");
        Ok(())
    }
}

/// Pod listing by namespace.
#[async_trait]
pub trait PodLister: Send + Sync {
    async fn list_pods(&self, namespace: &Namespace) -> Result<Vec<Pod>, ClusterError>;
}
