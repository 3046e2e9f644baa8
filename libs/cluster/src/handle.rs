//! Capability handle for the cluster under test.

use std::fmt;
use std::sync::Arc;

use crate::collaborators::{LeaseRegistry, NodeGroupScaler, NodeLister, PodLister};

/// A backend that provides every collaborator.
pub trait ClusterBackend: LeaseRegistry + NodeLister + NodeGroupScaler + PodLister {}

impl<T> ClusterBackend for T where T: LeaseRegistry + NodeLister + NodeGroupScaler + PodLister {}

/// Explicitly passed handle to the shared cluster.
///
/// Holding a handle is the scenario's only way to observe or change the
/// cluster; there is no ambient client.
#[derive(Clone)]
pub struct ClusterHandle {
    leases: Arc<dyn LeaseRegistry>,
    nodes: Arc<dyn NodeLister>,
    groups: Arc<dyn NodeGroupScaler>,
    pods: Arc<dyn PodLister>,
}

impl ClusterHandle {
    /// Build a handle from individual collaborators.
    pub fn new(
        leases: Arc<dyn LeaseRegistry>,
        nodes: Arc<dyn NodeLister>,
        groups: Arc<dyn NodeGroupScaler>,
        pods: Arc<dyn PodLister>,
    ) -> Self {
        Self {
            leases,
            nodes,
            groups,
            pods,
        }
    }

    /// Build a handle where one backend serves every collaborator.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: ClusterBackend + 'static,
    {
        Self {
            leases: backend.clone(),
            nodes: backend.clone(),
            groups: backend.clone(),
            pods: backend,
        }
    }

    pub fn leases(&self) -> &dyn LeaseRegistry {
        self.leases.as_ref()
    }

    pub fn nodes(&self) -> &dyn NodeLister {
        self.nodes.as_ref()
    }

    pub fn groups(&self) -> &dyn NodeGroupScaler {
        self.groups.as_ref()
    }

    pub fn pods(&self) -> &dyn PodLister {
        self.pods.as_ref()
    }
}

impl fmt::Debug for ClusterHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterHandle").finish_non_exhaustive()
    }
}
