//! Cluster object model.

use chrono::{DateTime, Utc};
use nodelease_id::{Namespace, NodeName};
use serde::{Deserialize, Serialize};

/// A cluster node as reported by node listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Node name, unique within the cluster.
    pub name: NodeName,

    /// Whether the node reports the Ready condition.
    pub ready: bool,

    /// Whether new workloads may be scheduled onto the node.
    pub schedulable: bool,
}

impl Node {
    /// A node that is both ready and schedulable.
    pub fn ready(name: NodeName) -> Self {
        Self {
            name,
            ready: true,
            schedulable: true,
        }
    }

    /// Returns true if the node counts towards the cluster size.
    pub fn is_ready_and_schedulable(&self) -> bool {
        self.ready && self.schedulable
    }
}

/// A node heartbeat lease. Only its existence matters to the scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    /// Node the lease belongs to. Leases are named after their node.
    pub holder: NodeName,

    /// Namespace the lease lives in.
    pub namespace: Namespace,

    /// Last renewal reported by the node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renew_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
}

/// Pod lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

/// A pod, reduced to what readiness checks need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pod {
    pub name: String,
    pub namespace: Namespace,
    pub phase: PodPhase,
    pub ready: bool,

    /// Owned by a controller (job, replica set, daemon set).
    #[serde(default)]
    pub controlled: bool,
}

impl Pod {
    /// Returns true if the pod is running and passing its readiness checks.
    pub fn is_running_ready(&self) -> bool {
        self.phase == PodPhase::Running && self.ready
    }

    /// Completed pods, and failed pods a controller will replace, are left
    /// out of readiness counts.
    pub fn is_ignored_for_readiness(&self) -> bool {
        match self.phase {
            PodPhase::Succeeded => true,
            PodPhase::Failed => self.controlled,
            _ => false,
        }
    }
}

/// Immutable snapshot of cluster membership, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NodeSet {
    nodes: Vec<Node>,
}

impl NodeSet {
    /// Capture a snapshot. Duplicate names keep the first occurrence.
    pub fn new(nodes: impl IntoIterator<Item = Node>) -> Self {
        let mut nodes: Vec<Node> = nodes.into_iter().collect();
        nodes.sort_by(|a, b| a.name.cmp(&b.name));
        nodes.dedup_by(|a, b| a.name == b.name);
        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Node names in order.
    pub fn names(&self) -> impl Iterator<Item = &NodeName> {
        self.nodes.iter().map(|n| &n.name)
    }

    pub fn contains(&self, name: &NodeName) -> bool {
        self.nodes
            .binary_search_by(|n| n.name.cmp(name))
            .is_ok()
    }

    /// Names present in `baseline` but absent from this snapshot.
    pub fn removed_since(&self, baseline: &NodeSet) -> Vec<NodeName> {
        baseline
            .names()
            .filter(|name| !self.contains(name))
            .cloned()
            .collect()
    }
}

impl FromIterator<Node> for NodeSet {
    fn from_iter<I: IntoIterator<Item = Node>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl<'a> IntoIterator for &'a NodeSet {
    type Item = &'a Node;
    type IntoIter = std::slice::Iter<'a, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}
