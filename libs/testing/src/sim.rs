//! Simulated cluster backend.
//!
//! The simulator models three independent loops the real system runs:
//!
//! - **Group manager**: applies a resize `provision_delay` after it is requested
//! - **Node boot**: a joined node turns ready after `boot_delay`
//! - **Lease controller**: creates a lease `lease_lag` after a node joins and
//!   garbage collects it `lease_lag` after the node leaves
//!
//! State advances lazily whenever a collaborator method is called.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use nodelease_cluster::{
    ClusterError, Lease, LeaseRegistry, Node, NodeGroupScaler, NodeLister, NodeSet, Pod,
    PodLister, PodPhase,
};
use nodelease_id::{GroupName, NameError, Namespace, NodeName};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

/// Simulator configuration.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// The single node group backing the cluster.
    pub group: GroupName,

    /// Prefix for generated node names (`{prefix}-{index}`).
    pub node_prefix: NodeName,

    /// Nodes present (ready, with leases) when the simulator starts.
    pub initial_nodes: u32,

    /// Delay between a resize request and instances joining or leaving.
    pub provision_delay: Duration,

    /// Delay between a node joining and reporting ready.
    pub boot_delay: Duration,

    /// Delay between a node change and the lease controller reacting.
    pub lease_lag: Duration,

    /// System pods not bound to any node.
    pub control_plane_pods: usize,

    pub lease_namespace: Namespace,
    pub system_namespace: Namespace,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            group: GroupName::parse("sim-group").expect("static name is valid"),
            node_prefix: NodeName::parse("sim-node").expect("static name is valid"),
            initial_nodes: 3,
            provision_delay: Duration::from_secs(30),
            boot_delay: Duration::from_secs(20),
            lease_lag: Duration::from_secs(10),
            control_plane_pods: 3,
            lease_namespace: Namespace::node_lease(),
            system_namespace: Namespace::system(),
        }
    }
}

#[derive(Debug, Clone)]
struct SimNode {
    index: u32,
    ready_at: Instant,
    lease_at: Instant,
}

#[derive(Debug, Default)]
struct Faults {
    /// Next node to remove on shrink.
    victim: Option<NodeName>,
    /// Lease controller never garbage collects leases of removed nodes.
    keep_orphaned_leases: bool,
    /// Leases deleted out from under live nodes and never recreated.
    lost_leases: BTreeSet<NodeName>,
    /// Target sizes the group manager refuses.
    rejected_sizes: BTreeSet<u32>,
    unreachable: bool,
    /// Pods not managed by the simulator, returned as is.
    extra_pods: Vec<Pod>,
}

#[derive(Debug)]
struct SimState {
    pending_resize: Option<(u32, Instant)>,
    nodes: BTreeMap<NodeName, SimNode>,
    leases: BTreeMap<NodeName, Lease>,
    departed: BTreeMap<NodeName, Instant>,
    next_index: u32,
    resize_history: Vec<u32>,
    faults: Faults,
}

/// In-memory cluster implementing every collaborator trait.
#[derive(Debug)]
pub struct SimCluster {
    config: SimConfig,
    state: Mutex<SimState>,
}

impl SimCluster {
    /// Create a simulator with `initial_nodes` established nodes.
    pub fn new(config: SimConfig) -> Result<Self, NameError> {
        let now = Instant::now();
        let mut nodes = BTreeMap::new();
        let mut leases = BTreeMap::new();

        for index in 1..=config.initial_nodes {
            let name = config.node_prefix.with_index(index)?;
            leases.insert(name.clone(), new_lease(&config, &name));
            nodes.insert(
                name,
                SimNode {
                    index,
                    ready_at: now,
                    lease_at: now,
                },
            );
        }

        let state = SimState {
            pending_resize: None,
            nodes,
            leases,
            departed: BTreeMap::new(),
            next_index: config.initial_nodes + 1,
            resize_history: Vec::new(),
            faults: Faults::default(),
        };

        Ok(Self {
            config,
            state: Mutex::new(state),
        })
    }

    /// Simulator with default settings and `count` initial nodes.
    pub fn with_nodes(count: u32) -> Result<Self, NameError> {
        Self::new(SimConfig {
            initial_nodes: count,
            ..SimConfig::default()
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn group(&self) -> &GroupName {
        &self.config.group
    }

    /// Name of the node created with `index` (initial nodes start at 1).
    pub fn node_name(&self, index: u32) -> Result<NodeName, NameError> {
        self.config.node_prefix.with_index(index)
    }

    /// Remove `node` first on the next shrink instead of the newest node.
    pub async fn set_removal_victim(&self, node: NodeName) {
        self.state.lock().await.faults.victim = Some(node);
    }

    /// Stop garbage collecting leases of removed nodes.
    pub async fn keep_orphaned_leases(&self) {
        self.state.lock().await.faults.keep_orphaned_leases = true;
    }

    /// Delete the lease of a live node and never recreate it.
    pub async fn drop_lease(&self, node: &NodeName) {
        let mut state = self.state.lock().await;
        state.leases.remove(node);
        state.faults.lost_leases.insert(node.clone());
    }

    /// Refuse any resize to `size`.
    pub async fn reject_resize_to(&self, size: u32) {
        self.state.lock().await.faults.rejected_sizes.insert(size);
    }

    /// Make every call fail with a transport error.
    pub async fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().await.faults.unreachable = unreachable;
    }

    /// Add a pod the simulator returns unchanged from `list_pods`.
    pub async fn add_pod(&self, pod: Pod) {
        self.state.lock().await.faults.extra_pods.push(pod);
    }

    /// Every accepted resize target, in order.
    pub async fn resize_history(&self) -> Vec<u32> {
        self.state.lock().await.resize_history.clone()
    }

    /// All group members, ready or not.
    pub async fn member_names(&self) -> Vec<NodeName> {
        let mut state = self.state.lock().await;
        self.advance(&mut state);
        state.nodes.keys().cloned().collect()
    }

    /// Nodes that currently hold a lease.
    pub async fn lease_holders(&self) -> Vec<NodeName> {
        let mut state = self.state.lock().await;
        self.advance(&mut state);
        state.leases.keys().cloned().collect()
    }

    /// Bring the simulated world up to the current instant.
    fn advance(&self, state: &mut SimState) {
        let now = Instant::now();

        if let Some((target, requested_at)) = state.pending_resize {
            let applied_at = requested_at + self.config.provision_delay;
            if now >= applied_at {
                state.pending_resize = None;
                self.apply_resize(state, target, applied_at);
            }
        }

        for (name, node) in &state.nodes {
            if now >= node.lease_at
                && !state.leases.contains_key(name)
                && !state.faults.lost_leases.contains(name)
            {
                debug!(node = %name, "[SIM] Lease controller created lease");
                state.leases.insert(name.clone(), new_lease(&self.config, name));
            }
        }

        if !state.faults.keep_orphaned_leases {
            let lag = self.config.lease_lag;
            let collected: Vec<NodeName> = state
                .departed
                .iter()
                .filter(|(_, removed_at)| now >= **removed_at + lag)
                .map(|(name, _)| name.clone())
                .collect();
            for name in collected {
                state.departed.remove(&name);
                if state.leases.remove(&name).is_some() {
                    debug!(node = %name, "[SIM] Lease controller deleted orphaned lease");
                }
            }
        }
    }

    fn apply_resize(&self, state: &mut SimState, target: u32, applied_at: Instant) {
        let target = target as usize;

        while state.nodes.len() < target {
            let index = state.next_index;
            state.next_index += 1;
            let Ok(name) = self.config.node_prefix.with_index(index) else {
                break;
            };
            info!(node = %name, group = %self.config.group, "[SIM] Node joined group");
            state.departed.remove(&name);
            state.nodes.insert(
                name,
                SimNode {
                    index,
                    ready_at: applied_at + self.config.boot_delay,
                    lease_at: applied_at + self.config.lease_lag,
                },
            );
        }

        while state.nodes.len() > target {
            let victim = state
                .faults
                .victim
                .take()
                .filter(|v| state.nodes.contains_key(v))
                .or_else(|| {
                    state
                        .nodes
                        .iter()
                        .max_by_key(|(_, node)| node.index)
                        .map(|(name, _)| name.clone())
                });
            let Some(victim) = victim else {
                break;
            };
            info!(node = %victim, group = %self.config.group, "[SIM] Node left group");
            state.nodes.remove(&victim);
            state.departed.insert(victim, applied_at);
        }
    }

    async fn lock_reachable(&self) -> Result<tokio::sync::MutexGuard<'_, SimState>, ClusterError> {
        let mut state = self.state.lock().await;
        if state.faults.unreachable {
            return Err(ClusterError::Transport(
                "simulated control plane unreachable".to_string(),
            ));
        }
        self.advance(&mut state);
        Ok(state)
    }
}

fn new_lease(config: &SimConfig, node: &NodeName) -> Lease {
    Lease {
        holder: node.clone(),
        namespace: config.lease_namespace.clone(),
        renew_time: Some(Utc::now()),
        duration_seconds: Some(40),
    }
}

#[async_trait]
impl LeaseRegistry for SimCluster {
    async fn get_lease(
        &self,
        namespace: &Namespace,
        node: &NodeName,
    ) -> Result<Option<Lease>, ClusterError> {
        let state = self.lock_reachable().await?;
        if *namespace != self.config.lease_namespace {
            return Ok(None);
        }
        Ok(state.leases.get(node).cloned())
    }
}

#[async_trait]
impl NodeLister for SimCluster {
    async fn list_ready_schedulable_nodes(&self) -> Result<NodeSet, ClusterError> {
        let state = self.lock_reachable().await?;
        let now = Instant::now();
        Ok(state
            .nodes
            .iter()
            .filter(|(_, node)| now >= node.ready_at)
            .map(|(name, _)| Node::ready(name.clone()))
            .collect())
    }
}

#[async_trait]
impl NodeGroupScaler for SimCluster {
    async fn resize(&self, group: &GroupName, size: u32) -> Result<(), ClusterError> {
        let mut state = self.lock_reachable().await?;
        if *group != self.config.group {
            return Err(ClusterError::NotFound(format!("node group {group}")));
        }
        if state.faults.rejected_sizes.contains(&size) {
            return Err(ClusterError::Rejected(format!(
                "group {group} cannot be resized to {size}"
            )));
        }

        info!(%group, size, "[SIM] Resize requested");
        state.resize_history.push(size);
        state.pending_resize = Some((size, Instant::now()));
        Ok(())
    }

    async fn group_size(&self, group: &GroupName) -> Result<u32, ClusterError> {
        let state = self.lock_reachable().await?;
        if *group != self.config.group {
            return Err(ClusterError::NotFound(format!("node group {group}")));
        }
        Ok(state.nodes.len() as u32)
    }
}

#[async_trait]
impl PodLister for SimCluster {
    async fn list_pods(&self, namespace: &Namespace) -> Result<Vec<Pod>, ClusterError> {
        let state = self.lock_reachable().await?;
        if *namespace != self.config.system_namespace {
            return Ok(Vec::new());
        }

        let now = Instant::now();
        let control_plane = (0..self.config.control_plane_pods).map(|i| Pod {
            name: format!("control-plane-{i}"),
            namespace: namespace.clone(),
            phase: PodPhase::Running,
            ready: true,
            controlled: false,
        });
        let per_node = state.nodes.iter().map(|(name, node)| {
            let ready = now >= node.ready_at;
            Pod {
                name: format!("kube-proxy-{name}"),
                namespace: namespace.clone(),
                phase: if ready {
                    PodPhase::Running
                } else {
                    PodPhase::Pending
                },
                ready,
                controlled: true,
            }
        });
        let extra = state
            .faults
            .extra_pods
            .iter()
            .filter(|pod| pod.namespace == *namespace)
            .cloned();

        Ok(control_plane.chain(per_node).chain(extra).collect())
    }
}
