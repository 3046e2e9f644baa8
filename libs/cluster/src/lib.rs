//! # nodelease-cluster
//!
//! The cluster as seen by the node lease scenario: a handful of object types
//! and the collaborator interfaces that read or change them.
//!
//! ## Architecture
//!
//! - **Model**: nodes, leases, pods, and immutable node set snapshots
//! - **Collaborators**: lease registry, node listing, node group scaling, pod listing
//! - **Handle**: an explicitly passed capability bundling all collaborators
//! - **Waits**: convergence helpers built on `nodelease_reconcile::eventually`
//!
//! Nothing here talks to a real control plane. Backends implement the traits:
//! the simulator in `nodelease-testing` and the HTTP client in `leasectl`.

mod collaborators;
mod error;
mod handle;
mod model;
mod wait;

pub use collaborators::{LeaseRegistry, NodeGroupScaler, NodeLister, PodLister};
pub use error::ClusterError;
pub use handle::{ClusterBackend, ClusterHandle};
pub use model::{Lease, Node, NodeSet, Pod, PodPhase};
pub use wait::{wait_for_pods_running_ready, wait_for_ready_nodes};
