//! # nodelease-testing
//!
//! A simulated cluster that behaves like the real collaborators, including
//! the part that makes the node lease scenario necessary: the lease
//! controller reacts to node changes only after a delay.
//!
//! All timing uses `tokio::time`, so tests run under paused time and finish
//! instantly while still exercising every timeout and interval.

mod sim;

pub use sim::{SimCluster, SimConfig};
