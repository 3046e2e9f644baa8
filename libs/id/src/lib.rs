//! # nodelease-id
//!
//! Validated name types for the cluster objects the node lease scenario
//! observes.
//!
//! ## Design Principles
//!
//! - Objects are identified by user-visible names, not generated IDs
//! - Every name has a canonical string form with strict parsing
//! - Names are typed so a node name cannot be passed where a group is expected
//!
//! ## Name Format
//!
//! Names follow DNS subdomain rules: lowercase alphanumerics, `-` and `.`,
//! starting and ending with an alphanumeric, at most 253 characters.
//!
//! Examples:
//! - `gke-pool-1-a1b2`
//! - `ip-10-0-1-17.ec2.internal`
//! - `kube-node-lease`

mod error;
mod macros;
mod types;

pub use error::NameError;
pub use types::*;

/// Maximum length of any cluster object name.
pub const MAX_NAME_LEN: usize = 253;
