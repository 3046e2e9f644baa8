//! Typed name definitions for observed cluster objects.

use crate::{define_name, NameError, MAX_NAME_LEN};

// =============================================================================
// Cluster Objects
// =============================================================================

define_name!(NodeName, "node");
define_name!(GroupName, "node group");
define_name!(Namespace, "namespace");

impl NodeName {
    /// Derive a member name such as `pool-a-3` from a group prefix.
    pub fn with_index(&self, index: u32) -> Result<Self, NameError> {
        Self::parse(&format!("{}-{}", self.0, index))
    }
}

impl Namespace {
    /// Namespace holding one lease per node.
    #[must_use]
    pub fn node_lease() -> Self {
        Self("kube-node-lease".to_string())
    }

    /// Namespace holding cluster system pods.
    #[must_use]
    pub fn system() -> Self {
        Self("kube-system".to_string())
    }
}

/// Validate a name against DNS subdomain rules.
pub(crate) fn validate(s: &str) -> Result<(), NameError> {
    if s.is_empty() {
        return Err(NameError::Empty);
    }

    if s.len() > MAX_NAME_LEN {
        return Err(NameError::TooLong {
            len: s.len(),
            max: MAX_NAME_LEN,
        });
    }

    for (position, ch) in s.chars().enumerate() {
        if !(ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '.') {
            return Err(NameError::InvalidChar { ch, position });
        }
    }

    let boundary_ok = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric());
    if !boundary_ok(s.chars().next()) || !boundary_ok(s.chars().last()) {
        return Err(NameError::InvalidBoundary(s.to_string()));
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
