//! Convergence polling primitives.
//!
//! Cluster state observed by the node lease scenario is reconciled by
//! controllers we do not run. A single read proves nothing; instead every
//! observation is expressed as a check that is retried until it passes or a
//! fixed deadline expires. Key concepts:
//!
//! - **Check**: an async closure returning `Ok` once the state has converged.
//! - **Policy**: the total timeout and the interval between attempts.
//! - **Timeout**: exhaustion is reported with the last observed error.
//!
//! # Invariants
//!
//! - The poller mutates nothing; its only side effect is invoking the check
//! - The first attempt happens immediately
//! - The last attempt happens no later than the deadline

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

/// Reconciliation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReconcileError {
    /// Timeout waiting for convergence.
    #[error("timeout after {elapsed:?} ({attempts} attempts) waiting for {resource}: {last_error}")]
    Timeout {
        resource: String,
        elapsed: Duration,
        attempts: u32,
        last_error: String,
    },
}

impl ReconcileError {
    /// Returns the last error observed before giving up.
    pub fn last_error(&self) -> &str {
        match self {
            Self::Timeout { last_error, .. } => last_error,
        }
    }
}

/// How long to keep polling and how often.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Total time budget, measured from the first attempt.
    pub timeout: Duration,

    /// Pause between consecutive attempts.
    pub interval: Duration,
}

impl PollPolicy {
    /// Lease existence and deletion checks: one minute, every five seconds.
    pub const LEASE: Self = Self::new(Duration::from_secs(60), Duration::from_secs(5));

    /// Create a new policy.
    pub const fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    /// A policy that checks exactly once.
    pub const fn once() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }
}

/// Retry `check` until it succeeds or `policy.timeout` elapses.
///
/// The check runs immediately and then every `policy.interval`. The last
/// sleep is clamped to the deadline so a final attempt always happens at
/// the deadline itself. A zero timeout yields exactly one attempt.
///
/// # Arguments
/// * `resource` - Human-readable description for logging and errors
/// * `policy` - Timeout and interval
/// * `check` - Returns `Ok(value)` once converged, `Err(reason)` otherwise
pub async fn eventually<T, E, F, Fut>(
    resource: &str,
    policy: PollPolicy,
    mut check: F,
) -> Result<T, ReconcileError>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let start = Instant::now();
    let deadline = start + policy.timeout;
    let mut attempts = 0u32;

    loop {
        attempts += 1;

        let last_error = match check().await {
            Ok(value) => {
                if attempts > 1 {
                    debug!(resource, attempts, "Converged");
                }
                return Ok(value);
            }
            Err(e) => e.to_string(),
        };

        debug!(resource, attempt = attempts, error = %last_error, "Not converged yet");

        let now = Instant::now();
        if now >= deadline {
            return Err(ReconcileError::Timeout {
                resource: resource.to_string(),
                elapsed: now.duration_since(start),
                attempts,
                last_error,
            });
        }

        tokio::time::sleep(policy.interval.min(deadline - now)).await;
    }
}

/// Timeout for the ready node count to match a target.
pub const READY_NODES_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Interval between ready node count checks.
pub const READY_NODES_POLL_INTERVAL: Duration = Duration::from_secs(20);

/// Timeout for a node group to reach its target size.
pub const GROUP_RESIZE_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// Interval between node group size checks.
pub const GROUP_RESIZE_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Timeout for system pods to be running and ready.
pub const POD_READY_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Interval between pod readiness checks.
pub const POD_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Grace period for providers whose node tunnels outlive deleted nodes.
pub const TUNNEL_GRACE_PERIOD: Duration = Duration::from_secs(5 * 60);
