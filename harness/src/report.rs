//! Aggregated results of sequencing and teardown.
//!
//! The original design logged partial failures and moved on; these reports
//! carry the same information to the caller instead, so the failure policy
//! can decide what aborts a test and what is merely noise.

use gantry_core::platform::PlatformError;
use gantry_core::resources::SkippedRoot;
use gantry_core::spec::DeploymentKey;

/// One plan entry that failed to deploy.
#[derive(Debug)]
pub struct FailedEntry {
    /// Which entry failed.
    pub key: DeploymentKey,

    /// The platform's error.
    pub error: PlatformError,
}

/// One plan entry dropped before any deploy call was issued.
#[derive(Debug)]
pub struct SkippedEntry {
    /// Which entry was dropped.
    pub key: DeploymentKey,

    /// Why it never deployed (configuration resolution, typically).
    pub reason: String,
}

/// Outcome of sequencing one deployment plan.
#[derive(Debug, Default)]
pub struct DeployReport {
    /// Entries that deployed before the deadline.
    pub deployed: Vec<DeploymentKey>,

    /// Entries whose deploy call returned an error.
    pub failed: Vec<FailedEntry>,

    /// Entries dropped before deployment was attempted.
    pub skipped: Vec<SkippedEntry>,

    /// Entries with no result when the deadline elapsed. Their deploy calls
    /// keep running; whatever they start is reversed at shutdown.
    pub pending: Vec<DeploymentKey>,

    /// Resource-root entries that resolution dropped, per plan entry.
    /// Advisory: a unit may legitimately run with fewer roots.
    pub skipped_roots: Vec<(DeploymentKey, SkippedRoot)>,

    /// Whether the joint deadline elapsed before every result arrived.
    pub timed_out: bool,
}

impl DeployReport {
    /// Whether every entry deployed, nothing was skipped, and the deadline
    /// held.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty() && !self.timed_out
    }
}

impl std::fmt::Display for DeployReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} deployed, {} failed, {} skipped, {} pending{}",
            self.deployed.len(),
            self.failed.len(),
            self.skipped.len(),
            self.pending.len(),
            if self.timed_out { " (timed out)" } else { "" }
        )
    }
}

/// Outcome of reversing one scope's deployments.
#[derive(Debug, Default)]
pub struct UndeployReport {
    /// Entries reversed cleanly.
    pub undeployed: Vec<DeploymentKey>,

    /// Entries whose undeploy call reported an error. The handle has still
    /// left the scope's registry; it is not retried.
    pub failed: Vec<FailedEntry>,
}

impl UndeployReport {
    /// Whether every entry reversed cleanly.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Total entries processed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.undeployed.len() + self.failed.len()
    }

    /// Whether the scope had nothing to reverse.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outcome of harness shutdown.
#[derive(Debug)]
pub struct ShutdownReport {
    /// How many deployments the platform reversed.
    pub undeployed: usize,

    /// Whether undeploy-all signalled completion before the shutdown
    /// deadline. `false` means some undeployments may still be in flight.
    pub completed: bool,
}
