//! Per-scope deployment records.
//!
//! Every deployment a scope starts is recorded in a [`DeploymentSet`] owned
//! by that scope, replacing the original design's process-wide registry.
//! The set exists so teardown can reverse exactly what setup started: each
//! record is drained exactly once, and after teardown the set is empty.

use crate::platform::DeploymentId;
use crate::spec::DeploymentKey;
use chrono::{DateTime, Utc};

/// One deployment started on behalf of a scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentRecord {
    /// Which plan entry this deployment came from.
    pub key: DeploymentKey,

    /// Handle the platform returned.
    pub id: DeploymentId,

    /// When the deployment completed.
    pub deployed_at: DateTime<Utc>,
}

/// Ordered collection of a scope's deployment records.
///
/// Insertion order is preserved so teardown can reverse deployments
/// newest-first.
#[derive(Debug, Default)]
pub struct DeploymentSet {
    records: Vec<DeploymentRecord>,
}

impl DeploymentSet {
    /// An empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Record a completed deployment.
    pub fn insert(&mut self, key: DeploymentKey, id: DeploymentId) {
        self.records.push(DeploymentRecord {
            key,
            id,
            deployed_at: Utc::now(),
        });
    }

    /// Handle recorded for a plan entry, if that entry deployed.
    #[must_use]
    pub fn get(&self, key: &DeploymentKey) -> Option<&DeploymentId> {
        self.records.iter().find(|r| &r.key == key).map(|r| &r.id)
    }

    /// All recorded handles, in insertion order.
    #[must_use]
    pub fn ids(&self) -> Vec<DeploymentId> {
        self.records.iter().map(|r| r.id.clone()).collect()
    }

    /// View of the records, in insertion order.
    #[must_use]
    pub fn records(&self) -> &[DeploymentRecord] {
        &self.records
    }

    /// Consume the set for teardown, newest deployment first.
    ///
    /// Draining guarantees each handle is handed to undeploy exactly once;
    /// afterwards the set is empty.
    pub fn drain(&mut self) -> Vec<DeploymentRecord> {
        let mut records = std::mem::take(&mut self.records);
        records.reverse();
        records
    }

    /// Number of recorded deployments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the set holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Keys of entries still registered, for leak diagnostics.
    #[must_use]
    pub fn keys(&self) -> Vec<DeploymentKey> {
        self.records.iter().map(|r| r.key.clone()).collect()
    }
}
