//! Host-platform abstraction.
//!
//! The harness never talks to a concrete container directly; it issues
//! deploy/undeploy calls through the [`Platform`] trait and holds on to the
//! opaque [`DeploymentId`] each deploy returns, solely so teardown can
//! reverse exactly what setup started.
//!
//! `gantry-runtime` provides the in-process reference implementation;
//! tests frequently substitute their own.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::PathBuf;
use thiserror::Error;

/// Opaque handle identifying one active deployment.
///
/// Returned by a platform on deploy; required to reverse that deployment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeploymentId(String);

impl DeploymentId {
    /// Wrap a platform-issued identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeploymentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A fully-resolved module deploy request.
///
/// Configuration has already been loaded; the platform receives the blob
/// unmodified.
#[derive(Debug, Clone)]
pub struct ModuleDeployment {
    /// Module identifier.
    pub name: String,

    /// Resolved configuration blob.
    pub config: Value,

    /// Instances to start under the returned handle.
    pub instances: usize,
}

/// A fully-resolved unit deploy request.
#[derive(Debug, Clone)]
pub struct UnitDeployment {
    /// Main identifier.
    pub main: String,

    /// Resolved configuration blob.
    pub config: Value,

    /// Instances to start under the returned handle.
    pub instances: usize,

    /// Worker marking; advisory for in-process platforms.
    pub worker: bool,

    /// De-duplicated resource roots available to the unit.
    pub resource_roots: BTreeSet<PathBuf>,
}

/// Errors a platform can raise on deploy or undeploy.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// No module is known under the requested identifier.
    #[error("unknown module '{0}'")]
    UnknownModule(String),

    /// No unit is known under the requested main identifier.
    #[error("unknown unit '{0}'")]
    UnknownUnit(String),

    /// A unit instance failed to start.
    #[error("deployment of '{ident}' failed to start: {source}")]
    StartFailed {
        /// Identifier of the failed module or unit.
        ident: String,
        /// Error reported by the unit.
        #[source]
        source: anyhow::Error,
    },

    /// One or more unit instances failed to stop cleanly.
    #[error("undeploy of {id} reported {failures} stop failure(s)")]
    StopFailed {
        /// Handle of the deployment being reversed.
        id: DeploymentId,
        /// How many instances failed to stop.
        failures: usize,
    },

    /// The handle does not name an active deployment.
    #[error("no active deployment {0}")]
    NotDeployed(DeploymentId),

    /// The platform is shutting down and refuses new deployments.
    #[error("platform is shutting down")]
    ShuttingDown,

    /// Platform construction failed.
    #[error("platform setup failed: {0}")]
    Setup(#[from] std::io::Error),
}

/// A deployment container the harness can drive.
///
/// Implementations execute each call asynchronously on their own scheduling;
/// the harness only observes completion. `undeploy_all` must reverse every
/// deployment the platform still tracks, including ones whose handles a
/// caller lost track of (deployments that completed after a setup phase
/// timed out and moved on).
#[async_trait]
pub trait Platform: Send + Sync {
    /// Deploy a named module.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::UnknownModule`] for unresolvable names and
    /// [`PlatformError::StartFailed`] when an instance fails to start.
    async fn deploy_module(&self, req: ModuleDeployment) -> Result<DeploymentId, PlatformError>;

    /// Deploy a unit by main identifier.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::UnknownUnit`] for unresolvable identifiers
    /// and [`PlatformError::StartFailed`] when an instance fails to start.
    async fn deploy_unit(&self, req: UnitDeployment) -> Result<DeploymentId, PlatformError>;

    /// Reverse a single deployment.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::NotDeployed`] if the handle is unknown, or
    /// [`PlatformError::StopFailed`] if instances failed to stop cleanly.
    async fn undeploy(&self, id: &DeploymentId) -> Result<(), PlatformError>;

    /// Reverse every deployment still tracked, returning how many were
    /// stopped. Stop failures are logged by the platform, not surfaced.
    async fn undeploy_all(&self) -> usize;

    /// Handles of all currently active deployments.
    async fn active(&self) -> Vec<DeploymentId>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deployment_id_round_trips_text() {
        let id = DeploymentId::new("deployment-7");
        assert_eq!(id.as_str(), "deployment-7");
        assert_eq!(id.to_string(), "deployment-7");
    }

    #[test]
    fn deployment_ids_compare_by_value() {
        assert_eq!(DeploymentId::new("a"), DeploymentId::new("a"));
        assert_ne!(DeploymentId::new("a"), DeploymentId::new("b"));
    }
}
