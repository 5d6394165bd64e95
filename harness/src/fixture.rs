//! Deployable test fixtures.
//!
//! A fixture is the test's own participant in the deployment lifecycle: it
//! is injected with platform handles, started before the test body runs,
//! and stopped after. Unlike plan deployments, a fixture that fails to
//! start aborts the test; there is nothing meaningful to run without it.

use async_trait::async_trait;
use gantry_core::platform::{DeploymentId, Platform};
use gantry_core::registry::DeploymentRecord;
use gantry_core::spec::DeploymentKey;
use std::sync::Arc;

/// What a fixture can see of the harness when it is attached.
#[derive(Clone)]
pub struct FixtureContext {
    platform: Arc<dyn Platform>,
    records: Vec<DeploymentRecord>,
}

impl FixtureContext {
    pub(crate) const fn new(platform: Arc<dyn Platform>, records: Vec<DeploymentRecord>) -> Self {
        Self { platform, records }
    }

    /// Handle to the platform the scope deploys on.
    #[must_use]
    pub fn platform(&self) -> Arc<dyn Platform> {
        Arc::clone(&self.platform)
    }

    /// Deployments visible to the scope at attach time, class-scoped
    /// entries included.
    #[must_use]
    pub fn deployments(&self) -> &[DeploymentRecord] {
        &self.records
    }

    /// Handle recorded for a plan entry, if it deployed.
    #[must_use]
    pub fn id_for(&self, key: &DeploymentKey) -> Option<&DeploymentId> {
        self.records.iter().find(|r| &r.key == key).map(|r| &r.id)
    }
}

impl std::fmt::Debug for FixtureContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixtureContext")
            .field("deployments", &self.records.len())
            .finish_non_exhaustive()
    }
}

/// A test collaborator bracketing the test body.
///
/// All methods have defaults, so a fixture implements only what it needs.
///
/// # Example
///
/// ```ignore
/// struct ApiFixture {
///     platform: Option<Arc<dyn Platform>>,
/// }
///
/// #[async_trait]
/// impl Fixture for ApiFixture {
///     fn inject(&mut self, ctx: &FixtureContext) {
///         self.platform = Some(ctx.platform());
///     }
///
///     async fn start(&mut self) -> anyhow::Result<()> {
///         // bring up whatever the test body talks to
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Fixture: Send {
    /// Receive platform handles and the scope's deployment view.
    ///
    /// Called before `start` when the harness has `inject_resources`
    /// enabled; skipped entirely otherwise.
    fn inject(&mut self, ctx: &FixtureContext) {
        let _ = ctx;
    }

    /// Bring the fixture up before the test body runs.
    ///
    /// # Errors
    ///
    /// An error here is fatal to the test.
    async fn start(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Reverse `start` after the test body.
    ///
    /// # Errors
    ///
    /// Stop errors are logged by the scope, not surfaced.
    async fn stop(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}
