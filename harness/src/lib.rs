//! # Gantry Harness
//!
//! Test lifecycle harness that deploys and undeploys units around test
//! scopes.
//!
//! The harness sequences declarative [`DeploymentPlan`]s against a
//! [`Platform`](gantry_core::Platform): class-level plans deploy once for a
//! group of tests, test-level plans deploy per test, and each scope's
//! teardown reverses exactly the deployments that scope started. Shutdown
//! reverses whatever is left on the platform behind a barrier with a
//! deadline.
//!
//! ## Core Components
//!
//! - **`HarnessConfig`**: explicit configuration with environment overrides
//! - **`Harness` / `ClassScope` / `TestScope`**: the lifecycle phases as
//!   owned values
//! - **`Deployer`**: fans deploy calls out and joins them under one deadline
//! - **`Fixture`**: the test's own start/stop participant, injected with
//!   platform handles
//! - **`DeployReport` / `UndeployReport`**: aggregated partial-failure
//!   accounts
//!
//! ## Example
//!
//! ```ignore
//! use gantry_harness::{Harness, HarnessConfig};
//! use gantry_core::{DeploymentPlan, ModuleSpec, UnitSpec};
//! use gantry_runtime::UnitCatalog;
//!
//! #[tokio::test]
//! async fn orders_flow_through_the_mailer() -> anyhow::Result<()> {
//!     let catalog = UnitCatalog::new();
//!     catalog.register("mailer", || Box::new(MailerUnit::default()));
//!
//!     let harness = Harness::start(HarnessConfig::from_env(), catalog)?;
//!     let mut class = harness
//!         .class_scope(&DeploymentPlan::new().module(ModuleSpec::new("mailer")))
//!         .await?;
//!
//!     let mut test = class.test_scope(&DeploymentPlan::new()).await?;
//!     // ... test body ...
//!     test.teardown().await;
//!     drop(test);
//!
//!     class.teardown().await;
//!     drop(class);
//!     harness.shutdown().await;
//!     Ok(())
//! }
//! ```

/// Harness configuration and failure policy.
pub mod config;

/// Harness error types.
pub mod error;

/// Deployable test fixtures.
pub mod fixture;

/// Aggregated deploy/undeploy/shutdown reports.
pub mod report;

/// Lifecycle scopes: harness, class scope, test scope.
pub mod scope;

/// Deployment lifecycle sequencer.
pub mod sequencer;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{
    ENV_DEPLOY_TIMEOUT_MS, ENV_MODULE_DIR, ENV_REPO, FailurePolicy, HarnessConfig,
};
pub use error::HarnessError;
pub use fixture::{Fixture, FixtureContext};
pub use report::{DeployReport, FailedEntry, ShutdownReport, SkippedEntry, UndeployReport};
pub use scope::{ClassScope, Harness, TestScope};
pub use sequencer::{DeployOutcome, Deployer};

// Re-export the plan vocabulary so harness users need only this crate in
// the common case.
pub use gantry_core::config::ConfigSource;
pub use gantry_core::spec::{DeploymentKey, DeploymentPlan, ModuleSpec, UnitSpec};
