//! Lifecycle scopes: harness, class scope, test scope.
//!
//! The original runner's lifecycle callbacks map onto explicit values:
//!
//! | runner phase   | here                         |
//! |----------------|------------------------------|
//! | before-all     | [`Harness::start`]           |
//! | before-class   | [`Harness::class_scope`]     |
//! | before-test    | [`ClassScope::test_scope`]   |
//! | after-test     | [`TestScope::teardown`]      |
//! | after-class    | [`ClassScope::teardown`]     |
//! | after-all      | [`Harness::shutdown`]        |
//!
//! Each scope owns the deployments it started and nothing else; there is no
//! process-wide registry to leak across tests. Teardown is explicit because
//! it is asynchronous; a scope dropped with live deployments logs the leak.

use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::fixture::{Fixture, FixtureContext};
use crate::report::{DeployReport, ShutdownReport, UndeployReport};
use crate::sequencer::Deployer;
use gantry_core::barrier::CompletionBarrier;
use gantry_core::platform::{DeploymentId, Platform};
use gantry_core::registry::{DeploymentRecord, DeploymentSet};
use gantry_core::spec::{DeploymentKey, DeploymentPlan};
use gantry_runtime::{LocalPlatform, UnitCatalog};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Owns the platform for one test binary's worth of scopes.
pub struct Harness {
    platform: Arc<dyn Platform>,
    deployer: Deployer,
    config: HarnessConfig,
}

impl Harness {
    /// Build a harness over a fresh [`LocalPlatform`].
    ///
    /// Environment overrides are applied to `config` first, then the
    /// platform is built from the configured address, port, module
    /// directory (created when missing) and repository, resolving
    /// identifiers through `catalog`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Platform`] when the module directory cannot
    /// be created.
    pub fn start(config: HarnessConfig, catalog: UnitCatalog) -> Result<Self, HarnessError> {
        let config = config.apply_env_overrides();

        let mut builder = LocalPlatform::builder()
            .module_dir(config.module_dir.clone())
            .catalog(catalog);
        if let Some(address) = &config.address {
            builder = builder.address(address.clone());
        }
        if let Some(port) = config.port {
            builder = builder.port(port);
        }
        if let Some(repo) = &config.repo {
            builder = builder.repo(repo.clone());
        }

        let platform: Arc<dyn Platform> = Arc::new(builder.build()?);
        Ok(Self::assemble(config, platform))
    }

    /// Build a harness over a caller-supplied platform.
    ///
    /// Environment overrides are applied to `config`; the platform is used
    /// as-is.
    #[must_use]
    pub fn with_platform(config: HarnessConfig, platform: Arc<dyn Platform>) -> Self {
        Self::assemble(config.apply_env_overrides(), platform)
    }

    fn assemble(config: HarnessConfig, platform: Arc<dyn Platform>) -> Self {
        let deployer = Deployer::new(Arc::clone(&platform), config.search_path());
        Self {
            platform,
            deployer,
            config,
        }
    }

    /// Handle to the platform scopes deploy on.
    #[must_use]
    pub fn platform(&self) -> Arc<dyn Platform> {
        Arc::clone(&self.platform)
    }

    /// The harness configuration, environment overrides applied.
    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Deploy a class-level plan and enter its scope.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::SetupFailed`] under the strict failure
    /// policy when the plan does not deploy cleanly.
    pub async fn class_scope(&self, plan: &DeploymentPlan) -> Result<ClassScope<'_>, HarnessError> {
        let outcome = self
            .deployer
            .deploy(plan, self.config.deploy_timeout, self.config.failure_policy)
            .await?;

        Ok(ClassScope {
            harness: self,
            set: outcome.set,
            report: outcome.report,
        })
    }

    /// Reverse every deployment still on the platform and release it.
    ///
    /// The undeploy-all call is gated behind a completion barrier with the
    /// configured shutdown deadline. Missing the deadline is reported, not
    /// fatal: the test binary is exiting either way, and the diagnostic
    /// names what may still be in flight.
    pub async fn shutdown(self) -> ShutdownReport {
        let timeout = self.config.shutdown_timeout;
        let (mut barrier, guard) = CompletionBarrier::single();

        let platform = Arc::clone(&self.platform);
        let task = tokio::spawn(async move {
            let count = platform.undeploy_all().await;
            guard.complete();
            count
        });

        if barrier.wait_timeout(timeout).await.is_completed() {
            let undeployed = match task.await {
                Ok(count) => count,
                Err(err) => {
                    error!(error = %err, "undeploy-all task panicked");
                    0
                },
            };
            info!(undeployed, "harness shut down");
            ShutdownReport {
                undeployed,
                completed: true,
            }
        } else {
            warn!(
                timeout_ms = timeout.as_millis() as u64,
                "waited for shutdown but not all undeployments may have completed"
            );
            ShutdownReport {
                undeployed: 0,
                completed: false,
            }
        }
    }
}

impl std::fmt::Debug for Harness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harness")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Deployments shared by every test in a class-like group.
pub struct ClassScope<'h> {
    harness: &'h Harness,
    set: DeploymentSet,
    report: DeployReport,
}

impl<'h> ClassScope<'h> {
    /// What happened while this scope deployed.
    #[must_use]
    pub const fn deploy_report(&self) -> &DeployReport {
        &self.report
    }

    /// Handle recorded for a plan entry, if it deployed.
    #[must_use]
    pub fn id_for(&self, key: &DeploymentKey) -> Option<&DeploymentId> {
        self.set.get(key)
    }

    /// Records of this scope's deployments.
    #[must_use]
    pub fn deployments(&self) -> &[DeploymentRecord] {
        self.set.records()
    }

    /// Handles of this scope's deployments.
    #[must_use]
    pub fn active(&self) -> Vec<DeploymentId> {
        self.set.ids()
    }

    /// Deploy a test-level plan and enter its scope.
    ///
    /// Class-scoped deployments stay visible through the returned scope.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::SetupFailed`] under the strict failure
    /// policy when the plan does not deploy cleanly.
    pub async fn test_scope<'c>(
        &'c self,
        plan: &DeploymentPlan,
    ) -> Result<TestScope<'c, 'h>, HarnessError> {
        let config = self.harness.config();
        let outcome = self
            .harness
            .deployer
            .deploy(plan, config.deploy_timeout, config.failure_policy)
            .await?;

        Ok(TestScope {
            class: self,
            set: outcome.set,
            report: outcome.report,
        })
    }

    /// Reverse this scope's deployments, newest first.
    ///
    /// Every recorded handle is undeployed exactly once; afterwards the
    /// scope is empty and may be dropped silently.
    pub async fn teardown(&mut self) -> UndeployReport {
        let set = std::mem::take(&mut self.set);
        self.harness.deployer.undeploy(set).await
    }
}

impl Drop for ClassScope<'_> {
    fn drop(&mut self) {
        if !self.set.is_empty() {
            warn!(
                keys = ?self.set.keys(),
                "class scope dropped with live deployments; call teardown"
            );
        }
    }
}

impl std::fmt::Debug for ClassScope<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassScope")
            .field("deployments", &self.set.len())
            .finish_non_exhaustive()
    }
}

/// Deployments owned by a single test, plus its view of the class scope.
///
/// This is the context object test collaborators query instead of a
/// process-wide registry: everything it exposes dies with the test.
pub struct TestScope<'c, 'h> {
    class: &'c ClassScope<'h>,
    set: DeploymentSet,
    report: DeployReport,
}

impl TestScope<'_, '_> {
    /// What happened while this scope deployed.
    #[must_use]
    pub const fn deploy_report(&self) -> &DeployReport {
        &self.report
    }

    /// Handle recorded for a plan entry: this test's deployments first,
    /// then the class scope's.
    #[must_use]
    pub fn id_for(&self, key: &DeploymentKey) -> Option<&DeploymentId> {
        self.set.get(key).or_else(|| self.class.id_for(key))
    }

    /// Records visible to this test: its own, then the class scope's.
    #[must_use]
    pub fn deployments(&self) -> Vec<DeploymentRecord> {
        let mut records = self.set.records().to_vec();
        records.extend_from_slice(self.class.deployments());
        records
    }

    /// Handles visible to this test: its own, then the class scope's.
    #[must_use]
    pub fn active(&self) -> Vec<DeploymentId> {
        let mut ids = self.set.ids();
        ids.extend(self.class.active());
        ids
    }

    /// Handles owned by this test alone.
    #[must_use]
    pub fn own(&self) -> Vec<DeploymentId> {
        self.set.ids()
    }

    /// Inject and start a fixture.
    ///
    /// Injection is skipped when the harness has `inject_resources`
    /// disabled; `start` always runs.
    ///
    /// # Errors
    ///
    /// A start failure is fatal and returned as
    /// [`HarnessError::FixtureFailed`].
    pub async fn attach<F>(&self, fixture: &mut F) -> Result<(), HarnessError>
    where
        F: Fixture + ?Sized,
    {
        let config = self.class.harness.config();
        if config.inject_resources {
            let ctx = FixtureContext::new(self.class.harness.platform(), self.deployments());
            fixture.inject(&ctx);
        }

        fixture
            .start()
            .await
            .map_err(|source| HarnessError::FixtureFailed { source })
    }

    /// Stop a fixture after the test body.
    ///
    /// Stop errors are logged, not surfaced; teardown still proceeds.
    pub async fn detach<F>(&self, fixture: &mut F)
    where
        F: Fixture + ?Sized,
    {
        if let Err(err) = fixture.stop().await {
            warn!(error = %err, "fixture stop failed");
        }
    }

    /// Reverse this test's deployments, newest first.
    ///
    /// Class-scoped deployments are untouched. Afterwards the scope is
    /// empty and may be dropped silently.
    pub async fn teardown(&mut self) -> UndeployReport {
        let set = std::mem::take(&mut self.set);
        self.class.harness.deployer.undeploy(set).await
    }
}

impl Drop for TestScope<'_, '_> {
    fn drop(&mut self) {
        if !self.set.is_empty() {
            warn!(
                keys = ?self.set.keys(),
                "test scope dropped with live deployments; call teardown"
            );
        }
    }
}

impl std::fmt::Debug for TestScope<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestScope")
            .field("deployments", &self.set.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FailurePolicy;
    use crate::test_support::{Behavior, MockPlatform};
    use gantry_core::config::ConfigSource;
    use gantry_core::spec::{ModuleSpec, UnitSpec};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn mock_harness(platform: &Arc<MockPlatform>) -> Harness {
        crate::test_support::init_tracing();
        let config = HarnessConfig::default().with_module_dir("target/gantry-test-modules");
        Harness::with_platform(config, Arc::clone(platform) as Arc<dyn Platform>)
    }

    fn module_key(name: &str, ordinal: usize) -> DeploymentKey {
        DeploymentKey::Module {
            name: name.to_owned(),
            ordinal,
        }
    }

    #[tokio::test]
    async fn two_modules_deploy_within_deadline_and_teardown_reverses_both() {
        let platform = Arc::new(MockPlatform::new());
        platform.set_behavior("auditlog", Behavior::SucceedAfter(Duration::from_millis(100)));
        platform.set_behavior("mailer", Behavior::SucceedAfter(Duration::from_millis(150)));

        let harness = mock_harness(&platform);
        let plan = DeploymentPlan::new()
            .module(ModuleSpec::new("auditlog"))
            .module(ModuleSpec::new("mailer"));

        #[allow(clippy::unwrap_used)] // Test code: both deploys settle in time
        let mut scope = harness.class_scope(&plan).await.unwrap();
        assert_eq!(scope.active().len(), 2);

        let report = scope.teardown().await;
        assert!(report.is_clean());
        assert_eq!(report.undeployed.len(), 2);
        assert_eq!(platform.undeploy_calls.load(Ordering::SeqCst), 2);
        assert!(platform.active().await.is_empty());
    }

    #[tokio::test]
    async fn test_scope_sees_class_deployments_but_owns_only_its_own() {
        let platform = Arc::new(MockPlatform::new());
        let harness = mock_harness(&platform);

        #[allow(clippy::unwrap_used)] // Test code: mock deploys succeed
        let mut class = harness
            .class_scope(&DeploymentPlan::new().module(ModuleSpec::new("auditlog")))
            .await
            .unwrap();

        #[allow(clippy::unwrap_used)] // Test code: mock deploys succeed
        let mut test = class
            .test_scope(&DeploymentPlan::new().unit(UnitSpec::new("echo-unit")))
            .await
            .unwrap();

        assert_eq!(test.active().len(), 2);
        assert_eq!(test.own().len(), 1);
        assert!(test.id_for(&module_key("auditlog", 0)).is_some());

        // After-test: only the method-scope deployment is reversed.
        let report = test.teardown().await;
        assert_eq!(report.undeployed.len(), 1);
        assert_eq!(test.own().len(), 0);
        drop(test);
        assert_eq!(platform.active().await.len(), 1);

        // After-class: the class deployment follows.
        class.teardown().await;
        assert!(platform.active().await.is_empty());
    }

    #[tokio::test]
    async fn teardown_twice_undeploys_nothing_extra() {
        let platform = Arc::new(MockPlatform::new());
        let harness = mock_harness(&platform);

        #[allow(clippy::unwrap_used)] // Test code: mock deploys succeed
        let mut scope = harness
            .class_scope(&DeploymentPlan::new().module(ModuleSpec::new("auditlog")))
            .await
            .unwrap();

        scope.teardown().await;
        let second = scope.teardown().await;
        assert!(second.is_empty());
        assert_eq!(platform.undeploy_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn strict_setup_failure_surfaces_and_leaves_nothing_active() {
        let platform = Arc::new(MockPlatform::new());
        platform.set_behavior("broken", Behavior::Fail);

        let harness = mock_harness(&platform);
        let plan = DeploymentPlan::new()
            .module(ModuleSpec::new("auditlog"))
            .module(ModuleSpec::new("broken"));

        let result = harness.class_scope(&plan).await;
        assert!(matches!(result, Err(HarnessError::SetupFailed(_))));
        assert!(platform.active().await.is_empty());
    }

    #[tokio::test]
    async fn lenient_setup_failure_enters_the_scope_anyway() {
        let platform = Arc::new(MockPlatform::new());
        platform.set_behavior("broken", Behavior::Fail);

        let config = HarnessConfig::default().lenient();
        let harness = Harness::with_platform(config, Arc::clone(&platform) as Arc<dyn Platform>);
        let plan = DeploymentPlan::new()
            .module(ModuleSpec::new("auditlog"))
            .module(ModuleSpec::new("broken"));

        #[allow(clippy::unwrap_used)] // Test code: lenient policy returns the scope
        let mut scope = harness.class_scope(&plan).await.unwrap();
        assert_eq!(scope.active().len(), 1);
        assert_eq!(scope.deploy_report().failed.len(), 1);
        scope.teardown().await;
    }

    #[tokio::test]
    async fn shutdown_reverses_everything_and_reports_completion() {
        let platform = Arc::new(MockPlatform::new());
        let harness = mock_harness(&platform);

        #[allow(clippy::unwrap_used)] // Test code: mock deploys succeed
        let mut scope = harness
            .class_scope(
                &DeploymentPlan::new()
                    .module(ModuleSpec::new("auditlog"))
                    .module(ModuleSpec::new("mailer")),
            )
            .await
            .unwrap();

        // Simulate a leak: one deployment never torn down by its scope.
        scope.teardown().await;
        drop(scope);
        #[allow(clippy::unwrap_used)] // Test code: mock deploys succeed
        harness
            .class_scope(&DeploymentPlan::new().module(ModuleSpec::new("straggler")))
            .await
            .unwrap();

        let report = harness.shutdown().await;
        assert!(report.completed);
        assert_eq!(report.undeployed, 1);
        assert!(platform.active().await.is_empty());
    }

    #[tokio::test]
    async fn shutdown_deadline_is_advisory() {
        let platform = Arc::new(MockPlatform::new());
        platform.set_undeploy_all_delay(Duration::from_secs(60));

        let config = HarnessConfig::default().with_shutdown_timeout(Duration::from_millis(50));
        let harness = Harness::with_platform(config, Arc::clone(&platform) as Arc<dyn Platform>);

        let started = std::time::Instant::now();
        let report = harness.shutdown().await;
        assert!(!report.completed);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn fixture_is_injected_started_and_stopped() {
        struct RecordingFixture {
            injected_deployments: usize,
            started: bool,
            stopped: bool,
        }

        #[async_trait::async_trait]
        impl Fixture for RecordingFixture {
            fn inject(&mut self, ctx: &FixtureContext) {
                self.injected_deployments = ctx.deployments().len();
            }

            async fn start(&mut self) -> anyhow::Result<()> {
                self.started = true;
                Ok(())
            }

            async fn stop(&mut self) -> anyhow::Result<()> {
                self.stopped = true;
                Ok(())
            }
        }

        let platform = Arc::new(MockPlatform::new());
        let harness = mock_harness(&platform);

        #[allow(clippy::unwrap_used)] // Test code: mock deploys succeed
        let mut class = harness
            .class_scope(&DeploymentPlan::new().module(ModuleSpec::new("auditlog")))
            .await
            .unwrap();
        #[allow(clippy::unwrap_used)] // Test code: mock deploys succeed
        let mut test = class
            .test_scope(&DeploymentPlan::new().unit(UnitSpec::new("echo-unit")))
            .await
            .unwrap();

        let mut fixture = RecordingFixture {
            injected_deployments: 0,
            started: false,
            stopped: false,
        };

        #[allow(clippy::unwrap_used)] // Test code: fixture start succeeds
        test.attach(&mut fixture).await.unwrap();
        assert_eq!(fixture.injected_deployments, 2);
        assert!(fixture.started);

        test.detach(&mut fixture).await;
        assert!(fixture.stopped);

        test.teardown().await;
        drop(test);
        class.teardown().await;
    }

    #[tokio::test]
    async fn fixture_start_failure_is_fatal() {
        struct BrokenFixture;

        #[async_trait::async_trait]
        impl Fixture for BrokenFixture {
            async fn start(&mut self) -> anyhow::Result<()> {
                Err(anyhow::anyhow!("no database"))
            }
        }

        let platform = Arc::new(MockPlatform::new());
        let harness = mock_harness(&platform);

        #[allow(clippy::unwrap_used)] // Test code: mock deploys succeed
        let class = harness.class_scope(&DeploymentPlan::new()).await.unwrap();
        #[allow(clippy::unwrap_used)] // Test code: empty plan deploys cleanly
        let mut test = class.test_scope(&DeploymentPlan::new()).await.unwrap();

        let result = test.attach(&mut BrokenFixture).await;
        assert!(matches!(result, Err(HarnessError::FixtureFailed { .. })));
        test.teardown().await;
    }

    #[tokio::test]
    async fn injection_can_be_disabled() {
        struct CountingFixture {
            injections: usize,
        }

        #[async_trait::async_trait]
        impl Fixture for CountingFixture {
            fn inject(&mut self, _ctx: &FixtureContext) {
                self.injections += 1;
            }
        }

        let platform = Arc::new(MockPlatform::new());
        let config = HarnessConfig::default().with_inject_resources(false);
        let harness = Harness::with_platform(config, Arc::clone(&platform) as Arc<dyn Platform>);

        #[allow(clippy::unwrap_used)] // Test code: empty plans deploy cleanly
        let class = harness.class_scope(&DeploymentPlan::new()).await.unwrap();
        #[allow(clippy::unwrap_used)] // Test code: empty plans deploy cleanly
        let mut test = class.test_scope(&DeploymentPlan::new()).await.unwrap();

        let mut fixture = CountingFixture { injections: 0 };
        #[allow(clippy::unwrap_used)] // Test code: default start succeeds
        test.attach(&mut fixture).await.unwrap();
        assert_eq!(fixture.injections, 0);
        test.teardown().await;
    }

    #[tokio::test]
    async fn unit_config_file_reference_reaches_the_deployment() {
        // End to end against the real platform: a file-backed config blob is
        // loaded and handed to the unit unmodified.
        use gantry_runtime::{Unit, UnitContext};
        use std::sync::Mutex;

        struct ConfigCapturingUnit {
            sink: Arc<Mutex<Option<serde_json::Value>>>,
        }

        #[async_trait::async_trait]
        impl Unit for ConfigCapturingUnit {
            async fn start(&mut self, ctx: UnitContext) -> anyhow::Result<()> {
                #[allow(clippy::unwrap_used)] // Test code: lock cannot be poisoned
                {
                    *self.sink.lock().unwrap() = Some(ctx.config().clone());
                }
                Ok(())
            }

            async fn stop(&mut self) -> anyhow::Result<()> {
                Ok(())
            }
        }

        #[allow(clippy::unwrap_used)] // Test code: fixture setup
        {
            let dir = tempfile::tempdir().unwrap();
            let config_path = dir.path().join("unit-config.json");
            std::fs::write(&config_path, r#"{"greeting": "hello"}"#).unwrap();

            let sink = Arc::new(Mutex::new(None));
            let catalog = UnitCatalog::new();
            let captured = Arc::clone(&sink);
            catalog.register("greeter-unit", move || {
                Box::new(ConfigCapturingUnit {
                    sink: Arc::clone(&captured),
                })
            });

            let config = HarnessConfig::default()
                .with_module_dir(dir.path().join("modules"))
                .with_deploy_timeout(Duration::from_millis(15_000))
                .with_failure_policy(FailurePolicy::Strict);
            let harness = Harness::start(config, catalog).unwrap();

            let plan = DeploymentPlan::new().unit(
                UnitSpec::new("greeter-unit")
                    .with_config(ConfigSource::parse(&format!("file:{}", config_path.display()))),
            );

            let mut scope = harness.class_scope(&plan).await.unwrap();
            let value = sink.lock().unwrap().clone().unwrap();
            assert_eq!(value["greeting"], "hello");

            scope.teardown().await;
            drop(scope);
            let report = harness.shutdown().await;
            assert!(report.completed);
            assert_eq!(report.undeployed, 0);
        }
    }
}
