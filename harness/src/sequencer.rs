//! Deployment lifecycle sequencer.
//!
//! The [`Deployer`] turns a [`DeploymentPlan`] into platform calls: resolve
//! each entry's configuration and resource roots, fan the deploy calls out
//! concurrently, and collect their results under one joint deadline. The
//! outcome pairs the scope's [`DeploymentSet`] with a [`DeployReport`]
//! naming everything that did not go to plan.
//!
//! Deploy calls that miss the deadline are not cancelled; they keep running
//! and whatever they start is reversed when the platform undeploys
//! everything at shutdown.

use crate::config::FailurePolicy;
use crate::error::HarnessError;
use crate::report::{DeployReport, FailedEntry, SkippedEntry, UndeployReport};
use futures::stream::{FuturesUnordered, StreamExt};
use gantry_core::platform::{
    DeploymentId, ModuleDeployment, Platform, PlatformError, UnitDeployment,
};
use gantry_core::registry::DeploymentSet;
use gantry_core::resources::resolve_roots;
use gantry_core::spec::{DeploymentKey, DeploymentPlan};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

/// Result of sequencing one plan: the handles to reverse at teardown plus
/// the full account of what happened.
#[derive(Debug)]
pub struct DeployOutcome {
    /// Handles for everything that deployed, keyed by plan entry.
    pub set: DeploymentSet,

    /// What deployed, failed, was skipped, or never finished.
    pub report: DeployReport,
}

/// One prepared deploy call.
enum DeployJob {
    Module(ModuleDeployment),
    Unit(UnitDeployment),
}

/// Sequences deployment plans against a platform.
///
/// Holds only collaborator handles; every call is self-contained.
pub struct Deployer {
    platform: Arc<dyn Platform>,
    search_path: Vec<PathBuf>,
}

impl Deployer {
    /// Create a sequencer over a platform and a resource search path.
    #[must_use]
    pub const fn new(platform: Arc<dyn Platform>, search_path: Vec<PathBuf>) -> Self {
        Self {
            platform,
            search_path,
        }
    }

    /// The platform deployments are issued against.
    #[must_use]
    pub fn platform(&self) -> Arc<dyn Platform> {
        Arc::clone(&self.platform)
    }

    /// Deploy everything in `plan`, waiting at most `timeout` for the joint
    /// completion.
    ///
    /// An empty plan returns immediately with a clean report. Under
    /// [`FailurePolicy::Lenient`], partial outcomes are logged and returned;
    /// under [`FailurePolicy::Strict`], any failed, skipped, or pending entry
    /// aborts the scope after reversing the entries that did deploy.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::SetupFailed`] under the strict policy when
    /// the report is not clean.
    pub async fn deploy(
        &self,
        plan: &DeploymentPlan,
        timeout: Duration,
        policy: FailurePolicy,
    ) -> Result<DeployOutcome, HarnessError> {
        let (jobs, mut report) = self.prepare(plan);

        let mut set = DeploymentSet::new();
        let mut outstanding: BTreeSet<DeploymentKey> = BTreeSet::new();
        let mut inflight = FuturesUnordered::new();

        for (key, job) in jobs {
            outstanding.insert(key.clone());
            let platform = Arc::clone(&self.platform);
            // Spawned so that dropping the collection below never cancels a
            // deploy call mid-flight.
            let task = tokio::spawn(async move {
                match job {
                    DeployJob::Module(req) => platform.deploy_module(req).await,
                    DeployJob::Unit(req) => platform.deploy_unit(req).await,
                }
            });
            inflight.push(async move { (key, task.await) });
        }

        let deadline = tokio::time::Instant::now() + timeout;
        while !inflight.is_empty() {
            let next = tokio::time::timeout_at(deadline, inflight.next()).await;
            match next {
                Ok(Some((key, joined))) => {
                    outstanding.remove(&key);
                    Self::record_result(&mut set, &mut report, key, joined);
                },
                Ok(None) => break,
                Err(_) => {
                    report.timed_out = true;
                    warn!(
                        timeout_ms = timeout.as_millis() as u64,
                        pending = outstanding.len(),
                        "deployment deadline elapsed with calls still in flight"
                    );
                    break;
                },
            }
        }
        report.pending = outstanding.into_iter().collect();

        self.conclude(set, report, policy).await
    }

    /// Reverse a scope's deployments, each handle exactly once.
    ///
    /// Failures are collected into the report, never swallowed and never
    /// retried; the handle leaves the set either way.
    pub async fn undeploy(&self, mut set: DeploymentSet) -> UndeployReport {
        let mut report = UndeployReport::default();

        for record in set.drain() {
            match self.platform.undeploy(&record.id).await {
                Ok(()) => report.undeployed.push(record.key),
                Err(err) => {
                    warn!(key = %record.key, error = %err, "undeploy failed");
                    report.failed.push(FailedEntry {
                        key: record.key,
                        error: err,
                    });
                },
            }
        }

        report
    }

    /// Resolve configs and resource roots, dropping entries that cannot be
    /// prepared.
    fn prepare(&self, plan: &DeploymentPlan) -> (Vec<(DeploymentKey, DeployJob)>, DeployReport) {
        let mut report = DeployReport::default();
        let mut jobs = Vec::with_capacity(plan.len());

        for (ordinal, module) in plan.modules.iter().enumerate() {
            let key = DeploymentKey::Module {
                name: module.name.clone(),
                ordinal,
            };
            match module.config.resolve() {
                Ok(config) => jobs.push((
                    key,
                    DeployJob::Module(ModuleDeployment {
                        name: module.name.clone(),
                        config,
                        instances: module.instances,
                    }),
                )),
                Err(err) => {
                    warn!(key = %key, error = %err, "skipping entry: config resolution failed");
                    report.skipped.push(SkippedEntry {
                        key,
                        reason: err.to_string(),
                    });
                },
            }
        }

        for (ordinal, unit) in plan.units.iter().enumerate() {
            let key = DeploymentKey::Unit {
                main: unit.main.clone(),
                ordinal,
            };
            let config = match unit.config.resolve() {
                Ok(config) => config,
                Err(err) => {
                    warn!(key = %key, error = %err, "skipping entry: config resolution failed");
                    report.skipped.push(SkippedEntry {
                        key,
                        reason: err.to_string(),
                    });
                    continue;
                },
            };

            let resolved = resolve_roots(&unit.main, &unit.include, &self.search_path);
            for skip in resolved.skipped {
                warn!(key = %key, entry = %skip.entry, reason = %skip.reason, "resource root skipped");
                report.skipped_roots.push((key.clone(), skip));
            }

            jobs.push((
                key,
                DeployJob::Unit(UnitDeployment {
                    main: unit.main.clone(),
                    config,
                    instances: unit.instances,
                    worker: unit.worker,
                    resource_roots: resolved.roots,
                }),
            ));
        }

        (jobs, report)
    }

    /// Fold one joined deploy result into the set and report.
    fn record_result(
        set: &mut DeploymentSet,
        report: &mut DeployReport,
        key: DeploymentKey,
        joined: Result<Result<DeploymentId, PlatformError>, tokio::task::JoinError>,
    ) {
        match joined {
            Ok(Ok(id)) => {
                set.insert(key.clone(), id);
                report.deployed.push(key);
            },
            Ok(Err(err)) => {
                warn!(key = %key, error = %err, "deploy failed");
                report.failed.push(FailedEntry { key, error: err });
            },
            Err(join_err) => {
                error!(key = %key, error = %join_err, "deploy task panicked");
                report.failed.push(FailedEntry {
                    error: PlatformError::StartFailed {
                        ident: key.to_string(),
                        source: anyhow::Error::new(join_err),
                    },
                    key,
                });
            },
        }
    }

    /// Apply the failure policy to the collected outcome.
    async fn conclude(
        &self,
        set: DeploymentSet,
        report: DeployReport,
        policy: FailurePolicy,
    ) -> Result<DeployOutcome, HarnessError> {
        if report.is_clean() {
            return Ok(DeployOutcome { set, report });
        }

        match policy {
            FailurePolicy::Lenient => {
                warn!(%report, "proceeding with partial deployment outcome");
                Ok(DeployOutcome { set, report })
            },
            FailurePolicy::Strict => {
                // No orphan handles: reverse this plan's successes before
                // surfacing the failure.
                let undo = self.undeploy(set).await;
                if !undo.is_clean() {
                    warn!(failures = undo.failed.len(), "rollback left stop failures behind");
                }
                Err(HarnessError::SetupFailed(report))
            },
        }
    }
}

impl std::fmt::Debug for Deployer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deployer")
            .field("search_path", &self.search_path)
            .finish_non_exhaustive()
    }
}
