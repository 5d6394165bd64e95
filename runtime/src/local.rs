//! In-process reference platform.
//!
//! [`LocalPlatform`] runs deployable units inside the current tokio runtime.
//! Each deploy request instantiates its units from the shared
//! [`UnitCatalog`](crate::UnitCatalog), starts them one by one, and registers
//! the group under a fresh deployment handle. Undeploy signals the group's
//! shutdown watch and stops the instances in reverse start order.
//!
//! The platform binds no sockets of its own; the configured address and port
//! are recorded for units to pick up out of their configuration.

use crate::catalog::UnitCatalog;
use crate::unit::{ShutdownSignal, Unit, UnitContext};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gantry_core::platform::{
    DeploymentId, ModuleDeployment, Platform, PlatformError, UnitDeployment,
};
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::{Mutex, watch};
use tracing::{error, info, warn};

/// Where and how the platform hosts deployments.
#[derive(Debug, Clone)]
pub struct PlatformSettings {
    /// Advertised address, recorded for unit introspection.
    pub address: Option<String>,

    /// Advertised port, recorded for unit introspection.
    pub port: Option<u16>,

    /// Directory modules are resolved under. Created on build if missing.
    pub module_dir: PathBuf,

    /// Optional secondary location for unit resources.
    pub repo: Option<PathBuf>,
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            address: None,
            port: None,
            module_dir: PathBuf::from("target/gantry-modules"),
            repo: None,
        }
    }
}

impl PlatformSettings {
    /// Directories units may resolve resources from: the module directory,
    /// then the repository when configured.
    #[must_use]
    pub fn search_path(&self) -> Vec<PathBuf> {
        let mut path = vec![self.module_dir.clone()];
        if let Some(repo) = &self.repo {
            path.push(repo.clone());
        }
        path
    }
}

/// Builder for [`LocalPlatform`].
#[derive(Debug, Default)]
pub struct LocalPlatformBuilder {
    settings: PlatformSettings,
    catalog: Option<UnitCatalog>,
}

impl LocalPlatformBuilder {
    /// Set the advertised address.
    #[must_use]
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.settings.address = Some(address.into());
        self
    }

    /// Set the advertised port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.settings.port = Some(port);
        self
    }

    /// Set the module directory.
    #[must_use]
    pub fn module_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.settings.module_dir = dir.into();
        self
    }

    /// Set the resource repository.
    #[must_use]
    pub fn repo(mut self, repo: impl Into<PathBuf>) -> Self {
        self.settings.repo = Some(repo.into());
        self
    }

    /// Use an existing catalog instead of a fresh empty one.
    #[must_use]
    pub fn catalog(mut self, catalog: UnitCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Build the platform, creating the module directory if missing.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::Setup`] if the module directory cannot be
    /// created.
    pub fn build(self) -> Result<LocalPlatform, PlatformError> {
        if !self.settings.module_dir.exists() {
            std::fs::create_dir_all(&self.settings.module_dir)?;
        }

        info!(
            module_dir = %self.settings.module_dir.display(),
            repo = ?self.settings.repo,
            "local platform ready"
        );

        Ok(LocalPlatform {
            settings: self.settings,
            catalog: self.catalog.unwrap_or_default(),
            deployments: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            next_seq: AtomicU64::new(0),
            shutting_down: AtomicBool::new(false),
        })
    }
}

/// One active deployment: its unit instances plus the shutdown watch that
/// reaches any background work they spawned.
struct RunningDeployment {
    ident: String,
    instances: Vec<Box<dyn Unit>>,
    shutdown_tx: watch::Sender<bool>,
    deployed_at: DateTime<Utc>,
    seq: u64,
}

/// Which catalog namespace a deploy request came from, for error shaping.
#[derive(Clone, Copy)]
enum DeployKind {
    Module,
    Unit,
}

/// In-process deployment container.
pub struct LocalPlatform {
    settings: PlatformSettings,
    catalog: UnitCatalog,
    deployments: Mutex<HashMap<DeploymentId, RunningDeployment>>,
    next_id: AtomicU64,
    next_seq: AtomicU64,
    shutting_down: AtomicBool,
}

impl LocalPlatform {
    /// Start building a platform.
    #[must_use]
    pub fn builder() -> LocalPlatformBuilder {
        LocalPlatformBuilder::default()
    }

    /// The settings the platform was built with.
    #[must_use]
    pub const fn settings(&self) -> &PlatformSettings {
        &self.settings
    }

    /// The shared unit catalog.
    #[must_use]
    pub const fn catalog(&self) -> &UnitCatalog {
        &self.catalog
    }

    /// Register a unit factory; convenience for `catalog().register(..)`.
    pub fn register_unit<F>(&self, ident: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Unit> + Send + Sync + 'static,
    {
        self.catalog.register(ident, factory);
    }

    /// Refuse new deployments and reverse everything currently running.
    ///
    /// Terminal: deploy calls after this return
    /// [`PlatformError::ShuttingDown`].
    pub async fn shutdown(&self) -> usize {
        self.shutting_down.store(true, Ordering::SeqCst);
        self.undeploy_all().await
    }

    fn allocate_id(&self) -> DeploymentId {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        DeploymentId::new(format!("deployment-{n}"))
    }

    /// Instantiate and start `instances` units for `ident`.
    ///
    /// On a start failure, instances already started under this request are
    /// stopped again in reverse order; nothing half-deployed is registered.
    async fn start_instances(
        &self,
        kind: DeployKind,
        ident: &str,
        instances: usize,
        config: &serde_json::Value,
        resource_roots: &BTreeSet<PathBuf>,
        worker: bool,
    ) -> Result<(Vec<Box<dyn Unit>>, watch::Sender<bool>), PlatformError> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(PlatformError::ShuttingDown);
        }
        if !self.catalog.contains(ident) {
            return Err(match kind {
                DeployKind::Module => PlatformError::UnknownModule(ident.to_owned()),
                DeployKind::Unit => PlatformError::UnknownUnit(ident.to_owned()),
            });
        }

        let (shutdown_tx, _) = watch::channel(false);
        let mut started: Vec<Box<dyn Unit>> = Vec::with_capacity(instances);

        for instance in 0..instances {
            let Some(mut unit) = self.catalog.create(ident) else {
                // Factory was unregistered mid-deploy; treat as unknown.
                Self::rollback(ident, &mut started).await;
                return Err(match kind {
                    DeployKind::Module => PlatformError::UnknownModule(ident.to_owned()),
                    DeployKind::Unit => PlatformError::UnknownUnit(ident.to_owned()),
                });
            };

            let ctx = UnitContext::new(
                config.clone(),
                resource_roots.clone(),
                instance,
                worker,
                ShutdownSignal::new(shutdown_tx.subscribe()),
            );

            if let Err(source) = unit.start(ctx).await {
                Self::rollback(ident, &mut started).await;
                return Err(PlatformError::StartFailed {
                    ident: ident.to_owned(),
                    source,
                });
            }
            started.push(unit);
        }

        Ok((started, shutdown_tx))
    }

    /// Stop instances started under a failed request, newest first.
    async fn rollback(ident: &str, started: &mut Vec<Box<dyn Unit>>) {
        while let Some(mut unit) = started.pop() {
            if let Err(err) = unit.stop().await {
                warn!(ident, error = %err, "rollback stop failed");
            }
        }
    }

    async fn register_deployment(
        &self,
        ident: String,
        instances: Vec<Box<dyn Unit>>,
        shutdown_tx: watch::Sender<bool>,
    ) -> DeploymentId {
        let id = self.allocate_id();
        let count = instances.len();
        let record = RunningDeployment {
            ident: ident.clone(),
            instances,
            shutdown_tx,
            deployed_at: Utc::now(),
            seq: self.next_seq.fetch_add(1, Ordering::SeqCst),
        };

        self.deployments.lock().await.insert(id.clone(), record);
        info!(ident = %ident, id = %id, instances = count, "deployed");
        id
    }

    /// Signal shutdown and stop a deployment's instances, newest first.
    /// Returns how many instances failed to stop.
    async fn stop_deployment(id: &DeploymentId, mut deployment: RunningDeployment) -> usize {
        let _ = deployment.shutdown_tx.send(true);

        let mut failures = 0;
        while let Some(mut unit) = deployment.instances.pop() {
            if let Err(err) = unit.stop().await {
                error!(id = %id, ident = %deployment.ident, error = %err, "stop failed");
                failures += 1;
            }
        }

        let uptime = Utc::now() - deployment.deployed_at;
        info!(
            id = %id,
            ident = %deployment.ident,
            uptime_ms = uptime.num_milliseconds(),
            "undeployed"
        );
        failures
    }
}

#[async_trait]
impl Platform for LocalPlatform {
    async fn deploy_module(&self, req: ModuleDeployment) -> Result<DeploymentId, PlatformError> {
        // Modules see their own directory under the module dir, when present.
        let mut roots = BTreeSet::new();
        let module_root = self.settings.module_dir.join(&req.name);
        if module_root.is_dir() {
            roots.insert(module_root);
        }

        let (instances, shutdown_tx) = self
            .start_instances(
                DeployKind::Module,
                &req.name,
                req.instances,
                &req.config,
                &roots,
                false,
            )
            .await?;

        Ok(self
            .register_deployment(req.name, instances, shutdown_tx)
            .await)
    }

    async fn deploy_unit(&self, req: UnitDeployment) -> Result<DeploymentId, PlatformError> {
        let (instances, shutdown_tx) = self
            .start_instances(
                DeployKind::Unit,
                &req.main,
                req.instances,
                &req.config,
                &req.resource_roots,
                req.worker,
            )
            .await?;

        Ok(self
            .register_deployment(req.main, instances, shutdown_tx)
            .await)
    }

    async fn undeploy(&self, id: &DeploymentId) -> Result<(), PlatformError> {
        let Some(deployment) = self.deployments.lock().await.remove(id) else {
            return Err(PlatformError::NotDeployed(id.clone()));
        };

        let failures = Self::stop_deployment(id, deployment).await;
        if failures > 0 {
            return Err(PlatformError::StopFailed {
                id: id.clone(),
                failures,
            });
        }
        Ok(())
    }

    async fn undeploy_all(&self) -> usize {
        let drained: Vec<(DeploymentId, RunningDeployment)> = {
            let mut deployments = self.deployments.lock().await;
            let mut drained: Vec<_> = deployments.drain().collect();
            // Newest first, mirroring single-scope teardown order.
            drained.sort_by(|a, b| b.1.seq.cmp(&a.1.seq));
            drained
        };

        let count = drained.len();
        for (id, deployment) in drained {
            let failures = Self::stop_deployment(&id, deployment).await;
            if failures > 0 {
                warn!(id = %id, failures, "undeploy-all: instances failed to stop");
            }
        }
        count
    }

    async fn active(&self) -> Vec<DeploymentId> {
        let deployments = self.deployments.lock().await;
        let mut entries: Vec<(u64, DeploymentId)> = deployments
            .iter()
            .map(|(id, d)| (d.seq, id.clone()))
            .collect();
        entries.sort_by_key(|(seq, _)| *seq);
        entries.into_iter().map(|(_, id)| id).collect()
    }
}

impl std::fmt::Debug for LocalPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalPlatform")
            .field("settings", &self.settings)
            .field("shutting_down", &self.shutting_down.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
