//! Scriptable platform double shared by the crate's test modules.

use async_trait::async_trait;
use gantry_core::platform::{
    DeploymentId, ModuleDeployment, Platform, PlatformError, UnitDeployment,
};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Route harness logs through the test writer; honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// How the mock answers a deploy call for a given identifier.
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    /// Complete immediately.
    Succeed,

    /// Complete after a delay.
    SucceedAfter(Duration),

    /// Return a start failure.
    Fail,

    /// Never complete.
    Hang,
}

/// In-memory [`Platform`] with per-identifier scripted behavior.
///
/// Identifiers without a scripted behavior succeed immediately; the mock
/// needs no catalog.
pub struct MockPlatform {
    behaviors: Mutex<HashMap<String, Behavior>>,
    active: Mutex<Vec<DeploymentId>>,
    next: AtomicUsize,
    undeploy_all_delay: Mutex<Option<Duration>>,

    /// Deploy calls observed, either kind.
    pub deploy_calls: AtomicUsize,

    /// Single-handle undeploy calls observed.
    pub undeploy_calls: AtomicUsize,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self {
            behaviors: Mutex::new(HashMap::new()),
            active: Mutex::new(Vec::new()),
            next: AtomicUsize::new(1),
            undeploy_all_delay: Mutex::new(None),
            deploy_calls: AtomicUsize::new(0),
            undeploy_calls: AtomicUsize::new(0),
        }
    }

    /// Script the response for an identifier.
    pub fn set_behavior(&self, ident: &str, behavior: Behavior) {
        #[allow(clippy::unwrap_used)] // Test code: lock cannot be poisoned
        self.behaviors
            .lock()
            .unwrap()
            .insert(ident.to_owned(), behavior);
    }

    /// Make `undeploy_all` sleep before answering.
    pub fn set_undeploy_all_delay(&self, delay: Duration) {
        #[allow(clippy::unwrap_used)] // Test code: lock cannot be poisoned
        {
            *self.undeploy_all_delay.lock().unwrap() = Some(delay);
        }
    }

    async fn deploy(&self, ident: &str) -> Result<DeploymentId, PlatformError> {
        self.deploy_calls.fetch_add(1, Ordering::SeqCst);

        #[allow(clippy::unwrap_used)] // Test code: lock cannot be poisoned
        let behavior = self
            .behaviors
            .lock()
            .unwrap()
            .get(ident)
            .copied()
            .unwrap_or(Behavior::Succeed);

        match behavior {
            Behavior::Succeed => {},
            Behavior::SucceedAfter(delay) => tokio::time::sleep(delay).await,
            Behavior::Fail => {
                return Err(PlatformError::StartFailed {
                    ident: ident.to_owned(),
                    source: anyhow::anyhow!("scripted failure"),
                });
            },
            Behavior::Hang => std::future::pending::<()>().await,
        }

        let id = DeploymentId::new(format!("mock-{}", self.next.fetch_add(1, Ordering::SeqCst)));
        #[allow(clippy::unwrap_used)] // Test code: lock cannot be poisoned
        self.active.lock().unwrap().push(id.clone());
        Ok(id)
    }
}

#[async_trait]
impl Platform for MockPlatform {
    async fn deploy_module(&self, req: ModuleDeployment) -> Result<DeploymentId, PlatformError> {
        self.deploy(&req.name).await
    }

    async fn deploy_unit(&self, req: UnitDeployment) -> Result<DeploymentId, PlatformError> {
        self.deploy(&req.main).await
    }

    async fn undeploy(&self, id: &DeploymentId) -> Result<(), PlatformError> {
        self.undeploy_calls.fetch_add(1, Ordering::SeqCst);

        #[allow(clippy::unwrap_used)] // Test code: lock cannot be poisoned
        let mut active = self.active.lock().unwrap();
        let Some(position) = active.iter().position(|a| a == id) else {
            return Err(PlatformError::NotDeployed(id.clone()));
        };
        active.remove(position);
        Ok(())
    }

    async fn undeploy_all(&self) -> usize {
        #[allow(clippy::unwrap_used)] // Test code: lock cannot be poisoned
        let delay = *self.undeploy_all_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        #[allow(clippy::unwrap_used)] // Test code: lock cannot be poisoned
        let mut active = self.active.lock().unwrap();
        let count = active.len();
        active.clear();
        count
    }

    async fn active(&self) -> Vec<DeploymentId> {
        #[allow(clippy::unwrap_used)] // Test code: lock cannot be poisoned
        self.active.lock().unwrap().clone()
    }
}
