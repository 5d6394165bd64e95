//! Deployable unit trait and per-instance context.
//!
//! A unit is a piece of application logic the platform can bring up and
//! tear down. `start` completing is the deploy-completion signal the harness
//! waits on; `stop` reverses it. A unit that runs background work spawns its
//! own tasks and winds them down when the context's shutdown signal fires.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tokio::sync::watch;

/// A deployable unit of application logic.
///
/// Implementations are created by a [`UnitCatalog`](crate::UnitCatalog)
/// factory, one per requested instance.
///
/// # Example
///
/// ```ignore
/// struct EchoUnit { started: bool }
///
/// #[async_trait]
/// impl Unit for EchoUnit {
///     async fn start(&mut self, ctx: UnitContext) -> anyhow::Result<()> {
///         let port = ctx.config()["port"].as_u64().unwrap_or(0);
///         self.started = true;
///         Ok(())
///     }
///
///     async fn stop(&mut self) -> anyhow::Result<()> {
///         self.started = false;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Unit: Send {
    /// Bring the unit up.
    ///
    /// Returning `Ok` signals deploy completion for this instance. Spawned
    /// background work should observe [`UnitContext::shutdown`] and wind
    /// down when it fires.
    ///
    /// # Errors
    ///
    /// A start error fails the whole deployment request; instances already
    /// started under the same request are stopped again.
    async fn start(&mut self, ctx: UnitContext) -> anyhow::Result<()>;

    /// Reverse `start`.
    ///
    /// # Errors
    ///
    /// Stop errors are aggregated by the platform and logged; they do not
    /// interrupt the teardown of sibling instances.
    async fn stop(&mut self) -> anyhow::Result<()>;
}

/// Observation side of the platform's per-deployment shutdown signal.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
    // Present only for detached signals, so the channel outlives the
    // platform that would normally own the sender.
    _keepalive: Option<std::sync::Arc<watch::Sender<bool>>>,
}

impl ShutdownSignal {
    pub(crate) const fn new(rx: watch::Receiver<bool>) -> Self {
        Self {
            rx,
            _keepalive: None,
        }
    }

    /// A signal that never fires, for driving units outside a platform.
    #[must_use]
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            rx,
            _keepalive: Some(std::sync::Arc::new(tx)),
        }
    }

    /// Whether shutdown has been requested.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown is requested.
    ///
    /// Also resolves if the platform side goes away entirely.
    pub async fn requested(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Everything a unit instance receives at start.
#[derive(Debug, Clone)]
pub struct UnitContext {
    config: Value,
    resource_roots: BTreeSet<PathBuf>,
    instance: usize,
    worker: bool,
    shutdown: ShutdownSignal,
}

impl UnitContext {
    /// Assemble a context.
    ///
    /// The platform does this on deploy; tests driving a unit directly can
    /// combine it with [`ShutdownSignal::never`].
    #[must_use]
    pub const fn new(
        config: Value,
        resource_roots: BTreeSet<PathBuf>,
        instance: usize,
        worker: bool,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            config,
            resource_roots,
            instance,
            worker,
            shutdown,
        }
    }

    /// The deployment's configuration blob, unmodified.
    #[must_use]
    pub const fn config(&self) -> &Value {
        &self.config
    }

    /// De-duplicated resource roots available to this unit.
    #[must_use]
    pub const fn resource_roots(&self) -> &BTreeSet<PathBuf> {
        &self.resource_roots
    }

    /// Zero-based index of this instance within its deployment.
    #[must_use]
    pub const fn instance(&self) -> usize {
        self.instance
    }

    /// Worker marking from the deployment request.
    ///
    /// Advisory: units doing blocking work are expected to reach for the
    /// blocking pool themselves.
    #[must_use]
    pub const fn is_worker(&self) -> bool {
        self.worker
    }

    /// Shutdown signal for background work spawned by the unit.
    #[must_use]
    pub fn shutdown(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }
}
