//! Harness configuration.
//!
//! An explicit configuration struct stands in for the original's
//! class-level configuration annotation, with environment variables able to
//! override the paths and the deploy deadline the way the original honored
//! system properties.

use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Environment variable overriding [`HarnessConfig::module_dir`].
pub const ENV_MODULE_DIR: &str = "GANTRY_MODULE_DIR";

/// Environment variable overriding [`HarnessConfig::repo`].
pub const ENV_REPO: &str = "GANTRY_REPO";

/// Environment variable overriding [`HarnessConfig::deploy_timeout`],
/// in milliseconds.
pub const ENV_DEPLOY_TIMEOUT_MS: &str = "GANTRY_DEPLOY_TIMEOUT_MS";

/// What a scope does when its plan fails to deploy completely.
///
/// The original proceeded with the test no matter what happened during
/// setup. That is now an explicit choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// A failed, skipped, or timed-out entry aborts the scope; whatever did
    /// deploy is reversed first.
    #[default]
    Strict,

    /// Log, keep the partial outcome, and proceed (the original behavior).
    Lenient,
}

/// Configuration for a [`Harness`](crate::Harness).
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Advertised address handed to the platform.
    pub address: Option<String>,

    /// Advertised port handed to the platform.
    pub port: Option<u16>,

    /// Module directory; created at harness start when missing.
    pub module_dir: PathBuf,

    /// Optional secondary resource location.
    pub repo: Option<PathBuf>,

    /// Whether fixtures receive platform handles before starting.
    pub inject_resources: bool,

    /// Joint deadline for one scope's deployment fan-out.
    pub deploy_timeout: Duration,

    /// Deadline for the undeploy-all barrier at shutdown.
    pub shutdown_timeout: Duration,

    /// What setup failures do to the scope.
    pub failure_policy: FailurePolicy,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            address: None,
            port: None,
            module_dir: PathBuf::from("target/gantry-modules"),
            repo: None,
            inject_resources: true,
            deploy_timeout: Duration::from_millis(15_000),
            shutdown_timeout: Duration::from_secs(5),
            failure_policy: FailurePolicy::Strict,
        }
    }
}

impl HarnessConfig {
    /// Defaults with environment overrides already applied.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().apply_env_overrides()
    }

    /// Set the advertised address.
    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Set the advertised port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the module directory.
    #[must_use]
    pub fn with_module_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.module_dir = dir.into();
        self
    }

    /// Set the resource repository.
    #[must_use]
    pub fn with_repo(mut self, repo: impl Into<PathBuf>) -> Self {
        self.repo = Some(repo.into());
        self
    }

    /// Enable or disable fixture injection.
    #[must_use]
    pub const fn with_inject_resources(mut self, inject: bool) -> Self {
        self.inject_resources = inject;
        self
    }

    /// Set the joint deploy deadline.
    #[must_use]
    pub const fn with_deploy_timeout(mut self, timeout: Duration) -> Self {
        self.deploy_timeout = timeout;
        self
    }

    /// Set the shutdown deadline.
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set the failure policy.
    #[must_use]
    pub const fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Shortcut for the original's proceed-on-failure behavior.
    #[must_use]
    pub const fn lenient(self) -> Self {
        self.with_failure_policy(FailurePolicy::Lenient)
    }

    /// Apply environment overrides for paths and the deploy deadline.
    ///
    /// An unparseable timeout override is logged and ignored rather than
    /// failing harness construction.
    #[must_use]
    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(dir) = std::env::var(ENV_MODULE_DIR) {
            self.module_dir = PathBuf::from(dir);
        }
        if let Ok(repo) = std::env::var(ENV_REPO) {
            self.repo = Some(PathBuf::from(repo));
        }
        if let Ok(raw) = std::env::var(ENV_DEPLOY_TIMEOUT_MS) {
            match raw.parse::<u64>() {
                Ok(ms) => self.deploy_timeout = Duration::from_millis(ms),
                Err(_) => warn!(
                    value = %raw,
                    "ignoring unparseable {ENV_DEPLOY_TIMEOUT_MS} override"
                ),
            }
        }
        self
    }

    /// Search path for unit resource resolution: the module directory, then
    /// the repository when configured.
    #[must_use]
    pub fn search_path(&self) -> Vec<PathBuf> {
        let mut path = vec![self.module_dir.clone()];
        if let Some(repo) = &self.repo {
            path.push(repo.clone());
        }
        path
    }
}
