//! # Gantry Core
//!
//! Core types and traits for the gantry deployment harness.
//!
//! This crate provides the vocabulary shared by the in-process platform and
//! the test harness:
//!
//! - **`DeploymentPlan`**: what a test scope wants running (modules by name,
//!   units by main identifier)
//! - **`ConfigSource`**: opaque JSON configuration, inline or `file:`-backed
//! - **`Platform`**: the container abstraction deployments run on
//! - **`CompletionBarrier`**: blocks until N async completions or a deadline
//! - **`DeploymentSet`**: per-scope records so teardown reverses exactly
//!   what setup started
//! - **`resolve_roots`**: resource-root resolution for unit deployments
//!
//! ## Design Principles
//!
//! - Plans are plain data; sequencing lives in `gantry-harness`
//! - Deployment handles are owned by the scope that created them
//! - Timeouts are advisory at the barrier layer; policy belongs to callers
//! - Partial failures are reported, never silently swallowed
//!
//! ## Example
//!
//! ```ignore
//! use gantry_core::{ConfigSource, DeploymentPlan, ModuleSpec, UnitSpec};
//!
//! let plan = DeploymentPlan::new()
//!     .module(ModuleSpec::new("auditlog").with_config(ConfigSource::parse("file:cfg/audit.json")))
//!     .unit(UnitSpec::new("echo-unit").with_instances(2));
//! ```

/// Bounded async-completion barrier.
pub mod barrier;

/// Unit configuration sources (inline or `file:`-backed JSON).
pub mod config;

/// Host-platform abstraction and deployment handles.
pub mod platform;

/// Per-scope deployment records.
pub mod registry;

/// Resource-root resolution for unit deployments.
pub mod resources;

/// Deployment descriptors and plans.
pub mod spec;

pub use barrier::{BarrierWait, CompletionBarrier, CompletionGuard};
pub use config::{ConfigError, ConfigSource};
pub use platform::{DeploymentId, ModuleDeployment, Platform, PlatformError, UnitDeployment};
pub use registry::{DeploymentRecord, DeploymentSet};
pub use resources::{ResolvedRoots, SkippedRoot, resolve_roots};
pub use spec::{DeploymentKey, DeploymentPlan, ModuleSpec, UnitSpec};

// Re-export commonly used externals, matching how downstream crates consume
// configuration blobs.
pub use serde_json::Value;
