//! # Gantry Runtime
//!
//! In-process reference platform for the gantry deployment harness.
//!
//! This crate provides [`LocalPlatform`], a deployment container that runs
//! units inside the current tokio runtime, plus the [`Unit`] trait deployable
//! code implements and the [`UnitCatalog`] that resolves module and unit
//! identifiers to factories.
//!
//! ## Core Components
//!
//! - **`Unit`**: start/stop lifecycle of one deployable instance
//! - **`UnitCatalog`**: identifier → factory registry shared with the platform
//! - **`LocalPlatform`**: implements `gantry_core::Platform` over tokio
//!
//! ## Example
//!
//! ```ignore
//! use gantry_runtime::{LocalPlatform, UnitCatalog};
//!
//! let catalog = UnitCatalog::new();
//! catalog.register("echo-unit", || Box::new(EchoUnit::default()));
//!
//! let platform = LocalPlatform::builder()
//!     .module_dir("target/gantry-modules")
//!     .catalog(catalog)
//!     .build()?;
//!
//! let id = platform.deploy_unit(request).await?;
//! platform.undeploy(&id).await?;
//! ```

/// Unit catalog: identifier → factory.
pub mod catalog;

/// In-process reference platform.
pub mod local;

/// Deployable unit trait and per-instance context.
pub mod unit;

pub use catalog::UnitCatalog;
pub use local::{LocalPlatform, LocalPlatformBuilder, PlatformSettings};
pub use unit::{ShutdownSignal, Unit, UnitContext};
