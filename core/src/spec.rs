//! Deployment descriptors and plans.
//!
//! A [`DeploymentPlan`] declares what a test scope wants running before its
//! body executes: zero or more named modules and zero or more units resolved
//! by main identifier. Plans are plain data; the harness sequences them
//! against a platform.
//!
//! # Example
//!
//! ```ignore
//! let plan = DeploymentPlan::new()
//!     .module(ModuleSpec::new("auditlog"))
//!     .unit(
//!         UnitSpec::new("echo-unit")
//!             .with_config(ConfigSource::inline(r#"{"port": 0}"#))
//!             .with_instances(2),
//!     );
//! ```

use crate::config::ConfigSource;
use smallvec::SmallVec;
use std::path::PathBuf;

/// Descriptor for a packaged, named deployable module.
///
/// Modules are resolved by identifier against the platform's module
/// directory, never by explicit resource paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSpec {
    /// Module identifier.
    pub name: String,

    /// Configuration blob handed to the deployment.
    pub config: ConfigSource,

    /// Number of instances to start under one deployment handle.
    pub instances: usize,
}

impl ModuleSpec {
    /// Describe a module deployment with one instance and no configuration.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: ConfigSource::None,
            instances: 1,
        }
    }

    /// Set the configuration source.
    #[must_use]
    pub fn with_config(mut self, config: ConfigSource) -> Self {
        self.config = config;
        self
    }

    /// Set the instance count. Zero is clamped to one.
    #[must_use]
    pub fn with_instances(mut self, instances: usize) -> Self {
        self.instances = instances.max(1);
        self
    }
}

/// Descriptor for a unit deployed by main identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitSpec {
    /// Main identifier, resolved through the platform's unit catalog and
    /// resource search path.
    pub main: String,

    /// Configuration blob handed to the deployment.
    pub config: ConfigSource,

    /// Number of instances to start under one deployment handle.
    pub instances: usize,

    /// Marks a unit expected to do blocking work.
    pub worker: bool,

    /// Explicit resource roots made available to the unit, in addition to
    /// whatever the main identifier resolves to.
    pub include: Vec<PathBuf>,
}

impl UnitSpec {
    /// Describe a unit deployment with one instance and no configuration.
    #[must_use]
    pub fn new(main: impl Into<String>) -> Self {
        Self {
            main: main.into(),
            config: ConfigSource::None,
            instances: 1,
            worker: false,
            include: Vec::new(),
        }
    }

    /// Set the configuration source.
    #[must_use]
    pub fn with_config(mut self, config: ConfigSource) -> Self {
        self.config = config;
        self
    }

    /// Set the instance count. Zero is clamped to one.
    #[must_use]
    pub fn with_instances(mut self, instances: usize) -> Self {
        self.instances = instances.max(1);
        self
    }

    /// Mark the unit as a worker.
    #[must_use]
    pub const fn as_worker(mut self) -> Self {
        self.worker = true;
        self
    }

    /// Add an explicit resource root.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.include.push(path.into());
        self
    }
}

/// Identity of one plan entry within a scope.
///
/// Plans may list the same module or main identifier more than once, so the
/// key pairs the identifier with its ordinal position in the plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeploymentKey {
    /// A module entry: name and position among the plan's modules.
    Module {
        /// Module identifier.
        name: String,
        /// Zero-based position among the plan's module entries.
        ordinal: usize,
    },

    /// A unit entry: main identifier and position among the plan's units.
    Unit {
        /// Main identifier.
        main: String,
        /// Zero-based position among the plan's unit entries.
        ordinal: usize,
    },
}

impl std::fmt::Display for DeploymentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Module { name, ordinal } => write!(f, "module:{name}#{ordinal}"),
            Self::Unit { main, ordinal } => write!(f, "unit:{main}#{ordinal}"),
        }
    }
}

/// Everything one test scope wants deployed.
///
/// The singular and plural declarative forms of the original annotations
/// collapse into the same two lists.
#[derive(Debug, Clone, Default)]
pub struct DeploymentPlan {
    /// Module entries, in declaration order.
    pub modules: SmallVec<[ModuleSpec; 2]>,

    /// Unit entries, in declaration order.
    pub units: SmallVec<[UnitSpec; 2]>,
}

impl DeploymentPlan {
    /// An empty plan.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one module entry.
    #[must_use]
    pub fn module(mut self, spec: ModuleSpec) -> Self {
        self.modules.push(spec);
        self
    }

    /// Add several module entries.
    #[must_use]
    pub fn modules(mut self, specs: impl IntoIterator<Item = ModuleSpec>) -> Self {
        self.modules.extend(specs);
        self
    }

    /// Add one unit entry.
    #[must_use]
    pub fn unit(mut self, spec: UnitSpec) -> Self {
        self.units.push(spec);
        self
    }

    /// Add several unit entries.
    #[must_use]
    pub fn units(mut self, specs: impl IntoIterator<Item = UnitSpec>) -> Self {
        self.units.extend(specs);
        self
    }

    /// Total number of deployment entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len() + self.units.len()
    }

    /// Whether the plan requests no deployments at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty() && self.units.is_empty()
    }

    /// Keys of every entry, modules first, in declaration order.
    #[must_use]
    pub fn keys(&self) -> Vec<DeploymentKey> {
        let modules = self.modules.iter().enumerate().map(|(ordinal, m)| {
            DeploymentKey::Module {
                name: m.name.clone(),
                ordinal,
            }
        });
        let units = self
            .units
            .iter()
            .enumerate()
            .map(|(ordinal, u)| DeploymentKey::Unit {
                main: u.main.clone(),
                ordinal,
            });
        modules.chain(units).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_plan_has_no_entries() {
        let plan = DeploymentPlan::new();
        assert!(plan.is_empty());
        assert_eq!(plan.len(), 0);
        assert!(plan.keys().is_empty());
    }

    #[test]
    fn builder_collects_both_kinds() {
        let plan = DeploymentPlan::new()
            .module(ModuleSpec::new("auditlog"))
            .modules([ModuleSpec::new("mailer"), ModuleSpec::new("auditlog")])
            .unit(UnitSpec::new("echo-unit").with_instances(2));

        assert_eq!(plan.len(), 4);
        assert_eq!(plan.modules.len(), 3);
        assert_eq!(plan.units.len(), 1);
    }

    #[test]
    fn keys_disambiguate_repeated_identifiers() {
        let plan = DeploymentPlan::new()
            .module(ModuleSpec::new("auditlog"))
            .module(ModuleSpec::new("auditlog"));

        let keys = plan.keys();
        assert_eq!(keys.len(), 2);
        assert_ne!(keys[0], keys[1]);
        assert_eq!(keys[0].to_string(), "module:auditlog#0");
        assert_eq!(keys[1].to_string(), "module:auditlog#1");
    }

    #[test]
    fn instance_count_is_clamped_to_one() {
        let module = ModuleSpec::new("auditlog").with_instances(0);
        assert_eq!(module.instances, 1);

        let unit = UnitSpec::new("echo-unit").with_instances(0);
        assert_eq!(unit.instances, 1);
    }

    #[test]
    fn worker_and_paths_are_recorded() {
        let unit = UnitSpec::new("crunch-unit")
            .as_worker()
            .with_path("fixtures/data")
            .with_path("fixtures/extra");

        assert!(unit.worker);
        assert_eq!(unit.include.len(), 2);
    }
}
