//! Unit catalog: identifier → factory.
//!
//! The in-process analog of resolving a packaged module by name. Test
//! setup registers a factory per identifier; the platform instantiates a
//! fresh unit per requested instance on deploy. Module names and unit main
//! identifiers share one namespace.
//!
//! The catalog is cheaply cloneable and all clones share the same factory
//! table, so registration can happen before or after the platform is built.

use crate::unit::Unit;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

type UnitFactory = Box<dyn Fn() -> Box<dyn Unit> + Send + Sync>;

/// Shared registry of unit factories.
#[derive(Clone, Default)]
pub struct UnitCatalog {
    factories: Arc<RwLock<HashMap<String, UnitFactory>>>,
}

impl UnitCatalog {
    /// An empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under an identifier.
    ///
    /// A later registration under the same identifier replaces the earlier
    /// one.
    ///
    /// # Panics
    ///
    /// Panics if the factory table lock is poisoned, which only happens if
    /// another registration panicked.
    pub fn register<F>(&self, ident: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Unit> + Send + Sync + 'static,
    {
        #[allow(clippy::unwrap_used)] // Lock poison is unrecoverable
        self.factories
            .write()
            .unwrap()
            .insert(ident.into(), Box::new(factory));
    }

    /// Instantiate a fresh unit for an identifier.
    ///
    /// Returns `None` when nothing is registered under it.
    ///
    /// # Panics
    ///
    /// Panics if the factory table lock is poisoned.
    #[must_use]
    pub fn create(&self, ident: &str) -> Option<Box<dyn Unit>> {
        #[allow(clippy::unwrap_used)] // Lock poison is unrecoverable
        self.factories.read().unwrap().get(ident).map(|f| f())
    }

    /// Whether an identifier is registered.
    ///
    /// # Panics
    ///
    /// Panics if the factory table lock is poisoned.
    #[must_use]
    pub fn contains(&self, ident: &str) -> bool {
        #[allow(clippy::unwrap_used)] // Lock poison is unrecoverable
        self.factories.read().unwrap().contains_key(ident)
    }

    /// Registered identifiers, sorted.
    ///
    /// # Panics
    ///
    /// Panics if the factory table lock is poisoned.
    #[must_use]
    pub fn idents(&self) -> Vec<String> {
        #[allow(clippy::unwrap_used)] // Lock poison is unrecoverable
        let mut idents: Vec<String> = self.factories.read().unwrap().keys().cloned().collect();
        idents.sort();
        idents
    }
}

impl std::fmt::Debug for UnitCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitCatalog")
            .field("idents", &self.idents())
            .finish_non_exhaustive()
    }
}
