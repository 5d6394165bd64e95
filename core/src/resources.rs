//! Resource-root resolution for unit deployments.
//!
//! A deployed unit may need filesystem roots to load artifacts from. Roots
//! come from two places: explicit paths declared on the unit spec, and the
//! unit's main identifier located as a file under the platform's search
//! path, in which case the hit's parent directory becomes a root.
//!
//! Resolution is lenient by contract: an entry that cannot be resolved is
//! skipped and reported, never fatal. Callers fold the skips into their
//! deploy report and decide what to do with them.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// One entry that could not be turned into a resource root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRoot {
    /// The explicit path or main identifier that failed to resolve.
    pub entry: String,

    /// Human-readable reason for the skip.
    pub reason: String,
}

/// Result of resolving a unit's resource roots.
///
/// `roots` has set semantics: duplicates collapse and order carries no
/// meaning.
#[derive(Debug, Clone, Default)]
pub struct ResolvedRoots {
    /// De-duplicated resource roots.
    pub roots: BTreeSet<PathBuf>,

    /// Entries that resolution dropped, with reasons.
    pub skipped: Vec<SkippedRoot>,
}

impl ResolvedRoots {
    /// Whether any entry failed to resolve.
    #[must_use]
    pub fn has_skips(&self) -> bool {
        !self.skipped.is_empty()
    }
}

/// Compute the resource roots for a unit deployment.
///
/// Explicit paths become roots directly (canonicalized when they exist; a
/// missing path is skipped with its I/O error as the reason). The main
/// identifier is then searched for as a relative file under each
/// `search_path` entry; the first hit contributes its parent directory. A
/// main identifier that resolves nowhere is skipped, not an error; a unit
/// may legitimately rely on explicit paths alone, or on none at all.
#[must_use]
pub fn resolve_roots(main: &str, explicit: &[PathBuf], search_path: &[PathBuf]) -> ResolvedRoots {
    let mut resolved = ResolvedRoots::default();

    for path in explicit {
        match path.canonicalize() {
            Ok(root) => {
                resolved.roots.insert(root);
            },
            Err(err) => resolved.skipped.push(SkippedRoot {
                entry: path.display().to_string(),
                reason: err.to_string(),
            }),
        }
    }

    match locate_main(main, search_path) {
        Some(parent) => {
            resolved.roots.insert(parent);
        },
        None => resolved.skipped.push(SkippedRoot {
            entry: main.to_owned(),
            reason: format!(
                "main identifier not found under {} search path entr{}",
                search_path.len(),
                if search_path.len() == 1 { "y" } else { "ies" }
            ),
        }),
    }

    resolved
}

/// Find `main` as a file under the search path and return its parent
/// directory.
fn locate_main(main: &str, search_path: &[PathBuf]) -> Option<PathBuf> {
    if main.is_empty() {
        return None;
    }

    for base in search_path {
        let candidate = base.join(main);
        if candidate.is_file() {
            let parent = candidate.parent().map_or_else(|| base.clone(), Path::to_path_buf);
            return parent.canonicalize().ok().or(Some(parent));
        }
    }

    None
}
