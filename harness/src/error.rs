//! Harness error types.

use crate::report::DeployReport;
use gantry_core::platform::PlatformError;
use thiserror::Error;

/// Errors surfaced by harness lifecycle operations.
#[derive(Error, Debug)]
pub enum HarnessError {
    /// A scope's deployment setup failed under the strict failure policy.
    ///
    /// The report names every entry that failed, was skipped, or was still
    /// pending when the deadline elapsed. Deployments that did complete
    /// were reversed before this error was returned.
    #[error("deployment setup failed: {0}")]
    SetupFailed(DeployReport),

    /// The test's own fixture failed to start.
    ///
    /// This is fatal to the test; the original behavior for every other
    /// failure class is lenient, but a fixture that cannot start has
    /// nothing meaningful to run.
    #[error("fixture failed to start: {source}")]
    FixtureFailed {
        /// Error reported by the fixture.
        #[source]
        source: anyhow::Error,
    },

    /// A platform call failed outside plan sequencing.
    #[error(transparent)]
    Platform(#[from] PlatformError),
}
