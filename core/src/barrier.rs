//! Bounded async-completion barrier.
//!
//! A [`CompletionBarrier`] tracks a fixed number of outstanding asynchronous
//! operations. Each operation holds a [`CompletionGuard`] and signals the
//! barrier exactly once, either by calling [`CompletionGuard::complete`] or by
//! dropping the guard. The barrier makes no distinction between success and
//! failure; it only counts signals.
//!
//! Waiters block until the count reaches zero or a deadline elapses. A timeout
//! is advisory: nothing is cancelled, and a slow operation may still signal
//! after the waiter has moved on.
//!
//! # Example
//!
//! ```ignore
//! let (mut barrier, guards) = CompletionBarrier::sized(2);
//! for guard in guards {
//!     tokio::spawn(async move {
//!         do_deploy().await;
//!         guard.complete();
//!     });
//! }
//! match barrier.wait_timeout(Duration::from_secs(15)).await {
//!     BarrierWait::Completed => { /* all deployments signalled */ },
//!     BarrierWait::TimedOut => { /* proceed anyway, log a diagnostic */ },
//! }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::watch;

/// Outcome of a timed barrier wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierWait {
    /// Every outstanding operation signalled before the deadline.
    Completed,

    /// The deadline elapsed with signals still outstanding.
    ///
    /// Timed-out operations are not cancelled; their signals may arrive
    /// after the wait has returned.
    TimedOut,
}

impl BarrierWait {
    /// Check whether the wait observed all signals.
    #[must_use]
    pub const fn is_completed(self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Barrier that resolves once a fixed number of completion signals arrive.
///
/// Constructed with [`CompletionBarrier::sized`], which hands back exactly one
/// [`CompletionGuard`] per expected signal. A barrier sized to zero is already
/// satisfied and waiting on it returns immediately.
pub struct CompletionBarrier {
    pending: Arc<AtomicUsize>,
    completion: watch::Receiver<()>,
    // Kept so that `changed()` never observes a closed channel while the
    // barrier itself is alive.
    _notifier: watch::Sender<()>,
}

impl CompletionBarrier {
    /// Create a barrier expecting `count` signals, along with its guards.
    ///
    /// Exactly `count` guards are returned; each signals the barrier once.
    /// There is no other way to signal, so the barrier can never be
    /// over-counted.
    #[must_use]
    pub fn sized(count: usize) -> (Self, Vec<CompletionGuard>) {
        let pending = Arc::new(AtomicUsize::new(count));
        let (tx, rx) = watch::channel(());

        let guards = (0..count)
            .map(|_| CompletionGuard {
                pending: Arc::clone(&pending),
                notifier: tx.clone(),
                fired: false,
            })
            .collect();

        let barrier = Self {
            pending,
            completion: rx,
            _notifier: tx,
        };

        (barrier, guards)
    }

    /// Create a barrier expecting a single signal.
    ///
    /// Convenience for the common "one async call, one wait" shape.
    #[must_use]
    pub fn single() -> (Self, CompletionGuard) {
        let (barrier, mut guards) = Self::sized(1);
        let Some(guard) = guards.pop() else {
            // sized(1) always yields one guard
            unreachable!()
        };
        (barrier, guard)
    }

    /// Create a barrier that is already satisfied.
    ///
    /// Waiting on it returns immediately. This is the zero-deployments case.
    #[must_use]
    pub fn completed() -> Self {
        Self::sized(0).0
    }

    /// Number of signals still outstanding.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Wait until every outstanding operation has signalled.
    ///
    /// Returns immediately if the barrier was sized to zero or all guards
    /// have already fired.
    pub async fn wait(&mut self) {
        while self.pending.load(Ordering::SeqCst) > 0 {
            // The sender half lives at least as long as `self`, so `changed`
            // only errs if every guard also fired, which the counter catches
            // on the next iteration.
            let _ = self.completion.changed().await;
        }
    }

    /// Wait for all signals, giving up after `timeout`.
    ///
    /// The wait never blocks past the deadline. A [`BarrierWait::TimedOut`]
    /// result is advisory: outstanding operations keep running and may still
    /// signal later.
    pub async fn wait_timeout(&mut self, timeout: Duration) -> BarrierWait {
        match tokio::time::timeout(timeout, self.wait()).await {
            Ok(()) => BarrierWait::Completed,
            Err(_) => BarrierWait::TimedOut,
        }
    }
}

impl std::fmt::Debug for CompletionBarrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionBarrier")
            .field("pending", &self.pending.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// One-shot completion signal for a single outstanding operation.
///
/// Signals its barrier exactly once: explicitly via [`complete`], or
/// implicitly when dropped. Dropping without completing still counts: a
/// deploy callback fires whether the deployment succeeded or failed, and the
/// barrier layer does not tell the two apart.
///
/// [`complete`]: CompletionGuard::complete
pub struct CompletionGuard {
    pending: Arc<AtomicUsize>,
    notifier: watch::Sender<()>,
    fired: bool,
}

impl CompletionGuard {
    /// Signal completion of this operation.
    pub fn complete(mut self) {
        self.fire();
    }

    fn fire(&mut self) {
        if self.fired {
            return;
        }
        self.fired = true;
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            // Last signal; wake all waiters.
            let _ = self.notifier.send(());
        }
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.fire();
    }
}

impl std::fmt::Debug for CompletionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionGuard")
            .field("fired", &self.fired)
            .finish_non_exhaustive()
    }
}
