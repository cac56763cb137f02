//! Readiness state machine: whether the system has enough loaded state
//! (models and a non-empty gallery) to accept verification attempts.

use tokio::sync::watch;

/// Why the system failed to become ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// No gallery entries could be produced from the registry.
    NoUsableGallery,
    /// The external descriptor service could not load its models.
    ModelLoadFailure,
}

/// System readiness. `Loading` is the initial state; `Ready` and
/// `Failed` latch, and only an explicit reload returns to `Loading`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Loading,
    Ready,
    Failed(FailureReason),
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready)
    }

    /// Settled means no longer `Loading`.
    pub fn is_settled(&self) -> bool {
        !matches!(self, Readiness::Loading)
    }
}

/// Shared readiness cell over a watch channel. The engine owns the
/// cell; callers subscribe to await the Loading -> settled notification
/// instead of polling.
pub struct ReadinessCell {
    tx: watch::Sender<Readiness>,
}

impl ReadinessCell {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Readiness::Loading);
        Self { tx }
    }

    pub fn current(&self) -> Readiness {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Readiness> {
        self.tx.subscribe()
    }

    /// Latch `Ready`. Ignored unless currently `Loading`: readiness is a
    /// latch, not a toggle, and later extraction failures never revert it.
    pub(crate) fn set_ready(&self) {
        self.transition(Readiness::Ready);
    }

    /// Latch `Failed`. Ignored unless currently `Loading`.
    pub(crate) fn set_failed(&self, reason: FailureReason) {
        self.transition(Readiness::Failed(reason));
    }

    /// Return to `Loading` for an explicit externally-triggered reload.
    pub(crate) fn reset(&self) {
        self.tx.send_replace(Readiness::Loading);
        tracing::debug!("readiness reset to Loading");
    }

    fn transition(&self, next: Readiness) {
        self.tx.send_if_modified(|state| {
            if *state == Readiness::Loading {
                tracing::info!(to = ?next, "readiness settled");
                *state = next;
                true
            } else {
                tracing::debug!(current = ?*state, ignored = ?next, "readiness already settled");
                false
            }
        });
    }
}

impl Default for ReadinessCell {
    fn default() -> Self {
        Self::new()
    }
}
