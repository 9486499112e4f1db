//! Cooperative cancellation for the iteration loop.
//!
//! An interrupt never kills a task mid-flight. The signal handler only
//! sets a flag; the engine observes it at task and iteration
//! boundaries, checkpoints, and exits cleanly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A shared cancellation flag observed at engine boundaries.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Creates an unset flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flag; cannot be unset.
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once cancellation was requested.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Spawns a listener that trips the flag on Ctrl-C.
    ///
    /// Must be called from within a tokio runtime.
    pub fn listen_for_interrupt(&self) {
        let flag = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, will checkpoint at the next boundary");
                flag.trigger();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_starts_unset_and_latches() {
        let flag = CancelFlag::new();
        assert!(!flag.is_set());

        flag.trigger();
        assert!(flag.is_set());

        let clone = flag.clone();
        assert!(clone.is_set(), "clones observe the same flag");
    }
}
