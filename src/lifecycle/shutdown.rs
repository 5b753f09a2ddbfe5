//! Shutdown coordination and cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

/// Returned from [`CancelFlag::checkpoint`] once cancellation was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// Shared cancellation flag, polled by blocking rebuild work.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once [`cancel`](Self::cancel) has been called.
    pub fn checkpoint(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Coordinator for graceful shutdown.
///
/// Async tasks subscribe to the broadcast channel; blocking work observes
/// the [`CancelFlag`].
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    cancel: CancelFlag,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::with_cancel_flag(CancelFlag::new())
    }

    /// Share `cancel` with whoever runs rebuilds (usually the registry).
    pub fn with_cancel_flag(cancel: CancelFlag) -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx, cancel }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Trigger the shutdown signal and cancel in-flight rebuilds.
    pub fn trigger(&self) {
        self.cancel.cancel();
        let _ = self.tx.send(());
    }

    pub fn is_triggered(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_sets_shared_flag() {
        let flag = CancelFlag::new();
        let shutdown = Shutdown::with_cancel_flag(flag.clone());
        assert_eq!(flag.checkpoint(), Ok(()));

        shutdown.trigger();
        assert!(shutdown.is_triggered());
        assert_eq!(flag.checkpoint(), Err(Cancelled));
    }

    #[tokio::test]
    async fn test_subscribers_are_notified() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();
        shutdown.trigger();
        assert!(rx.recv().await.is_ok());
    }
}
