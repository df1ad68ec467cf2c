//! Cooperative cancellation for a session's background loops.
//!
//! Every loop (receiver, decoder, supervisor) and every blocking wait in the
//! transport (accept, dial backoff) races its work against
//! [`ShutdownSignal::wait`].  Triggering the signal once stops them all,
//! which lets tests end a session deterministically.

use std::sync::Arc;

use tokio::sync::watch;

/// A cloneable, one-way shutdown flag.
///
/// All clones observe the same flag.  Once triggered it stays triggered.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Requests shutdown.  Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Completes once shutdown has been requested.
    ///
    /// Returns immediately if it already was.
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        // The sender lives as long as any clone of `self`, so this only
        // errors if the flag can never change; treat that as shut down.
        let _ = rx.wait_for(|triggered| *triggered).await;
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_new_signal_is_not_triggered() {
        assert!(!ShutdownSignal::new().is_triggered());
    }

    #[test]
    fn test_trigger_is_visible_to_clones() {
        let signal = ShutdownSignal::new();
        let clone = signal.clone();
        signal.trigger();
        assert!(clone.is_triggered());
    }

    #[tokio::test]
    async fn test_wait_completes_after_trigger() {
        // Arrange
        let signal = ShutdownSignal::new();
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.wait().await })
        };

        // Act
        signal.trigger();

        // Assert
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("wait must complete promptly")
            .expect("waiter task must not panic");
    }

    #[tokio::test]
    async fn test_wait_returns_immediately_when_already_triggered() {
        let signal = ShutdownSignal::new();
        signal.trigger();
        tokio_test::assert_ready!(tokio_test::task::spawn(signal.wait()).poll());
    }
}
