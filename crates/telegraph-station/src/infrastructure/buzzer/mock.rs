//! Recording listener for tests.
//!
//! Instead of making a sound, [`RecordingListener`] appends every callback to
//! an in-memory log so assertions can check exactly which edges arrived and
//! in what order.  It is public so integration tests in `tests/` can use it
//! too.
//!
//! ```ignore
//! let buzzer = Arc::new(RecordingListener::new());
//! let (session, events) = Session::start(config, buzzer.clone(), lookup).await?;
//! // ... peer presses and releases ...
//! assert_eq!(buzzer.edges(), vec![LineState::Asserted, LineState::Released]);
//! ```

use std::sync::Mutex;

use telegraph_core::LineState;
use tokio::sync::Notify;

use crate::application::signal::SignalListener;

/// A listener that records every edge it is told about.
#[derive(Debug, Default)]
pub struct RecordingListener {
    edges: Mutex<Vec<LineState>>,
    changed: Notify,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the edges received so far.
    pub fn edges(&self) -> Vec<LineState> {
        self.edges
            .lock()
            .map(|edges| edges.clone())
            .unwrap_or_default()
    }

    /// Waits until at least `count` edges have been recorded.
    pub async fn wait_for_edges(&self, count: usize) -> Vec<LineState> {
        loop {
            let notified = self.changed.notified();
            let edges = self.edges();
            if edges.len() >= count {
                return edges;
            }
            notified.await;
        }
    }

    fn record(&self, state: LineState) {
        if let Ok(mut edges) = self.edges.lock() {
            edges.push(state);
        }
        self.changed.notify_waiters();
    }
}

impl SignalListener for RecordingListener {
    fn on_asserted(&self) {
        self.record(LineState::Asserted);
    }

    fn on_released(&self) {
        self.record(LineState::Released);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_records_edges_in_order() {
        let listener = RecordingListener::new();
        listener.on_asserted();
        listener.on_released();
        assert_eq!(listener.edges(), vec![LineState::Asserted, LineState::Released]);
    }

    #[tokio::test]
    async fn test_wait_for_edges_wakes_on_record() {
        // Arrange
        let listener = Arc::new(RecordingListener::new());
        let waiter = {
            let listener = Arc::clone(&listener);
            tokio::spawn(async move { listener.wait_for_edges(1).await })
        };

        // Act
        tokio::task::yield_now().await;
        listener.on_asserted();

        // Assert
        let edges = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(edges, vec![LineState::Asserted]);
    }
}
