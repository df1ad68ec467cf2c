//! SignalTransmitter: converts local key edges into wire bytes.
//!
//! The transmitter is *edge-triggered*: it remembers the last state it sent
//! and only writes when the requested state differs.  Pressing an already
//! pressed key produces no traffic at all.
//!
//! # Architecture
//!
//! The transmitter depends only on the [`SignalLink`] trait.  The TCP
//! transport implements it (and owns reconnection); tests use a recording
//! double.  A write that fails on a broken connection is retried on the new
//! connection inside `SignalLink::send_byte`, so by the time
//! [`SignalTransmitter::set_state`] returns the edge has either been written
//! or a fatal error is reported.

use std::sync::Arc;

use async_trait::async_trait;
use telegraph_core::{encode_state, LineState};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

/// Error type for the transmit use case.
#[derive(Debug, Error)]
pub enum TransmitError {
    /// The link could not deliver the byte and could not be re-established.
    #[error("link failure: {0}")]
    Link(String),
    /// The session is shutting down.
    #[error("link closed")]
    Closed,
}

/// Trait for writing one wire byte to the peer.
///
/// Implementations block (asynchronously) until the byte is written,
/// re-establishing the connection first if it is broken.
#[async_trait]
pub trait SignalLink: Send + Sync {
    async fn send_byte(&self, byte: u8) -> Result<(), TransmitError>;
}

/// The Signal Transmitter use case.
pub struct SignalTransmitter {
    link: Arc<dyn SignalLink>,
    outbound: Mutex<LineState>,
}

impl SignalTransmitter {
    /// Creates a transmitter whose recorded outbound state is `Released`.
    pub fn new(link: Arc<dyn SignalLink>) -> Self {
        Self {
            link,
            outbound: Mutex::new(LineState::Released),
        }
    }

    /// Presses the key.
    ///
    /// # Errors
    ///
    /// Returns [`TransmitError`] if the edge could not be delivered.
    pub async fn assert_signal(&self) -> Result<(), TransmitError> {
        self.set_state(LineState::Asserted).await
    }

    /// Releases the key.
    ///
    /// # Errors
    ///
    /// Returns [`TransmitError`] if the edge could not be delivered.
    pub async fn release_signal(&self) -> Result<(), TransmitError> {
        self.set_state(LineState::Released).await
    }

    /// Moves the outbound line to `state`, writing one byte if it changed.
    ///
    /// The outbound lock is held across the write so concurrent callers
    /// cannot reorder edges on the wire.
    ///
    /// # Errors
    ///
    /// Returns [`TransmitError`] if the edge could not be delivered.
    pub async fn set_state(&self, state: LineState) -> Result<(), TransmitError> {
        let mut current = self.outbound.lock().await;
        if *current == state {
            return Ok(());
        }
        *current = state;
        debug!("sending edge {state:?}");
        self.link.send_byte(encode_state(state)).await
    }

    /// The last state recorded for the local key.
    pub async fn outbound_state(&self) -> LineState {
        *self.outbound.lock().await
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── Test doubles ──────────────────────────────────────────────────────────

    #[derive(Default)]
    struct RecordingLink {
        bytes: std::sync::Mutex<Vec<u8>>,
        should_fail: bool,
    }

    #[async_trait]
    impl SignalLink for RecordingLink {
        async fn send_byte(&self, byte: u8) -> Result<(), TransmitError> {
            if self.should_fail {
                return Err(TransmitError::Link("injected failure".to_string()));
            }
            self.bytes.lock().unwrap().push(byte);
            Ok(())
        }
    }

    fn make_transmitter() -> (SignalTransmitter, Arc<RecordingLink>) {
        let link = Arc::new(RecordingLink::default());
        (SignalTransmitter::new(link.clone()), link)
    }

    #[tokio::test]
    async fn test_repeated_release_emits_nothing() {
        // Arrange – the line starts released.
        let (tx, link) = make_transmitter();

        // Act
        for _ in 0..10 {
            tx.release_signal().await.unwrap();
        }

        // Assert
        assert!(link.bytes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_repeated_assert_emits_one_byte() {
        let (tx, link) = make_transmitter();
        for _ in 0..5 {
            tx.assert_signal().await.unwrap();
        }
        assert_eq!(*link.bytes.lock().unwrap(), vec![b'1']);
    }

    #[tokio::test]
    async fn test_alternating_edges_emit_one_matching_byte_each() {
        // Arrange
        let (tx, link) = make_transmitter();

        // Act
        for _ in 0..4 {
            tx.assert_signal().await.unwrap();
            tx.release_signal().await.unwrap();
        }

        // Assert
        assert_eq!(*link.bytes.lock().unwrap(), b"10101010".to_vec());
    }

    #[tokio::test]
    async fn test_outbound_state_tracks_last_request() {
        let (tx, _link) = make_transmitter();
        assert_eq!(tx.outbound_state().await, LineState::Released);
        tx.assert_signal().await.unwrap();
        assert_eq!(tx.outbound_state().await, LineState::Asserted);
    }

    #[tokio::test]
    async fn test_link_failure_is_propagated() {
        let link = Arc::new(RecordingLink {
            should_fail: true,
            ..Default::default()
        });
        let tx = SignalTransmitter::new(link);

        let result = tx.assert_signal().await;

        assert!(matches!(result, Err(TransmitError::Link(_))));
    }

    #[tokio::test]
    async fn test_concurrent_callers_never_duplicate_an_edge() {
        // Arrange
        let (tx, link) = make_transmitter();
        let tx = Arc::new(tx);

        // Act – sixteen tasks all try to press the key at once.
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let tx = Arc::clone(&tx);
                tokio::spawn(async move { tx.assert_signal().await })
            })
            .collect();
        for h in handles {
            h.await.unwrap().unwrap();
        }

        // Assert
        assert_eq!(*link.bytes.lock().unwrap(), vec![b'1']);
    }
}
