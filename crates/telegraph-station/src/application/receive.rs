//! SignalReceiver: reads the peer's line state and records press timing.
//!
//! # The receive loop (for beginners)
//!
//! ```text
//! loop {
//!     read up to 4 KiB           ← suspends until at least one byte arrives
//!     keep only the newest valid byte
//!     if the remote state changed:
//!         pressed  → remember key_down, listener.on_asserted()
//!         released → classify the press, append it, listener.on_released()
//! }
//! ```
//!
//! The loop ends on EOF, on any read error, or when the session shuts down.
//! It never reconnects by itself: it reports *why* it ended and the session
//! supervisor decides what to do with the connection.
//!
//! A lost stream cannot deliver the release of a press that was in progress,
//! so the supervisor calls [`SignalReceiver::reset_line`]: the line drops back
//! to released and the open press is discarded without producing a symbol.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use telegraph_core::{scan_latest_state, KeyingState, LineState, Symbol};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::application::shutdown::ShutdownSignal;
use crate::application::signal::SignalListener;

/// Size of a single read from the stream.
pub const READ_BUFFER_SIZE: usize = 4096;

/// Why a receive loop stopped.
#[derive(Debug)]
pub enum ReceiveExit {
    /// The peer closed the stream (EOF).
    Closed,
    /// A read failed.
    Failed(std::io::Error),
    /// The session is shutting down.
    Shutdown,
}

impl ReceiveExit {
    /// Whether the connection this loop was reading is now unusable.
    pub fn is_connection_loss(&self) -> bool {
        !matches!(self, ReceiveExit::Shutdown)
    }
}

impl std::fmt::Display for ReceiveExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReceiveExit::Closed => f.write_str("closed by peer"),
            ReceiveExit::Failed(e) => write!(f, "read failed: {e}"),
            ReceiveExit::Shutdown => f.write_str("shutdown"),
        }
    }
}

/// The Signal Receiver use case.
///
/// One instance lives for the whole session and is reused for every stream
/// the transport establishes.  Symbols already buffered survive a reconnect;
/// the remote line state does not (see [`SignalReceiver::reset_line`]).
pub struct SignalReceiver {
    listener: Arc<dyn SignalListener>,
    keying: Arc<Mutex<KeyingState>>,
    remote: watch::Sender<LineState>,
}

impl SignalReceiver {
    pub fn new(
        listener: Arc<dyn SignalListener>,
        keying: Arc<Mutex<KeyingState>>,
        remote: watch::Sender<LineState>,
    ) -> Self {
        Self {
            listener,
            keying,
            remote,
        }
    }

    /// Reads `reader` until it ends or `shutdown` fires.
    pub async fn run<R>(&self, mut reader: R, shutdown: ShutdownSignal) -> ReceiveExit
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        loop {
            let n = tokio::select! {
                _ = shutdown.wait() => return ReceiveExit::Shutdown,
                result = reader.read(&mut buf) => match result {
                    Ok(0) => return ReceiveExit::Closed,
                    Ok(n) => n,
                    Err(e) => return ReceiveExit::Failed(e),
                },
            };

            let scan = scan_latest_state(&buf[..n]);
            if scan.rejected > 0 {
                warn!("ignored {} unexpected byte(s) from peer", scan.rejected);
            }
            if let Some(state) = scan.latest {
                self.apply(state, tokio::time::Instant::now().into_std());
            }
        }
    }

    /// Applies a newly observed remote state at time `now`.
    ///
    /// Returns the symbol completed by a release edge, if any.  Repeated
    /// identical states are ignored.
    pub fn apply(&self, state: LineState, now: Instant) -> Option<Symbol> {
        let previous = self.remote.send_replace(state);
        if previous == state {
            return None;
        }

        match state {
            LineState::Asserted => {
                self.lock_keying().press(now);
                self.listener.on_asserted();
                None
            }
            LineState::Released => {
                let symbol = self.lock_keying().release(now);
                self.listener.on_released();
                if let Some(symbol) = symbol {
                    debug!("received {symbol:?}");
                }
                symbol
            }
        }
    }

    /// Forces the line back to released after the stream carrying it was lost.
    ///
    /// An open press is dropped without appending a symbol, and the listener
    /// hears a release if the line was asserted.  Returns whether it was.
    pub fn reset_line(&self, now: Instant) -> bool {
        let previous = self.remote.send_replace(LineState::Released);
        let abandoned = self.lock_keying().abandon_press(now);
        if abandoned {
            debug!("dropped the press cut off by the lost stream");
        }
        if previous == LineState::Asserted {
            self.listener.on_released();
            return true;
        }
        false
    }

    /// Current remote line state.
    pub fn remote_state(&self) -> LineState {
        *self.remote.borrow()
    }

    fn lock_keying(&self) -> std::sync::MutexGuard<'_, KeyingState> {
        self.keying.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
