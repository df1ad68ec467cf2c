//! TimingDecoder: turns silence on the line into decoded text.
//!
//! The receiver only appends symbols; it has no idea when a word ends.  The
//! decoder supplies that missing piece by polling the shared
//! [`KeyingState`] every `poll_interval` and asking it whether enough idle
//! time has passed to flush the buffer (see `KeyingState::poll`).
//!
//! Lookups run *outside* the keying lock so a slow table never delays the
//! receiver's next append.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use telegraph_core::{KeyingState, MorseLookup, PollOutcome};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::application::events::SessionEvent;
use crate::application::shutdown::ShutdownSignal;

/// The Timing Decoder use case.
pub struct TimingDecoder {
    keying: Arc<Mutex<KeyingState>>,
    lookup: Arc<dyn MorseLookup>,
    events: mpsc::Sender<SessionEvent>,
}

impl TimingDecoder {
    pub fn new(
        keying: Arc<Mutex<KeyingState>>,
        lookup: Arc<dyn MorseLookup>,
        events: mpsc::Sender<SessionEvent>,
    ) -> Self {
        Self {
            keying,
            lookup,
            events,
        }
    }

    /// Polls until `shutdown` fires or nobody is listening for events.
    pub async fn run(self, shutdown: ShutdownSignal) {
        let poll_interval = self.lock_keying().timing().poll_interval;
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                _ = ticker.tick() => {}
            }

            let Some(text) = self.tick(tokio::time::Instant::now().into_std()) else {
                continue;
            };
            if self.events.send(SessionEvent::Decoded(text)).await.is_err() {
                debug!("event receiver dropped; decoder stopping");
                break;
            }
        }
    }

    /// Runs one poll at time `now` and returns text to emit, if any.
    pub fn tick(&self, now: Instant) -> Option<String> {
        let outcome = self.lock_keying().poll(now);
        match outcome {
            PollOutcome::Idle => None,
            PollOutcome::Flush(code) => {
                let text = self.lookup.decode(&code);
                info!("decoded {code:?} as {text:?}");
                Some(text)
            }
            PollOutcome::Space => Some(" ".to_string()),
        }
    }

    fn lock_keying(&self) -> std::sync::MutexGuard<'_, KeyingState> {
        self.keying.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
