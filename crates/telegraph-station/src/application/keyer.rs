//! Keyer: sends typed text to the peer as correctly timed key edges.
//!
//! A human operator keys with their hand; the keyer does the same job from a
//! line of text.  Each character is encoded with the morse lookup and played
//! through the [`SignalTransmitter`] with these timings (in units):
//!
//! | element           | duration |
//! |-------------------|----------|
//! | dot press         | ½        |
//! | dash press        | 2        |
//! | gap inside letter | 1        |
//! | gap after letter  | 3        |
//! | gap after word    | 7        |
//!
//! Dot and dash lengths sit well clear of the one-unit classification
//! boundary so network jitter cannot flip a symbol.

use std::sync::Arc;
use std::time::Duration;

use telegraph_core::{LineState, MorseLookup, Symbol};
use tracing::{debug, warn};

use crate::application::transmit::{SignalTransmitter, TransmitError};

/// One step of a keying plan: move the line to `state`, then hold it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyStep {
    pub state: LineState,
    pub hold: Duration,
}

/// Builds the edge sequence for `text`.
///
/// Characters the lookup cannot encode are skipped with a warning.  The plan
/// always ends released and followed by a full word gap, so consecutive
/// calls never run words together.
pub fn plan(text: &str, lookup: &dyn MorseLookup, unit: Duration) -> Vec<KeyStep> {
    let mut steps = Vec::new();

    for word in text.split_whitespace() {
        for c in word.chars() {
            let Some(code) = lookup.encode(c) else {
                warn!("cannot key {c:?}: not in the morse table");
                continue;
            };
            for symbol in code.chars().filter_map(Symbol::from_char) {
                let press = match symbol {
                    Symbol::Dot => unit / 2,
                    Symbol::Dash => unit * 2,
                };
                steps.push(KeyStep {
                    state: LineState::Asserted,
                    hold: press,
                });
                steps.push(KeyStep {
                    state: LineState::Released,
                    hold: unit,
                });
            }
            stretch_last_gap(&mut steps, unit * 3);
        }
        stretch_last_gap(&mut steps, unit * 7);
    }

    steps
}

fn stretch_last_gap(steps: &mut [KeyStep], gap: Duration) {
    if let Some(last) = steps.last_mut() {
        if last.state == LineState::Released && last.hold < gap {
            last.hold = gap;
        }
    }
}

/// Plays text through a transmitter.
pub struct Keyer {
    transmitter: Arc<SignalTransmitter>,
    lookup: Arc<dyn MorseLookup>,
    unit: Duration,
}

impl Keyer {
    pub fn new(
        transmitter: Arc<SignalTransmitter>,
        lookup: Arc<dyn MorseLookup>,
        unit: Duration,
    ) -> Self {
        Self {
            transmitter,
            lookup,
            unit,
        }
    }

    /// Keys `text`, returning once the final gap has elapsed.
    ///
    /// # Errors
    ///
    /// Returns the first [`TransmitError`]; the line is left in whatever
    /// state the failed edge requested.
    pub async fn key_text(&self, text: &str) -> Result<(), TransmitError> {
        let steps = plan(text, self.lookup.as_ref(), self.unit);
        debug!("keying {text:?} as {} edges", steps.len());
        for step in steps {
            self.transmitter.set_state(step.state).await?;
            tokio::time::sleep(step.hold).await;
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
