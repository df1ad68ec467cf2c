//! Timing thresholds for decoding.
//!
//! All thresholds are multiples of one base *time unit*, the nominal length
//! of a dot:
//!
//! | Threshold      | Multiple | Meaning                                        |
//! |----------------|----------|------------------------------------------------|
//! | `unit`         | 1        | presses longer than this are dashes            |
//! | `letter_gap`   | 3        | silence ending a letter                        |
//! | `word_gap`     | 7        | silence ending a word                          |
//! | `space_settle` | 4.5      | silence after a flush before a space is output |

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default base time unit (one dot).
pub const DEFAULT_TIME_UNIT: Duration = Duration::from_millis(200);

/// Default interval between decoder polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Longest base time unit accepted from configuration.
pub const MAX_TIME_UNIT: Duration = Duration::from_secs(60);

/// How much keyed material is handed to the lookup at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeGranularity {
    /// Flush only at a word gap; the whole word is looked up in one call.
    #[default]
    Word,
    /// Flush at every letter gap; each letter is looked up on its own.
    Letter,
}

/// Base time unit plus the decoder settings derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingConfig {
    pub unit: Duration,
    pub poll_interval: Duration,
    pub granularity: DecodeGranularity,
    /// Under [`DecodeGranularity::Word`], separate letter codes with a space
    /// wherever a letter gap was keyed.  Off by default: a word is handed to
    /// the lookup as one unbroken run of symbols.
    pub split_letters: bool,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            unit: DEFAULT_TIME_UNIT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            granularity: DecodeGranularity::Word,
            split_letters: false,
        }
    }
}

impl TimingConfig {
    /// Builds a config with the given unit and default poll interval.
    pub fn with_unit(unit: Duration) -> Self {
        Self {
            unit,
            ..Self::default()
        }
    }

    pub fn letter_gap(&self) -> Duration {
        self.unit.saturating_mul(3)
    }

    pub fn word_gap(&self) -> Duration {
        self.unit.saturating_mul(7)
    }

    /// Silence after the last flush before a single word-separating space.
    pub fn space_settle(&self) -> Duration {
        self.unit.saturating_mul(9) / 2
    }

    /// Idle time after which buffered symbols are flushed to the lookup.
    pub fn flush_gap(&self) -> Duration {
        match self.granularity {
            DecodeGranularity::Word => self.word_gap(),
            DecodeGranularity::Letter => self.letter_gap(),
        }
    }
}
