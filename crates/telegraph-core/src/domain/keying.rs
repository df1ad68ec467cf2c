//! Keying state: the symbol buffer and the timestamps that drive decoding.
//!
//! # How presses become words (for beginners)
//!
//! Every time the remote key is pressed we remember *when* (`key_down`).
//! When it is released we remember that too (`key_up`), measure the press,
//! and append a dot or a dash to the buffer.
//!
//! The decoder then watches the silence since the last release:
//!
//! ```text
//!  press  release      press release                          (silence)
//!    ▼       ▼           ▼     ▼
//! ───█████████───────────███████──────────────────────────────────────►
//!            │  1 unit   │     │◄──────────── flush gap ────────────►│
//!          DASH          DOT                                   flush ".-" ─► lookup
//!                                                                      │◄─ settle ─►│
//!                                                                                 " "
//! ```
//!
//! Under word granularity the whole run of symbols goes to the lookup as one
//! string.  With `split_letters` set, a press that follows at least a letter
//! gap of silence starts a new letter instead, and the flushed string carries
//! a space between the letter codes (`".... .."` for "HI").
//!
//! After a flush a single space is owed.  It is emitted once the line stays
//! quiet for the settle time, or as soon as a new press starts after at least
//! a full word gap of silence (the next word has begun).  A press that starts
//! sooner continues the current word and cancels the space.
//!
//! # Time is a parameter
//!
//! Every method takes `now: Instant` instead of reading the clock itself, so
//! the same code runs against the real clock in production and against a
//! simulated clock in tests.

use std::time::Instant;

use crate::domain::symbol::{classify_press, render, Symbol};
use crate::domain::timing::TimingConfig;

/// Result of one decoder poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing to emit this tick.
    Idle,
    /// The buffer was drained; the contained `.`/`-` string must be looked up.
    Flush(String),
    /// A single word-separating space is due.
    Space,
}

/// The symbol buffer plus its companion timestamps.
///
/// Not thread-safe on its own: the runtime keeps exactly one instance behind
/// a single mutex shared by the receiver and the decoder.
#[derive(Debug, Clone)]
pub struct KeyingState {
    timing: TimingConfig,
    symbols: Vec<Symbol>,
    letter_breaks: Vec<usize>,
    key_down: Option<Instant>,
    key_up: Option<Instant>,
    last_flush: Option<Instant>,
    space_pending: bool,
    space_due: bool,
}

impl KeyingState {
    pub fn new(timing: TimingConfig) -> Self {
        Self {
            timing,
            symbols: Vec::new(),
            letter_breaks: Vec::new(),
            key_down: None,
            key_up: None,
            last_flush: None,
            space_pending: false,
            space_due: false,
        }
    }

    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    /// Records the start of a press.
    pub fn press(&mut self, now: Instant) {
        let silence = self
            .key_up
            .map(|up| now.saturating_duration_since(up))
            .unwrap_or_default();
        if self.timing.split_letters
            && !self.symbols.is_empty()
            && silence >= self.timing.letter_gap()
            && self.letter_breaks.last() != Some(&self.symbols.len())
        {
            self.letter_breaks.push(self.symbols.len());
        }
        if self.space_pending {
            if silence >= self.timing.word_gap() {
                self.space_due = true;
            } else {
                self.space_pending = false;
            }
        }
        self.key_down = Some(now);
    }

    /// Records the end of a press and appends the classified symbol.
    ///
    /// Returns `None` (and only updates `key_up`) when no press was recorded,
    /// e.g. when a fresh connection starts with a release byte.
    pub fn release(&mut self, now: Instant) -> Option<Symbol> {
        self.key_up = Some(now);
        let down = self.key_down.take()?;
        let symbol = classify_press(now.saturating_duration_since(down), self.timing.unit);
        self.symbols.push(symbol);
        Some(symbol)
    }

    /// Drops a press whose release will never arrive (the stream carrying it
    /// was lost).  No symbol is appended; `now` counts as the release time so
    /// symbols buffered before the press still flush after the usual gap.
    ///
    /// Returns whether a press was open.
    pub fn abandon_press(&mut self, now: Instant) -> bool {
        if self.key_down.take().is_none() {
            return false;
        }
        self.key_up = Some(now);
        true
    }

    /// Inspects the silence since the last release and decides what, if
    /// anything, the decoder must emit.
    ///
    /// Draining the buffer and recording the flush happen in the same call,
    /// so a caller holding the lock for the duration of `poll` gets a
    /// consistent snapshot.
    pub fn poll(&mut self, now: Instant) -> PollOutcome {
        if self.space_due {
            self.space_due = false;
            self.space_pending = false;
            return PollOutcome::Space;
        }

        if self.key_down.is_some() {
            return PollOutcome::Idle;
        }

        if let Some(up) = self.key_up {
            if !self.symbols.is_empty()
                && now.saturating_duration_since(up) >= self.timing.flush_gap()
            {
                let word = self.render_pending();
                self.symbols.clear();
                self.letter_breaks.clear();
                self.last_flush = Some(now);
                self.space_pending = true;
                return PollOutcome::Flush(word);
            }
        }

        if self.space_pending && self.symbols.is_empty() {
            if let Some(flushed) = self.last_flush {
                if now.saturating_duration_since(flushed) >= self.timing.space_settle() {
                    self.space_pending = false;
                    return PollOutcome::Space;
                }
            }
        }

        PollOutcome::Idle
    }

    fn render_pending(&self) -> String {
        let mut start = 0;
        let mut letters = Vec::with_capacity(self.letter_breaks.len() + 1);
        for &end in &self.letter_breaks {
            letters.push(render(&self.symbols[start..end]));
            start = end;
        }
        letters.push(render(&self.symbols[start..]));
        letters.join(" ")
    }

    /// Symbols keyed since the last flush.
    pub fn pending(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn key_up_time(&self) -> Option<Instant> {
        self.key_up
    }

    pub fn is_pressed(&self) -> bool {
        self.key_down.is_some()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
