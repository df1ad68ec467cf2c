//! Morse symbol ↔ letter lookup.
//!
//! The runtime only ever talks to the [`MorseLookup`] trait, so a caller can
//! swap in a different table (or a test double) without touching the
//! decoder.  [`InternationalMorse`] is the table shipped with the crate: the
//! 26 letters and 10 digits of the ITU alphabet.  Punctuation and prosigns
//! are not part of it.

mod table;

pub use table::ITU_TABLE;

/// Character returned for a code that is not in the table.
pub const UNKNOWN: char = '?';

/// Converts between keyed symbol strings and text.
#[cfg_attr(test, mockall::automock)]
pub trait MorseLookup: Send + Sync {
    /// Decodes a `.`/`-` string into text.
    ///
    /// Whitespace separates letter codes, so `".- -..."` decodes to `"AB"`.
    /// Unknown codes decode to [`UNKNOWN`].  Must be a pure function.
    fn decode(&self, symbols: &str) -> String;

    /// Returns the `.`/`-` code for one character, if the table has one.
    fn encode(&self, c: char) -> Option<String>;
}

/// The ITU letters-and-digits table.
#[derive(Debug, Clone, Copy, Default)]
pub struct InternationalMorse;

impl InternationalMorse {
    pub fn new() -> Self {
        Self
    }

    fn letter_for(code: &str) -> Option<char> {
        ITU_TABLE
            .iter()
            .find(|(_, c)| *c == code)
            .map(|(letter, _)| *letter)
    }

    fn code_for(letter: char) -> Option<&'static str> {
        let upper = letter.to_ascii_uppercase();
        ITU_TABLE
            .iter()
            .find(|(l, _)| *l == upper)
            .map(|(_, code)| *code)
    }
}

impl MorseLookup for InternationalMorse {
    fn decode(&self, symbols: &str) -> String {
        symbols
            .split_whitespace()
            .map(|code| Self::letter_for(code).unwrap_or(UNKNOWN))
            .collect()
    }

    fn encode(&self, c: char) -> Option<String> {
        Self::code_for(c).map(str::to_string)
    }
}
