//! Morse symbols and press-duration classification.

use std::time::Duration;

/// A single morse element derived from one press of the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    Dot,
    Dash,
}

impl Symbol {
    /// Returns the conventional character for this symbol (`.` or `-`).
    pub fn as_char(self) -> char {
        match self {
            Symbol::Dot => '.',
            Symbol::Dash => '-',
        }
    }

    /// Parses `.` or `-` back into a symbol.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '.' => Some(Symbol::Dot),
            '-' => Some(Symbol::Dash),
            _ => None,
        }
    }
}

/// Classifies a completed press.
///
/// A press strictly longer than `unit` is a [`Symbol::Dash`]; anything up to
/// and including `unit` is a [`Symbol::Dot`].
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use telegraph_core::{classify_press, Symbol};
///
/// let unit = Duration::from_millis(200);
/// assert_eq!(classify_press(Duration::from_millis(100), unit), Symbol::Dot);
/// assert_eq!(classify_press(Duration::from_millis(200), unit), Symbol::Dot);
/// assert_eq!(classify_press(Duration::from_millis(201), unit), Symbol::Dash);
/// ```
pub fn classify_press(duration: Duration, unit: Duration) -> Symbol {
    if duration > unit {
        Symbol::Dash
    } else {
        Symbol::Dot
    }
}

/// Renders a sequence of symbols as a `.`/`-` string.
pub fn render(symbols: &[Symbol]) -> String {
    symbols.iter().map(|s| s.as_char()).collect()
}
