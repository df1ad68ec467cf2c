//! Buzzer adapters: [`SignalListener`] implementations that render the
//! remote line.
//!
//! A real station drives a piezo buzzer or a lamp from these callbacks.  This
//! crate ships a console rendition that logs each edge and can ring the
//! terminal bell, plus a recording double in [`mock`] for tests.
//!
//! Callbacks run inline in the receive loop, so everything here is a flag
//! flip or a single buffered write.

pub mod mock;

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::application::signal::SignalListener;

/// ASCII BEL; most terminals beep or flash on it.
const BELL: &[u8] = b"\x07";

/// Renders the remote key on the console.
#[derive(Debug, Default)]
pub struct ConsoleBuzzer {
    sounding: AtomicBool,
    bell: bool,
}

impl ConsoleBuzzer {
    /// Creates a buzzer; with `bell` set each press also rings the terminal
    /// bell.
    pub fn new(bell: bool) -> Self {
        Self {
            sounding: AtomicBool::new(false),
            bell,
        }
    }

    /// Whether the buzzer is currently on.
    pub fn is_sounding(&self) -> bool {
        self.sounding.load(Ordering::Relaxed)
    }
}

impl SignalListener for ConsoleBuzzer {
    fn on_asserted(&self) {
        self.sounding.store(true, Ordering::Relaxed);
        debug!("buzzer on");
        if self.bell {
            let mut out = std::io::stderr();
            let _ = out.write_all(BELL).and_then(|_| out.flush());
        }
    }

    fn on_released(&self) {
        self.sounding.store(false, Ordering::Relaxed);
        debug!("buzzer off");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buzzer_starts_silent() {
        assert!(!ConsoleBuzzer::new(false).is_sounding());
    }

    #[test]
    fn test_buzzer_follows_edges() {
        // Arrange
        let buzzer = ConsoleBuzzer::new(false);

        // Act / Assert
        buzzer.on_asserted();
        assert!(buzzer.is_sounding());
        buzzer.on_released();
        assert!(!buzzer.is_sounding());
    }
}
