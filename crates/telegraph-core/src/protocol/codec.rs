//! Single-byte codec for the signal line.
//!
//! Wire format:
//! ```text
//! '1'  (0x31)  signal asserted
//! '0'  (0x30)  signal released
//! ```
//! There is no framing, length prefix, acknowledgement, or heartbeat.  The
//! sender is edge-triggered: it only writes when its state changes.
//!
//! # Coalesced reads (for beginners)
//!
//! TCP is a byte *stream*.  If the sender writes `'1'` and then `'0'` quickly,
//! the receiver may get both bytes from one `read()` call.  Only the newest
//! byte describes the line *now*, so [`scan_latest_state`] returns the last
//! valid byte of a read and counts anything that is not `'0'`/`'1'`.

use thiserror::Error;

use crate::protocol::{LineState, ASSERTED_BYTE, RELEASED_BYTE};

/// Errors that can occur while decoding wire bytes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The byte is neither `'0'` nor `'1'`.
    #[error("unexpected wire byte 0x{0:02X}")]
    UnexpectedByte(u8),
}

/// Encodes a line state as its wire byte.
pub fn encode_state(state: LineState) -> u8 {
    match state {
        LineState::Asserted => ASSERTED_BYTE,
        LineState::Released => RELEASED_BYTE,
    }
}

/// Decodes one wire byte.
///
/// # Errors
///
/// Returns [`ProtocolError::UnexpectedByte`] for anything but `'0'`/`'1'`.
///
/// # Examples
///
/// ```rust
/// use telegraph_core::{decode_state, LineState};
///
/// assert_eq!(decode_state(b'1'), Ok(LineState::Asserted));
/// assert!(decode_state(b'x').is_err());
/// ```
pub fn decode_state(byte: u8) -> Result<LineState, ProtocolError> {
    match byte {
        ASSERTED_BYTE => Ok(LineState::Asserted),
        RELEASED_BYTE => Ok(LineState::Released),
        other => Err(ProtocolError::UnexpectedByte(other)),
    }
}

/// Outcome of scanning one read's worth of bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanOutcome {
    /// The most recent valid state in the chunk, if any.
    pub latest: Option<LineState>,
    /// Number of bytes that were not valid line states.
    pub rejected: usize,
}

/// Finds the most recent valid line state in `bytes`.
///
/// Invalid bytes never change the line state; they are only counted.
pub fn scan_latest_state(bytes: &[u8]) -> ScanOutcome {
    let mut outcome = ScanOutcome::default();
    for &byte in bytes {
        match decode_state(byte) {
            Ok(state) => outcome.latest = Some(state),
            Err(_) => outcome.rejected += 1,
        }
    }
    outcome
}
