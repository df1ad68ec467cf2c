//! Protocol module containing the line-state type and the single-byte codec.

pub mod codec;

pub use codec::{decode_state, encode_state, scan_latest_state, ProtocolError, ScanOutcome};

/// Wire byte meaning "signal asserted" (key down).
pub const ASSERTED_BYTE: u8 = b'1';

/// Wire byte meaning "signal released" (key up).
pub const RELEASED_BYTE: u8 = b'0';

/// Well-known TCP port both stations use.
pub const DEFAULT_PORT: u16 = 10000;

/// State of one direction of the signal line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LineState {
    Asserted,
    #[default]
    Released,
}

impl LineState {
    pub fn is_asserted(self) -> bool {
        self == LineState::Asserted
    }
}
