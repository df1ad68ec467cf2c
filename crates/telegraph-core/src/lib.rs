//! # telegraph-core
//!
//! Shared library for Telegraph Link containing the single-byte wire codec,
//! the keying domain (role negotiation, symbol classification, timing
//! thresholds, the symbol buffer), and the morse lookup tables.
//!
//! It has zero dependencies on OS APIs, async runtimes, or network sockets.
//!
//! # Architecture overview (for beginners)
//!
//! Telegraph Link emulates a wired telegraph between two computers.  Each
//! side has a button (the key) and a buzzer.  Pressing the key on one side
//! sounds the buzzer on the other side, and the receiving side measures how
//! long each press lasted to turn the presses back into morse code.
//!
//! This crate (`telegraph-core`) is the shared foundation.  It defines:
//!
//! - **`protocol`** – How line state travels over the network.  Every message
//!   is exactly one ASCII byte: `'1'` for "asserted" and `'0'` for "released".
//!
//! - **`domain`** – Pure keying logic with no OS dependencies.  The most
//!   important piece is [`KeyingState`]: the buffer of dots and dashes for the
//!   word being keyed, plus the timestamps used to classify presses and find
//!   word boundaries.  Every method takes the current time as a parameter, so
//!   tests can drive it with a simulated clock.
//!
//! - **`morse`** – The symbol ↔ letter lookup, consumed through the
//!   [`MorseLookup`] trait so callers can plug in their own table.

pub mod domain;
pub mod morse;
pub mod protocol;

pub use domain::keying::{KeyingState, PollOutcome};
pub use domain::role::{negotiate_role, Role, RoleError, RolePreference};
pub use domain::symbol::{classify_press, Symbol};
pub use domain::timing::{DecodeGranularity, TimingConfig};
pub use morse::{InternationalMorse, MorseLookup};
pub use protocol::codec::{decode_state, encode_state, scan_latest_state, ProtocolError, ScanOutcome};
pub use protocol::LineState;
