//! telegraph-station library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does a station do? (for beginners)
//!
//! A *station* is one end of an emulated telegraph wire.  It:
//!
//! 1. Decides whether to listen for or dial the peer station (role
//!    negotiation) and opens a single TCP connection to it.
//! 2. Sends one byte every time the local key changes state (`'1'` pressed,
//!    `'0'` released).
//! 3. Reads the peer's bytes, drives the local buzzer, and measures every
//!    press to build up dots and dashes.
//! 4. Watches the silence after each release and, once a word is complete,
//!    looks the accumulated dots and dashes up in the morse table.
//! 5. Reconnects transparently whenever the connection drops.
//!
//! Steps 3 and 4 run as two independent background tasks that share one
//! mutex-protected keying state; step 2 runs on the caller's task.

/// Application layer: transmitter, receiver, decoder, keyer, self-test.
pub mod application;

/// Infrastructure layer: TCP transport, buzzer adapters, configuration.
pub mod infrastructure;

/// Session wiring: owns the connection and supervises the background loops.
pub mod session;

pub use session::{Session, SessionConfig, SessionError, SessionEvent};
