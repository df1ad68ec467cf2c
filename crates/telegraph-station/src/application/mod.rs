//! Application layer use cases for a station.
//!
//! # What use cases does a station have?
//!
//! - **`signal`** – The [`signal::SignalListener`] capability the consumer
//!   implements to drive a buzzer or display from the remote line state.
//!
//! - **`transmit`** – Turns local key edges into wire bytes through the
//!   [`transmit::SignalLink`] seam, suppressing repeated identical states.
//!
//! - **`receive`** – The long-running loop that reads the peer's bytes,
//!   fires the listener, and records press timing.
//!
//! - **`decode`** – The long-running loop that watches idle time and hands
//!   completed words to the morse lookup.
//!
//! - **`events`** – [`events::SessionEvent`], what a session reports upward.
//!
//! - **`keyer`** – Keys typed text out as correctly timed edges.
//!
//! - **`self_test`** – A local-only wiring check of key and buzzer.
//!
//! - **`shutdown`** – The per-session cancellation signal every loop observes.
//!
//! Nothing in this layer touches sockets directly; the infrastructure layer
//! implements the traits defined here.

pub mod decode;
pub mod events;
pub mod keyer;
pub mod receive;
pub mod shutdown;
pub mod signal;
pub mod transmit;
