//! Infrastructure layer for a station.
//!
//! Contains the OS-facing adapters: TCP sockets, the console buzzer, and the
//! configuration file.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `telegraph_core`, but MUST NOT be imported by the `application` layer.
//!
//! # Sub-modules
//!
//! - **`network`** – The transport connection: listens or dials according
//!   to the negotiated role, hands each new stream's read half to the
//!   session, and reconnects after any read or write failure.  Also local
//!   address discovery.
//!
//! - **`buzzer`** – `SignalListener` implementations: a console buzzer and
//!   a recording double for tests.
//!
//! - **`storage`** – TOML configuration load/save.

pub mod buzzer;
pub mod network;
pub mod storage;
