//! Domain entities for Telegraph Link.
//!
//! This module contains pure keying logic with no infrastructure dependencies.
//!
//! # What is "domain" in Clean Architecture? (for beginners)
//!
//! The innermost layer of the application is called the **domain**.  Domain
//! code contains the core rules of the system, has no imports from network
//! libraries or async runtimes, and can be tested on any machine without setup.
//!
//! Here the rules are:
//!
//! - which peer listens and which dials ([`role`]),
//! - how long a press must last to count as a dash ([`symbol`]),
//! - how long a silence must last to end a letter or a word ([`timing`]),
//! - how presses accumulate into a word and when that word is flushed
//!   ([`keying`]).
//!
//! The runtime crate (`telegraph-station`) depends on these types; the domain
//! never depends on it.

/// Symbol buffer and press/release timestamps.
pub mod keying;
/// Listener/dialer role negotiation.
pub mod role;
/// Dots, dashes, and press classification.
pub mod symbol;
/// Timing thresholds derived from the base time unit.
pub mod timing;
