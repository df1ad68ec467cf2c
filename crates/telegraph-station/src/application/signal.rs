//! The consumer-facing capability for remote signal changes.

/// Receives remote line-state transitions.
///
/// Implemented by whatever renders the remote signal: a physical buzzer, a
/// simulated one on the console, a segment display, or a test recorder.
///
/// Both methods run inline inside the receive loop, so they must return
/// quickly and must never block on I/O.
#[cfg_attr(test, mockall::automock)]
pub trait SignalListener: Send + Sync {
    /// The peer pressed its key.
    fn on_asserted(&self);

    /// The peer released its key.
    fn on_released(&self);
}
