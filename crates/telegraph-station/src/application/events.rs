//! Events a running session reports to its owner.

use std::net::SocketAddr;

/// Something the owner of a session may want to show or log.
///
/// Delivered on the `mpsc` receiver returned by `Session::start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A stream to the peer was established.
    Connected { generation: u64, peer: SocketAddr },
    /// The stream with this generation was lost; a reconnect follows.
    Disconnected { generation: u64, reason: String },
    /// Decoded text (a word, a letter, or a single separating space).
    Decoded(String),
    /// The link failed in a way it cannot recover from.
    Failed(String),
}
