//! Network infrastructure: the TCP transport between the two stations.
//!
//! # Connection lifecycle (for beginners)
//!
//! ```text
//!                 connect()
//!  Disconnected ─────────────► Connecting ─────────────► Connected
//!       ▲                      (accept / dial)               │
//!       │                                                    │
//!       └──────────── read or write failure ◄────────────────┘
//! ```
//!
//! There is no terminal "failed" state for transient problems: a dialer
//! whose peer is not up yet keeps retrying, and a lost stream is simply
//! re-established.  Only local problems (the port cannot be bound, the
//! address is invalid, a connect error other than "refused") are fatal.
//!
//! # Generations
//!
//! Every established stream gets a *generation* number.  Both the transmit
//! path (a failed write) and the session supervisor (a receive loop that
//! ended) can notice a broken stream at the same moment.  Each of them asks
//! to recover *a specific generation*; whoever takes the lock second sees
//! that the generation has already moved on and does nothing.  So a broken
//! stream is replaced exactly once.
//!
//! # Ownership of the two halves
//!
//! The write half stays inside the connection behind an async mutex.  The
//! read half of each new stream is handed out on a channel as an
//! [`EstablishedStream`]; the session gives it to a fresh receive loop.

pub mod local_addr;

use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use telegraph_core::Role;
use thiserror::Error;
use tokio::{
    io::AsyncWriteExt,
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpListener, TcpStream,
    },
    sync::{mpsc, watch, Mutex},
};
use tracing::{debug, info, warn};

use crate::application::shutdown::ShutdownSignal;
use crate::application::transmit::{SignalLink, TransmitError};

/// Back-off between dial attempts while the peer is not listening yet.
pub const DEFAULT_DIAL_BACKOFF: Duration = Duration::from_secs(5);

/// Errors that can occur in the transport layer.
///
/// All of these are fatal for the session.  Transient faults never surface
/// here; they are absorbed by reconnecting.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    BindFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    /// Accepting an inbound connection failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),
    /// Connecting to the peer failed for a reason other than "refused".
    #[error("failed to connect to {addr}: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    /// The session is shutting down.
    #[error("transport shut down")]
    Shutdown,
}

/// Configuration for one transport connection.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Which side of the pair this station plays.
    pub role: Role,
    /// Address the listener binds to.
    pub local_addr: String,
    /// Address the dialer connects to.
    pub peer_addr: String,
    /// TCP port used by both sides.
    pub port: u16,
    /// Wait between dial attempts while the peer refuses connections.
    pub dial_backoff: Duration,
}

/// Observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// A freshly established stream, ready for a receive loop.
#[derive(Debug)]
pub struct EstablishedStream {
    pub generation: u64,
    pub peer: SocketAddr,
    pub reader: OwnedReadHalf,
}

/// Lifecycle notifications from the transport.
#[derive(Debug)]
pub enum LinkEvent {
    Established(EstablishedStream),
    Lost { generation: u64, reason: String },
}

struct LinkInner {
    writer: Option<OwnedWriteHalf>,
    listener: Option<TcpListener>,
    generation: u64,
}

/// The single transport connection a session owns.
pub struct TransportConnection {
    config: LinkConfig,
    inner: Mutex<LinkInner>,
    state: watch::Sender<ConnectionState>,
    events: mpsc::UnboundedSender<LinkEvent>,
    shutdown: ShutdownSignal,
}

impl TransportConnection {
    /// Creates a disconnected transport and the receiver for its events.
    pub fn new(
        config: LinkConfig,
        shutdown: ShutdownSignal,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<LinkEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let conn = Arc::new(Self {
            config,
            inner: Mutex::new(LinkInner {
                writer: None,
                listener: None,
                generation: 0,
            }),
            state,
            events,
            shutdown,
        });
        (conn, rx)
    }

    pub fn role(&self) -> Role {
        self.config.role
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Subscribes to connection state changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Generation of the current (or most recent) stream; `0` before the
    /// first connect.
    pub async fn generation(&self) -> u64 {
        self.inner.lock().await.generation
    }

    /// Establishes the first stream.
    ///
    /// Waits as long as it takes for the peer to show up.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] for local failures or on shutdown.
    pub async fn connect(&self) -> Result<u64, TransportError> {
        let mut inner = self.inner.lock().await;
        if inner.writer.is_some() {
            return Ok(inner.generation);
        }
        self.establish(&mut inner).await
    }

    /// Writes one byte, re-establishing the stream first if it is broken.
    ///
    /// The reconnect runs inline: this call returns only after the byte has
    /// been handed to a live stream.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] only when reconnecting fails fatally.
    pub async fn send(&self, byte: u8) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().await;
        loop {
            if let Some(writer) = inner.writer.as_mut() {
                match writer.write_all(&[byte]).await {
                    Ok(()) => return Ok(()),
                    Err(e) => {
                        warn!("write failed on stream {}: {e}; reconnecting", inner.generation);
                        self.mark_lost(&mut inner, e.to_string());
                    }
                }
            }
            self.establish(&mut inner).await?;
        }
    }

    /// Replaces the stream with `generation` after its receive loop ended.
    ///
    /// A no-op when that stream has already been replaced.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when reconnecting fails fatally.
    pub async fn recover(&self, generation: u64, reason: &str) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            debug!("stream {generation} already replaced by {}", inner.generation);
            return Ok(());
        }
        if inner.writer.is_some() {
            warn!("stream {generation} lost: {reason}; reconnecting");
            self.mark_lost(&mut inner, reason.to_string());
        }
        self.establish(&mut inner).await.map(|_| ())
    }

    /// Closes the stream and the listening socket.
    ///
    /// Trigger the shutdown signal first if a reconnect may be in progress,
    /// otherwise this waits for it to finish.
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(mut writer) = inner.writer.take() {
            let _ = writer.shutdown().await;
        }
        inner.listener = None;
        self.state.send_replace(ConnectionState::Disconnected);
        info!("transport closed");
    }

    fn mark_lost(&self, inner: &mut LinkInner, reason: String) {
        inner.writer = None;
        self.state.send_replace(ConnectionState::Disconnected);
        let _ = self.events.send(LinkEvent::Lost {
            generation: inner.generation,
            reason,
        });
    }

    /// Opens a new stream according to the role.  Must be called with the
    /// inner lock held and no live writer.
    async fn establish(&self, inner: &mut LinkInner) -> Result<u64, TransportError> {
        if self.shutdown.is_triggered() {
            return Err(TransportError::Shutdown);
        }
        self.state.send_replace(ConnectionState::Connecting);

        let result = match self.config.role {
            Role::Listener => self.accept(inner).await,
            Role::Dialer => self.dial().await,
        };
        let (stream, peer) = match result {
            Ok(pair) => pair,
            Err(e) => {
                self.state.send_replace(ConnectionState::Disconnected);
                return Err(e);
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            warn!("could not disable Nagle on stream to {peer}: {e}");
        }
        let (reader, writer) = stream.into_split();
        inner.writer = Some(writer);
        inner.generation += 1;
        let generation = inner.generation;
        self.state.send_replace(ConnectionState::Connected);
        info!("connected to {peer} (stream {generation}, {})", self.config.role);

        let _ = self.events.send(LinkEvent::Established(EstablishedStream {
            generation,
            peer,
            reader,
        }));
        Ok(generation)
    }

    async fn accept(&self, inner: &mut LinkInner) -> Result<(TcpStream, SocketAddr), TransportError> {
        let listener = match inner.listener.take() {
            Some(listener) => listener,
            None => self.bind().await?,
        };
        info!("waiting for the peer to connect");
        let result = tokio::select! {
            _ = self.shutdown.wait() => Err(TransportError::Shutdown),
            accepted = listener.accept() => accepted.map_err(TransportError::AcceptFailed),
        };
        inner.listener = Some(listener);
        result
    }

    async fn bind(&self) -> Result<TcpListener, TransportError> {
        let addr = socket_target(&self.config.local_addr, self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| TransportError::BindFailed {
                addr: addr.clone(),
                source,
            })?;
        info!("listening on {addr}");
        Ok(listener)
    }

    async fn dial(&self) -> Result<(TcpStream, SocketAddr), TransportError> {
        let addr = socket_target(&self.config.peer_addr, self.config.port);
        loop {
            let attempt = tokio::select! {
                _ = self.shutdown.wait() => return Err(TransportError::Shutdown),
                attempt = TcpStream::connect(&addr) => attempt,
            };
            match attempt {
                Ok(stream) => {
                    let peer = stream
                        .peer_addr()
                        .map_err(|source| TransportError::ConnectFailed {
                            addr: addr.clone(),
                            source,
                        })?;
                    return Ok((stream, peer));
                }
                Err(e) if e.kind() == ErrorKind::ConnectionRefused => {
                    info!(
                        "peer at {addr} not ready; retrying in {:?}",
                        self.config.dial_backoff
                    );
                    tokio::select! {
                        _ = self.shutdown.wait() => return Err(TransportError::Shutdown),
                        _ = tokio::time::sleep(self.config.dial_backoff) => {}
                    }
                }
                Err(source) => return Err(TransportError::ConnectFailed { addr, source }),
            }
        }
    }
}

#[async_trait]
impl SignalLink for TransportConnection {
    async fn send_byte(&self, byte: u8) -> Result<(), TransmitError> {
        self.send(byte).await.map_err(|e| match e {
            TransportError::Shutdown => TransmitError::Closed,
            other => TransmitError::Link(other.to_string()),
        })
    }
}

/// Formats `host:port`, bracketing IPv6 literals.
pub fn socket_target(host: &str, port: u16) -> String {
    match host.parse::<IpAddr>() {
        Ok(ip) => SocketAddr::new(ip, port).to_string(),
        Err(_) => format!("{host}:{port}"),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    /// Reserves a free loopback port by binding and releasing it.
    async fn free_port() -> u16 {
        let spare = TcpListener::bind("127.0.0.1:0").await.unwrap();
        spare.local_addr().unwrap().port()
    }

    fn config(role: Role, port: u16) -> LinkConfig {
        LinkConfig {
            role,
            local_addr: "127.0.0.1".to_string(),
            peer_addr: "127.0.0.1".to_string(),
            port,
            dial_backoff: Duration::from_millis(50),
        }
    }

    async fn next_stream(rx: &mut mpsc::UnboundedReceiver<LinkEvent>) -> EstablishedStream {
        loop {
            match rx.recv().await.expect("transport event channel closed") {
                LinkEvent::Established(stream) => return stream,
                LinkEvent::Lost { .. } => continue,
            }
        }
    }

    #[test]
    fn test_socket_target_formats_ipv4_and_hostnames() {
        assert_eq!(socket_target("10.0.0.5", 10000), "10.0.0.5:10000");
        assert_eq!(socket_target("peer.local", 10000), "peer.local:10000");
    }

    #[test]
    fn test_socket_target_brackets_ipv6() {
        assert_eq!(socket_target("::1", 10000), "[::1]:10000");
    }

    #[tokio::test]
    async fn test_new_connection_starts_disconnected() {
        let (conn, _rx) = TransportConnection::new(config(Role::Dialer, 1), ShutdownSignal::new());
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert_eq!(conn.generation().await, 0);
    }

    #[tokio::test]
    async fn test_listener_and_dialer_connect_and_carry_bytes() {
        // Arrange
        let port = free_port().await;
        let shutdown = ShutdownSignal::new();
        let (listener, mut l_rx) = TransportConnection::new(config(Role::Listener, port), shutdown.clone());
        let (dialer, _d_rx) = TransportConnection::new(config(Role::Dialer, port), shutdown.clone());

        // Act
        let accept = {
            let listener = Arc::clone(&listener);
            tokio::spawn(async move { listener.connect().await })
        };
        let generation = dialer.connect().await.unwrap();
        accept.await.unwrap().unwrap();
        dialer.send(b'1').await.unwrap();
        let mut stream = next_stream(&mut l_rx).await;
        let mut byte = [0u8; 1];
        stream.reader.read_exact(&mut byte).await.unwrap();

        // Assert
        assert_eq!(generation, 1);
        assert_eq!(byte, [b'1']);
        assert_eq!(listener.state(), ConnectionState::Connected);
        assert_eq!(dialer.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_dialer_retries_until_peer_listens() {
        // Arrange – nothing listens yet, so the first attempts are refused.
        let port = free_port().await;
        let (dialer, _rx) = TransportConnection::new(config(Role::Dialer, port), ShutdownSignal::new());
        let dial = {
            let dialer = Arc::clone(&dialer);
            tokio::spawn(async move { dialer.connect().await })
        };

        // Act
        tokio::time::sleep(Duration::from_millis(120)).await;
        let peer = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
        let (_accepted, _) = peer.accept().await.unwrap();

        // Assert
        let generation = tokio::time::timeout(Duration::from_secs(5), dial)
            .await
            .expect("dialer must connect once the peer listens")
            .unwrap()
            .unwrap();
        assert_eq!(generation, 1);
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_dial_backoff() {
        let port = free_port().await;
        let shutdown = ShutdownSignal::new();
        let mut cfg = config(Role::Dialer, port);
        cfg.dial_backoff = Duration::from_secs(3600);
        let (dialer, _rx) = TransportConnection::new(cfg, shutdown.clone());
        let dial = {
            let dialer = Arc::clone(&dialer);
            tokio::spawn(async move { dialer.connect().await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.trigger();

        let result = tokio::time::timeout(Duration::from_secs(5), dial).await.unwrap().unwrap();
        assert!(matches!(result, Err(TransportError::Shutdown)));
        assert_eq!(dialer.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_bind_failure_is_fatal() {
        // Arrange – occupy the port first.
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();
        let (conn, _rx) = TransportConnection::new(config(Role::Listener, port), ShutdownSignal::new());

        // Act
        let result = conn.connect().await;

        // Assert
        assert!(matches!(result, Err(TransportError::BindFailed { .. })));
    }

    #[tokio::test]
    async fn test_recover_of_stale_generation_is_a_no_op() {
        // Arrange
        let peer = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = peer.local_addr().unwrap().port();
        let (dialer, _rx) = TransportConnection::new(config(Role::Dialer, port), ShutdownSignal::new());
        let (connected, accepted) = tokio::join!(dialer.connect(), peer.accept());
        connected.unwrap();
        let _conn1 = accepted.unwrap();

        // Act – generation 0 was never live.
        dialer.recover(0, "stale").await.unwrap();

        // Assert
        assert_eq!(dialer.generation().await, 1);
        assert_eq!(dialer.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_recover_replaces_lost_stream() {
        // Arrange
        let peer = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = peer.local_addr().unwrap().port();
        let (dialer, mut rx) = TransportConnection::new(config(Role::Dialer, port), ShutdownSignal::new());
        let (connected, accepted) = tokio::join!(dialer.connect(), peer.accept());
        let first = connected.unwrap();
        drop(accepted.unwrap());

        // Act
        let (recovered, accepted) = tokio::join!(dialer.recover(first, "closed by peer"), peer.accept());
        recovered.unwrap();
        let (mut conn2, _) = accepted.unwrap();
        dialer.send(b'0').await.unwrap();

        // Assert
        assert_eq!(dialer.generation().await, 2);
        let mut byte = [0u8; 1];
        conn2.read_exact(&mut byte).await.unwrap();
        assert_eq!(byte, [b'0']);
        let mut saw_lost = false;
        while let Ok(event) = rx.try_recv() {
            if let LinkEvent::Lost { generation, .. } = event {
                assert_eq!(generation, first);
                saw_lost = true;
            }
        }
        assert!(saw_lost);
    }

    #[tokio::test]
    async fn test_send_on_broken_stream_reconnects_before_returning() {
        // Arrange – the peer closes the first stream.
        let peer = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = peer.local_addr().unwrap().port();
        let (dialer, _rx) = TransportConnection::new(config(Role::Dialer, port), ShutdownSignal::new());
        let (connected, accepted) = tokio::join!(dialer.connect(), peer.accept());
        connected.unwrap();
        drop(accepted.unwrap());
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Act – the first write to a closed peer may still succeed locally;
        // the reset it provokes makes the next one fail and reconnect.
        dialer.send(b'0').await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        dialer.send(b'1').await.unwrap();

        // Assert
        assert_eq!(dialer.generation().await, 2);
        let (mut conn2, _) = peer.accept().await.unwrap();
        let received = tokio::time::timeout(Duration::from_secs(2), async {
            let mut received = Vec::new();
            let mut buf = [0u8; 8];
            while received.last() != Some(&b'1') {
                let n = conn2.read(&mut buf).await.unwrap();
                assert!(n > 0, "new stream closed early");
                received.extend_from_slice(&buf[..n]);
            }
            received
        })
        .await
        .expect("the edge must arrive on the new stream");
        assert_eq!(received.last(), Some(&b'1'));
    }

    #[tokio::test]
    async fn test_close_disconnects() {
        let peer = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = peer.local_addr().unwrap().port();
        let (dialer, _rx) = TransportConnection::new(config(Role::Dialer, port), ShutdownSignal::new());
        let (connected, accepted) = tokio::join!(dialer.connect(), peer.accept());
        connected.unwrap();
        let (mut conn, _) = accepted.unwrap();

        dialer.close().await;

        assert_eq!(dialer.state(), ConnectionState::Disconnected);
        let mut buf = [0u8; 1];
        assert_eq!(conn.read(&mut buf).await.unwrap(), 0, "peer must see EOF");
    }
}
