//! Session: one telegraph line between this station and its peer.
//!
//! # What runs where (for beginners)
//!
//! ```text
//!   caller's task                       background tasks
//!  ───────────────                      ────────────────────────────────────
//!   session.assert_signal()             supervisor
//!        │                                ├─ new stream → spawn receive loop
//!        ▼                                └─ loop ended → connection.recover()
//!   SignalTransmitter                   receive loop (one per stream)
//!        │                                └─ bytes → buzzer + KeyingState
//!        ▼                              decoder
//!   TransportConnection ◄── write half    └─ KeyingState → lookup → events
//! ```
//!
//! The caller drives transmission directly; everything on the receiving side
//! runs in tasks owned by the session.  [`Session::shutdown`] stops them all
//! and closes the stream.
//!
//! Both the transmit path and the supervisor can notice a broken stream.
//! Whichever gets there first replaces it; the other sees a newer stream
//! generation and leaves it alone (see the `network` module).

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use telegraph_core::{
    negotiate_role, protocol::DEFAULT_PORT, KeyingState, LineState, MorseLookup, Role, RoleError,
    RolePreference, Symbol, TimingConfig,
};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::application::decode::TimingDecoder;
use crate::application::keyer::Keyer;
use crate::application::receive::{ReceiveExit, SignalReceiver};
use crate::application::shutdown::ShutdownSignal;
use crate::application::signal::SignalListener;
use crate::application::transmit::{SignalTransmitter, TransmitError};
use crate::infrastructure::network::{
    ConnectionState, LinkConfig, LinkEvent, TransportConnection, TransportError,
    DEFAULT_DIAL_BACKOFF,
};

pub use crate::application::events::SessionEvent;

/// Capacity of the event channel returned by [`Session::start`].
pub const EVENT_CHANNEL_CAPACITY: usize = 128;

/// How long [`Session::shutdown`] waits for each task before aborting it.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Error type for starting a session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("role negotiation failed: {0}")]
    Role(#[from] RoleError),
    #[error("transport failed: {0}")]
    Transport(#[from] TransportError),
}

/// Everything needed to start a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub local_addr: String,
    pub peer_addr: String,
    pub role: RolePreference,
    pub port: u16,
    pub dial_backoff: Duration,
    pub timing: TimingConfig,
}

impl SessionConfig {
    /// A config with the standard port, back-off and timing.
    pub fn new(local_addr: impl Into<String>, peer_addr: impl Into<String>) -> Self {
        Self {
            local_addr: local_addr.into(),
            peer_addr: peer_addr.into(),
            role: RolePreference::Unspecified,
            port: DEFAULT_PORT,
            dial_backoff: DEFAULT_DIAL_BACKOFF,
            timing: TimingConfig::default(),
        }
    }
}

/// A running telegraph session.
pub struct Session {
    id: Uuid,
    role: Role,
    timing: TimingConfig,
    connection: Arc<TransportConnection>,
    transmitter: Arc<SignalTransmitter>,
    lookup: Arc<dyn MorseLookup>,
    keying: Arc<Mutex<KeyingState>>,
    remote: watch::Receiver<LineState>,
    shutdown: ShutdownSignal,
    tasks: Vec<JoinHandle<()>>,
}

impl Session {
    /// Negotiates the role, establishes the first stream and starts the
    /// receive and decode loops.
    ///
    /// Returns once the first stream is up; a dialer keeps retrying until
    /// the peer listens, a listener waits for the peer to connect.
    ///
    /// # Errors
    ///
    /// [`SessionError::Role`] if no role can be derived,
    /// [`SessionError::Transport`] for fatal local transport failures.
    pub async fn start(
        config: SessionConfig,
        listener: Arc<dyn SignalListener>,
        lookup: Arc<dyn MorseLookup>,
    ) -> Result<(Self, mpsc::Receiver<SessionEvent>), SessionError> {
        let role = negotiate_role(config.role, &config.local_addr, &config.peer_addr)?;
        let id = Uuid::new_v4();
        let span = info_span!("session", %id, %role);
        info!(
            parent: &span,
            "starting: local {} peer {} port {}",
            config.local_addr,
            config.peer_addr,
            config.port
        );

        let shutdown = ShutdownSignal::new();
        let (connection, link_events) = TransportConnection::new(
            LinkConfig {
                role,
                local_addr: config.local_addr.clone(),
                peer_addr: config.peer_addr.clone(),
                port: config.port,
                dial_backoff: config.dial_backoff,
            },
            shutdown.clone(),
        );
        connection.connect().instrument(span.clone()).await?;

        let keying = Arc::new(Mutex::new(KeyingState::new(config.timing)));
        let (remote_tx, remote) = watch::channel(LineState::Released);
        let receiver = Arc::new(SignalReceiver::new(listener, Arc::clone(&keying), remote_tx));
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let supervisor = tokio::spawn(
            supervise(
                Arc::clone(&connection),
                receiver,
                link_events,
                events_tx.clone(),
                shutdown.clone(),
            )
            .instrument(span.clone()),
        );
        let decoder = tokio::spawn(
            TimingDecoder::new(Arc::clone(&keying), Arc::clone(&lookup), events_tx)
                .run(shutdown.clone())
                .instrument(span),
        );

        let link: Arc<TransportConnection> = Arc::clone(&connection);
        let session = Self {
            id,
            role,
            timing: config.timing,
            transmitter: Arc::new(SignalTransmitter::new(link)),
            connection,
            lookup,
            keying,
            remote,
            shutdown,
            tasks: vec![supervisor, decoder],
        };
        Ok((session, events_rx))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// The transmitter for the local key.  Cloneable handle.
    pub fn transmitter(&self) -> Arc<SignalTransmitter> {
        Arc::clone(&self.transmitter)
    }

    /// Presses the local key.
    ///
    /// # Errors
    ///
    /// Returns [`TransmitError`] if the edge could not be delivered.
    pub async fn assert_signal(&self) -> Result<(), TransmitError> {
        self.transmitter.assert_signal().await
    }

    /// Releases the local key.
    ///
    /// # Errors
    ///
    /// Returns [`TransmitError`] if the edge could not be delivered.
    pub async fn release_signal(&self) -> Result<(), TransmitError> {
        self.transmitter.release_signal().await
    }

    /// A keyer that plays text through this session's transmitter.
    pub fn keyer(&self) -> Keyer {
        Keyer::new(self.transmitter(), Arc::clone(&self.lookup), self.timing.unit)
    }

    /// The peer's key as last seen on the wire.
    pub fn remote_state(&self) -> LineState {
        *self.remote.borrow()
    }

    /// Subscribes to changes of the peer's key.
    pub fn subscribe_remote(&self) -> watch::Receiver<LineState> {
        self.remote.clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn subscribe_connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.subscribe()
    }

    /// Symbols received since the last decode.
    pub fn pending_symbols(&self) -> Vec<Symbol> {
        self.keying
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pending()
            .to_vec()
    }

    /// Stops every loop, closes the stream and waits for the tasks to end.
    pub async fn shutdown(mut self) {
        info!(session = %self.id, "shutting down");
        self.shutdown.trigger();
        self.connection.close().await;
        for mut task in std::mem::take(&mut self.tasks) {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await.is_err() {
                warn!(session = %self.id, "task did not stop in time; aborting");
                task.abort();
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Starts a receive loop for every new stream and recovers streams whose
/// loop ended.  Losing a stream resets the remote line to released.
async fn supervise(
    connection: Arc<TransportConnection>,
    receiver: Arc<SignalReceiver>,
    mut links: mpsc::UnboundedReceiver<LinkEvent>,
    events: mpsc::Sender<SessionEvent>,
    shutdown: ShutdownSignal,
) {
    let (exit_tx, mut exits) = mpsc::unbounded_channel::<(u64, ReceiveExit)>();
    let mut current: Option<JoinHandle<()>> = None;
    let mut live_generation: Option<u64> = None;

    loop {
        tokio::select! {
            _ = shutdown.wait() => break,
            Some(link) = links.recv() => match link {
                LinkEvent::Established(stream) => {
                    if let Some(old) = current.take() {
                        old.abort();
                    }
                    let generation = stream.generation;
                    live_generation = Some(generation);
                    let _ = events
                        .send(SessionEvent::Connected { generation, peer: stream.peer })
                        .await;

                    let receiver = Arc::clone(&receiver);
                    let exit_tx = exit_tx.clone();
                    let shutdown = shutdown.clone();
                    current = Some(tokio::spawn(
                        async move {
                            let exit = receiver.run(stream.reader, shutdown).await;
                            debug!("receive loop for stream {generation} ended: {exit}");
                            let _ = exit_tx.send((generation, exit));
                        }
                        .in_current_span(),
                    ));
                }
                LinkEvent::Lost { generation, reason } => {
                    if let Some(old) = current.take() {
                        old.abort();
                    }
                    if live_generation == Some(generation) {
                        live_generation = None;
                        receiver.reset_line(tokio::time::Instant::now().into_std());
                    }
                    let _ = events
                        .send(SessionEvent::Disconnected { generation, reason })
                        .await;
                }
            },
            Some((generation, exit)) = exits.recv() => {
                if !exit.is_connection_loss() {
                    continue;
                }
                // A loop of a superseded stream must not touch the new line.
                if live_generation == Some(generation) {
                    live_generation = None;
                    receiver.reset_line(tokio::time::Instant::now().into_std());
                }
                match connection.recover(generation, &exit.to_string()).await {
                    Ok(()) => {}
                    Err(TransportError::Shutdown) => break,
                    Err(e) => {
                        error!("cannot re-establish the link: {e}");
                        let _ = events.send(SessionEvent::Failed(e.to_string())).await;
                        break;
                    }
                }
            }
            else => break,
        }
    }

    if let Some(task) = current {
        task.abort();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
