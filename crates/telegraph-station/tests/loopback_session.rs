//! End-to-end tests: real sessions over loopback TCP.
//!
//! These use the real clock because both stations talk through the OS
//! network stack.  Timeouts are generous; the assertions are about order
//! and content, not exact timing.

use std::sync::Arc;
use std::time::Duration;

use telegraph_core::{InternationalMorse, LineState, RolePreference, Symbol};
use telegraph_station::infrastructure::buzzer::mock::RecordingListener;
use telegraph_station::infrastructure::network::ConnectionState;
use telegraph_station::{Session, SessionConfig, SessionEvent};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

const TIMEOUT: Duration = Duration::from_secs(10);

/// Reserves a free loopback port by binding and releasing it.
async fn free_port() -> u16 {
    let spare = TcpListener::bind("127.0.0.1:0").await.unwrap();
    spare.local_addr().unwrap().port()
}

fn station(role: RolePreference, port: u16) -> SessionConfig {
    let mut cfg = SessionConfig::new("127.0.0.1", "127.0.0.1");
    cfg.role = role;
    cfg.port = port;
    cfg.dial_backoff = Duration::from_millis(50);
    cfg
}

/// Waits for the next event matching `pred`, skipping the rest.
async fn next_matching(
    events: &mut mpsc::Receiver<SessionEvent>,
    pred: impl Fn(&SessionEvent) -> bool,
) -> SessionEvent {
    tokio::time::timeout(TIMEOUT, async {
        loop {
            let event = events.recv().await.expect("session event channel closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("expected event did not arrive in time")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_short_press_is_decoded_as_e_on_the_peer() {
    // Arrange – two stations on one host with explicit roles.
    let port = free_port().await;
    let listener_buzzer = Arc::new(RecordingListener::new());
    let (listener_side, dialer_side) = tokio::join!(
        Session::start(
            station(RolePreference::Listener, port),
            listener_buzzer.clone(),
            Arc::new(InternationalMorse::new()),
        ),
        Session::start(
            station(RolePreference::Dialer, port),
            Arc::new(RecordingListener::new()),
            Arc::new(InternationalMorse::new()),
        ),
    );
    let (listener, mut listener_events) = listener_side.expect("listener must start");
    let (dialer, _dialer_events) = dialer_side.expect("dialer must start");

    // Act – the dialer keys one 100 ms press.
    dialer.assert_signal().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    dialer.release_signal().await.unwrap();

    // Assert – the buzzer follows both edges and one dot is buffered.
    let edges = tokio::time::timeout(TIMEOUT, listener_buzzer.wait_for_edges(2))
        .await
        .expect("both edges must reach the listener");
    assert_eq!(edges, vec![LineState::Asserted, LineState::Released]);
    assert_eq!(listener.remote_state(), LineState::Released);
    assert_eq!(listener.pending_symbols(), vec![Symbol::Dot]);

    // After a word gap the decoder looks up "." and emits "E".
    let decoded = next_matching(&mut listener_events, |e| {
        matches!(e, SessionEvent::Decoded(t) if t != " ")
    })
    .await;
    assert_eq!(decoded, SessionEvent::Decoded("E".to_string()));
    assert!(listener.pending_symbols().is_empty());

    listener.shutdown().await;
    dialer.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_keyer_text_arrives_as_letters() {
    // Arrange – a short unit keeps the test quick; letter-level decoding.
    let port = free_port().await;
    let mut listener_cfg = station(RolePreference::Listener, port);
    let mut dialer_cfg = station(RolePreference::Dialer, port);
    for cfg in [&mut listener_cfg, &mut dialer_cfg] {
        cfg.timing.unit = Duration::from_millis(60);
        cfg.timing.granularity = telegraph_core::DecodeGranularity::Letter;
    }
    let (listener_side, dialer_side) = tokio::join!(
        Session::start(
            listener_cfg,
            Arc::new(RecordingListener::new()),
            Arc::new(InternationalMorse::new()),
        ),
        Session::start(
            dialer_cfg,
            Arc::new(RecordingListener::new()),
            Arc::new(InternationalMorse::new()),
        ),
    );
    let (listener, mut events) = listener_side.unwrap();
    let (dialer, _dialer_events) = dialer_side.unwrap();

    // Act
    dialer.keyer().key_text("SOS").await.unwrap();

    // Assert
    let mut text = String::new();
    while text.trim_end() != "SOS" {
        if let SessionEvent::Decoded(t) =
            next_matching(&mut events, |e| matches!(e, SessionEvent::Decoded(_))).await
        {
            text.push_str(&t);
        }
    }
    assert_eq!(text.trim_end(), "SOS");

    listener.shutdown().await;
    dialer.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_session_reconnects_after_peer_drops_stream() {
    // Arrange – a raw TCP peer stands in for the other station.
    let peer = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = peer.local_addr().unwrap().port();
    let cfg = station(RolePreference::Dialer, port);
    let (started, accepted) = tokio::join!(
        Session::start(
            cfg,
            Arc::new(RecordingListener::new()),
            Arc::new(InternationalMorse::new()),
        ),
        peer.accept(),
    );
    let (session, mut events) = started.unwrap();
    let (conn1, _) = accepted.unwrap();
    next_matching(&mut events, |e| {
        matches!(e, SessionEvent::Connected { generation: 1, .. })
    })
    .await;

    // Act – drop the first stream; the session dials again.
    drop(conn1);
    let (mut conn2, _) = tokio::time::timeout(TIMEOUT, peer.accept())
        .await
        .expect("session must reconnect")
        .unwrap();
    let lost = next_matching(&mut events, |e| matches!(e, SessionEvent::Disconnected { .. })).await;
    next_matching(&mut events, |e| {
        matches!(e, SessionEvent::Connected { generation: 2, .. })
    })
    .await;
    session.assert_signal().await.unwrap();

    // Assert
    assert!(matches!(lost, SessionEvent::Disconnected { generation: 1, .. }));
    assert_eq!(session.connection_state(), ConnectionState::Connected);
    let mut byte = [0u8; 1];
    tokio::time::timeout(TIMEOUT, conn2.read_exact(&mut byte))
        .await
        .expect("edge must arrive on the new stream")
        .unwrap();
    assert_eq!(byte, [b'1']);

    session.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_closes_the_stream() {
    // Arrange
    let peer = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = peer.local_addr().unwrap().port();
    let (started, accepted) = tokio::join!(
        Session::start(
            station(RolePreference::Dialer, port),
            Arc::new(RecordingListener::new()),
            Arc::new(InternationalMorse::new()),
        ),
        peer.accept(),
    );
    let (session, _events) = started.unwrap();
    let (mut conn, _) = accepted.unwrap();

    // Act
    tokio::time::timeout(TIMEOUT, session.shutdown())
        .await
        .expect("shutdown must complete");

    // Assert – the peer sees EOF.
    let mut buf = [0u8; 1];
    let n = tokio::time::timeout(TIMEOUT, conn.read(&mut buf))
        .await
        .expect("peer must observe the close")
        .unwrap();
    assert_eq!(n, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_lost_stream_releases_the_line_and_next_press_is_fresh() {
    // Arrange – a raw TCP peer presses its key, then the stream dies.
    let peer = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = peer.local_addr().unwrap().port();
    let buzzer = Arc::new(RecordingListener::new());
    let (started, accepted) = tokio::join!(
        Session::start(
            station(RolePreference::Dialer, port),
            buzzer.clone(),
            Arc::new(InternationalMorse::new()),
        ),
        peer.accept(),
    );
    let (session, _events) = started.unwrap();
    let (mut conn1, _) = accepted.unwrap();
    let mut remote = session.subscribe_remote();
    let mut connection = session.subscribe_connection();

    conn1.write_all(b"1").await.unwrap();
    tokio::time::timeout(TIMEOUT, remote.wait_for(|s| *s == LineState::Asserted))
        .await
        .expect("press must arrive")
        .unwrap();

    // Act – drop the stream mid-press; the line must fall back to released.
    drop(conn1);
    let (mut conn2, _) = tokio::time::timeout(TIMEOUT, peer.accept())
        .await
        .expect("session must reconnect")
        .unwrap();
    let edges = tokio::time::timeout(TIMEOUT, buzzer.wait_for_edges(2))
        .await
        .expect("the cut-off press must be released");
    assert_eq!(edges, vec![LineState::Asserted, LineState::Released]);
    tokio::time::timeout(TIMEOUT, connection.wait_for(|s| *s == ConnectionState::Connected))
        .await
        .expect("link must come back")
        .unwrap();

    // The peer keys a short press on the new stream.
    conn2.set_nodelay(true).unwrap();
    conn2.write_all(b"1").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    conn2.write_all(b"0").await.unwrap();

    // Assert – both new edges are heard and the press decodes as a dot.
    let edges = tokio::time::timeout(TIMEOUT, buzzer.wait_for_edges(4))
        .await
        .expect("both new edges must arrive");
    assert_eq!(
        edges,
        vec![
            LineState::Asserted,
            LineState::Released,
            LineState::Asserted,
            LineState::Released,
        ]
    );
    assert_eq!(session.remote_state(), LineState::Released);
    assert_eq!(session.pending_symbols(), vec![Symbol::Dot]);

    session.shutdown().await;
}
