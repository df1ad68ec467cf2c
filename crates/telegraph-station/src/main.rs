//! Telegraph station: entry point.
//!
//! Connects to one peer station and shares a single key/buzzer line with it.
//! Lines typed on stdin are keyed to the peer as morse; whatever the peer
//! keys is rendered on the console buzzer and printed as decoded text.
//!
//! # Usage
//!
//! ```text
//! telegraph-station --peer <ADDR> [OPTIONS]
//!
//! Options:
//!   --peer <ADDR>      The other station's address
//!   --local <ADDR>     Our own address [default: discovered]
//!   --role <ROLE>      listener | dialer | auto [default: auto]
//!   --port <PORT>      TCP port on both stations [default: 10000]
//!   --unit-ms <MS>     Length of one dot in milliseconds [default: 200]
//!   --letters          Decode letter by letter instead of word by word
//!   --split-letters    Keep letter gaps inside a decoded word
//!   --bell             Ring the terminal bell on every remote press
//!   --config <PATH>    Config file [default: platform config dir]
//!   --save-config      Write the effective settings back to the config file
//!   --self-test        Check key and buzzer locally, then exit
//! ```
//!
//! Every option can also be set through a `TELEGRAPH_*` environment variable
//! (`TELEGRAPH_PEER`, `TELEGRAPH_PORT`, ...).  Precedence is: command line,
//! then environment, then config file, then built-in defaults.
//!
//! # Startup sequence
//!
//! 1. Parse the command line and load the config file.
//! 2. Initialise `tracing`: `RUST_LOG` if set, otherwise `station.log_level`.
//! 3. Either run the self-test, or start a [`Session`] and pump stdin lines
//!    into its keyer while printing decoded events, until Ctrl+C.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use telegraph_core::{DecodeGranularity, InternationalMorse, LineState, RolePreference};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use telegraph_station::application::keyer::Keyer;
use telegraph_station::application::self_test::{run_self_test, DEFAULT_SELF_TEST_TIMEOUT};
use telegraph_station::application::transmit::TransmitError;
use telegraph_station::infrastructure::buzzer::ConsoleBuzzer;
use telegraph_station::infrastructure::network::local_addr::local_ip_or_loopback;
use telegraph_station::infrastructure::storage::config::{
    load_config, load_config_from, save_config, save_config_to, ConfigError, StationConfig,
};
use telegraph_station::{Session, SessionConfig, SessionEvent};

/// How long the simulated key stays down when Enter is pressed in self-test.
const SELF_TEST_PRESS: Duration = Duration::from_millis(100);

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Telegraph station: a two-party key and buzzer line over TCP.
#[derive(Debug, Parser)]
#[command(
    name = "telegraph-station",
    about = "Shares a telegraph key/buzzer line with one remote station",
    version
)]
struct Cli {
    /// Address of the other station.
    #[arg(long, env = "TELEGRAPH_PEER")]
    peer: Option<String>,

    /// This station's own address.
    ///
    /// Used for role negotiation and as the listener's bind address.
    /// Discovered from the default route when not given.
    #[arg(long, env = "TELEGRAPH_LOCAL")]
    local: Option<String>,

    /// Role on the line: `listener`, `dialer` or `auto`.
    ///
    /// With `auto` the station with the smaller address listens.
    #[arg(long, env = "TELEGRAPH_ROLE")]
    role: Option<RolePreference>,

    /// TCP port used by both stations.
    #[arg(long, env = "TELEGRAPH_PORT")]
    port: Option<u16>,

    /// Length of one dot in milliseconds (1 to 60000).
    #[arg(
        long,
        env = "TELEGRAPH_UNIT_MS",
        value_parser = clap::value_parser!(u64).range(1..=60_000)
    )]
    unit_ms: Option<u64>,

    /// Decode each letter as soon as it ends instead of waiting for the word.
    #[arg(long, env = "TELEGRAPH_LETTERS")]
    letters: bool,

    /// When decoding word by word, split the word into letters wherever a
    /// letter gap was keyed.
    #[arg(long, env = "TELEGRAPH_SPLIT_LETTERS")]
    split_letters: bool,

    /// Ring the terminal bell on every remote press.
    #[arg(long, env = "TELEGRAPH_BELL")]
    bell: bool,

    /// Path of the TOML config file.
    #[arg(long, env = "TELEGRAPH_CONFIG")]
    config: Option<PathBuf>,

    /// Write the effective settings to the config file before starting.
    #[arg(long)]
    save_config: bool,

    /// Check the local key and buzzer, then exit.
    #[arg(long)]
    self_test: bool,
}

impl Cli {
    /// Applies command-line overrides on top of the file configuration.
    fn apply_to(&self, config: &mut StationConfig) {
        if let Some(peer) = &self.peer {
            config.station.peer_address = Some(peer.clone());
        }
        if let Some(local) = &self.local {
            config.station.local_address = Some(local.clone());
        }
        if let Some(role) = self.role {
            config.station.role = role;
        }
        if let Some(port) = self.port {
            config.network.port = port;
        }
        if let Some(unit_ms) = self.unit_ms {
            config.timing.unit_ms = unit_ms;
        }
        if self.letters {
            config.timing.granularity = DecodeGranularity::Letter;
        }
        if self.split_letters {
            config.timing.split_letters = true;
        }
        if self.bell {
            config.station.bell = true;
        }
    }

    /// Loads the file configuration: the explicit path, or the platform
    /// default.  A platform without a config directory yields defaults.
    fn load_file_config(&self) -> anyhow::Result<StationConfig> {
        match &self.config {
            Some(path) => load_config_from(path)
                .with_context(|| format!("could not load config from {}", path.display())),
            None => match load_config() {
                Ok(config) => Ok(config),
                Err(ConfigError::NoPlatformConfigDir) => Ok(StationConfig::default()),
                Err(e) => Err(anyhow::Error::new(e).context("could not load config")),
            },
        }
    }

    /// Writes `config` to the file it was loaded from.
    fn save_file_config(&self, config: &StationConfig) -> anyhow::Result<()> {
        match &self.config {
            Some(path) => save_config_to(config, path)
                .with_context(|| format!("could not save config to {}", path.display())),
            None => save_config(config).context("could not save config: pass --config"),
        }
    }
}

/// Builds the session settings from the merged configuration.
///
/// # Errors
///
/// Fails when no peer address is configured.
fn session_config(config: &StationConfig) -> anyhow::Result<SessionConfig> {
    let Some(peer) = config.station.peer_address.clone() else {
        bail!("no peer address: pass --peer or set station.peer_address in the config file");
    };
    let local = config
        .station
        .local_address
        .clone()
        .unwrap_or_else(|| local_ip_or_loopback().to_string());

    let mut session = SessionConfig::new(local, peer);
    session.role = config.station.role;
    session.port = config.network.port;
    session.dial_backoff = config.network.dial_backoff();
    session.timing = config.timing.to_timing();
    Ok(session)
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = cli.load_file_config()?;
    cli.apply_to(&mut config);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.station.log_level)),
        )
        .init();

    if cli.save_config {
        cli.save_file_config(&config)?;
        info!("saved settings");
    }

    let buzzer = Arc::new(ConsoleBuzzer::new(config.station.bell));

    if cli.self_test {
        return self_test(buzzer.as_ref()).await;
    }

    run_station(session_config(&config)?, buzzer).await
}

/// Runs the local self-test.  Enter on stdin stands in for the key.
async fn self_test(buzzer: &ConsoleBuzzer) -> anyhow::Result<()> {
    let (key_tx, mut key_rx) = watch::channel(LineState::Released);
    let mut lines = stdin_lines();
    tokio::spawn(async move {
        while lines.recv().await.is_some() {
            key_tx.send_replace(LineState::Asserted);
            tokio::time::sleep(SELF_TEST_PRESS).await;
            key_tx.send_replace(LineState::Released);
        }
    });

    println!("Buzzer is on. Press Enter to press and release the key.");
    run_self_test(buzzer, &mut key_rx, DEFAULT_SELF_TEST_TIMEOUT)
        .await
        .context("self-test failed")?;
    println!("Self-test passed.");
    Ok(())
}

/// Runs a session until Ctrl+C or a fatal link error.
async fn run_station(config: SessionConfig, buzzer: Arc<ConsoleBuzzer>) -> anyhow::Result<()> {
    println!("Your address is {}", config.local_addr);
    println!("Connecting to {} on port {} ...", config.peer_addr, config.port);

    let (session, mut events) = Session::start(config, buzzer, Arc::new(InternationalMorse::new()))
        .await
        .context("could not start the session")?;
    info!("session {} running as {}", session.id(), session.role());
    println!("Connected. Type text and press Enter to key it.");

    // Keying runs on its own task so decoded text keeps printing meanwhile.
    let mut keying = tokio::spawn(key_lines(session.keyer(), stdin_lines()));
    let mut keying_done = false;

    let result = loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    error!("failed to listen for Ctrl+C: {e}");
                }
                info!("received Ctrl+C; shutting down");
                break Ok(());
            }
            joined = &mut keying, if !keying_done => {
                keying_done = true;
                match joined {
                    Ok(Ok(())) => info!("stdin closed; still listening"),
                    Ok(Err(TransmitError::Closed)) => break Ok(()),
                    Ok(Err(e)) => break Err(anyhow::Error::new(e).context("keying failed")),
                    Err(e) => break Err(anyhow::Error::new(e).context("keying task panicked")),
                }
            }
            event = events.recv() => match event {
                Some(SessionEvent::Decoded(text)) => {
                    print!("{text}");
                    let _ = std::io::stdout().flush();
                }
                Some(SessionEvent::Connected { generation, peer }) => {
                    info!("link up to {peer} (stream {generation})");
                }
                Some(SessionEvent::Disconnected { generation, reason }) => {
                    warn!("link down (stream {generation}): {reason}; reconnecting");
                }
                Some(SessionEvent::Failed(reason)) => break Err(anyhow::anyhow!(reason)),
                None => break Ok(()),
            },
        }
    };

    if !keying_done {
        keying.abort();
    }
    session.shutdown().await;
    println!();
    result
}

/// Keys every line until the input ends.
async fn key_lines(
    keyer: Keyer,
    mut lines: mpsc::UnboundedReceiver<String>,
) -> Result<(), TransmitError> {
    while let Some(line) = lines.recv().await {
        keyer.key_text(&line).await?;
    }
    Ok(())
}

/// Reads stdin on a plain thread and forwards each line.
///
/// A blocking read inside the runtime would keep it from shutting down while
/// the user is idle, so the thread is detached and dies with the process.
fn stdin_lines() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("stdin read failed: {e}");
                    break;
                }
            }
        }
    });
    rx
}

// ── Tests ─────────────────────────────────────────────────────────────────────
