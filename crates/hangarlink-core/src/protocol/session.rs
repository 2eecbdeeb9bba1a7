//! Connection session
//!
//! Orchestrates open -> handshake -> steady-state listening -> teardown over
//! a [`Channel`], translating frames into telemetry updates and connection
//! state transitions.
//!
//! Threading: one long-lived worker consumes connect/command jobs, so
//! connection attempts and command writes are serialized; each live
//! connection runs its own listener thread. Every blocking wait is
//! cooperatively cancellable through a generation counter - a new connect
//! request bumps the generation, and the superseded attempt observes the
//! change at its next poll and exits as `Cancelled` with no further side
//! effects.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::channel::Channel;
use super::commands::Command;
use super::error::ProtocolError;
use super::state::ConnectionState;
use super::telemetry::{Telemetry, TelemetrySnapshot};
use super::transport::Transport;
use super::wire::{self, WireField};
use super::{ALIVE_TIMEOUT, DATA_FRESHNESS_TIMEOUT, POLL_TIMEOUT};

/// Callback invoked on every connection state transition
pub type StateListener = Box<dyn Fn(ConnectionState) + Send + Sync>;
/// Callback invoked with a short human-readable message on failures
pub type ErrorListener = Box<dyn Fn(&str) + Send + Sync>;

/// Session timing configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Maximum time to wait for the initial alive frame
    pub alive_timeout: Duration,
    /// Poll period for handshake and listener loops
    pub poll_timeout: Duration,
    /// Staleness threshold for the freshness watchdog
    pub freshness_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            alive_timeout: ALIVE_TIMEOUT,
            poll_timeout: POLL_TIMEOUT,
            freshness_timeout: DATA_FRESHNESS_TIMEOUT,
        }
    }
}

enum ConnectTarget {
    Port(String),
    Transport {
        transport: Box<dyn Transport>,
        label: String,
    },
}

enum Job {
    Connect {
        target: ConnectTarget,
        generation: u64,
    },
    Command(Command),
    Shutdown,
}

struct Shared {
    channel: Channel,
    config: SessionConfig,
    state: Mutex<ConnectionState>,
    telemetry: Mutex<Telemetry>,
    generation: AtomicU64,
    state_listener: Mutex<Option<StateListener>>,
    error_listener: Mutex<Option<ErrorListener>>,
}

impl Shared {
    fn superseded(&self, generation: u64) -> bool {
        self.generation.load(Ordering::Acquire) != generation
    }

    fn set_state(&self, new_state: ConnectionState) {
        {
            let mut state = self.state.lock().expect("state lock poisoned");
            if *state == new_state {
                return;
            }
            if !state.can_transition_to(new_state) {
                tracing::warn!("Rejected invalid transition {} -> {}", state, new_state);
                return;
            }
            tracing::info!("Connection state: {} -> {}", state, new_state);
            *state = new_state;
        }
        if let Some(listener) = self
            .state_listener
            .lock()
            .expect("listener lock poisoned")
            .as_ref()
        {
            listener(new_state);
        }
    }

    fn notify_error(&self, message: &str) {
        if let Some(listener) = self
            .error_listener
            .lock()
            .expect("listener lock poisoned")
            .as_ref()
        {
            listener(message);
        }
    }
}

/// Drives the connection lifecycle to the hangar unit
pub struct Session {
    shared: Arc<Shared>,
    jobs: Sender<Job>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// Create a session with default timing over a fresh channel.
    pub fn new() -> Self {
        Self::with_config(Channel::new(), SessionConfig::default())
    }

    /// Create a session over an existing channel with explicit timing.
    pub fn with_config(channel: Channel, config: SessionConfig) -> Self {
        let shared = Arc::new(Shared {
            channel,
            config,
            state: Mutex::new(ConnectionState::Disconnected),
            telemetry: Mutex::new(Telemetry::new()),
            generation: AtomicU64::new(0),
            state_listener: Mutex::new(None),
            error_listener: Mutex::new(None),
        });

        let (jobs, job_rx) = mpsc::channel();
        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name("hangarlink-session".to_string())
            .spawn(move || worker_loop(worker_shared, job_rx))
            .expect("failed to spawn session worker");

        Self {
            shared,
            jobs,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Register the state-change callback. The presentation layer is
    /// responsible for marshalling to its own rendering context.
    pub fn on_state_change(&self, listener: impl Fn(ConnectionState) + Send + Sync + 'static) {
        *self
            .shared
            .state_listener
            .lock()
            .expect("listener lock poisoned") = Some(Box::new(listener));
    }

    /// Register the error callback, invoked with short human-readable
    /// messages.
    pub fn on_error(&self, listener: impl Fn(&str) + Send + Sync + 'static) {
        *self
            .shared
            .error_listener
            .lock()
            .expect("listener lock poisoned") = Some(Box::new(listener));
    }

    /// Request a connection to the given serial port.
    ///
    /// Asynchronous; supersedes and cancels any in-flight attempt or live
    /// session. Progress is reported through the state listener.
    pub fn connect(&self, port: &str) {
        let generation = self.bump_generation();
        let _ = self.jobs.send(Job::Connect {
            target: ConnectTarget::Port(port.to_string()),
            generation,
        });
    }

    /// Request a connection over an arbitrary transport (pseudo-terminals,
    /// in-memory fakes). Same lifecycle as [`Session::connect`].
    pub fn connect_with(&self, transport: Box<dyn Transport>, label: &str) {
        let generation = self.bump_generation();
        let _ = self.jobs.send(Job::Connect {
            target: ConnectTarget::Transport {
                transport,
                label: label.to_string(),
            },
            generation,
        });
    }

    fn bump_generation(&self) -> u64 {
        self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Send a command to the hangar unit.
    ///
    /// Rejected synchronously with [`ProtocolError::NotConnected`] when the
    /// port is closed; transport failures on the worker are surfaced through
    /// the error listener.
    pub fn send_command(&self, command: &Command) -> Result<(), ProtocolError> {
        if !self.shared.channel.is_open() {
            return Err(ProtocolError::NotConnected);
        }
        self.jobs
            .send(Job::Command(command.clone()))
            .map_err(|_| ProtocolError::NotConnected)
    }

    /// Close the current connection. The listener loop observes the closed
    /// port and transitions to `DISCONNECTED`.
    pub fn disconnect(&self) {
        self.shared.channel.close();
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        *self.shared.state.lock().expect("state lock poisoned")
    }

    /// Whether the session currently holds an open, handshaken connection.
    pub fn is_connected(&self) -> bool {
        self.shared.channel.is_open()
            && self.connection_state() == ConnectionState::Connected
    }

    /// Snapshot of the telemetry fields.
    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.shared
            .telemetry
            .lock()
            .expect("telemetry lock poisoned")
            .snapshot()
    }

    /// List available serial port identifiers.
    pub fn available_ports(&self) -> Vec<String> {
        self.shared.channel.available_ports()
    }

    /// Baud rates offered for selection.
    pub fn supported_baud_rates(&self) -> &'static [u32] {
        self.shared.channel.supported_baud_rates()
    }

    /// Update the baud rate; a live port is reconfigured in place.
    pub fn set_baud_rate(&self, baud_rate: u32) -> Result<(), ProtocolError> {
        self.shared.channel.set_baud_rate(baud_rate)
    }

    /// Stop all background threads and close the channel.
    ///
    /// Closing the channel lets the listener loop (or an in-flight
    /// handshake) observe the closed port and record its own terminal
    /// transition before the worker is joined.
    pub fn shutdown(&self) {
        let _ = self.jobs.send(Job::Shutdown);
        self.shared.channel.close();
        if let Some(worker) = self
            .worker
            .lock()
            .expect("worker lock poisoned")
            .take()
        {
            if worker.join().is_err() {
                tracing::warn!("Session worker panicked during shutdown");
            }
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(shared: Arc<Shared>, jobs: Receiver<Job>) {
    let mut listener: Option<JoinHandle<()>> = None;

    while let Ok(job) = jobs.recv() {
        match job {
            Job::Connect { target, generation } => {
                if shared.superseded(generation) {
                    tracing::debug!("Connect request superseded before it started");
                    continue;
                }
                // Tear down whatever came before this attempt.
                shared.channel.close();
                if let Some(old) = listener.take() {
                    let _ = old.join();
                }
                listener = do_connect(&shared, target, generation);
            }
            Job::Command(command) => {
                let frame = wire::encode_command(&command);
                if let Err(e) = shared.channel.send(&frame) {
                    tracing::error!("Failed to send command {}: {}", command, e);
                    shared.notify_error(&e.to_string());
                }
            }
            Job::Shutdown => break,
        }
    }

    shared.channel.close();
    if let Some(old) = listener.take() {
        let _ = old.join();
    }
}

fn do_connect(
    shared: &Arc<Shared>,
    target: ConnectTarget,
    generation: u64,
) -> Option<JoinHandle<()>> {
    let label = match &target {
        ConnectTarget::Port(port) => port.clone(),
        ConnectTarget::Transport { label, .. } => label.clone(),
    };

    if label.trim().is_empty() {
        tracing::error!("Invalid serial port: '{}'", label);
        shared.set_state(ConnectionState::Error);
        shared.notify_error("Invalid serial port");
        return None;
    }

    shared.set_state(ConnectionState::Connecting);

    let opened = match target {
        ConnectTarget::Port(port) => shared.channel.set_port(&port),
        ConnectTarget::Transport { transport, label } => shared.channel.attach(transport, &label),
    };
    if let Err(e) = opened {
        if shared.superseded(generation) {
            shared.set_state(ConnectionState::Cancelled);
        } else {
            tracing::error!("Failed to open serial port {}: {}", label, e);
            shared.set_state(ConnectionState::Error);
            shared.notify_error(&e.to_string());
        }
        return None;
    }
    tracing::info!("Serial port opened: {}", label);

    match wait_for_alive(shared, generation) {
        HandshakeOutcome::Alive => {
            shared.set_state(ConnectionState::Connected);
            let listener_shared = Arc::clone(shared);
            let handle = std::thread::Builder::new()
                .name("hangarlink-listener".to_string())
                .spawn(move || listener_loop(listener_shared, generation));
            match handle {
                Ok(handle) => Some(handle),
                Err(e) => {
                    tracing::error!("Failed to spawn listener thread: {}", e);
                    shared.channel.close();
                    None
                }
            }
        }
        HandshakeOutcome::TimedOut => {
            let err = ProtocolError::HandshakeTimeout;
            tracing::error!("{}", err);
            shared.set_state(ConnectionState::Timeout);
            shared.notify_error(&err.to_string());
            shared.channel.close();
            None
        }
        HandshakeOutcome::Failed => {
            tracing::error!("Serial link to {} lost while waiting for alive", label);
            shared.set_state(ConnectionState::Error);
            shared.notify_error("Serial link lost");
            shared.channel.close();
            None
        }
        HandshakeOutcome::Cancelled => {
            tracing::info!("Connect attempt to {} cancelled", label);
            shared.set_state(ConnectionState::Cancelled);
            None
        }
    }
}

enum HandshakeOutcome {
    Alive,
    TimedOut,
    Failed,
    Cancelled,
}

/// Passively wait for an unsolicited `alive: true` frame from the peer.
fn wait_for_alive(shared: &Shared, generation: u64) -> HandshakeOutcome {
    let deadline = Instant::now() + shared.config.alive_timeout;

    while Instant::now() < deadline {
        if shared.superseded(generation) {
            return HandshakeOutcome::Cancelled;
        }
        if !shared.channel.is_open() {
            // A deliberate close cancels the attempt; a dead link is a
            // connection failure.
            return if shared.channel.is_broken() {
                HandshakeOutcome::Failed
            } else {
                HandshakeOutcome::Cancelled
            };
        }

        let Some(frame) = shared.channel.poll(shared.config.poll_timeout) else {
            continue;
        };
        match wire::parse_frame(&frame) {
            Ok(fields) => {
                if fields.contains(&WireField::Alive(true)) {
                    tracing::info!("Alive message received");
                    return HandshakeOutcome::Alive;
                }
            }
            Err(_) => {
                tracing::warn!("Invalid frame while waiting for alive: {}", frame);
            }
        }
    }

    if shared.superseded(generation) {
        HandshakeOutcome::Cancelled
    } else {
        HandshakeOutcome::TimedOut
    }
}

fn listener_loop(shared: Arc<Shared>, generation: u64) {
    tracing::info!("Listener thread started");
    shared
        .telemetry
        .lock()
        .expect("telemetry lock poisoned")
        .restart_timers(Instant::now());

    loop {
        if shared.superseded(generation) {
            // Superseded sessions exit silently; the new attempt owns the
            // state machine now.
            tracing::debug!("Listener superseded, exiting");
            return;
        }
        if !shared.channel.is_open() {
            break;
        }

        if let Some(frame) = shared.channel.poll(shared.config.poll_timeout) {
            handle_frame(&shared, &frame);
        }

        shared
            .telemetry
            .lock()
            .expect("telemetry lock poisoned")
            .expire_stale(shared.config.freshness_timeout, Instant::now());
    }

    shared.channel.close();
    shared.set_state(ConnectionState::Disconnected);
    shared
        .telemetry
        .lock()
        .expect("telemetry lock poisoned")
        .clear();
    tracing::info!("Listener thread stopped");
}

fn handle_frame(shared: &Shared, frame: &str) {
    let fields = match wire::parse_frame(frame) {
        Ok(fields) => fields,
        Err(e) => {
            tracing::warn!("Discarding frame: {}", e);
            return;
        }
    };

    let now = Instant::now();
    let mut telemetry = shared.telemetry.lock().expect("telemetry lock poisoned");
    for field in fields {
        match field {
            WireField::Drone(state) => telemetry.set_drone_state(state, now),
            WireField::Hangar(state) => telemetry.set_hangar_state(state, now),
            WireField::Distance(distance) => telemetry.set_distance(distance, now),
            WireField::Alive(_) => {
                tracing::debug!("Alive frame outside handshake, ignoring");
            }
            WireField::Connection(state) => {
                // The local side owns its state machine; peer tokens are
                // informational only.
                tracing::debug!("Peer connection token: {}", state);
            }
        }
    }
}
