//! Serial protocol communication
//!
//! Turns a raw serial byte stream into a reliable message-oriented channel
//! and drives the connection lifecycle on top of it: line framing with a
//! bounded RX buffer, a bounded message queue, port management, the alive
//! handshake, the telemetry listener loop, and the freshness watchdog.

pub mod channel;
pub mod commands;
mod error;
pub mod framer;
pub mod queue;
pub mod serial;
pub mod session;
mod state;
pub mod telemetry;
pub mod transport;
pub mod wire;

pub use channel::Channel;
pub use commands::Command;
pub use error::{PortErrorCategory, ProtocolError};
pub use framer::LineFramer;
pub use queue::MessageQueue;
pub use serial::{available_ports, open_port, supported_baud_rates, SerialLink};
pub use session::{Session, SessionConfig};
pub use state::ConnectionState;
pub use telemetry::{Telemetry, TelemetrySnapshot};
pub use transport::Transport;
pub use wire::{format_distance, parse_frame, DroneState, HangarState, WireField};

use std::time::Duration;

/// Default baud rate for the hangar link
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Baud rates offered for selection
pub const SUPPORTED_BAUD_RATES: &[u32] = &[9600, 19200, 38400, 57600, 115200];

/// Capacity of the RX line buffer; overflow discards the oldest half
pub const RX_BUFFER_CAPACITY: usize = 2048;

/// Capacity of the message queue; overflow drops the newest frame
pub const MESSAGE_QUEUE_CAPACITY: usize = 100;

/// Read timeout of the port reader thread
pub const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Maximum time to wait for the initial alive message
pub const ALIVE_TIMEOUT: Duration = Duration::from_millis(1500);

/// Polling timeout for handshake and listener loops
pub const POLL_TIMEOUT: Duration = Duration::from_millis(200);

/// Staleness threshold after which telemetry fields are cleared
pub const DATA_FRESHNESS_TIMEOUT: Duration = Duration::from_millis(3000);
