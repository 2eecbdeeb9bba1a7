//! # HangarLink Core Library
//!
//! Core functionality for the HangarLink drone remote unit.

#![warn(missing_docs)]

//!
//! This library provides:
//! - Line framing and bounded message queueing over a serial byte stream
//! - Channel management (open/close/reconfigure, baud-rate selection)
//! - The alive handshake and connection state machine
//! - Telemetry decoding with a data-freshness watchdog
//!
//! The graphical shell is not part of this crate: it consumes the
//! [`protocol::Session`] observable state and marshals updates to its own
//! rendering context.
//!
//! ## Example
//!
//! ```rust,ignore
//! use hangarlink_core::protocol::{Command, Session};
//!
//! let session = Session::new();
//! session.on_state_change(|state| println!("connection: {state}"));
//! session.connect("/dev/ttyACM0");
//!
//! // Later, once connected:
//! session.send_command(&Command::new("TAKEOFF"))?;
//! let telemetry = session.telemetry();
//! ```

pub mod protocol;

pub use protocol::{
    Channel, Command, ConnectionState, DroneState, HangarState, ProtocolError, Session,
    SessionConfig, TelemetrySnapshot,
};
