//! Serial port handling
//!
//! Provides enumeration, opening, and configuration of real serial ports,
//! and the [`Transport`] implementation backed by the `serialport` crate.

use serialport::SerialPort;
use std::collections::BTreeSet;
use std::io;
use std::path::Path;
use std::time::Duration;

use super::error::{PortErrorCategory, ProtocolError};
use super::transport::Transport;
use super::{READ_TIMEOUT, SUPPORTED_BAUD_RATES};

/// Helper used to sort port names so that:
///  - ttyACM* ports come first (sorted numerically by suffix)
///  - then ttyUSB* ports (sorted numerically)
///  - then other ports (sorted by name)
fn port_sort_key(name: &str) -> (u8, usize, String) {
    let basename = name.rsplit('/').next().unwrap_or(name);
    if let Some(rest) = basename.strip_prefix("ttyACM") {
        let num = rest.parse::<usize>().unwrap_or(usize::MAX);
        return (0, num, basename.to_string());
    }
    if let Some(rest) = basename.strip_prefix("ttyUSB") {
        let num = rest.parse::<usize>().unwrap_or(usize::MAX);
        return (1, num, basename.to_string());
    }
    (2, 0, basename.to_string())
}

/// List available serial port identifiers, with /dev fallbacks and
/// deterministic ordering. Pure query, no state mutation.
pub fn available_ports() -> Vec<String> {
    let mut names: BTreeSet<String> = serialport::available_ports()
        .unwrap_or_default()
        .into_iter()
        .map(|info| info.port_name)
        .collect();

    // Linux-only: add /dev/ttyACM* and /dev/ttyUSB* entries the API missed
    #[cfg(target_os = "linux")]
    if let Ok(entries) = std::fs::read_dir("/dev") {
        for entry in entries.flatten() {
            if let Some(fname) = entry.file_name().to_str() {
                if fname.starts_with("ttyACM") || fname.starts_with("ttyUSB") {
                    names.insert(format!("/dev/{}", fname));
                }
            }
        }
    }

    let mut v: Vec<String> = names.into_iter().collect();
    v.sort_by_key(|n| port_sort_key(n));
    v
}

/// Baud rates the channel offers for selection.
pub fn supported_baud_rates() -> &'static [u32] {
    SUPPORTED_BAUD_RATES
}

/// Resolve symlinked device paths (e.g. /dev/serial/by-id/...) to their
/// canonical form; identifiers that are not paths pass through unchanged.
pub fn resolve_port_name(name: &str) -> String {
    let path = Path::new(name);
    if path.exists() {
        if let Ok(real) = path.canonicalize() {
            let resolved = real.to_string_lossy().into_owned();
            if resolved != name {
                tracing::debug!("Resolved comm port {} -> {}", name, resolved);
            }
            return resolved;
        }
    }
    name.to_string()
}

/// Open a serial port with 8N1 framing, no flow control, and a short read
/// timeout for the reader thread.
pub fn open_port(name: &str, baud_rate: u32) -> Result<SerialLink, ProtocolError> {
    let resolved = resolve_port_name(name);

    let port = serialport::new(&resolved, baud_rate)
        .data_bits(serialport::DataBits::Eight)
        .stop_bits(serialport::StopBits::One)
        .parity(serialport::Parity::None)
        .flow_control(serialport::FlowControl::None)
        .timeout(READ_TIMEOUT)
        .open()
        .map_err(|e| ProtocolError::PortUnavailable {
            port: name.to_string(),
            category: PortErrorCategory::classify(&e.to_string()),
        })?;

    tracing::debug!(
        "Port {} opened (requested: {}), baud={}, 8N1, no flow control",
        resolved,
        name,
        baud_rate
    );
    Ok(SerialLink { port })
}

/// [`Transport`] backed by a native serial port
pub struct SerialLink {
    port: Box<dyn SerialPort>,
}

impl Transport for SerialLink {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.port.write_all(buf)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }

    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.port
            .set_timeout(timeout)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> io::Result<()> {
        self.port
            .set_baud_rate(baud_rate)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    fn try_clone(&self) -> io::Result<Box<dyn Transport>> {
        let port = self
            .port
            .try_clone()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(Box::new(SerialLink { port }))
    }
}
