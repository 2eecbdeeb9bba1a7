//! Transport abstraction
//!
//! Narrow seam over the byte-oriented device so the channel can run against
//! a real serial port, a pseudo-terminal, or an in-memory fake in tests.

use std::io;
use std::time::Duration;

/// A byte-oriented, full-duplex transport
///
/// `read` is expected to block for at most the configured timeout and signal
/// expiry with `ErrorKind::TimedOut` (or `WouldBlock`); the reader thread
/// treats both as "no data yet". `try_clone` hands the reader thread its own
/// handle so reads never contend with writes on the port lock.
pub trait Transport: Send {
    /// Write the whole buffer.
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Read available bytes, blocking at most the configured timeout.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Set the read timeout.
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()>;

    /// Reconfigure the line speed in place.
    fn set_baud_rate(&mut self, baud_rate: u32) -> io::Result<()>;

    /// Clone the handle for use on another thread.
    fn try_clone(&self) -> io::Result<Box<dyn Transport>>;
}
