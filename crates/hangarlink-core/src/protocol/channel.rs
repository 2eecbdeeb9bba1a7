//! Communication channel
//!
//! Composes the transport, line framer, and message queue into one
//! message-oriented abstraction: fire-and-forget sends, blocking/timed
//! receives, and port lifecycle management.
//!
//! The port handle and baud rate are only touched under a single
//! port-exclusive lock. Inbound bytes arrive on a dedicated reader thread
//! holding its own cloned handle, so reads never contend with writes; the
//! reader only feeds the framer and enqueues frames, it never blocks on
//! consumers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use super::error::{PortErrorCategory, ProtocolError};
use super::framer::LineFramer;
use super::queue::MessageQueue;
use super::serial;
use super::transport::Transport;
use super::{DEFAULT_BAUD_RATE, RX_BUFFER_CAPACITY};

struct PortSlot {
    writer: Option<Box<dyn Transport>>,
    label: Option<String>,
    baud_rate: u32,
    reader_stop: Option<Arc<AtomicBool>>,
    reader: Option<JoinHandle<()>>,
}

/// Message-oriented channel over a serial transport
pub struct Channel {
    slot: Mutex<PortSlot>,
    queue: Arc<MessageQueue>,
    rx_capacity: usize,
    // Set by the reader thread on a fatal read error; cleared on open.
    link_broken: Arc<AtomicBool>,
}

impl Channel {
    /// Create a channel with the default baud rate and buffer sizes.
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(PortSlot {
                writer: None,
                label: None,
                baud_rate: DEFAULT_BAUD_RATE,
                reader_stop: None,
                reader: None,
            }),
            queue: Arc::new(MessageQueue::new()),
            rx_capacity: RX_BUFFER_CAPACITY,
            link_broken: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Send one message. The line delimiter is appended here.
    ///
    /// Fails with [`ProtocolError::NotOpen`] when no port is open; transport
    /// write failures are re-raised with a categorized human-readable text.
    pub fn send(&self, msg: &str) -> Result<(), ProtocolError> {
        let mut slot = self.slot.lock().expect("port lock poisoned");
        let writer = slot.writer.as_mut().ok_or(ProtocolError::NotOpen)?;

        tracing::debug!("Sending message: {}", msg);
        let mut bytes = msg.as_bytes().to_vec();
        bytes.push(b'\n');
        writer.write_all(&bytes).map_err(|e| {
            let category = PortErrorCategory::classify(&e.to_string());
            ProtocolError::TransportError(format!("{} ({})", category.user_message(), e))
        })
    }

    /// Receive one frame, blocking until available.
    ///
    /// Returns `None` when the wait is cancelled by [`Channel::close`].
    pub fn receive(&self) -> Option<String> {
        self.queue.take()
    }

    /// Receive one frame, blocking at most `timeout`.
    pub fn poll(&self, timeout: Duration) -> Option<String> {
        self.queue.poll(timeout)
    }

    /// Non-blocking check for a pending frame.
    pub fn is_message_available(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Open the given port at the configured baud rate.
    ///
    /// Any previously open port is closed first. On failure the port
    /// reference is cleared and a categorized error is returned.
    pub fn set_port(&self, name: &str) -> Result<(), ProtocolError> {
        tracing::info!("Setting comm port to: {}", name);
        let mut slot = self.slot.lock().expect("port lock poisoned");
        Self::close_locked(&mut slot, &self.queue);

        let link = serial::open_port(name, slot.baud_rate)?;
        self.start_locked(&mut slot, Box::new(link), name)
    }

    /// Open the channel over an arbitrary transport.
    ///
    /// Used for pseudo-terminals and in-memory fakes; real serial devices go
    /// through [`Channel::set_port`].
    pub fn attach(&self, transport: Box<dyn Transport>, label: &str) -> Result<(), ProtocolError> {
        let mut slot = self.slot.lock().expect("port lock poisoned");
        Self::close_locked(&mut slot, &self.queue);
        self.start_locked(&mut slot, transport, label)
    }

    fn start_locked(
        &self,
        slot: &mut PortSlot,
        writer: Box<dyn Transport>,
        label: &str,
    ) -> Result<(), ProtocolError> {
        let reader_handle = match writer.try_clone() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!("Failed to clone transport for {}: {}", label, e);
                return Err(ProtocolError::PortUnavailable {
                    port: label.to_string(),
                    category: PortErrorCategory::classify(&e.to_string()),
                });
            }
        };

        self.queue.reset();
        self.link_broken.store(false, Ordering::Release);
        let stop = Arc::new(AtomicBool::new(false));
        let queue = Arc::clone(&self.queue);
        let rx_capacity = self.rx_capacity;
        let thread_label = label.to_string();
        let thread_stop = Arc::clone(&stop);
        let thread_broken = Arc::clone(&self.link_broken);
        let reader = std::thread::Builder::new()
            .name("hangarlink-reader".to_string())
            .spawn(move || {
                reader_loop(
                    reader_handle,
                    thread_stop,
                    queue,
                    rx_capacity,
                    thread_broken,
                    thread_label,
                )
            })
            .map_err(ProtocolError::IoError)?;

        slot.writer = Some(writer);
        slot.label = Some(label.to_string());
        slot.reader_stop = Some(stop);
        slot.reader = Some(reader);
        tracing::info!("Port {} configured and ready", label);
        Ok(())
    }

    /// Update the baud rate; a live port is reconfigured in place.
    pub fn set_baud_rate(&self, baud_rate: u32) -> Result<(), ProtocolError> {
        tracing::info!("Setting baud rate to: {}", baud_rate);
        let mut slot = self.slot.lock().expect("port lock poisoned");
        slot.baud_rate = baud_rate;

        if let Some(writer) = slot.writer.as_mut() {
            writer.set_baud_rate(baud_rate).map_err(|e| {
                tracing::error!("Failed to update baud rate on active connection: {}", e);
                ProtocolError::TransportError(e.to_string())
            })?;
            tracing::info!("Baud rate updated on active connection");
        }
        Ok(())
    }

    /// The currently configured baud rate.
    pub fn baud_rate(&self) -> u32 {
        self.slot.lock().expect("port lock poisoned").baud_rate
    }

    /// List available serial port identifiers.
    pub fn available_ports(&self) -> Vec<String> {
        serial::available_ports()
    }

    /// Baud rates offered for selection.
    pub fn supported_baud_rates(&self) -> &'static [u32] {
        serial::supported_baud_rates()
    }

    /// Whether a port is currently open and the link is still usable.
    ///
    /// Reports `false` once the reader thread hits a fatal read error, even
    /// though the native handle has not been released yet.
    pub fn is_open(&self) -> bool {
        self.slot.lock().expect("port lock poisoned").writer.is_some()
            && !self.link_broken.load(Ordering::Acquire)
    }

    /// Whether the link died with a fatal read error (as opposed to being
    /// closed deliberately). Cleared when a port is opened.
    pub fn is_broken(&self) -> bool {
        self.link_broken.load(Ordering::Acquire)
    }

    /// Close the port, stop the reader thread, and drain the queue.
    ///
    /// Idempotent and callable from any thread; close-path failures are
    /// logged and suppressed so a stuck handle never blocks a fresh connect.
    pub fn close(&self) {
        let mut slot = self.slot.lock().expect("port lock poisoned");
        Self::close_locked(&mut slot, &self.queue);
    }

    fn close_locked(slot: &mut PortSlot, queue: &MessageQueue) {
        // Wake anything blocked in receive()/poll() and discard leftovers,
        // even when no port was ever opened.
        queue.shutdown();

        if slot.writer.is_none() && slot.reader.is_none() {
            return;
        }
        if let Some(label) = slot.label.take() {
            tracing::info!("Closing port: {}", label);
        }

        if let Some(stop) = slot.reader_stop.take() {
            stop.store(true, Ordering::Release);
        }
        // Dropping the writer releases our half of the native handle; the
        // reader's clone goes away when its thread observes the stop flag.
        slot.writer = None;

        if let Some(reader) = slot.reader.take() {
            if reader.join().is_err() {
                tracing::warn!("Reader thread panicked during close");
            }
        }
    }
}

impl Default for Channel {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.close();
    }
}

/// The byte-received path: blocking reads with a short timeout, framing,
/// and non-blocking enqueue. Exits on the stop flag or a fatal read error;
/// the latter marks the link broken and shuts the queue down so blocked
/// consumers wake and the session observes the dead link.
fn reader_loop(
    mut transport: Box<dyn Transport>,
    stop: Arc<AtomicBool>,
    queue: Arc<MessageQueue>,
    rx_capacity: usize,
    broken: Arc<AtomicBool>,
    label: String,
) {
    let mut framer = LineFramer::with_capacity(rx_capacity);
    let mut buf = [0u8; 512];
    tracing::debug!("Reader thread for {} started", label);

    while !stop.load(Ordering::Acquire) {
        match transport.read(&mut buf) {
            Ok(0) => continue,
            Ok(n) => {
                for frame in framer.feed(&buf[..n]) {
                    tracing::debug!("Complete frame: {}", frame);
                    if !queue.push(frame) {
                        tracing::warn!("Message queue full, dropping frame");
                    }
                }
            }
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::TimedOut
                        | std::io::ErrorKind::WouldBlock
                        | std::io::ErrorKind::Interrupted
                ) =>
            {
                continue;
            }
            Err(e) => {
                if !stop.load(Ordering::Acquire) {
                    tracing::error!("Read error on {}: {}", label, e);
                    broken.store(true, Ordering::Release);
                    queue.shutdown();
                }
                break;
            }
        }
    }

    tracing::debug!("Reader thread for {} stopped", label);
}
