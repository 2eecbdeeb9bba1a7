//! In-memory fake transport for deterministic tests without hardware.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use hangarlink_core::protocol::Transport;

struct FakeInner {
    rx: Mutex<VecDeque<u8>>,
    rx_available: Condvar,
    tx: Mutex<Vec<u8>>,
    read_timeout: Mutex<Duration>,
    broken: AtomicBool,
}

/// Test-side handle: inject device output, inspect what the channel wrote.
#[derive(Clone)]
pub struct FakeDevice {
    inner: Arc<FakeInner>,
}

#[allow(dead_code)]
impl FakeDevice {
    /// Queue bytes for the channel's reader thread to pick up.
    pub fn emit(&self, bytes: &[u8]) {
        let mut rx = self.inner.rx.lock().unwrap();
        rx.extend(bytes.iter().copied());
        drop(rx);
        self.inner.rx_available.notify_all();
    }

    /// Everything the channel has written so far.
    pub fn written(&self) -> Vec<u8> {
        self.inner.tx.lock().unwrap().clone()
    }

    /// Make every subsequent read/write fail.
    pub fn break_link(&self) {
        self.inner.broken.store(true, Ordering::SeqCst);
        self.inner.rx_available.notify_all();
    }
}

/// [`Transport`] talking to a [`FakeDevice`] through shared buffers.
pub struct FakeLink {
    inner: Arc<FakeInner>,
}

impl FakeLink {
    pub fn new() -> (FakeLink, FakeDevice) {
        let inner = Arc::new(FakeInner {
            rx: Mutex::new(VecDeque::new()),
            rx_available: Condvar::new(),
            tx: Mutex::new(Vec::new()),
            read_timeout: Mutex::new(Duration::from_millis(100)),
            broken: AtomicBool::new(false),
        });
        (
            FakeLink {
                inner: Arc::clone(&inner),
            },
            FakeDevice { inner },
        )
    }
}

impl Transport for FakeLink {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        if self.inner.broken.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "link broken"));
        }
        self.inner.tx.lock().unwrap().extend_from_slice(buf);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.inner.broken.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "link broken"));
        }
        let timeout = *self.inner.read_timeout.lock().unwrap();
        let mut rx = self.inner.rx.lock().unwrap();
        if rx.is_empty() {
            let (guard, _) = self
                .inner
                .rx_available
                .wait_timeout(rx, timeout)
                .unwrap();
            rx = guard;
        }
        if self.inner.broken.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "link broken"));
        }
        if rx.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out"));
        }
        let n = buf.len().min(rx.len());
        for slot in buf.iter_mut().take(n) {
            *slot = rx.pop_front().unwrap();
        }
        Ok(n)
    }

    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        *self.inner.read_timeout.lock().unwrap() = timeout;
        Ok(())
    }

    fn set_baud_rate(&mut self, _baud_rate: u32) -> io::Result<()> {
        Ok(())
    }

    fn try_clone(&self) -> io::Result<Box<dyn Transport>> {
        Ok(Box::new(FakeLink {
            inner: Arc::clone(&self.inner),
        }))
    }
}

/// Install an env-filtered subscriber routing log output through the test
/// harness. Safe to call from every test; only the first call wins.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Spin until `predicate` holds or `timeout` elapses; returns whether it held.
#[allow(dead_code)]
pub fn wait_until(timeout: Duration, predicate: impl Fn() -> bool) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if predicate() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    predicate()
}
