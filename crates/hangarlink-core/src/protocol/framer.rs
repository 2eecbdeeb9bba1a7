//! Line framing
//!
//! Turns the raw byte stream from the serial port into newline-terminated
//! frames. Partial lines are buffered across deliveries; the buffer is
//! bounded, and overflow discards the oldest half so a peer that never sends
//! a newline cannot grow memory without limit. That loss is deliberate and
//! logged.

use super::RX_BUFFER_CAPACITY;

/// Accumulates bytes and extracts newline-delimited frames
pub struct LineFramer {
    buffer: Vec<u8>,
    capacity: usize,
    /// Set while inside an overflow episode so it is logged once, not per byte.
    overflowed: bool,
}

impl LineFramer {
    /// Create a framer with the default RX buffer capacity.
    pub fn new() -> Self {
        Self::with_capacity(RX_BUFFER_CAPACITY)
    }

    /// Create a framer with an explicit RX buffer capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity >= 2, "RX buffer capacity must be at least 2");
        Self {
            buffer: Vec::with_capacity(capacity),
            capacity,
            overflowed: false,
        }
    }

    /// Append a delivery of raw bytes and extract all complete frames.
    ///
    /// Carriage returns are stripped; the returned frames never contain the
    /// delimiter. A trailing partial line stays buffered for the next call.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut frames = Vec::new();

        for &byte in bytes {
            match byte {
                b'\r' => continue,
                b'\n' => {
                    frames.push(String::from_utf8_lossy(&self.buffer).into_owned());
                    self.buffer.clear();
                    self.overflowed = false;
                }
                _ => {
                    if self.buffer.len() >= self.capacity {
                        if !self.overflowed {
                            tracing::warn!(
                                "RX buffer overflow ({} bytes), discarding oldest half",
                                self.buffer.len()
                            );
                            self.overflowed = true;
                        }
                        self.buffer.drain(..self.capacity / 2);
                    }
                    self.buffer.push(byte);
                }
            }
        }

        frames
    }

    /// Number of buffered bytes belonging to an unterminated line.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Drop any buffered partial line.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.overflowed = false;
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_single_frame() {
        let mut framer = LineFramer::new();
        assert_eq!(framer.feed(b"hello\n"), vec!["hello"]);
        assert_eq!(framer.pending(), 0);
    }

    #[test]
    fn test_multiple_frames_in_one_delivery() {
        let mut framer = LineFramer::new();
        assert_eq!(framer.feed(b"one\ntwo\nthree\n"), vec!["one", "two", "three"]);
    }

    #[test]
    fn test_partial_frame_across_deliveries() {
        let mut framer = LineFramer::new();
        assert!(framer.feed(b"hel").is_empty());
        assert_eq!(framer.pending(), 3);
        assert_eq!(framer.feed(b"lo\nwor"), vec!["hello"]);
        assert_eq!(framer.feed(b"ld\n"), vec!["world"]);
    }

    #[test]
    fn test_byte_at_a_time_delivery() {
        let mut framer = LineFramer::new();
        let mut frames = Vec::new();
        for &b in b"a\nbc\n" {
            frames.extend(framer.feed(&[b]));
        }
        assert_eq!(frames, vec!["a", "bc"]);
    }

    #[test]
    fn test_carriage_returns_stripped() {
        let mut framer = LineFramer::new();
        assert_eq!(framer.feed(b"drone_state: REST\r\n"), vec!["drone_state: REST"]);
        // CR split across deliveries
        assert!(framer.feed(b"x\r").is_empty());
        assert_eq!(framer.feed(b"y\n"), vec!["xy"]);
    }

    #[test]
    fn test_empty_line_yields_empty_frame() {
        let mut framer = LineFramer::new();
        assert_eq!(framer.feed(b"\n"), vec![""]);
    }

    #[test]
    fn test_overflow_keeps_most_recent_bytes() {
        let mut framer = LineFramer::with_capacity(8);
        assert!(framer.feed(b"abcdefgh").is_empty());
        assert_eq!(framer.pending(), 8);

        // Ninth byte triggers the drop of the oldest half.
        assert!(framer.feed(b"i").is_empty());
        assert_eq!(framer.pending(), 5);
        assert_eq!(framer.feed(b"\n"), vec!["efghi"]);
    }

    #[test]
    fn test_overflow_never_exceeds_capacity() {
        let mut framer = LineFramer::with_capacity(16);
        for _ in 0..100 {
            framer.feed(b"xxxxxxx");
            assert!(framer.pending() <= 16);
        }
        // Forward progress: a newline still terminates a frame afterwards.
        let frames = framer.feed(b"end\n");
        assert_eq!(frames.len(), 1);
        assert!(frames[0].ends_with("end"));
    }

    #[test]
    fn test_clear_drops_partial() {
        let mut framer = LineFramer::new();
        framer.feed(b"half a li");
        framer.clear();
        assert_eq!(framer.pending(), 0);
        assert_eq!(framer.feed(b"ne\n"), vec!["ne"]);
    }
}
