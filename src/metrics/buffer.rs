use std::io;

use super::transport::Transport;

/// Payload budget for one datagram; keeps us under a typical 1500-byte MTU
/// path without IP fragmentation.
pub const DATAGRAM_CAPACITY: usize = 1500;

/// What a flush did.
#[derive(Debug)]
pub enum Flush {
    /// Nothing staged, transport untouched.
    Empty,
    /// Whole payload accepted.
    Sent(usize),
    /// Transport took fewer bytes than offered. Not retried.
    Short { sent: usize, offered: usize },
    Failed(io::Error),
}

impl Flush {
    /// True only when a payload went out in full.
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent(_))
    }

    /// True for outcomes that lost data.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Short { .. } | Self::Failed(_))
    }
}

/// Newline-joined staging area for encoded lines.
///
/// Not synchronized; the emitter keeps it behind its mutex together with the
/// transport so that an append and its flushes are one unit.
#[derive(Debug)]
pub struct SampleBuffer {
    bytes: Vec<u8>,
    capacity: usize,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DATAGRAM_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Staged bytes, for log context.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn remaining(&self) -> usize {
        self.capacity - self.bytes.len()
    }

    /// Stage one line, flushing first if it would not fit (one byte is
    /// reserved for the separator).
    ///
    /// Returns the outcome of that capacity flush, `Flush::Empty` if none was
    /// needed. A line larger than the whole capacity is refused with
    /// `Flush::Failed` and nothing is staged.
    pub fn append<T: Transport + ?Sized>(&mut self, line: &[u8], transport: &T) -> Flush {
        if line.len() > self.capacity {
            return Flush::Failed(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "line of {} bytes exceeds datagram capacity of {}",
                    line.len(),
                    self.capacity
                ),
            ));
        }

        let pre = if self.remaining() < line.len() + 1 {
            self.flush(transport)
        } else {
            Flush::Empty
        };

        if !self.bytes.is_empty() {
            self.bytes.push(b'\n');
        }
        self.bytes.extend_from_slice(line);
        pre
    }

    /// Send everything staged as one datagram and reset, whatever happened.
    pub fn flush<T: Transport + ?Sized>(&mut self, transport: &T) -> Flush {
        if self.bytes.is_empty() {
            return Flush::Empty;
        }

        let offered = self.bytes.len();
        let result = transport.send(&self.bytes);
        self.bytes.clear();

        match result {
            Ok(sent) if sent == offered => Flush::Sent(sent),
            Ok(sent) => Flush::Short { sent, offered },
            Err(e) => Flush::Failed(e),
        }
    }
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingTransport;

    #[test]
    fn appends_stay_staged_until_flush() {
        let transport = RecordingTransport::new();
        let mut buf = SampleBuffer::with_capacity(64);

        assert!(matches!(buf.append(b"a:1|c", &transport), Flush::Empty));
        assert!(matches!(buf.append(b"b:2|ms", &transport), Flush::Empty));
        assert!(matches!(buf.append(b"c:3|ms", &transport), Flush::Empty));
        assert!(transport.datagrams().is_empty());

        assert!(buf.flush(&transport).is_sent());
        assert_eq!(transport.datagrams(), vec!["a:1|c\nb:2|ms\nc:3|ms"]);
        assert!(buf.is_empty());
    }

    #[test]
    fn empty_flush_never_touches_transport() {
        let transport = RecordingTransport::new();
        let mut buf = SampleBuffer::new();

        assert!(matches!(buf.flush(&transport), Flush::Empty));
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn overflowing_append_flushes_previous_lines_first() {
        let transport = RecordingTransport::new();
        let mut buf = SampleBuffer::with_capacity(12);

        buf.append(b"aaaaa", &transport);
        // 5 staged, 7 remaining, needs 5 + 1: still fits
        assert!(matches!(buf.append(b"bbbbb", &transport), Flush::Empty));
        assert_eq!(buf.len(), 11);

        // 1 remaining, needs 2: flush then stage
        assert!(buf.append(b"c", &transport).is_sent());
        assert_eq!(transport.datagrams(), vec!["aaaaa\nbbbbb"]);
        assert_eq!(buf.as_bytes(), b"c");
    }

    #[test]
    fn never_offers_more_than_capacity() {
        let transport = RecordingTransport::new();
        let mut buf = SampleBuffer::new();
        let line = [b'x'; 97];

        for _ in 0..200 {
            buf.append(&line, &transport);
        }
        buf.flush(&transport);

        let sizes = transport.sizes();
        assert!(sizes.len() > 1);
        assert!(sizes.iter().all(|&n| n <= DATAGRAM_CAPACITY));
    }

    #[test]
    fn oversized_line_is_refused() {
        let transport = RecordingTransport::new();
        let mut buf = SampleBuffer::with_capacity(8);

        assert!(buf.append(b"123456789", &transport).is_failure());
        assert!(buf.is_empty());
        assert_eq!(transport.calls(), 0);

        // exactly capacity fits on an empty buffer
        assert!(matches!(buf.append(b"12345678", &transport), Flush::Empty));
    }

    #[test]
    fn short_send_is_reported_and_buffer_reset() {
        let transport = RecordingTransport::short_by(2);
        let mut buf = SampleBuffer::new();
        buf.append(b"key:10|ms", &transport);

        match buf.flush(&transport) {
            Flush::Short { sent, offered } => {
                assert_eq!(offered, 9);
                assert_eq!(sent, 7);
            }
            other => panic!("expected short send, got {other:?}"),
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn failed_send_still_resets() {
        let transport = RecordingTransport::failing();
        let mut buf = SampleBuffer::new();
        buf.append(b"key:1|c", &transport);

        assert!(matches!(buf.flush(&transport), Flush::Failed(_)));
        assert!(buf.is_empty());
    }
}
