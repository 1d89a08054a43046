//! Bounded in-memory ring buffer backing a step's "live phase" log view
//! (section 4.7): appends silently drop the oldest bytes once `capacity` is
//! exceeded, and `snapshot` returns everything currently buffered in order.

use std::collections::VecDeque;

use parking_lot::Mutex;

pub struct RingBuffer {
    capacity: usize,
    buf: Mutex<VecDeque<u8>>,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        RingBuffer {
            capacity,
            buf: Mutex::new(VecDeque::with_capacity(capacity.min(64 * 1024))),
        }
    }

    pub fn push(&self, data: &[u8]) {
        let mut buf = self.buf.lock();
        buf.extend(data.iter().copied());
        let excess = buf.len().saturating_sub(self.capacity);
        if excess > 0 {
            buf.drain(..excess);
        }
    }

    pub fn snapshot(&self) -> Vec<u8> {
        self.buf.lock().iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.buf.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_everything_under_capacity() {
        let ring = RingBuffer::new(16);
        ring.push(b"hello ");
        ring.push(b"world");
        assert_eq!(ring.snapshot(), b"hello world");
    }

    #[test]
    fn drops_oldest_bytes_once_full() {
        let ring = RingBuffer::new(5);
        ring.push(b"abc");
        ring.push(b"defgh");
        assert_eq!(ring.snapshot(), b"defgh");
        assert_eq!(ring.len(), 5);
    }

    #[test]
    fn empty_buffer_reports_empty() {
        let ring = RingBuffer::new(8);
        assert!(ring.is_empty());
    }
}
