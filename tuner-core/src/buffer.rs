//! # Sample Buffer Module
//!
//! Fixed-capacity circular buffer holding the most recent raw 8-bit samples
//! read from the sample source. The analysis window is always a snapshot of
//! this buffer, so its capacity is the FFT window size.

use std::collections::VecDeque;

/// FIFO ring buffer of raw `u8` samples.
///
/// Once full, every pushed sample evicts the oldest one. Insertion order is
/// always preserved.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    samples: VecDeque<u8>,
    capacity: usize,
}

impl SampleBuffer {
    /// Creates an empty buffer holding at most `capacity` samples.
    ///
    /// # Panics
    /// * If `capacity` is zero
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "sample buffer capacity must be non-zero");
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends newly read bytes, evicting the oldest samples beyond capacity.
    ///
    /// A push larger than the capacity keeps exactly the last `capacity`
    /// bytes of `bytes`.
    pub fn push(&mut self, bytes: &[u8]) {
        let incoming = if bytes.len() > self.capacity {
            &bytes[bytes.len() - self.capacity..]
        } else {
            bytes
        };

        let overflow = (self.samples.len() + incoming.len()).saturating_sub(self.capacity);
        self.samples.drain(..overflow);
        self.samples.extend(incoming.iter().copied());
    }

    /// Returns a copy of the current window, exactly `capacity` long.
    ///
    /// While the buffer is still filling, the missing oldest positions are
    /// zero.
    pub fn snapshot(&self) -> Vec<u8> {
        let mut window = vec![0u8; self.capacity - self.samples.len()];
        window.extend(self.samples.iter().copied());
        window
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True once `capacity` samples have been received.
    pub fn is_primed(&self) -> bool {
        self.samples.len() == self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_pads_oldest_end_until_primed() {
        let mut buffer = SampleBuffer::new(5);
        buffer.push(&[7, 8]);
        assert_eq!(buffer.snapshot(), vec![0, 0, 0, 7, 8]);
        assert!(!buffer.is_primed());
    }

    #[test]
    fn push_evicts_oldest_in_order() {
        let mut buffer = SampleBuffer::new(4);
        buffer.push(&[1, 2, 3]);
        buffer.push(&[4, 5]);
        assert_eq!(buffer.snapshot(), vec![2, 3, 4, 5]);
        assert!(buffer.is_primed());
    }

    #[test]
    fn oversized_push_keeps_most_recent_samples() {
        let mut buffer = SampleBuffer::new(3);
        buffer.push(&[9]);
        buffer.push(&[1, 2, 3, 4, 5, 6]);
        assert_eq!(buffer.snapshot(), vec![4, 5, 6]);
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn snapshot_is_idempotent() {
        let mut buffer = SampleBuffer::new(8);
        buffer.push(&[10, 20, 30, 40, 50]);
        let first = buffer.snapshot();
        let second = buffer.snapshot();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_push_leaves_buffer_untouched() {
        let mut buffer = SampleBuffer::new(2);
        buffer.push(&[1, 2]);
        buffer.push(&[]);
        assert_eq!(buffer.snapshot(), vec![1, 2]);
        buffer.clear();
        assert!(buffer.is_empty());
    }
}
