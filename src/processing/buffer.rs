//! Bounded FIFO sample buffer
//!
//! Holds the most recent `capacity` samples in arrival order. When full, the
//! oldest sample is evicted before the new one is stored, so positions shift
//! down by one on every eviction. Positions are not stable identities: any
//! per-index state derived from the buffer must be rebuilt after a mutation.

use std::collections::VecDeque;

/// A raw sensor sample as delivered by the transport.
pub type Sample = i32;

/// Sliding window of the last `capacity` samples.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl SampleBuffer {
    /// Create an empty buffer holding at most `capacity` samples.
    ///
    /// A capacity of zero is clamped to one so `append` always retains the
    /// newest sample.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest one when at capacity.
    ///
    /// Returns the evicted sample, if any.
    pub fn append(&mut self, value: Sample) -> Option<Sample> {
        let evicted = if self.samples.len() == self.capacity {
            self.samples.pop_front()
        } else {
            None
        };
        self.samples.push_back(value);
        evicted
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// `true` once the buffer holds exactly `capacity` samples.
    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Sample at current position `index` (0 = oldest retained).
    pub fn get(&self, index: usize) -> Option<Sample> {
        self.samples.get(index).copied()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Iterate `(position, sample)` pairs, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = (usize, Sample)> + '_ {
        self.samples.iter().copied().enumerate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_len_never_exceeds_capacity() {
        let mut buffer = SampleBuffer::new(8);
        for i in 0..100 {
            buffer.append(i);
            assert!(buffer.len() <= 8, "len {} after {} appends", buffer.len(), i + 1);
        }
        assert!(buffer.is_full());
    }

    #[test]
    fn test_keeps_last_values_in_arrival_order() {
        let mut buffer = SampleBuffer::new(4);
        for v in [10, 20, 30, 40, 50, 60] {
            buffer.append(v);
        }
        let retained: Vec<Sample> = buffer.iter().map(|(_, v)| v).collect();
        assert_eq!(retained, vec![30, 40, 50, 60]);
    }

    #[test]
    fn test_eviction_shifts_positions() {
        let mut buffer = SampleBuffer::new(3);
        buffer.append(1);
        buffer.append(2);
        buffer.append(3);
        assert_eq!(buffer.get(0), Some(1));

        let evicted = buffer.append(4);
        assert_eq!(evicted, Some(1));
        assert_eq!(buffer.get(0), Some(2));
        assert_eq!(buffer.get(2), Some(4));
        assert_eq!(buffer.get(3), None);
    }

    #[test]
    fn test_clear_resets() {
        let mut buffer = SampleBuffer::new(2);
        buffer.append(7);
        buffer.append(8);
        buffer.clear();
        assert!(buffer.is_empty());
        assert!(!buffer.is_full());
        assert_eq!(buffer.get(0), None);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut buffer = SampleBuffer::new(0);
        buffer.append(5);
        buffer.append(6);
        assert_eq!(buffer.capacity(), 1);
        assert_eq!(buffer.get(0), Some(6));
    }
}
