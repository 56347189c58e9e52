use std::collections::VecDeque;

/// Sliding window over the most recent samples of a single EEG channel.
///
/// Capacity is fixed at construction (`floor(fs * window_size)` samples) and
/// the oldest sample is evicted first once it is reached. Non-finite inputs
/// are stored as-is; validation belongs to the layer that produced them.
pub struct WindowBuffer {
    samples: VecDeque<f32>,
    capacity: usize,
}

impl WindowBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Capacity for `window_size` seconds of data at `fs` Hz.
    pub fn for_window(fs: f32, window_size: f32) -> Self {
        Self::new((fs * window_size).floor() as usize)
    }

    pub fn push(&mut self, value: f32) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    /// Current contents in time order, as an owned copy.
    pub fn snapshot(&self) -> Vec<f32> {
        self.samples.iter().copied().collect()
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_up_to_capacity_then_evicts_oldest() {
        let mut buffer = WindowBuffer::new(4);
        for v in 0..3 {
            buffer.push(v as f32);
        }
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.snapshot(), vec![0.0, 1.0, 2.0]);

        for v in 3..10 {
            buffer.push(v as f32);
        }
        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.snapshot(), vec![6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn length_is_min_of_pushes_and_capacity() {
        for (pushes, capacity) in [(0usize, 5usize), (3, 5), (5, 5), (17, 5), (1, 1)] {
            let mut buffer = WindowBuffer::new(capacity);
            for v in 0..pushes {
                buffer.push(v as f32);
            }
            assert_eq!(buffer.len(), pushes.min(capacity));
        }
    }

    #[test]
    fn window_capacity_from_rate_and_seconds() {
        let buffer = WindowBuffer::for_window(256.0, 2.0);
        assert_eq!(buffer.capacity(), 512);
        // Degenerate windows still hold at least one sample.
        assert_eq!(WindowBuffer::for_window(256.0, 0.0).capacity(), 1);
    }

    #[test]
    fn accepts_non_finite_values() {
        let mut buffer = WindowBuffer::new(2);
        buffer.push(f32::NAN);
        buffer.push(f32::INFINITY);
        assert_eq!(buffer.len(), 2);
    }
}
