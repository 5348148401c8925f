use std::collections::VecDeque;

use crate::config::InterpolationConfig;

/// Time-windowed smoothing of a snapshot stream, used to hide jitter
/// between replication ticks. Values are committed from the buffer at the
/// nominal tick interval while the consumer advances wall-clock time;
/// in between, an externally-supplied interpolation blends the last
/// committed value toward the buffered head.
pub struct InterpolationBuffer<T> {
    entries: VecDeque<T>,
    last: Option<T>,
    timer: f32,
    config: InterpolationConfig,
}

impl<T: Clone> InterpolationBuffer<T> {
    pub fn new(config: InterpolationConfig) -> Self {
        Self {
            entries: VecDeque::new(),
            last: None,
            timer: 0.0,
            config,
        }
    }

    /// Enqueues a snapshot. Overflow past `max_size` drops the oldest
    /// entries down to `min_size` and resets the timer, which bounds how
    /// much latency the buffer can accumulate when the producer runs ahead
    /// of the consumer.
    pub fn add(&mut self, value: T) {
        self.entries.push_back(value);

        if self.entries.len() > self.config.max_size {
            while self.entries.len() > self.config.min_size {
                self.entries.pop_front();
            }
            self.timer = 0.0;
        }
    }

    /// Accumulates `delta_seconds`; every full tick interval commits the
    /// buffer head as the new "last" value, repeating until under one
    /// interval. Returns `lerp(last, head, timer / tick_interval)`, or a
    /// hold at "last" while the buffer sits below its minimum fill, since
    /// interpolating (or extrapolating) on too little data shows as
    /// jitter.
    pub fn advance(&mut self, delta_seconds: f32, lerp: impl Fn(&T, &T, f32) -> T) -> Option<T> {
        if self.last.is_none() {
            if self.entries.len() < self.config.min_size {
                return None;
            }
            // enough has accumulated: the first head becomes the baseline
            let head = self.entries.pop_front().expect("fill checked above");
            self.last = Some(head);
            self.timer = 0.0;
        }

        self.timer += delta_seconds;

        while self.timer >= self.config.tick_interval {
            if self.entries.len() < self.config.min_size {
                break;
            }
            let head = self.entries.pop_front().expect("fill checked above");
            self.last = Some(head);
            self.timer -= self.config.tick_interval;
        }

        let last = self.last.as_ref().expect("baseline committed above");

        if self.entries.len() < self.config.min_size {
            // cap the debt so a refilled buffer doesn't fast-forward
            self.timer = self.timer.min(self.config.tick_interval);
            return Some(last.clone());
        }

        let head = self.entries.front().expect("fill checked above");
        let progress = (self.timer / self.config.tick_interval).clamp(0.0, 1.0);
        Some(lerp(last, head, progress))
    }

    /// Discards all buffered snapshots, the committed value and the timer
    /// at once, for discontinuities like a respawn, where
    /// interpolating across the jump would look wrong.
    pub fn teleport(&mut self, value: T) {
        self.entries.clear();
        self.last = Some(value);
        self.timer = 0.0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::InterpolationBuffer;
    use crate::config::InterpolationConfig;

    fn config() -> InterpolationConfig {
        InterpolationConfig {
            tick_interval: 0.1,
            min_size: 2,
            max_size: 4,
        }
    }

    fn lerp(a: &f32, b: &f32, t: f32) -> f32 {
        a + (b - a) * t
    }

    #[test]
    fn holds_until_minimum_fill() {
        let mut buffer = InterpolationBuffer::new(config());

        buffer.add(1.0f32);
        assert_eq!(buffer.advance(0.05, lerp), None);

        buffer.add(2.0);
        assert_eq!(buffer.advance(0.05, lerp), Some(1.0));
    }

    #[test]
    fn interpolates_between_committed_and_head() {
        let mut buffer = InterpolationBuffer::new(config());
        for value in [0.0f32, 10.0, 20.0, 30.0] {
            buffer.add(value);
        }

        // first head becomes the baseline; 0.15s commits one more tick and
        // lands halfway into the next interval
        let value = buffer.advance(0.15, lerp).unwrap();
        assert!((value - 15.0).abs() < 0.001, "expected 15.0, got {value}");
    }

    #[test]
    fn underfilled_buffer_holds_instead_of_extrapolating() {
        let mut buffer = InterpolationBuffer::new(config());
        buffer.add(0.0f32);
        buffer.add(10.0);

        // baseline committed, one entry left: below min fill
        assert_eq!(buffer.advance(1.0, lerp), Some(0.0));
        assert_eq!(buffer.advance(1.0, lerp), Some(0.0));

        // refill: interpolation resumes without fast-forwarding the debt
        buffer.add(20.0);
        let value = buffer.advance(0.0, lerp).unwrap();
        assert!((10.0..=20.0).contains(&value), "got {value}");
    }

    #[test]
    fn overflow_drops_to_min_and_resets() {
        let mut buffer = InterpolationBuffer::new(config());

        for value in 0..6 {
            buffer.add(value as f32);
        }

        assert_eq!(buffer.len(), config().min_size);
    }

    #[test]
    fn teleport_clears_everything() {
        let mut buffer = InterpolationBuffer::new(config());
        buffer.add(1.0f32);
        buffer.add(2.0);
        buffer.advance(0.25, lerp);

        buffer.teleport(50.0);

        assert!(buffer.is_empty());
        assert_eq!(buffer.advance(0.0, lerp), Some(50.0));
    }
}
