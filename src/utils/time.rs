use std::time::{Duration, Instant};

/// Timer for tracking frame timing and elapsed time.
pub struct Timer {
    start_time: Instant,
    last_update: Instant,
    /// Time since last tick
    pub delta: Duration,
    /// Total elapsed time since creation
    pub elapsed: Duration,
    /// Total number of ticks
    pub frame_count: u64,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    /// Creates a new timer starting from now.
    #[must_use]
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start_time: now,
            last_update: now,
            delta: Duration::ZERO,
            elapsed: Duration::ZERO,
            frame_count: 0,
        }
    }

    /// Updates the timer, once per frame.
    pub fn tick(&mut self) {
        let now = Instant::now();
        self.delta = now - self.last_update;
        self.elapsed = now - self.start_time;
        self.last_update = now;
        self.frame_count += 1;
    }

    #[must_use]
    pub fn dt_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    /// Seconds since the timer was created, as of the last tick.
    #[must_use]
    pub fn elapsed_seconds(&self) -> f32 {
        self.elapsed.as_secs_f32()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_timer_has_no_elapsed_time() {
        let timer = Timer::new();
        assert_eq!(timer.frame_count, 0);
        assert_eq!(timer.elapsed, Duration::ZERO);
        assert_eq!(timer.dt_seconds(), 0.0);
    }

    #[test]
    fn test_tick_advances_monotonically() {
        let mut timer = Timer::new();
        timer.tick();
        let first = timer.elapsed;
        timer.tick();
        assert!(timer.elapsed >= first);
        assert_eq!(timer.frame_count, 2);
        assert!(timer.elapsed_seconds() >= 0.0);
    }
}
