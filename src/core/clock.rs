use std::time::Instant;

/// Longest delta handed to the simulation; a stalled frame (window drag,
/// debugger pause) must not turn into a huge catch-up burst
pub const MAX_FRAME_DELTA: f32 = 0.25;

/// Frame clock - tracks delta and total elapsed time
#[derive(Debug)]
pub struct Clock {
    start: Instant,
    last_tick: Instant,
}

impl Clock {
    /// Create new clock starting now
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
        }
    }

    /// Get delta time since last tick and advance clock
    /// Returns delta in seconds, clamped to MAX_FRAME_DELTA
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let delta = now.duration_since(self.last_tick).as_secs_f32();
        self.last_tick = now;
        delta.min(MAX_FRAME_DELTA)
    }

    /// Seconds since the clock was created
    pub fn elapsed(&self) -> f32 {
        self.start.elapsed().as_secs_f32()
    }

    /// Reset the tick reference to now (after a long blocking load)
    pub fn reset(&mut self) {
        self.last_tick = Instant::now();
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn clock_measures_delta() {
        let mut clock = Clock::new();

        thread::sleep(Duration::from_millis(10));
        let delta = clock.tick();

        assert!(delta >= 0.009 && delta <= MAX_FRAME_DELTA);
    }

    #[test]
    fn clock_resets() {
        let mut clock = Clock::new();

        thread::sleep(Duration::from_millis(10));
        clock.reset();

        let delta = clock.tick();
        assert!(delta < 0.005);
        assert!(clock.elapsed() >= 0.009);
    }

    #[test]
    fn clock_clamps_long_frames() {
        let mut clock = Clock::new();
        clock.last_tick -= Duration::from_secs(3);
        assert_eq!(clock.tick(), MAX_FRAME_DELTA);
    }
}
