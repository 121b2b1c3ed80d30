/// Fixed-step accumulator - yields fixed timesteps for the simulation tick
#[derive(Debug, Clone)]
pub struct Accumulator {
    timestep: f32,
    accumulator: f32,
    max_steps: u8,
}

impl Accumulator {
    /// Create accumulator with fixed timestep
    pub fn new(hz: f32, max_steps: u8) -> Self {
        Self {
            timestep: 1.0 / hz,
            accumulator: 0.0,
            max_steps,
        }
    }

    pub fn timestep(&self) -> f32 {
        self.timestep
    }

    /// Update with delta, returns iterator of fixed timesteps to execute
    pub fn tick(&mut self, delta: f32) -> impl Iterator<Item = f32> {
        self.accumulator += delta;

        let steps = ((self.accumulator / self.timestep).floor())
            .min(self.max_steps as f32) as usize;

        self.accumulator -= steps as f32 * self.timestep;
        // Drop time we refused to simulate instead of carrying it forever
        if steps == self.max_steps as usize {
            self.accumulator = self.accumulator.min(self.timestep);
        }

        std::iter::repeat(self.timestep).take(steps)
    }

    /// Fraction of a step left over after the last tick
    pub fn alpha(&self) -> f32 {
        self.accumulator / self.timestep
    }
}

/// Frames-per-second counter averaged over a fixed window
#[derive(Debug, Clone)]
pub struct FpsCounter {
    window: f32,
    elapsed: f32,
    frames: u32,
    fps: f32,
}

impl FpsCounter {
    pub fn new(window: f32) -> Self {
        Self {
            window,
            elapsed: 0.0,
            frames: 0,
            fps: 0.0,
        }
    }

    /// Count one frame; returns the new average when the window closes
    pub fn frame(&mut self, delta: f32) -> Option<f32> {
        self.frames += 1;
        self.elapsed += delta;
        if self.elapsed >= self.window {
            self.fps = self.frames as f32 / self.elapsed;
            self.frames = 0;
            self.elapsed = 0.0;
            Some(self.fps)
        } else {
            None
        }
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulator_yields_whole_steps() {
        let mut acc = Accumulator::new(60.0, 8);
        let steps: Vec<f32> = acc.tick(1.0 / 30.0 + 0.001).collect();
        assert_eq!(steps.len(), 2);
        assert!((steps[0] - 1.0 / 60.0).abs() < 1e-6);
        assert!(acc.alpha() > 0.0 && acc.alpha() < 1.0);
    }

    #[test]
    fn accumulator_carries_remainder() {
        let mut acc = Accumulator::new(60.0, 8);
        assert_eq!(acc.tick(0.01).count(), 0);
        assert_eq!(acc.tick(0.01).count(), 1);
    }

    #[test]
    fn accumulator_caps_steps() {
        let mut acc = Accumulator::new(60.0, 4);
        assert_eq!(acc.tick(1.0).count(), 4);
        // Backlog is discarded, so the next small frame doesn't burst again
        assert!(acc.tick(0.0).count() <= 1);
    }

    #[test]
    fn fps_counter_reports_after_window() {
        let mut fps = FpsCounter::new(1.0);
        let mut frames = 0;
        let value = loop {
            frames += 1;
            if let Some(v) = fps.frame(1.0 / 60.0) {
                break v;
            }
            assert!(frames < 100, "window never closed");
        };
        assert!((59..=61).contains(&frames));
        assert!((value - 60.0).abs() < 1.0);
        assert_eq!(fps.fps(), value);
    }
}
