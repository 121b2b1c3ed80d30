use super::mixer::{ActionId, AnimationMixer};
use crate::math::lerp;

pub const BLEND_RATE: f32 = 0.1;

/// Cross-fades the idle and run actions from the avatar's movement
#[derive(Debug, Clone)]
pub struct BlendController {
    idle: ActionId,
    run: ActionId,
    transition: f32,
    rate: f32,
}

impl BlendController {
    /// Starts both actions, idle fully weighted
    pub fn new(mixer: &mut AnimationMixer, idle: ActionId, run: ActionId, rate: f32) -> Self {
        mixer.play(idle);
        mixer.play(run);
        let controller = Self {
            idle,
            run,
            transition: 0.0,
            rate: rate.clamp(0.0, 1.0),
        };
        controller.apply(mixer);
        controller
    }

    pub fn transition(&self) -> f32 {
        self.transition
    }

    pub fn idle(&self) -> ActionId {
        self.idle
    }

    pub fn run(&self) -> ActionId {
        self.run
    }

    /// One tick: ease toward running when `moving`, toward idle otherwise
    pub fn update(&mut self, mixer: &mut AnimationMixer, moving: bool) {
        let target = if moving { 1.0 } else { 0.0 };
        self.transition = lerp(self.transition, target, self.rate).clamp(0.0, 1.0);
        self.apply(mixer);
    }

    fn apply(&self, mixer: &mut AnimationMixer) {
        mixer.set_weight(self.idle, 1.0 - self.transition);
        mixer.set_weight(self.run, self.transition);
    }
}
