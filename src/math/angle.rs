use std::f32::consts::{PI, TAU};

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Signed difference `to - from` wrapped into [-PI, PI]
pub fn shortest_angle_delta(from: f32, to: f32) -> f32 {
    let mut diff = (to - from) % TAU;
    if diff > PI {
        diff -= TAU;
    } else if diff < -PI {
        diff += TAU;
    }
    diff
}

/// One exponential smoothing step, `factor` of the remaining distance per call
pub fn damp_toward(current: glam::Vec3, target: glam::Vec3, factor: f32) -> glam::Vec3 {
    current.lerp(target, factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lerp_endpoints() {
        assert_eq!(lerp(2.0, 4.0, 0.0), 2.0);
        assert_eq!(lerp(2.0, 4.0, 1.0), 4.0);
        assert_eq!(lerp(2.0, 4.0, 0.5), 3.0);
    }

    #[test]
    fn test_shortest_delta_wraps_past_pi() {
        let d = shortest_angle_delta(3.0, -3.0);
        assert!((d - (TAU - 6.0)).abs() < 1e-5, "got {}", d);

        let d = shortest_angle_delta(-3.0, 3.0);
        assert!((d + (TAU - 6.0)).abs() < 1e-5, "got {}", d);
    }

    #[test]
    fn test_shortest_delta_multiple_turns() {
        let d = shortest_angle_delta(0.0, 4.0 * TAU + 0.25);
        assert!((d - 0.25).abs() < 1e-4);
        assert!(shortest_angle_delta(1.0, 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_damp_toward_moves_fraction() {
        let p = damp_toward(glam::Vec3::ZERO, glam::Vec3::new(10.0, 0.0, 0.0), 0.05);
        assert!((p.x - 0.5).abs() < 1e-6);
    }
}
