use nalgebra::Vector3;
use std::f32::consts::{PI, TAU};

use super::constants::EPSILON;

/// Movement keys held this step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveKeys {
    pub forward: bool,
    pub back: bool,
    pub left: bool,
    pub right: bool,
}

impl MoveKeys {
    pub fn any(&self) -> bool {
        self.forward || self.back || self.left || self.right
    }
}

/// Camera forward flattened onto the ground plane. Falls back to -Z when
/// the camera looks straight up or down.
pub fn horizontal_forward(camera_forward: &Vector3<f32>) -> Vector3<f32> {
    let flat = Vector3::new(camera_forward.x, 0.0, camera_forward.z);
    flat.try_normalize(EPSILON)
        .unwrap_or_else(|| Vector3::new(0.0, 0.0, -1.0))
}

/// Unit horizontal direction for the held keys relative to the camera.
/// Zero when nothing is held or opposing keys cancel.
pub fn camera_relative_direction(keys: MoveKeys, camera_forward: &Vector3<f32>) -> Vector3<f32> {
    let forward = horizontal_forward(camera_forward);
    let right = forward.cross(&Vector3::y());

    let mut dir = Vector3::zeros();
    if keys.forward {
        dir += forward;
    }
    if keys.back {
        dir -= forward;
    }
    if keys.right {
        dir += right;
    }
    if keys.left {
        dir -= right;
    }
    dir.try_normalize(EPSILON).unwrap_or_else(Vector3::zeros)
}

/// Nudges airborne horizontal velocity towards `direction * speed`.
/// Without input the current momentum is kept as is.
pub fn steer_air_velocity(
    current: [f32; 2],
    direction: &Vector3<f32>,
    speed: f32,
    air_control: f32,
    dt: f32,
) -> [f32; 2] {
    if direction.norm_squared() <= EPSILON * EPSILON {
        return current;
    }
    let blend = (air_control * dt).clamp(0.0, 1.0);
    let target = [direction.x * speed, direction.z * speed];
    [
        current[0] + (target[0] - current[0]) * blend,
        current[1] + (target[1] - current[1]) * blend,
    ]
}

/// Wraps an angle into `[-pi, pi)`.
pub fn wrap_angle_signed_pi(angle: f32) -> f32 {
    (angle + PI).rem_euclid(TAU) - PI
}

/// Moves `from` a fraction `t` of the way to `to` along the shorter arc.
pub fn lerp_angle(from: f32, to: f32, t: f32) -> f32 {
    let delta = wrap_angle_signed_pi(to - from);
    wrap_angle_signed_pi(from + delta * t)
}

/// Facing angle for a horizontal velocity; 0 faces +Z.
pub fn facing_from_velocity(vx: f32, vz: f32) -> f32 {
    vx.atan2(vz)
}
