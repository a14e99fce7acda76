//! Orbit follow-camera.

use nalgebra::Vector3;
use serde::Serialize;

use super::constants::EPSILON;
use super::input::InputCollector;
use crate::config::CameraConfig;

/// Camera orbiting a moving target at `distance`, parameterised by yaw and
/// pitch. Pitch is measured from straight up, so `pitch = pi/2` is level.
pub struct OrbitCamera {
    config: CameraConfig,
    yaw: f32,
    pitch: f32,
    distance: f32,
    eye: Vector3<f32>,
    target: Vector3<f32>,
}

/// Read-only view of the camera for telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CameraView {
    pub eye: [f32; 3],
    pub target: [f32; 3],
    pub yaw: f32,
    pub pitch: f32,
    pub distance: f32,
}

impl OrbitCamera {
    /// Camera already resting at its orbit position around `target`.
    pub fn new(config: CameraConfig, target: Vector3<f32>) -> Self {
        let mut camera = Self {
            yaw: config.initial_yaw,
            pitch: config.initial_pitch,
            distance: config.initial_distance,
            config,
            eye: target,
            target,
        };
        camera.pitch = camera.clamp_pitch(camera.pitch);
        camera.distance = camera.clamp_distance(camera.distance);
        camera.eye = camera.desired_eye(&target);
        camera
    }

    /// Pitch bounds pulled in slightly so the clamp keeps pitch strictly
    /// inside the configured open interval.
    fn pitch_limits(&self) -> (f32, f32) {
        let (lo, hi) = (self.config.min_pitch, self.config.max_pitch);
        let inset = EPSILON.min((hi - lo) * 0.25);
        (lo + inset, hi - inset)
    }

    fn clamp_pitch(&self, pitch: f32) -> f32 {
        let (lo, hi) = self.pitch_limits();
        if pitch.is_nan() {
            return (lo + hi) * 0.5;
        }
        pitch.max(lo).min(hi)
    }

    fn clamp_distance(&self, distance: f32) -> f32 {
        if distance.is_nan() {
            return self.config.min_distance;
        }
        distance.max(self.config.min_distance).min(self.config.max_distance)
    }

    /// Applies pointer and wheel deltas to the orbit parameters.
    pub fn orbit(&mut self, dx: f32, dy: f32, wheel: f32) {
        self.rotate(dx, dy);
        self.zoom(wheel);
    }

    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.yaw -= dx * self.config.sensitivity;
        self.pitch = self.clamp_pitch(self.pitch - dy * self.config.sensitivity);
    }

    pub fn zoom(&mut self, wheel: f32) {
        self.distance = self.clamp_distance(self.distance + wheel * self.config.zoom_speed);
    }

    /// Eye position on the orbit sphere around `target`.
    pub fn desired_eye(&self, target: &Vector3<f32>) -> Vector3<f32> {
        let (sin_p, cos_p) = self.pitch.sin_cos();
        let (sin_y, cos_y) = self.yaw.sin_cos();
        target + Vector3::new(sin_p * sin_y, cos_p, sin_p * cos_y) * self.distance
    }

    /// Per-frame update. Pointer rotation is consumed only while the pointer
    /// is captured; wheel zoom and following apply regardless.
    pub fn update(&mut self, input: &InputCollector, target: Vector3<f32>) {
        if input.is_captured() {
            let (dx, dy) = input.pointer_delta();
            self.rotate(dx, dy);
        }
        self.zoom(input.wheel_delta());
        self.follow(target);
    }

    /// Moves the eye a fixed fraction of the way to its orbit position.
    pub fn follow(&mut self, target: Vector3<f32>) {
        let desired = self.desired_eye(&target);
        self.eye = self.eye.lerp(&desired, self.config.follow_smoothing);
        self.target = target;
    }

    /// Unit look direction from the eye to the target. Falls back to the
    /// direction implied by yaw and pitch when the eye sits on the target.
    pub fn forward(&self) -> Vector3<f32> {
        (self.target - self.eye)
            .try_normalize(EPSILON)
            .unwrap_or_else(|| (self.target - self.desired_eye(&self.target)).normalize())
    }

    pub fn eye(&self) -> Vector3<f32> {
        self.eye
    }

    pub fn target(&self) -> Vector3<f32> {
        self.target
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn view(&self) -> CameraView {
        CameraView {
            eye: self.eye.into(),
            target: self.target.into(),
            yaw: self.yaw,
            pitch: self.pitch,
            distance: self.distance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InputConfig;
    use crate::game::input::InputEvent;

    fn camera() -> OrbitCamera {
        OrbitCamera::new(CameraConfig::default(), Vector3::zeros())
    }

    #[test]
    fn test_starts_on_orbit_sphere() {
        let cam = camera();
        assert!((cam.eye().norm() - cam.distance()).abs() < 1e-4);
        let f = cam.forward();
        assert!((f.norm() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_pointer_moves_yaw_and_pitch() {
        let mut cam = camera();
        let (yaw, pitch) = (cam.yaw(), cam.pitch());
        cam.orbit(100.0, 50.0, 0.0);
        assert!((cam.yaw() - (yaw - 0.2)).abs() < 1e-5);
        assert!((cam.pitch() - (pitch - 0.1)).abs() < 1e-5);
    }

    #[test]
    fn test_pitch_stays_strictly_inside_bounds() {
        let mut cam = camera();
        cam.orbit(0.0, 1.0e6, 0.0);
        assert!(cam.pitch() > cam.config().min_pitch);
        cam.orbit(0.0, -1.0e6, 0.0);
        assert!(cam.pitch() < cam.config().max_pitch);
    }

    #[test]
    fn test_zoom_is_clamped() {
        let mut cam = camera();
        cam.orbit(0.0, 0.0, 1.0e6);
        assert_eq!(cam.distance(), cam.config().max_distance);
        cam.orbit(0.0, 0.0, -1.0e6);
        assert_eq!(cam.distance(), cam.config().min_distance);

        cam.orbit(0.0, 0.0, 200.0);
        assert!((cam.distance() - 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_follow_is_exponential() {
        let mut cam = camera();
        let start = cam.eye();
        let target = Vector3::new(10.0, 0.0, 0.0);
        cam.follow(target);
        let desired = cam.desired_eye(&target);
        let expected = start + (desired - start) * 0.1;
        assert!((cam.eye() - expected).norm() < 1e-4);
        assert_eq!(cam.target(), target);

        for _ in 0..200 {
            cam.follow(target);
        }
        assert!((cam.eye() - desired).norm() < 1e-3);
    }

    #[test]
    fn test_uncaptured_input_holds_angles_but_zooms() {
        let mut cam = camera();
        let mut input = InputCollector::new(&InputConfig::default());
        input.handle_event(InputEvent::Wheel { delta: 400.0 });
        input.handle_event(InputEvent::PointerMove { dx: 50.0, dy: 50.0 });
        let before = (cam.yaw(), cam.pitch(), cam.distance());

        cam.update(&input, Vector3::zeros());
        assert_eq!((cam.yaw(), cam.pitch()), (before.0, before.1));
        assert!((cam.distance() - (before.2 + 2.0)).abs() < 1e-5);
        input.end_frame();

        input.handle_event(InputEvent::Click { x: 10.0, y: 10.0 });
        input.handle_event(InputEvent::PointerMove { dx: 50.0, dy: 0.0 });
        cam.update(&input, Vector3::zeros());
        assert!(cam.yaw() < before.0);
    }
}
