//! Directional light that trails the character so its shadow frustum
//! always covers the play area. Reads positions only.

use nalgebra::Vector3;
use serde::Serialize;

use crate::config::LightingConfig;

/// Orthographic shadow volume in light space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ShadowFrustum {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
    pub near: f32,
    pub far: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SunView {
    pub position: [f32; 3],
    pub target: [f32; 3],
}

pub struct SunFollower {
    config: LightingConfig,
    position: Vector3<f32>,
    target: Vector3<f32>,
}

impl SunFollower {
    pub fn new(config: LightingConfig, focus: Vector3<f32>) -> Self {
        let offset = Vector3::from(config.offset);
        Self {
            position: focus + offset,
            target: focus,
            config,
        }
    }

    /// Eases the light and its target towards the focus.
    pub fn update(&mut self, focus: &Vector3<f32>) {
        let t = self.config.follow_smoothing;
        let desired = focus + Vector3::from(self.config.offset);
        self.position = self.position.lerp(&desired, t);
        self.target = self.target.lerp(focus, t);
    }

    pub fn position(&self) -> Vector3<f32> {
        self.position
    }

    pub fn target(&self) -> Vector3<f32> {
        self.target
    }

    /// Unit direction the light shines in.
    pub fn direction(&self) -> Vector3<f32> {
        (self.target - self.position)
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(|| -Vector3::y())
    }

    pub fn shadow_frustum(&self) -> ShadowFrustum {
        let half = self.config.shadow_half_size;
        ShadowFrustum {
            left: -half,
            right: half,
            top: half,
            bottom: -half,
            near: self.config.shadow_near,
            far: self.config.shadow_far,
        }
    }

    pub fn view(&self) -> SunView {
        SunView {
            position: self.position.into(),
            target: self.target.into(),
        }
    }
}
