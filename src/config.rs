//! Scene configuration parsing from scene.toml files

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::game::constants::{
    camera as camera_consts, character as character_consts, lighting as lighting_consts,
    streaming as streaming_consts,
};
use crate::game::input::normalize_key;

/// Character locomotion section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterConfig {
    pub move_speed: f32,
    pub gravity: f32,
    pub jump_speed: f32,
    pub air_control: f32,
    pub allow_double_jump: bool,
    pub height: f32,
    pub width: f32,
    pub landing_tolerance: f32,
    pub ground_snap_tolerance: f32,
    pub turn_smoothing: f32,
    /// Spawn position of the character's feet
    pub spawn: [f32; 3],
}

impl Default for CharacterConfig {
    fn default() -> Self {
        Self {
            move_speed: character_consts::MOVE_SPEED,
            gravity: character_consts::GRAVITY,
            jump_speed: character_consts::JUMP_SPEED,
            air_control: character_consts::AIR_CONTROL,
            allow_double_jump: false,
            height: character_consts::HEIGHT,
            width: character_consts::WIDTH,
            landing_tolerance: character_consts::LANDING_TOLERANCE,
            ground_snap_tolerance: character_consts::GROUND_SNAP_TOLERANCE,
            turn_smoothing: character_consts::TURN_SMOOTHING,
            spawn: [0.0, 0.0, 0.0],
        }
    }
}

impl CharacterConfig {
    /// Jump charges granted on landing.
    pub fn max_jumps(&self) -> u8 {
        if self.allow_double_jump {
            2
        } else {
            1
        }
    }
}

/// Orbit camera section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub initial_yaw: f32,
    pub initial_pitch: f32,
    pub initial_distance: f32,
    pub min_pitch: f32,
    pub max_pitch: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub sensitivity: f32,
    pub zoom_speed: f32,
    pub follow_smoothing: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            initial_yaw: camera_consts::INITIAL_YAW,
            initial_pitch: camera_consts::INITIAL_PITCH,
            initial_distance: camera_consts::INITIAL_DISTANCE,
            min_pitch: camera_consts::MIN_PITCH,
            max_pitch: camera_consts::MAX_PITCH,
            min_distance: camera_consts::MIN_DISTANCE,
            max_distance: camera_consts::MAX_DISTANCE,
            sensitivity: camera_consts::SENSITIVITY,
            zoom_speed: camera_consts::ZOOM_SPEED,
            follow_smoothing: camera_consts::FOLLOW_SMOOTHING,
        }
    }
}

/// Tile streaming section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    pub tile_size: f32,
    pub radius: i32,
    pub despawn_margin: i32,
    pub tile_thickness: f32,
    pub refresh_interval: u32,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            tile_size: streaming_consts::TILE_SIZE,
            radius: streaming_consts::RADIUS,
            despawn_margin: streaming_consts::DESPAWN_MARGIN,
            tile_thickness: streaming_consts::TILE_THICKNESS,
            refresh_interval: streaming_consts::REFRESH_INTERVAL,
        }
    }
}

impl StreamingConfig {
    /// Planar distance beyond which a tile outside the window is retired.
    pub fn despawn_distance(&self) -> f32 {
        (self.radius + self.despawn_margin) as f32 * self.tile_size
    }
}

/// Key bindings section. Key names are matched case-insensitively.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub move_forward: Vec<String>,
    pub move_back: Vec<String>,
    pub move_left: Vec<String>,
    pub move_right: Vec<String>,
    /// The jump action is bound to exactly one key
    pub jump: String,
    /// Viewport rectangle in client coordinates: [left, top, right, bottom]
    pub viewport: [f32; 4],
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            move_forward: vec!["w".into(), "arrowup".into()],
            move_back: vec!["s".into(), "arrowdown".into()],
            move_left: vec!["a".into(), "arrowleft".into()],
            move_right: vec!["d".into(), "arrowright".into()],
            jump: " ".into(),
            viewport: [0.0, 0.0, 1280.0, 720.0],
        }
    }
}

/// Directional light follow section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    pub offset: [f32; 3],
    pub follow_smoothing: f32,
    pub shadow_half_size: f32,
    pub shadow_near: f32,
    pub shadow_far: f32,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            offset: lighting_consts::OFFSET,
            follow_smoothing: lighting_consts::FOLLOW_SMOOTHING,
            shadow_half_size: lighting_consts::SHADOW_HALF_SIZE,
            shadow_near: lighting_consts::SHADOW_NEAR,
            shadow_far: lighting_consts::SHADOW_FAR,
        }
    }
}

/// A static box prop resting on the ground.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropConfig {
    /// Stable name; re-registering the same name replaces the old box
    pub name: String,
    /// Centre of the prop's base
    pub position: [f32; 3],
    /// Width, height, depth
    pub size: [f32; 3],
}

/// Scene configuration from scene.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub character: CharacterConfig,
    pub camera: CameraConfig,
    pub streaming: StreamingConfig,
    pub input: InputConfig,
    pub lighting: LightingConfig,
    pub props: Vec<PropConfig>,
}

impl SceneConfig {
    /// Load and validate scene configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config: SceneConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate scene configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: SceneConfig = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check every value the simulation relies on. Runs once at construction.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.character;
        positive("character.move_speed", c.move_speed)?;
        positive("character.gravity", c.gravity)?;
        positive("character.jump_speed", c.jump_speed)?;
        non_negative("character.air_control", c.air_control)?;
        positive("character.height", c.height)?;
        positive("character.width", c.width)?;
        non_negative("character.landing_tolerance", c.landing_tolerance)?;
        non_negative("character.ground_snap_tolerance", c.ground_snap_tolerance)?;
        unit_factor("character.turn_smoothing", c.turn_smoothing)?;
        finite_all("character.spawn", &c.spawn)?;

        let cam = &self.camera;
        finite("camera.initial_yaw", cam.initial_yaw)?;
        if !(cam.min_pitch > 0.0 && cam.min_pitch < cam.max_pitch && cam.max_pitch < PI) {
            return Err(invalid(
                "camera.min_pitch",
                format!(
                    "pitch bounds must satisfy 0 < min < max < pi (got {} .. {})",
                    cam.min_pitch, cam.max_pitch
                ),
            ));
        }
        if !(cam.initial_pitch > cam.min_pitch && cam.initial_pitch < cam.max_pitch) {
            return Err(invalid(
                "camera.initial_pitch",
                format!("{} is outside ({}, {})", cam.initial_pitch, cam.min_pitch, cam.max_pitch),
            ));
        }
        positive("camera.min_distance", cam.min_distance)?;
        if !(cam.max_distance >= cam.min_distance) {
            return Err(invalid("camera.max_distance", "must be >= camera.min_distance"));
        }
        if !(cam.initial_distance >= cam.min_distance && cam.initial_distance <= cam.max_distance) {
            return Err(invalid(
                "camera.initial_distance",
                format!("{} is outside [{}, {}]", cam.initial_distance, cam.min_distance, cam.max_distance),
            ));
        }
        positive("camera.sensitivity", cam.sensitivity)?;
        positive("camera.zoom_speed", cam.zoom_speed)?;
        unit_factor("camera.follow_smoothing", cam.follow_smoothing)?;

        let s = &self.streaming;
        positive("streaming.tile_size", s.tile_size)?;
        positive("streaming.tile_thickness", s.tile_thickness)?;
        if s.radius < 0 {
            return Err(invalid("streaming.radius", "must not be negative"));
        }
        if s.radius > streaming_consts::MAX_RADIUS {
            return Err(invalid(
                "streaming.radius",
                format!("must not exceed {}", streaming_consts::MAX_RADIUS),
            ));
        }
        if s.despawn_margin < 0 {
            return Err(invalid("streaming.despawn_margin", "must not be negative"));
        }
        if s.despawn_margin > streaming_consts::MAX_RADIUS {
            return Err(invalid(
                "streaming.despawn_margin",
                format!("must not exceed {}", streaming_consts::MAX_RADIUS),
            ));
        }
        if s.refresh_interval == 0 {
            return Err(invalid("streaming.refresh_interval", "must be at least 1"));
        }

        self.validate_bindings()?;
        let vp = self.input.viewport;
        finite_all("input.viewport", &vp)?;
        if !(vp[2] > vp[0] && vp[3] > vp[1]) {
            return Err(invalid("input.viewport", "right/bottom must exceed left/top"));
        }

        let l = &self.lighting;
        finite_all("lighting.offset", &l.offset)?;
        unit_factor("lighting.follow_smoothing", l.follow_smoothing)?;
        positive("lighting.shadow_half_size", l.shadow_half_size)?;
        positive("lighting.shadow_near", l.shadow_near)?;
        if !(l.shadow_far > l.shadow_near) {
            return Err(invalid("lighting.shadow_far", "must exceed lighting.shadow_near"));
        }

        for prop in &self.props {
            if prop.name.trim().is_empty() {
                return Err(invalid("props.name", "must not be empty"));
            }
            finite_all("props.position", &prop.position)?;
            finite_all("props.size", &prop.size)?;
            if prop.size.iter().any(|&v| v <= 0.0) {
                return Err(invalid(
                    "props.size",
                    format!("prop '{}' has a degenerate size {:?}", prop.name, prop.size),
                ));
            }
        }

        Ok(())
    }

    fn validate_bindings(&self) -> Result<(), ConfigError> {
        let input = &self.input;
        let groups: [(&'static str, &[String]); 4] = [
            ("input.move_forward", &input.move_forward),
            ("input.move_back", &input.move_back),
            ("input.move_left", &input.move_left),
            ("input.move_right", &input.move_right),
        ];

        let mut seen: Vec<String> = Vec::new();
        for (field, keys) in groups {
            if keys.is_empty() {
                return Err(invalid(field, "needs at least one key"));
            }
            for key in keys {
                let key = normalize_key(key);
                if key.is_empty() {
                    return Err(invalid(field, "empty key name"));
                }
                if seen.contains(&key) {
                    return Err(invalid(field, format!("key '{}' is bound twice", key)));
                }
                seen.push(key);
            }
        }
        if input.jump.is_empty() {
            return Err(invalid("input.jump", "empty key name"));
        }
        if seen.contains(&normalize_key(&input.jump)) {
            return Err(invalid("input.jump", format!("key '{}' is bound twice", input.jump)));
        }
        Ok(())
    }
}

/// Errors that can occur when loading scene configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

fn finite(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(invalid(field, format!("{} is not finite", value)))
    }
}

fn finite_all(field: &'static str, values: &[f32]) -> Result<(), ConfigError> {
    values.iter().try_for_each(|&v| finite(field, v))
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    finite(field, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("{} must be positive", value)))
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    finite(field, value)?;
    if value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("{} must not be negative", value)))
    }
}

fn unit_factor(field: &'static str, value: f32) -> Result<(), ConfigError> {
    finite(field, value)?;
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("{} must be in (0, 1]", value)))
    }
}
