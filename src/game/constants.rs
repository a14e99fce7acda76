//! Default tuning values for the scene simulation.
//! Config files override these; keeping them here keeps the serde defaults
//! and the tests in agreement.

/// Character locomotion constants
pub mod character {
    /// Downward acceleration in units/s²
    pub const GRAVITY: f32 = 40.0;

    /// Ground movement speed in units/second
    pub const MOVE_SPEED: f32 = 20.0;

    /// Vertical launch speed of a jump
    pub const JUMP_SPEED: f32 = 20.0;

    /// How strongly airborne input steers horizontal velocity (per second)
    pub const AIR_CONTROL: f32 = 2.0;

    /// Collision box height
    pub const HEIGHT: f32 = 2.0;

    /// Collision box width (X and Z)
    pub const WIDTH: f32 = 0.8;

    /// How far below an obstacle top the feet may be and still count as a landing
    pub const LANDING_TOLERANCE: f32 = 0.5;

    /// Maximum gap above a support surface that gets snapped away
    pub const GROUND_SNAP_TOLERANCE: f32 = 0.05;

    /// Vertical inset of the horizontal collision band so the floor itself
    /// is not reported as a wall
    pub const STEP_SKIN: f32 = 0.01;

    /// Fraction of the remaining turn applied per step
    pub const TURN_SMOOTHING: f32 = 0.2;

    /// Height of the world floor plane
    pub const FLOOR_Y: f32 = 0.0;
}

/// Orbit camera constants
pub mod camera {
    use std::f32::consts::{FRAC_PI_2, PI};

    pub const INITIAL_YAW: f32 = PI;
    pub const INITIAL_PITCH: f32 = 1.0;
    pub const INITIAL_DISTANCE: f32 = 5.0;

    pub const MIN_PITCH: f32 = 0.1;
    pub const MAX_PITCH: f32 = FRAC_PI_2 - 0.1;

    pub const MIN_DISTANCE: f32 = 2.0;
    pub const MAX_DISTANCE: f32 = 50.0;

    /// Radians per pointer count
    pub const SENSITIVITY: f32 = 0.002;

    /// Distance per wheel count
    pub const ZOOM_SPEED: f32 = 0.005;

    /// Per-frame lerp factor towards the desired eye position
    pub const FOLLOW_SMOOTHING: f32 = 0.1;
}

/// Tile streaming constants
pub mod streaming {
    /// Edge length of one square tile
    pub const TILE_SIZE: f32 = 5.0;

    /// Chebyshev radius (in tiles) kept alive around the focus
    pub const RADIUS: i32 = 5;

    /// Largest accepted radius or despawn margin
    pub const MAX_RADIUS: i32 = 256;

    /// Extra tiles of distance before a tile is retired
    pub const DESPAWN_MARGIN: i32 = 2;

    /// Vertical thickness of a tile's ground box
    pub const TILE_THICKNESS: f32 = 0.1;

    /// Frames between streaming passes
    pub const REFRESH_INTERVAL: u32 = 1;
}

/// Directional light follow constants
pub mod lighting {
    pub const OFFSET: [f32; 3] = [0.0, 5.0, 5.0];
    pub const FOLLOW_SMOOTHING: f32 = 0.1;
    pub const SHADOW_HALF_SIZE: f32 = 20.0;
    pub const SHADOW_NEAR: f32 = 1.0;
    pub const SHADOW_FAR: f32 = 50.0;
}

/// Small epsilon for float comparisons
pub const EPSILON: f32 = 1.0e-4;
