//! Kinematic character controller.
//!
//! One `step` turns held movement keys and a latched jump into velocity,
//! applies gravity, then resolves collisions axis by axis (Y, X, Z) against
//! the boxes in the [`CollisionWorld`]. Vertical resolution runs first so the
//! horizontal passes test against the band the character actually occupies.
//!
//! There is no continuous sweep beyond one box test per axis per step: a
//! wall thinner than one step of horizontal travel can be skipped. A
//! character spawned inside an obstacle is not extracted; obstacles the body
//! strictly overlaps at the start of a pass are ignored by that pass so it
//! can walk back out. Obstacles that merely touch the body still block.

use nalgebra::Vector3;
use serde::Serialize;
use tracing::debug;

use super::collision::{Aabb, CollisionWorld};
use super::constants::{character as consts, EPSILON};
use super::humanoid_movement::{
    camera_relative_direction, facing_from_velocity, lerp_angle, steer_air_velocity, MoveKeys,
};
use super::input::{Action, InputCollector};
use super::observation::{Axis, Contact, StepSnapshot};
use crate::config::CharacterConfig;

/// Pose and motion of the character. Mutated only by [`CharacterSimulator`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CharacterState {
    /// Feet position
    pub position: Vector3<f32>,
    pub velocity: Vector3<f32>,
    /// Heading in radians, 0 faces +Z, wrapped into [-pi, pi)
    pub facing: f32,
    pub grounded: bool,
    pub jumps_remaining: u8,
    /// Whether movement input was held on the last step
    pub moving: bool,
}

/// What the character wants to do this step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepIntent {
    pub keys: MoveKeys,
    pub jump: bool,
    /// Camera look direction used as the movement basis
    pub camera_forward: Vector3<f32>,
}

impl StepIntent {
    pub fn idle() -> Self {
        Self {
            keys: MoveKeys::default(),
            jump: false,
            camera_forward: Vector3::new(0.0, 0.0, -1.0),
        }
    }

    pub fn with_keys(keys: MoveKeys) -> Self {
        Self {
            keys,
            ..Self::idle()
        }
    }

    pub fn jump() -> Self {
        Self {
            jump: true,
            ..Self::idle()
        }
    }
}

/// Discrete things that happened during a step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StepEvent {
    Jumped { jumps_remaining: u8 },
    /// A jump request arrived with no charge left and was dropped
    JumpRefused,
    Landed { height: f32 },
    MovingChanged { moving: bool },
}

/// Result of one simulation step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub position: Vector3<f32>,
    pub events: Vec<StepEvent>,
    pub snapshot: StepSnapshot,
}

pub struct CharacterSimulator {
    config: CharacterConfig,
    state: CharacterState,
}

impl CharacterSimulator {
    /// Spawns at `config.spawn`. A character spawned on the floor starts
    /// grounded with full jump charges; one spawned in the air has none
    /// until it lands.
    pub fn new(config: CharacterConfig) -> Self {
        let spawn = Vector3::new(config.spawn[0], config.spawn[1], config.spawn[2]);
        let mut sim = Self {
            config,
            state: CharacterState {
                position: spawn,
                velocity: Vector3::zeros(),
                facing: 0.0,
                grounded: false,
                jumps_remaining: 0,
                moving: false,
            },
        };
        sim.reset_to(spawn);
        sim
    }

    pub fn config(&self) -> &CharacterConfig {
        &self.config
    }

    pub fn state(&self) -> &CharacterState {
        &self.state
    }

    pub fn position(&self) -> Vector3<f32> {
        self.state.position
    }

    /// Places the character at `position` at rest, discarding momentum.
    pub fn reset_to(&mut self, position: Vector3<f32>) {
        let on_floor = position.y <= consts::FLOOR_Y + EPSILON;
        self.state.position = position;
        self.state.velocity = Vector3::zeros();
        self.state.grounded = on_floor;
        self.state.jumps_remaining = if on_floor { self.config.max_jumps() } else { 0 };
        self.state.moving = false;
    }

    /// Reads the input collector and advances one step.
    pub fn step(
        &mut self,
        dt: f32,
        input: &mut InputCollector,
        camera_forward: &Vector3<f32>,
        world: &CollisionWorld,
    ) -> StepOutcome {
        let intent = StepIntent {
            keys: MoveKeys {
                forward: input.is_action_active(Action::MoveForward),
                back: input.is_action_active(Action::MoveBack),
                left: input.is_action_active(Action::MoveLeft),
                right: input.is_action_active(Action::MoveRight),
            },
            jump: input.take_jump_request(),
            camera_forward: *camera_forward,
        };
        self.step_with(dt, &intent, world)
    }

    /// Advances one step from an explicit intent.
    pub fn step_with(&mut self, dt: f32, intent: &StepIntent, world: &CollisionWorld) -> StepOutcome {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let Self { config, state } = self;
        let mut events = Vec::new();
        let mut contacts = Vec::new();
        let was_grounded = state.grounded;

        let direction = camera_relative_direction(intent.keys, &intent.camera_forward);

        if state.grounded {
            state.velocity.x = direction.x * config.move_speed;
            state.velocity.z = direction.z * config.move_speed;
        } else {
            let [vx, vz] = steer_air_velocity(
                [state.velocity.x, state.velocity.z],
                &direction,
                config.move_speed,
                config.air_control,
                dt,
            );
            state.velocity.x = vx;
            state.velocity.z = vz;
        }

        if intent.jump {
            if state.jumps_remaining > 0 {
                state.velocity.y = config.jump_speed;
                state.jumps_remaining -= 1;
                state.grounded = false;
                debug!(target: "character", jumps_remaining = state.jumps_remaining, "jump");
                events.push(StepEvent::Jumped {
                    jumps_remaining: state.jumps_remaining,
                });
            } else {
                events.push(StepEvent::JumpRefused);
            }
        }

        state.velocity.y -= config.gravity * dt;

        state.grounded = false;
        if resolve_vertical(config, state, world, dt, &mut contacts) {
            land(config, state);
        }
        resolve_horizontal(config, state, world, dt, Axis::X, &mut contacts);
        resolve_horizontal(config, state, world, dt, Axis::Z, &mut contacts);
        if snap_to_ground(config, state, world) {
            land(config, state);
        }

        if state.position.y < consts::FLOOR_Y {
            state.position.y = consts::FLOOR_Y;
            land(config, state);
        }

        if state.grounded && !was_grounded {
            debug!(target: "character", height = state.position.y, "landed");
            events.push(StepEvent::Landed {
                height: state.position.y,
            });
        }

        let horizontal_speed_sq =
            state.velocity.x * state.velocity.x + state.velocity.z * state.velocity.z;
        if horizontal_speed_sq > EPSILON * EPSILON {
            let target = facing_from_velocity(state.velocity.x, state.velocity.z);
            state.facing = lerp_angle(state.facing, target, config.turn_smoothing);
        }

        let moving = direction != Vector3::zeros();
        if moving != state.moving {
            state.moving = moving;
            debug!(target: "character", moving, "movement state changed");
            events.push(StepEvent::MovingChanged { moving });
        }

        StepOutcome {
            position: state.position,
            events,
            snapshot: StepSnapshot::capture(state, contacts),
        }
    }
}

fn land(config: &CharacterConfig, state: &mut CharacterState) {
    state.velocity.y = 0.0;
    state.grounded = true;
    state.jumps_remaining = config.max_jumps();
}

/// Character body box at the current planar position spanning `[y_min, y_max]`,
/// with the footprint pulled in by `inset` on every side.
fn body_box(
    config: &CharacterConfig,
    position: &Vector3<f32>,
    inset: f32,
    y_min: f32,
    y_max: f32,
) -> Aabb {
    let half = config.width * 0.5 - inset;
    Aabb::new(
        Vector3::new(position.x - half, y_min, position.z - half),
        Vector3::new(position.x + half, y_max, position.z + half),
    )
}

/// Vertical pass. Returns true when the character landed on an obstacle top.
///
/// The footprint is inset by the skin so a wall flush against the body's
/// side does not stop a fall. Touching faces above the head while rising,
/// or below the feet while falling, block; faces on the far side of the
/// motion and boxes the body is already embedded in do not.
fn resolve_vertical(
    config: &CharacterConfig,
    state: &mut CharacterState,
    world: &CollisionWorld,
    dt: f32,
    contacts: &mut Vec<Contact>,
) -> bool {
    let y0 = state.position.y;
    let head = y0 + config.height;
    let candidate = y0 + state.velocity.y * dt;
    let start = body_box(config, &state.position, consts::STEP_SKIN, y0, head);
    let swept = body_box(
        config,
        &state.position,
        consts::STEP_SKIN,
        y0.min(candidate),
        y0.max(candidate) + config.height,
    );
    let falling = state.velocity.y <= 0.0;

    let mut landing_top: Option<f32> = None;
    let mut blocked = false;
    for bounds in world.all_boxes() {
        if !swept.intersects(bounds) {
            continue;
        }
        let top = bounds.max.y;
        if falling && y0 >= top - config.landing_tolerance {
            landing_top = Some(landing_top.map_or(top, |t| t.max(top)));
            contacts.push(Contact::new(Axis::Y, *bounds));
            continue;
        }
        let behind = if falling {
            bounds.min.y >= head
        } else {
            top <= y0
        };
        if behind || start.overlaps_strictly(bounds) {
            continue;
        }
        blocked = true;
        contacts.push(Contact::new(Axis::Y, *bounds));
    }

    if let Some(top) = landing_top {
        state.position.y = top;
        true
    } else {
        if blocked {
            state.velocity.y = 0.0;
        } else {
            state.position.y = candidate;
        }
        false
    }
}

/// Horizontal pass along X or Z with the vertical band fixed at the
/// resolved height. Blocking zeroes that axis only, so diagonal movement
/// into a wall slides along it.
///
/// The band and the perpendicular extent are inset by the skin, so the floor,
/// a flush ceiling and a wall running alongside never block. Along the
/// motion axis the full width is tested, so a wall touching the leading
/// face blocks while one touching the trailing face does not.
fn resolve_horizontal(
    config: &CharacterConfig,
    state: &mut CharacterState,
    world: &CollisionWorld,
    dt: f32,
    axis: Axis,
    contacts: &mut Vec<Contact>,
) {
    let i = axis.index();
    let v = state.velocity[i];
    if v == 0.0 {
        return;
    }
    let from = state.position[i];
    let to = from + v * dt;
    let half = config.width * 0.5;

    let y = state.position.y;
    let mut start = body_box(
        config,
        &state.position,
        consts::STEP_SKIN,
        y + consts::STEP_SKIN,
        y + config.height - consts::STEP_SKIN,
    );
    start.min[i] = from - half;
    start.max[i] = from + half;
    let mut swept = start;
    swept.min[i] = from.min(to) - half;
    swept.max[i] = from.max(to) + half;

    let blocker = world.all_boxes().find(|b| {
        let behind = if v > 0.0 {
            b.max[i] <= start.min[i]
        } else {
            b.min[i] >= start.max[i]
        };
        swept.intersects(b) && !behind && !start.overlaps_strictly(b)
    });
    match blocker {
        Some(bounds) => {
            state.velocity[i] = 0.0;
            contacts.push(Contact::new(axis, *bounds));
        }
        None => state.position[i] = to,
    }
}

/// Highest obstacle top under any of the footprint samples that is not
/// above `max_height`.
pub fn sample_ground_support(
    world: &CollisionWorld,
    samples: &[(f32, f32)],
    max_height: f32,
) -> Option<f32> {
    world
        .all_boxes()
        .filter(|b| b.max.y <= max_height)
        .filter(|b| samples.iter().any(|&(x, z)| b.footprint_contains(x, z)))
        .map(|b| b.max.y)
        .reduce(f32::max)
}

/// Pulls the character down onto a support surface a hair below its feet,
/// which keeps it from catching on seams between adjacent tiles.
fn snap_to_ground(config: &CharacterConfig, state: &mut CharacterState, world: &CollisionWorld) -> bool {
    if state.velocity.y > 0.0 {
        return false;
    }
    let p = state.position;
    let h = config.width * 0.5;
    let samples = [
        (p.x, p.z),
        (p.x - h, p.z - h),
        (p.x + h, p.z - h),
        (p.x - h, p.z + h),
        (p.x + h, p.z + h),
    ];
    match sample_ground_support(world, &samples, p.y + EPSILON) {
        Some(top) if p.y - top <= config.ground_snap_tolerance => {
            state.position.y = top;
            true
        }
        _ => false,
    }
}
