//! Character controller behaviour against a collision world, driven both by
//! explicit intents and through the input collector.
//!
//! Run with: cargo test --test character_motion_test

use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use trailhead::config::{CharacterConfig, InputConfig, StreamingConfig};
use trailhead::game::character::{CharacterSimulator, StepEvent, StepIntent};
use trailhead::game::collision::{Aabb, CollisionWorld, ObstacleKey};
use trailhead::game::humanoid_movement::MoveKeys;
use trailhead::game::input::{InputCollector, InputEvent};
use trailhead::game::observation::Axis;
use trailhead::game::streaming::TileStreamer;

const DT: f32 = 1.0 / 60.0;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn character(spawn: [f32; 3], allow_double_jump: bool) -> CharacterSimulator {
    CharacterSimulator::new(CharacterConfig {
        spawn,
        allow_double_jump,
        ..CharacterConfig::default()
    })
}

/// Collision world with streamed ground around the origin.
fn ground_world() -> CollisionWorld {
    let mut world = CollisionWorld::new();
    let mut streamer = TileStreamer::new(StreamingConfig::default());
    streamer.update(&Vector3::zeros(), &mut world, &mut ());
    world
}

fn random_keys(rng: &mut StdRng) -> MoveKeys {
    MoveKeys {
        forward: rng.gen_bool(0.4),
        back: rng.gen_bool(0.2),
        left: rng.gen_bool(0.3),
        right: rng.gen_bool(0.3),
    }
}

// ---------------------------------------------------------------------------
// Invariants
// ---------------------------------------------------------------------------

#[test]
fn test_jump_charges_stay_within_bounds() {
    for seed in 0..8u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let double = seed % 2 == 0;
        let max = if double { 2 } else { 1 };
        let mut sim = character([0.0, 0.0, 0.0], double);
        let world = ground_world();

        for step in 0..600 {
            let intent = StepIntent {
                keys: random_keys(&mut rng),
                jump: rng.gen_bool(0.15),
                camera_forward: Vector3::new(rng.gen_range(-1.0..1.0), -0.3, rng.gen_range(-1.0..1.0)),
            };
            let before = sim.state().jumps_remaining;
            let out = sim.step_with(DT, &intent, &world);
            let after = sim.state().jumps_remaining;

            assert!(after <= max, "seed {} step {}: {} charges", seed, step, after);
            if out.events.iter().any(|e| matches!(e, StepEvent::Jumped { .. })) {
                assert!(before > 0, "jumped without a charge at step {}", step);
            }
            assert!(sim.position().y >= 0.0, "fell below the floor at step {}", step);
        }
    }
}

#[test]
fn test_free_fall_settles_exactly_on_floor() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..20 {
        let height = rng.gen_range(0.5..50.0);
        let gravity = rng.gen_range(5.0..100.0);
        let mut sim = CharacterSimulator::new(CharacterConfig {
            gravity,
            spawn: [0.0, height, 0.0],
            ..CharacterConfig::default()
        });
        let world = CollisionWorld::new();

        for _ in 0..600 {
            sim.step_with(DT, &StepIntent::idle(), &world);
        }
        assert_eq!(sim.position(), Vector3::zeros(), "h={} g={}", height, gravity);
        assert_eq!(sim.state().velocity.y, 0.0);
        assert!(sim.state().grounded);

        let settled = sim.position();
        for _ in 0..30 {
            sim.step_with(DT, &StepIntent::idle(), &world);
        }
        assert_eq!(sim.position(), settled, "settled character drifted");
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_lands_on_streamed_ground() {
    let world = ground_world();
    let mut sim = character([2.0, 5.0, 2.0], false);

    let mut landed_at = None;
    for step in 0..120 {
        let out = sim.step_with(DT, &StepIntent::idle(), &world);
        if out.events.iter().any(|e| matches!(e, StepEvent::Landed { .. })) {
            landed_at = Some(step);
            assert!(out.snapshot.contacts_on(Axis::Y).count() > 0);
        }
    }
    assert!(landed_at.is_some());
    assert_eq!(sim.position(), Vector3::new(2.0, 0.0, 2.0));
}

#[test]
fn test_diagonal_into_wall_slides() {
    let mut world = ground_world();
    world
        .contribute(
            ObstacleKey::Prop("wall".into()),
            Aabb::new(Vector3::new(3.0, 0.0, -20.0), Vector3::new(4.0, 3.0, 20.0)),
        )
        .unwrap();
    let mut sim = character([0.0, 0.0, 0.0], false);
    let keys = MoveKeys {
        forward: true,
        right: true,
        ..Default::default()
    };

    let mut x_blocked = false;
    for _ in 0..40 {
        let out = sim.step_with(DT, &StepIntent::with_keys(keys), &world);
        x_blocked |= out.snapshot.contacts_on(Axis::X).count() > 0;
    }

    let p = sim.position();
    assert!(x_blocked);
    assert!(p.x + 0.4 <= 3.0, "clipped into wall at x={}", p.x);
    assert!(p.z < -8.0, "expected continued -Z travel, got z={}", p.z);
    assert_eq!(p.y, 0.0);
    assert_eq!(sim.state().velocity.x, 0.0);
}

#[test]
fn test_single_jump_exhaustion_through_input() {
    let world = ground_world();
    let mut sim = character([0.0, 0.0, 0.0], false);
    let mut input = InputCollector::new(&InputConfig::default());
    let forward = Vector3::new(0.0, 0.0, -1.0);

    input.handle_event(InputEvent::key_down("Space"));
    let out = sim.step(DT, &mut input, &forward, &world);
    assert!(out.events.contains(&StepEvent::Jumped { jumps_remaining: 0 }));

    // Holding the key does not re-trigger.
    for _ in 0..5 {
        let out = sim.step(DT, &mut input, &forward, &world);
        assert!(!out.events.iter().any(|e| matches!(e, StepEvent::Jumped { .. })));
    }

    input.handle_event(InputEvent::key_up("Space"));
    input.handle_event(InputEvent::key_down("Space"));
    let vy_before = sim.state().velocity.y;
    let out = sim.step(DT, &mut input, &forward, &world);
    assert!(out.events.contains(&StepEvent::JumpRefused));
    assert!(sim.state().velocity.y < vy_before);

    let mut landed = false;
    for _ in 0..120 {
        let out = sim.step(DT, &mut input, &forward, &world);
        landed |= out.events.iter().any(|e| matches!(e, StepEvent::Landed { .. }));
        if !landed {
            assert_eq!(sim.state().jumps_remaining, 0, "charge refilled before landing");
        }
    }
    assert!(landed);
    assert_eq!(sim.state().jumps_remaining, 1);
}

#[test]
fn test_double_jump_mid_air() {
    let world = ground_world();
    let mut sim = character([0.0, 0.0, 0.0], true);

    sim.step_with(DT, &StepIntent::jump(), &world);
    for _ in 0..20 {
        sim.step_with(DT, &StepIntent::idle(), &world);
    }
    let height_before = sim.position().y;
    sim.step_with(DT, &StepIntent::jump(), &world);
    assert_eq!(sim.state().jumps_remaining, 0);
    assert!((sim.state().velocity.y - (20.0 - 40.0 * DT)).abs() < 1e-3);

    let mut peak = height_before;
    for _ in 0..60 {
        sim.step_with(DT, &StepIntent::idle(), &world);
        peak = peak.max(sim.position().y);
    }
    assert!(peak > height_before + 3.0, "second jump should add height");
}

#[test]
fn test_walks_off_ledge_and_falls() {
    let mut world = CollisionWorld::new();
    world
        .contribute(
            ObstacleKey::Prop("ledge".into()),
            Aabb::new(Vector3::new(-2.0, 0.0, -2.0), Vector3::new(2.0, 3.0, 2.0)),
        )
        .unwrap();
    let mut sim = character([0.0, 3.0, 0.0], false);
    sim.step_with(DT, &StepIntent::idle(), &world);
    assert!(sim.state().grounded);
    assert_eq!(sim.position().y, 3.0);

    let keys = MoveKeys {
        left: true,
        ..Default::default()
    };
    for _ in 0..60 {
        sim.step_with(DT, &StepIntent::with_keys(keys), &world);
    }
    assert!(sim.position().x < -2.5);
    assert_eq!(sim.position().y, 0.0);
    assert!(sim.state().grounded);
}
