//! Scene runtime: owns the simulation components and advances them in a
//! fixed per-frame order.

pub mod camera;
pub mod character;
pub mod collision;
pub mod constants;
pub mod humanoid_movement;
pub mod input;
pub mod lighting;
pub mod observation;
pub mod streaming;

use nalgebra::Vector3;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{ConfigError, PropConfig, SceneConfig};
use camera::OrbitCamera;
use character::{CharacterSimulator, StepEvent, StepOutcome};
use collision::{Aabb, CollisionWorld, GeometryError, ObstacleKey};
use input::{EventHub, InputCollector};
use lighting::SunFollower;
use observation::{CharacterView, SceneObservation, StepObserver};
use streaming::{StreamDelta, TileGeometry, TileStreamer};

/// Everything that happened in one frame.
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub tick: u64,
    /// Input events applied from the hub
    pub input_events: usize,
    /// Present on frames where the streamer ran
    pub stream: Option<StreamDelta>,
    pub step: StepOutcome,
}

/// One playable scene: input, streamed ground, props, character, camera and
/// sun, advanced together in a fixed order each frame.
pub struct Scene {
    config: SceneConfig,
    input: InputCollector,
    world: CollisionWorld,
    streamer: TileStreamer,
    geometry: Box<dyn TileGeometry>,
    character: CharacterSimulator,
    camera: OrbitCamera,
    sun: SunFollower,
    observers: Vec<Box<dyn StepObserver>>,
    last_events: Vec<StepEvent>,
    tick: u64,
}

impl Scene {
    /// Builds a scene whose input is fed directly through [`Scene::input_mut`].
    pub fn new(config: SceneConfig) -> Result<Self, ConfigError> {
        let input = InputCollector::new(&config.input);
        Self::build(config, input)
    }

    /// Builds a scene whose input collector listens on `hub` until the
    /// scene is torn down or dropped.
    pub fn attached(config: SceneConfig, hub: &Arc<EventHub>) -> Result<Self, ConfigError> {
        let input = InputCollector::attach(hub, &config.input);
        Self::build(config, input)
    }

    fn build(config: SceneConfig, input: InputCollector) -> Result<Self, ConfigError> {
        config.validate()?;

        let character = CharacterSimulator::new(config.character.clone());
        let focus = character.position();
        let mut scene = Self {
            input,
            world: CollisionWorld::new(),
            streamer: TileStreamer::new(config.streaming.clone()),
            geometry: Box::new(()),
            camera: OrbitCamera::new(config.camera.clone(), focus),
            sun: SunFollower::new(config.lighting.clone(), focus),
            character,
            observers: Vec::new(),
            last_events: Vec::new(),
            tick: 0,
            config,
        };

        let props = scene.config.props.clone();
        for prop in &props {
            scene
                .add_prop(prop)
                .map_err(|e| ConfigError::Invalid {
                    field: "props",
                    reason: format!("prop '{}': {}", prop.name, e),
                })?;
        }

        info!(
            target: "scene",
            props = props.len(),
            spawn = ?scene.config.character.spawn,
            attached = scene.input.is_attached(),
            "scene constructed"
        );
        Ok(scene)
    }

    // =========================================================================
    // Collaborators
    // =========================================================================

    /// Routes tile create/destroy calls to a rendering collaborator.
    pub fn set_tile_geometry(&mut self, geometry: Box<dyn TileGeometry>) {
        self.geometry = geometry;
    }

    pub fn add_observer(&mut self, observer: Box<dyn StepObserver>) {
        self.observers.push(observer);
    }

    /// Registers a static box prop under its name, replacing any previous
    /// prop with the same name.
    pub fn add_prop(&mut self, prop: &PropConfig) -> Result<(), GeometryError> {
        let bounds = Aabb::from_base(Vector3::from(prop.position), Vector3::from(prop.size));
        self.world
            .contribute(ObstacleKey::Prop(prop.name.clone()), bounds)?;
        debug!(target: "scene", name = %prop.name, ?bounds, "prop registered");
        Ok(())
    }

    pub fn remove_prop(&mut self, name: &str) -> bool {
        self.world.remove(&ObstacleKey::Prop(name.to_string())).is_some()
    }

    // =========================================================================
    // Frame loop
    // =========================================================================

    /// Advances the scene by `delta` seconds: input, streaming, character,
    /// camera, sun, observers.
    pub fn frame(&mut self, delta: f32) -> FrameReport {
        let input_events = self.input.pump();

        let focus = self.character.position();
        let stream = self
            .streamer
            .tick(&focus, &mut self.world, self.geometry.as_mut());

        // The camera still holds last frame's pose here; it moves after the
        // character so it can follow the resolved position.
        let forward = self.camera.forward();
        let step = self
            .character
            .step(delta, &mut self.input, &forward, &self.world);

        self.camera.update(&self.input, step.position);
        self.sun.update(&step.position);

        for observer in &mut self.observers {
            observer.on_step(self.tick, &step.snapshot, &step.events);
        }

        self.input.end_frame();
        self.last_events = step.events.clone();

        let report = FrameReport {
            tick: self.tick,
            input_events,
            stream,
            step,
        };
        self.tick += 1;
        report
    }

    /// Runs `frames` fixed steps at `fps`, returning the last report.
    pub fn run_for(&mut self, frames: u64, fps: f32) -> Option<FrameReport> {
        let delta = 1.0 / fps;
        let mut last = None;
        for _ in 0..frames {
            last = Some(self.frame(delta));
        }
        last
    }

    pub fn observe(&self) -> SceneObservation {
        SceneObservation {
            tick: self.tick,
            character: CharacterView::from(self.character.state()),
            camera: self.camera.view(),
            sun: self.sun.view(),
            live_tiles: self.streamer.len(),
            obstacles: self.world.len(),
            captured: self.input.is_captured(),
            events: self.last_events.clone(),
        }
    }

    /// Retires every streamed tile and releases the input subscription.
    /// Props stay registered. Returns the number of tiles retired.
    pub fn teardown(&mut self) -> usize {
        let retired = self.streamer.clear(&mut self.world, self.geometry.as_mut());
        self.input.detach();
        info!(target: "scene", retired, tick = self.tick, "scene torn down");
        retired
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn input(&self) -> &InputCollector {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut InputCollector {
        &mut self.input
    }

    pub fn world(&self) -> &CollisionWorld {
        &self.world
    }

    pub fn streamer(&self) -> &TileStreamer {
        &self.streamer
    }

    pub fn character(&self) -> &CharacterSimulator {
        &self.character
    }

    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    pub fn sun(&self) -> &SunFollower {
        &self.sun
    }
}
