//! Ground tile streaming around a moving focus point.
//!
//! Tiles inside the Chebyshev window of the focus cell are always alive.
//! Tiles that fall out of the window linger until their centre is farther
//! than `(radius + despawn_margin) * tile_size` from the focus, which keeps
//! a moving focus from churning the window edge every frame.

use nalgebra::Vector3;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::collision::{Aabb, CollisionWorld, ObstacleKey};
use crate::config::StreamingConfig;

/// Grid cell identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TileKey {
    pub x: i32,
    pub z: i32,
}

impl TileKey {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Cell containing the planar position of `point`.
    pub fn containing(point: &Vector3<f32>, tile_size: f32) -> Self {
        Self {
            x: (point.x / tile_size).floor() as i32,
            z: (point.z / tile_size).floor() as i32,
        }
    }

    /// Chebyshev distance in cells.
    pub fn chebyshev(&self, other: &TileKey) -> i32 {
        (self.x - other.x).abs().max((self.z - other.z).abs())
    }
}

/// Receives tile geometry lifecycle calls. Rendering collaborators hook in
/// here; the streamer itself only owns the collision side.
pub trait TileGeometry {
    fn create(&mut self, key: TileKey, origin: Vector3<f32>);
    fn destroy(&mut self, key: TileKey);
}

impl TileGeometry for () {
    fn create(&mut self, _key: TileKey, _origin: Vector3<f32>) {}
    fn destroy(&mut self, _key: TileKey) {}
}

#[derive(Debug, Clone, Copy)]
struct LiveTile {
    origin: Vector3<f32>,
}

/// Tiles created and retired by one streaming pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamDelta {
    pub spawned: Vec<TileKey>,
    pub retired: Vec<TileKey>,
}

impl StreamDelta {
    pub fn is_empty(&self) -> bool {
        self.spawned.is_empty() && self.retired.is_empty()
    }
}

/// Keeps a square neighbourhood of ground tiles alive around a focus point
/// and mirrors every live tile into the collision world.
pub struct TileStreamer {
    config: StreamingConfig,
    tiles: BTreeMap<TileKey, LiveTile>,
    frames_until_refresh: u32,
}

impl TileStreamer {
    pub fn new(config: StreamingConfig) -> Self {
        Self {
            config,
            tiles: BTreeMap::new(),
            frames_until_refresh: 0,
        }
    }

    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    /// Runs a streaming pass on the configured cadence. The first call
    /// always runs.
    pub fn tick(
        &mut self,
        focus: &Vector3<f32>,
        world: &mut CollisionWorld,
        geometry: &mut dyn TileGeometry,
    ) -> Option<StreamDelta> {
        if self.frames_until_refresh > 0 {
            self.frames_until_refresh -= 1;
            return None;
        }
        self.frames_until_refresh = self.config.refresh_interval.saturating_sub(1);
        Some(self.update(focus, world, geometry))
    }

    /// Spawns the window around `focus` and retires far tiles.
    pub fn update(
        &mut self,
        focus: &Vector3<f32>,
        world: &mut CollisionWorld,
        geometry: &mut dyn TileGeometry,
    ) -> StreamDelta {
        let mut delta = StreamDelta::default();
        let base = TileKey::containing(focus, self.config.tile_size);

        for key in self.window_around(base) {
            if self.tiles.contains_key(&key) {
                continue;
            }
            let origin = self.tile_origin(key);
            let bounds = self.tile_bounds(key);
            if let Err(e) = world.contribute(ObstacleKey::Tile(key), bounds) {
                warn!(target: "streaming", ?key, error = %e, "skipping tile with invalid bounds");
                continue;
            }
            geometry.create(key, origin);
            self.tiles.insert(key, LiveTile { origin });
            delta.spawned.push(key);
        }

        let despawn_distance = self.config.despawn_distance();
        let radius = self.config.radius;
        let far: Vec<TileKey> = self
            .tiles
            .iter()
            .filter(|(key, tile)| {
                let dx = tile.origin.x - focus.x;
                let dz = tile.origin.z - focus.z;
                key.chebyshev(&base) > radius && (dx * dx + dz * dz).sqrt() > despawn_distance
            })
            .map(|(key, _)| *key)
            .collect();

        for key in far {
            self.retire(key, world, geometry);
            delta.retired.push(key);
        }

        if !delta.is_empty() {
            debug!(
                target: "streaming",
                spawned = delta.spawned.len(),
                retired = delta.retired.len(),
                live = self.tiles.len(),
                "stream pass"
            );
        }
        delta
    }

    /// Retires every live tile. Used on scene teardown.
    pub fn clear(&mut self, world: &mut CollisionWorld, geometry: &mut dyn TileGeometry) -> usize {
        let keys: Vec<TileKey> = self.tiles.keys().copied().collect();
        for &key in &keys {
            self.retire(key, world, geometry);
        }
        keys.len()
    }

    fn retire(&mut self, key: TileKey, world: &mut CollisionWorld, geometry: &mut dyn TileGeometry) {
        if self.tiles.remove(&key).is_some() {
            geometry.destroy(key);
            world.remove(&ObstacleKey::Tile(key));
        }
    }

    /// Cells within the Chebyshev radius of `base`, row by row.
    pub fn window_around(&self, base: TileKey) -> Vec<TileKey> {
        let r = self.config.radius.max(0);
        let side = 2 * r as usize + 1;
        let mut cells = Vec::with_capacity(side * side);
        for dx in -r..=r {
            for dz in -r..=r {
                cells.push(TileKey::new(base.x + dx, base.z + dz));
            }
        }
        cells
    }

    /// World position of a tile's centre on the floor plane.
    pub fn tile_origin(&self, key: TileKey) -> Vector3<f32> {
        let s = self.config.tile_size;
        Vector3::new(key.x as f32 * s, 0.0, key.z as f32 * s)
    }

    /// Thin ground box spanning the tile footprint with its top at y = 0.
    pub fn tile_bounds(&self, key: TileKey) -> Aabb {
        let origin = self.tile_origin(key);
        let half = self.config.tile_size * 0.5;
        Aabb::new(
            Vector3::new(origin.x - half, -self.config.tile_thickness, origin.z - half),
            Vector3::new(origin.x + half, 0.0, origin.z + half),
        )
    }

    pub fn contains(&self, key: &TileKey) -> bool {
        self.tiles.contains_key(key)
    }

    /// Live keys in grid order.
    pub fn live_keys(&self) -> impl Iterator<Item = TileKey> + '_ {
        self.tiles.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn streamer(tile_size: f32, radius: i32) -> TileStreamer {
        TileStreamer::new(StreamingConfig {
            tile_size,
            radius,
            ..StreamingConfig::default()
        })
    }

    #[derive(Default)]
    struct CountingGeometry {
        alive: HashSet<TileKey>,
        created: usize,
        destroyed: usize,
    }

    impl TileGeometry for CountingGeometry {
        fn create(&mut self, key: TileKey, _origin: Vector3<f32>) {
            assert!(self.alive.insert(key), "tile {:?} created twice", key);
            self.created += 1;
        }

        fn destroy(&mut self, key: TileKey) {
            assert!(self.alive.remove(&key), "tile {:?} destroyed while not alive", key);
            self.destroyed += 1;
        }
    }

    #[test]
    fn test_containing_floors_negative_coordinates() {
        assert_eq!(TileKey::containing(&Vector3::new(-0.1, 0.0, 4.9), 5.0), TileKey::new(-1, 0));
        assert_eq!(TileKey::containing(&Vector3::new(5.0, 0.0, -5.0), 5.0), TileKey::new(1, -1));
    }

    #[test]
    fn test_initial_window_is_square() {
        let mut s = streamer(5.0, 2);
        let mut world = CollisionWorld::new();
        let delta = s.update(&Vector3::zeros(), &mut world, &mut ());

        assert_eq!(delta.spawned.len(), 25);
        assert!(delta.retired.is_empty());
        assert_eq!(s.len(), 25);
        assert_eq!(world.tile_count(), 25);
        for key in s.live_keys() {
            assert!(key.chebyshev(&TileKey::new(0, 0)) <= 2);
        }
    }

    #[test]
    fn test_update_is_idempotent_for_same_focus() {
        let mut s = streamer(5.0, 2);
        let mut world = CollisionWorld::new();
        s.update(&Vector3::zeros(), &mut world, &mut ());
        let delta = s.update(&Vector3::zeros(), &mut world, &mut ());

        assert!(delta.is_empty());
        assert_eq!(world.len(), 25);
    }

    #[test]
    fn test_tile_bounds_top_at_floor() {
        let s = streamer(5.0, 1);
        let b = s.tile_bounds(TileKey::new(2, -1));
        assert_eq!(b.max.y, 0.0);
        assert!(b.min.y < 0.0);
        assert_eq!(b.min.x, 7.5);
        assert_eq!(b.max.x, 12.5);
        assert_eq!(b.min.z, -7.5);
        assert!(b.validate().is_ok());
    }

    #[test]
    fn test_small_step_keeps_trailing_column() {
        let mut s = streamer(5.0, 2);
        let mut world = CollisionWorld::new();
        s.update(&Vector3::zeros(), &mut world, &mut ());

        // One cell to the east: a new column spawns, the old west column is
        // still within the despawn distance.
        let delta = s.update(&Vector3::new(5.0, 0.0, 0.0), &mut world, &mut ());
        assert_eq!(delta.spawned.len(), 5);
        assert!(delta.retired.is_empty());
        assert!(s.contains(&TileKey::new(-2, 0)));
        assert_eq!(world.tile_count(), s.len());
    }

    #[test]
    fn test_geometry_calls_pair_with_collision_entries() {
        let mut s = streamer(5.0, 2);
        let mut world = CollisionWorld::new();
        let mut geometry = CountingGeometry::default();

        for step in 0..40 {
            let focus = Vector3::new(step as f32 * 3.0, 0.0, (step as f32 * 0.7).sin() * 20.0);
            s.update(&focus, &mut world, &mut geometry);
            assert_eq!(geometry.alive.len(), s.len());
            assert_eq!(world.tile_count(), s.len());
            for key in s.live_keys() {
                assert!(world.contains(&ObstacleKey::Tile(key)));
            }
        }
        assert!(geometry.destroyed > 0);

        let live_before = s.len();
        let cleared = s.clear(&mut world, &mut geometry);
        assert_eq!(cleared, live_before);
        assert!(s.is_empty());
        assert!(geometry.alive.is_empty());
        assert_eq!(world.tile_count(), 0);
        assert_eq!(geometry.created, geometry.destroyed);
    }

    #[test]
    fn test_tick_respects_refresh_interval() {
        let mut s = TileStreamer::new(StreamingConfig {
            tile_size: 5.0,
            radius: 1,
            refresh_interval: 3,
            ..StreamingConfig::default()
        });
        let mut world = CollisionWorld::new();

        assert!(s.tick(&Vector3::zeros(), &mut world, &mut ()).is_some());
        assert!(s.tick(&Vector3::zeros(), &mut world, &mut ()).is_none());
        assert!(s.tick(&Vector3::zeros(), &mut world, &mut ()).is_none());
        assert!(s.tick(&Vector3::zeros(), &mut world, &mut ()).is_some());
    }

    #[test]
    fn test_zero_radius_keeps_single_tile() {
        let mut s = TileStreamer::new(StreamingConfig {
            tile_size: 5.0,
            radius: 0,
            despawn_margin: 0,
            ..StreamingConfig::default()
        });
        let mut world = CollisionWorld::new();
        s.update(&Vector3::new(1.0, 0.0, 1.0), &mut world, &mut ());
        assert_eq!(s.len(), 1);

        s.update(&Vector3::new(6.0, 0.0, 1.0), &mut world, &mut ());
        assert_eq!(s.live_keys().collect::<Vec<_>>(), vec![TileKey::new(1, 0)]);
        assert_eq!(world.tile_count(), 1);
    }

    #[test]
    fn test_window_at_max_radius() {
        use crate::game::constants::streaming::MAX_RADIUS;

        let s = streamer(5.0, MAX_RADIUS);
        let side = (2 * MAX_RADIUS + 1) as usize;
        let window = s.window_around(TileKey::new(-3, 7));
        assert_eq!(window.len(), side * side);
        assert_eq!(window[0], TileKey::new(-3 - MAX_RADIUS, 7 - MAX_RADIUS));
        assert_eq!(window[window.len() - 1], TileKey::new(-3 + MAX_RADIUS, 7 + MAX_RADIUS));
    }
}
