//! Axis-aligned obstacle registry shared by streamed tiles and static props.

use nalgebra::Vector3;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;

use super::streaming::TileKey;

/// World-space axis-aligned box. `min <= max` componentwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Aabb {
    pub min: Vector3<f32>,
    pub max: Vector3<f32>,
}

impl Aabb {
    pub fn new(min: Vector3<f32>, max: Vector3<f32>) -> Self {
        Self { min, max }
    }

    /// Box whose base is centred on `base` and which extends `size` upwards.
    pub fn from_base(base: Vector3<f32>, size: Vector3<f32>) -> Self {
        let half = Vector3::new(size.x * 0.5, 0.0, size.z * 0.5);
        Self {
            min: Vector3::new(base.x - half.x, base.y, base.z - half.z),
            max: Vector3::new(base.x + half.x, base.y + size.y, base.z + half.z),
        }
    }

    pub fn size(&self) -> Vector3<f32> {
        self.max - self.min
    }

    pub fn center(&self) -> Vector3<f32> {
        (self.min + self.max) * 0.5
    }

    /// Overlap test with touching faces counting as intersecting.
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Overlap test where touching faces do not count.
    pub fn overlaps_strictly(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
            && self.min.z < other.max.z
            && self.max.z > other.min.z
    }

    /// Whether the XZ footprint contains the planar point (edges inclusive).
    pub fn footprint_contains(&self, x: f32, z: f32) -> bool {
        x >= self.min.x && x <= self.max.x && z >= self.min.z && z <= self.max.z
    }

    /// Rejects boxes that would destabilise collision: non-finite, inverted,
    /// or flat along any axis.
    pub fn validate(&self) -> Result<(), GeometryError> {
        let finite = self.min.iter().chain(self.max.iter()).all(|v| v.is_finite());
        if !finite {
            return Err(GeometryError::NonFinite);
        }
        for (axis, name) in ['x', 'y', 'z'].into_iter().enumerate() {
            let extent = self.max[axis] - self.min[axis];
            if extent < 0.0 {
                return Err(GeometryError::Inverted { axis: name });
            }
            if extent == 0.0 {
                return Err(GeometryError::Degenerate { axis: name });
            }
        }
        Ok(())
    }
}

/// Reasons an obstacle contribution is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error("bounding box has non-finite coordinates")]
    NonFinite,
    #[error("bounding box is inverted along {axis}")]
    Inverted { axis: char },
    #[error("bounding box has zero extent along {axis}")]
    Degenerate { axis: char },
}

/// Identity of an obstacle entry. Stable keys let contributors replace
/// their geometry instead of accumulating copies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum ObstacleKey {
    Tile(TileKey),
    Prop(String),
}

/// Registry of obstacle boxes, de-duplicated by key.
#[derive(Debug, Default)]
pub struct CollisionWorld {
    entries: HashMap<ObstacleKey, Aabb>,
}

impl CollisionWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the box for `key`, returning the replaced box.
    pub fn upsert(&mut self, key: ObstacleKey, bounds: Aabb) -> Option<Aabb> {
        self.entries.insert(key, bounds)
    }

    /// Validated insert for obstacle contributors. Degenerate boxes are
    /// refused and leave any existing entry for `key` untouched.
    pub fn contribute(&mut self, key: ObstacleKey, bounds: Aabb) -> Result<(), GeometryError> {
        if let Err(e) = bounds.validate() {
            warn!(target: "collision", ?key, error = %e, "rejected obstacle");
            return Err(e);
        }
        self.upsert(key, bounds);
        Ok(())
    }

    /// Removes the entry for `key`. Absent keys are a no-op.
    pub fn remove(&mut self, key: &ObstacleKey) -> Option<Aabb> {
        self.entries.remove(key)
    }

    pub fn get(&self, key: &ObstacleKey) -> Option<&Aabb> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &ObstacleKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Lazy view over every registered box. The order is unspecified but
    /// stable while the world is borrowed.
    pub fn all_boxes(&self) -> impl Iterator<Item = &Aabb> + Clone + '_ {
        self.entries.values()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&ObstacleKey, &Aabb)> + '_ {
        self.entries.iter()
    }

    /// Number of tile-owned entries.
    pub fn tile_count(&self) -> usize {
        self.entries
            .keys()
            .filter(|k| matches!(k, ObstacleKey::Tile(_)))
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
