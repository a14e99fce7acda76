//! Serializable views of the simulation for debug renderers, HUDs and
//! telemetry. Nothing here feeds back into the simulation.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;

use super::camera::CameraView;
use super::character::{CharacterState, StepEvent};
use super::collision::Aabb;
use super::lighting::SunView;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// Component index into a `Vector3`.
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// An obstacle that constrained motion along one axis during a step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Contact {
    pub axis: Axis,
    pub bounds: Aabb,
}

impl Contact {
    pub fn new(axis: Axis, bounds: Aabb) -> Self {
        Self { axis, bounds }
    }
}

/// Character state right after one step, plus the boxes it touched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepSnapshot {
    pub position: [f32; 3],
    pub velocity: [f32; 3],
    pub facing: f32,
    pub grounded: bool,
    pub jumps_remaining: u8,
    pub moving: bool,
    pub contacts: Vec<Contact>,
}

impl StepSnapshot {
    pub fn capture(state: &CharacterState, contacts: Vec<Contact>) -> Self {
        Self {
            position: state.position.into(),
            velocity: state.velocity.into(),
            facing: state.facing,
            grounded: state.grounded,
            jumps_remaining: state.jumps_remaining,
            moving: state.moving,
            contacts,
        }
    }

    pub fn contacts_on(&self, axis: Axis) -> impl Iterator<Item = &Contact> + '_ {
        self.contacts.iter().filter(move |c| c.axis == axis)
    }
}

/// Hook for debug collaborators that want every step's snapshot.
pub trait StepObserver: Send {
    fn on_step(&mut self, tick: u64, snapshot: &StepSnapshot, events: &[StepEvent]);
}

/// Keeps the most recent snapshots in a ring. Clones share the same buffer,
/// so one clone can be handed to a scene while another is inspected.
#[derive(Clone)]
pub struct RecordingObserver {
    capacity: usize,
    buffer: Arc<Mutex<VecDeque<(u64, StepSnapshot)>>>,
}

impl RecordingObserver {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            buffer: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }

    pub fn latest(&self) -> Option<(u64, StepSnapshot)> {
        self.buffer.lock().back().cloned()
    }

    /// Oldest first.
    pub fn snapshots(&self) -> Vec<(u64, StepSnapshot)> {
        self.buffer.lock().iter().cloned().collect()
    }
}

impl StepObserver for RecordingObserver {
    fn on_step(&mut self, tick: u64, snapshot: &StepSnapshot, _events: &[StepEvent]) {
        let mut buffer = self.buffer.lock();
        while buffer.len() >= self.capacity {
            buffer.pop_front();
        }
        buffer.push_back((tick, snapshot.clone()));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CharacterView {
    pub position: [f32; 3],
    pub velocity: [f32; 3],
    pub facing: f32,
    pub grounded: bool,
    pub jumps_remaining: u8,
    pub moving: bool,
}

impl From<&CharacterState> for CharacterView {
    fn from(state: &CharacterState) -> Self {
        Self {
            position: state.position.into(),
            velocity: state.velocity.into(),
            facing: state.facing,
            grounded: state.grounded,
            jumps_remaining: state.jumps_remaining,
            moving: state.moving,
        }
    }
}

/// Whole-scene observation emitted once per frame.
#[derive(Debug, Clone, Serialize)]
pub struct SceneObservation {
    pub tick: u64,
    pub character: CharacterView,
    pub camera: CameraView,
    pub sun: SunView,
    pub live_tiles: usize,
    pub obstacles: usize,
    pub captured: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<StepEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn snapshot(x: f32) -> StepSnapshot {
        StepSnapshot {
            position: [x, 0.0, 0.0],
            velocity: [0.0; 3],
            facing: 0.0,
            grounded: true,
            jumps_remaining: 1,
            moving: false,
            contacts: vec![],
        }
    }

    #[test]
    fn test_recording_observer_keeps_latest() {
        let recorder = RecordingObserver::new(3);
        let mut handle: Box<dyn StepObserver> = Box::new(recorder.clone());
        for tick in 0..5 {
            handle.on_step(tick, &snapshot(tick as f32), &[]);
        }
        let kept: Vec<u64> = recorder.snapshots().iter().map(|(t, _)| *t).collect();
        assert_eq!(kept, vec![2, 3, 4]);
        assert_eq!(recorder.latest().map(|(_, s)| s.position[0]), Some(4.0));
    }

    #[test]
    fn test_contacts_filter_by_axis() {
        let bounds = Aabb::new(Vector3::zeros(), Vector3::new(1.0, 1.0, 1.0));
        let mut snap = snapshot(0.0);
        snap.contacts = vec![Contact::new(Axis::X, bounds), Contact::new(Axis::Y, bounds)];
        assert_eq!(snap.contacts_on(Axis::X).count(), 1);
        assert_eq!(snap.contacts_on(Axis::Z).count(), 0);

        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["contacts"][0]["axis"], "x");
    }
}
