//! Trailhead scene runtime library
//!
//! Kinematic character controller, orbit follow-camera, ground tile
//! streaming and the input and collision plumbing that ties them together.

pub mod config;
pub mod game;
