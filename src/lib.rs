//! Pipeline for spatially anchored task guidance.
//!
//! An operator photographs each step of a physical task; the images go to a
//! remote vision server. A user then re-photographs the same areas, each
//! photo is object-detected, the 2D detection is ray-cast against the
//! reconstructed environment mesh using the camera pose frozen at capture
//! time, and an animated hand cue is pinned to the resulting surface point
//! with a persistent spatial anchor. [`workflow::Orchestrator`] drives the
//! whole session and streams [`workflow::WorkflowEvent`]s to the shell.

pub mod camera;
pub mod config;
pub mod detection;
pub mod error;
pub mod instructions;
pub mod pose;
pub mod spatial;
pub mod utils;
pub mod visuals;
pub mod workflow;
