//! slotmix player - a headless host for the slotmix engine
//!
//! Drives an [`slotmix_core::AudioEngine`] from a fixed-timestep frame loop
//! and ships a few demo scenes that exercise both update paths.

pub mod config;
pub mod frame_loop;
pub mod scene;

pub use config::{Config, PlayerConfig};
pub use frame_loop::{FrameClock, LoopStats, run};
pub use scene::{Scene, SceneKind};
