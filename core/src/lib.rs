//! slotmix core - frame-driven PCM streaming and mixing
//!
//! Keeps a small ring of hardware transfer slots fed from one or more sample
//! buffers while a host frame loop advances playback once per frame.
//!
//! # Architecture
//!
//! ```text
//! Frame Loop                         Engine                      Driver Thread
//!     │                                │                              │
//! [update_buffer / update_mixer]──►[acquire slot]                     │
//!     │                            [fill: copy or mix]                │
//!     │                            [submit]──────(slot index)──────►[play slot]
//!     │                                │                           [complete]
//!     │                            [slot free]◄──(notifier)───────────┘
//! ```
//!
//! - [`AudioEngine`] - owns the device, ring and buffer pool
//! - [`AudioBuffer`] - one playable interleaved `i16` sound
//! - [`AudioMixer`] - sums several buffers into one slot per frame
//! - [`OutputRing`] / [`CompletionNotifier`] - slot rotation and release

pub mod buffer;
pub mod codec;
pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod mixer;
pub mod ring;

pub use buffer::{AudioBuffer, BufferId, BufferPool};
pub use codec::{FIXED_MAX, fixed_to_float, float_to_fixed};
pub use config::{AudioConfig, MixMode};
pub use device::{
    CaptureDriver, CaptureLog, CapturedBlock, CompletionMode, CpalDriver, DeviceHandle,
    DriverContext, DriverFactory, OutputDriver,
};
pub use engine::{AudioEngine, UpdateOutcome};
pub use error::{AudioError, AudioResult};
pub use metrics::{EngineMetrics, MetricsSnapshot};
pub use mixer::{AudioMixer, MixReport};
pub use ring::{CompletionNotifier, OutputRing};
