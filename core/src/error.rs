//! Engine error type

use std::time::Duration;

use crate::buffer::BufferId;

/// Result alias used throughout the engine
pub type AudioResult<T> = Result<T, AudioError>;

/// Errors surfaced by the engine
///
/// Everything raised during a frame is recoverable; only the device-open
/// variants are expected to end startup.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AudioError {
    /// Sample or scratch storage could not be reserved
    #[error("failed to allocate {requested} elements for {what}")]
    Allocation { what: &'static str, requested: usize },

    /// Buffer or mixer was built without a device
    #[error("no output device associated with this buffer")]
    NoDevice,

    /// Buffer or mixer refers to a device this engine does not own
    #[error("buffer belongs to a different output device")]
    ForeignDevice,

    /// Platform audio subsystem could not provide an output device
    #[error("audio output device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Device only offers a sample format the engine cannot write
    #[error("unsupported sample format: {0}")]
    UnsupportedSampleFormat(String),

    /// Output stream creation failed
    #[error("failed to build audio stream: {0}")]
    StreamBuild(String),

    /// Output stream refused to start
    #[error("failed to start audio stream: {0}")]
    StreamPlay(String),

    /// The driver did not release a slot within the stall timeout
    #[error("output slot {slot} still in flight after {waited:?}")]
    DeviceStalled { slot: usize, waited: Duration },

    /// Rejected configuration value
    #[error("invalid audio config: {0}")]
    InvalidConfig(String),

    /// Buffer id was freed or never issued by this pool
    #[error("unknown audio buffer {0:?}")]
    UnknownBuffer(BufferId),

    /// Voice assignment past the mixer's fixed capacity
    #[error("voice index {index} out of range (capacity {capacity})")]
    VoiceIndexOutOfRange { index: usize, capacity: usize },

    /// Every voice slot of the mixer is taken
    #[error("mixer is full (capacity {capacity})")]
    MixerFull { capacity: usize },

    /// Driver refused a submitted slot
    #[error("driver rejected output slot {slot}")]
    SlotRejected { slot: usize },
}
