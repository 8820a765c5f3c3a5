//! Engine configuration
//!
//! Stream format and ring geometry are explicit values rather than build-time
//! constants. Serialized as the `[audio]` table of the player's config file.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AudioError, AudioResult};

/// How the mixer folds summed voices back into fixed point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MixMode {
    /// Plain sum, hard-clipped by the codec
    #[default]
    Saturate,
    /// Sum divided by the number of playing voices
    NormalizeByVoices,
    /// Each channel scaled so its loudest sum in the slot fits (epsilon guarded)
    ///
    /// Stands in for a fold that divides every sample by a running sum of the
    /// voices plus epsilon. That fold is not offered: its gain drifts with the
    /// sample's position in the slot.
    NormalizePeak,
}

impl FromStr for MixMode {
    type Err = AudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "saturate" => Ok(Self::Saturate),
            "normalize_by_voices" | "voices" => Ok(Self::NormalizeByVoices),
            "normalize_peak" | "peak" => Ok(Self::NormalizePeak),
            other => Err(AudioError::InvalidConfig(format!(
                "unknown mix mode '{}'",
                other
            ))),
        }
    }
}

/// Audio engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Output sample rate in Hz (default: 44100)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Interleaved channel count (default: 2)
    #[serde(default = "default_channels")]
    pub channels: u16,
    /// Host frame loop rate in Hz (default: 60)
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,
    /// Number of transfer slots, power of two (default: 4)
    #[serde(default = "default_ring_depth")]
    pub ring_depth: usize,
    /// Slot length in multiples of one host frame of audio (default: 2)
    #[serde(default = "default_slot_headroom")]
    pub slot_headroom: u32,
    /// Give up waiting for a free slot after this long; 0 waits forever (default: 2000)
    #[serde(default = "default_stall_timeout_ms")]
    pub stall_timeout_ms: u64,
    /// Mixer fold mode (default: saturate)
    #[serde(default)]
    pub mix_mode: MixMode,
    /// Pause mixer voices once their cursor passes the end of their data (default: false)
    #[serde(default)]
    pub auto_pause_at_end: bool,
}

fn default_sample_rate() -> u32 {
    44_100
}
fn default_channels() -> u16 {
    2
}
fn default_frame_rate() -> u32 {
    60
}
fn default_ring_depth() -> usize {
    4
}
fn default_slot_headroom() -> u32 {
    2
}
fn default_stall_timeout_ms() -> u64 {
    2000
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            frame_rate: default_frame_rate(),
            ring_depth: default_ring_depth(),
            slot_headroom: default_slot_headroom(),
            stall_timeout_ms: default_stall_timeout_ms(),
            mix_mode: MixMode::default(),
            auto_pause_at_end: false,
        }
    }
}

impl AudioConfig {
    /// Audio frames produced per host frame (`sample_rate / frame_rate`)
    pub fn frames_per_tick(&self) -> usize {
        (self.sample_rate / self.frame_rate.max(1)) as usize
    }

    /// Capacity of one ring slot in audio frames
    pub fn slot_frames(&self) -> usize {
        self.frames_per_tick() * self.slot_headroom as usize
    }

    /// Capacity of one ring slot in interleaved samples
    pub fn slot_samples(&self) -> usize {
        self.slot_frames() * self.channels as usize
    }

    /// Slot wait bound, `None` when waiting forever
    pub fn stall_timeout(&self) -> Option<Duration> {
        (self.stall_timeout_ms > 0).then(|| Duration::from_millis(self.stall_timeout_ms))
    }

    /// Reject geometry the engine cannot run with
    pub fn validate(&self) -> AudioResult<()> {
        if self.sample_rate == 0 {
            return Err(AudioError::InvalidConfig("sample_rate must be non-zero".into()));
        }
        if self.channels == 0 {
            return Err(AudioError::InvalidConfig("channels must be non-zero".into()));
        }
        if self.frame_rate == 0 || self.frame_rate > self.sample_rate {
            return Err(AudioError::InvalidConfig(format!(
                "frame_rate {} must be in 1..={}",
                self.frame_rate, self.sample_rate
            )));
        }
        if self.ring_depth < 2 || !self.ring_depth.is_power_of_two() {
            return Err(AudioError::InvalidConfig(format!(
                "ring_depth {} must be a power of two >= 2",
                self.ring_depth
            )));
        }
        if self.slot_headroom == 0 {
            return Err(AudioError::InvalidConfig("slot_headroom must be non-zero".into()));
        }
        Ok(())
    }
}
