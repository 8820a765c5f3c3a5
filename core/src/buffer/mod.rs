//! Playable sample buffers
//!
//! An [`AudioBuffer`] owns interleaved fixed-point samples for one sound and
//! tracks its own playback cursor. Buffers live in a [`BufferPool`]; mixers
//! and the engine refer to them by [`BufferId`].

use tracing::warn;

use crate::codec::fixed_to_float;
use crate::device::DeviceHandle;
use crate::error::{AudioError, AudioResult};

mod pool;
pub mod waveform;

#[cfg(test)]
mod tests;

pub use pool::{BufferId, BufferPool};

/// One loadable, playable sound
///
/// Samples are interleaved by channel (stereo: even = left, odd = right).
/// `cursor` counts frames, one sample per channel.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    samples: Vec<i16>,
    channels: u16,
    device: Option<DeviceHandle>,
    cursor: usize,
    playing: bool,
}

impl AudioBuffer {
    /// Allocate a zeroed buffer of `sample_count` interleaved samples
    ///
    /// A buffer created without a device cannot be played; see [`AudioBuffer::play`].
    pub fn new(
        sample_count: usize,
        channels: u16,
        device: Option<DeviceHandle>,
    ) -> AudioResult<Self> {
        if channels == 0 {
            return Err(AudioError::InvalidConfig(
                "buffer channel count must be non-zero".into(),
            ));
        }

        let mut samples = Vec::new();
        samples
            .try_reserve_exact(sample_count)
            .map_err(|_| AudioError::Allocation {
                what: "audio buffer samples",
                requested: sample_count,
            })?;
        samples.resize(sample_count, 0);

        Ok(Self {
            samples,
            channels,
            device,
            cursor: 0,
            playing: false,
        })
    }

    /// Sample at `channel` of `frame` as a float, silence when out of range
    ///
    /// Reading past the end is not an error; mixers rely on this to treat
    /// voices of different lengths uniformly.
    #[inline]
    pub fn sample_at(&self, channel: usize, frame: usize) -> f32 {
        let channels = self.channels as usize;
        if channel >= channels {
            return 0.0;
        }
        frame
            .checked_mul(channels)
            .and_then(|base| base.checked_add(channel))
            .and_then(|idx| self.samples.get(idx))
            .map_or(0.0, |&v| fixed_to_float(v))
    }

    /// Left channel sample at `frame`
    pub fn left_at(&self, frame: usize) -> f32 {
        self.sample_at(0, frame)
    }

    /// Right channel sample at `frame`
    pub fn right_at(&self, frame: usize) -> f32 {
        self.sample_at(1, frame)
    }

    /// Start (or keep) playing
    pub fn play(&mut self) -> AudioResult<()> {
        if self.device.is_none() {
            warn!("play() on an audio buffer with no output device");
            return Err(AudioError::NoDevice);
        }
        self.playing = true;
        Ok(())
    }

    /// Stop contributing future frames; already submitted audio still plays
    pub fn pause(&mut self) -> AudioResult<()> {
        if self.device.is_none() {
            warn!("pause() on an audio buffer with no output device");
            return Err(AudioError::NoDevice);
        }
        self.playing = false;
        Ok(())
    }

    /// Move the cursor; not validated against the buffer length
    pub fn seek(&mut self, frame: usize) {
        self.cursor = frame;
    }

    pub fn seek_to_start(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn device(&self) -> Option<DeviceHandle> {
        self.device
    }

    /// Number of interleaved samples
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Number of whole frames held
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Whole frames between the cursor and the end of the data
    pub fn remaining_frames(&self) -> usize {
        self.frame_count().saturating_sub(self.cursor)
    }

    /// True once the cursor has reached the end of the data
    pub fn is_finished(&self) -> bool {
        self.remaining_frames() == 0
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Raw sample storage, for generators and loaders
    pub fn samples_mut(&mut self) -> &mut [i16] {
        &mut self.samples
    }

    /// Next block to hand to the device on the single-voice path
    ///
    /// `None` when paused or when no whole frame remains.
    pub(crate) fn next_chunk(&self, max_frames: usize) -> Option<&[i16]> {
        if !self.playing {
            return None;
        }
        let frames = self.remaining_frames().min(max_frames);
        if frames == 0 {
            return None;
        }
        let channels = self.channels as usize;
        let start = self.cursor * channels;
        Some(&self.samples[start..start + frames * channels])
    }

    pub(crate) fn advance(&mut self, frames: usize) {
        self.cursor = self.cursor.saturating_add(frames);
    }

    pub(crate) fn stop(&mut self) {
        self.playing = false;
    }
}
