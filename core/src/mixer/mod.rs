//! Multi-voice mixing into one output slot per frame
//!
//! Every update sums all playing voices sample by sample into a float
//! scratch block, folds it back to fixed point according to the [`MixMode`],
//! then advances every playing voice by a full slot.
//!
//! Voices are not stopped when their data runs out: past the end they keep
//! advancing and contribute silence until the caller seeks or pauses them
//! (unless `auto_pause_at_end` is enabled).

use tracing::debug;

use crate::buffer::{BufferId, BufferPool};
use crate::codec::{FIXED_MAX, encode_slice, float_to_fixed};
use crate::config::MixMode;
use crate::device::DeviceHandle;
use crate::error::{AudioError, AudioResult};


/// Guards the peak division against a silent slot
const PEAK_EPSILON: f32 = 1.0e-4;

/// Summary of one mixer update
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MixReport {
    /// Ring slot the mix was written to
    pub slot: usize,
    /// Voices that were playing and contributed
    pub active_voices: usize,
    /// Assigned ids whose buffer had been freed
    pub stale_voices: usize,
    /// Largest absolute summed amplitude before folding
    pub peak: f32,
    /// Output samples pinned at full scale
    pub clipped: usize,
}

/// Sums a fixed set of voices into the ring
#[derive(Debug)]
pub struct AudioMixer {
    voices: Vec<Option<BufferId>>,
    scratch: Vec<f32>,
    slot_frames: usize,
    channels: u16,
    device: Option<DeviceHandle>,
    mode: MixMode,
    auto_pause_at_end: bool,
}

impl AudioMixer {
    /// Allocate `capacity` empty voice slots and the scratch block
    pub fn new(
        capacity: usize,
        slot_frames: usize,
        channels: u16,
        device: Option<DeviceHandle>,
    ) -> AudioResult<Self> {
        if channels == 0 {
            return Err(AudioError::InvalidConfig(
                "mixer channel count must be non-zero".into(),
            ));
        }

        let mut voices = Vec::new();
        voices
            .try_reserve_exact(capacity)
            .map_err(|_| AudioError::Allocation {
                what: "mixer voice list",
                requested: capacity,
            })?;
        voices.resize(capacity, None);

        let scratch_len = slot_frames.saturating_mul(channels as usize);
        let mut scratch = Vec::new();
        scratch
            .try_reserve_exact(scratch_len)
            .map_err(|_| AudioError::Allocation {
                what: "mixer scratch buffer",
                requested: scratch_len,
            })?;
        scratch.resize(scratch_len, 0.0);

        Ok(Self {
            voices,
            scratch,
            slot_frames,
            channels,
            device,
            mode: MixMode::default(),
            auto_pause_at_end: false,
        })
    }

    pub fn with_mode(mut self, mode: MixMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_auto_pause(mut self, enabled: bool) -> Self {
        self.auto_pause_at_end = enabled;
        self
    }

    pub fn set_mode(&mut self, mode: MixMode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> MixMode {
        self.mode
    }

    pub fn set_auto_pause(&mut self, enabled: bool) {
        self.auto_pause_at_end = enabled;
    }

    /// Assign `id` to voice slot `index`
    ///
    /// Overwrites whatever was there. The same id may be assigned to several
    /// slots; it is then mixed and advanced once per slot.
    pub fn set_voice(&mut self, index: usize, id: BufferId) -> AudioResult<()> {
        let capacity = self.voices.len();
        let slot = self
            .voices
            .get_mut(index)
            .ok_or(AudioError::VoiceIndexOutOfRange { index, capacity })?;
        *slot = Some(id);
        Ok(())
    }

    /// Assign `id` to the first empty voice slot and return its index
    pub fn add_voice(&mut self, id: BufferId) -> AudioResult<usize> {
        let index = self
            .voices
            .iter()
            .position(Option::is_none)
            .ok_or(AudioError::MixerFull {
                capacity: self.voices.len(),
            })?;
        self.voices[index] = Some(id);
        Ok(index)
    }

    /// Empty voice slot `index`, returning what it held
    pub fn clear_voice(&mut self, index: usize) -> AudioResult<Option<BufferId>> {
        let capacity = self.voices.len();
        self.voices
            .get_mut(index)
            .map(Option::take)
            .ok_or(AudioError::VoiceIndexOutOfRange { index, capacity })
    }

    pub fn voices(&self) -> &[Option<BufferId>] {
        &self.voices
    }

    pub fn capacity(&self) -> usize {
        self.voices.len()
    }

    /// Number of assigned voice slots
    pub fn voice_count(&self) -> usize {
        self.voices.iter().flatten().count()
    }

    pub fn device(&self) -> Option<DeviceHandle> {
        self.device
    }

    pub fn slot_frames(&self) -> usize {
        self.slot_frames
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Interleaved samples written per update
    pub fn slot_samples(&self) -> usize {
        self.scratch.len()
    }

    /// Sum all playing voices at their cursors and fold the result into `out`
    ///
    /// Does not move any cursor; see [`AudioMixer::advance_voices`].
    pub(crate) fn mix_into(&mut self, pool: &BufferPool, out: &mut [i16]) -> MixReport {
        let channels = self.channels as usize;
        let mut report = MixReport::default();

        self.scratch.fill(0.0);

        for id in self.voices.iter().flatten() {
            let Some(voice) = pool.get(*id) else {
                report.stale_voices += 1;
                continue;
            };
            if !voice.is_playing() {
                continue;
            }
            report.active_voices += 1;

            let cursor = voice.cursor();
            for (t, frame) in self.scratch.chunks_exact_mut(channels).enumerate() {
                for (c, acc) in frame.iter_mut().enumerate() {
                    *acc += voice.sample_at(c, cursor.saturating_add(t));
                }
            }
        }

        report.peak = self.scratch.iter().fold(0.0f32, |m, s| m.max(s.abs()));

        let n = self.scratch.len().min(out.len());
        match self.mode {
            MixMode::Saturate => {
                encode_slice(&self.scratch, &mut out[..n]);
            }
            MixMode::NormalizeByVoices => {
                let scale = 1.0 / report.active_voices.max(1) as f32;
                for (dst, &s) in out[..n].iter_mut().zip(&self.scratch) {
                    *dst = float_to_fixed(s * scale);
                }
            }
            MixMode::NormalizePeak => {
                for c in 0..channels {
                    let peak = self
                        .scratch
                        .iter()
                        .skip(c)
                        .step_by(channels)
                        .fold(0.0f32, |m, s| m.max(s.abs()));
                    let scale = if peak > 1.0 { 1.0 / (peak + PEAK_EPSILON) } else { 1.0 };
                    for i in (c..n).step_by(channels) {
                        out[i] = float_to_fixed(self.scratch[i] * scale);
                    }
                }
            }
        }

        report.clipped = out[..n]
            .iter()
            .filter(|&&s| s == FIXED_MAX || s == -FIXED_MAX)
            .count();
        report
    }

    /// Move every playing voice forward by one slot
    pub(crate) fn advance_voices(&self, pool: &mut BufferPool) {
        for id in self.voices.iter().flatten() {
            let Some(voice) = pool.get_mut(*id) else {
                continue;
            };
            if !voice.is_playing() {
                continue;
            }
            voice.advance(self.slot_frames);
            if self.auto_pause_at_end && voice.is_finished() {
                debug!("Auto-pausing finished mixer voice {:?}", id);
                voice.stop();
            }
        }
    }
}
