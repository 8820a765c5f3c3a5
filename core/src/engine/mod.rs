//! Audio engine context
//!
//! Owns the single open output device, the output ring, and every buffer
//! created through it. The frame loop calls [`AudioEngine::update_buffer`]
//! or [`AudioEngine::update_mixer`] once per frame; both share one rotating
//! `next_slot`, so slots reach the device in strict round-robin order no
//! matter which path filled them.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::buffer::{AudioBuffer, BufferId, BufferPool};
use crate::config::AudioConfig;
use crate::device::{CpalDriver, DeviceHandle, DriverContext, OutputDriver};
use crate::error::{AudioError, AudioResult};
use crate::metrics::{EngineMetrics, MetricsLogger, MetricsSnapshot};
use crate::mixer::{AudioMixer, MixReport};
use crate::ring::{CompletionNotifier, OutputRing};


/// Result of a single-voice update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// `frames` frames were handed to the device through `slot`
    Submitted { slot: usize, frames: usize },
    /// Buffer is paused or has no data left; nothing was submitted
    Idle,
}

/// The open output device plus everything that feeds it
pub struct AudioEngine {
    config: AudioConfig,
    device: DeviceHandle,
    ring: Arc<OutputRing>,
    driver: Box<dyn OutputDriver>,
    buffers: BufferPool,
    /// Next ring slot to fill, shared by both update paths
    next_slot: usize,
    metrics: Arc<EngineMetrics>,
    metrics_logger: MetricsLogger,
    closed: bool,
}

impl AudioEngine {
    /// Open the default hardware output device
    pub fn open(config: AudioConfig) -> AudioResult<Self> {
        Self::with_driver(config, CpalDriver::factory())
    }

    /// Open the engine on a driver built by `factory`
    pub fn with_driver<F>(config: AudioConfig, factory: F) -> AudioResult<Self>
    where
        F: FnOnce(&AudioConfig, DriverContext) -> AudioResult<Box<dyn OutputDriver>>,
    {
        config.validate()?;

        let ring = Arc::new(OutputRing::new(config.ring_depth, config.slot_samples())?);
        let metrics = Arc::new(EngineMetrics::new());
        let ctx = DriverContext {
            notifier: ring.notifier(),
            ring: Arc::clone(&ring),
            metrics: Arc::clone(&metrics),
        };
        let driver = factory(&config, ctx)?;

        if driver.sample_rate() != config.sample_rate {
            // No resampling: audio will play at the wrong pitch
            warn!(
                "Device '{}' runs at {} Hz but buffers are {} Hz",
                driver.name(),
                driver.sample_rate(),
                config.sample_rate
            );
        }

        info!(
            "Audio engine ready on '{}': {} Hz, {} ch, {} slots x {} frames",
            driver.name(),
            config.sample_rate,
            config.channels,
            config.ring_depth,
            config.slot_frames()
        );

        Ok(Self {
            device: DeviceHandle::next(),
            ring,
            driver,
            buffers: BufferPool::new(),
            next_slot: 0,
            metrics,
            metrics_logger: MetricsLogger::new(),
            closed: false,
            config,
        })
    }

    /// Drain in-flight slots, then stop the device
    ///
    /// The driver is stopped even when draining stalls; the stall is returned.
    pub fn close(mut self) -> AudioResult<()> {
        let drained = self.ring.drain(self.config.stall_timeout());
        self.driver.stop();
        self.closed = true;

        let m = self.metrics.snapshot();
        info!(
            "Audio engine closed: {} slots, {} frames, {} stalls, {} underruns",
            m.slots_submitted, m.frames_delivered, m.stalls, m.underruns
        );
        drained
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    /// Handle naming this engine's device
    pub fn device(&self) -> DeviceHandle {
        self.device
    }

    pub fn slot_frames(&self) -> usize {
        self.config.slot_frames()
    }

    /// Ring slot the next update will fill
    pub fn next_slot(&self) -> usize {
        self.next_slot
    }

    pub fn ring(&self) -> &Arc<OutputRing> {
        &self.ring
    }

    pub fn notifier(&self) -> CompletionNotifier {
        self.ring.notifier()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn driver_name(&self) -> &str {
        self.driver.name()
    }

    // ------------------------------------------------------------------
    // Buffers
    // ------------------------------------------------------------------

    /// Allocate a zeroed buffer of `sample_count` interleaved samples
    ///
    /// Without an explicit device the buffer is bound to this engine's.
    pub fn create_buffer(
        &mut self,
        sample_count: usize,
        device: Option<DeviceHandle>,
    ) -> AudioResult<BufferId> {
        let device = device.unwrap_or(self.device);
        let buffer = AudioBuffer::new(sample_count, self.config.channels, Some(device))?;
        Ok(self.buffers.insert(buffer))
    }

    /// Adopt a buffer built elsewhere (e.g. by a loader)
    pub fn insert_buffer(&mut self, buffer: AudioBuffer) -> BufferId {
        self.buffers.insert(buffer)
    }

    /// Release a buffer; mixers still holding its id will skip it
    pub fn free_buffer(&mut self, id: BufferId) -> Option<AudioBuffer> {
        self.buffers.remove(id)
    }

    pub fn buffer(&self, id: BufferId) -> AudioResult<&AudioBuffer> {
        self.buffers.get(id).ok_or(AudioError::UnknownBuffer(id))
    }

    pub fn buffer_mut(&mut self, id: BufferId) -> AudioResult<&mut AudioBuffer> {
        self.buffers.get_mut(id).ok_or(AudioError::UnknownBuffer(id))
    }

    pub fn buffers(&self) -> &BufferPool {
        &self.buffers
    }

    pub fn play(&mut self, id: BufferId) -> AudioResult<()> {
        self.buffer_mut(id)?.play()
    }

    pub fn pause(&mut self, id: BufferId) -> AudioResult<()> {
        self.buffer_mut(id)?.pause()
    }

    pub fn seek(&mut self, id: BufferId, frame: usize) -> AudioResult<()> {
        self.buffer_mut(id)?.seek(frame);
        Ok(())
    }

    pub fn seek_to_start(&mut self, id: BufferId) -> AudioResult<()> {
        self.buffer_mut(id)?.seek_to_start();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Per-frame updates
    // ------------------------------------------------------------------

    /// Single-voice path: copy the buffer's next block straight into the ring
    ///
    /// Delivers up to one slot of frames, fewer near the end of the data.
    /// Paused or finished buffers are left alone and nothing is submitted.
    pub fn update_buffer(&mut self, id: BufferId) -> AudioResult<UpdateOutcome> {
        let index = self.next_slot;

        let frames = {
            let buffer = self.buffers.get(id).ok_or(AudioError::UnknownBuffer(id))?;
            self.check_device(buffer.device())?;
            if buffer.channels() != self.config.channels {
                return Err(AudioError::InvalidConfig(format!(
                    "buffer has {} channels, device has {}",
                    buffer.channels(),
                    self.config.channels
                )));
            }

            let Some(chunk) = buffer.next_chunk(self.config.slot_frames()) else {
                return Ok(UpdateOutcome::Idle);
            };

            self.wait_for_slot(index)?;

            let mut data = self.ring.lock(index);
            data.block_mut()[..chunk.len()].copy_from_slice(chunk);
            data.set_len(chunk.len());
            chunk.len() / self.config.channels as usize
        };

        self.submit(index, frames)?;

        if let Some(buffer) = self.buffers.get_mut(id) {
            buffer.advance(frames);
        }

        Ok(UpdateOutcome::Submitted {
            slot: index,
            frames,
        })
    }

    /// Create a mixer bound to this engine's device (or `device`)
    ///
    /// Mix mode and auto-pause are taken from the engine config.
    pub fn create_mixer(
        &self,
        capacity: usize,
        device: Option<DeviceHandle>,
    ) -> AudioResult<AudioMixer> {
        let device = device.unwrap_or(self.device);
        Ok(AudioMixer::new(
            capacity,
            self.config.slot_frames(),
            self.config.channels,
            Some(device),
        )?
        .with_mode(self.config.mix_mode)
        .with_auto_pause(self.config.auto_pause_at_end))
    }

    /// Multi-voice path: mix one full slot and advance every playing voice
    ///
    /// Always submits a full slot, silence included.
    pub fn update_mixer(&mut self, mixer: &mut AudioMixer) -> AudioResult<MixReport> {
        self.check_device(mixer.device())?;
        if mixer.channels() != self.config.channels {
            return Err(AudioError::InvalidConfig(format!(
                "mixer has {} channels, device has {}",
                mixer.channels(),
                self.config.channels
            )));
        }
        if mixer.slot_frames() != self.config.slot_frames() {
            return Err(AudioError::InvalidConfig(format!(
                "mixer block of {} frames does not match slot of {} frames",
                mixer.slot_frames(),
                self.config.slot_frames()
            )));
        }

        let index = self.next_slot;
        self.wait_for_slot(index)?;

        let mut report = {
            let mut data = self.ring.lock(index);
            let n = mixer.slot_samples();
            let report = mixer.mix_into(&self.buffers, &mut data.block_mut()[..n]);
            data.set_len(n);
            report
        };
        report.slot = index;

        if report.stale_voices > 0 {
            self.metrics.record_stale_voices(report.stale_voices);
        }

        self.submit(index, mixer.slot_frames())?;
        mixer.advance_voices(&mut self.buffers);

        Ok(report)
    }

    fn check_device(&self, device: Option<DeviceHandle>) -> AudioResult<()> {
        match device {
            None => {
                warn!("Update on a buffer or mixer with no output device; audio dropped");
                Err(AudioError::NoDevice)
            }
            Some(handle) if handle != self.device => {
                warn!(
                    "Update on a buffer or mixer bound to device {} (engine owns {})",
                    handle.id(),
                    self.device.id()
                );
                Err(AudioError::ForeignDevice)
            }
            Some(_) => Ok(()),
        }
    }

    /// The engine's only blocking point
    fn wait_for_slot(&self, index: usize) -> AudioResult<()> {
        match self.ring.wait_free(index, self.config.stall_timeout()) {
            Ok(waited) => {
                self.metrics.record_wait(waited);
                Ok(())
            }
            Err(e) => {
                self.metrics.record_stall();
                Err(e)
            }
        }
    }

    /// Hand a filled slot to the driver and rotate
    fn submit(&mut self, index: usize, frames: usize) -> AudioResult<()> {
        self.ring.mark_in_flight(index);
        if let Err(e) = self.driver.submit(index) {
            self.ring.release(index);
            return Err(e);
        }

        self.metrics.record_submit(frames);
        self.next_slot = (index + 1) % self.ring.depth();
        self.metrics_logger.maybe_log(&self.metrics);
        Ok(())
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        if !self.closed {
            debug!("Audio engine dropped without close(); stopping driver");
            self.driver.stop();
        }
    }
}
