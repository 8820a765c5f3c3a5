//! Headless driver that records submitted slots
//!
//! Used when no sound hardware is wanted (CI, `--headless`) and by tests,
//! which pick when slots complete to exercise the ring without a device.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::trace;

use super::{DriverContext, DriverFactory, OutputDriver};
use crate::config::AudioConfig;
use crate::error::AudioResult;
use crate::ring::{CompletionNotifier, OutputRing};

/// When a captured slot is released
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionMode {
    /// Released as soon as it is recorded
    Immediate,
    /// Released only when the notifier holder calls `complete`
    Manual,
}

/// One submitted slot as the device would have played it
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedBlock {
    pub slot: usize,
    pub samples: Vec<i16>,
}

#[derive(Debug, Default)]
struct CaptureState {
    blocks: Vec<CapturedBlock>,
    counting_only: bool,
    submitted: usize,
    samples_submitted: usize,
}

/// Shared record of everything a [`CaptureDriver`] received
///
/// A full log keeps a copy of every slot. A counting log keeps only the
/// totals, so it stays the same size however long the engine runs.
#[derive(Debug, Clone, Default)]
pub struct CaptureLog(Arc<Mutex<CaptureState>>);

impl CaptureLog {
    /// Log that keeps every submitted block
    pub fn new() -> Self {
        Self::default()
    }

    /// Log that only counts submissions
    pub fn counting() -> Self {
        Self(Arc::new(Mutex::new(CaptureState {
            counting_only: true,
            ..CaptureState::default()
        })))
    }

    fn state(&self) -> MutexGuard<'_, CaptureState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// False for a counting log
    pub fn keeps_samples(&self) -> bool {
        !self.state().counting_only
    }

    fn push(&self, block: CapturedBlock) {
        let mut state = self.state();
        state.submitted += 1;
        state.samples_submitted += block.samples.len();
        if !state.counting_only {
            state.blocks.push(block);
        }
    }

    fn count(&self, samples: usize) {
        let mut state = self.state();
        state.submitted += 1;
        state.samples_submitted += samples;
    }

    /// Retained blocks; always empty for a counting log
    pub fn blocks(&self) -> Vec<CapturedBlock> {
        self.state().blocks.clone()
    }

    /// Slot indices of the retained blocks, in submission order
    pub fn slots(&self) -> Vec<usize> {
        self.state().blocks.iter().map(|b| b.slot).collect()
    }

    /// Every retained sample, concatenated in submission order
    pub fn samples(&self) -> Vec<i16> {
        self.state()
            .blocks
            .iter()
            .flat_map(|b| b.samples.iter().copied())
            .collect()
    }

    /// Slots submitted, retained or not
    pub fn len(&self) -> usize {
        self.state().submitted
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Interleaved samples submitted, retained or not
    pub fn samples_submitted(&self) -> usize {
        self.state().samples_submitted
    }

    pub fn clear(&self) {
        let mut state = self.state();
        state.blocks.clear();
        state.submitted = 0;
        state.samples_submitted = 0;
    }
}

/// Driver that copies each submitted slot into a [`CaptureLog`]
pub struct CaptureDriver {
    ring: Arc<OutputRing>,
    notifier: CompletionNotifier,
    mode: CompletionMode,
    log: CaptureLog,
    sample_rate: u32,
}

impl CaptureDriver {
    pub fn new(
        config: &AudioConfig,
        ctx: DriverContext,
        mode: CompletionMode,
        log: CaptureLog,
    ) -> Self {
        Self {
            ring: ctx.ring,
            notifier: ctx.notifier,
            mode,
            log,
            sample_rate: config.sample_rate,
        }
    }

    /// Factory for [`crate::AudioEngine::with_driver`]
    pub fn factory(mode: CompletionMode, log: CaptureLog) -> DriverFactory {
        Box::new(move |config, ctx| {
            Ok(Box::new(Self::new(config, ctx, mode, log)) as Box<dyn OutputDriver>)
        })
    }
}

impl OutputDriver for CaptureDriver {
    fn submit(&mut self, index: usize) -> AudioResult<()> {
        if self.log.keeps_samples() {
            let samples = self.ring.slot_samples(index);
            trace!("captured slot {} ({} samples)", index, samples.len());
            self.log.push(CapturedBlock {
                slot: index,
                samples,
            });
        } else {
            let len = self.ring.lock(index).len();
            trace!("counted slot {} ({} samples)", index, len);
            self.log.count(len);
        }

        if self.mode == CompletionMode::Immediate {
            self.notifier.complete(index);
        }
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn name(&self) -> &str {
        match self.mode {
            CompletionMode::Immediate => "capture",
            CompletionMode::Manual => "capture (manual completion)",
        }
    }
}
