//! Output device handle and driver backends
//!
//! A driver receives filled ring slots and plays them asynchronously,
//! releasing each one through the [`CompletionNotifier`] when done.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::config::AudioConfig;
use crate::error::AudioResult;
use crate::metrics::EngineMetrics;
use crate::ring::{CompletionNotifier, OutputRing};

mod capture;
mod cpal_backend;

pub use capture::{CaptureDriver, CaptureLog, CapturedBlock, CompletionMode};
pub use cpal_backend::CpalDriver;

static NEXT_DEVICE_ID: AtomicU32 = AtomicU32::new(1);

/// Names the open output device
///
/// Buffers and mixers keep a copy; it never owns the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(u32);

impl DeviceHandle {
    pub(crate) fn next() -> Self {
        Self(NEXT_DEVICE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn id(&self) -> u32 {
        self.0
    }
}

/// Backend that plays submitted ring slots
pub trait OutputDriver {
    /// Queue slot `index` for playback
    ///
    /// Called after the slot was filled and marked in flight. Must not block
    /// on playback; completion is reported through the notifier.
    fn submit(&mut self, index: usize) -> AudioResult<()>;

    /// Sample rate the device actually runs at
    fn sample_rate(&self) -> u32;

    /// Human-readable device name for logs
    fn name(&self) -> &str;

    /// Stop playback; called once when the engine closes
    fn stop(&mut self) {}
}

/// Shared state handed to a driver when the engine opens it
#[derive(Debug, Clone)]
pub struct DriverContext {
    pub ring: Arc<OutputRing>,
    pub notifier: CompletionNotifier,
    pub metrics: Arc<EngineMetrics>,
}

/// Deferred driver construction, chosen at runtime by the host
pub type DriverFactory =
    Box<dyn FnOnce(&AudioConfig, DriverContext) -> AudioResult<Box<dyn OutputDriver>>>;
