//! Engine health counters and periodic diagnostics

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tracing::debug;

/// Counters shared between the frame loop and the driver thread
#[derive(Debug, Default)]
pub struct EngineMetrics {
    slots_submitted: AtomicU64,
    frames_delivered: AtomicU64,
    /// Acquires that found the slot still in flight
    waits: AtomicU64,
    wait_time_us: AtomicU64,
    max_wait_us: AtomicU64,
    stalls: AtomicU64,
    /// Mixer voices whose buffer had been freed
    stale_voices: AtomicU64,
    /// Device callbacks that ran out of submitted audio
    underruns: AtomicU64,
}

/// Point-in-time copy of [`EngineMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub slots_submitted: u64,
    pub frames_delivered: u64,
    pub waits: u64,
    pub wait_time_us: u64,
    pub max_wait_us: u64,
    pub stalls: u64,
    pub stale_voices: u64,
    pub underruns: u64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_submit(&self, frames: usize) {
        self.slots_submitted.fetch_add(1, Ordering::Relaxed);
        self.frames_delivered
            .fetch_add(frames as u64, Ordering::Relaxed);
    }

    pub fn record_wait(&self, waited: Duration) {
        if waited.is_zero() {
            return;
        }
        let us = waited.as_micros().min(u64::MAX as u128) as u64;
        self.waits.fetch_add(1, Ordering::Relaxed);
        self.wait_time_us.fetch_add(us, Ordering::Relaxed);
        self.max_wait_us.fetch_max(us, Ordering::Relaxed);
    }

    pub fn record_stall(&self) {
        self.stalls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_voices(&self, count: usize) {
        self.stale_voices.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_underrun(&self) {
        self.underruns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            slots_submitted: self.slots_submitted.load(Ordering::Relaxed),
            frames_delivered: self.frames_delivered.load(Ordering::Relaxed),
            waits: self.waits.load(Ordering::Relaxed),
            wait_time_us: self.wait_time_us.load(Ordering::Relaxed),
            max_wait_us: self.max_wait_us.load(Ordering::Relaxed),
            stalls: self.stalls.load(Ordering::Relaxed),
            stale_voices: self.stale_voices.load(Ordering::Relaxed),
            underruns: self.underruns.load(Ordering::Relaxed),
        }
    }
}

impl MetricsSnapshot {
    /// Average wait per blocked acquire, in microseconds
    pub fn avg_wait_us(&self) -> f64 {
        if self.waits == 0 {
            0.0
        } else {
            self.wait_time_us as f64 / self.waits as f64
        }
    }
}

/// Emits a per-second delta of the counters at debug level
#[derive(Debug)]
pub(crate) struct MetricsLogger {
    last: MetricsSnapshot,
    last_log_time: Instant,
}

impl MetricsLogger {
    pub fn new() -> Self {
        Self {
            last: MetricsSnapshot::default(),
            last_log_time: Instant::now(),
        }
    }

    /// Log if at least a second has passed since the last line
    pub fn maybe_log(&mut self, metrics: &EngineMetrics) {
        if self.last_log_time.elapsed().as_secs() < 1 {
            return;
        }
        let now = metrics.snapshot();
        let waits = now.waits - self.last.waits;
        let wait_time = now.wait_time_us - self.last.wait_time_us;

        debug!(
            "AUDIO METRICS: slots={}, frames={}, waits={} (avg={:.1}us, max={}us), \
             stalls={}, underruns={}, stale_voices={}",
            now.slots_submitted - self.last.slots_submitted,
            now.frames_delivered - self.last.frames_delivered,
            waits,
            if waits == 0 { 0.0 } else { wait_time as f64 / waits as f64 },
            now.max_wait_us,
            now.stalls - self.last.stalls,
            now.underruns - self.last.underruns,
            now.stale_voices - self.last.stale_voices,
        );

        self.last = now;
        self.last_log_time = Instant::now();
    }
}
