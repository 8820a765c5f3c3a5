//! Hardware output through cpal
//!
//! Submitted slot indices travel over a lock-free SPSC queue to the cpal
//! callback, which plays them back to back and releases each slot as soon as
//! its last sample has been copied out.
//!
//! The callback never blocks on a slot: it only touches slots that are in
//! flight, and it reads them with `try_lock`. Releasing a slot briefly takes
//! the ring's wakeup mutex, which the frame loop holds only between checking
//! a flag and parking on the condvar.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use tracing::{debug, error, info};

use super::{DriverContext, DriverFactory, OutputDriver};
use crate::codec::fixed_to_float;
use crate::config::AudioConfig;
use crate::error::{AudioError, AudioResult};
use crate::metrics::EngineMetrics;
use crate::ring::{CompletionNotifier, OutputRing};

/// Default-device output stream fed from the ring
pub struct CpalDriver {
    /// Producer side of the slot queue (frame loop writes here)
    queue: HeapProd<usize>,
    /// The cpal stream (kept alive for the duration)
    stream: cpal::Stream,
    sample_rate: u32,
    name: String,
}

/// Callback-side playback state
struct SlotPlayback {
    queue: HeapCons<usize>,
    ring: Arc<OutputRing>,
    notifier: CompletionNotifier,
    metrics: Arc<EngineMetrics>,
    /// Slot currently being played and the read offset into it
    current: Option<usize>,
    offset: usize,
}

impl SlotPlayback {
    /// Fill `out` from queued slots, padding with `silence` on underrun
    fn fill<T: Copy>(&mut self, out: &mut [T], convert: fn(i16) -> T, silence: T) {
        let mut written = 0;

        while written < out.len() {
            let index = match self.current {
                Some(index) => index,
                None => match self.queue.try_pop() {
                    Some(index) => {
                        self.current = Some(index);
                        self.offset = 0;
                        index
                    }
                    None => break,
                },
            };

            // Queued slots are in flight, so the producer never holds their
            // lock; a miss here is treated as an underrun rather than a wait
            let Some(data) = self.ring.try_lock(index) else {
                break;
            };
            let (copied, exhausted) = {
                let src = &data.as_slice()[self.offset.min(data.len())..];
                let n = src.len().min(out.len() - written);
                for (dst, &s) in out[written..written + n].iter_mut().zip(src) {
                    *dst = convert(s);
                }
                self.offset += n;
                (n, self.offset >= data.len())
            };
            drop(data);
            written += copied;

            if exhausted {
                self.current = None;
                self.notifier.complete(index);
            }
        }

        if written < out.len() {
            out[written..].fill(silence);
            self.metrics.record_underrun();
        }
    }
}

/// Stream rate for a device offering `ranges` of `(channels, min, max)`
///
/// `wanted` when some range with the right channel count covers it,
/// otherwise the device's default rate.
fn choose_sample_rate(wanted: u32, channels: u16, ranges: &[(u16, u32, u32)], default: u32) -> u32 {
    let supported = ranges
        .iter()
        .any(|&(ch, min, max)| ch == channels && min <= wanted && wanted <= max);
    if supported { wanted } else { default }
}

fn to_f32(v: i16) -> f32 {
    fixed_to_float(v)
}

fn to_i16(v: i16) -> i16 {
    v
}

fn to_u16(v: i16) -> u16 {
    (v as i32 + 32768) as u16
}

impl CpalDriver {
    /// Open the default output device with the configured format
    pub fn open(config: &AudioConfig, ctx: DriverContext) -> AudioResult<Self> {
        let host = cpal::default_host();

        let device = host.default_output_device().ok_or_else(|| {
            AudioError::DeviceUnavailable("no audio output device available".into())
        })?;
        let name = device.name().unwrap_or_else(|_| "unknown".to_string());

        let supported = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?;

        let ranges: Vec<(u16, u32, u32)> = device
            .supported_output_configs()
            .map(|configs| {
                configs
                    .filter(|c| c.sample_format() == supported.sample_format())
                    .map(|c| (c.channels(), c.min_sample_rate().0, c.max_sample_rate().0))
                    .collect()
            })
            .unwrap_or_default();
        let sample_rate = choose_sample_rate(
            config.sample_rate,
            config.channels,
            &ranges,
            supported.sample_rate().0,
        );

        let stream_config = cpal::StreamConfig {
            channels: config.channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        // Never more than ring_depth slots in flight, so the queue cannot overflow
        let (queue, consumer) = HeapRb::<usize>::new(config.ring_depth).split();
        let mut playback = SlotPlayback {
            queue: consumer,
            ring: ctx.ring,
            notifier: ctx.notifier,
            metrics: ctx.metrics,
            current: None,
            offset: 0,
        };

        let err_fn = |err: cpal::StreamError| error!("Audio stream error: {}", err);

        let stream = match supported.sample_format() {
            cpal::SampleFormat::F32 => device.build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    playback.fill(data, to_f32, 0.0);
                },
                err_fn,
                None,
            ),
            cpal::SampleFormat::I16 => device.build_output_stream(
                &stream_config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    playback.fill(data, to_i16, 0);
                },
                err_fn,
                None,
            ),
            cpal::SampleFormat::U16 => device.build_output_stream(
                &stream_config,
                move |data: &mut [u16], _: &cpal::OutputCallbackInfo| {
                    // 0x8000 is silence for u16 audio
                    playback.fill(data, to_u16, 32768);
                },
                err_fn,
                None,
            ),
            other => {
                return Err(AudioError::UnsupportedSampleFormat(format!("{:?}", other)));
            }
        }
        .map_err(|e| AudioError::StreamBuild(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::StreamPlay(e.to_string()))?;

        info!(
            "Opened audio device '{}' ({} Hz, {} ch, {:?})",
            name,
            sample_rate,
            config.channels,
            supported.sample_format()
        );

        Ok(Self {
            queue,
            stream,
            sample_rate,
            name,
        })
    }

    /// Factory for [`crate::AudioEngine::with_driver`]
    pub fn factory() -> DriverFactory {
        Box::new(|config, ctx| Ok(Box::new(Self::open(config, ctx)?) as Box<dyn OutputDriver>))
    }
}

impl OutputDriver for CpalDriver {
    fn submit(&mut self, index: usize) -> AudioResult<()> {
        self.queue
            .try_push(index)
            .map_err(|_| AudioError::SlotRejected { slot: index })
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn stop(&mut self) {
        if let Err(e) = self.stream.pause() {
            debug!("Failed to pause audio stream: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playback(depth: usize, capacity: usize) -> (HeapProd<usize>, SlotPlayback) {
        let ring = Arc::new(OutputRing::new(depth, capacity).unwrap());
        let (prod, cons) = HeapRb::<usize>::new(depth).split();
        let playback = SlotPlayback {
            queue: cons,
            notifier: ring.notifier(),
            ring,
            metrics: Arc::new(EngineMetrics::new()),
            current: None,
            offset: 0,
        };
        (prod, playback)
    }

    fn load(ring: &OutputRing, index: usize, samples: &[i16]) {
        let mut data = ring.lock(index);
        data.block_mut()[..samples.len()].copy_from_slice(samples);
        data.set_len(samples.len());
        drop(data);
        ring.mark_in_flight(index);
    }

    #[test]
    fn test_callback_spans_slots_and_releases_them() {
        let (mut prod, mut pb) = playback(2, 4);
        load(&pb.ring, 0, &[1, 2, 3]);
        load(&pb.ring, 1, &[4, 5]);
        prod.try_push(0).unwrap();
        prod.try_push(1).unwrap();

        let mut out = [0i16; 2];
        pb.fill(&mut out, to_i16, 0);
        assert_eq!(out, [1, 2]);
        assert!(pb.ring.is_in_flight(0), "slot 0 only partly played");

        let mut out = [0i16; 3];
        pb.fill(&mut out, to_i16, 0);
        assert_eq!(out, [3, 4, 5]);
        assert_eq!(pb.ring.in_flight_count(), 0);
        assert_eq!(pb.metrics.snapshot().underruns, 0);
    }

    #[test]
    fn test_callback_pads_underrun_with_silence() {
        let (mut prod, mut pb) = playback(2, 4);
        load(&pb.ring, 0, &[-32767, 32767]);
        prod.try_push(0).unwrap();

        let mut out = [7u16; 4];
        pb.fill(&mut out, to_u16, 32768);
        assert_eq!(out, [1, 65535, 32768, 32768]);
        assert_eq!(pb.metrics.snapshot().underruns, 1);
        assert!(!pb.ring.is_in_flight(0));
    }

    #[test]
    fn test_callback_does_not_block_on_held_slot() {
        let (mut prod, mut pb) = playback(2, 4);
        load(&pb.ring, 0, &[9, 9]);
        prod.try_push(0).unwrap();

        let ring = Arc::clone(&pb.ring);
        let held = ring.lock(0);
        let mut out = [7i16; 2];
        pb.fill(&mut out, to_i16, 0);
        assert_eq!(out, [0, 0]);
        assert_eq!(pb.metrics.snapshot().underruns, 1);
        assert!(pb.ring.is_in_flight(0));
        drop(held);

        pb.fill(&mut out, to_i16, 0);
        assert_eq!(out, [9, 9]);
        assert!(!pb.ring.is_in_flight(0));
    }

    #[test]
    fn test_sample_rate_falls_back_to_device_default() {
        let ranges = [(2, 48_000, 48_000), (1, 8_000, 96_000)];
        assert_eq!(choose_sample_rate(44_100, 2, &ranges, 48_000), 48_000);
        assert_eq!(choose_sample_rate(44_100, 1, &ranges, 48_000), 44_100);
        assert_eq!(choose_sample_rate(48_000, 2, &ranges, 44_100), 48_000);
        assert_eq!(choose_sample_rate(44_100, 2, &[], 48_000), 48_000);
    }

    #[test]
    fn test_float_conversion() {
        assert_eq!(to_f32(32767), 1.0);
        assert_eq!(to_f32(0), 0.0);
        assert_eq!(to_u16(0), 32768);
    }
}
