//! Fixed-timestep frame loop
//!
//! Wall time is accumulated and spent in whole ticks of `1 / frame_rate`
//! seconds; each tick runs the scene once. Per-tick errors are logged and the
//! loop carries on, so a stalled or missing device never takes the host down.

use std::thread;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use slotmix_core::{AudioEngine, AudioError};

use crate::scene::Scene;

/// Fixed-timestep accumulator
#[derive(Debug, Clone)]
pub struct FrameClock {
    tick_duration: Duration,
    max_delta: Duration,
    accumulator: Duration,
    last_update: Option<Instant>,
}

impl FrameClock {
    pub fn new(frame_rate: u32, max_delta: Duration) -> Self {
        Self {
            tick_duration: Duration::from_secs_f64(1.0 / frame_rate.max(1) as f64),
            max_delta,
            accumulator: Duration::ZERO,
            last_update: None,
        }
    }

    pub fn tick_duration(&self) -> Duration {
        self.tick_duration
    }

    /// Account for wall time up to `now` and return how many ticks are due
    ///
    /// The first call counts as exactly one tick. Deltas above `max_delta`
    /// are clamped so a long hitch does not trigger a catch-up burst.
    pub fn advance(&mut self, now: Instant) -> u32 {
        let delta = match self.last_update {
            Some(last) => now.saturating_duration_since(last).min(self.max_delta),
            None => self.tick_duration,
        };
        self.last_update = Some(now);
        self.accumulator += delta;

        let mut ticks = 0;
        while self.accumulator >= self.tick_duration {
            self.accumulator -= self.tick_duration;
            ticks += 1;
        }
        ticks
    }

    /// Fraction of a tick left in the accumulator
    pub fn alpha(&self) -> f32 {
        self.accumulator.as_secs_f32() / self.tick_duration.as_secs_f32()
    }

    /// Wall time until the next tick is due
    pub fn until_next_tick(&self) -> Duration {
        self.tick_duration.saturating_sub(self.accumulator)
    }
}

/// How ticks are spaced in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// Ticks follow the wall clock at the engine frame rate
    RealTime,
    /// Ticks run back to back; the engine's ring wait is the only throttle
    Unpaced,
}

/// Frame loop settings
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub total_ticks: u64,
    pub pacing: Pacing,
    pub max_delta: Duration,
    pub cpu_budget: Duration,
    /// End early once the scene reports it has nothing left to play
    pub stop_when_finished: bool,
}

/// What happened over a whole run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub ticks: u64,
    /// Ticks that failed with an error other than a stall
    pub errors: u64,
    /// Ticks that gave up waiting for a ring slot
    pub stalls: u64,
    /// Ticks whose own work (ring waits excluded) exceeded the CPU budget
    pub over_budget: u64,
}

/// Run `scene` on `engine` for up to `settings.total_ticks` ticks
pub fn run(engine: &mut AudioEngine, scene: &mut dyn Scene, settings: &LoopSettings) -> LoopStats {
    let mut clock = FrameClock::new(engine.config().frame_rate, settings.max_delta);
    let mut stats = LoopStats::default();

    info!(
        "Running scene '{}' for {} ticks ({:?} each)",
        scene.name(),
        settings.total_ticks,
        clock.tick_duration()
    );

    while stats.ticks < settings.total_ticks {
        let due = match settings.pacing {
            Pacing::Unpaced => 1,
            Pacing::RealTime => {
                let due = clock.advance(Instant::now());
                if due == 0 {
                    thread::sleep(clock.until_next_tick());
                    continue;
                }
                due
            }
        };

        for _ in 0..due {
            if stats.ticks >= settings.total_ticks {
                break;
            }
            run_tick(engine, scene, settings.cpu_budget, &mut stats);
        }

        if settings.stop_when_finished && scene.is_finished(engine) {
            info!("Scene '{}' finished after {} ticks", scene.name(), stats.ticks);
            break;
        }
    }

    stats
}

fn run_tick(
    engine: &mut AudioEngine,
    scene: &mut dyn Scene,
    cpu_budget: Duration,
    stats: &mut LoopStats,
) {
    let tick_start = Instant::now();
    let waited_before = engine.metrics().wait_time_us;

    match scene.tick(engine) {
        Ok(()) => {}
        Err(e @ AudioError::DeviceStalled { .. }) => {
            stats.stalls += 1;
            warn!("Tick {}: {}", stats.ticks, e);
        }
        Err(e) => {
            stats.errors += 1;
            error!("Tick {}: {}", stats.ticks, e);
        }
    }
    stats.ticks += 1;

    // Waiting on the device is backpressure, not work
    let waited = Duration::from_micros(engine.metrics().wait_time_us - waited_before);
    let tick_time = tick_start.elapsed().saturating_sub(waited);
    if tick_time > cpu_budget {
        stats.over_budget += 1;
        warn!("Tick took {:?}, exceeds budget of {:?}", tick_time, cpu_budget);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneKind;
    use slotmix_core::{AudioConfig, CaptureDriver, CaptureLog, CompletionMode};

    fn settings(total_ticks: u64) -> LoopSettings {
        LoopSettings {
            total_ticks,
            pacing: Pacing::Unpaced,
            max_delta: Duration::from_millis(100),
            cpu_budget: Duration::from_secs(1),
            stop_when_finished: false,
        }
    }

    fn engine_with(config: AudioConfig, mode: CompletionMode) -> (AudioEngine, CaptureLog) {
        let log = CaptureLog::new();
        let engine =
            AudioEngine::with_driver(config, CaptureDriver::factory(mode, log.clone())).unwrap();
        (engine, log)
    }

    #[test]
    fn test_first_advance_is_one_tick() {
        let mut clock = FrameClock::new(60, Duration::from_millis(100));
        assert_eq!(clock.advance(Instant::now()), 1);
        assert!(clock.alpha() < 1e-3);
    }

    #[test]
    fn test_advance_accumulates_partial_ticks() {
        let mut clock = FrameClock::new(50, Duration::from_millis(100));
        let start = Instant::now();
        assert_eq!(clock.advance(start), 1);

        assert_eq!(clock.advance(start + Duration::from_millis(10)), 0);
        assert!((clock.alpha() - 0.5).abs() < 1e-3);
        assert_eq!(clock.until_next_tick(), Duration::from_millis(10));

        assert_eq!(clock.advance(start + Duration::from_millis(50)), 2);
    }

    #[test]
    fn test_long_hitch_is_clamped() {
        let mut clock = FrameClock::new(50, Duration::from_millis(100));
        let start = Instant::now();
        clock.advance(start);
        // Five seconds late, but only 100 ms are credited
        assert_eq!(clock.advance(start + Duration::from_secs(5)), 5);
    }

    #[test]
    fn test_runs_requested_ticks() {
        let (mut engine, log) = engine_with(AudioConfig::default(), CompletionMode::Immediate);
        let mut scene = SceneKind::Mix.build(&mut engine).unwrap();

        let stats = run(&mut engine, scene.as_mut(), &settings(12));
        assert_eq!(stats.ticks, 12);
        assert_eq!(stats.errors, 0);
        assert_eq!(stats.stalls, 0);
        assert_eq!(log.len(), 12);
        assert_eq!(log.slots()[..5], [0usize, 1, 2, 3, 0]);
    }

    #[test]
    fn test_stops_when_scene_finishes() {
        let config = AudioConfig {
            frame_rate: 10,
            slot_headroom: 10,
            ..AudioConfig::default()
        };
        let (mut engine, log) = engine_with(config, CompletionMode::Immediate);
        let mut scene = SceneKind::Tone.build(&mut engine).unwrap();

        // One slot holds a whole second, the tone lasts ten
        let stats = run(
            &mut engine,
            scene.as_mut(),
            &LoopSettings {
                stop_when_finished: true,
                ..settings(1_000)
            },
        );
        assert_eq!(stats.ticks, 10);
        assert_eq!(log.len(), 10);
    }

    #[test]
    fn test_stalls_are_counted_and_survived() {
        let config = AudioConfig {
            ring_depth: 2,
            stall_timeout_ms: 5,
            ..AudioConfig::default()
        };
        let (mut engine, log) = engine_with(config, CompletionMode::Manual);
        let mut scene = SceneKind::Chord.build(&mut engine).unwrap();

        let stats = run(&mut engine, scene.as_mut(), &settings(5));
        assert_eq!(stats.ticks, 5);
        assert_eq!(stats.stalls, 3);
        assert_eq!(stats.errors, 0);
        assert_eq!(log.len(), 2);
        assert_eq!(engine.metrics().stalls, 3);
    }

    #[test]
    fn test_real_time_pacing_takes_wall_time() {
        let config = AudioConfig {
            frame_rate: 100,
            ..AudioConfig::default()
        };
        let (mut engine, log) = engine_with(config, CompletionMode::Immediate);
        let mut scene = SceneKind::Tone.build(&mut engine).unwrap();

        let start = Instant::now();
        let stats = run(
            &mut engine,
            scene.as_mut(),
            &LoopSettings {
                pacing: Pacing::RealTime,
                ..settings(5)
            },
        );
        assert_eq!(stats.ticks, 5);
        assert_eq!(log.len(), 5);
        // First tick is free, the other four wait 10 ms each
        assert!(start.elapsed() >= Duration::from_millis(35));
    }
}
