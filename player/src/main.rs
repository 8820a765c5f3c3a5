//! slotmix player
//!
//! Plays a demo scene through the default output device, driving the engine
//! from a fixed-timestep frame loop.
//!
//! # Usage
//!
//! ```bash
//! slotmix-player
//! slotmix-player --scene mix --seconds 20
//! slotmix-player --scene chord --mix-mode peak --headless --unpaced
//! slotmix-player --frame-rate 30 --write-config
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use slotmix_core::{AudioEngine, CaptureDriver, CaptureLog, CompletionMode, MixMode};
use slotmix_player::config::{self, Config};
use slotmix_player::frame_loop::{self, LoopSettings, Pacing};
use slotmix_player::scene::SceneKind;

#[derive(Parser)]
#[command(name = "slotmix-player")]
#[command(author, version, about = "Frame-driven PCM streaming and mixing demo")]
struct Args {
    /// Demo scene to play (overrides the config file)
    #[arg(long, short = 's', value_enum)]
    scene: Option<SceneKind>,

    /// How long to run, in seconds
    #[arg(long)]
    seconds: Option<f32>,

    /// Record output in memory instead of opening the sound card
    #[arg(long)]
    headless: bool,

    /// Config file to use instead of the platform default
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Mixer fold mode: saturate, voices or peak
    #[arg(long)]
    mix_mode: Option<MixMode>,

    /// Host frame rate in Hz
    #[arg(long)]
    frame_rate: Option<u32>,

    /// Run ticks back to back instead of at the frame rate
    #[arg(long)]
    unpaced: bool,

    /// Save the effective settings to the config file and exit
    #[arg(long)]
    write_config: bool,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(scene) = self.scene {
            config.player.scene = scene;
        }
        if let Some(seconds) = self.seconds {
            config.player.seconds = seconds;
        }
        if let Some(mode) = self.mix_mode {
            config.audio.mix_mode = mode;
        }
        if let Some(frame_rate) = self.frame_rate {
            config.audio.frame_rate = frame_rate;
        }
    }
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => config::load_from(path)?,
        None => config::load(),
    };
    args.apply(&mut config);
    config
        .audio
        .validate()
        .context("Invalid audio settings")?;

    if args.write_config {
        let path = match &args.config {
            Some(path) => {
                config::save_to(&config, path)?;
                path.clone()
            }
            None => config::save(&config)?,
        };
        info!("Wrote {}", path.display());
        return Ok(());
    }

    // Headless runs only report totals
    let capture = CaptureLog::counting();
    let mut engine = open_engine(&config, args.headless, &capture)?;
    let mut scene = config
        .player
        .scene
        .build(&mut engine)
        .context("Failed to set up scene")?;

    let settings = LoopSettings {
        total_ticks: config.player.total_ticks(config.audio.frame_rate),
        pacing: if args.unpaced {
            Pacing::Unpaced
        } else {
            Pacing::RealTime
        },
        max_delta: config.player.max_delta(),
        cpu_budget: config.player.cpu_budget(),
        stop_when_finished: true,
    };
    let stats = frame_loop::run(&mut engine, scene.as_mut(), &settings);

    let metrics = engine.metrics();
    info!(
        "Done: {} ticks ({} errors, {} stalls, {} over budget), {} frames delivered, \
         {} underruns, avg wait {:.1}us",
        stats.ticks,
        stats.errors,
        stats.stalls,
        stats.over_budget,
        metrics.frames_delivered,
        metrics.underruns,
        metrics.avg_wait_us()
    );
    if !capture.is_empty() {
        info!(
            "Captured {} slots ({} samples) headless",
            capture.len(),
            capture.samples_submitted()
        );
    }

    engine.close().context("Audio output did not drain")?;
    Ok(())
}

/// Open the sound card, or the capture driver when headless
fn open_engine(config: &Config, headless: bool, capture: &CaptureLog) -> Result<AudioEngine> {
    let headless_engine = || {
        AudioEngine::with_driver(
            config.audio.clone(),
            CaptureDriver::factory(CompletionMode::Immediate, capture.clone()),
        )
        .context("Failed to start headless output")
    };

    if headless {
        return headless_engine();
    }

    match AudioEngine::open(config.audio.clone()) {
        Ok(engine) => Ok(engine),
        Err(e) if config.player.fallback_headless => {
            warn!("No audio output ({}), falling back to headless capture", e);
            headless_engine()
        }
        Err(e) => Err(e).context("Failed to open audio output"),
    }
}
