//! Demo scenes driven by the frame loop

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use slotmix_core::buffer::waveform;
use slotmix_core::{AudioEngine, AudioMixer, AudioResult, BufferId};

/// Length of the long demo sounds
const SONG_SECONDS: usize = 10;

/// Available demo scenes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SceneKind {
    /// One buffer on the single-voice path, hopping between ears
    #[default]
    Tone,
    /// Background drone plus a blip retriggered by a bouncing box
    Mix,
    /// Building C major chord on the single-voice path
    Chord,
}

impl SceneKind {
    /// Allocate and start the scene's sounds on `engine`
    pub fn build(self, engine: &mut AudioEngine) -> AudioResult<Box<dyn Scene>> {
        let scene: Box<dyn Scene> = match self {
            SceneKind::Tone => Box::new(ToneScene::new(engine)?),
            SceneKind::Mix => Box::new(MixScene::new(engine)?),
            SceneKind::Chord => Box::new(ChordScene::new(engine)?),
        };
        info!("Scene '{}' ready", scene.name());
        Ok(scene)
    }
}

/// Per-frame audio logic, called once per fixed tick
pub trait Scene {
    fn name(&self) -> &'static str;

    fn tick(&mut self, engine: &mut AudioEngine) -> AudioResult<()>;

    /// True once nothing audible is left to submit
    fn is_finished(&self, engine: &AudioEngine) -> bool;
}

/// Zeroed playing-ready buffer holding `frames` frames at the engine's channel count
fn song_buffer(engine: &mut AudioEngine, frames: usize) -> AudioResult<BufferId> {
    let channels = engine.config().channels as usize;
    engine.create_buffer(frames * channels, None)
}

fn buffer_done(engine: &AudioEngine, id: BufferId) -> bool {
    engine.buffer(id).map_or(true, |b| b.is_finished())
}

// ============================================================================
// Tone
// ============================================================================

pub struct ToneScene {
    buffer: BufferId,
}

impl ToneScene {
    pub fn new(engine: &mut AudioEngine) -> AudioResult<Self> {
        let rate = engine.config().sample_rate;
        let buffer = song_buffer(engine, rate as usize * SONG_SECONDS)?;
        waveform::fill_sine_stereo_alternating(engine.buffer_mut(buffer)?, rate);
        engine.play(buffer)?;
        Ok(Self { buffer })
    }
}

impl Scene for ToneScene {
    fn name(&self) -> &'static str {
        "tone"
    }

    fn tick(&mut self, engine: &mut AudioEngine) -> AudioResult<()> {
        engine.update_buffer(self.buffer).map(|_| ())
    }

    fn is_finished(&self, engine: &AudioEngine) -> bool {
        buffer_done(engine, self.buffer)
    }
}

// ============================================================================
// Chord
// ============================================================================

pub struct ChordScene {
    buffer: BufferId,
}

impl ChordScene {
    pub fn new(engine: &mut AudioEngine) -> AudioResult<Self> {
        let rate = engine.config().sample_rate;
        let buffer = song_buffer(engine, rate as usize * SONG_SECONDS)?;
        waveform::fill_sine_mono_chord(engine.buffer_mut(buffer)?, rate);
        engine.play(buffer)?;
        Ok(Self { buffer })
    }
}

impl Scene for ChordScene {
    fn name(&self) -> &'static str {
        "chord"
    }

    fn tick(&mut self, engine: &mut AudioEngine) -> AudioResult<()> {
        engine.update_buffer(self.buffer).map(|_| ())
    }

    fn is_finished(&self, engine: &AudioEngine) -> bool {
        buffer_done(engine, self.buffer)
    }
}

// ============================================================================
// Mix
// ============================================================================

const ARENA: f32 = 600.0;
const BOX_SIZE: f32 = 40.0;

/// Box bouncing inside a square arena, reporting wall contact
#[derive(Debug, Clone, PartialEq)]
pub struct Bouncer {
    pub x: f32,
    pub y: f32,
    pub speed_x: f32,
    pub speed_y: f32,
}

impl Default for Bouncer {
    fn default() -> Self {
        Self {
            x: 10.0,
            y: 300.0,
            speed_x: 100.0,
            speed_y: -100.0,
        }
    }
}

impl Bouncer {
    /// Move by `dt` seconds; true when the box touched a wall
    pub fn step(&mut self, dt: f32) -> bool {
        self.x += self.speed_x * dt;
        self.y += self.speed_y * dt;

        let far = ARENA - BOX_SIZE;
        let mut hit = false;
        if self.x <= 0.0 || self.x >= far {
            self.speed_x = -self.speed_x;
            self.x = self.x.clamp(0.0, far);
            hit = true;
        }
        if self.y <= 0.0 || self.y >= far {
            self.speed_y = -self.speed_y;
            self.y = self.y.clamp(0.0, far);
            hit = true;
        }
        hit
    }
}

pub struct MixScene {
    mixer: AudioMixer,
    blip: BufferId,
    song: BufferId,
    bouncer: Bouncer,
    dt: f32,
    blips: u32,
}

impl MixScene {
    pub fn new(engine: &mut AudioEngine) -> AudioResult<Self> {
        let rate = engine.config().sample_rate;
        let dt = 1.0 / engine.config().frame_rate as f32;

        let blip = song_buffer(engine, rate as usize / 2)?;
        waveform::fill_sine_stereo_alternating(engine.buffer_mut(blip)?, rate);

        let song = song_buffer(engine, rate as usize * SONG_SECONDS)?;
        waveform::fill_sine_stereo_low(engine.buffer_mut(song)?, rate);

        let mut mixer = engine.create_mixer(2, None)?;
        mixer.set_voice(0, blip)?;
        mixer.set_voice(1, song)?;
        engine.play(song)?;

        Ok(Self {
            mixer,
            blip,
            song,
            bouncer: Bouncer::default(),
            dt,
            blips: 0,
        })
    }

    /// Times the blip was retriggered
    pub fn blips(&self) -> u32 {
        self.blips
    }

    pub fn mixer(&self) -> &AudioMixer {
        &self.mixer
    }
}

impl Scene for MixScene {
    fn name(&self) -> &'static str {
        "mix"
    }

    fn tick(&mut self, engine: &mut AudioEngine) -> AudioResult<()> {
        if self.bouncer.step(self.dt) {
            engine.seek_to_start(self.blip)?;
            engine.play(self.blip)?;
            self.blips += 1;
            debug!(
                "Blip #{} at ({:.0}, {:.0})",
                self.blips, self.bouncer.x, self.bouncer.y
            );
        }
        engine.update_mixer(&mut self.mixer).map(|_| ())
    }

    fn is_finished(&self, engine: &AudioEngine) -> bool {
        buffer_done(engine, self.song)
    }
}
