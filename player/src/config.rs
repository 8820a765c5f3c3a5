//! Player configuration (`config.toml` in the platform config directory)
//!
//! The `[audio]` table is the engine's [`AudioConfig`]; `[player]` holds
//! settings for the frame loop and scene selection. Command-line flags
//! override whatever the file says.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use slotmix_core::AudioConfig;

use crate::scene::SceneKind;

const CONFIG_FILE: &str = "config.toml";

/// Everything read from `config.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Engine settings
    #[serde(default)]
    pub audio: AudioConfig,
    /// Frame loop and scene settings
    #[serde(default)]
    pub player: PlayerConfig,
}

/// Frame loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Scene played when none is given on the command line (default: tone)
    #[serde(default)]
    pub scene: SceneKind,
    /// How long to run, in seconds (default: 10)
    #[serde(default = "default_seconds")]
    pub seconds: f32,
    /// Use the capture driver when no output device can be opened (default: false)
    #[serde(default)]
    pub fallback_headless: bool,
    /// Largest frame delta fed to the accumulator, in ms (default: 100)
    #[serde(default = "default_max_delta_ms")]
    pub max_delta_ms: u64,
    /// Tick time above which a warning is logged, in µs (default: 4000)
    #[serde(default = "default_cpu_budget_us")]
    pub cpu_budget_us: u64,
}

fn default_seconds() -> f32 {
    10.0
}
fn default_max_delta_ms() -> u64 {
    100
}
fn default_cpu_budget_us() -> u64 {
    4000
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            scene: SceneKind::default(),
            seconds: default_seconds(),
            fallback_headless: false,
            max_delta_ms: default_max_delta_ms(),
            cpu_budget_us: default_cpu_budget_us(),
        }
    }
}

impl PlayerConfig {
    pub fn max_delta(&self) -> Duration {
        Duration::from_millis(self.max_delta_ms)
    }

    pub fn cpu_budget(&self) -> Duration {
        Duration::from_micros(self.cpu_budget_us)
    }

    /// Number of frame-loop ticks covering `seconds` at `frame_rate`
    pub fn total_ticks(&self, frame_rate: u32) -> u64 {
        (self.seconds.max(0.0) as f64 * frame_rate as f64).round() as u64
    }
}

/// Platform config directory
///
/// On Linux: `~/.config/slotmix`
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io.slotmix", "", "slotmix")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Default location of `config.toml`
pub fn default_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(CONFIG_FILE))
}

/// Load from an explicit file
///
/// A missing file yields defaults. Unreadable or invalid files are errors.
pub fn load_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        debug!("No config at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config: Config =
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;
    config
        .audio
        .validate()
        .with_context(|| format!("Invalid [audio] section in {}", path.display()))?;
    Ok(config)
}

/// Load from the platform config directory, falling back to defaults
pub fn load() -> Config {
    let Some(path) = default_path() else {
        return Config::default();
    };
    match load_from(&path) {
        Ok(config) => config,
        Err(e) => {
            warn!("Ignoring config file: {:#}", e);
            Config::default()
        }
    }
}

/// Write `config` to `path`, creating parent directories
pub fn save_to(config: &Config, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

/// Write `config` to the platform config directory
pub fn save(config: &Config) -> Result<PathBuf> {
    let path = default_path().context("No config directory on this platform")?;
    save_to(config, &path)?;
    Ok(path)
}
