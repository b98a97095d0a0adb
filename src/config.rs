//! Application settings
//!
//! Every tunable the engine uses lives here and is handed to components at
//! construction. Settings are stored as TOML; a missing file is created with
//! the defaults on first start.

use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const APP_DIR: &str = "padecho";
const CONFIG_FILE: &str = "config.toml";

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub paths: PathSettings,
    pub gamepad: GamepadSettings,
    pub capture: CaptureSettings,
    pub replay: ReplaySettings,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PathSettings {
    pub recordings_dir: PathBuf,
    pub schemes_dir: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        let base = app_dir();
        Self {
            recordings_dir: base.join("recordings"),
            schemes_dir: base.join("schemes"),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct GamepadSettings {
    /// Scheme used to interpret raw channel ids
    pub name: String,
    /// Axis magnitudes below this are treated as exactly 0
    pub dead_zone: f32,
}

impl Default for GamepadSettings {
    fn default() -> Self {
        Self {
            name: "dualsense".to_string(),
            dead_zone: 0.06,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct CaptureSettings {
    /// Axis sampling period (8ms = 125Hz)
    pub poll_interval_ms: u64,
    /// Minimum time between two accepted samples of one axis role
    pub debounce_offset_ms: u64,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 8,
            debounce_offset_ms: 8,
        }
    }
}

impl CaptureSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn debounce_offset(&self) -> Duration {
        Duration::from_millis(self.debounce_offset_ms)
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ReplaySettings {
    /// Remaining time below which replay busy-waits instead of sleeping
    pub spin_threshold_us: u64,
    /// Pause between two iterations of looped replay
    pub loop_delay_ms: u64,
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self {
            spin_threshold_us: 2_000,
            loop_delay_ms: 1_000,
        }
    }
}

impl ReplaySettings {
    pub fn spin_threshold(&self) -> Duration {
        Duration::from_micros(self.spin_threshold_us)
    }

    pub fn loop_delay(&self) -> Duration {
        Duration::from_millis(self.loop_delay_ms)
    }
}

impl Settings {
    /// Default location of the settings file
    pub fn default_path() -> PathBuf {
        app_dir().join(CONFIG_FILE)
    }

    /// Loads settings from `path`, writing the defaults there first if the
    /// file does not exist yet
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("Config file not found, creating default at {}", path.display());
            let settings = Self::default();
            settings.save(path)?;
            return Ok(settings);
        }

        let content = fs::read_to_string(path)
            .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;
        let settings: Self = toml::from_str(&content)
            .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;
        settings.validate()?;

        info!("Configuration loaded from {}", path.display());
        debug!("Settings: {:?}", settings);
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| eyre!("Failed to create config directory: {}", e))?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| eyre!("Failed to serialize settings: {}", e))?;
        fs::write(path, content)
            .map_err(|e| eyre!("Failed to write config file {}: {}", path.display(), e))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.gamepad.dead_zone) {
            return Err(eyre!(
                "gamepad.dead_zone must be in [0, 1), got {}",
                self.gamepad.dead_zone
            ));
        }
        if self.capture.poll_interval_ms == 0 {
            return Err(eyre!("capture.poll_interval_ms must be greater than 0"));
        }
        if self.gamepad.name.is_empty() {
            return Err(eyre!("gamepad.name must not be empty"));
        }
        Ok(())
    }
}

fn app_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}
