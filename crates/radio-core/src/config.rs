use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::level_meter::{MeterSource, DEFAULT_BANDS, DEFAULT_DECAY};
use super::platform;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("could not serialise config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid config value: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub meter: MeterConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub mood: MoodConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Audio file to play. The CLI argument wins over this.
    #[serde(default = "default_track")]
    pub track: PathBuf,
    #[serde(default = "default_volume")]
    pub default_volume: u8,
    #[serde(default = "default_volume_step")]
    pub volume_step: u8,
    #[serde(default = "default_ramp_secs")]
    pub ramp_secs: f64,
    #[serde(default = "default_mute_ramp_secs")]
    pub mute_ramp_secs: f64,
    /// Use mpv/ffmpeg from PATH only, ignoring binaries beside the executable.
    #[serde(default)]
    pub use_system_deps: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeterConfig {
    #[serde(default = "default_bands")]
    pub bands: usize,
    #[serde(default = "default_decay")]
    pub decay: f32,
    #[serde(default)]
    pub source: MeterSource,
    /// Samples per analysis window; the spectrum has half as many bins.
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_marquee_step_ms")]
    pub marquee_step_ms: u64,
    /// Name shown in the marquee instead of the file name.
    #[serde(default)]
    pub track_label: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MoodConfig {
    /// Pin the mood to this hour instead of the wall clock.
    #[serde(default)]
    pub fixed_hour: Option<u32>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            track: default_track(),
            default_volume: default_volume(),
            volume_step: default_volume_step(),
            ramp_secs: default_ramp_secs(),
            mute_ramp_secs: default_mute_ramp_secs(),
            use_system_deps: false,
        }
    }
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            bands: default_bands(),
            decay: default_decay(),
            source: MeterSource::default(),
            fft_size: default_fft_size(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            marquee_step_ms: default_marquee_step_ms(),
            track_label: None,
        }
    }
}

fn default_track() -> PathBuf {
    PathBuf::from("audio").join("track.mp3")
}

fn default_volume() -> u8 {
    50
}

fn default_volume_step() -> u8 {
    10
}

fn default_ramp_secs() -> f64 {
    0.02
}

fn default_mute_ramp_secs() -> f64 {
    0.05
}

fn default_bands() -> usize {
    DEFAULT_BANDS
}

fn default_decay() -> f32 {
    DEFAULT_DECAY
}

fn default_fft_size() -> usize {
    256
}

fn default_fps() -> u32 {
    30
}

fn default_marquee_step_ms() -> u64 {
    250
}

impl Config {
    /// Load from the default location, writing defaults on first run.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(io_err)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.player.default_volume > 100 {
            return Err(ConfigError::Invalid(format!(
                "player.default_volume must be 0-100, got {}",
                self.player.default_volume
            )));
        }
        if self.player.volume_step == 0 || self.player.volume_step > 100 {
            return Err(ConfigError::Invalid(format!(
                "player.volume_step must be 1-100, got {}",
                self.player.volume_step
            )));
        }
        if !(0.0..=5.0).contains(&self.player.ramp_secs)
            || !(0.0..=5.0).contains(&self.player.mute_ramp_secs)
        {
            return Err(ConfigError::Invalid(
                "player ramp times must be between 0 and 5 seconds".to_string(),
            ));
        }
        if self.meter.bands == 0 || self.meter.bands > 20 {
            // The EQ row of the panel has room for 20 glyphs.
            return Err(ConfigError::Invalid(format!(
                "meter.bands must be 1-20, got {}",
                self.meter.bands
            )));
        }
        if !(0.0..1.0).contains(&self.meter.decay) {
            return Err(ConfigError::Invalid(format!(
                "meter.decay must be in [0, 1), got {}",
                self.meter.decay
            )));
        }
        if !self.meter.fft_size.is_power_of_two() || self.meter.fft_size < 32 {
            return Err(ConfigError::Invalid(format!(
                "meter.fft_size must be a power of two >= 32, got {}",
                self.meter.fft_size
            )));
        }
        if self.display.fps == 0 || self.display.fps > 120 {
            return Err(ConfigError::Invalid(format!(
                "display.fps must be 1-120, got {}",
                self.display.fps
            )));
        }
        if let Some(h) = self.mood.fixed_hour {
            if h > 23 {
                return Err(ConfigError::Invalid(format!(
                    "mood.fixed_hour must be 0-23, got {h}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.player.default_volume, 50);
        assert_eq!(config.player.volume_step, 10);
        assert_eq!(config.meter.bands, 20);
        assert_eq!(config.meter.source, MeterSource::Spectrum);
        assert_eq!(config.display.fps, 30);
        assert!(config.player.track.ends_with("track.mp3"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [meter]
            source = "waveform"
            decay = 0.5

            [mood]
            fixed_hour = 19
            "#,
        )
        .unwrap();
        assert_eq!(config.meter.source, MeterSource::Waveform);
        assert_eq!(config.meter.decay, 0.5);
        assert_eq!(config.meter.bands, 20);
        assert_eq!(config.player.default_volume, 50);
        assert_eq!(config.mood.fixed_hour, Some(19));
    }

    #[test]
    fn rejects_out_of_range() {
        let mut config = Config::default();
        config.mood.fixed_hour = Some(24);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.meter.bands = 21;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.meter.fft_size = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn first_load_writes_defaults() {
        let dir = std::env::temp_dir().join(format!("ascii-radio-cfg-{}", std::process::id()));
        let path = dir.join("config.toml");
        let _ = std::fs::remove_file(&path);

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.display.marquee_step_ms, 250);
        assert!(path.exists());

        let again = Config::load_from(&path).unwrap();
        assert_eq!(again.player.volume_step, config.player.volume_step);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
