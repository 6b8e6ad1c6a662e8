use std::path::{Path, PathBuf};
use std::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::PcmLayout;

/// Narrator configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarratorConfig {
    /// Sample rate of the narration payloads
    pub sample_rate: u32,
    /// Channel count of the narration payloads
    pub channels: u16,
    /// Playhead refresh period; 0 leaves ticking to the host
    pub tick_interval_ms: u64,
    pub volume: f32,
    pub preferred_device: Option<String>,
}

impl Default for NarratorConfig {
    fn default() -> Self {
        Self {
            sample_rate: PcmLayout::NARRATION.sample_rate(),
            channels: PcmLayout::NARRATION.channels(),
            tick_interval_ms: 16,
            volume: 1.0,
            preferred_device: None,
        }
    }
}

impl NarratorConfig {
    /// Check values that serde cannot; clamps an out-of-range volume
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sample_rate".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.channels == 0 {
            return Err(ConfigError::InvalidValue {
                field: "channels".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if !self.volume.is_finite() {
            return Err(ConfigError::InvalidValue {
                field: "volume".to_string(),
                reason: "must be a number between 0.0 and 1.0".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.volume) {
            warn!("Volume {} out of range, clamping", self.volume);
            self.volume = self.volume.clamp(0.0, 1.0);
        }
        Ok(())
    }

    /// PCM layout narration payloads are decoded with
    pub fn pcm_layout(&self) -> Result<PcmLayout, ConfigError> {
        PcmLayout::new(self.sample_rate, self.channels).map_err(|e| ConfigError::InvalidValue {
            field: "sample_rate/channels".to_string(),
            reason: e.to_string(),
        })
    }

    /// Automatic ticker period, if enabled
    pub fn tick_interval(&self) -> Option<Duration> {
        (self.tick_interval_ms > 0).then(|| Duration::from_millis(self.tick_interval_ms))
    }
}

/// Configuration manager for loading and saving settings
pub struct ConfigManager {
    config: NarratorConfig,
    config_path: PathBuf,
}

impl ConfigManager {
    /// Load from `~/.config/storyspark/narrator.toml`
    pub fn new() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;
        Self::with_path(config_path)
    }

    /// Load from an explicit path; a missing file yields defaults
    pub fn with_path(config_path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let config_path = config_path.into();
        let config = Self::load_config(&config_path)?;
        Ok(Self {
            config,
            config_path,
        })
    }

    pub fn get_config(&self) -> &NarratorConfig {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn update_config<F>(&mut self, updater: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut NarratorConfig),
    {
        let mut updated = self.config.clone();
        updater(&mut updated);
        updated.validate()?;
        self.config = updated;
        self.save_config()
    }

    pub fn set_volume(&mut self, volume: f32) -> Result<(), ConfigError> {
        self.update_config(|config| config.volume = volume)
    }

    pub fn set_preferred_device(&mut self, device: Option<String>) -> Result<(), ConfigError> {
        self.update_config(|config| config.preferred_device = device)
    }

    pub fn set_tick_interval_ms(&mut self, interval_ms: u64) -> Result<(), ConfigError> {
        self.update_config(|config| config.tick_interval_ms = interval_ms)
    }

    pub fn reset_to_defaults(&mut self) -> Result<(), ConfigError> {
        self.config = NarratorConfig::default();
        self.save_config()
    }

    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::home_dir()
            .ok_or(ConfigError::ConfigDirNotFound)?
            .join(".config")
            .join("storyspark");

        Ok(config_dir.join("narrator.toml"))
    }

    fn load_config(path: &Path) -> Result<NarratorConfig, ConfigError> {
        if !path.exists() {
            return Ok(NarratorConfig::default());
        }

        let config_content = std::fs::read_to_string(path)?;
        let mut config: NarratorConfig = toml::from_str(&config_content)?;
        config.validate()?;

        Ok(config)
    }

    fn save_config(&self) -> Result<(), ConfigError> {
        // Ensure the parent directory exists
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let config_content = toml::to_string_pretty(&self.config)?;
        std::fs::write(&self.config_path, config_content)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("narrator.toml");
        let config_manager = ConfigManager::with_path(config_path).unwrap();
        (config_manager, temp_dir)
    }

    #[test]
    fn test_narrator_config_default() {
        let config = NarratorConfig::default();

        assert_eq!(config.sample_rate, 24_000);
        assert_eq!(config.channels, 1);
        assert_eq!(config.tick_interval_ms, 16);
        assert_eq!(config.volume, 1.0);
        assert_eq!(config.preferred_device, None);
        assert_eq!(config.pcm_layout().unwrap(), PcmLayout::NARRATION);
        assert_eq!(config.tick_interval(), Some(Duration::from_millis(16)));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let (config_manager, temp_dir) = create_test_config_manager();
        assert_eq!(config_manager.get_config(), &NarratorConfig::default());
        // Loading alone never writes
        assert!(!temp_dir.path().join("narrator.toml").exists());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("narrator.toml");
        fs::write(&config_path, "tick_interval_ms = 0\npreferred_device = \"USB DAC\"\n").unwrap();

        let config_manager = ConfigManager::with_path(&config_path).unwrap();
        let config = config_manager.get_config();
        assert_eq!(config.tick_interval(), None);
        assert_eq!(config.preferred_device.as_deref(), Some("USB DAC"));
        assert_eq!(config.sample_rate, 24_000);
    }

    #[test]
    fn test_load_invalid_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("invalid.toml");
        fs::write(&config_path, "invalid toml content [[[").unwrap();

        match ConfigManager::with_path(&config_path) {
            Err(ConfigError::DeserializationError(_)) => {}
            other => panic!("Expected DeserializationError, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_load_rejects_zero_sample_rate() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("narrator.toml");
        fs::write(&config_path, "sample_rate = 0\n").unwrap();

        match ConfigManager::with_path(&config_path) {
            Err(ConfigError::InvalidValue { field, .. }) => assert_eq!(field, "sample_rate"),
            other => panic!("Expected InvalidValue, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_volume_is_clamped_on_load_and_set() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("narrator.toml");
        fs::write(&config_path, "volume = 3.5\n").unwrap();

        let mut config_manager = ConfigManager::with_path(&config_path).unwrap();
        assert_eq!(config_manager.get_config().volume, 1.0);

        config_manager.set_volume(-0.5).unwrap();
        assert_eq!(config_manager.get_config().volume, 0.0);

        config_manager.set_volume(0.4).unwrap();
        assert_eq!(config_manager.get_config().volume, 0.4);
    }

    #[test]
    fn test_rejected_update_leaves_config_untouched() {
        let (mut config_manager, _temp_dir) = create_test_config_manager();
        let result = config_manager.update_config(|config| config.channels = 0);

        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
        assert_eq!(config_manager.get_config().channels, 1);
    }

    #[test]
    fn test_save_and_reload() {
        let (mut config_manager, _temp_dir) = create_test_config_manager();

        config_manager.set_preferred_device(Some("My DAC".to_string())).unwrap();
        config_manager.set_tick_interval_ms(33).unwrap();

        let reloaded = ConfigManager::with_path(config_manager.config_path()).unwrap();
        assert_eq!(reloaded.get_config().preferred_device, Some("My DAC".to_string()));
        assert_eq!(reloaded.get_config().tick_interval_ms, 33);
    }

    #[test]
    fn test_config_path_creation() {
        let temp_dir = TempDir::new().unwrap();
        let nested_path = temp_dir.path().join("nested").join("storyspark").join("narrator.toml");

        let mut config_manager = ConfigManager::with_path(&nested_path).unwrap();
        config_manager.reset_to_defaults().unwrap();

        assert!(nested_path.exists());
    }

    #[test]
    fn test_toml_format() {
        let config = NarratorConfig {
            volume: 0.75,
            preferred_device: Some("Nursery Speaker".to_string()),
            ..NarratorConfig::default()
        };

        let toml_string = toml::to_string_pretty(&config).unwrap();

        assert!(toml_string.contains("sample_rate = 24000"));
        assert!(toml_string.contains("tick_interval_ms = 16"));
        assert!(toml_string.contains("0.75"));
        assert!(toml_string.contains("Nursery Speaker"));
    }

    #[test]
    fn test_default_config_path() {
        // May be unavailable in environments without a home directory
        match ConfigManager::default_config_path() {
            Ok(path) => {
                assert!(path.to_string_lossy().contains("storyspark"));
                assert!(path.to_string_lossy().ends_with("narrator.toml"));
            }
            Err(ConfigError::ConfigDirNotFound) => {}
            Err(e) => panic!("Unexpected error: {}", e),
        }
    }
}
