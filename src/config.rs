//! Startup configuration.
//!
//! Read once before a session starts; nothing here changes while playing.

use crate::core::difficulty::{Difficulty, DifficultyTable};
use crate::core::feedback::FeedbackConfig;
use crate::sensing::filter::FilterConfig;
use crate::sensing::gesture::GestureConfig;
use crate::sensing::input::InputConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Largest accepted difficulty timeout multiplier.
pub const MAX_TIMEOUT_MULTIPLIER: f32 = 100.0;

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub filter: FilterConfig,
    pub gesture: GestureConfig,
    pub input: InputConfig,
    pub difficulty: DifficultyTable,
    pub feedback: FeedbackConfig,

    /// Length of one scheduling tick
    #[serde(with = "millis")]
    pub tick_interval: Duration,

    /// Event bus queue depth
    pub bus_capacity: usize,

    /// Directory for the leaderboard and session reports
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fogline");

        Self {
            filter: FilterConfig::default(),
            gesture: GestureConfig::default(),
            input: InputConfig::default(),
            difficulty: DifficultyTable::default(),
            feedback: FeedbackConfig::default(),
            tick_interval: Duration::from_millis(10),
            bus_capacity: crate::core::bus::DEFAULT_BUS_CAPACITY,
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load from `path`, falling back to defaults when the file is absent.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Reject values the tick loop cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval.is_zero() {
            return Err(ConfigError::Invalid("tick_interval must be positive".to_string()));
        }
        if self.filter.calibration_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "filter.calibration_interval must be positive".to_string(),
            ));
        }
        let alpha = self.filter.alpha;
        if !(alpha.is_finite() && alpha > 0.0 && alpha <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "filter.alpha must be in (0, 1], got {alpha}"
            )));
        }
        if self.bus_capacity == 0 {
            return Err(ConfigError::Invalid("bus_capacity must be positive".to_string()));
        }
        for difficulty in Difficulty::ALL {
            let multiplier = self.difficulty.profile(difficulty).timeout_multiplier;
            if !(multiplier.is_finite() && multiplier > 0.0 && multiplier <= MAX_TIMEOUT_MULTIPLIER)
            {
                return Err(ConfigError::Invalid(format!(
                    "difficulty.{} timeout_multiplier must be in (0, {MAX_TIMEOUT_MULTIPLIER}], got {multiplier}",
                    difficulty.label().to_lowercase()
                )));
            }
        }
        Ok(())
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fogline")
            .join("config.json")
    }

    pub fn highscores_path(&self) -> PathBuf {
        self.data_path.join("highscores.txt")
    }

    pub fn sessions_path(&self) -> PathBuf {
        self.data_path.join("sessions")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        std::fs::create_dir_all(self.sessions_path())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::Invalid(e) => write!(f, "Invalid config: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration as integer milliseconds.
pub mod millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}

/// Same as [`millis`], for optional durations.
pub mod millis_opt {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration
            .map(|d| d.as_millis() as u64)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = Option::<u64>::deserialize(deserializer)?;
        Ok(ms.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.tick_interval, Duration::from_millis(10));
        assert_eq!(config.bus_capacity, 256);
        assert_eq!(config.filter.alpha, 0.3);
        assert_eq!(config.gesture.tap_threshold, 20.0);
        assert_eq!(config.input.debounce_window, Duration::from_millis(15));
        assert_eq!(config.feedback.duration, Duration::from_secs(3));
        assert!(config.highscores_path().ends_with("fogline/highscores.txt"));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"tick_interval": 20, "input": {"debounce_window": 12, "rhythm_repeat_gate": 150, "pulses_per_detent": 3}}"#)
                .unwrap();
        assert_eq!(config.tick_interval, Duration::from_millis(20));
        assert_eq!(config.input.pulses_per_detent, 3);
        assert_eq!(config.input.debounce_window, Duration::from_millis(12));
        assert_eq!(config.filter.calibration_window, Duration::from_secs(1));
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir()
            .join(format!("fogline-config-{}", uuid::Uuid::new_v4()))
            .join("config.json");
        let mut config = Config::default();
        config.gesture.tilt_threshold = 3.0;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.gesture.tilt_threshold, 3.0);
        assert_eq!(loaded.filter.calibration_interval, Duration::from_millis(10));

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn test_nested_partial_file_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"filter": {"alpha": 0.5}}"#).unwrap();
        assert_eq!(config.filter.alpha, 0.5);
        assert_eq!(config.filter.calibration_interval, Duration::from_millis(10));
        assert_eq!(config.filter.sensor_range, 156.9);

        let config: Config = serde_json::from_str(
            r#"{"gesture": {"tap_threshold": 25.0}, "input": {"pulses_per_detent": 4}, "feedback": {}, "difficulty": {"hard": {"timeout_multiplier": 0.75, "retry_budget": 1, "hint_verbosity": "silent"}}}"#,
        )
        .unwrap();
        assert_eq!(config.gesture.tap_threshold, 25.0);
        assert_eq!(config.gesture.tilt_threshold, 2.5);
        assert_eq!(config.input.pulses_per_detent, 4);
        assert_eq!(config.input.debounce_window, Duration::from_millis(15));
        assert_eq!(config.feedback.duration, Duration::from_secs(3));
        assert_eq!(config.difficulty.hard.timeout_multiplier, 0.75);
        assert_eq!(config.difficulty.easy.timeout_multiplier, 1.5);
    }

    fn load_json(json: &str) -> Result<Config, ConfigError> {
        let path = std::env::temp_dir().join(format!("fogline-config-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, json).unwrap();
        let result = Config::load_from(&path);
        let _ = std::fs::remove_file(&path);
        result
    }

    fn assert_invalid(json: &str) {
        match load_json(json) {
            Err(ConfigError::Invalid(_)) => {}
            other => panic!("{json} gave {other:?}"),
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
        assert!(load_json(r#"{"filter": {"alpha": 1.0}}"#).is_ok());
    }

    #[test]
    fn test_zero_tick_interval_rejected() {
        assert_invalid(r#"{"tick_interval": 0}"#);
    }

    #[test]
    fn test_zero_calibration_interval_rejected() {
        assert_invalid(r#"{"filter": {"calibration_interval": 0}}"#);
    }

    #[test]
    fn test_alpha_out_of_range_rejected() {
        assert_invalid(r#"{"filter": {"alpha": 0.0}}"#);
        assert_invalid(r#"{"filter": {"alpha": -0.2}}"#);
        assert_invalid(r#"{"filter": {"alpha": 1.5}}"#);

        let mut config = Config::default();
        config.filter.alpha = f32::NAN;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_bus_capacity_rejected() {
        assert_invalid(r#"{"bus_capacity": 0}"#);
    }

    #[test]
    fn test_bad_timeout_multiplier_rejected() {
        for multiplier in ["0.0", "-1.0", "1e30"] {
            assert_invalid(&format!(
                r#"{{"difficulty": {{"easy": {{"timeout_multiplier": {multiplier}, "retry_budget": 2, "hint_verbosity": "full"}}}}}}"#
            ));
        }

        let mut config = Config::default();
        config.difficulty.medium.timeout_multiplier = f32::INFINITY;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        config.difficulty.medium.timeout_multiplier = f32::NAN;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_file_is_default() {
        let path = std::env::temp_dir().join(format!("fogline-missing-{}.json", uuid::Uuid::new_v4()));
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.bus_capacity, 256);
    }
}
