//! Configuration for Burnout Sentinel.

use crate::calendar::aggregator::{DEFAULT_DAYS_AHEAD, MAX_DAYS_AHEAD};
use crate::calendar::selection::CalendarSelection;
use crate::core::interventions::GeneratorConfig;
use crate::core::stress::ScoringConfig;
use crate::core::window::MAX_WINDOW_DAYS;
use crate::prediction::client::GenerativeConfig;
use crate::prediction::strategy::PredictionConfig;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scoring: ScoringConfig,
    pub interventions: GeneratorConfig,
    pub prediction: PredictionConfig,
    pub generative: GenerativeConfig,

    /// IANA zone used for the wall-clock "now" (system local zone if unset)
    pub timezone: Option<String>,

    /// Calendars analyzed when a session has not chosen any
    pub default_selection: CalendarSelection,

    /// Days of events fetched from calendar sources
    pub days_ahead: u32,

    /// Events in a typical week, for the historical comparison
    pub baseline_weekly_events: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scoring: ScoringConfig::default(),
            interventions: GeneratorConfig::default(),
            prediction: PredictionConfig::default(),
            generative: GenerativeConfig::default(),
            timezone: None,
            default_selection: CalendarSelection::default(),
            days_ahead: DEFAULT_DAYS_AHEAD,
            baseline_weekly_events: 12.0,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, using defaults if it does not exist.
    /// The API key is always taken from the environment.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
            serde_json::from_str::<Config>(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?
        } else {
            Self::default()
        };

        config.generative = config.generative.with_env_key();
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        // Ensure parent directory exists
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
            .join("burnout-sentinel")
            .join("config.json")
    }

    /// The configured zone, if any.
    pub fn zone(&self) -> Result<Option<Tz>, ConfigError> {
        match &self.timezone {
            None => Ok(None),
            Some(name) => name
                .parse::<Tz>()
                .map(Some)
                .map_err(|_| ConfigError::Invalid(format!("unknown timezone '{name}'"))),
        }
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let waking = &self.scoring.waking_hours;
        if waking.start_hour >= waking.end_hour || waking.end_hour > 24 {
            return Err(ConfigError::Invalid(format!(
                "waking hours {}-{} must satisfy start < end <= 24",
                waking.start_hour, waking.end_hour
            )));
        }
        let sleep = &self.scoring.sleep_window;
        if sleep.start_hour > 23 || sleep.end_hour > 23 {
            return Err(ConfigError::Invalid(
                "sleep window hours must be between 0 and 23".to_string(),
            ));
        }
        if !(1..=MAX_WINDOW_DAYS).contains(&self.scoring.horizon_days) {
            return Err(ConfigError::Invalid(format!(
                "horizon_days must be between 1 and {MAX_WINDOW_DAYS}, got {}",
                self.scoring.horizon_days
            )));
        }
        if !(1..=MAX_DAYS_AHEAD).contains(&self.days_ahead) {
            return Err(ConfigError::Invalid(format!(
                "days_ahead must be between 1 and {MAX_DAYS_AHEAD}, got {}",
                self.days_ahead
            )));
        }
        if self.interventions.max_interventions == 0 || self.prediction.prediction_count == 0 {
            return Err(ConfigError::Invalid(
                "intervention and prediction counts must be positive".to_string(),
            ));
        }
        self.zone()?;
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
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration, as whole seconds.
pub(crate) mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::interventions::EmptyPolicy;
    use std::time::Duration;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.scoring.waking_hours.start_hour, 7);
        assert_eq!(config.scoring.waking_hours.end_hour, 23);
        assert_eq!(config.scoring.horizon_days, 7);
        assert_eq!(config.days_ahead, 7);
        assert_eq!(config.prediction.retry.max_retries, 3);
        assert_eq!(config.prediction.retry.base_delay, Duration::from_secs(1));
        assert_eq!(config.interventions.empty_policy, EmptyPolicy::DefaultSuggestion);
        assert!(config.default_selection.contains("primary"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.timezone = Some("America/Los_Angeles".to_string());
        config.days_ahead = 14;
        config.interventions.empty_policy = EmptyPolicy::Empty;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.days_ahead, 14);
        assert_eq!(loaded.interventions.empty_policy, EmptyPolicy::Empty);
        assert_eq!(loaded.zone().unwrap(), Some(chrono_tz::America::Los_Angeles));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"baseline_weekly_events": 20, "prediction": {"retry": {"base_delay": 2}}}"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.baseline_weekly_events, 20.0);
        assert_eq!(config.prediction.retry.base_delay, Duration::from_secs(2));
        assert_eq!(config.prediction.retry.max_retries, 3);
        assert_eq!(config.prediction.prediction_count, 3);
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.days_ahead, 7);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        std::fs::write(&path, r#"{"default_selection": {"calendar_ids": []}}"#).unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::ParseError(_))
        ));

        std::fs::write(&path, r#"{"timezone": "Mars/Olympus"}"#).unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.scoring.waking_hours.start_hour = 23;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_oversized_windows() {
        let mut config = Config::default();
        config.days_ahead = u32::MAX;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.scoring.horizon_days = MAX_WINDOW_DAYS + 1;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.days_ahead = MAX_DAYS_AHEAD;
        config.scoring.horizon_days = MAX_WINDOW_DAYS;
        assert!(config.validate().is_ok());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"days_ahead": 4294967295}"#).unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_api_key_never_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.generative = config.generative.with_api_key("sk-do-not-write");
        config.save_to(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("sk-do-not-write"));
    }
}
