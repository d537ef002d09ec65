//! Scheduler and generator configuration
//!
//! Loaded once at startup from `config.toml`. Every field has a default, so
//! an absent file or a partial file is valid:
//!
//! ```toml
//! [scheduler]
//! default_ease = 2.5
//! graduating_interval = 1
//! easy_interval = 4
//! learning_steps = [1, 10]
//!
//! [generator]
//! model = "gemini-2.5-flash"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::algorithm::MIN_EASE;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("learning_steps must contain at least one step")]
    EmptyLearningSteps,

    #[error("learning step {index} must be at least one minute")]
    ZeroLearningStep { index: usize },

    #[error("default_ease {0} is below the minimum of 1.3")]
    EaseBelowMinimum(f64),

    #[error("{0} must be at least one day")]
    ZeroInterval(&'static str),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Process-wide scheduling parameters. Read-only once validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Ease given to new cards
    pub default_ease: f64,
    /// Interval in days after graduating with Good
    pub graduating_interval: u32,
    /// Interval in days after graduating with Easy
    pub easy_interval: u32,
    /// Learning-step ladder in minutes
    pub learning_steps: Vec<u32>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_ease: 2.5,
            graduating_interval: 1,
            easy_interval: 4,
            learning_steps: vec![1, 10],
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.learning_steps.is_empty() {
            return Err(ConfigError::EmptyLearningSteps);
        }
        if let Some(index) = self.learning_steps.iter().position(|&m| m == 0) {
            return Err(ConfigError::ZeroLearningStep { index });
        }
        if self.default_ease.is_nan() || self.default_ease < MIN_EASE {
            return Err(ConfigError::EaseBelowMinimum(self.default_ease));
        }
        if self.graduating_interval == 0 {
            return Err(ConfigError::ZeroInterval("graduating_interval"));
        }
        if self.easy_interval == 0 {
            return Err(ConfigError::ZeroInterval("easy_interval"));
        }
        Ok(())
    }
}

/// Settings for the content-generation service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// API key; falls back to the `GEMINI_API_KEY` environment variable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    /// Cards requested when the caller does not say
    pub default_count: usize,
    /// Input text is cut to this many characters before sending
    pub max_input_chars: usize,
    pub timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            default_count: 5,
            max_input_chars: 10_000,
            timeout_secs: 120,
        }
    }
}

impl GeneratorConfig {
    /// Key from config, else from the environment
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scheduler: SchedulerConfig,
    pub generator: GeneratorConfig,
}

impl AppConfig {
    /// Load configuration with fallback chain.
    ///
    /// Search order:
    /// 1. Explicit path if provided (must exist)
    /// 2. `config.toml` in the data directory
    /// 3. Defaults
    ///
    /// The scheduler section is validated before returning.
    pub fn load(explicit: Option<&Path>, data_dir: &Path) -> Result<Self> {
        let config = if let Some(path) = explicit {
            Self::load_from_file(path)?
        } else {
            let default_path = data_dir.join("config.toml");
            if default_path.exists() {
                log::info!("Loaded config from {}", default_path.display());
                Self::load_from_file(&default_path)?
            } else {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        };

        config.scheduler.validate()?;
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SchedulerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_empty_steps_rejected() {
        let config = SchedulerConfig {
            learning_steps: vec![],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::EmptyLearningSteps)));
    }

    #[test]
    fn test_zero_step_rejected() {
        let config = SchedulerConfig {
            learning_steps: vec![1, 0, 10],
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroLearningStep { index: 1 })
        ));
    }

    #[test]
    fn test_low_default_ease_rejected() {
        let config = SchedulerConfig {
            default_ease: 1.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::EaseBelowMinimum(_))));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = AppConfig::from_toml("[scheduler]\nlearning_steps = [1, 5, 15]\n").unwrap();
        assert_eq!(config.scheduler.learning_steps, vec![1, 5, 15]);
        assert_eq!(config.scheduler.graduating_interval, 1);
        assert_eq!(config.scheduler.easy_interval, 4);
        assert_eq!(config.generator.model, "gemini-2.5-flash");
    }

    #[test]
    fn test_load_without_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let config = AppConfig::load(None, temp.path()).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_load_rejects_empty_ladder() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("config.toml"),
            "[scheduler]\nlearning_steps = []\n",
        )
        .unwrap();
        let result = AppConfig::load(None, temp.path());
        assert!(matches!(result, Err(ConfigError::EmptyLearningSteps)));
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope.toml");
        assert!(matches!(
            AppConfig::load(Some(&missing), temp.path()),
            Err(ConfigError::Io { .. })
        ));
    }
}
