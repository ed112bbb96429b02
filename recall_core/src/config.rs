//! Configuration file support for Recall.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/recall/config.toml`.
//! Every field has a default, so a partial file only overrides what it names.

use crate::{Error, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Tunable parameters consumed by every transition
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SchedulerConfig {
    /// Learning step durations in minutes
    #[serde(default = "default_learning_steps")]
    pub learning_steps: Vec<u32>,

    #[serde(default = "default_graduating_interval_days")]
    pub graduating_interval_days: u32,

    #[serde(default = "default_easy_interval_days")]
    pub easy_interval_days: u32,

    #[serde(default = "default_starting_ease")]
    pub starting_ease: f64,

    #[serde(default = "default_easy_bonus")]
    pub easy_bonus: f64,

    #[serde(default = "default_hard_interval_factor")]
    pub hard_interval_factor: f64,

    #[serde(default = "default_interval_modifier")]
    pub interval_modifier: f64,

    #[serde(default = "default_max_interval_days")]
    pub max_interval_days: u32,

    #[serde(default = "default_min_ease")]
    pub min_ease: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            learning_steps: default_learning_steps(),
            graduating_interval_days: default_graduating_interval_days(),
            easy_interval_days: default_easy_interval_days(),
            starting_ease: default_starting_ease(),
            easy_bonus: default_easy_bonus(),
            hard_interval_factor: default_hard_interval_factor(),
            interval_modifier: default_interval_modifier(),
            max_interval_days: default_max_interval_days(),
            min_ease: default_min_ease(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".local/share"))
            .unwrap_or_else(|| PathBuf::from("."))
    });
    base.join("recall")
}

fn default_learning_steps() -> Vec<u32> {
    vec![1, 10]
}

fn default_graduating_interval_days() -> u32 {
    1
}

fn default_easy_interval_days() -> u32 {
    4
}

fn default_starting_ease() -> f64 {
    2.5
}

fn default_easy_bonus() -> f64 {
    1.3
}

fn default_hard_interval_factor() -> f64 {
    1.2
}

fn default_interval_modifier() -> f64 {
    1.0
}

fn default_max_interval_days() -> u32 {
    36500
}

fn default_min_ease() -> f64 {
    1.3
}

impl SchedulerConfig {
    /// Reject configurations the transition function cannot honor
    pub fn validate(&self) -> Result<()> {
        if !self.min_ease.is_finite() || self.min_ease <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "min_ease must be positive, got {}",
                self.min_ease
            )));
        }

        if self.learning_steps.is_empty() {
            return Err(Error::InvalidConfig(
                "learning_steps must contain at least one step".into(),
            ));
        }

        if self.graduating_interval_days == 0 {
            return Err(Error::InvalidConfig(
                "graduating_interval_days must be at least 1".into(),
            ));
        }

        if self.max_interval_days < self.graduating_interval_days {
            return Err(Error::InvalidConfig(format!(
                "max_interval_days ({}) is shorter than graduating_interval_days ({})",
                self.max_interval_days, self.graduating_interval_days
            )));
        }

        if self.easy_interval_days == 0 || self.easy_interval_days > self.max_interval_days {
            return Err(Error::InvalidConfig(format!(
                "easy_interval_days ({}) must be within 1..={}",
                self.easy_interval_days, self.max_interval_days
            )));
        }

        if !self.starting_ease.is_finite() || self.starting_ease < self.min_ease {
            return Err(Error::InvalidConfig(format!(
                "starting_ease ({}) is below min_ease ({})",
                self.starting_ease, self.min_ease
            )));
        }

        for (name, value) in [
            ("easy_bonus", self.easy_bonus),
            ("hard_interval_factor", self.hard_interval_factor),
            ("interval_modifier", self.interval_modifier),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "{} must be a positive number, got {}",
                    name, value
                )));
            }
        }

        Ok(())
    }

    /// Duration of the learning step at `index`, if it exists
    pub fn learning_step(&self, index: usize) -> Option<Duration> {
        self.learning_steps
            .get(index)
            .map(|minutes| Duration::minutes(i64::from(*minutes)))
    }

    pub fn last_step_index(&self) -> usize {
        self.learning_steps.len().saturating_sub(1)
    }
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load and validate configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.scheduler.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            std::env::var_os("HOME")
                .map(|home| PathBuf::from(home).join(".config"))
                .unwrap_or_else(|| PathBuf::from("."))
        });
        base.join("recall").join("config.toml")
    }

    /// Save the configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
