use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ai_provider::{AIConfig, AIProvider};
use crate::memory::PersistPolicy;

/// Shortest allowed gap between proactive messages.
pub const MIN_COOLDOWN_HOURS: i64 = 2;
/// One year.
pub const MAX_COOLDOWN_HOURS: i64 = 24 * 365;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProactiveConfig {
    pub poll_interval_secs: u64,
    pub cooldown_hours: i64,
}

impl Default for ProactiveConfig {
    fn default() -> Self {
        ProactiveConfig {
            poll_interval_secs: 300,
            cooldown_hours: MIN_COOLDOWN_HOURS,
        }
    }
}

impl ProactiveConfig {
    /// Cooldown between proactive messages, clamped to the allowed range.
    pub fn cooldown(&self) -> Duration {
        Duration::hours(self.cooldown_hours.clamp(MIN_COOLDOWN_HOURS, MAX_COOLDOWN_HOURS))
    }

    fn normalize(&mut self) {
        let clamped = self.cooldown_hours.clamp(MIN_COOLDOWN_HOURS, MAX_COOLDOWN_HOURS);
        if clamped != self.cooldown_hours {
            warn!(
                configured = self.cooldown_hours,
                used = clamped,
                "cooldown_hours out of range, clamping"
            );
            self.cooldown_hours = clamped;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(skip)]
    pub data_dir: PathBuf,
    pub companion_name: String,
    pub provider: AIConfig,
    pub persist: PersistPolicy,
    pub proactive: ProactiveConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from("."),
            companion_name: "Annie".to_string(),
            provider: AIConfig::default(),
            persist: PersistPolicy::default(),
            proactive: ProactiveConfig::default(),
        }
    }
}

impl Config {
    /// Default data directory: `$AICOMPANION_DATA_DIR` or `<config_dir>/aicompanion`
    pub fn default_data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("AICOMPANION_DATA_DIR") {
            if !dir.is_empty() {
                return PathBuf::from(dir);
            }
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("aicompanion")
    }

    /// Load `config.json` from `data_dir`, writing defaults when it is
    /// missing, empty or unparsable.
    pub fn new(data_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.unwrap_or_else(Self::default_data_dir);

        std::fs::create_dir_all(&data_dir).context("Failed to create data directory")?;

        let config_path = data_dir.join("config.json");

        if config_path.exists() {
            let config_str =
                std::fs::read_to_string(&config_path).context("Failed to read config.json")?;

            if config_str.trim().is_empty() {
                warn!("Config file is empty, recreating defaults");
            } else {
                match serde_json::from_str::<Config>(&config_str) {
                    Ok(mut config) => {
                        config.data_dir = data_dir;
                        config.proactive.normalize();
                        config.apply_env(|key| std::env::var(key).ok());
                        return Ok(config);
                    }
                    Err(e) => {
                        warn!("Failed to parse existing config.json: {}", e);
                    }
                }
            }
        }

        let mut config = Config {
            data_dir,
            ..Config::default()
        };
        config.save()?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Environment variables take precedence over the file.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(provider) = lookup("AICOMPANION_PROVIDER") {
            match provider.parse::<AIProvider>() {
                Ok(provider) => self.provider.provider = provider,
                Err(e) => warn!("Ignoring AICOMPANION_PROVIDER: {}", e),
            }
        }
        if let Some(model) = lookup("AICOMPANION_MODEL") {
            self.provider.model = model;
        }
        if self.provider.provider == AIProvider::Ollama {
            if let Some(host) = lookup("OLLAMA_HOST") {
                self.provider.base_url = host;
            }
        }
        if self.provider.api_key.as_ref().map_or(true, |key| key.is_empty()) {
            self.provider.api_key = lookup("OPENAI_API_KEY");
        }
    }

    pub fn save(&self) -> Result<()> {
        let json_str = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(self.config_file(), json_str).context("Failed to write config.json")?;
        Ok(())
    }

    pub fn config_file(&self) -> PathBuf {
        self.data_dir.join("config.json")
    }

    pub fn memory_file(&self) -> PathBuf {
        self.data_dir.join("memory.json")
    }

    pub fn training_file(&self) -> PathBuf {
        self.data_dir.join("training.jsonl")
    }
}
