//! TOML-based application configuration.
//!
//! Stores the roster, escalation delays, statistics tunables, chat-bridge
//! settings, and the HTTP listen port. Stored at
//! `~/.config/nightwatch/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::reminder::EscalationDelays;
use crate::roster::{Participant, Roster};
use crate::stats::StatsConfig;
use crate::store::data_dir;

/// Escalation delay configuration, in minutes per stage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EscalationConfig {
    #[serde(default = "default_first_min")]
    pub first_min: u64,
    #[serde(default = "default_second_min")]
    pub second_min: u64,
    #[serde(default = "default_final_min")]
    pub final_min: u64,
}

fn default_first_min() -> u64 {
    15
}
fn default_second_min() -> u64 {
    10
}
fn default_final_min() -> u64 {
    5
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            first_min: default_first_min(),
            second_min: default_second_min(),
            final_min: default_final_min(),
        }
    }
}

impl From<EscalationConfig> for EscalationDelays {
    fn from(c: EscalationConfig) -> Self {
        EscalationDelays::from_minutes(c.first_min, c.second_min, c.final_min)
    }
}

/// Chat-bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// The qualifying reply token, matched case-insensitively and exactly.
    #[serde(default = "default_affirmative")]
    pub affirmative: String,
    /// Outbound webhook URL; messages are logged when unset.
    #[serde(default)]
    pub webhook_url: Option<String>,
}

fn default_affirmative() -> String {
    "yes".to_string()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            affirmative: default_affirmative(),
            webhook_url: None,
        }
    }
}

/// HTTP configuration for the reporting API and reply webhook.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    3000
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/nightwatch/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// The fixed roster of tracked participants.
    #[serde(default)]
    pub roster: Vec<Participant>,
    #[serde(default)]
    pub escalation: EscalationConfig,
    #[serde(default)]
    pub stats: StatsConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

impl Config {
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("~/.config/nightwatch"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load the configuration, falling back to defaults when no file exists.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &PathBuf) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        let config: Config = toml::from_str(&raw).map_err(|e| ConfigError::LoadFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration back out as TOML.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path()?;
        let raw = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, raw).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.chat.affirmative.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "chat.affirmative".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.stats.cutoff_hour > 24 {
            return Err(ConfigError::InvalidValue {
                key: "stats.cutoff_hour".to_string(),
                message: "must be between 0 and 24".to_string(),
            });
        }
        if self.stats.target_hours <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "stats.target_hours".to_string(),
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn roster(&self) -> Roster {
        Roster::new(self.roster.clone())
    }

    pub fn delays(&self) -> EscalationDelays {
        self.escalation.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_missing() {
        let config = Config::default();
        assert_eq!(config.escalation.first_min, 15);
        assert_eq!(config.escalation.second_min, 10);
        assert_eq!(config.escalation.final_min, 5);
        assert_eq!(config.chat.affirmative, "yes");
        assert_eq!(config.http.port, 3000);
        assert!(config.roster.is_empty());
    }

    #[test]
    fn parses_roster_and_overrides() {
        let raw = r#"
            [[roster]]
            id = "212687053026"
            name = "Bilal"

            [[roster]]
            id = "212767379926"
            name = "Walid"

            [escalation]
            first_min = 1
            second_min = 1
            final_min = 1

            [chat]
            affirmative = "up"
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.roster.len(), 2);
        assert_eq!(config.roster[0].name, "Bilal");
        assert_eq!(config.chat.affirmative, "up");
        assert_eq!(
            config.delays(),
            EscalationDelays::from_minutes(1, 1, 1)
        );
        // Unspecified sections keep defaults.
        assert_eq!(config.stats.target_hours, 8.0);
    }

    #[test]
    fn rejects_empty_affirmative() {
        let raw = r#"
            [chat]
            affirmative = "  "
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert!(config.validate().is_err());
    }
}
