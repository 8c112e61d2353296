//! Configuration file loading
//!
//! NeuroFlash reads an optional `neuroflash.toml`:
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 3000
//! allowed_origins = ["http://localhost:5173"]
//! static_dir = "ui/dist"
//! leaderboard_refresh_minutes = 15
//!
//! [study]
//! new_cards_per_day = 20
//! max_reviews_per_day = 100
//! learning_steps = "1,10"
//! ease_bonus = 1.3
//! ```
//!
//! Every key is optional. Command-line flags and environment variables are
//! applied on top by the binaries.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::StudySettings;

/// Default database location (`<data dir>/neuroflash/neuroflash.db`)
pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("neuroflash")
        .join("neuroflash.db")
}

/// Default config file location (`<config dir>/neuroflash/neuroflash.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("neuroflash").join("neuroflash.toml"))
}

/// Server settings
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub static_dir: Option<PathBuf>,
    /// Minutes between leaderboard snapshot refreshes (None disables the task)
    pub leaderboard_refresh_minutes: Option<u64>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            allowed_origins: Vec::new(),
            static_dir: None,
            leaderboard_refresh_minutes: None,
        }
    }
}

/// Defaults for users who have not saved their own study settings
pub type StudySection = StudySettings;

/// Parsed configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppConfig {
    pub server: ServerSection,
    pub study: StudySection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    server: Option<RawServer>,
    study: Option<RawStudy>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawServer {
    host: Option<String>,
    port: Option<u16>,
    allowed_origins: Option<Vec<String>>,
    static_dir: Option<PathBuf>,
    leaderboard_refresh_minutes: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStudy {
    new_cards_per_day: Option<i64>,
    max_reviews_per_day: Option<i64>,
    learning_steps: Option<String>,
    ease_bonus: Option<f64>,
}

impl AppConfig {
    /// Load from `path`, or the default location when `path` is None
    ///
    /// A missing default file yields defaults. A missing explicit file is an
    /// error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let content = fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("Failed to read {}: {}", path.display(), e))
                })?;
                Self::parse(&content)
            }
            None => match default_config_path() {
                Some(default_path) if default_path.exists() => {
                    let content = fs::read_to_string(&default_path)?;
                    Self::parse(&content)
                }
                _ => Ok(Self::default()),
            },
        }
    }

    /// Parse TOML content
    pub fn parse(content: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

        let mut config = Self::default();

        if let Some(server) = raw.server {
            if let Some(host) = server.host {
                config.server.host = host;
            }
            if let Some(port) = server.port {
                config.server.port = port;
            }
            if let Some(origins) = server.allowed_origins {
                config.server.allowed_origins = origins;
            }
            config.server.static_dir = server.static_dir;
            config.server.leaderboard_refresh_minutes =
                server.leaderboard_refresh_minutes.filter(|m| *m > 0);
        }

        if let Some(study) = raw.study {
            let s = &mut config.study;
            if let Some(n) = study.new_cards_per_day {
                s.new_cards_per_day = n;
            }
            if let Some(n) = study.max_reviews_per_day {
                s.max_reviews_per_day = n;
            }
            if let Some(steps) = study.learning_steps {
                s.learning_steps = steps;
            }
            if let Some(bonus) = study.ease_bonus {
                s.ease_bonus = bonus;
            }
            s.validate()
                .map_err(|e| Error::Config(format!("[study] {}", e)))?;
        }

        Ok(config)
    }
}
