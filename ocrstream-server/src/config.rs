//! Layered configuration: an optional `ocrstream.toml` file provides
//! defaults, and CLI flags (see [`crate::cli::Cli`]) override individual
//! fields. A missing config file silently falls back to built-in
//! defaults, matching the teacher's `AppConfig::load()` behavior.

use std::path::Path;

use ocrstream_engine::PageSegmentationMode;
use ocrstream_pool::DEFAULT_CEILING_BYTES;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub governor: GovernorSettings,
    pub engine: EngineSettings,
    pub pool: PoolSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub address: String,
    pub port: u16,
    pub threads: usize,
    pub shutdown_deadline_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GovernorSettings {
    pub ceiling_bytes: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub language: String,
    pub page_segmentation_mode: i32,
    pub char_whitelist: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    pub rejuvenate_every_tasks: u64,
    pub rejuvenate_every_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub log_to_file: bool,
    pub log_file: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            governor: GovernorSettings::default(),
            engine: EngineSettings::default(),
            pool: PoolSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: 50051,
            threads: 4,
            shutdown_deadline_secs: 10,
        }
    }
}

impl Default for GovernorSettings {
    fn default() -> Self {
        Self {
            ceiling_bytes: DEFAULT_CEILING_BYTES,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            page_segmentation_mode: PageSegmentationMode::Auto.as_psm_value(),
            char_whitelist: String::new(),
        }
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            rejuvenate_every_tasks: 10_000,
            rejuvenate_every_secs: 0,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_to_file: false,
            log_file: "ocrstream.log".to_string(),
        }
    }
}

impl AppConfig {
    /// Loads `path` if it exists, otherwise returns built-in defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            warn!(path = %path.display(), "config file not found, using default configuration");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: AppConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }
}
