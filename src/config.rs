// config.rs
// Purpose: Startup configuration for the ingestion service, loaded once

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::{LogError, LogResult};
use crate::log_store::StoreBackend;
use crate::logging::LogFormat;

/// Keys read verbatim from the process environment. The bind host is only
/// taken from `WOODCHUCK_HOST`, since shells commonly export `HOST`.
const RAW_ENV_KEYS: [&str; 5] = ["PORT", "LOG_DIR", "LOG_FILE", "DB_DIR", "DB_FILE"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WoodchuckConfig {
    pub host: String,
    pub port: u16,
    pub backend: StoreBackend,
    pub log_dir: String,
    pub log_file: String,
    pub db_dir: String,
    pub db_file: String,
    pub live_feed: bool,
    pub feed_capacity: usize,
    pub log_format: LogFormat,
}

impl Default for WoodchuckConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            backend: StoreBackend::Csv,
            log_dir: "logs".to_string(),
            log_file: "logs.csv".to_string(),
            db_dir: "data".to_string(),
            db_file: "woodchuck.db".to_string(),
            live_feed: true,
            feed_capacity: 100,
            log_format: LogFormat::Pretty,
        }
    }
}

impl WoodchuckConfig {
    /// Defaults, then `woodchuck.toml`, then plain env keys, then `WOODCHUCK_*`.
    pub fn figment(toml_path: impl AsRef<Path>) -> Figment {
        Figment::from(Serialized::defaults(WoodchuckConfig::default()))
            .merge(Toml::file(toml_path.as_ref()))
            .merge(Env::raw().only(&RAW_ENV_KEYS))
            .merge(Env::prefixed("WOODCHUCK_"))
    }

    pub fn from_figment(figment: Figment) -> LogResult<Self> {
        let config: WoodchuckConfig = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `woodchuck.toml` (or `WOODCHUCK_CONFIG`) and the environment.
    /// Call [`load_dotenv`] first for `.env` values to take part.
    pub fn load() -> LogResult<Self> {
        let toml_path =
            std::env::var("WOODCHUCK_CONFIG").unwrap_or_else(|_| "woodchuck.toml".into());
        Self::from_figment(Self::figment(toml_path))
    }

    pub fn validate(&self) -> LogResult<()> {
        if self.port == 0 {
            return Err(LogError::config("port must be non-zero"));
        }
        if self.feed_capacity == 0 {
            return Err(LogError::config("feed_capacity must be at least 1"));
        }
        let required = match self.backend {
            StoreBackend::Csv => [("log_dir", &self.log_dir), ("log_file", &self.log_file)],
            StoreBackend::Sqlite => [("db_dir", &self.db_dir), ("db_file", &self.db_file)],
        };
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(LogError::config(format!("{name} cannot be empty")));
            }
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Export the variables of a `.env` file found in the working directory or
/// its ancestors. Returns the file used, or `None` when there is none.
pub fn load_dotenv() -> LogResult<Option<PathBuf>> {
    match dotenvy::dotenv() {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(LogError::config(format!("invalid .env file: {e}"))),
    }
}
