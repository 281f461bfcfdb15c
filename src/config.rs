//! Service configuration loaded from environment variables.
//!
//! - `EAN_HOST` - bind address (default: 0.0.0.0)
//! - `EAN_PORT` - listen port (default: 8080)
//! - `EAN_STORE` - `memory` or `redis` (default: memory)
//! - `EAN_REDIS_URL` - Redis connection string (default: redis://localhost:6379/)
//! - `EAN_MAX_CAS_ATTEMPTS` - cursor write attempts per batch (default: 5)

use std::collections::HashMap;
use thiserror::Error;

use crate::sequence_generator::DEFAULT_MAX_ATTEMPTS;

const DEFAULT_REDIS_URL: &str = "redis://localhost:6379/";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Memory,
    Redis,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub store: StoreKind,
    pub redis_url: String,
    pub max_cas_attempts: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&std::env::vars().collect())
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |name: &str| vars.get(name).map(|v| v.trim()).filter(|v| !v.is_empty());

        let port = match get("EAN_PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::InvalidEnvVar("EAN_PORT".into(), raw.to_string()))?,
            None => 8080,
        };

        let store = match get("EAN_STORE").map(str::to_ascii_lowercase).as_deref() {
            None | Some("memory") => StoreKind::Memory,
            Some("redis") => StoreKind::Redis,
            Some(other) => {
                return Err(ConfigError::InvalidEnvVar("EAN_STORE".into(), other.to_string()))
            }
        };

        let max_cas_attempts = match get("EAN_MAX_CAS_ATTEMPTS") {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|n| *n >= 1)
                .ok_or_else(|| ConfigError::InvalidEnvVar("EAN_MAX_CAS_ATTEMPTS".into(), raw.to_string()))?,
            None => DEFAULT_MAX_ATTEMPTS,
        };

        Ok(AppConfig {
            host: get("EAN_HOST").unwrap_or("0.0.0.0").to_string(),
            port,
            store,
            redis_url: get("EAN_REDIS_URL").unwrap_or(DEFAULT_REDIS_URL).to_string(),
            max_cas_attempts,
        })
    }
}
