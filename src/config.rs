//! Configuration management for ReelStore Server

use serde::Deserialize;
use std::env;
use std::path::PathBuf;

use crate::transfer::DEFAULT_CHUNK_CEILING;

/// Default maximum upload size: 4 GiB
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 4 * 1024 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub transfer: TransferConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding uploaded files, created at startup if absent
    pub upload_dir: PathBuf,
    pub max_upload_bytes: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferConfig {
    /// Maximum bytes per range response
    pub chunk_ceiling: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} is not a valid value: {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            storage: StorageConfig {
                upload_dir: PathBuf::from("./uploads"),
                max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            },
            transfer: TransferConfig {
                chunk_ceiling: DEFAULT_CHUNK_CEILING,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let config = Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse_var("SERVER_PORT", defaults.server.port)?,
            },
            storage: StorageConfig {
                upload_dir: env::var("UPLOAD_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.storage.upload_dir),
                max_upload_bytes: parse_var("MAX_UPLOAD_BYTES", defaults.storage.max_upload_bytes)?,
            },
            transfer: TransferConfig {
                chunk_ceiling: parse_var("CHUNK_CEILING_BYTES", defaults.transfer.chunk_ceiling)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transfer.chunk_ceiling == 0 {
            return Err(ConfigError::Zero("CHUNK_CEILING_BYTES"));
        }
        if self.storage.max_upload_bytes == 0 {
            return Err(ConfigError::Zero("MAX_UPLOAD_BYTES"));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}
