//! Configuration for the signal deviation alerting service.
//!
//! Two independent things live here: the runtime [`AppConfig`] (Redis
//! connection, Matrix credentials, pacing knobs — all sourced from
//! environment variables, per the service's documented environment
//! contract) and the alerts file loader, which parses the YAML alert
//! definitions into [`sv_common::Alert`] records.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

mod alerts_file;
mod loader;

pub use alerts_file::{load_alerts_file, AlertSpec, ConditionSpec};
pub use loader::ConfigLoader;

/// Configuration error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("failed to parse alerts YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    ValidationError(String),
}

/// Runtime configuration, built by [`ConfigLoader::load`] from environment
/// variables. There is no file-based form for this half of configuration —
/// the service's only file input is the alerts YAML (see [`alerts_file`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub redis: RedisConfig,
    pub matrix: MatrixEnvConfig,
    pub glassnode: GlassnodeConfig,
    pub queue: QueueConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            redis: RedisConfig::default(),
            matrix: MatrixEnvConfig::default(),
            glassnode: GlassnodeConfig::default(),
            queue: QueueConfig::default(),
        }
    }
}

/// Admin API HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub port: u16,
    pub host: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
        }
    }
}

/// Redis connection settings. `REDIS_HOST` / `REDIS_PORT` per the
/// documented environment contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
        }
    }
}

impl RedisConfig {
    pub fn url(&self) -> String {
        format!("redis://{}:{}", self.host, self.port)
    }
}

/// Matrix credentials for the queue worker (`MATRIX_USER`, `MATRIX_PASSWORD`,
/// `MATRIX_HOST`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MatrixEnvConfig {
    pub host: String,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: String,
}

/// `GLASSNODE_API_KEY`, required by the `btc_stock_to_flow` sampler.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GlassnodeConfig {
    pub api_key: Option<String>,
}

/// Adaptive pacing and remote-enqueue settings for the queue worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// `DELIVERY_INTERVAL` minutes (default 5), used to compute the
    /// adaptive per-iteration pacing sleep.
    pub delivery_interval_minutes: u64,
    /// `MESSAGE_QUEUE` URL, used when the Matrix sink enqueues over HTTP
    /// to a remote queue service rather than directly against Redis.
    pub message_queue_url: Option<String>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            delivery_interval_minutes: 5,
            message_queue_url: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        ConfigLoader::new().load()
    }
}

/// Load alert specifications from a YAML file on disk and turn them into
/// fully-hashed [`sv_common::Alert`] records (see [`alerts_file`]).
pub fn load_alerts<P: AsRef<Path>>(path: P) -> Result<Vec<sv_common::Alert>, ConfigError> {
    alerts_file::load_alerts_file(path)
}
