//! Environment-variable configuration loader.
//!
//! Unlike the alerts file, runtime configuration has no on-disk form here —
//! it is defaults overridden by environment variables, per the documented
//! environment contract (`REDIS_HOST`, `MATRIX_HOST`, ...).

use std::env;

use crate::{AppConfig, ConfigError};

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn new() -> Self {
        Self
    }

    /// Builds defaults, then applies environment variable overrides.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let mut config = AppConfig::default();
        self.apply_env_overrides(&mut config);
        Ok(config)
    }

    fn apply_env_overrides(&self, config: &mut AppConfig) {
        if let Ok(val) = env::var("REDIS_HOST") {
            config.redis.host = val;
        }
        if let Ok(val) = env::var("REDIS_PORT") {
            if let Ok(port) = val.parse() {
                config.redis.port = port;
            }
        }

        if let Ok(val) = env::var("MATRIX_HOST") {
            config.matrix.host = val;
        }
        if let Ok(val) = env::var("MATRIX_USER") {
            config.matrix.user = val;
        }
        if let Ok(val) = env::var("MATRIX_PASSWORD") {
            config.matrix.password = val;
        }

        if let Ok(val) = env::var("GLASSNODE_API_KEY") {
            config.glassnode.api_key = Some(val);
        }

        if let Ok(val) = env::var("DELIVERY_INTERVAL") {
            if let Ok(minutes) = val.parse() {
                config.queue.delivery_interval_minutes = minutes;
            }
        }
        if let Ok(val) = env::var("MESSAGE_QUEUE") {
            config.queue.message_queue_url = Some(val);
        }

        if let Ok(val) = env::var("HTTP_PORT") {
            if let Ok(port) = val.parse() {
                config.http.port = port;
            }
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_env_overrides() {
        let config = AppConfig::default();
        assert_eq!(config.redis.host, "127.0.0.1");
        assert_eq!(config.redis.port, 6379);
    }
}
