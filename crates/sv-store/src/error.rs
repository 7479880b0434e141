//! Error types for the state store adapter.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("redis connection error: {0}")]
    Connection(String),

    #[error("redis operation error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("window frame is malformed: {0}")]
    MalformedFrame(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
