//! Error types for the routing core.

use thiserror::Error;

/// Error kinds exchanged across the state backend, router and session
/// tracker. Every variant carries enough context to be diagnosed from a
/// single log line (the operation and the key involved).
#[derive(Debug, Error)]
pub enum Error {
    #[error("config invalid: {0}")]
    ConfigInvalid(String),

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("no backend available")]
    NoBackendAvailable,

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("session not deserializable: {0}")]
    SessionNotDeserializable(String),

    #[error("protocol error: {0}")]
    ProtocolError(String),

    #[error("cancelled")]
    Cancelled,

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("redis error: {0}")]
    Redis(String),
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Error::Redis(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
