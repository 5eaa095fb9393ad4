//! Error types for Proctor Flux

use thiserror::Error;

/// Errors that can occur while configuring or driving a proctoring session
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Failed to parse payload: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Session {0} is closed; no further events can be recorded")]
    SessionClosed(String),

    #[error("Session {0} is still running; stop it before building the final report")]
    SessionActive(String),

    #[error("Unsupported detection provider: {0}")]
    UnsupportedProvider(String),

    #[error("Event delivery failed: {0}")]
    Delivery(String),
}
