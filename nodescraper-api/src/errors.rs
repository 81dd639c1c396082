//! Typed failure modes the engine distinguishes from an ordinary plugin error.
//!
//! [`SystemCompatibilityError`] in particular is not a failure: the executor
//! and the `DataPlugin` contract both catch it and turn it into a `NOT_RAN`
//! result rather than `EXECUTION_FAILURE`.

use thiserror::Error;

use crate::enums::OsFamily;

#[derive(Debug, Error)]
pub enum SystemCompatibilityError {
    #[error("unsupported OS family: {0:?}")]
    UnsupportedOsFamily(OsFamily),
    #[error("unsupported SKU: {0}")]
    UnsupportedSku(String),
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("missing or invalid credentials for {0}")]
    InvalidCredentials(String),
    #[error("ssh connect failed: {0}")]
    SshConnect(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("os family probe failed: {0}")]
    OsProbe(String),
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("event description exceeds 2048 bytes ({0} bytes)")]
    DescriptionTooLarge(usize),
    #[error("event data exceeds 102400 bytes when serialized ({0} bytes)")]
    DataTooLarge(usize),
    #[error("event timestamp must be timezone-aware UTC")]
    NaiveTimestamp,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unknown built-in config: {0}")]
    UnknownBuiltin(String),
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown plugin: {0}")]
    UnknownPlugin(String),
    #[error("unknown connection manager: {0}")]
    UnknownConnectionManager(String),
    #[error("unknown result collator: {0}")]
    UnknownCollator(String),
    #[error("plugin {0} is not valid: {1}")]
    Invalid(String, String),
}
