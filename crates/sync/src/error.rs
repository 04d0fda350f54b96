use taller_core::{CoreError, ExpedientId};
use thiserror::Error;

/// Failures reported by the invocation bridge to the storage side.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("backend rejected request: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid session config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid key chord: {0:?}")]
    InvalidChord(String),

    #[error("history capacity must be at least 1")]
    ZeroHistoryCapacity,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("expedient {0} has not been loaded yet")]
    NotLoaded(ExpedientId),

    #[error("editor for expedient {0} is closed")]
    Closed(ExpedientId),
}
