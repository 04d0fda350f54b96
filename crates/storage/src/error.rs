use taller_core::ExpedientId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("expedient not found: {0}")]
    NotFound(ExpedientId),

    #[error("unknown subscription handle: {0}")]
    UnknownSubscription(u64),

    #[error("core error: {0}")]
    Core(#[from] taller_core::CoreError),
}
