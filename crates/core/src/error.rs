use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("order index {index} out of range (expedient has {len} orders)")]
    OrderIndexOutOfRange { index: usize, len: usize },

    #[error("field {path} expects a {expected} value")]
    FieldTypeMismatch { path: String, expected: &'static str },
}
