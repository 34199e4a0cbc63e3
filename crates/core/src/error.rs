use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("unknown log action: {0}")]
    UnknownAction(String),

    #[error("unknown log mode: {0}")]
    UnknownMode(String),

    #[error("invalid data: {0}")]
    InvalidData(String),
}
