use attendlog_core::decision::DecisionError;
use attendlog_core::{CoreError, EntityKind, LogAction};
use attendlog_storage::StorageError;
use thiserror::Error;

/// A business rule a replayed record failed to satisfy.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0} already exists")]
    AlreadyExists(&'static str),

    #[error("Invalid {0} format")]
    InvalidFormat(&'static str),

    #[error("Level not supported")]
    LevelNotSupported,

    #[error("Class exceeded two hour mark")]
    ClassTooLong,

    #[error(transparent)]
    Decision(#[from] DecisionError),

    #[error("{action} record has no {side} image")]
    MissingImage {
        action: LogAction,
        side: &'static str,
    },

    #[error("Malformed row image: {0}")]
    MalformedImage(String),
}

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("{kind} [{action}] {source}")]
    Apply {
        kind: EntityKind,
        action: LogAction,
        source: ApplyError,
    },

    #[error("no saved system state")]
    NoSavedState,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid log file: {0}")]
    InvalidLogFile(String),
}

impl EngineError {
    /// The rule violation behind a failed replay, if that is what this is.
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Apply {
                source: ApplyError::Validation(e),
                ..
            } => Some(e),
            _ => None,
        }
    }
}
