use attendlog_core::EntityKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("{kind} has no field '{field}'")]
    UnknownField { kind: EntityKind, field: String },

    #[error("{0} row image has no id")]
    MissingId(EntityKind),

    #[error("core error: {0}")]
    Core(#[from] attendlog_core::CoreError),
}
