pub mod appliers;
pub mod config;
pub mod error;
pub mod handlers;
pub mod logfile;
pub mod recovery;
pub mod replay;
pub mod restore;

pub use config::{DatabaseLocation, EngineConfig, EngineConfigBuilder};
pub use error::{ApplyError, EngineError, ValidationError};
pub use handlers::{Handler, HandlerTable};
pub use recovery::RecoveryOutcome;
pub use replay::ApplyOutcome;

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use attendlog_core::ChangeRecord;
use attendlog_storage::{SqliteStorage, Storage};

/// Front door to the change log: owns the local database handle, opened on
/// first use, and routes `apply`/`checkout` through the handler table.
///
/// Calls take `&mut self`; two engines must not share one database file.
pub struct Engine {
    config: EngineConfig,
    storage: Option<SqliteStorage>,
    handlers: HandlerTable,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            storage: None,
            handlers: HandlerTable::new(),
        }
    }

    /// Use an already-open store instead of the configured location.
    pub fn with_storage(config: EngineConfig, storage: SqliteStorage) -> Self {
        Self {
            config,
            storage: Some(storage),
            handlers: HandlerTable::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.storage.is_some()
    }

    /// Open the database and bootstrap the log schema. No-op when open.
    pub fn open(&mut self) -> Result<(), EngineError> {
        if self.storage.is_none() {
            self.storage = Some(open_storage(&self.config)?);
        }
        Ok(())
    }

    /// Drop the connection. The next call reopens it.
    pub fn close(&mut self) {
        if self.storage.take().is_some() {
            debug!("change log database closed");
        }
    }

    pub fn storage(&self) -> Option<&SqliteStorage> {
        self.storage.as_ref()
    }

    pub fn storage_mut(&mut self) -> Result<&mut SqliteStorage, EngineError> {
        Ok(self.parts()?.0)
    }

    fn parts(&mut self) -> Result<(&mut SqliteStorage, &HandlerTable), EngineError> {
        let storage = match self.storage.take() {
            Some(storage) => storage,
            None => open_storage(&self.config)?,
        };
        Ok((self.storage.insert(storage), &self.handlers))
    }

    /// Every captured record, oldest first.
    pub fn entries(&mut self) -> Result<Vec<ChangeRecord>, EngineError> {
        Ok(self.storage_mut()?.entries()?)
    }

    /// Write every captured record to `path`, or to the configured output path.
    pub fn output(&mut self, path: Option<&Path>) -> Result<PathBuf, EngineError> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.output_path.clone());
        let entries = self.entries()?;
        logfile::write_log_file(&path, &entries)?;
        info!(entries = entries.len(), path = %path.display(), "change log written");
        Ok(path)
    }

    pub fn apply(&mut self, records: &[ChangeRecord]) -> Result<ApplyOutcome, EngineError> {
        let (storage, handlers) = self.parts()?;
        replay::apply_batch(storage, handlers, records)
    }

    pub fn checkout(&mut self) -> Result<RecoveryOutcome, EngineError> {
        let (storage, handlers) = self.parts()?;
        recovery::checkout(storage, handlers)
    }

    /// Load a log file, enforcing the configured extension.
    pub fn read_log_file(&self, path: &Path) -> Result<Vec<ChangeRecord>, EngineError> {
        logfile::read_log_file(path, &self.config.log_extension)
    }
}

fn open_storage(config: &EngineConfig) -> Result<SqliteStorage, EngineError> {
    let contributor = config.contributor_id.clone();
    let storage = match &config.database {
        DatabaseLocation::File(path) => {
            info!(path = %path.display(), "opening change log database");
            SqliteStorage::open(path, contributor)?
        }
        DatabaseLocation::InMemory => SqliteStorage::open_in_memory(contributor)?,
    };
    Ok(storage)
}
