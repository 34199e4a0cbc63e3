//! Engine configuration with defaults and a builder.

use std::path::PathBuf;

use attendlog_core::ContributorId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    File(PathBuf),
    InMemory,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Where the local database lives.
    pub database: DatabaseLocation,

    /// Identity stamped on checkpoints and on records captured outside a replay.
    pub contributor_id: ContributorId,

    /// Extension (without the dot) a log file must carry to be imported.
    pub log_extension: String,

    /// Where `output()` writes when no path is given.
    pub output_path: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database: DatabaseLocation::File(PathBuf::from("./attendlog.db")),
            contributor_id: ContributorId::from("local"),
            log_extension: "log".to_string(),
            output_path: PathBuf::from("./data.log"),
        }
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }
}

#[derive(Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Store the database in a file at `path`.
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.database = DatabaseLocation::File(path.into());
        self
    }

    /// Keep the database in memory; nothing survives `close()`.
    pub fn in_memory(mut self) -> Self {
        self.config.database = DatabaseLocation::InMemory;
        self
    }

    pub fn contributor_id(mut self, id: impl Into<ContributorId>) -> Self {
        self.config.contributor_id = id.into();
        self
    }

    pub fn log_extension(mut self, ext: impl Into<String>) -> Self {
        self.config.log_extension = ext.into().trim_start_matches('.').to_string();
        self
    }

    pub fn output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output_path = path.into();
        self
    }

    pub fn build(self) -> EngineConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = EngineConfig::builder()
            .in_memory()
            .contributor_id("device-a")
            .log_extension(".json")
            .build();
        assert_eq!(config.database, DatabaseLocation::InMemory);
        assert_eq!(config.contributor_id, ContributorId::from("device-a"));
        assert_eq!(config.log_extension, "json");
        assert_eq!(config.output_path, PathBuf::from("./data.log"));
    }
}
