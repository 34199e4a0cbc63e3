//! The interchange file: a UTF-8 JSON array of change records.

use std::fs;
use std::path::Path;

use serde_json::Value;

use attendlog_core::ChangeRecord;

use crate::error::EngineError;

/// Load and validate a log file before anything is applied.
pub fn read_log_file(path: &Path, extension: &str) -> Result<Vec<ChangeRecord>, EngineError> {
    if path.extension().and_then(|e| e.to_str()) != Some(extension) {
        return Err(EngineError::InvalidLogFile(format!(
            "{} is not a .{extension} file",
            path.display()
        )));
    }

    let raw = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&raw)?;
    if !value.is_array() {
        return Err(EngineError::InvalidLogFile(
            "expected a JSON array of change records".to_string(),
        ));
    }
    serde_json::from_value(value).map_err(|e| EngineError::InvalidLogFile(e.to_string()))
}

pub fn write_log_file(path: &Path, entries: &[ChangeRecord]) -> Result<(), EngineError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_string_pretty(entries)?;
    fs::write(path, data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrong_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("changes.json");
        fs::write(&path, "[]").unwrap();
        let err = read_log_file(&path, "log").unwrap_err();
        assert!(matches!(err, EngineError::InvalidLogFile(_)));
    }

    #[test]
    fn non_array_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("changes.log");
        fs::write(&path, r#"{"id": "x"}"#).unwrap();
        let err = read_log_file(&path, "log").unwrap_err();
        assert!(matches!(err, EngineError::InvalidLogFile(_)));
    }

    #[test]
    fn writes_into_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/changes.log");
        write_log_file(&path, &[]).unwrap();
        assert!(read_log_file(&path, "log").unwrap().is_empty());
    }
}
