use std::fmt;

use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;
use crate::error::CoreError;
use crate::ids::{CheckpointId, ContributorId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogMode {
    /// Committed state; the only mode allowed between operations.
    Consistent,
    /// A batch is mid-replay.
    Replaying,
    /// A failed batch is waiting for, or undergoing, recovery. Capture is off.
    RollingBack,
}

impl LogMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Consistent => "consistent",
            Self::Replaying => "replaying",
            Self::RollingBack => "rolling_back",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "consistent" => Ok(Self::Consistent),
            "replaying" => Ok(Self::Replaying),
            "rolling_back" => Ok(Self::RollingBack),
            _ => Err(CoreError::UnknownMode(s.to_string())),
        }
    }
}

impl fmt::Display for LogMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub id: CheckpointId,
    pub mode: LogMode,
    pub set_at: Timestamp,
    pub contributor_id: ContributorId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watermark {
    pub contributor_id: ContributorId,
    pub last_entry_at: Timestamp,
    pub added_at: Timestamp,
}
