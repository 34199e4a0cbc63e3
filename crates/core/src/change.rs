use std::fmt;

use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;
use crate::entity::EntityKind;
use crate::error::CoreError;
use crate::ids::{ContributorId, EntryId};
use crate::image::RowImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogAction {
    Insert,
    Update,
    Delete,
}

impl LogAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "INSERT" => Ok(Self::Insert),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            _ => Err(CoreError::UnknownAction(s.to_string())),
        }
    }
}

impl fmt::Display for LogAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One captured mutation of a tracked row.
///
/// `entity_kind` is the physical table name. It is kept as text so a log
/// produced by a newer schema still parses; unknown kinds are skipped at
/// replay time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    pub id: EntryId,
    pub action: LogAction,
    #[serde(alias = "table")]
    pub entity_kind: String,
    pub created_at: Timestamp,
    #[serde(alias = "loggerId")]
    pub contributor_id: ContributorId,
    #[serde(default)]
    pub before_image: Option<RowImage>,
    #[serde(default)]
    pub after_image: Option<RowImage>,
}

impl ChangeRecord {
    pub fn kind(&self) -> Option<EntityKind> {
        EntityKind::from_table(&self.entity_kind)
    }

    /// Id of the row this record touches.
    pub fn row_id(&self) -> Option<&str> {
        match self.action {
            LogAction::Insert => self.after_image.as_ref().and_then(RowImage::id),
            LogAction::Update | LogAction::Delete => {
                self.before_image.as_ref().and_then(RowImage::id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn action_wire_form_is_uppercase() {
        assert_eq!(serde_json::to_string(&LogAction::Update).unwrap(), "\"UPDATE\"");
        assert_eq!(LogAction::parse("DELETE").unwrap(), LogAction::Delete);
        assert!(LogAction::parse("delete").is_err());
    }

    #[test]
    fn record_parses_interchange_shape() {
        let id = EntryId::new();
        let raw = json!({
            "id": id.to_string(),
            "action": "INSERT",
            "entityKind": "faculties",
            "createdAt": "2024-01-01T00:00:00.000Z",
            "contributorId": "device-a",
            "beforeImage": null,
            "afterImage": { "id": "f1", "name": "SCIENCE" }
        });
        let record: ChangeRecord = serde_json::from_value(raw).unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.kind(), Some(EntityKind::Faculty));
        assert_eq!(record.row_id(), Some("f1"));
        assert!(record.before_image.is_none());
    }

    #[test]
    fn unknown_kind_still_parses() {
        let raw = json!({
            "id": EntryId::new().to_string(),
            "action": "DELETE",
            "entityKind": "timetables",
            "createdAt": 5,
            "contributorId": "device-b",
            "beforeImage": { "id": "t1" }
        });
        let record: ChangeRecord = serde_json::from_value(raw).unwrap();
        assert_eq!(record.kind(), None);
        assert!(record.after_image.is_none());
    }

    #[test]
    fn accepts_table_and_logger_id_field_names() {
        let raw = json!({
            "id": EntryId::new().to_string(),
            "action": "UPDATE",
            "table": "courses",
            "createdAt": "2024-01-01T00:00:00.000Z",
            "loggerId": "device-c",
            "beforeImage": { "id": "c1" },
            "afterImage": { "id": "c1" }
        });
        let record: ChangeRecord = serde_json::from_value(raw).unwrap();
        assert_eq!(record.kind(), Some(EntityKind::Course));
        assert_eq!(record.contributor_id, ContributorId::from("device-c"));
    }
}
