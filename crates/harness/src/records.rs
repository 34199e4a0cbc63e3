//! Hand-built change records for batches no device would produce.

use attendlog_core::{ChangeRecord, ContributorId, EntryId, LogAction, RowImage, Timestamp};
use serde_json::Value;

fn image(value: Value) -> Option<RowImage> {
    match value {
        Value::Object(map) => Some(RowImage::from_map(map)),
        _ => None,
    }
}

pub fn record(
    action: LogAction,
    table: &str,
    contributor: &str,
    at_millis: i64,
    before: Value,
    after: Value,
) -> ChangeRecord {
    ChangeRecord {
        id: EntryId::new(),
        action,
        entity_kind: table.to_string(),
        created_at: Timestamp::from_millis(at_millis),
        contributor_id: ContributorId::from(contributor),
        before_image: image(before),
        after_image: image(after),
    }
}

pub fn insert(table: &str, contributor: &str, at_millis: i64, after: Value) -> ChangeRecord {
    record(LogAction::Insert, table, contributor, at_millis, Value::Null, after)
}

pub fn update(
    table: &str,
    contributor: &str,
    at_millis: i64,
    before: Value,
    after: Value,
) -> ChangeRecord {
    record(LogAction::Update, table, contributor, at_millis, before, after)
}

pub fn delete(table: &str, contributor: &str, at_millis: i64, before: Value) -> ChangeRecord {
    record(LogAction::Delete, table, contributor, at_millis, before, Value::Null)
}
