use std::collections::BTreeMap;

use attendlog_core::{
    ChangeRecord, Checkpoint, ContributorId, EntityKind, EntryId, LogMode, RowImage, Timestamp,
    Watermark,
};

use crate::error::StorageError;

/// Row predicate over a camelCase image field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter<'a> {
    Eq(&'a str, &'a str),
    /// ASCII case-insensitive equality.
    EqNoCase(&'a str, &'a str),
    Ne(&'a str, &'a str),
}

pub trait Storage {
    // Clock
    fn local_contributor(&self) -> &ContributorId;
    fn tick(&mut self) -> Timestamp;
    /// Make later ticks sort after `seen`.
    fn observe(&mut self, seen: Timestamp);

    // Change records
    fn entries(&self) -> Result<Vec<ChangeRecord>, StorageError>;
    fn entries_after(&self, after: Timestamp) -> Result<Vec<ChangeRecord>, StorageError>;
    fn delete_entries(&mut self, ids: &[EntryId]) -> Result<usize, StorageError>;
    fn entry_count(&self) -> Result<u64, StorageError>;

    // Checkpoints
    fn latest_checkpoint(&self) -> Result<Option<Checkpoint>, StorageError>;
    fn latest_checkpoint_in(&self, mode: LogMode) -> Result<Option<Checkpoint>, StorageError>;
    fn push_checkpoint(
        &mut self,
        mode: LogMode,
        contributor_id: &ContributorId,
    ) -> Result<Checkpoint, StorageError>;
    fn checkpoints(&self) -> Result<Vec<Checkpoint>, StorageError>;

    // Watermarks
    fn watermarks(&self) -> Result<BTreeMap<ContributorId, Watermark>, StorageError>;
    fn upsert_watermark(
        &mut self,
        contributor_id: &ContributorId,
        last_entry_at: Timestamp,
    ) -> Result<(), StorageError>;

    // Tracked rows
    fn get_row(&self, kind: EntityKind, id: &str) -> Result<Option<RowImage>, StorageError>;
    fn row_exists(&self, kind: EntityKind, id: &str) -> Result<bool, StorageError>;
    fn find_rows(
        &self,
        kind: EntityKind,
        filters: &[Filter<'_>],
    ) -> Result<Vec<RowImage>, StorageError>;
    fn count_rows(&self, kind: EntityKind, filters: &[Filter<'_>]) -> Result<u64, StorageError>;

    /// Inserts the row and captures an Insert record.
    fn insert_row(&mut self, kind: EntityKind, image: &RowImage) -> Result<(), StorageError>;
    /// Overwrites every column of an existing row. Returns false if absent.
    fn update_row(&mut self, kind: EntityKind, image: &RowImage) -> Result<bool, StorageError>;
    /// Deletes the row and its dependents, children first, capturing each.
    /// Returns false if absent.
    fn delete_row(&mut self, kind: EntityKind, id: &str) -> Result<bool, StorageError>;
}
