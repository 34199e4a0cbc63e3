//! Inverse replay. Restorers trust their images and skip forward validation;
//! they only put back a state that was already valid.

use attendlog_core::{EntityKind, LogAction, RowImage};
use attendlog_storage::{Storage, StorageError};

/// Undo one record against local storage.
///
/// - Insert: delete the inserted row if it is still there.
/// - Update: overwrite the row with the before-image if it is still there.
/// - Delete: recreate the row from the before-image unless it already exists.
pub fn restore_row(
    store: &mut dyn Storage,
    kind: EntityKind,
    action: LogAction,
    before: Option<&RowImage>,
    after: Option<&RowImage>,
) -> Result<(), StorageError> {
    match action {
        LogAction::Insert => {
            if let Some(id) = after.and_then(RowImage::id) {
                store.delete_row(kind, id)?;
            }
        }
        LogAction::Update => {
            if let Some(before) = before {
                store.update_row(kind, before)?;
            }
        }
        LogAction::Delete => {
            if let Some(before) = before {
                let id = before.id().ok_or(StorageError::MissingId(kind))?;
                if !store.row_exists(kind, id)? {
                    store.insert_row(kind, before)?;
                }
            }
        }
    }
    Ok(())
}
