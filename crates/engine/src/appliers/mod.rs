//! Validated forward replay, one applier per entity kind.
//!
//! Each applier re-runs the rules the entity's own create/update/delete path
//! enforces against the local database, then writes through the capturing
//! repository. Checks all run before the single write, so a rejected record
//! leaves nothing behind.

mod attendance;
mod records;

use serde::Serialize;
use serde::de::DeserializeOwned;

use attendlog_core::{EntityKind, LogAction, RowImage};
use attendlog_storage::{Filter, Storage};

use crate::error::{ApplyError, ValidationError};

pub use attendance::{
    apply_attendance_register, apply_attendance_register_lecturer,
    apply_attendance_register_student, apply_class_attendance, apply_class_attendee,
    apply_course_clash_attendance,
};
pub use records::{apply_course, apply_department, apply_faculty, apply_lecturer, apply_student};

/// Decode the image a record of `action` must carry on `side`.
fn image<'a>(
    action: LogAction,
    side: &'static str,
    image: Option<&'a RowImage>,
) -> Result<&'a RowImage, ValidationError> {
    image.ok_or(ValidationError::MissingImage { action, side })
}

fn decode<T: DeserializeOwned>(
    action: LogAction,
    after: Option<&RowImage>,
) -> Result<T, ValidationError> {
    image(action, "after", after)?
        .to_row()
        .map_err(|e| ValidationError::MalformedImage(e.to_string()))
}

fn encode<T: Serialize>(row: &T) -> Result<RowImage, ValidationError> {
    RowImage::from_row(row).map_err(|e| ValidationError::MalformedImage(e.to_string()))
}

/// Fail with "<Kind> not found" unless the row exists.
fn require(store: &dyn Storage, kind: EntityKind, id: &str) -> Result<(), ApplyError> {
    if store.row_exists(kind, id)? {
        Ok(())
    } else {
        Err(ValidationError::NotFound(kind.label()).into())
    }
}

fn insert<T: Serialize>(
    store: &mut dyn Storage,
    kind: EntityKind,
    id: &str,
    row: &T,
) -> Result<(), ApplyError> {
    if store.row_exists(kind, id)? {
        return Err(ValidationError::AlreadyExists(kind.label()).into());
    }
    store.insert_row(kind, &encode(row)?)?;
    Ok(())
}

fn update<T: Serialize>(store: &mut dyn Storage, kind: EntityKind, row: &T) -> Result<(), ApplyError> {
    if !store.update_row(kind, &encode(row)?)? {
        return Err(ValidationError::NotFound(kind.label()).into());
    }
    Ok(())
}

/// For an Update, the target row must already exist; its id is then excluded
/// from uniqueness checks.
fn target<'a>(
    store: &dyn Storage,
    kind: EntityKind,
    action: LogAction,
    id: &'a str,
) -> Result<Option<&'a str>, ApplyError> {
    match action {
        LogAction::Update => {
            require(store, kind, id)?;
            Ok(Some(id))
        }
        LogAction::Insert | LogAction::Delete => Ok(None),
    }
}

/// Whether a row other than `except` already matches every filter.
fn taken<'a>(
    store: &dyn Storage,
    kind: EntityKind,
    filters: &[Filter<'a>],
    except: Option<&'a str>,
) -> Result<bool, ApplyError> {
    let mut filters = filters.to_vec();
    if let Some(id) = except {
        filters.push(Filter::Ne("id", id));
    }
    Ok(store.count_rows(kind, &filters)? > 0)
}

fn write<T: Serialize>(
    store: &mut dyn Storage,
    kind: EntityKind,
    action: LogAction,
    id: &str,
    row: &T,
) -> Result<(), ApplyError> {
    match action {
        LogAction::Insert => insert(store, kind, id, row),
        LogAction::Update => update(store, kind, row),
        LogAction::Delete => Err(ValidationError::MissingImage {
            action,
            side: "after",
        }
        .into()),
    }
}

/// The shared Delete rule: the row named by the before-image must exist.
fn delete(
    store: &mut dyn Storage,
    kind: EntityKind,
    before: Option<&RowImage>,
) -> Result<(), ApplyError> {
    let before = image(LogAction::Delete, "before", before)?;
    let id = before
        .id()
        .ok_or_else(|| ValidationError::MalformedImage("missing id".to_string()))?;
    if !store.delete_row(kind, id)? {
        return Err(ValidationError::NotFound(kind.label()).into());
    }
    Ok(())
}
