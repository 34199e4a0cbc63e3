use std::collections::BTreeMap;

use attendlog_core::{EntityKind, LogAction, RowImage};
use attendlog_storage::{Storage, StorageError};

use crate::appliers;
use crate::error::ApplyError;
use crate::restore;

pub type ApplyFn = fn(
    &mut dyn Storage,
    LogAction,
    Option<&RowImage>,
    Option<&RowImage>,
) -> Result<(), ApplyError>;

pub type RestoreFn = fn(
    &mut dyn Storage,
    EntityKind,
    LogAction,
    Option<&RowImage>,
    Option<&RowImage>,
) -> Result<(), StorageError>;

#[derive(Clone, Copy)]
pub struct Handler {
    pub apply: ApplyFn,
    pub restore: RestoreFn,
}

/// Appliers and restorers keyed by entity kind.
pub struct HandlerTable {
    handlers: BTreeMap<EntityKind, Handler>,
}

impl HandlerTable {
    pub fn new() -> Self {
        let entries: [(EntityKind, ApplyFn); 11] = [
            (EntityKind::Faculty, appliers::apply_faculty),
            (EntityKind::Department, appliers::apply_department),
            (EntityKind::Course, appliers::apply_course),
            (EntityKind::Student, appliers::apply_student),
            (EntityKind::Lecturer, appliers::apply_lecturer),
            (EntityKind::AttendanceRegister, appliers::apply_attendance_register),
            (
                EntityKind::AttendanceRegisterLecturer,
                appliers::apply_attendance_register_lecturer,
            ),
            (
                EntityKind::AttendanceRegisterStudent,
                appliers::apply_attendance_register_student,
            ),
            (EntityKind::ClassAttendance, appliers::apply_class_attendance),
            (EntityKind::ClassAttendee, appliers::apply_class_attendee),
            (
                EntityKind::CourseClashAttendance,
                appliers::apply_course_clash_attendance,
            ),
        ];
        let handlers = entries
            .into_iter()
            .map(|(kind, apply)| {
                let restore: RestoreFn = restore::restore_row;
                (kind, Handler { apply, restore })
            })
            .collect();
        Self { handlers }
    }

    pub fn get(&self, kind: EntityKind) -> Option<&Handler> {
        self.handlers.get(&kind)
    }

    /// Resolve a record's free-text entity kind. None for tables this build
    /// does not track.
    pub fn resolve(&self, entity_kind: &str) -> Option<(EntityKind, Handler)> {
        let kind = EntityKind::from_table(entity_kind)?;
        self.get(kind).map(|h| (kind, *h))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for HandlerTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_a_handler() {
        let table = HandlerTable::new();
        assert_eq!(table.len(), EntityKind::ALL.len());
        for kind in EntityKind::ALL {
            assert!(table.get(kind).is_some(), "{kind}");
        }
    }

    #[test]
    fn unknown_tables_do_not_resolve() {
        let table = HandlerTable::new();
        assert!(table.resolve("faculties").is_some());
        assert!(table.resolve("invoices").is_none());
        assert!(table.resolve("Faculty").is_none());
    }
}
