use attendlog_core::decision::check_decision;
use attendlog_core::domain::is_session;
use attendlog_core::rows::{
    AttendanceRegisterLecturerRow, AttendanceRegisterRow, AttendanceRegisterStudentRow,
    ClassAttendanceRow, ClassAttendeeRow, CourseClashAttendanceRow,
};
use attendlog_core::{EntityKind, LogAction, RowImage, Timestamp};
use attendlog_storage::{Filter, Storage};

use super::{decode, delete, require, taken, target, write};
use crate::error::{ApplyError, ValidationError};

/// Longest class, in whole hours.
const MAX_CLASS_HOURS: i64 = 2;

pub fn apply_attendance_register(
    store: &mut dyn Storage,
    action: LogAction,
    before: Option<&RowImage>,
    after: Option<&RowImage>,
) -> Result<(), ApplyError> {
    const KIND: EntityKind = EntityKind::AttendanceRegister;
    if action == LogAction::Delete {
        return delete(store, KIND, before);
    }

    let row: AttendanceRegisterRow = decode(action, after)?;
    let except = target(store, KIND, action, &row.id)?;

    require(store, EntityKind::Course, &row.course_id)?;
    if !is_session(&row.session) {
        return Err(ValidationError::InvalidFormat("session").into());
    }
    check_decision(&row.decision).map_err(ValidationError::from)?;

    let scope = [
        Filter::Eq("courseId", &row.course_id),
        Filter::Eq("session", &row.session),
    ];
    if taken(store, KIND, &scope, except)? {
        return Err(ValidationError::AlreadyExists(KIND.label()).into());
    }
    write(store, KIND, action, &row.id, &row)
}

pub fn apply_attendance_register_lecturer(
    store: &mut dyn Storage,
    action: LogAction,
    before: Option<&RowImage>,
    after: Option<&RowImage>,
) -> Result<(), ApplyError> {
    const KIND: EntityKind = EntityKind::AttendanceRegisterLecturer;
    if action == LogAction::Delete {
        return delete(store, KIND, before);
    }

    let row: AttendanceRegisterLecturerRow = decode(action, after)?;
    target(store, KIND, action, &row.id)?;
    require(store, EntityKind::AttendanceRegister, &row.attendance_register_id)?;
    require(store, EntityKind::Lecturer, &row.lecturer_id)?;
    write(store, KIND, action, &row.id, &row)
}

pub fn apply_attendance_register_student(
    store: &mut dyn Storage,
    action: LogAction,
    before: Option<&RowImage>,
    after: Option<&RowImage>,
) -> Result<(), ApplyError> {
    const KIND: EntityKind = EntityKind::AttendanceRegisterStudent;
    if action == LogAction::Delete {
        return delete(store, KIND, before);
    }

    let row: AttendanceRegisterStudentRow = decode(action, after)?;
    target(store, KIND, action, &row.id)?;
    require(store, EntityKind::AttendanceRegister, &row.attendance_register_id)?;
    require(store, EntityKind::Student, &row.student_id)?;
    write(store, KIND, action, &row.id, &row)
}

pub fn apply_class_attendance(
    store: &mut dyn Storage,
    action: LogAction,
    before: Option<&RowImage>,
    after: Option<&RowImage>,
) -> Result<(), ApplyError> {
    const KIND: EntityKind = EntityKind::ClassAttendance;
    if action == LogAction::Delete {
        return delete(store, KIND, before);
    }

    let row: ClassAttendanceRow = decode(action, after)?;
    let except = target(store, KIND, action, &row.id)?;

    let start = parse_time(&row.start_time)?;
    let end = parse_time(&row.end_time)?;
    if start.hours_until(&end) > MAX_CLASS_HOURS {
        return Err(ValidationError::ClassTooLong.into());
    }

    require(store, EntityKind::AttendanceRegister, &row.attendance_register_id)?;
    let lecturer = [
        Filter::Eq("id", &row.attendance_register_lecturer_id),
        Filter::Eq("attendanceRegisterId", &row.attendance_register_id),
    ];
    if store.count_rows(EntityKind::AttendanceRegisterLecturer, &lecturer)? == 0 {
        return Err(
            ValidationError::NotFound(EntityKind::AttendanceRegisterLecturer.label()).into(),
        );
    }

    let date = parse_time(&row.date)?;
    let mut same_register = vec![Filter::Eq("attendanceRegisterId", &row.attendance_register_id)];
    if let Some(id) = except {
        same_register.push(Filter::Ne("id", id));
    }
    for other in store.find_rows(KIND, &same_register)? {
        if same_date(&other, date) && overlaps(&other, start, end) {
            return Err(ValidationError::AlreadyExists(KIND.label()).into());
        }
    }
    write(store, KIND, action, &row.id, &row)
}

pub fn apply_class_attendee(
    store: &mut dyn Storage,
    action: LogAction,
    before: Option<&RowImage>,
    after: Option<&RowImage>,
) -> Result<(), ApplyError> {
    const KIND: EntityKind = EntityKind::ClassAttendee;
    if action == LogAction::Delete {
        return delete(store, KIND, before);
    }

    let row: ClassAttendeeRow = decode(action, after)?;
    target(store, KIND, action, &row.id)?;

    let class = store
        .get_row(EntityKind::ClassAttendance, &row.class_attendance_id)?
        .ok_or(ValidationError::NotFound(EntityKind::ClassAttendance.label()))?;
    let register_id = class.get_str("attendanceRegisterId").unwrap_or_default();
    let enrolled = [
        Filter::Eq("id", &row.attendance_register_student_id),
        Filter::Eq("attendanceRegisterId", register_id),
    ];
    if store.count_rows(EntityKind::AttendanceRegisterStudent, &enrolled)? == 0 {
        return Err(
            ValidationError::NotFound(EntityKind::AttendanceRegisterStudent.label()).into(),
        );
    }
    write(store, KIND, action, &row.id, &row)
}

pub fn apply_course_clash_attendance(
    store: &mut dyn Storage,
    action: LogAction,
    before: Option<&RowImage>,
    after: Option<&RowImage>,
) -> Result<(), ApplyError> {
    const KIND: EntityKind = EntityKind::CourseClashAttendance;
    if action == LogAction::Delete {
        return delete(store, KIND, before);
    }

    let row: CourseClashAttendanceRow = decode(action, after)?;
    target(store, KIND, action, &row.id)?;
    require(store, EntityKind::ClassAttendee, &row.class_attendee_id)?;
    require(store, EntityKind::Student, &row.student_id)?;
    require(store, EntityKind::Course, &row.course_id)?;
    write(store, KIND, action, &row.id, &row)
}

fn parse_time(raw: &str) -> Result<Timestamp, ValidationError> {
    Timestamp::parse(raw).map_err(|_| ValidationError::InvalidFormat("time"))
}

fn stored_time(row: &RowImage, field: &str) -> Option<Timestamp> {
    row.get_str(field).and_then(|s| Timestamp::parse(s).ok())
}

fn same_date(other: &RowImage, date: Timestamp) -> bool {
    stored_time(other, "date") == Some(date)
}

/// An existing class clashes when it starts no later than the new one and is
/// still running at its start or end, or starts before the new end and runs past it.
fn overlaps(other: &RowImage, start: Timestamp, end: Timestamp) -> bool {
    let (Some(o_start), Some(o_end)) = (stored_time(other, "startTime"), stored_time(other, "endTime"))
    else {
        return false;
    };
    (o_start <= start && o_end > end)
        || (o_start <= start && o_end > start)
        || (o_start <= end && o_end > end)
}
