use rusqlite::Connection;

use attendlog_core::EntityKind;

use crate::error::StorageError;

pub const SCHEMA_VERSION: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Stored and imaged as a string.
    Text,
    /// Stored as JSON text, imaged as the parsed value.
    Json,
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    /// camelCase key in row images.
    pub field: &'static str,
    pub name: &'static str,
    pub ty: ColumnType,
}

/// A child table whose `field` references the parent's id.
#[derive(Debug, Clone, Copy)]
pub struct Dependent {
    pub kind: EntityKind,
    pub field: &'static str,
}

macro_rules! table {
    ($($field:literal => $name:literal : $ty:ident),* $(,)?) => {
        &[
            Column { field: "id", name: "id", ty: ColumnType::Text },
            $(Column { field: $field, name: $name, ty: ColumnType::$ty },)*
            Column { field: "createdAt", name: "created_at", ty: ColumnType::Text },
            Column { field: "updatedAt", name: "updated_at", ty: ColumnType::Text },
            Column { field: "metadata", name: "metadata", ty: ColumnType::Json },
        ]
    };
}

pub fn columns(kind: EntityKind) -> &'static [Column] {
    match kind {
        EntityKind::Faculty => table! {
            "name" => "name": Text,
        },
        EntityKind::Department => table! {
            "facultyId" => "faculty_id": Text,
            "name" => "name": Text,
            "levels" => "levels": Json,
        },
        EntityKind::Course => table! {
            "departmentId" => "department_id": Text,
            "title" => "title": Text,
            "code" => "code": Text,
            "level" => "level": Text,
            "semester" => "semester": Text,
        },
        EntityKind::Student => table! {
            "departmentId" => "department_id": Text,
            "surname" => "surname": Text,
            "otherNames" => "other_names": Text,
            "gender" => "gender": Text,
            "regno" => "regno": Text,
            "level" => "level": Text,
        },
        EntityKind::Lecturer => table! {
            "departmentId" => "department_id": Text,
            "surname" => "surname": Text,
            "otherNames" => "other_names": Text,
            "gender" => "gender": Text,
            "username" => "username": Text,
        },
        EntityKind::AttendanceRegister => table! {
            "courseId" => "course_id": Text,
            "session" => "session": Text,
            "decision" => "decision": Json,
        },
        EntityKind::AttendanceRegisterLecturer => table! {
            "attendanceRegisterId" => "attendance_register_id": Text,
            "lecturerId" => "lecturer_id": Text,
        },
        EntityKind::AttendanceRegisterStudent => table! {
            "attendanceRegisterId" => "attendance_register_id": Text,
            "studentId" => "student_id": Text,
        },
        EntityKind::ClassAttendance => table! {
            "attendanceRegisterId" => "attendance_register_id": Text,
            "attendanceRegisterLecturerId" => "attendance_register_lecturer_id": Text,
            "date" => "date": Text,
            "startTime" => "start_time": Text,
            "endTime" => "end_time": Text,
        },
        EntityKind::ClassAttendee => table! {
            "classAttendanceId" => "class_attendance_id": Text,
            "attendanceRegisterStudentId" => "attendance_register_student_id": Text,
        },
        EntityKind::CourseClashAttendance => table! {
            "courseId" => "course_id": Text,
            "studentId" => "student_id": Text,
            "classAttendeeId" => "class_attendee_id": Text,
            "session" => "session": Text,
            "date" => "date": Text,
            "startTime" => "start_time": Text,
            "endTime" => "end_time": Text,
        },
    }
}

pub fn column(kind: EntityKind, field: &str) -> Result<&'static Column, StorageError> {
    columns(kind)
        .iter()
        .find(|c| c.field == field)
        .ok_or_else(|| StorageError::UnknownField {
            kind,
            field: field.to_string(),
        })
}

pub fn dependents(kind: EntityKind) -> &'static [Dependent] {
    use EntityKind::*;
    match kind {
        Faculty => &[Dependent { kind: Department, field: "facultyId" }],
        Department => &[
            Dependent { kind: Course, field: "departmentId" },
            Dependent { kind: Student, field: "departmentId" },
            Dependent { kind: Lecturer, field: "departmentId" },
        ],
        Course => &[
            Dependent { kind: AttendanceRegister, field: "courseId" },
            Dependent { kind: CourseClashAttendance, field: "courseId" },
        ],
        Student => &[
            Dependent { kind: AttendanceRegisterStudent, field: "studentId" },
            Dependent { kind: CourseClashAttendance, field: "studentId" },
        ],
        Lecturer => &[Dependent { kind: AttendanceRegisterLecturer, field: "lecturerId" }],
        AttendanceRegister => &[
            Dependent { kind: AttendanceRegisterLecturer, field: "attendanceRegisterId" },
            Dependent { kind: AttendanceRegisterStudent, field: "attendanceRegisterId" },
            Dependent { kind: ClassAttendance, field: "attendanceRegisterId" },
        ],
        AttendanceRegisterLecturer => &[Dependent {
            kind: ClassAttendance,
            field: "attendanceRegisterLecturerId",
        }],
        AttendanceRegisterStudent => &[Dependent {
            kind: ClassAttendee,
            field: "attendanceRegisterStudentId",
        }],
        ClassAttendance => &[Dependent { kind: ClassAttendee, field: "classAttendanceId" }],
        ClassAttendee => &[Dependent {
            kind: CourseClashAttendance,
            field: "classAttendeeId",
        }],
        CourseClashAttendance => &[],
    }
}

pub fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA cache_size = -32000;
        PRAGMA busy_timeout = 5000;
    ",
    )?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);
INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, unixepoch());

CREATE TABLE IF NOT EXISTS log_entries (
    rowid INTEGER PRIMARY KEY,
    id TEXT NOT NULL UNIQUE,
    action TEXT NOT NULL CHECK (action IN ('INSERT', 'UPDATE', 'DELETE')),
    entity_kind TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    contributor_id TEXT NOT NULL,
    before_image TEXT,
    after_image TEXT
);
CREATE INDEX IF NOT EXISTS idx_log_entries_created ON log_entries(created_at, rowid);

CREATE TABLE IF NOT EXISTS log_states (
    rowid INTEGER PRIMARY KEY,
    id TEXT NOT NULL UNIQUE,
    mode TEXT NOT NULL CHECK (mode IN ('consistent', 'replaying', 'rolling_back')),
    set_at INTEGER NOT NULL,
    contributor_id TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_log_states_set_at ON log_states(set_at, rowid);
CREATE INDEX IF NOT EXISTS idx_log_states_mode ON log_states(mode, set_at);

CREATE TABLE IF NOT EXISTS log_contributors (
    contributor_id TEXT PRIMARY KEY,
    last_entry_at INTEGER NOT NULL,
    added_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS faculties (
    id TEXT PRIMARY KEY,
    name TEXT,
    created_at TEXT,
    updated_at TEXT,
    metadata TEXT
);

CREATE TABLE IF NOT EXISTS departments (
    id TEXT PRIMARY KEY,
    faculty_id TEXT REFERENCES faculties(id) ON DELETE CASCADE,
    name TEXT,
    levels TEXT,
    created_at TEXT,
    updated_at TEXT,
    metadata TEXT
);
CREATE INDEX IF NOT EXISTS idx_departments_faculty ON departments(faculty_id);

CREATE TABLE IF NOT EXISTS courses (
    id TEXT PRIMARY KEY,
    department_id TEXT REFERENCES departments(id) ON DELETE CASCADE,
    title TEXT,
    code TEXT,
    level TEXT,
    semester TEXT,
    created_at TEXT,
    updated_at TEXT,
    metadata TEXT
);
CREATE INDEX IF NOT EXISTS idx_courses_department ON courses(department_id);

CREATE TABLE IF NOT EXISTS students (
    id TEXT PRIMARY KEY,
    department_id TEXT REFERENCES departments(id) ON DELETE CASCADE,
    surname TEXT,
    other_names TEXT,
    gender TEXT,
    regno TEXT,
    level TEXT,
    created_at TEXT,
    updated_at TEXT,
    metadata TEXT
);
CREATE INDEX IF NOT EXISTS idx_students_department ON students(department_id);

CREATE TABLE IF NOT EXISTS lecturers (
    id TEXT PRIMARY KEY,
    department_id TEXT REFERENCES departments(id) ON DELETE CASCADE,
    surname TEXT,
    other_names TEXT,
    gender TEXT,
    username TEXT,
    created_at TEXT,
    updated_at TEXT,
    metadata TEXT
);
CREATE INDEX IF NOT EXISTS idx_lecturers_department ON lecturers(department_id);

CREATE TABLE IF NOT EXISTS attendance_registers (
    id TEXT PRIMARY KEY,
    course_id TEXT REFERENCES courses(id) ON DELETE CASCADE,
    session TEXT,
    decision TEXT,
    created_at TEXT,
    updated_at TEXT,
    metadata TEXT
);
CREATE INDEX IF NOT EXISTS idx_attendance_registers_course ON attendance_registers(course_id, session);

CREATE TABLE IF NOT EXISTS attendance_register_lecturers (
    id TEXT PRIMARY KEY,
    attendance_register_id TEXT REFERENCES attendance_registers(id) ON DELETE CASCADE,
    lecturer_id TEXT REFERENCES lecturers(id) ON DELETE CASCADE,
    created_at TEXT,
    updated_at TEXT,
    metadata TEXT
);

CREATE TABLE IF NOT EXISTS attendance_register_students (
    id TEXT PRIMARY KEY,
    attendance_register_id TEXT REFERENCES attendance_registers(id) ON DELETE CASCADE,
    student_id TEXT REFERENCES students(id) ON DELETE CASCADE,
    created_at TEXT,
    updated_at TEXT,
    metadata TEXT
);

CREATE TABLE IF NOT EXISTS class_attendances (
    id TEXT PRIMARY KEY,
    attendance_register_id TEXT REFERENCES attendance_registers(id) ON DELETE CASCADE,
    attendance_register_lecturer_id TEXT REFERENCES attendance_register_lecturers(id) ON DELETE CASCADE,
    date TEXT,
    start_time TEXT,
    end_time TEXT,
    created_at TEXT,
    updated_at TEXT,
    metadata TEXT
);
CREATE INDEX IF NOT EXISTS idx_class_attendances_register ON class_attendances(attendance_register_id);

CREATE TABLE IF NOT EXISTS class_attendees (
    id TEXT PRIMARY KEY,
    class_attendance_id TEXT REFERENCES class_attendances(id) ON DELETE CASCADE,
    attendance_register_student_id TEXT REFERENCES attendance_register_students(id) ON DELETE CASCADE,
    created_at TEXT,
    updated_at TEXT,
    metadata TEXT
);

CREATE TABLE IF NOT EXISTS course_clash_attendances (
    id TEXT PRIMARY KEY,
    course_id TEXT REFERENCES courses(id) ON DELETE CASCADE,
    student_id TEXT REFERENCES students(id) ON DELETE CASCADE,
    class_attendee_id TEXT REFERENCES class_attendees(id) ON DELETE CASCADE,
    session TEXT,
    date TEXT,
    start_time TEXT,
    end_time TEXT,
    created_at TEXT,
    updated_at TEXT,
    metadata TEXT
);
";
