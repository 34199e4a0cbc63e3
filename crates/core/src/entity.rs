use std::fmt;

/// The tracked tables of the attendance schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKind {
    Faculty,
    Department,
    Course,
    Student,
    Lecturer,
    AttendanceRegister,
    AttendanceRegisterLecturer,
    AttendanceRegisterStudent,
    ClassAttendance,
    ClassAttendee,
    CourseClashAttendance,
}

impl EntityKind {
    /// Parents before children.
    pub const ALL: [EntityKind; 11] = [
        Self::Faculty,
        Self::Department,
        Self::Course,
        Self::Student,
        Self::Lecturer,
        Self::AttendanceRegister,
        Self::AttendanceRegisterLecturer,
        Self::AttendanceRegisterStudent,
        Self::ClassAttendance,
        Self::ClassAttendee,
        Self::CourseClashAttendance,
    ];

    pub fn table_name(&self) -> &'static str {
        match self {
            Self::Faculty => "faculties",
            Self::Department => "departments",
            Self::Course => "courses",
            Self::Student => "students",
            Self::Lecturer => "lecturers",
            Self::AttendanceRegister => "attendance_registers",
            Self::AttendanceRegisterLecturer => "attendance_register_lecturers",
            Self::AttendanceRegisterStudent => "attendance_register_students",
            Self::ClassAttendance => "class_attendances",
            Self::ClassAttendee => "class_attendees",
            Self::CourseClashAttendance => "course_clash_attendances",
        }
    }

    pub fn model_name(&self) -> &'static str {
        match self {
            Self::Faculty => "Faculty",
            Self::Department => "Department",
            Self::Course => "Course",
            Self::Student => "Student",
            Self::Lecturer => "Lecturer",
            Self::AttendanceRegister => "AttendanceRegister",
            Self::AttendanceRegisterLecturer => "AttendanceRegisterLecturer",
            Self::AttendanceRegisterStudent => "AttendanceRegisterStudent",
            Self::ClassAttendance => "ClassAttendance",
            Self::ClassAttendee => "ClassAttendee",
            Self::CourseClashAttendance => "CourseClashAttendance",
        }
    }

    /// Human label used in rule messages, e.g. "Attendance register".
    pub fn label(&self) -> &'static str {
        match self {
            Self::Faculty => "Faculty",
            Self::Department => "Department",
            Self::Course => "Course",
            Self::Student => "Student",
            Self::Lecturer => "Lecturer",
            Self::AttendanceRegister => "Attendance register",
            Self::AttendanceRegisterLecturer => "Attendance register lecturer",
            Self::AttendanceRegisterStudent => "Attendance register student",
            Self::ClassAttendance => "Class attendance",
            Self::ClassAttendee => "Class attendee",
            Self::CourseClashAttendance => "Course clash attendance",
        }
    }

    pub fn from_table(table: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.table_name() == table)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.model_name())
    }
}
