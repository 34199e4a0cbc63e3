//! Typed views over row images, one per tracked table.
//!
//! Text fields default to empty so a sparse image still deserializes and the
//! validation rules, rather than serde, report what is missing.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Bookkeeping columns every tracked row carries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowStamps {
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacultyRow {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub stamps: RowStamps,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentRow {
    pub id: String,
    #[serde(default)]
    pub faculty_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub levels: Vec<String>,
    #[serde(flatten)]
    pub stamps: RowStamps,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRow {
    pub id: String,
    #[serde(default)]
    pub department_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub semester: String,
    #[serde(flatten)]
    pub stamps: RowStamps,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRow {
    pub id: String,
    #[serde(default)]
    pub department_id: String,
    #[serde(default)]
    pub surname: String,
    #[serde(default)]
    pub other_names: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub regno: String,
    #[serde(default)]
    pub level: String,
    #[serde(flatten)]
    pub stamps: RowStamps,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LecturerRow {
    pub id: String,
    #[serde(default)]
    pub department_id: String,
    #[serde(default)]
    pub surname: String,
    #[serde(default)]
    pub other_names: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub username: String,
    #[serde(flatten)]
    pub stamps: RowStamps,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRegisterRow {
    pub id: String,
    #[serde(default)]
    pub course_id: String,
    #[serde(default)]
    pub session: String,
    #[serde(default)]
    pub decision: Value,
    #[serde(flatten)]
    pub stamps: RowStamps,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRegisterLecturerRow {
    pub id: String,
    #[serde(default)]
    pub attendance_register_id: String,
    #[serde(default)]
    pub lecturer_id: String,
    #[serde(flatten)]
    pub stamps: RowStamps,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRegisterStudentRow {
    pub id: String,
    #[serde(default)]
    pub attendance_register_id: String,
    #[serde(default)]
    pub student_id: String,
    #[serde(flatten)]
    pub stamps: RowStamps,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassAttendanceRow {
    pub id: String,
    #[serde(default)]
    pub attendance_register_id: String,
    #[serde(default)]
    pub attendance_register_lecturer_id: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
    #[serde(flatten)]
    pub stamps: RowStamps,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassAttendeeRow {
    pub id: String,
    #[serde(default)]
    pub class_attendance_id: String,
    #[serde(default)]
    pub attendance_register_student_id: String,
    #[serde(flatten)]
    pub stamps: RowStamps,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseClashAttendanceRow {
    pub id: String,
    #[serde(default)]
    pub course_id: String,
    #[serde(default)]
    pub student_id: String,
    #[serde(default)]
    pub class_attendee_id: String,
    #[serde(default)]
    pub session: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
    #[serde(flatten)]
    pub stamps: RowStamps,
}
