use attendlog_core::domain::{
    Gender, Level, Semester, is_course_code, normalize_course_code, normalize_levels, strip_title,
};
use attendlog_core::rows::{CourseRow, DepartmentRow, FacultyRow, LecturerRow, StudentRow};
use attendlog_core::{EntityKind, LogAction, RowImage};
use attendlog_storage::{Filter, Storage};

use super::{decode, delete, require, taken, target, write};
use crate::error::{ApplyError, ValidationError};

pub fn apply_faculty(
    store: &mut dyn Storage,
    action: LogAction,
    before: Option<&RowImage>,
    after: Option<&RowImage>,
) -> Result<(), ApplyError> {
    const KIND: EntityKind = EntityKind::Faculty;
    if action == LogAction::Delete {
        return delete(store, KIND, before);
    }

    let mut row: FacultyRow = decode(action, after)?;
    row.name = strip_title(&row.name, &["FACULTY OF", "FACULTY"]);
    let except = target(store, KIND, action, &row.id)?;

    if taken(store, KIND, &[Filter::EqNoCase("name", &row.name)], except)? {
        return Err(ValidationError::AlreadyExists(KIND.label()).into());
    }
    write(store, KIND, action, &row.id, &row)
}

pub fn apply_department(
    store: &mut dyn Storage,
    action: LogAction,
    before: Option<&RowImage>,
    after: Option<&RowImage>,
) -> Result<(), ApplyError> {
    const KIND: EntityKind = EntityKind::Department;
    if action == LogAction::Delete {
        return delete(store, KIND, before);
    }

    let mut row: DepartmentRow = decode(action, after)?;
    row.name = strip_title(&row.name, &["DEPARTMENT OF", "DEPARTMENT"]);
    let except = target(store, KIND, action, &row.id)?;

    require(store, EntityKind::Faculty, &row.faculty_id)?;
    if taken(store, KIND, &[Filter::EqNoCase("name", &row.name)], except)? {
        return Err(ValidationError::AlreadyExists(KIND.label()).into());
    }

    row.levels = normalize_levels(&row.levels)
        .iter()
        .map(|l| l.as_str().to_string())
        .collect();
    write(store, KIND, action, &row.id, &row)
}

pub fn apply_course(
    store: &mut dyn Storage,
    action: LogAction,
    before: Option<&RowImage>,
    after: Option<&RowImage>,
) -> Result<(), ApplyError> {
    const KIND: EntityKind = EntityKind::Course;
    if action == LogAction::Delete {
        return delete(store, KIND, before);
    }

    let mut row: CourseRow = decode(action, after)?;
    row.title = row.title.to_uppercase();
    row.code = normalize_course_code(&row.code);
    let except = target(store, KIND, action, &row.id)?;

    if !is_course_code(&row.code) {
        return Err(ValidationError::InvalidFormat("course code").into());
    }
    let level = Level::parse(&row.level).ok_or(ValidationError::InvalidFormat("level"))?;
    if Semester::parse(&row.semester).is_none() {
        return Err(ValidationError::InvalidFormat("semester").into());
    }

    let levels = department_levels(store, &row.department_id)?;
    if taken(store, KIND, &[Filter::EqNoCase("code", &row.code)], except)? {
        return Err(ValidationError::AlreadyExists(KIND.label()).into());
    }
    if !levels.contains(&level) {
        return Err(ValidationError::LevelNotSupported.into());
    }
    write(store, KIND, action, &row.id, &row)
}

pub fn apply_student(
    store: &mut dyn Storage,
    action: LogAction,
    before: Option<&RowImage>,
    after: Option<&RowImage>,
) -> Result<(), ApplyError> {
    const KIND: EntityKind = EntityKind::Student;
    if action == LogAction::Delete {
        return delete(store, KIND, before);
    }

    let mut row: StudentRow = decode(action, after)?;
    row.surname = row.surname.to_uppercase();
    row.other_names = row.other_names.to_uppercase();
    let except = target(store, KIND, action, &row.id)?;

    row.gender = checked_gender(&row.gender)?;
    if row.level.is_empty() {
        row.level = Level::L100.as_str().to_string();
    }
    let level = Level::parse(&row.level).ok_or(ValidationError::InvalidFormat("level"))?;

    let levels = department_levels(store, &row.department_id)?;
    if taken(store, KIND, &[Filter::EqNoCase("regno", &row.regno)], except)? {
        return Err(ValidationError::AlreadyExists("Regno").into());
    }
    if !levels.contains(&level) {
        return Err(ValidationError::LevelNotSupported.into());
    }
    write(store, KIND, action, &row.id, &row)
}

pub fn apply_lecturer(
    store: &mut dyn Storage,
    action: LogAction,
    before: Option<&RowImage>,
    after: Option<&RowImage>,
) -> Result<(), ApplyError> {
    const KIND: EntityKind = EntityKind::Lecturer;
    if action == LogAction::Delete {
        return delete(store, KIND, before);
    }

    let mut row: LecturerRow = decode(action, after)?;
    row.surname = row.surname.to_uppercase();
    row.other_names = row.other_names.to_uppercase();
    let except = target(store, KIND, action, &row.id)?;

    row.gender = checked_gender(&row.gender)?;
    require(store, EntityKind::Department, &row.department_id)?;
    if taken(store, KIND, &[Filter::EqNoCase("username", &row.username)], except)? {
        return Err(ValidationError::AlreadyExists("Username").into());
    }
    write(store, KIND, action, &row.id, &row)
}

/// Gender defaults to MALE when blank.
fn checked_gender(gender: &str) -> Result<String, ValidationError> {
    let gender = if gender.is_empty() { Gender::Male.as_str() } else { gender };
    Gender::parse(gender)
        .map(|g| g.as_str().to_string())
        .ok_or(ValidationError::InvalidFormat("gender"))
}

/// Levels offered by a department that must exist.
fn department_levels(store: &dyn Storage, id: &str) -> Result<Vec<Level>, ApplyError> {
    let department = store
        .get_row(EntityKind::Department, id)?
        .ok_or(ValidationError::NotFound(EntityKind::Department.label()))?;
    let department: DepartmentRow = department
        .to_row()
        .map_err(|e| ValidationError::MalformedImage(e.to_string()))?;
    Ok(department
        .levels
        .iter()
        .filter_map(|l| Level::parse(l))
        .collect())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::super::testing::*;
    use super::*;

    #[test]
    fn faculty_name_is_normalized() {
        let mut s = store();
        insert(&mut s, EntityKind::Faculty, json!({"id": "f1", "name": "  Faculty of Science "})).unwrap();
        assert_eq!(row(&s, EntityKind::Faculty, "f1").get_str("name"), Some("SCIENCE"));
    }

    #[test]
    fn faculty_name_is_unique_ignoring_case() {
        let mut s = store();
        insert(&mut s, EntityKind::Faculty, json!({"id": "f1", "name": "SCIENCE"})).unwrap();
        let result = insert(&mut s, EntityKind::Faculty, json!({"id": "f2", "name": "science"}));
        assert_eq!(message(result), "Faculty already exists");
    }

    #[test]
    fn faculty_update_excludes_own_row() {
        let mut s = store();
        insert(&mut s, EntityKind::Faculty, json!({"id": "f1", "name": "SCIENCE"})).unwrap();
        insert(&mut s, EntityKind::Faculty, json!({"id": "f2", "name": "ARTS"})).unwrap();

        let same = json!({"id": "f1", "name": "Science"});
        run(&mut s, EntityKind::Faculty, LogAction::Update, Some(same.clone()), Some(same)).unwrap();

        let clash = run(
            &mut s,
            EntityKind::Faculty,
            LogAction::Update,
            None,
            Some(json!({"id": "f2", "name": "SCIENCE"})),
        );
        assert_eq!(message(clash), "Faculty already exists");
    }

    #[test]
    fn update_and_delete_need_the_row() {
        let mut s = store();
        let missing = json!({"id": "nope", "name": "X"});
        let update = run(&mut s, EntityKind::Faculty, LogAction::Update, None, Some(missing.clone()));
        assert_eq!(message(update), "Faculty not found");
        let delete = run(&mut s, EntityKind::Faculty, LogAction::Delete, Some(missing), None);
        assert_eq!(message(delete), "Faculty not found");
    }

    #[test]
    fn department_needs_faculty_and_cleans_levels() {
        let mut s = store();
        let orphan = insert(
            &mut s,
            EntityKind::Department,
            json!({"id": "d1", "facultyId": "f9", "name": "Physics"}),
        );
        assert_eq!(message(orphan), "Faculty not found");

        insert(&mut s, EntityKind::Faculty, json!({"id": "f1", "name": "SCIENCE"})).unwrap();
        insert(
            &mut s,
            EntityKind::Department,
            json!({"id": "d1", "facultyId": "f1", "name": "Department of Physics",
                   "levels": ["L_300", "L_999", "L_300", "L_100"]}),
        )
        .unwrap();
        let dept = row(&s, EntityKind::Department, "d1");
        assert_eq!(dept.get_str("name"), Some("PHYSICS"));
        assert_eq!(dept.get("levels"), Some(&json!(["L_300", "L_100"])));

        insert(
            &mut s,
            EntityKind::Department,
            json!({"id": "d2", "facultyId": "f1", "name": "Chemistry"}),
        )
        .unwrap();
        assert_eq!(row(&s, EntityKind::Department, "d2").get("levels"), Some(&json!(["L_100"])));
    }

    #[test]
    fn course_rules() {
        let mut s = seeded();
        let base = json!({"id": "c2", "departmentId": "d1", "title": "Optics", "code": "PHY 201",
                          "level": "L_200", "semester": "SECOND"});

        let mut bad_code = base.clone();
        bad_code["code"] = json!("201PHY");
        assert_eq!(message(insert(&mut s, EntityKind::Course, bad_code)), "Invalid course code format");

        let mut bad_level = base.clone();
        bad_level["level"] = json!("L_150");
        assert_eq!(message(insert(&mut s, EntityKind::Course, bad_level)), "Invalid level format");

        let mut bad_semester = base.clone();
        bad_semester["semester"] = json!("THIRD");
        assert_eq!(message(insert(&mut s, EntityKind::Course, bad_semester)), "Invalid semester format");

        let mut no_dept = base.clone();
        no_dept["departmentId"] = json!("d9");
        assert_eq!(message(insert(&mut s, EntityKind::Course, no_dept)), "Department not found");

        let mut dup = base.clone();
        dup["code"] = json!("Phy-101");
        assert_eq!(message(insert(&mut s, EntityKind::Course, dup)), "Course already exists");

        let mut unsupported = base.clone();
        unsupported["level"] = json!("L_400");
        assert!(matches!(
            validation(insert(&mut s, EntityKind::Course, unsupported)),
            ValidationError::LevelNotSupported
        ));

        insert(&mut s, EntityKind::Course, base).unwrap();
        let course = row(&s, EntityKind::Course, "c2");
        assert_eq!(course.get_str("code"), Some("PHY201"));
        assert_eq!(course.get_str("title"), Some("OPTICS"));
    }

    #[test]
    fn student_defaults_and_unique_regno() {
        let mut s = seeded();
        let student = row(&s, EntityKind::Student, "s1");
        assert_eq!(student.get_str("gender"), Some("MALE"));
        assert_eq!(student.get_str("level"), Some("L_100"));
        assert_eq!(student.get_str("surname"), Some("ADE"));

        let dup = insert(
            &mut s,
            EntityKind::Student,
            json!({"id": "s2", "departmentId": "d1", "surname": "Eze", "regno": "2020/1"}),
        );
        assert_eq!(message(dup), "Regno already exists");

        let bad_gender = insert(
            &mut s,
            EntityKind::Student,
            json!({"id": "s3", "departmentId": "d1", "regno": "2020/3", "gender": "OTHER"}),
        );
        assert_eq!(message(bad_gender), "Invalid gender format");

        let too_senior = insert(
            &mut s,
            EntityKind::Student,
            json!({"id": "s4", "departmentId": "d1", "regno": "2020/4", "level": "L_500"}),
        );
        assert_eq!(message(too_senior), "Level not supported");
    }

    #[test]
    fn lecturer_username_is_unique() {
        let mut s = seeded();
        let dup = insert(
            &mut s,
            EntityKind::Lecturer,
            json!({"id": "l2", "departmentId": "d1", "surname": "X", "username": "IOKON"}),
        );
        assert_eq!(message(dup), "Username already exists");

        let orphan = insert(
            &mut s,
            EntityKind::Lecturer,
            json!({"id": "l3", "departmentId": "d9", "surname": "Y", "username": "y"}),
        );
        assert_eq!(message(orphan), "Department not found");
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let mut s = seeded();
        let again = insert(&mut s, EntityKind::Faculty, json!({"id": "f1", "name": "Arts"}));
        assert_eq!(message(again), "Faculty already exists");
    }
}
