use attendlog_core::{
    ChangeRecord, ContributorId, EntityKind, LogMode, RowImage, Timestamp,
};
use attendlog_engine::{ApplyOutcome, Engine, EngineConfig, EngineError, RecoveryOutcome};
use attendlog_storage::{SqliteStorage, Storage};
use serde_json::{Value, json};

type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// One deployment: an engine over its own in-memory database.
///
/// Local writes go straight through the capturing repository, the way the
/// application's own routes would after validating.
pub struct TestDevice {
    pub engine: Engine,
}

impl TestDevice {
    pub fn new(contributor: &str) -> Result<Self, EngineError> {
        let config = EngineConfig::builder()
            .in_memory()
            .contributor_id(contributor)
            .build();
        let mut engine = Engine::new(config);
        engine.open()?;
        Ok(Self { engine })
    }

    pub fn contributor(&self) -> &ContributorId {
        &self.engine.config().contributor_id
    }

    pub fn storage(&mut self) -> Result<&mut SqliteStorage, EngineError> {
        self.engine.storage_mut()
    }

    // ------------------------------------------------------------------
    // Local writes
    // ------------------------------------------------------------------

    /// Insert a row, filling `createdAt`/`updatedAt` when absent.
    pub fn insert(&mut self, kind: EntityKind, row: Value) -> TestResult {
        let image = stamped(row)?;
        self.storage()?.insert_row(kind, &image)?;
        Ok(())
    }

    pub fn update(&mut self, kind: EntityKind, row: Value) -> TestResult {
        let image = stamped(row)?;
        if !self.storage()?.update_row(kind, &image)? {
            return Err(format!("{kind} {:?} not found", image.id()).into());
        }
        Ok(())
    }

    pub fn delete(&mut self, kind: EntityKind, id: &str) -> TestResult {
        if !self.storage()?.delete_row(kind, id)? {
            return Err(format!("{kind} {id} not found").into());
        }
        Ok(())
    }

    pub fn create_faculty(&mut self, id: &str, name: &str) -> TestResult {
        self.insert(EntityKind::Faculty, json!({"id": id, "name": name}))
    }

    pub fn create_department(&mut self, id: &str, faculty_id: &str, name: &str) -> TestResult {
        self.insert(
            EntityKind::Department,
            json!({"id": id, "facultyId": faculty_id, "name": name, "levels": ["L_100", "L_200"]}),
        )
    }

    pub fn create_course(&mut self, id: &str, department_id: &str, code: &str) -> TestResult {
        self.insert(
            EntityKind::Course,
            json!({"id": id, "departmentId": department_id, "title": format!("Course {code}"),
                   "code": code, "level": "L_100", "semester": "FIRST"}),
        )
    }

    pub fn create_student(&mut self, id: &str, department_id: &str, regno: &str) -> TestResult {
        self.insert(
            EntityKind::Student,
            json!({"id": id, "departmentId": department_id, "surname": "STUDENT",
                   "otherNames": id.to_uppercase(), "gender": "MALE", "regno": regno, "level": "L_100"}),
        )
    }

    // ------------------------------------------------------------------
    // Engine passthroughs
    // ------------------------------------------------------------------

    pub fn entries(&mut self) -> Result<Vec<ChangeRecord>, EngineError> {
        self.engine.entries()
    }

    pub fn apply(&mut self, records: &[ChangeRecord]) -> Result<ApplyOutcome, EngineError> {
        self.engine.apply(records)
    }

    pub fn checkout(&mut self) -> Result<RecoveryOutcome, EngineError> {
        self.engine.checkout()
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn row(&mut self, kind: EntityKind, id: &str) -> TestResult<Option<RowImage>> {
        Ok(self.storage()?.get_row(kind, id)?)
    }

    pub fn has(&mut self, kind: EntityKind, id: &str) -> TestResult<bool> {
        Ok(self.storage()?.row_exists(kind, id)?)
    }

    pub fn count(&mut self, kind: EntityKind) -> TestResult<u64> {
        Ok(self.storage()?.count_rows(kind, &[])?)
    }

    pub fn mode(&mut self) -> TestResult<LogMode> {
        let checkpoint = self
            .storage()?
            .latest_checkpoint()?
            .ok_or("no checkpoint")?;
        Ok(checkpoint.mode)
    }

    pub fn watermark(&mut self, contributor: &str) -> TestResult<Option<Timestamp>> {
        let marks = self.storage()?.watermarks()?;
        Ok(marks
            .get(&ContributorId::from(contributor))
            .map(|w| w.last_entry_at))
    }
}

fn stamped(row: Value) -> TestResult<RowImage> {
    let mut image: RowImage = serde_json::from_value(row)?;
    let now = Timestamp::now().to_rfc3339()?;
    for field in ["createdAt", "updatedAt"] {
        if image.get(field).is_none() {
            image.insert(field, now.clone());
        }
    }
    Ok(image)
}
