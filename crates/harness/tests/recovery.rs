use attendlog_core::{ChangeRecord, ContributorId, EntityKind, LogMode, RowImage, Timestamp};
use attendlog_engine::{EngineError, RecoveryOutcome};
use attendlog_harness::{TestDevice, records};
use attendlog_storage::Storage;
use serde_json::json;

fn school(contributor: &str) -> Vec<ChangeRecord> {
    vec![
        records::insert(
            "faculties",
            contributor,
            1,
            json!({"id": "f1", "name": "SCIENCE", "createdAt": "2024-01-01T00:00:00.000Z",
                   "metadata": {"source": "registry"}}),
        ),
        records::insert(
            "departments",
            contributor,
            2,
            json!({"id": "d1", "facultyId": "f1", "name": "PHYSICS", "levels": ["L_100"]}),
        ),
        records::insert(
            "courses",
            contributor,
            3,
            json!({"id": "c1", "departmentId": "d1", "title": "MECHANICS", "code": "PHY101",
                   "level": "L_100", "semester": "FIRST"}),
        ),
    ]
}

fn snapshot(
    device: &mut TestDevice,
    kind: EntityKind,
    id: &str,
) -> Result<RowImage, Box<dyn std::error::Error>> {
    Ok(device
        .row(kind, id)?
        .ok_or_else(|| format!("{kind} {id} missing"))?)
}

// ============================================================================
// Failed batches
// ============================================================================

#[test]
fn partial_batch_is_fully_reverted() -> Result<(), Box<dyn std::error::Error>> {
    let mut device = TestDevice::new("device-b")?;
    let batch = [
        records::insert("faculties", "a", 1, json!({"id": "f1", "name": "SCIENCE"})),
        records::insert(
            "departments",
            "a",
            2,
            json!({"id": "d1", "facultyId": "f1", "name": "PHYSICS"}),
        ),
        records::insert(
            "courses",
            "a",
            3,
            json!({"id": "c1", "departmentId": "d9", "title": "MECHANICS", "code": "PHY101",
                   "level": "L_100", "semester": "FIRST"}),
        ),
    ];

    let err = device.apply(&batch).unwrap_err();
    assert_eq!(err.to_string(), "Course [INSERT] Department not found");
    assert!(device.has(EntityKind::Faculty, "f1")?);
    assert!(device.has(EntityKind::Department, "d1")?);
    assert_eq!(device.mode()?, LogMode::RollingBack);
    assert_eq!(device.entries()?.len(), 2);
    assert_eq!(device.watermark("a")?, None);

    let outcome = device.checkout()?;
    assert_eq!(outcome, RecoveryOutcome::Reverted { entries: 2 });
    assert!(!device.has(EntityKind::Faculty, "f1")?);
    assert!(!device.has(EntityKind::Department, "d1")?);
    assert!(device.entries()?.is_empty());
    assert_eq!(device.mode()?, LogMode::Consistent);
    Ok(())
}

#[test]
fn reverted_update_restores_the_exact_row() -> Result<(), Box<dyn std::error::Error>> {
    let mut device = TestDevice::new("device-b")?;
    device.apply(&school("device-a"))?;
    let original = snapshot(&mut device, EntityKind::Faculty, "f1")?;
    assert_eq!(original.get("metadata"), Some(&json!({"source": "registry"})));

    let batch = [
        records::update(
            "faculties",
            "device-c",
            10,
            serde_json::to_value(&original)?,
            json!({"id": "f1", "name": "ARTS"}),
        ),
        records::insert(
            "departments",
            "device-c",
            11,
            json!({"id": "d2", "facultyId": "f9", "name": "HISTORY"}),
        ),
    ];
    let err = device.apply(&batch).unwrap_err();
    assert_eq!(err.to_string(), "Department [INSERT] Faculty not found");
    let changed = snapshot(&mut device, EntityKind::Faculty, "f1")?;
    assert_eq!(changed.get_str("name"), Some("ARTS"));

    device.checkout()?;
    assert_eq!(snapshot(&mut device, EntityKind::Faculty, "f1")?, original);
    Ok(())
}

#[test]
fn reverted_delete_brings_back_cascaded_rows() -> Result<(), Box<dyn std::error::Error>> {
    let mut device = TestDevice::new("device-b")?;
    device.apply(&school("device-a"))?;
    let faculty = snapshot(&mut device, EntityKind::Faculty, "f1")?;
    let department = snapshot(&mut device, EntityKind::Department, "d1")?;
    let course = snapshot(&mut device, EntityKind::Course, "c1")?;

    let batch = [
        records::delete("faculties", "device-c", 10, serde_json::to_value(&faculty)?),
        records::insert("faculties", "device-c", 11, json!({"id": "f2", "name": "ARTS"})),
        records::insert(
            "courses",
            "device-c",
            12,
            json!({"id": "c2", "departmentId": "d1", "title": "OPTICS", "code": "PHY102",
                   "level": "L_100", "semester": "FIRST"}),
        ),
    ];
    let err = device.apply(&batch).unwrap_err();
    assert_eq!(err.to_string(), "Course [INSERT] Department not found");
    assert!(!device.has(EntityKind::Course, "c1")?);

    let outcome = device.checkout()?;
    assert_eq!(outcome, RecoveryOutcome::Reverted { entries: 4 });
    assert_eq!(snapshot(&mut device, EntityKind::Faculty, "f1")?, faculty);
    assert_eq!(snapshot(&mut device, EntityKind::Department, "d1")?, department);
    assert_eq!(snapshot(&mut device, EntityKind::Course, "c1")?, course);
    assert!(!device.has(EntityKind::Faculty, "f2")?);
    Ok(())
}

// ============================================================================
// Interrupted runs
// ============================================================================

#[test]
fn checkout_when_consistent_does_nothing() -> Result<(), Box<dyn std::error::Error>> {
    let mut device = TestDevice::new("device-b")?;
    device.create_faculty("f1", "SCIENCE")?;
    assert_eq!(device.checkout()?, RecoveryOutcome::AlreadyConsistent);
    assert!(device.has(EntityKind::Faculty, "f1")?);
    Ok(())
}

#[test]
fn interrupted_replay_is_rolled_back() -> Result<(), Box<dyn std::error::Error>> {
    let mut device = TestDevice::new("device-b")?;
    device
        .storage()?
        .push_checkpoint(LogMode::Replaying, &ContributorId::from("device-a"))?;
    device.create_faculty("f1", "SCIENCE")?;
    device.create_department("d1", "f1", "PHYSICS")?;

    let outcome = device.checkout()?;
    assert_eq!(outcome, RecoveryOutcome::Reverted { entries: 2 });
    assert_eq!(device.count(EntityKind::Faculty)?, 0);
    assert_eq!(device.count(EntityKind::Department)?, 0);

    let modes: Vec<LogMode> = device
        .storage()?
        .checkpoints()?
        .into_iter()
        .map(|cp| cp.mode)
        .collect();
    assert_eq!(
        modes[modes.len() - 3..],
        [LogMode::Replaying, LogMode::RollingBack, LogMode::Consistent]
    );
    Ok(())
}

#[test]
fn missing_anchor_is_fatal() -> Result<(), Box<dyn std::error::Error>> {
    let mut device = TestDevice::new("device-b")?;
    device
        .storage()?
        .conn()
        .execute("UPDATE log_states SET mode = 'rolling_back'", [])?;

    assert!(matches!(device.checkout(), Err(EngineError::NoSavedState)));
    let batch = [records::insert("faculties", "a", 1, json!({"id": "f1", "name": "SCIENCE"}))];
    assert!(matches!(device.apply(&batch), Err(EngineError::NoSavedState)));
    Ok(())
}

#[test]
fn checkout_leaves_watermarks_behind() -> Result<(), Box<dyn std::error::Error>> {
    // A run that advanced the watermark but died before committing.
    let mut device = TestDevice::new("device-b")?;
    let remote = ContributorId::from("device-a");
    {
        let storage = device.storage()?;
        storage.push_checkpoint(LogMode::Replaying, &remote)?;
        storage.insert_row(
            EntityKind::Faculty,
            &serde_json::from_value(json!({"id": "f1", "name": "SCIENCE"}))?,
        )?;
        storage.upsert_watermark(&remote, Timestamp::now())?;
    }

    device.checkout()?;
    assert!(!device.has(EntityKind::Faculty, "f1")?);
    assert!(device.watermark("device-a")?.is_some());

    // The reverted record is now considered already seen.
    let batch = [records::insert(
        "faculties",
        "device-a",
        1,
        json!({"id": "f1", "name": "SCIENCE"}),
    )];
    let outcome = device.apply(&batch)?;
    assert_eq!(outcome.applied, 0);
    assert_eq!(outcome.skipped_stale, 1);
    assert!(!device.has(EntityKind::Faculty, "f1")?);
    Ok(())
}
