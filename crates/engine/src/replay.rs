use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use attendlog_core::{ChangeRecord, ContributorId, LogMode, Timestamp};
use attendlog_storage::Storage;

use crate::error::EngineError;
use crate::handlers::HandlerTable;

/// What one `apply` call did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub applied: usize,
    pub skipped_unknown: usize,
    pub skipped_stale: usize,
}

impl ApplyOutcome {
    pub fn changed(&self) -> bool {
        self.applied > 0
    }
}

/// Replay `records` in the order given.
///
/// A record is stale when it is no newer than its contributor's watermark as
/// loaded at the start of the batch, or than a record from the same
/// contributor already applied in this batch. Each success advances that
/// contributor's watermark to the local clock, never behind the record itself;
/// the advanced marks are persisted only once every record has gone through.
/// The first failure parks the store in RollingBack and aborts, leaving
/// earlier effects in place for `checkout`.
pub fn apply_batch(
    store: &mut dyn Storage,
    handlers: &HandlerTable,
    records: &[ChangeRecord],
) -> Result<ApplyOutcome, EngineError> {
    let mut outcome = ApplyOutcome::default();
    if records.is_empty() {
        return Ok(outcome);
    }

    let local = store.local_contributor().clone();
    match store.latest_checkpoint()? {
        None => {
            store.push_checkpoint(LogMode::Consistent, &local)?;
        }
        Some(cp) if cp.mode != LogMode::Consistent => return Err(EngineError::NoSavedState),
        Some(_) => {}
    }

    let baseline: BTreeMap<ContributorId, Timestamp> = store
        .watermarks()?
        .into_iter()
        .map(|(id, mark)| (id, mark.last_entry_at))
        .collect();
    let mut advanced = baseline.clone();
    // Newest `created_at` applied per contributor in this batch.
    let mut applied_up_to: BTreeMap<ContributorId, Timestamp> = BTreeMap::new();
    let mut previous: Option<&ContributorId> = None;

    info!(records = records.len(), "applying change batch");

    for record in records {
        let Some((kind, handler)) = handlers.resolve(&record.entity_kind) else {
            debug!(entity_kind = %record.entity_kind, id = %record.id, "skipping unknown entity kind");
            outcome.skipped_unknown += 1;
            continue;
        };

        let contributor = &record.contributor_id;
        let watermark = baseline.get(contributor).copied().unwrap_or(Timestamp::EPOCH);
        advanced.entry(contributor.clone()).or_insert(watermark);
        let seen = applied_up_to
            .get(contributor)
            .copied()
            .map_or(watermark, |at| at.max(watermark));
        if record.created_at <= seen {
            debug!(id = %record.id, %contributor, "skipping stale record");
            outcome.skipped_stale += 1;
            continue;
        }

        if previous != Some(contributor) {
            store.push_checkpoint(LogMode::Replaying, contributor)?;
        }

        let result = (handler.apply)(
            store,
            record.action,
            record.before_image.as_ref(),
            record.after_image.as_ref(),
        );
        if let Err(source) = result {
            store.push_checkpoint(LogMode::RollingBack, &local)?;
            warn!(
                id = %record.id,
                %kind,
                action = %record.action,
                error = %source,
                "record rejected, batch aborted"
            );
            return Err(EngineError::Apply {
                kind,
                action: record.action,
                source,
            });
        }

        let now = store.tick().max(record.created_at);
        advanced.insert(contributor.clone(), now);
        applied_up_to.insert(contributor.clone(), record.created_at);
        previous = Some(contributor);
        outcome.applied += 1;
    }

    for (contributor, last_entry_at) in &advanced {
        store.upsert_watermark(contributor, *last_entry_at)?;
    }

    if outcome.changed() {
        store.push_checkpoint(LogMode::Consistent, &local)?;
    }

    info!(
        applied = outcome.applied,
        stale = outcome.skipped_stale,
        unknown = outcome.skipped_unknown,
        "change batch applied"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use attendlog_core::{EntryId, LogAction, RowImage};

    use super::*;
    use crate::appliers::testing::{image, store};

    fn faculty_insert(id: &str, name: &str, contributor: &str, at: i64) -> ChangeRecord {
        ChangeRecord {
            id: EntryId::new(),
            action: LogAction::Insert,
            entity_kind: "faculties".to_string(),
            created_at: Timestamp::from_millis(at),
            contributor_id: ContributorId::from(contributor),
            before_image: None,
            after_image: Some(image(json!({"id": id, "name": name}))),
        }
    }

    fn modes(s: &attendlog_storage::SqliteStorage) -> Vec<LogMode> {
        s.checkpoints().unwrap().into_iter().map(|cp| cp.mode).collect()
    }

    #[test]
    fn empty_batch_touches_nothing() {
        let mut s = store();
        let outcome = apply_batch(&mut s, &HandlerTable::new(), &[]).unwrap();
        assert_eq!(outcome, ApplyOutcome::default());
        assert_eq!(modes(&s), vec![LogMode::Consistent]);
        assert!(s.watermarks().unwrap().is_empty());
    }

    #[test]
    fn successful_batch_closes_with_consistent() {
        let mut s = store();
        let batch = [
            faculty_insert("f1", "SCIENCE", "remote", 1_000),
            faculty_insert("f2", "ARTS", "remote", 2_000),
        ];
        let outcome = apply_batch(&mut s, &HandlerTable::new(), &batch).unwrap();
        assert_eq!(outcome.applied, 2);
        assert_eq!(
            modes(&s),
            vec![LogMode::Consistent, LogMode::Replaying, LogMode::Consistent]
        );
        let marks = s.watermarks().unwrap();
        assert!(marks[&ContributorId::from("remote")].last_entry_at > Timestamp::from_millis(2_000));
    }

    #[test]
    fn contributor_switch_writes_replaying() {
        let mut s = store();
        let batch = [
            faculty_insert("f1", "A", "one", 1_000),
            faculty_insert("f2", "B", "two", 1_000),
            faculty_insert("f3", "C", "two", 2_000),
            faculty_insert("f4", "D", "one", 3_000),
        ];
        apply_batch(&mut s, &HandlerTable::new(), &batch).unwrap();
        let replaying: Vec<_> = s
            .checkpoints()
            .unwrap()
            .into_iter()
            .filter(|cp| cp.mode == LogMode::Replaying)
            .map(|cp| cp.contributor_id.to_string())
            .collect();
        assert_eq!(replaying, vec!["one", "two", "one"]);

        // Captured records carry the contributor being replayed.
        let stamped: Vec<_> = s
            .entries()
            .unwrap()
            .into_iter()
            .map(|e| e.contributor_id.to_string())
            .collect();
        assert_eq!(stamped, vec!["one", "two", "two", "one"]);
    }

    #[test]
    fn unknown_kinds_and_stale_records_are_skipped() {
        let mut s = store();
        let remote = ContributorId::from("remote");
        s.upsert_watermark(&remote, Timestamp::from_millis(5_000)).unwrap();

        let mut unknown = faculty_insert("x1", "X", "remote", 9_000);
        unknown.entity_kind = "invoices".to_string();
        let batch = [
            unknown,
            faculty_insert("f1", "OLD", "remote", 5_000),
            faculty_insert("f2", "NEW", "remote", 6_000),
        ];
        let outcome = apply_batch(&mut s, &HandlerTable::new(), &batch).unwrap();
        assert_eq!(
            outcome,
            ApplyOutcome {
                applied: 1,
                skipped_unknown: 1,
                skipped_stale: 1
            }
        );
        assert!(!s.row_exists(attendlog_core::EntityKind::Faculty, "f1").unwrap());
        assert!(s.row_exists(attendlog_core::EntityKind::Faculty, "f2").unwrap());
    }

    #[test]
    fn repeated_record_in_one_batch_applies_once() {
        let mut s = store();
        let record = faculty_insert("f1", "SCIENCE", "remote", 1_000);
        let outcome =
            apply_batch(&mut s, &HandlerTable::new(), &[record.clone(), record]).unwrap();
        assert_eq!(outcome.applied, 1);
        assert_eq!(outcome.skipped_stale, 1);
        assert_eq!(s.latest_checkpoint().unwrap().unwrap().mode, LogMode::Consistent);
        assert_eq!(s.entry_count().unwrap(), 1);
    }

    #[test]
    fn older_record_after_newer_one_is_stale() {
        let mut s = store();
        let batch = [
            faculty_insert("f2", "ARTS", "remote", 2_000),
            faculty_insert("f1", "SCIENCE", "remote", 1_000),
            faculty_insert("f3", "LAW", "other", 1_000),
        ];
        let outcome = apply_batch(&mut s, &HandlerTable::new(), &batch).unwrap();
        assert_eq!(outcome.applied, 2);
        assert_eq!(outcome.skipped_stale, 1);
        assert!(!s.row_exists(attendlog_core::EntityKind::Faculty, "f1").unwrap());
        assert!(s.row_exists(attendlog_core::EntityKind::Faculty, "f3").unwrap());
    }

    #[test]
    fn all_stale_batch_makes_no_transition() {
        let mut s = store();
        let remote = ContributorId::from("remote");
        s.upsert_watermark(&remote, Timestamp::from_millis(5_000)).unwrap();
        let outcome =
            apply_batch(&mut s, &HandlerTable::new(), &[faculty_insert("f1", "A", "remote", 10)])
                .unwrap();
        assert!(!outcome.changed());
        assert_eq!(modes(&s), vec![LogMode::Consistent]);
    }

    #[test]
    fn failure_parks_in_rolling_back() {
        let mut s = store();
        let batch = [
            faculty_insert("f1", "SCIENCE", "remote", 1_000),
            faculty_insert("f2", "science", "remote", 2_000),
        ];
        let err = apply_batch(&mut s, &HandlerTable::new(), &batch).unwrap_err();
        assert_eq!(err.to_string(), "Faculty [INSERT] Faculty already exists");
        assert_eq!(s.latest_checkpoint().unwrap().unwrap().mode, LogMode::RollingBack);
        assert!(s.row_exists(attendlog_core::EntityKind::Faculty, "f1").unwrap());
        assert!(s.watermarks().unwrap().is_empty());
    }

    #[test]
    fn refuses_to_start_outside_consistent() {
        let mut s = store();
        let local = ContributorId::from("local");
        s.push_checkpoint(LogMode::Replaying, &local).unwrap();
        let err = apply_batch(&mut s, &HandlerTable::new(), &[faculty_insert("f1", "A", "r", 1)])
            .unwrap_err();
        assert!(matches!(err, EngineError::NoSavedState));
    }

    #[test]
    fn missing_image_is_a_validation_failure() {
        let mut s = store();
        let mut record = faculty_insert("f1", "A", "remote", 1_000);
        record.after_image = None::<RowImage>;
        let err = apply_batch(&mut s, &HandlerTable::new(), &[record]).unwrap_err();
        assert!(err.validation().is_some());
    }
}
