use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use serde_json::{Map, Value};

use attendlog_core::{
    ChangeRecord, Checkpoint, CheckpointId, ContributorId, EntityKind, EntryId, LogAction,
    LogClock, LogMode, RowImage, Timestamp, Watermark,
};

use crate::error::StorageError;
use crate::schema::{self, Column, ColumnType};
use crate::traits::{Filter, Storage};

const ENTRY_COLUMNS: &str =
    "id, action, entity_kind, created_at, contributor_id, before_image, after_image";
const CHECKPOINT_COLUMNS: &str = "id, mode, set_at, contributor_id";

const NEWEST_STAMP_SQL: &str = "
SELECT MAX(stamp) FROM (
    SELECT MAX(created_at) AS stamp FROM log_entries
    UNION ALL SELECT MAX(set_at) FROM log_states
    UNION ALL SELECT MAX(last_entry_at) FROM log_contributors
)";

pub struct SqliteStorage {
    conn: Connection,
    clock: LogClock,
    local: ContributorId,
}

impl SqliteStorage {
    pub fn open(path: impl AsRef<Path>, local: ContributorId) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        Self::bootstrap(conn, local)
    }

    pub fn open_in_memory(local: ContributorId) -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::bootstrap(conn, local)
    }

    /// Creates the schema if absent, seeds the clock past every persisted
    /// stamp and writes an initial Consistent checkpoint on a fresh store.
    fn bootstrap(conn: Connection, local: ContributorId) -> Result<Self, StorageError> {
        schema::init_schema(&conn)?;
        let newest: Option<i64> = conn.query_row(NEWEST_STAMP_SQL, [], |row| row.get(0))?;
        let clock = match newest {
            Some(millis) => LogClock::starting_after(Timestamp::from_millis(millis)),
            None => LogClock::new(),
        };
        let mut storage = Self { conn, clock, local };
        if storage.latest_checkpoint()?.is_none() {
            let local = storage.local.clone();
            storage.push_checkpoint(LogMode::Consistent, &local)?;
        }
        Ok(storage)
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

fn conversion_error<E>(index: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(err))
}

fn read_entry(row: &rusqlite::Row) -> rusqlite::Result<ChangeRecord> {
    let id: String = row.get(0)?;
    let action: String = row.get(1)?;
    let before: Option<String> = row.get(5)?;
    let after: Option<String> = row.get(6)?;

    let parse_image = |index: usize, raw: Option<String>| -> rusqlite::Result<Option<RowImage>> {
        raw.map(|s| serde_json::from_str::<RowImage>(&s))
            .transpose()
            .map_err(|e| conversion_error(index, e))
    };

    Ok(ChangeRecord {
        id: EntryId::parse(&id).map_err(|e| conversion_error(0, e))?,
        action: LogAction::parse(&action).map_err(|e| conversion_error(1, e))?,
        entity_kind: row.get(2)?,
        created_at: Timestamp::from_millis(row.get(3)?),
        contributor_id: ContributorId::new(row.get::<_, String>(4)?),
        before_image: parse_image(5, before)?,
        after_image: parse_image(6, after)?,
    })
}

fn read_checkpoint(row: &rusqlite::Row) -> rusqlite::Result<Checkpoint> {
    let id: String = row.get(0)?;
    let mode: String = row.get(1)?;
    Ok(Checkpoint {
        id: CheckpointId::parse(&id).map_err(|e| conversion_error(0, e))?,
        mode: LogMode::parse(&mode).map_err(|e| conversion_error(1, e))?,
        set_at: Timestamp::from_millis(row.get(2)?),
        contributor_id: ContributorId::new(row.get::<_, String>(3)?),
    })
}

fn read_image(row: &rusqlite::Row, cols: &[Column]) -> rusqlite::Result<RowImage> {
    let mut map = Map::new();
    for (index, col) in cols.iter().enumerate() {
        let raw: Option<String> = row.get(index)?;
        let value = match (col.ty, raw) {
            (_, None) => Value::Null,
            (ColumnType::Text, Some(s)) => Value::String(s),
            (ColumnType::Json, Some(s)) => {
                serde_json::from_str(&s).map_err(|e| conversion_error(index, e))?
            }
        };
        map.insert(col.field.to_string(), value);
    }
    Ok(RowImage::from_map(map))
}

fn bind_value(col: &Column, value: Option<&Value>) -> Result<Option<String>, StorageError> {
    match (col.ty, value) {
        (_, None | Some(Value::Null)) => Ok(None),
        (ColumnType::Text, Some(Value::String(s))) => Ok(Some(s.clone())),
        (ColumnType::Text, Some(other)) => Ok(Some(other.to_string())),
        (ColumnType::Json, Some(v)) => serde_json::to_string(v)
            .map(Some)
            .map_err(|e| StorageError::Serialization(e.to_string())),
    }
}

fn bind_image(kind: EntityKind, image: &RowImage) -> Result<Vec<Option<String>>, StorageError> {
    schema::columns(kind)
        .iter()
        .map(|col| bind_value(col, image.get(col.field)))
        .collect()
}

fn encode_image(image: Option<&RowImage>) -> Result<Option<String>, StorageError> {
    image
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| StorageError::Serialization(e.to_string()))
}

fn column_list(kind: EntityKind) -> String {
    schema::columns(kind)
        .iter()
        .map(|c| c.name)
        .collect::<Vec<_>>()
        .join(", ")
}

fn read_row(conn: &Connection, kind: EntityKind, id: &str) -> Result<Option<RowImage>, StorageError> {
    let sql = format!(
        "SELECT {} FROM {} WHERE id = ?1",
        column_list(kind),
        kind.table_name()
    );
    let cols = schema::columns(kind);
    let image = conn
        .query_row(&sql, [id], |row| read_image(row, cols))
        .optional()?;
    Ok(image)
}

fn insert_image(conn: &Connection, kind: EntityKind, image: &RowImage) -> Result<(), StorageError> {
    let values = bind_image(kind, image)?;
    let placeholders = (1..=values.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        kind.table_name(),
        column_list(kind),
        placeholders
    );
    conn.execute(&sql, params_from_iter(values.iter()))?;
    Ok(())
}

fn update_image(conn: &Connection, kind: EntityKind, image: &RowImage) -> Result<(), StorageError> {
    let values = bind_image(kind, image)?;
    // Column 0 is always id, bound as ?1 in the WHERE clause.
    let assignments = schema::columns(kind)
        .iter()
        .enumerate()
        .skip(1)
        .map(|(i, c)| format!("{} = ?{}", c.name, i + 1))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "UPDATE {} SET {} WHERE id = ?1",
        kind.table_name(),
        assignments
    );
    conn.execute(&sql, params_from_iter(values.iter()))?;
    Ok(())
}

fn where_clause<'a>(
    kind: EntityKind,
    filters: &[Filter<'a>],
) -> Result<(String, Vec<&'a str>), StorageError> {
    let mut clauses = Vec::with_capacity(filters.len());
    let mut values = Vec::with_capacity(filters.len());
    for filter in filters {
        let n = values.len() + 1;
        let (field, value, clause) = match *filter {
            Filter::Eq(field, value) => (field, value, "{col} = ?{n}"),
            Filter::EqNoCase(field, value) => (field, value, "{col} = ?{n} COLLATE NOCASE"),
            Filter::Ne(field, value) => (field, value, "{col} IS NOT ?{n}"),
        };
        let col = schema::column(kind, field)?;
        clauses.push(
            clause
                .replace("{col}", col.name)
                .replace("{n}", &n.to_string()),
        );
        values.push(value);
    }
    if clauses.is_empty() {
        return Ok((String::new(), values));
    }
    Ok((format!(" WHERE {}", clauses.join(" AND ")), values))
}

/// Contributor to stamp captured records with, or None while rolling back.
fn capture_contributor(
    conn: &Connection,
    local: &ContributorId,
) -> Result<Option<ContributorId>, StorageError> {
    let latest = conn
        .query_row(
            &format!(
                "SELECT {CHECKPOINT_COLUMNS} FROM log_states ORDER BY set_at DESC, rowid DESC LIMIT 1"
            ),
            [],
            read_checkpoint,
        )
        .optional()?;
    Ok(match latest {
        Some(cp) if cp.mode == LogMode::RollingBack => None,
        Some(cp) => Some(cp.contributor_id),
        None => Some(local.clone()),
    })
}

fn write_entry(conn: &Connection, record: &ChangeRecord) -> Result<(), StorageError> {
    conn.execute(
        &format!("INSERT INTO log_entries ({ENTRY_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
        params![
            record.id.to_string(),
            record.action.as_str(),
            record.entity_kind,
            record.created_at.as_millis(),
            record.contributor_id.as_str(),
            encode_image(record.before_image.as_ref())?,
            encode_image(record.after_image.as_ref())?,
        ],
    )?;
    Ok(())
}

/// Collects every row that depends on `(kind, id)`, deepest first.
fn collect_dependents(
    conn: &Connection,
    kind: EntityKind,
    id: &str,
    seen: &mut HashSet<(EntityKind, String)>,
    out: &mut Vec<(EntityKind, String)>,
) -> Result<(), StorageError> {
    for dep in schema::dependents(kind) {
        let col = schema::column(dep.kind, dep.field)?;
        let sql = format!(
            "SELECT id FROM {} WHERE {} = ?1 ORDER BY rowid",
            dep.kind.table_name(),
            col.name
        );
        let mut stmt = conn.prepare(&sql)?;
        let child_ids = stmt
            .query_map([id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        for child_id in child_ids {
            if seen.insert((dep.kind, child_id.clone())) {
                collect_dependents(conn, dep.kind, &child_id, seen, out)?;
                out.push((dep.kind, child_id));
            }
        }
    }
    Ok(())
}

fn captured(
    action: LogAction,
    kind: EntityKind,
    created_at: Timestamp,
    contributor_id: ContributorId,
    before_image: Option<RowImage>,
    after_image: Option<RowImage>,
) -> ChangeRecord {
    ChangeRecord {
        id: EntryId::new(),
        action,
        entity_kind: kind.table_name().to_string(),
        created_at,
        contributor_id,
        before_image,
        after_image,
    }
}

impl Storage for SqliteStorage {
    fn local_contributor(&self) -> &ContributorId {
        &self.local
    }

    fn tick(&mut self) -> Timestamp {
        self.clock.tick()
    }

    fn observe(&mut self, seen: Timestamp) {
        self.clock.observe(seen);
    }

    fn entries(&self) -> Result<Vec<ChangeRecord>, StorageError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM log_entries ORDER BY created_at, rowid"
        ))?;
        let entries = stmt
            .query_map([], read_entry)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn entries_after(&self, after: Timestamp) -> Result<Vec<ChangeRecord>, StorageError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM log_entries WHERE created_at > ?1 ORDER BY created_at, rowid"
        ))?;
        let entries = stmt
            .query_map([after.as_millis()], read_entry)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn delete_entries(&mut self, ids: &[EntryId]) -> Result<usize, StorageError> {
        let tx = self.conn.transaction()?;
        let mut deleted = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM log_entries WHERE id = ?1")?;
            for id in ids {
                deleted += stmt.execute([id.to_string()])?;
            }
        }
        tx.commit()?;
        Ok(deleted)
    }

    fn entry_count(&self) -> Result<u64, StorageError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM log_entries", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn latest_checkpoint(&self) -> Result<Option<Checkpoint>, StorageError> {
        let cp = self
            .conn
            .query_row(
                &format!(
                    "SELECT {CHECKPOINT_COLUMNS} FROM log_states ORDER BY set_at DESC, rowid DESC LIMIT 1"
                ),
                [],
                read_checkpoint,
            )
            .optional()?;
        Ok(cp)
    }

    fn latest_checkpoint_in(&self, mode: LogMode) -> Result<Option<Checkpoint>, StorageError> {
        let cp = self
            .conn
            .query_row(
                &format!(
                    "SELECT {CHECKPOINT_COLUMNS} FROM log_states WHERE mode = ?1 ORDER BY set_at DESC, rowid DESC LIMIT 1"
                ),
                [mode.as_str()],
                read_checkpoint,
            )
            .optional()?;
        Ok(cp)
    }

    fn push_checkpoint(
        &mut self,
        mode: LogMode,
        contributor_id: &ContributorId,
    ) -> Result<Checkpoint, StorageError> {
        let cp = Checkpoint {
            id: CheckpointId::new(),
            mode,
            set_at: self.clock.tick(),
            contributor_id: contributor_id.clone(),
        };
        self.conn.execute(
            &format!("INSERT INTO log_states ({CHECKPOINT_COLUMNS}) VALUES (?1, ?2, ?3, ?4)"),
            params![
                cp.id.to_string(),
                cp.mode.as_str(),
                cp.set_at.as_millis(),
                cp.contributor_id.as_str(),
            ],
        )?;
        Ok(cp)
    }

    fn checkpoints(&self) -> Result<Vec<Checkpoint>, StorageError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CHECKPOINT_COLUMNS} FROM log_states ORDER BY set_at, rowid"
        ))?;
        let cps = stmt
            .query_map([], read_checkpoint)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(cps)
    }

    fn watermarks(&self) -> Result<BTreeMap<ContributorId, Watermark>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT contributor_id, last_entry_at, added_at FROM log_contributors")?;
        let rows = stmt.query_map([], |row| {
            Ok(Watermark {
                contributor_id: ContributorId::new(row.get::<_, String>(0)?),
                last_entry_at: Timestamp::from_millis(row.get(1)?),
                added_at: Timestamp::from_millis(row.get(2)?),
            })
        })?;

        let mut marks = BTreeMap::new();
        for row in rows {
            let mark = row?;
            marks.insert(mark.contributor_id.clone(), mark);
        }
        Ok(marks)
    }

    fn upsert_watermark(
        &mut self,
        contributor_id: &ContributorId,
        last_entry_at: Timestamp,
    ) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO log_contributors (contributor_id, last_entry_at, added_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(contributor_id) DO UPDATE SET last_entry_at = excluded.last_entry_at",
            params![
                contributor_id.as_str(),
                last_entry_at.as_millis(),
                Timestamp::now().as_millis(),
            ],
        )?;
        self.clock.observe(last_entry_at);
        Ok(())
    }

    fn get_row(&self, kind: EntityKind, id: &str) -> Result<Option<RowImage>, StorageError> {
        read_row(&self.conn, kind, id)
    }

    fn row_exists(&self, kind: EntityKind, id: &str) -> Result<bool, StorageError> {
        let found: Option<i64> = self
            .conn
            .query_row(
                &format!("SELECT 1 FROM {} WHERE id = ?1", kind.table_name()),
                [id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn find_rows(
        &self,
        kind: EntityKind,
        filters: &[Filter<'_>],
    ) -> Result<Vec<RowImage>, StorageError> {
        let (clause, values) = where_clause(kind, filters)?;
        let sql = format!(
            "SELECT {} FROM {}{} ORDER BY rowid",
            column_list(kind),
            kind.table_name(),
            clause
        );
        let cols = schema::columns(kind);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), |row| read_image(row, cols))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn count_rows(&self, kind: EntityKind, filters: &[Filter<'_>]) -> Result<u64, StorageError> {
        let (clause, values) = where_clause(kind, filters)?;
        let sql = format!("SELECT COUNT(*) FROM {}{}", kind.table_name(), clause);
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(values.iter()), |row| row.get(0))?;
        Ok(count as u64)
    }

    fn insert_row(&mut self, kind: EntityKind, image: &RowImage) -> Result<(), StorageError> {
        let id = image.id().ok_or(StorageError::MissingId(kind))?.to_string();
        let tx = self.conn.transaction()?;
        let contributor = capture_contributor(&tx, &self.local)?;
        insert_image(&tx, kind, image)?;
        if let Some(contributor_id) = contributor {
            let after = read_row(&tx, kind, &id)?;
            let record = captured(
                LogAction::Insert,
                kind,
                self.clock.tick(),
                contributor_id,
                None,
                after,
            );
            write_entry(&tx, &record)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn update_row(&mut self, kind: EntityKind, image: &RowImage) -> Result<bool, StorageError> {
        let id = image.id().ok_or(StorageError::MissingId(kind))?.to_string();
        let tx = self.conn.transaction()?;
        let Some(before) = read_row(&tx, kind, &id)? else {
            return Ok(false);
        };
        let contributor = capture_contributor(&tx, &self.local)?;
        update_image(&tx, kind, image)?;
        if let Some(contributor_id) = contributor {
            let after = read_row(&tx, kind, &id)?;
            let record = captured(
                LogAction::Update,
                kind,
                self.clock.tick(),
                contributor_id,
                Some(before),
                after,
            );
            write_entry(&tx, &record)?;
        }
        tx.commit()?;
        Ok(true)
    }

    fn delete_row(&mut self, kind: EntityKind, id: &str) -> Result<bool, StorageError> {
        let tx = self.conn.transaction()?;
        if read_row(&tx, kind, id)?.is_none() {
            return Ok(false);
        }
        let contributor = capture_contributor(&tx, &self.local)?;

        let mut seen = HashSet::from([(kind, id.to_string())]);
        let mut doomed = Vec::new();
        collect_dependents(&tx, kind, id, &mut seen, &mut doomed)?;
        doomed.push((kind, id.to_string()));

        for (row_kind, row_id) in doomed {
            let before = read_row(&tx, row_kind, &row_id)?;
            tx.execute(
                &format!("DELETE FROM {} WHERE id = ?1", row_kind.table_name()),
                [&row_id],
            )?;
            if let (Some(contributor_id), Some(before)) = (&contributor, before) {
                let record = captured(
                    LogAction::Delete,
                    row_kind,
                    self.clock.tick(),
                    contributor_id.clone(),
                    Some(before),
                    None,
                );
                write_entry(&tx, &record)?;
            }
        }
        tx.commit()?;
        Ok(true)
    }
}
