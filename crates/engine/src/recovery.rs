use tracing::{debug, info};

use attendlog_core::{EntryId, LogMode};
use attendlog_storage::Storage;

use crate::error::EngineError;
use crate::handlers::HandlerTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// The store was already committed; nothing ran.
    AlreadyConsistent,
    /// Records created since the last Consistent checkpoint were undone and dropped.
    Reverted { entries: usize },
}

/// Roll local storage back to the last Consistent checkpoint.
///
/// Records are undone newest first so every restorer sees the state its
/// record left behind. Watermarks are left alone.
pub fn checkout(
    store: &mut dyn Storage,
    handlers: &HandlerTable,
) -> Result<RecoveryOutcome, EngineError> {
    let Some(current) = store.latest_checkpoint()? else {
        return Ok(RecoveryOutcome::AlreadyConsistent);
    };
    if current.mode == LogMode::Consistent {
        return Ok(RecoveryOutcome::AlreadyConsistent);
    }

    let anchor = store
        .latest_checkpoint_in(LogMode::Consistent)?
        .ok_or(EngineError::NoSavedState)?;
    let local = store.local_contributor().clone();

    if current.mode == LogMode::Replaying {
        store.push_checkpoint(LogMode::RollingBack, &local)?;
    }

    let entries = store.entries_after(anchor.set_at)?;
    info!(
        entries = entries.len(),
        since = %anchor.set_at,
        "restoring last consistent state"
    );

    let mut reverted: Vec<EntryId> = Vec::with_capacity(entries.len());
    for entry in entries.iter().rev() {
        match handlers.resolve(&entry.entity_kind) {
            Some((kind, handler)) => {
                (handler.restore)(
                    store,
                    kind,
                    entry.action,
                    entry.before_image.as_ref(),
                    entry.after_image.as_ref(),
                )?;
                reverted.push(entry.id);
            }
            None => {
                debug!(
                    entity_kind = %entry.entity_kind,
                    id = %entry.id,
                    "skipping unknown entity kind"
                );
            }
        }
    }

    if !reverted.is_empty() {
        store.delete_entries(&reverted)?;
    }
    store.push_checkpoint(LogMode::Consistent, &local)?;

    info!(reverted = reverted.len(), "system state restored");
    Ok(RecoveryOutcome::Reverted {
        entries: reverted.len(),
    })
}
