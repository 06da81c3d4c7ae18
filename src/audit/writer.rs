//! Appending logs and maintaining the per-type latest pointer.

use tracing::debug;

use super::{Actor, LogStatus, OperationType, ReassignmentLog};
use crate::error::Result;
use crate::models::{EntityChange, OperationId};
use crate::store::{DocumentStore, Transaction};

/// Builds a `Pending` log with a fresh id and the next version of its type.
pub(crate) fn new_log(
    tx: &mut dyn Transaction,
    operation_type: OperationType,
    actor: &Actor,
    changes: Vec<EntityChange>,
    rollback_of: Option<OperationId>,
    now_ms: i64,
) -> Result<ReassignmentLog> {
    let sequence = tx.next_sequence()?;
    let version = latest_version(tx, operation_type)? + 1;
    Ok(ReassignmentLog {
        operation_id: OperationId::new(format!("op-{sequence:08}")),
        operation_type,
        version,
        actor: actor.clone(),
        status: LogStatus::Pending,
        changes,
        rollback_of,
        outcome: None,
        created_at_ms: now_ms,
        updated_at_ms: now_ms,
    })
}

/// Highest version retained for `operation_type`, 0 if none.
fn latest_version(tx: &mut dyn Transaction, operation_type: OperationType) -> Result<u64> {
    Ok(tx
        .logs()?
        .iter()
        .filter(|l| l.operation_type == operation_type)
        .map(|l| l.version)
        .max()
        .unwrap_or(0))
}

/// Deletes every non-rollback log of `operation_type` except `keep`.
fn prune(
    tx: &mut dyn Transaction,
    operation_type: OperationType,
    keep: &OperationId,
) -> Result<Vec<OperationId>> {
    let stale: Vec<OperationId> = tx
        .logs()?
        .into_iter()
        .filter(|l| l.operation_type == operation_type && !l.is_rollback())
        .filter(|l| &l.operation_id != keep)
        .map(|l| l.operation_id)
        .collect();
    for id in &stale {
        tx.delete_log(id)?;
    }
    Ok(stale)
}

/// Appends a `Committed` log, points the type's latest pointer at it and
/// prunes the older logs of that type, all in one transaction.
pub fn record_commit<S: DocumentStore>(
    store: &S,
    operation_type: OperationType,
    actor: &Actor,
    changes: Vec<EntityChange>,
) -> Result<ReassignmentLog> {
    store.transaction(|tx| {
        let now = crate::current_time_ms();
        let mut log = new_log(tx, operation_type, actor, changes, None, now)?;
        log.transition(LogStatus::Committed, now)?;
        tx.put_log(log.clone())?;
        tx.set_latest(operation_type, &log.operation_id)?;
        let pruned = prune(tx, operation_type, &log.operation_id)?;
        debug!(
            operation_id = %log.operation_id,
            version = log.version,
            pruned = pruned.len(),
            "audit log appended"
        );
        Ok(log)
    })
}

/// Builds a `NoOp` log for an empty diff.
///
/// The log is returned, never stored. It carries the type's current
/// version and leaves the latest pointer alone.
pub fn no_op_log<S: DocumentStore>(
    store: &S,
    operation_type: OperationType,
    actor: &Actor,
) -> Result<ReassignmentLog> {
    store.transaction(|tx| {
        let now = crate::current_time_ms();
        let mut log = new_log(tx, operation_type, actor, Vec::new(), None, now)?;
        log.version = latest_version(tx, operation_type)?;
        log.transition(LogStatus::NoOp, now)?;
        debug!(operation_id = %log.operation_id, "no-op not retained");
        Ok(log)
    })
}

/// The log the type's latest pointer names.
pub fn active_log<S: DocumentStore>(
    store: &S,
    operation_type: OperationType,
) -> Result<Option<ReassignmentLog>> {
    store.transaction(|tx| match tx.latest(operation_type)? {
        Some(id) => tx.get_log(&id),
        None => Ok(None),
    })
}

/// One log by id.
pub fn find_log<S: DocumentStore>(store: &S, id: &OperationId) -> Result<Option<ReassignmentLog>> {
    store.transaction(|tx| tx.get_log(id))
}

/// Every retained log, oldest first.
pub fn all_logs<S: DocumentStore>(store: &S) -> Result<Vec<ReassignmentLog>> {
    store.transaction(|tx| tx.logs())
}
