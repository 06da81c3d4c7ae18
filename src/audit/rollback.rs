//! Reverting a committed operation.
//!
//! # Algorithm
//!
//! 1. Load the log; only `Committed`, non-rollback logs qualify.
//! 2. Re-read every changed document and compare it with the recorded
//!    `after` state. A mismatch means something else changed the document
//!    since the commit.
//! 3. Write the recorded `before` states in reverse application order.
//! 4. Append a `Rollback` log holding the inverted changes and mark the
//!    original `RolledBack`.
//!
//! Steps 2 to 4 run in one transaction.
//!
//! # Drift
//!
//! [`RollbackMode::Strict`] refuses to write anything when a document has
//! drifted. [`RollbackMode::BestEffort`] restores what it can, skips the
//! rest, marks both logs `Failed` and reports exactly which documents were
//! and were not restored.

use serde::{Deserialize, Serialize};

use tracing::{info, warn};

use super::writer::new_log;
use super::{Actor, LogStatus, OperationType, ReassignmentLog, RollbackOutcome};
use crate::commit::check_preconditions;
use crate::error::{Conflict, Error, Result};
use crate::models::{EntityChange, EntityKey, OperationId, Side};
use crate::store::{DocumentStore, Transaction};

/// What to do when a changed document no longer holds its committed state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackMode {
    /// Abort with [`Error::Conflict`]; nothing is written.
    #[default]
    Strict,
    /// Restore the rest and fail with [`Error::PartialRollbackFailure`].
    BestEffort,
}

/// A completed rollback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackReport {
    /// Id of the new rollback log.
    pub rollback_id: OperationId,
    /// Id of the reverted log.
    pub original_id: OperationId,
    /// Documents restored, in restore order.
    pub reverted: Vec<EntityKey>,
}

fn load_rollbackable(tx: &dyn Transaction, id: &OperationId) -> Result<ReassignmentLog> {
    let log = tx
        .get_log(id)?
        .ok_or_else(|| Error::LogNotFound(id.clone()))?;
    if log.is_rollback() {
        return Err(Error::InvalidRollback {
            operation: id.clone(),
            reason: "it is itself a rollback".to_string(),
        });
    }
    if log.status != LogStatus::Committed {
        return Err(Error::InvalidTransition {
            operation: id.clone(),
            from: log.status,
            to: LogStatus::RolledBack,
        });
    }
    Ok(log)
}

/// Checks whether `id` can be rolled back cleanly, without writing.
///
/// Returns the conflicts that would block a strict rollback; empty means
/// the rollback would restore every document.
pub fn validate_rollback<S: DocumentStore>(store: &S, id: &OperationId) -> Result<Vec<Conflict>> {
    store.transaction(|tx| {
        let log = load_rollbackable(&*tx, id)?;
        let (_, conflicts) = check_preconditions(&*tx, &log.changes, Side::After)?;
        Ok(conflicts)
    })
}

/// Reverts the operation logged as `id`.
///
/// # Errors
/// - [`Error::LogNotFound`], [`Error::InvalidRollback`] or
///   [`Error::InvalidTransition`] if the log does not qualify.
/// - [`Error::Conflict`] in strict mode when any document drifted; nothing
///   is written.
/// - [`Error::PartialRollbackFailure`] in best-effort mode when some
///   documents drifted. The restored documents and both `Failed` logs are
///   written.
pub fn rollback<S: DocumentStore>(
    store: &S,
    id: &OperationId,
    actor: &Actor,
    mode: RollbackMode,
) -> Result<RollbackReport> {
    let (report, outcome) = store.transaction(|tx| {
        let mut original = load_rollbackable(&*tx, id)?;
        let (ready, conflicts) = check_preconditions(&*tx, &original.changes, Side::After)?;
        if !conflicts.is_empty() && mode == RollbackMode::Strict {
            return Err(Error::Conflict { conflicts });
        }

        let mut reverted = Vec::with_capacity(ready.len());
        let mut inverted: Vec<EntityChange> = Vec::with_capacity(ready.len());
        for (i, mut doc) in ready.into_iter().rev() {
            let change = &original.changes[i];
            if !change.revert(&mut doc) {
                return Err(Error::Store(format!(
                    "{} holds a document of another collection",
                    change.key()
                )));
            }
            tx.put(doc)?;
            reverted.push(change.key());
            inverted.push(change.inverted());
        }

        let now = crate::current_time_ms();
        let outcome = RollbackOutcome {
            reverted: reverted.clone(),
            not_reverted: conflicts,
        };
        let mut log = new_log(
            tx,
            OperationType::Rollback,
            actor,
            inverted,
            Some(original.operation_id.clone()),
            now,
        )?;
        log.outcome = Some(outcome.clone());
        if outcome.is_complete() {
            log.transition(LogStatus::Committed, now)?;
            original.transition(LogStatus::RolledBack, now)?;
        } else {
            log.transition(LogStatus::Failed, now)?;
            original.transition(LogStatus::Failed, now)?;
        }

        let report = RollbackReport {
            rollback_id: log.operation_id.clone(),
            original_id: original.operation_id.clone(),
            reverted,
        };
        tx.put_log(log)?;
        tx.put_log(original)?;
        Ok((report, outcome))
    })?;

    if !outcome.is_complete() {
        for c in &outcome.not_reverted {
            warn!(conflict = %c, "document not reverted");
        }
        return Err(Error::PartialRollbackFailure {
            rollback: report.rollback_id,
            reverted: outcome.reverted,
            not_reverted: outcome.not_reverted,
        });
    }

    info!(
        operation_id = %report.original_id,
        rollback_id = %report.rollback_id,
        reverted = report.reverted.len(),
        actor = %actor.id,
        "operation rolled back"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::writer::{find_log, record_commit};
    use crate::commit::commit_changes;
    use crate::models::{Assignable, Bus, BusDiff, BusId, Document, DriverId};
    use crate::store::MemoryStore;

    fn actor() -> Actor {
        Actor::new("u1", "Dispatcher")
    }

    fn setup() -> (MemoryStore, OperationId) {
        let store = MemoryStore::new();
        store.insert_bus(Bus::new("B1", 40, "R1").with_driver("D1"));
        store.insert_bus(Bus::new("B2", 40, "R1").with_driver("D2"));

        let changes: Vec<EntityChange> = ["B1", "B2"]
            .iter()
            .map(|id| {
                let bus = Bus::new(*id, 40, "R1").with_driver(if *id == "B1" { "D1" } else { "D2" });
                let mut after = bus.assignment();
                after.driver_id = None;
                EntityChange::Bus(BusDiff::new(bus.id.clone(), bus.assignment(), after))
            })
            .collect();
        commit_changes(&store, &changes).unwrap();
        let log = record_commit(&store, OperationType::DriverReassignment, &actor(), changes)
            .unwrap();
        (store, log.operation_id)
    }

    fn driver_of(store: &MemoryStore, bus: &str) -> Option<DriverId> {
        match store.read_entity(&EntityKey::bus(&BusId::new(bus))).unwrap() {
            Some(Document::Bus(b)) => b.driver_id,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_rollback_restores_and_logs() {
        let (store, id) = setup();
        assert!(validate_rollback(&store, &id).unwrap().is_empty());

        let report = rollback(&store, &id, &actor(), RollbackMode::Strict).unwrap();
        assert_eq!(report.reverted.len(), 2);
        // Reverse application order.
        assert_eq!(report.reverted[0], EntityKey::bus(&BusId::new("B2")));
        assert_eq!(driver_of(&store, "B1"), Some(DriverId::new("D1")));

        let original = find_log(&store, &id).unwrap().unwrap();
        assert_eq!(original.status, LogStatus::RolledBack);
        let rb = find_log(&store, &report.rollback_id).unwrap().unwrap();
        assert_eq!(rb.operation_type, OperationType::Rollback);
        assert_eq!(rb.rollback_of, Some(id.clone()));
        assert_eq!(rb.status, LogStatus::Committed);

        // Twice is a state-machine violation.
        let err = rollback(&store, &id, &actor(), RollbackMode::Strict).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
        let err = rollback(&store, &report.rollback_id, &actor(), RollbackMode::Strict)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRollback { .. }));
    }

    #[test]
    fn test_strict_rollback_blocks_on_drift() {
        let (store, id) = setup();
        store.insert_bus(Bus::new("B2", 40, "R1").with_driver("D9"));

        let conflicts = validate_rollback(&store, &id).unwrap();
        assert_eq!(conflicts.len(), 1);
        let err = rollback(&store, &id, &actor(), RollbackMode::Strict).unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));
        assert_eq!(driver_of(&store, "B1"), None);
        assert_eq!(
            find_log(&store, &id).unwrap().unwrap().status,
            LogStatus::Committed
        );
    }

    #[test]
    fn test_best_effort_rollback_reports_partial_failure() {
        let (store, id) = setup();
        store.insert_bus(Bus::new("B2", 40, "R1").with_driver("D9"));

        let err = rollback(&store, &id, &actor(), RollbackMode::BestEffort).unwrap_err();
        let rollback_id = match err {
            Error::PartialRollbackFailure {
                rollback,
                reverted,
                not_reverted,
            } => {
                assert_eq!(reverted, vec![EntityKey::bus(&BusId::new("B1"))]);
                assert_eq!(not_reverted[0].key, EntityKey::bus(&BusId::new("B2")));
                rollback
            }
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(driver_of(&store, "B1"), Some(DriverId::new("D1")));
        assert_eq!(driver_of(&store, "B2"), Some(DriverId::new("D9")));
        assert_eq!(
            find_log(&store, &id).unwrap().unwrap().status,
            LogStatus::Failed
        );
        let rb = find_log(&store, &rollback_id).unwrap().unwrap();
        assert_eq!(rb.status, LogStatus::Failed);
        assert_eq!(rb.outcome.unwrap().not_reverted.len(), 1);
    }

    #[test]
    fn test_unknown_log() {
        let store = MemoryStore::new();
        let err = validate_rollback(&store, &OperationId::new("op-404")).unwrap_err();
        assert!(matches!(err, Error::LogNotFound(_)));
    }
}
