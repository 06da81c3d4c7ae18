//! Reassignment engine facade.
//!
//! [`ReassignmentEngine`] wires the pieces together over one
//! [`DocumentStore`]:
//!
//! ```text
//! StagingBuffer ──compute_net_changes──▶ NetChangeSet ──validate──▶ ValidationReport
//!                                              │
//!                                           commit ──▶ store + audit log
//!                                              │
//!                                          rollback
//! ```
//!
//! The engine holds no per-session state. Staging buffers belong to the
//! caller; every call re-reads what it needs from the store.

use serde::{Deserialize, Serialize};

use tracing::{info, warn};

use crate::audit::{
    self, Actor, OperationType, ReassignmentLog, RollbackMode, RollbackReport,
};
use crate::commit::commit_changes;
use crate::config::EngineConfig;
use crate::error::{Conflict, Error, Result};
use crate::models::{BusId, EntityKey, OperationId, Snapshot, StudentId};
use crate::netchange::{self, NetChangeSet};
use crate::ranking::{self, CandidateRanker, RankedBus, SplitPlan};
use crate::reconcile::{self, ReconcileReport};
use crate::staging::{StagedOperation, StagingBuffer};
use crate::store::{DocumentStore, SnapshotScope};
use crate::validation::{self, ValidationReport};

/// Outcome of a commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitReport {
    /// Documents written, in change order. Empty for a no-op.
    pub updated: Vec<EntityKey>,
    /// Audit log id. `None` for a no-op, when auditing is off, or when the
    /// audit write failed.
    pub operation_id: Option<OperationId>,
    /// The `NoOp` log of an empty commit. It is not retained in the store.
    pub no_op: Option<ReassignmentLog>,
    /// Warnings from the validation run that preceded the write.
    pub validation: ValidationReport,
}

impl CommitReport {
    /// Whether nothing was written.
    pub fn is_no_op(&self) -> bool {
        self.updated.is_empty()
    }
}

/// Stages, diffs, validates, ranks, commits and rolls back reassignments.
///
/// # Examples
///
/// ```
/// use u_reassign::engine::ReassignmentEngine;
/// use u_reassign::models::{Bus, Driver, Route};
/// use u_reassign::staging::{OperationKind, StagingBuffer};
/// use u_reassign::store::MemoryStore;
/// use u_reassign::audit::Actor;
///
/// let store = MemoryStore::new();
/// store.insert_route(Route::new("R1").with_stop("S1", "Gate"));
/// store.insert_bus(Bus::new("B1", 40, "R1").with_driver("D1"));
/// store.insert_bus(Bus::new("B2", 40, "R1").with_driver("D2"));
/// store.insert_driver(Driver::new("D1", "E1").with_bus("B1"));
/// store.insert_driver(Driver::new("D2", "E2").with_bus("B2"));
///
/// let engine = ReassignmentEngine::new(store);
/// let mut buffer = StagingBuffer::new();
/// buffer
///     .stage(OperationKind::SwapDrivers { first: "D1".into(), second: "D2".into() })
///     .unwrap();
///
/// let (set, report) = engine.preview(&buffer).unwrap();
/// assert!(report.is_ok());
/// let committed = engine.commit(&set, &Actor::new("u1", "Dispatcher")).unwrap();
/// assert_eq!(committed.updated.len(), 4);
/// ```
#[derive(Debug)]
pub struct ReassignmentEngine<S: DocumentStore> {
    store: S,
    config: EngineConfig,
    ranker: CandidateRanker,
}

impl<S: DocumentStore> ReassignmentEngine<S> {
    /// Creates an engine with the default configuration.
    pub fn new(store: S) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    /// Creates an engine with `config`.
    pub fn with_config(store: S, config: EngineConfig) -> Self {
        let ranker = CandidateRanker::from_config(&config);
        Self {
            store,
            config,
            ranker,
        }
    }

    /// Replaces the candidate ranker.
    pub fn with_ranker(mut self, ranker: CandidateRanker) -> Self {
        self.ranker = ranker;
        self
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The candidate ranker.
    pub fn ranker(&self) -> &CandidateRanker {
        &self.ranker
    }

    /// Reads a snapshot of `scope`.
    pub fn snapshot(&self, scope: &SnapshotScope) -> Result<Snapshot> {
        self.store.read_snapshot(scope)
    }

    /// Collapses `operations` into net changes against current state.
    pub fn compute_net_changes(&self, operations: &[StagedOperation]) -> Result<NetChangeSet> {
        let snapshot = self.store.read_snapshot(&SnapshotScope::All)?;
        netchange::compute_net_changes(operations, &snapshot)
    }

    /// Validates `set` against the documents it references.
    pub fn validate(&self, set: &NetChangeSet) -> Result<ValidationReport> {
        let scope = SnapshotScope::Entities(set.referenced_keys());
        let snapshot = self.store.read_snapshot(&scope)?;
        Ok(validation::validate(set, &snapshot))
    }

    /// Net changes and validation for everything in `buffer`. Writes nothing.
    pub fn preview(&self, buffer: &StagingBuffer) -> Result<(NetChangeSet, ValidationReport)> {
        let snapshot = self.store.read_snapshot(&SnapshotScope::All)?;
        let set = netchange::compute_net_changes(buffer.operations(), &snapshot)?;
        let report = validation::validate(&set, &snapshot);
        Ok((set, report))
    }

    /// Ranks `candidates` as targets for `students` leaving `source`.
    pub fn rank_candidates(
        &self,
        students: &[StudentId],
        candidates: &[BusId],
        source: Option<&BusId>,
    ) -> Result<Vec<RankedBus>> {
        let snapshot = self.store.read_snapshot(&SnapshotScope::All)?;
        self.ranker.rank(&snapshot, students, candidates, source)
    }

    /// Spreads `students` over `candidates`. The plan is not staged.
    pub fn auto_split(
        &self,
        students: &[StudentId],
        candidates: &[BusId],
        source: Option<&BusId>,
    ) -> Result<SplitPlan> {
        let snapshot = self.store.read_snapshot(&SnapshotScope::All)?;
        ranking::auto_split(&self.ranker, &snapshot, students, candidates, source)
    }

    /// Commits `set` under the configured override policy.
    ///
    /// # Errors
    /// - [`Error::Rejected`] if validation finds blocking errors.
    /// - [`Error::Conflict`] if any document changed since `set` was
    ///   computed; nothing is written.
    pub fn commit(&self, set: &NetChangeSet, actor: &Actor) -> Result<CommitReport> {
        self.commit_inner(set, actor, self.config.allow_capacity_override)
    }

    /// Commits `set`, letting capacity errors through.
    ///
    /// Other validation errors still reject the commit.
    pub fn commit_with_override(&self, set: &NetChangeSet, actor: &Actor) -> Result<CommitReport> {
        self.commit_inner(set, actor, true)
    }

    fn commit_inner(
        &self,
        set: &NetChangeSet,
        actor: &Actor,
        allow_override: bool,
    ) -> Result<CommitReport> {
        let operation_type = set.operation_type.unwrap_or(OperationType::Mixed);

        if set.is_empty() {
            let no_op = if self.config.audit_enabled {
                self.audit(|| audit::no_op_log(&self.store, operation_type, actor))
            } else {
                None
            };
            info!(
                removed = set.removed_no_ops.len(),
                actor = %actor.id,
                "nothing to commit"
            );
            return Ok(CommitReport {
                updated: Vec::new(),
                operation_id: None,
                no_op,
                validation: ValidationReport::default(),
            });
        }

        let report = self.validate(set)?;
        if report.blocks_commit(allow_override) {
            warn!(errors = report.errors.len(), "commit rejected by validation");
            return Err(Error::Rejected { report });
        }
        if !report.is_ok() {
            warn!(
                overloaded = ?validation::overloaded_buses(&report),
                actor = %actor.id,
                "committing over capacity"
            );
        }

        let updated = commit_changes(&self.store, &set.changes)?;
        let operation_id = if self.config.audit_enabled {
            self.audit(|| {
                audit::record_commit(&self.store, operation_type, actor, set.changes.clone())
            })
            .map(|log| log.operation_id)
        } else {
            None
        };

        info!(
            operation_id = operation_id.as_ref().map(|id| id.as_str()).unwrap_or("-"),
            operation_type = %operation_type,
            changes = updated.len(),
            actor = %actor.id,
            "reassignment committed"
        );
        Ok(CommitReport {
            updated,
            operation_id,
            no_op: None,
            validation: report,
        })
    }

    /// Runs an audit write. A failure is logged and does not undo the
    /// committed documents.
    fn audit<F>(&self, write: F) -> Option<ReassignmentLog>
    where
        F: FnOnce() -> Result<ReassignmentLog>,
    {
        match write() {
            Ok(log) => Some(log),
            Err(e) => {
                warn!(error = %e, "audit log write failed; documents stay committed");
                None
            }
        }
    }

    /// Reverts a committed operation, refusing if anything drifted.
    pub fn rollback(&self, id: &OperationId, actor: &Actor) -> Result<RollbackReport> {
        audit::rollback(&self.store, id, actor, RollbackMode::Strict)
    }

    /// Reverts what still can be reverted.
    ///
    /// # Errors
    /// [`Error::PartialRollbackFailure`] if some documents drifted.
    pub fn rollback_best_effort(&self, id: &OperationId, actor: &Actor) -> Result<RollbackReport> {
        audit::rollback(&self.store, id, actor, RollbackMode::BestEffort)
    }

    /// Conflicts that would block [`rollback`](Self::rollback).
    pub fn validate_rollback(&self, id: &OperationId) -> Result<Vec<Conflict>> {
        audit::validate_rollback(&self.store, id)
    }

    /// Recounts per-shift loads of `buses` (all if `None`).
    pub fn reconcile(&self, buses: Option<&[BusId]>) -> Result<ReconcileReport> {
        reconcile::reconcile(&self.store, buses)
    }

    /// The active log of `operation_type`.
    pub fn active_log(&self, operation_type: OperationType) -> Result<Option<ReassignmentLog>> {
        audit::active_log(&self.store, operation_type)
    }

    /// One log by id.
    pub fn log(&self, id: &OperationId) -> Result<Option<ReassignmentLog>> {
        audit::find_log(&self.store, id)
    }

    /// Every retained log, oldest first.
    pub fn logs(&self) -> Result<Vec<ReassignmentLog>> {
        audit::all_logs(&self.store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::LogStatus;
    use crate::models::{Bus, Document, Driver, DriverId, Route, Student};
    use crate::staging::OperationKind;
    use crate::store::MemoryStore;
    use crate::validation::ValidationIssueKind;

    fn actor() -> Actor {
        Actor::new("u1", "Dispatcher")
    }

    fn engine(config: EngineConfig) -> ReassignmentEngine<MemoryStore> {
        let store = MemoryStore::new();
        store.insert_route(Route::new("R1").with_stop("P1", "Gate").with_stop("P2", "Library"));
        store.insert_bus(Bus::new("B1", 2, "R1").with_driver("D1").with_load(1, 0));
        store.insert_bus(Bus::new("B2", 2, "R1").with_driver("D2").with_load(2, 0));
        store.insert_driver(Driver::new("D1", "E1").with_bus("B1"));
        store.insert_driver(Driver::new("D2", "E2").with_bus("B2"));
        store.insert_student(Student::new("S1", "B1", "R1", "P1"));
        store.insert_student(Student::new("S2", "B2", "R1", "P1"));
        store.insert_student(Student::new("S3", "B2", "R1", "P2"));
        ReassignmentEngine::with_config(store, config)
    }

    fn stage(kinds: Vec<OperationKind>) -> StagingBuffer {
        let mut buffer = StagingBuffer::new();
        for kind in kinds {
            buffer.stage_at(kind, 0).unwrap();
        }
        buffer
    }

    fn move_students(ids: &[&str], bus: &str) -> OperationKind {
        OperationKind::AssignStudents {
            students: ids.iter().map(|s| StudentId::new(*s)).collect(),
            bus: BusId::new(bus),
            stop: None,
        }
    }

    fn driver_of(engine: &ReassignmentEngine<MemoryStore>, bus: &str) -> Option<DriverId> {
        match engine.store().read_entity(&EntityKey::bus(&BusId::new(bus))).unwrap() {
            Some(Document::Bus(b)) => b.driver_id,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_swap_commit_and_rollback() {
        let engine = engine(EngineConfig::default());
        let buffer = stage(vec![OperationKind::SwapDrivers {
            first: DriverId::new("D1"),
            second: DriverId::new("D2"),
        }]);

        let (set, report) = engine.preview(&buffer).unwrap();
        assert!(report.is_ok());
        let committed = engine.commit(&set, &actor()).unwrap();
        assert_eq!(driver_of(&engine, "B1"), Some(DriverId::new("D2")));

        let id = committed.operation_id.unwrap();
        let active = engine
            .active_log(OperationType::DriverReassignment)
            .unwrap()
            .unwrap();
        assert_eq!(active.operation_id, id);

        engine.rollback(&id, &actor()).unwrap();
        assert_eq!(driver_of(&engine, "B1"), Some(DriverId::new("D1")));
        assert_eq!(engine.log(&id).unwrap().unwrap().status, LogStatus::RolledBack);
    }

    #[test]
    fn test_capacity_rejects_without_override() {
        let engine = engine(EngineConfig::default());
        let buffer = stage(vec![move_students(&["S1"], "B2")]);
        let (set, report) = engine.preview(&buffer).unwrap();
        assert_eq!(report.of_kind(ValidationIssueKind::Capacity).count(), 1);

        let err = engine.commit(&set, &actor()).unwrap_err();
        assert!(matches!(err, Error::Rejected { .. }));
        assert!(engine.logs().unwrap().is_empty());

        let committed = engine.commit_with_override(&set, &actor()).unwrap();
        assert!(!committed.validation.is_ok());
        assert!(committed.updated.contains(&EntityKey::student(&StudentId::new("S1"))));
    }

    #[test]
    fn test_configured_override() {
        let engine = engine(EngineConfig::default().with_capacity_override(true));
        let buffer = stage(vec![move_students(&["S1"], "B2")]);
        let (set, _) = engine.preview(&buffer).unwrap();
        assert!(engine.commit(&set, &actor()).is_ok());
    }

    #[test]
    fn test_empty_set_returns_no_op() {
        let engine = engine(EngineConfig::default());
        let buffer = stage(vec![
            move_students(&["S1"], "B2"),
            move_students(&["S1"], "B1"),
        ]);
        let (set, _) = engine.preview(&buffer).unwrap();
        assert!(set.is_empty());

        let committed = engine.commit(&set, &actor()).unwrap();
        assert!(committed.is_no_op());
        assert!(committed.operation_id.is_none());
        let log = committed.no_op.unwrap();
        assert_eq!(log.status, LogStatus::NoOp);
        assert_eq!(log.operation_type, OperationType::StudentReassignment);
        assert!(engine.log(&log.operation_id).unwrap().is_none());
        assert!(engine.logs().unwrap().is_empty());
        assert!(engine
            .active_log(OperationType::StudentReassignment)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_audit_disabled_writes_no_logs() {
        let engine = engine(EngineConfig::default().with_audit(false));
        let buffer = stage(vec![OperationKind::MarkReserved {
            driver: DriverId::new("D1"),
        }]);
        let (set, _) = engine.preview(&buffer).unwrap();
        let committed = engine.commit(&set, &actor()).unwrap();
        assert!(committed.operation_id.is_none());
        assert!(committed.no_op.is_none());
        assert_eq!(driver_of(&engine, "B1"), None);
        assert!(engine.logs().unwrap().is_empty());
    }

    #[test]
    fn test_audit_failure_keeps_commit() {
        let engine = engine(EngineConfig::default());
        engine.store().fail_log_writes(true);
        let buffer = stage(vec![OperationKind::MarkReserved {
            driver: DriverId::new("D2"),
        }]);
        let (set, _) = engine.preview(&buffer).unwrap();
        let committed = engine.commit(&set, &actor()).unwrap();
        assert!(committed.operation_id.is_none());
        assert_eq!(driver_of(&engine, "B2"), None);
    }

    #[test]
    fn test_stale_set_conflicts() {
        let engine = engine(EngineConfig::default());
        let buffer = stage(vec![OperationKind::MarkReserved {
            driver: DriverId::new("D1"),
        }]);
        let (set, _) = engine.preview(&buffer).unwrap();
        engine
            .store()
            .insert_bus(Bus::new("B1", 2, "R1").with_driver("D9").with_load(1, 0));

        let err = engine.commit(&set, &actor()).unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));
        assert_eq!(driver_of(&engine, "B1"), Some(DriverId::new("D9")));
    }
}
