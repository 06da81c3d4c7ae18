//! Audit log records and their status machine.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Conflict;
use crate::models::{EntityChange, EntityKey, OperationId};

/// Kind of reassignment a log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    /// Driver assign, swap or reserve.
    DriverReassignment,
    /// Students moved between buses.
    StudentReassignment,
    /// A bus pointed at another route.
    RouteReassignment,
    /// More than one of the above in one commit.
    Mixed,
    /// Reversal of an earlier log.
    Rollback,
}

impl OperationType {
    /// Snake-case name used in logs and ids.
    pub fn as_str(self) -> &'static str {
        match self {
            OperationType::DriverReassignment => "driver_reassignment",
            OperationType::StudentReassignment => "student_reassignment",
            OperationType::RouteReassignment => "route_reassignment",
            OperationType::Mixed => "mixed",
            OperationType::Rollback => "rollback",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a log.
///
/// ```text
/// Pending ──► Committed ──► RolledBack
///    │            │
///    │            └──────► Failed
///    ├──► NoOp
///    └──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    /// Written, changes not yet confirmed.
    Pending,
    /// Changes are in the store.
    Committed,
    /// Changes were reverted by a rollback.
    RolledBack,
    /// A write or rollback could not complete.
    Failed,
    /// The diff was empty; nothing was written.
    NoOp,
}

impl LogStatus {
    /// Whether the status machine allows moving to `next`.
    pub fn can_transition_to(self, next: LogStatus) -> bool {
        !self.is_terminal()
            && matches!(
                (self, next),
                (LogStatus::Pending, LogStatus::Committed)
                    | (LogStatus::Pending, LogStatus::NoOp)
                    | (LogStatus::Pending, LogStatus::Failed)
                    | (LogStatus::Committed, LogStatus::RolledBack)
                    | (LogStatus::Committed, LogStatus::Failed)
            )
    }

    /// Whether no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            LogStatus::RolledBack | LogStatus::Failed | LogStatus::NoOp
        )
    }
}

/// Who performed an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Stable user id.
    pub id: String,
    /// Display name.
    pub label: String,
}

impl Actor {
    /// Creates an actor.
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// Which documents a rollback restored and which it left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackOutcome {
    /// Documents restored to their pre-commit state.
    pub reverted: Vec<EntityKey>,
    /// Documents skipped because they drifted or disappeared.
    pub not_reverted: Vec<Conflict>,
}

impl RollbackOutcome {
    /// Whether every document was restored.
    pub fn is_complete(&self) -> bool {
        self.not_reverted.is_empty()
    }
}

/// One entry of the append-only audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReassignmentLog {
    /// Unique id.
    pub operation_id: OperationId,
    /// Kind of operation.
    pub operation_type: OperationType,
    /// Position among logs of the same type, starting at 1.
    pub version: u64,
    /// Who performed it.
    pub actor: Actor,
    /// Current status.
    pub status: LogStatus,
    /// Changes in application order.
    pub changes: Vec<EntityChange>,
    /// For rollback logs, the log being reverted.
    pub rollback_of: Option<OperationId>,
    /// For rollback logs, what was restored.
    pub outcome: Option<RollbackOutcome>,
    /// Creation time (ms since Unix epoch).
    pub created_at_ms: i64,
    /// Last status change (ms since Unix epoch).
    pub updated_at_ms: i64,
}

impl ReassignmentLog {
    /// Whether this log records a rollback.
    pub fn is_rollback(&self) -> bool {
        self.operation_type == OperationType::Rollback
    }

    /// Keys of the changed documents, in application order.
    pub fn changed_keys(&self) -> Vec<EntityKey> {
        self.changes.iter().map(EntityChange::key).collect()
    }

    /// Moves the log to `next`, enforcing the status machine.
    pub fn transition(&mut self, next: LogStatus, at_ms: i64) -> crate::error::Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(crate::error::Error::InvalidTransition {
                operation: self.operation_id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at_ms = at_ms;
        Ok(())
    }
}
