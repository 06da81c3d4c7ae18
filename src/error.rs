//! Error types for reassignment operations.
//!
//! A single [`Error`] enum covers every failure the engine can return, with
//! a [`Result`] alias. Rule violations found before any write are not
//! errors: they are reported as data in a
//! [`ValidationReport`](crate::validation::ValidationReport), and only turn
//! into [`Error::Rejected`] when a commit is attempted anyway.
//!
//! | Category | Variants | Typical response |
//! |----------|----------|------------------|
//! | Caller input | `InvalidOperation`, `Rejected` | Fix the staged operations |
//! | Drift | `NotFound`, `Conflict` | Recompute against fresh state and retry |
//! | Rollback | `PartialRollbackFailure`, `InvalidTransition` | Manual follow-up |
//! | Internal | `Store`, `Config` | Log and investigate |

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audit::LogStatus;
use crate::models::{EntityKey, FieldMismatch, OperationId};
use crate::validation::ValidationReport;

/// A document whose stored state is not what the caller expected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    /// The document.
    pub key: EntityKey,
    /// Differing fields. Empty when the document is gone.
    pub mismatches: Vec<FieldMismatch>,
    /// Whether the document no longer exists.
    pub missing: bool,
}

impl Conflict {
    /// A conflict on existing fields.
    pub fn fields(key: EntityKey, mismatches: Vec<FieldMismatch>) -> Self {
        Self {
            key,
            mismatches,
            missing: false,
        }
    }

    /// A conflict caused by a deleted document.
    pub fn missing(key: EntityKey) -> Self {
        Self {
            key,
            mismatches: Vec::new(),
            missing: true,
        }
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.missing {
            return write!(f, "{} no longer exists", self.key);
        }
        write!(f, "{}", self.key)?;
        for (i, m) in self.mismatches.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{} expected {}, found {}", m.field, m.expected, m.actual)?;
        }
        Ok(())
    }
}

/// All errors that can occur in reassignment operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A staged operation is malformed or references nothing.
    #[error("invalid staged operation #{operation}: {reason}")]
    InvalidOperation {
        /// Staged operation id.
        operation: u64,
        /// What is wrong with it.
        reason: String,
    },

    /// A document was deleted between staging and use.
    #[error("{key} not found")]
    NotFound {
        /// The missing document.
        key: EntityKey,
    },

    /// Optimistic concurrency precondition failed; nothing was written.
    ///
    /// Recompute the net changes against fresh state and retry. The engine
    /// never retries on its own.
    #[error("conflict on {}{}", first_conflict(.conflicts), more(.conflicts))]
    Conflict {
        /// Every mismatched document, in key order.
        conflicts: Vec<Conflict>,
    },

    /// Validation found errors and the commit was not attempted.
    #[error("rejected by validation: {} error(s)", .report.errors.len())]
    Rejected {
        /// The full report.
        report: ValidationReport,
    },

    /// A rollback reverted some documents but not others.
    ///
    /// Terminal for this attempt. `reverted` documents hold their pre-commit
    /// state; `not_reverted` documents were left as found.
    #[error(
        "rollback {rollback} incomplete: {} reverted, {} not reverted",
        .reverted.len(),
        .not_reverted.len()
    )]
    PartialRollbackFailure {
        /// Id of the `failed` rollback log.
        rollback: OperationId,
        /// Documents restored to their pre-commit state.
        reverted: Vec<EntityKey>,
        /// Documents that drifted or disappeared and were skipped.
        not_reverted: Vec<Conflict>,
    },

    /// No audit log with this id exists.
    #[error("operation log '{0}' not found")]
    LogNotFound(OperationId),

    /// The log cannot be rolled back at all.
    #[error("operation log '{operation}' cannot be rolled back: {reason}")]
    InvalidRollback {
        /// Log id.
        operation: OperationId,
        /// Why not.
        reason: String,
    },

    /// The audit log state machine forbids this move.
    #[error("operation log '{operation}' cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        /// Log id.
        operation: OperationId,
        /// Current status.
        from: LogStatus,
        /// Requested status.
        to: LogStatus,
    },

    /// The document store failed.
    #[error("store error: {0}")]
    Store(String),

    /// Configuration could not be parsed.
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

fn first_conflict(conflicts: &[Conflict]) -> String {
    conflicts
        .first()
        .map(ToString::to_string)
        .unwrap_or_else(|| "unknown document".to_string())
}

fn more(conflicts: &[Conflict]) -> String {
    match conflicts.len() {
        0 | 1 => String::new(),
        n => format!(" (and {} more)", n - 1),
    }
}

/// A `Result` alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
