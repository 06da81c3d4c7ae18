//! Audit trail and rollback.
//!
//! Every commit appends a [`ReassignmentLog`] holding the full before/after
//! state of each changed document. The log is append-only and versioned per
//! [`OperationType`]; a per-type latest pointer names the active log.
//!
//! # Retention
//!
//! Appending a committed log, moving its type's pointer and pruning the
//! older non-rollback logs of that type happen in one store transaction, so
//! exactly one non-rollback log per type survives a commit. Rollback logs
//! are never pruned here. A `NoOp` log is handed back to the caller and never
//! stored, so an empty commit leaves both the pointer and the retained logs
//! untouched.

mod log;
mod rollback;
mod writer;

pub use log::{Actor, LogStatus, OperationType, ReassignmentLog, RollbackOutcome};
pub use rollback::{rollback, validate_rollback, RollbackMode, RollbackReport};
pub use writer::{active_log, all_logs, find_log, no_op_log, record_commit};
