//! Reassignment engine for campus transport.
//!
//! Operators stage driver, route and student reassignments, preview their
//! net effect, and commit them atomically against a document store. Every
//! commit is audited and can be rolled back.
//!
//! # Modules
//!
//! - **`models`**: Domain types: `Bus`, `Driver`, `Route`, `Student`,
//!   `Snapshot`, and the before/after `EntityChange` diffs
//! - **`staging`**: The operator's staging buffer of proposed operations
//! - **`netchange`**: Collapses staged operations into minimal net changes
//! - **`validation`**: Capacity, shift and stop-coverage checks
//! - **`ranking`**: Weighted candidate-bus ranking and greedy auto-split
//! - **`commit`**: Optimistic-concurrency writes
//! - **`audit`**: Versioned operation logs and rollback
//! - **`reconcile`**: Recomputes per-shift load counters
//! - **`store`**: The `DocumentStore` seam and an in-memory implementation
//! - **`engine`**: `ReassignmentEngine`, the facade over all of the above
//!
//! # Flow
//!
//! 1. Stage operations in a [`StagingBuffer`](staging::StagingBuffer)
//! 2. [`preview`](engine::ReassignmentEngine::preview) the net changes and
//!    validation report
//! 3. [`commit`](engine::ReassignmentEngine::commit), which re-checks every
//!    document and writes all or nothing
//! 4. [`rollback`](engine::ReassignmentEngine::rollback) by operation id
//!    if needed
//!
//! Validation findings are data; only [`commit`](engine::ReassignmentEngine::commit)
//! turns them into an [`Error`].

pub mod audit;
pub mod commit;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod netchange;
pub mod ranking;
pub mod reconcile;
pub mod staging;
pub mod store;
pub mod validation;

pub use config::EngineConfig;
pub use engine::{CommitReport, ReassignmentEngine};
pub use error::{Error, Result};

/// Milliseconds since the Unix epoch; 0 if the clock reads earlier.
pub(crate) fn current_time_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
