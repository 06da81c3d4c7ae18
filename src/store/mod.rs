//! Document store interface.
//!
//! The engine never owns bus, driver, route or student documents. It reads
//! them through a [`DocumentStore`] and writes them only inside a
//! [`Transaction`], which is the single concurrency boundary: every commit,
//! rollback and reconciliation opens exactly one.
//!
//! # Atomicity
//!
//! A transaction closure that returns `Err` leaves the store untouched. A
//! closure that returns `Ok` publishes all of its writes at once.

mod memory;

pub use memory::MemoryStore;

use std::collections::BTreeSet;

use crate::audit::{OperationType, ReassignmentLog};
use crate::error::Result;
use crate::models::{Bus, Document, EntityKey, OperationId, Snapshot, Student};

/// Which documents a snapshot read covers. Routes are always included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotScope {
    /// Every document.
    All,
    /// Only these documents.
    Entities(BTreeSet<EntityKey>),
}

impl SnapshotScope {
    /// Whether `key` is in scope.
    pub fn includes(&self, key: &EntityKey) -> bool {
        match self {
            SnapshotScope::All => true,
            SnapshotScope::Entities(keys) => keys.contains(key),
        }
    }
}

/// Reads and writes inside one atomic transaction.
pub trait Transaction {
    /// Reads a document.
    fn get(&self, key: &EntityKey) -> Result<Option<Document>>;

    /// Inserts or replaces a document.
    fn put(&mut self, doc: Document) -> Result<()>;

    /// All buses, by id.
    fn buses(&self) -> Result<Vec<Bus>>;

    /// All students, by id.
    fn students(&self) -> Result<Vec<Student>>;

    /// Next value of a store-wide counter. Never repeats.
    fn next_sequence(&mut self) -> Result<u64>;

    /// Reads an audit log.
    fn get_log(&self, id: &OperationId) -> Result<Option<ReassignmentLog>>;

    /// Inserts or replaces an audit log.
    fn put_log(&mut self, log: ReassignmentLog) -> Result<()>;

    /// Removes an audit log. Returns whether it existed.
    fn delete_log(&mut self, id: &OperationId) -> Result<bool>;

    /// Every audit log, oldest first.
    fn logs(&self) -> Result<Vec<ReassignmentLog>>;

    /// The latest-log pointer for `operation_type`.
    fn latest(&self, operation_type: OperationType) -> Result<Option<OperationId>>;

    /// Moves the latest-log pointer for `operation_type`.
    fn set_latest(&mut self, operation_type: OperationType, id: &OperationId) -> Result<()>;
}

/// A transactional document store.
pub trait DocumentStore {
    /// Reads the documents in `scope` plus every route.
    fn read_snapshot(&self, scope: &SnapshotScope) -> Result<Snapshot>;

    /// Reads one document outside a transaction.
    fn read_entity(&self, key: &EntityKey) -> Result<Option<Document>>;

    /// Runs `f` in one atomic transaction.
    ///
    /// Writes become visible only if `f` returns `Ok`.
    fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn Transaction) -> Result<T>;
}
