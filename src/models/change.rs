//! Typed per-collection changes.
//!
//! A change records the engine-managed state of one document before and
//! after an operation. Each collection has its own state type, and changes
//! are applied and reverted through [`Assignable`] rather than by merging
//! untyped field maps.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{
    Bus, BusAssignment, BusId, Driver, DriverAssignment, DriverId, Student, StudentAssignment,
    StudentId,
};

/// A store collection the engine writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Collection {
    /// Bus documents.
    Buses,
    /// Driver documents.
    Drivers,
    /// Student documents.
    Students,
}

impl Collection {
    /// Collection name as stored.
    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Buses => "buses",
            Collection::Drivers => "drivers",
            Collection::Students => "students",
        }
    }
}

/// Address of one document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    /// Collection.
    pub collection: Collection,
    /// Document id within the collection.
    pub id: String,
}

impl EntityKey {
    /// Key of a bus document.
    pub fn bus(id: &BusId) -> Self {
        Self {
            collection: Collection::Buses,
            id: id.to_string(),
        }
    }

    /// Key of a driver document.
    pub fn driver(id: &DriverId) -> Self {
        Self {
            collection: Collection::Drivers,
            id: id.to_string(),
        }
    }

    /// Key of a student document.
    pub fn student(id: &StudentId) -> Self {
        Self {
            collection: Collection::Students,
            id: id.to_string(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection.as_str(), self.id)
    }
}

/// One field whose expected value differs from what the store holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMismatch {
    /// Field name.
    pub field: String,
    /// Value the caller expected.
    pub expected: String,
    /// Value found in the store.
    pub actual: String,
}

impl FieldMismatch {
    pub(crate) fn new(
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

/// A document with an engine-managed assignment state.
pub trait Assignable {
    /// Projection of the fields the engine may change.
    type State: Clone + PartialEq;

    /// Reads the current assignment state.
    fn assignment(&self) -> Self::State;

    /// Overwrites the assignment state, keeping derived fields consistent.
    fn set_assignment(&mut self, state: &Self::State);
}

/// Before/after states of one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diff<I, S> {
    /// Document id.
    pub id: I,
    /// State expected in the store before the change.
    pub before: S,
    /// State written by the change.
    pub after: S,
}

/// Change to a bus.
pub type BusDiff = Diff<BusId, BusAssignment>;
/// Change to a driver.
pub type DriverDiff = Diff<DriverId, DriverAssignment>;
/// Change to a student.
pub type StudentDiff = Diff<StudentId, StudentAssignment>;

impl<I: Clone, S: Clone + PartialEq> Diff<I, S> {
    /// Creates a diff.
    pub fn new(id: I, before: S, after: S) -> Self {
        Self { id, before, after }
    }

    /// Writes the `after` state.
    pub fn apply<E: Assignable<State = S>>(&self, entity: &mut E) {
        entity.set_assignment(&self.after);
    }

    /// Writes the `before` state.
    pub fn revert<E: Assignable<State = S>>(&self, entity: &mut E) {
        entity.set_assignment(&self.before);
    }

    /// The same change in the opposite direction.
    pub fn inverted(&self) -> Self {
        Self {
            id: self.id.clone(),
            before: self.after.clone(),
            after: self.before.clone(),
        }
    }

    /// Whether the change leaves the document untouched.
    pub fn is_noop(&self) -> bool {
        self.before == self.after
    }
}

/// A document as held by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Document {
    /// A bus.
    Bus(Bus),
    /// A driver.
    Driver(Driver),
    /// A student.
    Student(Student),
}

impl Document {
    /// Address of this document.
    pub fn key(&self) -> EntityKey {
        match self {
            Document::Bus(b) => EntityKey::bus(&b.id),
            Document::Driver(d) => EntityKey::driver(&d.id),
            Document::Student(s) => EntityKey::student(&s.id),
        }
    }
}

/// Which recorded state of a change to compare against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The pre-change state (commit preconditions).
    Before,
    /// The post-change state (rollback preconditions).
    After,
}

/// A change to one document, tagged by collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "collection", rename_all = "snake_case")]
pub enum EntityChange {
    /// Bus change.
    Bus(BusDiff),
    /// Driver change.
    Driver(DriverDiff),
    /// Student change.
    Student(StudentDiff),
}

impl EntityChange {
    /// Address of the changed document.
    pub fn key(&self) -> EntityKey {
        match self {
            EntityChange::Bus(d) => EntityKey::bus(&d.id),
            EntityChange::Driver(d) => EntityKey::driver(&d.id),
            EntityChange::Student(d) => EntityKey::student(&d.id),
        }
    }

    /// Collection of the changed document.
    pub fn collection(&self) -> Collection {
        self.key().collection
    }

    /// The same change in the opposite direction.
    pub fn inverted(&self) -> Self {
        match self {
            EntityChange::Bus(d) => EntityChange::Bus(d.inverted()),
            EntityChange::Driver(d) => EntityChange::Driver(d.inverted()),
            EntityChange::Student(d) => EntityChange::Student(d.inverted()),
        }
    }

    /// Compares one recorded side against a stored document, field by field.
    ///
    /// A document from the wrong collection reports a single `collection`
    /// mismatch.
    pub fn mismatches(&self, side: Side, doc: &Document) -> Vec<FieldMismatch> {
        fn pick<'a, S>(side: Side, before: &'a S, after: &'a S) -> &'a S {
            match side {
                Side::Before => before,
                Side::After => after,
            }
        }

        match (self, doc) {
            (EntityChange::Bus(d), Document::Bus(b)) => {
                pick(side, &d.before, &d.after).mismatches(&b.assignment())
            }
            (EntityChange::Driver(d), Document::Driver(dr)) => {
                pick(side, &d.before, &d.after).mismatches(&dr.assignment())
            }
            (EntityChange::Student(d), Document::Student(s)) => {
                pick(side, &d.before, &d.after).mismatches(&s.assignment())
            }
            _ => vec![FieldMismatch::new(
                "collection",
                self.collection().as_str(),
                doc.key().collection.as_str(),
            )],
        }
    }

    /// Writes the `after` state into a matching document.
    ///
    /// Returns `false` and leaves the document alone if it is from another
    /// collection.
    pub fn apply(&self, doc: &mut Document) -> bool {
        match (self, doc) {
            (EntityChange::Bus(d), Document::Bus(b)) => d.apply(b),
            (EntityChange::Driver(d), Document::Driver(dr)) => d.apply(dr),
            (EntityChange::Student(d), Document::Student(s)) => d.apply(s),
            _ => return false,
        }
        true
    }

    /// Writes the `before` state into a matching document.
    pub fn revert(&self, doc: &mut Document) -> bool {
        self.inverted().apply(doc)
    }
}
