//! Staging buffer for proposed operations.
//!
//! Operators stage several operations, preview their net effect, and then
//! commit or discard them. Staging writes nothing: discarding the buffer
//! has no persisted effect.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::audit::OperationType;
use crate::error::{Error, Result};
use crate::models::{BusId, DriverId, EntityKey, RouteId, StopId, StudentId};

/// What a staged operation does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperationKind {
    /// Put `driver` on `bus`. The driver's previous bus loses its driver;
    /// the bus's previous driver goes to the reserve pool.
    AssignDriver {
        /// Driver to move.
        driver: DriverId,
        /// Destination bus.
        bus: BusId,
    },
    /// Exchange the buses of two drivers.
    SwapDrivers {
        /// First driver.
        first: DriverId,
        /// Second driver.
        second: DriverId,
    },
    /// Move `driver` to the reserve pool, leaving the bus without a driver.
    MarkReserved {
        /// Driver to reserve.
        driver: DriverId,
    },
    /// Point `bus` at another route.
    ReassignRoute {
        /// Bus to change.
        bus: BusId,
        /// New route (id or alias).
        route: RouteId,
    },
    /// Move students onto `bus`, optionally at a new boarding stop.
    AssignStudents {
        /// Students to move.
        students: Vec<StudentId>,
        /// Destination bus.
        bus: BusId,
        /// New boarding stop. `None` keeps each student's stop.
        stop: Option<StopId>,
    },
}

/// An operation waiting in the staging buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedOperation {
    /// Sequential id within the buffer.
    pub id: u64,
    /// The operation.
    pub kind: OperationKind,
    /// When the operator staged it (ms since Unix epoch).
    pub staged_at_ms: i64,
}

impl OperationKind {
    /// Documents whose final state this operation decides.
    ///
    /// Collapsing is keyed on these: a later operation with the same key
    /// overrides an earlier one, if it [`overwrites`](Self::overwrites).
    pub fn keys(&self) -> Vec<EntityKey> {
        match self {
            OperationKind::AssignDriver { driver, .. } => vec![EntityKey::driver(driver)],
            OperationKind::SwapDrivers { first, second } => {
                vec![EntityKey::driver(first), EntityKey::driver(second)]
            }
            OperationKind::MarkReserved { driver } => vec![EntityKey::driver(driver)],
            OperationKind::ReassignRoute { bus, .. } => vec![EntityKey::bus(bus)],
            OperationKind::AssignStudents { students, .. } => {
                students.iter().map(EntityKey::student).collect()
            }
        }
    }

    /// Whether the operation sets its keys without reading them first.
    ///
    /// A swap exchanges whatever the two drivers hold at that point, and a
    /// student move without a stop keeps the current stop, so neither can
    /// stand in for the operations before it.
    pub fn overwrites(&self) -> bool {
        match self {
            OperationKind::SwapDrivers { .. } => false,
            OperationKind::AssignStudents { stop, .. } => stop.is_some(),
            OperationKind::AssignDriver { .. }
            | OperationKind::MarkReserved { .. }
            | OperationKind::ReassignRoute { .. } => true,
        }
    }

    /// Where this operation sends the document at `key`, for operator messages.
    pub fn destination(&self, key: &EntityKey) -> String {
        match self {
            OperationKind::AssignDriver { bus, .. } => format!("bus {bus}"),
            OperationKind::SwapDrivers { first, second } => {
                let other = if key == &EntityKey::driver(first) {
                    second
                } else {
                    first
                };
                format!("swap with {other}")
            }
            OperationKind::MarkReserved { .. } => "reserve pool".to_string(),
            OperationKind::ReassignRoute { route, .. } => format!("route {route}"),
            OperationKind::AssignStudents { bus, stop, .. } => match stop {
                Some(stop) => format!("bus {bus} at stop {stop}"),
                None => format!("bus {bus}"),
            },
        }
    }

    /// The audit log type this operation belongs to.
    pub fn operation_type(&self) -> OperationType {
        match self {
            OperationKind::AssignDriver { .. }
            | OperationKind::SwapDrivers { .. }
            | OperationKind::MarkReserved { .. } => OperationType::DriverReassignment,
            OperationKind::ReassignRoute { .. } => OperationType::RouteReassignment,
            OperationKind::AssignStudents { .. } => OperationType::StudentReassignment,
        }
    }

    /// Structural checks that need no snapshot.
    pub fn check(&self) -> std::result::Result<(), String> {
        match self {
            OperationKind::SwapDrivers { first, second } if first == second => {
                Err(format!("cannot swap driver {first} with itself"))
            }
            OperationKind::AssignStudents { students, .. } if students.is_empty() => {
                Err("no students selected".to_string())
            }
            OperationKind::AssignStudents { students, .. } => {
                let mut seen = BTreeSet::new();
                match students.iter().find(|s| !seen.insert(*s)) {
                    Some(dup) => Err(format!("student {dup} selected twice")),
                    None => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }
}

/// Ordered list of operations an operator has staged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StagingBuffer {
    operations: Vec<StagedOperation>,
    next_id: u64,
}

impl StagingBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages an operation now. Returns its id.
    pub fn stage(&mut self, kind: OperationKind) -> Result<u64> {
        self.stage_at(kind, crate::current_time_ms())
    }

    /// Stages an operation with an explicit timestamp.
    pub fn stage_at(&mut self, kind: OperationKind, staged_at_ms: i64) -> Result<u64> {
        let id = self.next_id + 1;
        kind.check()
            .map_err(|reason| Error::InvalidOperation { operation: id, reason })?;
        self.next_id = id;
        self.operations.push(StagedOperation {
            id,
            kind,
            staged_at_ms,
        });
        Ok(id)
    }

    /// Removes one staged operation.
    pub fn remove(&mut self, id: u64) -> Option<StagedOperation> {
        let pos = self.operations.iter().position(|op| op.id == id)?;
        Some(self.operations.remove(pos))
    }

    /// Drops every staged operation.
    pub fn discard(&mut self) {
        self.operations.clear();
    }

    /// Staged operations in staging order.
    pub fn operations(&self) -> &[StagedOperation] {
        &self.operations
    }

    /// Empties the buffer, returning its operations.
    pub fn take(&mut self) -> Vec<StagedOperation> {
        std::mem::take(&mut self.operations)
    }

    /// Number of staged operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
