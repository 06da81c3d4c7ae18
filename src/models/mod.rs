//! Transport domain models.
//!
//! Buses, drivers, routes and students as stored by the document store,
//! plus the typed change records the engine produces and consumes.
//!
//! # Ownership
//!
//! The store owns every document. The engine reads them through a
//! [`Snapshot`] and changes them only by committing [`EntityChange`]s.

mod bus;
mod change;
mod driver;
mod ids;
mod route;
mod shift;
mod snapshot;
mod student;

pub use bus::{Bus, BusAssignment};
pub use change::{
    Assignable, BusDiff, Collection, Diff, Document, DriverDiff, EntityChange, EntityKey,
    FieldMismatch, Side, StudentDiff,
};
pub use driver::{Driver, DriverAssignment};
pub use ids::{BusId, DriverId, OperationId, RouteId, StopId, StudentId};
pub use route::{Route, Stop};
pub use shift::{Shift, ShiftLoad, ShiftMode};
pub use snapshot::Snapshot;
pub use student::{Student, StudentAssignment, StudentStatus};
