//! Point-in-time view of the documents a reassignment touches.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Bus, BusId, Driver, DriverId, Route, RouteId, Student, StudentId};

/// Current state of buses, drivers, routes and students.
///
/// Ordered maps keep every traversal deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Buses by id.
    pub buses: BTreeMap<BusId, Bus>,
    /// Drivers by id.
    pub drivers: BTreeMap<DriverId, Driver>,
    /// Routes by document id.
    pub routes: BTreeMap<RouteId, Route>,
    /// Students by id.
    pub students: BTreeMap<StudentId, Student>,
}

impl Snapshot {
    /// Creates an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a bus.
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.buses.insert(bus.id.clone(), bus);
        self
    }

    /// Adds a driver.
    pub fn with_driver(mut self, driver: Driver) -> Self {
        self.drivers.insert(driver.id.clone(), driver);
        self
    }

    /// Adds a route.
    pub fn with_route(mut self, route: Route) -> Self {
        self.routes.insert(route.id.clone(), route);
        self
    }

    /// Adds a student.
    pub fn with_student(mut self, student: Student) -> Self {
        self.students.insert(student.id.clone(), student);
        self
    }

    /// Looks up a bus.
    pub fn bus(&self, id: &BusId) -> Option<&Bus> {
        self.buses.get(id)
    }

    /// Looks up a driver.
    pub fn driver(&self, id: &DriverId) -> Option<&Driver> {
        self.drivers.get(id)
    }

    /// Looks up a student.
    pub fn student(&self, id: &StudentId) -> Option<&Student> {
        self.students.get(id)
    }

    /// Resolves a route reference by document id, then by alias.
    ///
    /// Returns `None` when nothing matches. Callers must not guess a
    /// canonical form for unresolved references.
    pub fn resolve_route(&self, reference: &RouteId) -> Option<&Route> {
        self.routes
            .get(reference)
            .or_else(|| self.routes.values().find(|r| r.is_named(reference)))
    }

    /// Canonical document id for a route reference, if it resolves.
    pub fn canonical_route(&self, reference: &RouteId) -> Option<RouteId> {
        self.resolve_route(reference).map(|r| r.id.clone())
    }
}
