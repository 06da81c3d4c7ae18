//! Replay of collapsed operations against a working copy of the snapshot.
//!
//! The working state is built fresh from the snapshot on every call and
//! returned by value; nothing is shared between computations.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{
    BusId, DriverId, EntityKey, RouteId, ShiftLoad, Snapshot, StopId, StudentId,
};
use crate::staging::{OperationKind, StagedOperation};

/// Engine-managed fields of one student, with the route canonicalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StudentSlot {
    pub bus: BusId,
    pub route: RouteId,
    pub stop: StopId,
}

/// Assignment maps derived from a snapshot.
///
/// Route references are canonicalized through the snapshot where they
/// resolve; unresolved references are kept verbatim and collected in
/// `unresolved`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct WorkingState {
    pub driver_bus: BTreeMap<DriverId, Option<BusId>>,
    pub bus_driver: BTreeMap<BusId, Option<DriverId>>,
    pub bus_route: BTreeMap<BusId, RouteId>,
    pub bus_load: BTreeMap<BusId, ShiftLoad>,
    pub students: BTreeMap<StudentId, StudentSlot>,
}

impl WorkingState {
    pub fn from_snapshot(snapshot: &Snapshot, unresolved: &mut BTreeSet<RouteId>) -> Self {
        let mut canonical = |reference: &RouteId| match snapshot.canonical_route(reference) {
            Some(id) => id,
            None => {
                unresolved.insert(reference.clone());
                reference.clone()
            }
        };

        let mut bus_driver = BTreeMap::new();
        let mut bus_route = BTreeMap::new();
        let mut bus_load = BTreeMap::new();
        for (id, bus) in &snapshot.buses {
            bus_driver.insert(id.clone(), bus.driver_id.clone());
            bus_route.insert(id.clone(), canonical(&bus.route_id));
            bus_load.insert(id.clone(), bus.load);
        }

        let driver_bus = snapshot
            .drivers
            .iter()
            .map(|(id, d)| (id.clone(), d.bus_id.clone()))
            .collect();

        let students = snapshot
            .students
            .iter()
            .map(|(id, s)| {
                let slot = StudentSlot {
                    bus: s.bus_id.clone(),
                    route: canonical(&s.route_id),
                    stop: s.stop_id.clone(),
                };
                (id.clone(), slot)
            })
            .collect();

        Self {
            driver_bus,
            bus_driver,
            bus_route,
            bus_load,
            students,
        }
    }
}

/// Replays operations in order, recording every document they touch.
pub(crate) struct Replayer<'a> {
    snapshot: &'a Snapshot,
    pub state: WorkingState,
    pub touched: BTreeSet<EntityKey>,
    pub moved_students: BTreeSet<StudentId>,
}

impl<'a> Replayer<'a> {
    pub fn new(snapshot: &'a Snapshot, state: WorkingState) -> Self {
        Self {
            snapshot,
            state,
            touched: BTreeSet::new(),
            moved_students: BTreeSet::new(),
        }
    }

    pub fn apply(&mut self, op: &StagedOperation) -> Result<()> {
        debug!(operation = op.id, kind = ?op.kind, "replaying staged operation");
        match &op.kind {
            OperationKind::AssignDriver { driver, bus } => {
                self.require_driver(op.id, driver)?;
                self.require_bus(op.id, bus)?;
                self.assign_driver(driver, bus);
            }
            OperationKind::SwapDrivers { first, second } => {
                self.require_driver(op.id, first)?;
                self.require_driver(op.id, second)?;
                self.swap_drivers(first, second);
            }
            OperationKind::MarkReserved { driver } => {
                self.require_driver(op.id, driver)?;
                self.mark_reserved(driver);
            }
            OperationKind::ReassignRoute { bus, route } => {
                self.require_bus(op.id, bus)?;
                let canonical =
                    self.snapshot
                        .canonical_route(route)
                        .ok_or_else(|| Error::InvalidOperation {
                            operation: op.id,
                            reason: format!("unknown route {route}"),
                        })?;
                self.touched.insert(EntityKey::bus(bus));
                self.state.bus_route.insert(bus.clone(), canonical);
            }
            OperationKind::AssignStudents {
                students,
                bus,
                stop,
            } => {
                self.require_bus(op.id, bus)?;
                for student in students {
                    if !self.state.students.contains_key(student) {
                        return Err(unknown(op.id, "student", student));
                    }
                }
                for student in students {
                    self.move_student(student, bus, stop.as_ref());
                }
            }
        }
        Ok(())
    }

    fn require_driver(&self, op: u64, driver: &DriverId) -> Result<()> {
        if self.state.driver_bus.contains_key(driver) {
            Ok(())
        } else {
            Err(unknown(op, "driver", driver))
        }
    }

    fn require_bus(&self, op: u64, bus: &BusId) -> Result<()> {
        if self.state.bus_driver.contains_key(bus) {
            Ok(())
        } else {
            Err(unknown(op, "bus", bus))
        }
    }

    fn set_bus_driver(&mut self, bus: &BusId, driver: Option<DriverId>) {
        self.touched.insert(EntityKey::bus(bus));
        self.state.bus_driver.insert(bus.clone(), driver);
    }

    fn set_driver_bus(&mut self, driver: &DriverId, bus: Option<BusId>) {
        self.touched.insert(EntityKey::driver(driver));
        self.state.driver_bus.insert(driver.clone(), bus);
    }

    fn driver_bus(&self, driver: &DriverId) -> Option<BusId> {
        self.state.driver_bus.get(driver).cloned().flatten()
    }

    fn bus_driver(&self, bus: &BusId) -> Option<DriverId> {
        self.state.bus_driver.get(bus).cloned().flatten()
    }

    /// Frees the driver's previous bus and evicts the target's occupant.
    fn assign_driver(&mut self, driver: &DriverId, bus: &BusId) {
        let previous = self.driver_bus(driver);
        if let Some(prev) = &previous {
            if prev != bus && self.bus_driver(prev).as_ref() == Some(driver) {
                self.set_bus_driver(prev, None);
            }
        }
        if let Some(occupant) = self.bus_driver(bus) {
            if &occupant != driver {
                self.set_driver_bus(&occupant, None);
            }
        }
        self.set_bus_driver(bus, Some(driver.clone()));
        self.set_driver_bus(driver, Some(bus.clone()));
    }

    fn swap_drivers(&mut self, first: &DriverId, second: &DriverId) {
        let first_bus = self.driver_bus(first);
        let second_bus = self.driver_bus(second);
        self.set_driver_bus(first, second_bus.clone());
        self.set_driver_bus(second, first_bus.clone());
        if let Some(bus) = &first_bus {
            self.set_bus_driver(bus, Some(second.clone()));
        }
        if let Some(bus) = &second_bus {
            self.set_bus_driver(bus, Some(first.clone()));
        }
    }

    fn mark_reserved(&mut self, driver: &DriverId) {
        if let Some(bus) = self.driver_bus(driver) {
            if self.bus_driver(&bus).as_ref() == Some(driver) {
                self.set_bus_driver(&bus, None);
            }
        }
        self.set_driver_bus(driver, None);
    }

    /// Moves one student, shifting a seat between the two buses' counters.
    fn move_student(&mut self, student: &StudentId, bus: &BusId, stop: Option<&StopId>) {
        let Some(slot) = self.state.students.get(student).cloned() else {
            return;
        };
        let record = self.snapshot.student(student);
        let riding = record.is_some_and(|s| s.is_active());

        if &slot.bus != bus && riding {
            if let Some(shift) = record.map(|s| s.shift) {
                if let Some(load) = self.state.bus_load.get_mut(&slot.bus) {
                    load.alight(shift);
                    self.touched.insert(EntityKey::bus(&slot.bus));
                }
                if let Some(load) = self.state.bus_load.get_mut(bus) {
                    load.board(shift);
                    self.touched.insert(EntityKey::bus(bus));
                }
            }
        }

        let mut next = slot;
        next.bus = bus.clone();
        if let Some(stop) = stop {
            next.stop = stop.clone();
        }
        self.state.students.insert(student.clone(), next);
        self.touched.insert(EntityKey::student(student));
        self.moved_students.insert(student.clone());
    }

    /// Points moved students, and riders of re-routed buses, at their
    /// bus's final route.
    pub fn settle_student_routes(&mut self, initial: &WorkingState) {
        let rerouted: BTreeSet<&BusId> = self
            .state
            .bus_route
            .iter()
            .filter(|(bus, route)| initial.bus_route.get(*bus) != Some(*route))
            .map(|(bus, _)| bus)
            .collect();

        let mut updates = Vec::new();
        for (id, slot) in &self.state.students {
            if !self.moved_students.contains(id) && !rerouted.contains(&slot.bus) {
                continue;
            }
            if let Some(route) = self.state.bus_route.get(&slot.bus) {
                if route != &slot.route {
                    updates.push((id.clone(), route.clone()));
                }
            }
        }
        for (id, route) in updates {
            if let Some(slot) = self.state.students.get_mut(&id) {
                slot.route = route;
                self.touched.insert(EntityKey::student(&id));
            }
        }
    }
}

fn unknown(op: u64, what: &str, id: &dyn std::fmt::Display) -> Error {
    Error::InvalidOperation {
        operation: op,
        reason: format!("unknown {what} {id}"),
    }
}
