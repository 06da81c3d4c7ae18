//! Net-change computation.
//!
//! Collapses a sequence of staged operations against a snapshot into the
//! minimal set of per-document changes.
//!
//! # Algorithm
//!
//! 1. Build assignment maps (driver→bus, bus→driver, bus→route, bus→load,
//!    student→bus/route/stop) from the snapshot.
//! 2. Collapse the operations by document key, last write wins. Swaps and
//!    stop-less student moves read their keys, so they never supersede.
//! 3. Replay the surviving operations on a working copy, applying their
//!    side effects (evictions, freed buses, seat counter shifts).
//! 4. Diff initial against final state per document. Documents that end
//!    where they started are reported as removed no-ops, not changes.
//! 5. Derive impacts and confirmation rows for operator review.
//!
//! The computation is pure: the same operations and snapshot always give
//! the same [`NetChangeSet`], down to its serialized bytes.

mod collapse;
mod replay;

pub use collapse::{StagedDuplicate, Superseded};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::audit::OperationType;
use crate::error::Result;
use crate::models::{
    Assignable, Bus, BusAssignment, BusDiff, BusId, Collection, DriverAssignment,
    DriverDiff, EntityChange, EntityKey, RouteId, ShiftLoad, Snapshot, StudentAssignment,
    StudentDiff,
};
use crate::staging::StagedOperation;

use replay::{Replayer, WorkingState};

/// A document that was touched by staged operations but ends unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovedNoOp {
    /// The document.
    pub entity: EntityKey,
    /// Why no change is needed.
    pub reason: String,
}

/// One field of a confirmation row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    /// Field name.
    pub field: String,
    /// Display value before.
    pub before: String,
    /// Display value after.
    pub after: String,
}

/// Operator-facing summary of one change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationRow {
    /// Code the operator knows the document by (fleet number, employee
    /// code, roll number).
    pub code: String,
    /// The document.
    pub entity: EntityKey,
    /// Changed fields.
    pub fields: Vec<FieldChange>,
}

/// How many buses a route has before and after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteImpact {
    /// Canonical route id.
    pub route_id: RouteId,
    /// Buses on the route now.
    pub buses_before: u32,
    /// Buses on the route after commit.
    pub buses_after: u32,
}

/// How a bus's occupancy shifts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadImpact {
    /// The bus.
    pub bus_id: BusId,
    /// Seats on the bus.
    pub capacity: u32,
    /// Load now.
    pub before: ShiftLoad,
    /// Load after commit.
    pub after: ShiftLoad,
}

/// Result of collapsing staged operations against a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetChangeSet {
    /// Audit type of the surviving operations. `None` if nothing was staged.
    pub operation_type: Option<OperationType>,
    /// Real changes, ordered by document key.
    pub changes: Vec<EntityChange>,
    /// Review rows, ordered by code.
    pub confirmation_rows: Vec<ConfirmationRow>,
    /// Touched documents that need no change.
    pub removed_no_ops: Vec<RemovedNoOp>,
    /// Operations dropped by last-write-wins.
    pub superseded: Vec<Superseded>,
    /// Documents staged more than once.
    pub duplicates: Vec<StagedDuplicate>,
    /// Routes whose bus count changes.
    pub route_impacts: Vec<RouteImpact>,
    /// Buses whose load changes.
    pub load_impacts: Vec<LoadImpact>,
    /// Route references that matched no route id or alias.
    pub unresolved_routes: Vec<RouteId>,
}

impl NetChangeSet {
    /// Whether there is nothing to commit.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Keys of the documents a commit would write.
    pub fn changed_keys(&self) -> Vec<EntityKey> {
        self.changes.iter().map(EntityChange::key).collect()
    }

    /// Every document the changes read or write, including the buses
    /// students move between.
    pub fn referenced_keys(&self) -> BTreeSet<EntityKey> {
        let mut keys: BTreeSet<EntityKey> = self.changed_keys().into_iter().collect();
        for change in &self.changes {
            match change {
                EntityChange::Student(d) => {
                    keys.insert(EntityKey::bus(&d.before.bus_id));
                    keys.insert(EntityKey::bus(&d.after.bus_id));
                }
                EntityChange::Driver(d) => {
                    for bus in d.before.bus_id.iter().chain(d.after.bus_id.iter()) {
                        keys.insert(EntityKey::bus(bus));
                    }
                }
                EntityChange::Bus(_) => {}
            }
        }
        keys
    }

    /// The change for one document, if any.
    pub fn change_for(&self, key: &EntityKey) -> Option<&EntityChange> {
        self.changes.iter().find(|c| &c.key() == key)
    }

    /// Number of changes in one collection.
    pub fn count(&self, collection: Collection) -> usize {
        self.changes
            .iter()
            .filter(|c| c.collection() == collection)
            .count()
    }
}

/// Collapses `operations` against `snapshot` into net changes.
///
/// # Errors
/// [`Error::InvalidOperation`](crate::error::Error::InvalidOperation) if a
/// surviving operation references a document or route the snapshot does
/// not contain.
pub fn compute_net_changes(
    operations: &[StagedOperation],
    snapshot: &Snapshot,
) -> Result<NetChangeSet> {
    let mut unresolved = BTreeSet::new();
    let initial = WorkingState::from_snapshot(snapshot, &mut unresolved);
    for route in &unresolved {
        warn!(route = %route, "route reference matches no route id or alias; comparing verbatim");
    }

    let collapsed = collapse::collapse(operations);
    debug!(
        staged = operations.len(),
        surviving = collapsed.surviving.len(),
        "collapsed staged operations"
    );

    let mut replayer = Replayer::new(snapshot, initial.clone());
    for op in &collapsed.surviving {
        replayer.apply(op)?;
    }
    replayer.settle_student_routes(&initial);

    let mut set = NetChangeSet {
        operation_type: operation_type(&collapsed.surviving),
        superseded: collapsed.superseded,
        duplicates: collapsed.duplicates,
        unresolved_routes: unresolved.into_iter().collect(),
        ..NetChangeSet::default()
    };

    diff_buses(snapshot, &initial, &replayer, &mut set);
    diff_drivers(snapshot, &replayer, &mut set);
    diff_students(snapshot, &initial, &replayer, &mut set);

    set.route_impacts = route_impacts(&initial, &replayer.state);
    set.confirmation_rows = confirmation_rows(snapshot, &set.changes);
    Ok(set)
}

fn operation_type(surviving: &[&StagedOperation]) -> Option<OperationType> {
    let mut types = surviving.iter().map(|op| op.kind.operation_type());
    let first = types.next()?;
    if types.all(|t| t == first) {
        Some(first)
    } else {
        Some(OperationType::Mixed)
    }
}

fn no_op(set: &mut NetChangeSet, entity: EntityKey, reason: impl Into<String>) {
    set.removed_no_ops.push(RemovedNoOp {
        entity,
        reason: reason.into(),
    });
}

fn diff_buses(
    snapshot: &Snapshot,
    initial: &WorkingState,
    replayer: &Replayer<'_>,
    set: &mut NetChangeSet,
) {
    let end = &replayer.state;
    for (id, bus) in &snapshot.buses {
        let key = EntityKey::bus(id);
        let driver = end.bus_driver.get(id).cloned().flatten();
        let route = end.bus_route.get(id).cloned().unwrap_or_else(|| bus.route_id.clone());
        let load = end.bus_load.get(id).copied().unwrap_or(bus.load);

        let route_changed = initial.bus_route.get(id) != Some(&route);
        let unchanged = driver == bus.driver_id && !route_changed && load == bus.load;
        if unchanged {
            if replayer.touched.contains(&key) {
                let reason = if route != bus.route_id {
                    format!(
                        "route {} and {} name the same route",
                        bus.route_id, route
                    )
                } else {
                    "final state equals initial state".to_string()
                };
                no_op(set, key, reason);
            }
            continue;
        }

        let before = bus.assignment();
        let (route_id, stops) = if route_changed {
            let stops = snapshot
                .resolve_route(&route)
                .map(|r| r.stop_ids())
                .unwrap_or_default();
            (route, stops)
        } else {
            (bus.route_id.clone(), bus.stops.clone())
        };
        let after = BusAssignment {
            driver_id: driver,
            route_id,
            stops,
            load,
        };
        if load != bus.load {
            set.load_impacts.push(LoadImpact {
                bus_id: id.clone(),
                capacity: bus.capacity,
                before: bus.load,
                after: load,
            });
        }
        set.changes
            .push(EntityChange::Bus(BusDiff::new(id.clone(), before, after)));
    }
}

fn diff_drivers(
    snapshot: &Snapshot,
    replayer: &Replayer<'_>,
    set: &mut NetChangeSet,
) {
    for (id, driver) in &snapshot.drivers {
        let key = EntityKey::driver(id);
        let bus = replayer.state.driver_bus.get(id).cloned().flatten();
        if bus == driver.bus_id {
            if replayer.touched.contains(&key) {
                no_op(set, key, "final state equals initial state");
            }
            continue;
        }
        set.changes.push(EntityChange::Driver(DriverDiff::new(
            id.clone(),
            driver.assignment(),
            DriverAssignment { bus_id: bus },
        )));
    }
}

fn diff_students(
    snapshot: &Snapshot,
    initial: &WorkingState,
    replayer: &Replayer<'_>,
    set: &mut NetChangeSet,
) {
    for (id, student) in &snapshot.students {
        let key = EntityKey::student(id);
        let (Some(start), Some(end)) = (initial.students.get(id), replayer.state.students.get(id))
        else {
            continue;
        };
        if start == end {
            if replayer.touched.contains(&key) {
                no_op(set, key, "final state equals initial state");
            }
            continue;
        }
        let route_id = if start.route == end.route {
            student.route_id.clone()
        } else {
            end.route.clone()
        };
        let after = StudentAssignment {
            bus_id: end.bus.clone(),
            route_id,
            stop_id: end.stop.clone(),
        };
        set.changes.push(EntityChange::Student(StudentDiff::new(
            id.clone(),
            student.assignment(),
            after,
        )));
    }
}

fn route_impacts(initial: &WorkingState, end: &WorkingState) -> Vec<RouteImpact> {
    fn counts(state: &WorkingState) -> BTreeMap<&RouteId, u32> {
        let mut out = BTreeMap::new();
        for route in state.bus_route.values() {
            *out.entry(route).or_insert(0) += 1;
        }
        out
    }

    let before = counts(initial);
    let after = counts(end);
    let routes: BTreeSet<&RouteId> = before.keys().chain(after.keys()).copied().collect();
    routes
        .into_iter()
        .filter_map(|route| {
            let b = before.get(route).copied().unwrap_or(0);
            let a = after.get(route).copied().unwrap_or(0);
            (a != b).then(|| RouteImpact {
                route_id: route.clone(),
                buses_before: b,
                buses_after: a,
            })
        })
        .collect()
}

fn field(rows: &mut Vec<FieldChange>, name: &str, before: String, after: String) {
    if before != after {
        rows.push(FieldChange {
            field: name.to_string(),
            before,
            after,
        });
    }
}

fn bus_label(snapshot: &Snapshot, bus: &Option<BusId>) -> String {
    match bus {
        Some(id) => snapshot
            .bus(id)
            .map(|b| b.code.clone())
            .unwrap_or_else(|| id.to_string()),
        None => "reserve".to_string(),
    }
}

fn confirmation_rows(snapshot: &Snapshot, changes: &[EntityChange]) -> Vec<ConfirmationRow> {
    let driver_label = |id: &Option<crate::models::DriverId>| match id {
        Some(d) => snapshot
            .driver(d)
            .map(|d| d.employee_code.clone())
            .unwrap_or_else(|| d.to_string()),
        None => "none".to_string(),
    };
    let bus_code = |id: &BusId| {
        snapshot
            .bus(id)
            .map(|b: &Bus| b.code.clone())
            .unwrap_or_else(|| id.to_string())
    };

    let mut rows: Vec<ConfirmationRow> = changes
        .iter()
        .map(|change| {
            let mut fields = Vec::new();
            let code = match change {
                EntityChange::Bus(d) => {
                    field(&mut fields, "driver", driver_label(&d.before.driver_id), driver_label(&d.after.driver_id));
                    field(&mut fields, "route", d.before.route_id.to_string(), d.after.route_id.to_string());
                    field(&mut fields, "load", d.before.load.to_string(), d.after.load.to_string());
                    bus_code(&d.id)
                }
                EntityChange::Driver(d) => {
                    field(
                        &mut fields,
                        "bus",
                        bus_label(snapshot, &d.before.bus_id),
                        bus_label(snapshot, &d.after.bus_id),
                    );
                    snapshot
                        .driver(&d.id)
                        .map(|dr| dr.employee_code.clone())
                        .unwrap_or_else(|| d.id.to_string())
                }
                EntityChange::Student(d) => {
                    field(&mut fields, "bus", bus_code(&d.before.bus_id), bus_code(&d.after.bus_id));
                    field(&mut fields, "route", d.before.route_id.to_string(), d.after.route_id.to_string());
                    field(&mut fields, "stop", d.before.stop_id.to_string(), d.after.stop_id.to_string());
                    snapshot
                        .student(&d.id)
                        .map(|s| s.code.clone())
                        .unwrap_or_else(|| d.id.to_string())
                }
            };
            ConfirmationRow {
                code,
                entity: change.key(),
                fields,
            }
        })
        .collect();
    rows.sort_by(|a, b| a.code.cmp(&b.code).then_with(|| a.entity.cmp(&b.entity)));
    rows
}
