//! Rule checks over a net-change set.
//!
//! Runs before any write and has no side effects. Detects:
//! - Per-shift capacity overruns
//! - Shift-incompatible student placements
//! - Students whose stop is not on the target bus's route
//! - Changes referencing documents the snapshot lacks
//!
//! Staged duplicates and unresolved route references are reported as
//! warnings: last write wins, and unresolved references are compared
//! verbatim rather than guessed at.

use serde::{Deserialize, Serialize};

use crate::models::{
    Bus, BusAssignment, BusId, EntityChange, EntityKey, RouteId, Snapshot, StudentAssignment,
    StudentId,
};
use crate::netchange::NetChangeSet;

/// A validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Issue category.
    pub kind: ValidationIssueKind,
    /// Document the issue is about, if any.
    pub entity: Option<EntityKey>,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationIssueKind {
    /// A change references a document the snapshot lacks.
    NotFound,
    /// A bus would carry more riders than seats on a shift.
    Capacity,
    /// A student's shift is not served by the target bus.
    Compatibility,
    /// A student's stop is not on the target bus's route.
    StopCoverage,
    /// A document was staged more than once.
    DuplicateDestination,
    /// A route reference matched no route id or alias.
    UnresolvedRoute,
    /// A bus is already over capacity and the changes do not add to it.
    OverCapacityUnchanged,
}

impl ValidationIssue {
    fn new(kind: ValidationIssueKind, entity: Option<EntityKey>, message: impl Into<String>) -> Self {
        Self {
            kind,
            entity,
            message: message.into(),
        }
    }
}

/// Errors and warnings found in a net-change set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Findings that block a commit.
    pub errors: Vec<ValidationIssue>,
    /// Findings shown to the operator only.
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Whether there are no errors.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Whether the errors forbid a commit.
    ///
    /// With `allow_override`, capacity errors alone do not block.
    pub fn blocks_commit(&self, allow_override: bool) -> bool {
        self.errors
            .iter()
            .any(|e| !(allow_override && e.kind == ValidationIssueKind::Capacity))
    }

    /// Findings of one kind, errors first.
    pub fn of_kind(&self, kind: ValidationIssueKind) -> impl Iterator<Item = &ValidationIssue> {
        self.errors
            .iter()
            .chain(self.warnings.iter())
            .filter(move |i| i.kind == kind)
    }

    fn error(&mut self, kind: ValidationIssueKind, entity: EntityKey, message: String) {
        self.errors.push(ValidationIssue::new(kind, Some(entity), message));
    }

    fn warn(&mut self, kind: ValidationIssueKind, entity: Option<EntityKey>, message: String) {
        self.warnings.push(ValidationIssue::new(kind, entity, message));
    }
}

/// Validates `set` against `snapshot`.
///
/// Checks:
/// 1. Every changed document exists
/// 2. No served shift ends above capacity where the changes add riders
/// 3. Moved students ride buses that serve their shift
/// 4. Each changed student's stop is on the target bus's final route
///
/// Findings are collected, never short-circuited.
pub fn validate(set: &NetChangeSet, snapshot: &Snapshot) -> ValidationReport {
    let mut report = ValidationReport::default();

    for change in &set.changes {
        match change {
            EntityChange::Bus(d) => match snapshot.bus(&d.id) {
                Some(bus) => check_capacity(&mut report, bus, &d.before, &d.after),
                None => missing(&mut report, change.key()),
            },
            EntityChange::Driver(d) => {
                if snapshot.driver(&d.id).is_none() {
                    missing(&mut report, change.key());
                }
                if let Some(bus) = &d.after.bus_id {
                    if snapshot.bus(bus).is_none() {
                        missing(&mut report, EntityKey::bus(bus));
                    }
                }
            }
            EntityChange::Student(d) => {
                check_student(&mut report, set, snapshot, &d.id, &d.before, &d.after)
            }
        }
    }

    for dup in &set.duplicates {
        let message = if dup.conflicting {
            format!(
                "{} staged {} times with different destinations ({}); the last one wins",
                dup.entity,
                dup.operations.len(),
                dup.destinations.join(", ")
            )
        } else {
            format!("{} staged {} times", dup.entity, dup.operations.len())
        };
        report.warn(
            ValidationIssueKind::DuplicateDestination,
            Some(dup.entity.clone()),
            message,
        );
    }

    for route in &set.unresolved_routes {
        report.warn(
            ValidationIssueKind::UnresolvedRoute,
            None,
            format!("route reference '{route}' matches no route id or alias"),
        );
    }

    report
}

fn missing(report: &mut ValidationReport, key: EntityKey) {
    let message = format!("{key} not found");
    report.error(ValidationIssueKind::NotFound, key, message);
}

fn check_capacity(
    report: &mut ValidationReport,
    bus: &Bus,
    before: &BusAssignment,
    after: &BusAssignment,
) {
    for shift in after.load.overloaded_shifts(bus.capacity, bus.shift_mode) {
        let (was, now) = (before.load.count(shift), after.load.count(shift));
        let key = EntityKey::bus(&bus.id);
        if now > was {
            report.error(
                ValidationIssueKind::Capacity,
                key,
                format!(
                    "bus {} {} load {} exceeds capacity {}",
                    bus.code, shift, now, bus.capacity
                ),
            );
        } else {
            report.warn(
                ValidationIssueKind::OverCapacityUnchanged,
                Some(key),
                format!(
                    "bus {} {} load {} already exceeds capacity {}",
                    bus.code, shift, now, bus.capacity
                ),
            );
        }
    }
}

/// The route `bus` will run once `set` is committed.
fn final_route<'a>(set: &'a NetChangeSet, bus: &'a Bus) -> &'a RouteId {
    match set.change_for(&EntityKey::bus(&bus.id)) {
        Some(EntityChange::Bus(d)) => &d.after.route_id,
        _ => &bus.route_id,
    }
}

fn check_student(
    report: &mut ValidationReport,
    set: &NetChangeSet,
    snapshot: &Snapshot,
    id: &StudentId,
    before: &StudentAssignment,
    after: &StudentAssignment,
) {
    let key = EntityKey::student(id);
    let Some(student) = snapshot.student(id) else {
        missing(report, key);
        return;
    };
    let Some(bus) = snapshot.bus(&after.bus_id) else {
        missing(report, EntityKey::bus(&after.bus_id));
        return;
    };

    if before.bus_id != after.bus_id && !bus.shift_mode.accepts(student.shift) {
        report.error(
            ValidationIssueKind::Compatibility,
            key.clone(),
            format!(
                "student {} rides the {} shift, which bus {} does not serve",
                student.code, student.shift, bus.code
            ),
        );
    }

    // Unresolved routes are already warned about; nothing to compare stops against.
    if let Some(route) = snapshot.resolve_route(final_route(set, bus)) {
        if !route.contains_stop(&after.stop_id) {
            report.error(
                ValidationIssueKind::StopCoverage,
                key,
                format!(
                    "stop {} of student {} is not on route {} of bus {}",
                    after.stop_id, student.code, route.id, bus.code
                ),
            );
        }
    }
}

/// Buses a report flags as over capacity.
pub fn overloaded_buses(report: &ValidationReport) -> Vec<BusId> {
    let mut out: Vec<BusId> = report
        .of_kind(ValidationIssueKind::Capacity)
        .filter_map(|i| i.entity.as_ref())
        .map(|k| BusId::new(k.id.clone()))
        .collect();
    out.dedup();
    out
}
