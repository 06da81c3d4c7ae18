//! Greedy auto-split of a student group across several buses.
//!
//! # Algorithm
//!
//! 1. Rank the candidates for the whole group.
//! 2. For each student, in the order given, pick the highest-ranked bus that
//!    takes the student's shift, stops at the student's stop, and still has
//!    a free seat on that shift.
//! 3. Students no bus qualifies for are reported with a reason, never
//!    dropped.
//!
//! # Complexity
//! O(s * b) where s=students, b=candidate buses.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use tracing::debug;

use super::{CandidateRanker, RankedBus, RankingContext};
use crate::error::Result;
use crate::models::{Bus, BusId, ShiftLoad, Snapshot, Student, StudentId};
use crate::staging::OperationKind;

/// Students placed on one bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    /// Target bus.
    pub bus_id: BusId,
    /// Students placed on it, in input order.
    pub students: Vec<StudentId>,
}

/// A student no candidate could take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unassigned {
    /// The student.
    pub student_id: StudentId,
    /// Why no bus qualified.
    pub reason: String,
}

/// Result of an auto-split.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SplitPlan {
    /// Candidate ranking the split followed.
    pub ranking: Vec<RankedBus>,
    /// Placements, in rank order of their bus.
    pub allocations: Vec<Allocation>,
    /// Students left over.
    pub unassigned: Vec<Unassigned>,
}

impl SplitPlan {
    /// Whether every student was placed.
    pub fn is_complete(&self) -> bool {
        self.unassigned.is_empty()
    }

    /// Number of students placed.
    pub fn assigned_count(&self) -> usize {
        self.allocations.iter().map(|a| a.students.len()).sum()
    }

    /// Staged operations that carry out the plan, one per target bus.
    pub fn to_operations(&self) -> Vec<OperationKind> {
        self.allocations
            .iter()
            .map(|a| OperationKind::AssignStudents {
                students: a.students.clone(),
                bus: a.bus_id.clone(),
                stop: None,
            })
            .collect()
    }
}

/// Free seats per shift on a bus, decremented as students are placed.
fn free_seats(bus: &Bus) -> ShiftLoad {
    ShiftLoad::new(
        bus.capacity.saturating_sub(bus.load.morning),
        bus.capacity.saturating_sub(bus.load.evening),
    )
}

fn serves_stop(snapshot: &Snapshot, bus: &Bus, student: &Student) -> bool {
    snapshot
        .resolve_route(&bus.route_id)
        .is_some_and(|r| r.contains_stop(&student.stop_id))
}

fn unassigned_reason(snapshot: &Snapshot, buses: &[&Bus], student: &Student) -> String {
    let by_shift: Vec<&&Bus> = buses
        .iter()
        .filter(|b| b.shift_mode.accepts(student.shift))
        .collect();
    if by_shift.is_empty() {
        return format!("no candidate takes the {} shift", student.shift);
    }
    if !by_shift.iter().any(|b| serves_stop(snapshot, b, student)) {
        return format!("no {} candidate stops at {}", student.shift, student.stop_id);
    }
    format!("no seats left on the {} shift", student.shift)
}

/// Spreads `students` over `candidates`, best-ranked bus first.
///
/// # Errors
/// [`Error::NotFound`](crate::error::Error::NotFound) for an unknown
/// student, candidate or source.
pub fn auto_split(
    ranker: &CandidateRanker,
    snapshot: &Snapshot,
    students: &[StudentId],
    candidates: &[BusId],
    source: Option<&BusId>,
) -> Result<SplitPlan> {
    let context = RankingContext::resolve(snapshot, students, source, ranker.thresholds())?;
    let ranking = ranker.rank_in(&context, candidates)?;

    let buses: Vec<&Bus> = ranking
        .iter()
        .filter_map(|r| snapshot.bus(&r.bus_id))
        .collect();
    let mut seats: Vec<ShiftLoad> = buses.iter().map(|b| free_seats(b)).collect();
    let mut placed: BTreeMap<usize, Vec<StudentId>> = BTreeMap::new();
    let mut unassigned = Vec::new();

    for student in &context.students {
        let slot = (0..buses.len()).find(|&i| {
            buses[i].shift_mode.accepts(student.shift)
                && serves_stop(snapshot, buses[i], student)
                && seats[i].count(student.shift) > 0
        });
        match slot {
            Some(i) => {
                if student.is_active() {
                    seats[i].alight(student.shift);
                }
                placed.entry(i).or_default().push(student.id.clone());
            }
            None => unassigned.push(Unassigned {
                student_id: student.id.clone(),
                reason: unassigned_reason(snapshot, &buses, student),
            }),
        }
    }

    let allocations: Vec<Allocation> = placed
        .into_iter()
        .map(|(i, students)| Allocation {
            bus_id: buses[i].id.clone(),
            students,
        })
        .collect();
    debug!(
        students = students.len(),
        buses = allocations.len(),
        unassigned = unassigned.len(),
        "auto-split planned"
    );
    Ok(SplitPlan {
        ranking,
        allocations,
        unassigned,
    })
}
