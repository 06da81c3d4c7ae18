//! Inputs shared by all ranking factors.

use crate::config::LoadThresholds;
use crate::error::{Error, Result};
use crate::models::{Bus, BusId, EntityKey, Route, Shift, ShiftLoad, Snapshot, Student, StudentId};

/// The students being placed and where they come from.
#[derive(Debug, Clone)]
pub struct RankingContext<'a> {
    /// Snapshot the buses and routes are read from.
    pub snapshot: &'a Snapshot,
    /// Students being placed.
    pub students: Vec<&'a Student>,
    /// Bus the students leave, if any.
    pub source: Option<&'a Bus>,
    /// Load ratios for the load-relief factor.
    pub thresholds: LoadThresholds,
}

impl<'a> RankingContext<'a> {
    /// Resolves student and source ids against `snapshot`.
    ///
    /// # Errors
    /// [`Error::NotFound`] for an unknown student or source bus.
    pub fn resolve(
        snapshot: &'a Snapshot,
        students: &[StudentId],
        source: Option<&BusId>,
        thresholds: LoadThresholds,
    ) -> Result<Self> {
        let students = students
            .iter()
            .map(|id| {
                snapshot.student(id).ok_or_else(|| Error::NotFound {
                    key: EntityKey::student(id),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let source = source
            .map(|id| {
                snapshot.bus(id).ok_or_else(|| Error::NotFound {
                    key: EntityKey::bus(id),
                })
            })
            .transpose()?;
        Ok(Self {
            snapshot,
            students,
            source,
            thresholds,
        })
    }

    /// Seats the students need on each shift.
    pub fn demand(&self) -> ShiftLoad {
        let mut load = ShiftLoad::default();
        for student in &self.students {
            load.board(student.shift);
        }
        load
    }

    /// Shifts with non-zero demand.
    pub fn needed_shifts(&self) -> Vec<Shift> {
        let demand = self.demand();
        Shift::ALL
            .into_iter()
            .filter(|s| demand.count(*s) > 0)
            .collect()
    }

    /// The source bus's route.
    pub fn source_route(&self) -> Option<&'a Route> {
        self.source
            .and_then(|bus| self.snapshot.resolve_route(&bus.route_id))
    }

    /// The route `bus` runs, if its reference resolves.
    pub fn route_of(&self, bus: &Bus) -> Option<&'a Route> {
        self.snapshot.resolve_route(&bus.route_id)
    }
}

/// Highest per-shift occupancy ratio among the shifts `bus` serves.
pub(crate) fn peak_ratio(bus: &Bus, load: &ShiftLoad) -> f64 {
    if bus.capacity == 0 {
        return 1.0;
    }
    bus.shift_mode
        .served_shifts()
        .map(|s| f64::from(load.count(s)) / f64::from(bus.capacity))
        .fold(0.0, f64::max)
}
