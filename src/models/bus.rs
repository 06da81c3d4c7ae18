//! Bus model.
//!
//! A bus has a seat capacity, per-shift occupancy counters, at most one
//! driver, and a route whose stops it visits in order.

use serde::{Deserialize, Serialize};

use super::change::{Assignable, FieldMismatch};
use super::{BusId, DriverId, RouteId, ShiftLoad, ShiftMode, StopId};

/// A bus document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bus {
    /// Unique bus identifier.
    pub id: BusId,
    /// Fleet number painted on the bus (e.g. "B-12").
    pub code: String,
    /// Seats available on each run.
    pub capacity: u32,
    /// Current occupancy per run.
    pub load: ShiftLoad,
    /// Runs this bus operates.
    pub shift_mode: ShiftMode,
    /// Assigned driver. `None` = no driver.
    pub driver_id: Option<DriverId>,
    /// Route the bus runs.
    pub route_id: RouteId,
    /// Stops visited, in order.
    pub stops: Vec<StopId>,
}

/// The part of a bus the reassignment engine may change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusAssignment {
    /// Assigned driver.
    pub driver_id: Option<DriverId>,
    /// Route reference.
    pub route_id: RouteId,
    /// Stops visited, in order.
    pub stops: Vec<StopId>,
    /// Per-shift occupancy.
    pub load: ShiftLoad,
}

impl Bus {
    /// Creates a bus that runs both shifts with no driver.
    pub fn new(id: impl Into<BusId>, capacity: u32, route_id: impl Into<RouteId>) -> Self {
        let id = id.into();
        Self {
            code: id.to_string(),
            id,
            capacity,
            load: ShiftLoad::default(),
            shift_mode: ShiftMode::Both,
            driver_id: None,
            route_id: route_id.into(),
            stops: Vec::new(),
        }
    }

    /// Sets the fleet code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    /// Sets the shift mode.
    pub fn with_shift_mode(mut self, mode: ShiftMode) -> Self {
        self.shift_mode = mode;
        self
    }

    /// Sets the per-shift load.
    pub fn with_load(mut self, morning: u32, evening: u32) -> Self {
        self.load = ShiftLoad::new(morning, evening);
        self
    }

    /// Assigns a driver.
    pub fn with_driver(mut self, driver_id: impl Into<DriverId>) -> Self {
        self.driver_id = Some(driver_id.into());
        self
    }

    /// Sets the stop sequence.
    pub fn with_stops<I, T>(mut self, stops: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<StopId>,
    {
        self.stops = stops.into_iter().map(Into::into).collect();
        self
    }
}

impl Assignable for Bus {
    type State = BusAssignment;

    fn assignment(&self) -> BusAssignment {
        BusAssignment {
            driver_id: self.driver_id.clone(),
            route_id: self.route_id.clone(),
            stops: self.stops.clone(),
            load: self.load,
        }
    }

    fn set_assignment(&mut self, state: &BusAssignment) {
        self.driver_id = state.driver_id.clone();
        self.route_id = state.route_id.clone();
        self.stops = state.stops.clone();
        self.load = state.load;
    }
}

impl BusAssignment {
    /// Field-by-field comparison against the observed state.
    pub fn mismatches(&self, actual: &BusAssignment) -> Vec<FieldMismatch> {
        let mut out = Vec::new();
        if self.driver_id != actual.driver_id {
            out.push(FieldMismatch::new(
                "driver_id",
                display_opt(&self.driver_id),
                display_opt(&actual.driver_id),
            ));
        }
        if self.route_id != actual.route_id {
            out.push(FieldMismatch::new(
                "route_id",
                self.route_id.to_string(),
                actual.route_id.to_string(),
            ));
        }
        if self.stops != actual.stops {
            out.push(FieldMismatch::new(
                "stops",
                join(&self.stops),
                join(&actual.stops),
            ));
        }
        if self.load.morning != actual.load.morning {
            out.push(FieldMismatch::new(
                "load.morning",
                self.load.morning.to_string(),
                actual.load.morning.to_string(),
            ));
        }
        if self.load.evening != actual.load.evening {
            out.push(FieldMismatch::new(
                "load.evening",
                self.load.evening.to_string(),
                actual.load.evening.to_string(),
            ));
        }
        out
    }
}

pub(crate) fn display_opt<T: std::fmt::Display>(value: &Option<T>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "none".to_string(),
    }
}

fn join(stops: &[StopId]) -> String {
    stops
        .iter()
        .map(StopId::as_str)
        .collect::<Vec<_>>()
        .join(",")
}
