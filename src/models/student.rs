//! Student model.

use serde::{Deserialize, Serialize};

use super::change::{Assignable, FieldMismatch};
use super::{BusId, RouteId, Shift, StopId, StudentId};

/// Enrollment status of a student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StudentStatus {
    /// Riding; counted in bus load.
    Active,
    /// Temporarily off transport; keeps the seat record but is not counted.
    Suspended,
    /// Left transport.
    Withdrawn,
}

/// A student document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    /// Unique student identifier.
    pub id: StudentId,
    /// Roll number shown to operators.
    pub code: String,
    /// Assigned bus.
    pub bus_id: BusId,
    /// Route reference (id or alias).
    pub route_id: RouteId,
    /// Boarding stop.
    pub stop_id: StopId,
    /// Run the student rides.
    pub shift: Shift,
    /// Enrollment status.
    pub status: StudentStatus,
}

/// The part of a student the reassignment engine may change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentAssignment {
    /// Assigned bus.
    pub bus_id: BusId,
    /// Route reference.
    pub route_id: RouteId,
    /// Boarding stop.
    pub stop_id: StopId,
}

impl Student {
    /// Creates an active morning student.
    pub fn new(
        id: impl Into<StudentId>,
        bus_id: impl Into<BusId>,
        route_id: impl Into<RouteId>,
        stop_id: impl Into<StopId>,
    ) -> Self {
        let id = id.into();
        Self {
            code: id.to_string(),
            id,
            bus_id: bus_id.into(),
            route_id: route_id.into(),
            stop_id: stop_id.into(),
            shift: Shift::Morning,
            status: StudentStatus::Active,
        }
    }

    /// Sets the roll number.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    /// Sets the shift.
    pub fn with_shift(mut self, shift: Shift) -> Self {
        self.shift = shift;
        self
    }

    /// Sets the status.
    pub fn with_status(mut self, status: StudentStatus) -> Self {
        self.status = status;
        self
    }

    /// Whether the student occupies a seat.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == StudentStatus::Active
    }
}

impl Assignable for Student {
    type State = StudentAssignment;

    fn assignment(&self) -> StudentAssignment {
        StudentAssignment {
            bus_id: self.bus_id.clone(),
            route_id: self.route_id.clone(),
            stop_id: self.stop_id.clone(),
        }
    }

    fn set_assignment(&mut self, state: &StudentAssignment) {
        self.bus_id = state.bus_id.clone();
        self.route_id = state.route_id.clone();
        self.stop_id = state.stop_id.clone();
    }
}

impl StudentAssignment {
    /// Field-by-field comparison against the observed state.
    pub fn mismatches(&self, actual: &StudentAssignment) -> Vec<FieldMismatch> {
        let mut out = Vec::new();
        if self.bus_id != actual.bus_id {
            out.push(FieldMismatch::new(
                "bus_id",
                self.bus_id.to_string(),
                actual.bus_id.to_string(),
            ));
        }
        if self.route_id != actual.route_id {
            out.push(FieldMismatch::new(
                "route_id",
                self.route_id.to_string(),
                actual.route_id.to_string(),
            ));
        }
        if self.stop_id != actual.stop_id {
            out.push(FieldMismatch::new(
                "stop_id",
                self.stop_id.to_string(),
                actual.stop_id.to_string(),
            ));
        }
        out
    }
}
