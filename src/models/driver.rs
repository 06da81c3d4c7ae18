//! Driver model.
//!
//! A driver either drives exactly one bus or sits in the reserve pool.

use serde::{Deserialize, Serialize};

use super::bus::display_opt;
use super::change::{Assignable, FieldMismatch};
use super::{BusId, DriverId};

/// A driver document.
///
/// `reserved` is kept in step with `bus_id` by every mutator on this type:
/// a driver is reserved iff no bus is assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    /// Unique driver identifier.
    pub id: DriverId,
    /// Employee code used on rosters (e.g. "EMP-0042").
    pub employee_code: String,
    /// Display name.
    pub name: String,
    /// Assigned bus. `None` = reserve pool.
    pub bus_id: Option<BusId>,
    /// Whether the driver is in the reserve pool.
    pub reserved: bool,
}

/// The part of a driver the reassignment engine may change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverAssignment {
    /// Assigned bus.
    pub bus_id: Option<BusId>,
}

impl Driver {
    /// Creates a reserved driver.
    pub fn new(id: impl Into<DriverId>, employee_code: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            employee_code: employee_code.into(),
            name: String::new(),
            bus_id: None,
            reserved: true,
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Assigns a bus.
    pub fn with_bus(mut self, bus_id: impl Into<BusId>) -> Self {
        self.bus_id = Some(bus_id.into());
        self.reserved = false;
        self
    }
}

impl Assignable for Driver {
    type State = DriverAssignment;

    fn assignment(&self) -> DriverAssignment {
        DriverAssignment {
            bus_id: self.bus_id.clone(),
        }
    }

    fn set_assignment(&mut self, state: &DriverAssignment) {
        self.bus_id = state.bus_id.clone();
        self.reserved = state.is_reserved();
    }
}

impl DriverAssignment {
    /// A reserve-pool assignment.
    pub fn reserved() -> Self {
        Self { bus_id: None }
    }

    /// Whether the driver ends up in the reserve pool.
    pub fn is_reserved(&self) -> bool {
        self.bus_id.is_none()
    }

    /// Field-by-field comparison against the observed state.
    pub fn mismatches(&self, actual: &DriverAssignment) -> Vec<FieldMismatch> {
        if self.bus_id == actual.bus_id {
            return Vec::new();
        }
        vec![FieldMismatch::new(
            "bus_id",
            display_opt(&self.bus_id),
            display_opt(&actual.bus_id),
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_tracks_bus() {
        let mut d = Driver::new("D1", "EMP-1").with_bus("bus-1");
        assert!(!d.reserved);

        d.set_assignment(&DriverAssignment::reserved());
        assert!(d.reserved);
        assert_eq!(d.bus_id, None);

        d.set_assignment(&DriverAssignment {
            bus_id: Some(BusId::new("bus-2")),
        });
        assert!(!d.reserved);
    }

    #[test]
    fn test_driver_mismatch() {
        let a = DriverAssignment::reserved();
        let b = DriverAssignment {
            bus_id: Some(BusId::new("bus-9")),
        };
        let m = a.mismatches(&b);
        assert_eq!(m.len(), 1);
        assert_eq!(m[0].expected, "none");
        assert_eq!(m[0].actual, "bus-9");
    }
}
