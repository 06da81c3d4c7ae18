//! Service shifts and per-shift load counters.
//!
//! A bus serves the morning run, the evening run, or both. Occupancy is
//! tracked separately for each run so a `Both` bus can be full in the
//! morning and half empty in the evening.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The run a student rides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Shift {
    /// Morning pickup run.
    Morning,
    /// Evening drop-off run.
    Evening,
}

/// The runs a bus operates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShiftMode {
    /// Morning run only.
    Morning,
    /// Evening run only.
    Evening,
    /// Both runs, each with the full seat capacity.
    Both,
}

/// Occupancy counters for each run of a bus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftLoad {
    /// Students riding the morning run.
    pub morning: u32,
    /// Students riding the evening run.
    pub evening: u32,
}

impl Shift {
    /// Both shifts, in canonical order.
    pub const ALL: [Shift; 2] = [Shift::Morning, Shift::Evening];

    /// Lowercase name used in messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Shift::Morning => "morning",
            Shift::Evening => "evening",
        }
    }
}

impl fmt::Display for Shift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ShiftMode {
    /// Whether a student on `shift` may ride a bus in this mode.
    ///
    /// Morning students ride `Morning` or `Both` buses. Evening students
    /// ride `Both` buses only; evening-only buses are reserved for staff
    /// runs and never take student placements.
    pub fn accepts(self, shift: Shift) -> bool {
        match (shift, self) {
            (Shift::Morning, ShiftMode::Morning | ShiftMode::Both) => true,
            (Shift::Evening, ShiftMode::Both) => true,
            _ => false,
        }
    }

    /// Whether the bus runs during `shift`.
    ///
    /// Unlike [`accepts`](Self::accepts), this is about the capacity check:
    /// an evening-only bus still has an evening counter to keep in bounds.
    pub fn serves(self, shift: Shift) -> bool {
        matches!(
            (self, shift),
            (ShiftMode::Both, _)
                | (ShiftMode::Morning, Shift::Morning)
                | (ShiftMode::Evening, Shift::Evening)
        )
    }

    /// Shifts whose counters are bound by capacity.
    pub fn served_shifts(self) -> impl Iterator<Item = Shift> {
        Shift::ALL.into_iter().filter(move |&s| self.serves(s))
    }
}

impl ShiftLoad {
    /// Creates a load from explicit counts.
    pub fn new(morning: u32, evening: u32) -> Self {
        Self { morning, evening }
    }

    /// Count for one shift.
    #[inline]
    pub fn count(&self, shift: Shift) -> u32 {
        match shift {
            Shift::Morning => self.morning,
            Shift::Evening => self.evening,
        }
    }

    /// Adds one rider to a shift.
    pub fn board(&mut self, shift: Shift) {
        match shift {
            Shift::Morning => self.morning += 1,
            Shift::Evening => self.evening += 1,
        }
    }

    /// Removes one rider from a shift, saturating at zero.
    pub fn alight(&mut self, shift: Shift) {
        match shift {
            Shift::Morning => self.morning = self.morning.saturating_sub(1),
            Shift::Evening => self.evening = self.evening.saturating_sub(1),
        }
    }

    /// Shifts whose count exceeds `capacity`, among the shifts `mode` serves.
    ///
    /// A `Both` bus is overloaded if either counter is over; a single-shift
    /// bus only checks its own counter.
    pub fn overloaded_shifts(&self, capacity: u32, mode: ShiftMode) -> Vec<Shift> {
        mode.served_shifts()
            .filter(|&s| self.count(s) > capacity)
            .collect()
    }
}

impl fmt::Display for ShiftLoad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.morning, self.evening)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shift_compatibility() {
        assert!(ShiftMode::Morning.accepts(Shift::Morning));
        assert!(ShiftMode::Both.accepts(Shift::Morning));
        assert!(ShiftMode::Both.accepts(Shift::Evening));
        assert!(!ShiftMode::Evening.accepts(Shift::Evening));
        assert!(!ShiftMode::Morning.accepts(Shift::Evening));
        assert!(!ShiftMode::Evening.accepts(Shift::Morning));
    }

    #[test]
    fn test_served_shifts() {
        let both: Vec<_> = ShiftMode::Both.served_shifts().collect();
        assert_eq!(both, vec![Shift::Morning, Shift::Evening]);
        let evening: Vec<_> = ShiftMode::Evening.served_shifts().collect();
        assert_eq!(evening, vec![Shift::Evening]);
    }

    #[test]
    fn test_overload_both_checks_each_counter() {
        let load = ShiftLoad::new(30, 51);
        assert_eq!(load.overloaded_shifts(50, ShiftMode::Both), vec![Shift::Evening]);
        assert!(load.overloaded_shifts(51, ShiftMode::Both).is_empty());
    }

    #[test]
    fn test_overload_single_shift_ignores_other_counter() {
        // Stale evening counter on a morning-only bus does not count.
        let load = ShiftLoad::new(40, 80);
        assert!(load.overloaded_shifts(50, ShiftMode::Morning).is_empty());
        assert_eq!(load.overloaded_shifts(50, ShiftMode::Evening), vec![Shift::Evening]);
    }

    #[test]
    fn test_board_and_alight() {
        let mut load = ShiftLoad::default();
        load.board(Shift::Morning);
        load.board(Shift::Morning);
        load.board(Shift::Evening);
        load.alight(Shift::Morning);
        load.alight(Shift::Evening);
        load.alight(Shift::Evening);
        assert_eq!(load, ShiftLoad::new(1, 0));
    }
}
