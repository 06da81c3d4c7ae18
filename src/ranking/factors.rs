//! Built-in ranking factors.
//!
//! # Score Convention
//! All factors return values in `[0, 1]`, higher for better targets.

use std::collections::BTreeSet;

use super::context::peak_ratio;
use super::{RankingContext, RankingFactor};
use crate::models::{Bus, Shift, ShiftMode, StopId};

/// Free seats relative to capacity.
///
/// `available / capacity` on the tightest needed shift, or zero when any
/// needed shift lacks seats for all the students or is not taken by the bus.
#[derive(Debug, Clone, Copy)]
pub struct SeatAvailability;

impl RankingFactor for SeatAvailability {
    fn name(&self) -> &'static str {
        "seats"
    }

    fn evaluate(&self, bus: &Bus, context: &RankingContext<'_>) -> f64 {
        if bus.capacity == 0 {
            return 0.0;
        }
        let demand = context.demand();
        let shifts: Vec<Shift> = if context.students.is_empty() {
            bus.shift_mode.served_shifts().collect()
        } else {
            context.needed_shifts()
        };

        let mut score = 1.0_f64;
        for shift in shifts {
            if !context.students.is_empty() && !bus.shift_mode.accepts(shift) {
                return 0.0;
            }
            let available = bus.capacity.saturating_sub(bus.load.count(shift));
            if available < demand.count(shift) {
                return 0.0;
            }
            score = score.min(f64::from(available) / f64::from(bus.capacity));
        }
        score
    }
}

/// Closeness of the students' stops on the target route.
///
/// Averages `1 / (1 + |Δsequence|)` over the distinct stops, comparing each
/// stop's position on the target route with its position on the source
/// route. A stop the target route lacks scores zero; a stop with no known
/// source position counts as Δ = 0.
#[derive(Debug, Clone, Copy)]
pub struct StopProximity;

impl RankingFactor for StopProximity {
    fn name(&self) -> &'static str {
        "proximity"
    }

    fn evaluate(&self, bus: &Bus, context: &RankingContext<'_>) -> f64 {
        let stops: BTreeSet<&StopId> = context.students.iter().map(|s| &s.stop_id).collect();
        if stops.is_empty() {
            return 0.0;
        }
        let Some(target) = context.route_of(bus) else {
            return 0.0;
        };
        let source = context.source_route();

        let total: f64 = stops
            .iter()
            .map(|stop| match target.sequence_of(stop) {
                None => 0.0,
                Some(t) => {
                    let s = source.and_then(|r| r.sequence_of(stop)).unwrap_or(t);
                    1.0 / (1.0 + f64::from(t.abs_diff(s)))
                }
            })
            .sum();
        total / stops.len() as f64
    }
}

/// How well the bus's shift mode fits the students.
///
/// Per student: 0 when the bus may not take the student at all (see
/// [`ShiftMode::accepts`]), else 1.0 when the bus runs exactly the
/// student's shift and 0.75 when it runs both. Without students the source
/// bus's mode is compared instead, with 0.25 for disjoint modes.
#[derive(Debug, Clone, Copy)]
pub struct ShiftMatch;

fn mode_of(shift: Shift) -> ShiftMode {
    match shift {
        Shift::Morning => ShiftMode::Morning,
        Shift::Evening => ShiftMode::Evening,
    }
}

fn mode_match(wanted: ShiftMode, offered: ShiftMode) -> f64 {
    if wanted == offered {
        1.0
    } else if wanted == ShiftMode::Both || offered == ShiftMode::Both {
        0.75
    } else {
        0.25
    }
}

impl RankingFactor for ShiftMatch {
    fn name(&self) -> &'static str {
        "shift"
    }

    fn evaluate(&self, bus: &Bus, context: &RankingContext<'_>) -> f64 {
        if context.students.is_empty() {
            return context
                .source
                .map_or(0.75, |src| mode_match(src.shift_mode, bus.shift_mode));
        }
        let total: f64 = context
            .students
            .iter()
            .map(|s| {
                if bus.shift_mode.accepts(s.shift) {
                    mode_match(mode_of(s.shift), bus.shift_mode)
                } else {
                    0.0
                }
            })
            .sum();
        total / context.students.len() as f64
    }
}

/// Reward for relieving an overloaded source without overloading the target.
///
/// The target's projected peak ratio `r` (after the students board) is
/// scored 1 up to the comfortable threshold, falling linearly to 0 at full.
/// When the source is above the overloaded threshold, any target that stays
/// at or below that threshold scores 1 and the rest are halved.
#[derive(Debug, Clone, Copy)]
pub struct LoadRelief;

impl LoadRelief {
    fn penalty_curve(ratio: f64, comfortable: f64) -> f64 {
        if ratio <= comfortable {
            1.0
        } else if ratio < 1.0 {
            (1.0 - ratio) / (1.0 - comfortable)
        } else {
            0.0
        }
    }
}

impl RankingFactor for LoadRelief {
    fn name(&self) -> &'static str {
        "load"
    }

    fn evaluate(&self, bus: &Bus, context: &RankingContext<'_>) -> f64 {
        let demand = context.demand();
        let projected = crate::models::ShiftLoad::new(
            bus.load.morning + demand.morning,
            bus.load.evening + demand.evening,
        );
        let ratio = peak_ratio(bus, &projected);
        let curve = Self::penalty_curve(ratio, context.thresholds.comfortable);

        let source_overloaded = context
            .source
            .is_some_and(|src| peak_ratio(src, &src.load) > context.thresholds.overloaded);
        if !source_overloaded {
            curve
        } else if ratio <= context.thresholds.overloaded {
            1.0
        } else {
            curve * 0.5
        }
    }
}
