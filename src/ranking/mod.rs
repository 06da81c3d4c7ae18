//! Candidate bus ranking for auto-suggest and auto-split.
//!
//! Scores target buses for a group of students with a weighted sum of
//! normalized factors. Every factor returns a value in `[0, 1]`; higher is
//! better.
//!
//! # Usage
//!
//! ```
//! use u_reassign::ranking::{factors, CandidateRanker};
//!
//! let ranker = CandidateRanker::new()
//!     .with_factor(factors::SeatAvailability, 0.7)
//!     .with_factor(factors::ShiftMatch, 0.3);
//! assert_eq!(ranker.factor_names(), vec!["seats", "shift"]);
//! ```
//!
//! | Factor | Default weight |
//! |--------|----------------|
//! | [`factors::SeatAvailability`] | 0.5 |
//! | [`factors::StopProximity`] | 0.3 |
//! | [`factors::ShiftMatch`] | 0.15 |
//! | [`factors::LoadRelief`] | 0.05 |

mod context;
pub mod factors;
mod ranker;
mod split;

pub use context::RankingContext;
pub use ranker::CandidateRanker;
pub use split::{auto_split, Allocation, SplitPlan, Unassigned};

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::models::{Bus, BusId};

/// One criterion for scoring a candidate bus.
///
/// # Score Convention
/// **Higher score = better candidate.** Values are normalized to `[0, 1]`
/// so weights compare across factors.
pub trait RankingFactor: Send + Sync + Debug {
    /// Short factor name used in score breakdowns.
    fn name(&self) -> &'static str;

    /// Scores `bus` as a target for the students in `context`.
    fn evaluate(&self, bus: &Bus, context: &RankingContext<'_>) -> f64;
}

/// Weighted value of one factor for one bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorScore {
    /// Factor name.
    pub name: String,
    /// Weight applied.
    pub weight: f64,
    /// Unweighted value in `[0, 1]`.
    pub value: f64,
}

/// A candidate bus with its score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedBus {
    /// The bus.
    pub bus_id: BusId,
    /// Weighted sum of factor values.
    pub score: f64,
    /// Per-factor breakdown.
    pub factors: Vec<FactorScore>,
}

impl RankedBus {
    /// Value of one factor, if it was evaluated.
    pub fn factor(&self, name: &str) -> Option<f64> {
        self.factors.iter().find(|f| f.name == name).map(|f| f.value)
    }
}
