//! Weighted multi-factor candidate ranker.

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::debug;

use super::factors::{LoadRelief, SeatAvailability, ShiftMatch, StopProximity};
use super::{FactorScore, RankedBus, RankingContext, RankingFactor};
use crate::config::{EngineConfig, LoadThresholds, RankingWeights};
use crate::error::{Error, Result};
use crate::models::{BusId, EntityKey, Snapshot, StudentId};

#[derive(Clone)]
struct WeightedFactor {
    factor: Arc<dyn RankingFactor>,
    weight: f64,
}

/// Scores candidate buses and orders them best first.
///
/// Ties are broken by bus id so the ranking is deterministic.
///
/// # Example
/// ```
/// use u_reassign::config::RankingWeights;
/// use u_reassign::ranking::CandidateRanker;
///
/// let ranker = CandidateRanker::with_weights(RankingWeights::default());
/// assert_eq!(ranker.factor_names(), vec!["seats", "proximity", "shift", "load"]);
/// ```
#[derive(Clone)]
pub struct CandidateRanker {
    factors: Vec<WeightedFactor>,
    thresholds: LoadThresholds,
}

impl CandidateRanker {
    /// Creates a ranker with no factors.
    pub fn new() -> Self {
        Self {
            factors: Vec::new(),
            thresholds: LoadThresholds::default(),
        }
    }

    /// Creates a ranker with the four built-in factors.
    pub fn with_weights(weights: RankingWeights) -> Self {
        Self::new()
            .with_factor(SeatAvailability, weights.seats)
            .with_factor(StopProximity, weights.proximity)
            .with_factor(ShiftMatch, weights.shift)
            .with_factor(LoadRelief, weights.load)
    }

    /// Creates a ranker from engine configuration.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::with_weights(config.weights).with_thresholds(config.thresholds)
    }

    /// Adds a weighted factor.
    pub fn with_factor<F: RankingFactor + 'static>(mut self, factor: F, weight: f64) -> Self {
        self.factors.push(WeightedFactor {
            factor: Arc::new(factor),
            weight,
        });
        self
    }

    /// Sets the load thresholds.
    pub fn with_thresholds(mut self, thresholds: LoadThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// The load thresholds in use.
    pub fn thresholds(&self) -> LoadThresholds {
        self.thresholds
    }

    /// Names of the configured factors, in evaluation order.
    pub fn factor_names(&self) -> Vec<&'static str> {
        self.factors.iter().map(|wf| wf.factor.name()).collect()
    }

    /// Ranks `candidates` as targets for `students` leaving `source`.
    ///
    /// The source bus is never ranked.
    ///
    /// # Errors
    /// [`Error::NotFound`] for an unknown student, candidate or source.
    pub fn rank(
        &self,
        snapshot: &Snapshot,
        students: &[StudentId],
        candidates: &[BusId],
        source: Option<&BusId>,
    ) -> Result<Vec<RankedBus>> {
        let context = RankingContext::resolve(snapshot, students, source, self.thresholds)?;
        self.rank_in(&context, candidates)
    }

    /// Ranks `candidates` within an already resolved context.
    pub fn rank_in(
        &self,
        context: &RankingContext<'_>,
        candidates: &[BusId],
    ) -> Result<Vec<RankedBus>> {
        let source_id = context.source.map(|b| &b.id);
        let mut ranked = Vec::with_capacity(candidates.len());
        for id in candidates {
            if Some(id) == source_id {
                continue;
            }
            let bus = context.snapshot.bus(id).ok_or_else(|| Error::NotFound {
                key: EntityKey::bus(id),
            })?;
            let factors: Vec<FactorScore> = self
                .factors
                .iter()
                .map(|wf| FactorScore {
                    name: wf.factor.name().to_string(),
                    weight: wf.weight,
                    value: wf.factor.evaluate(bus, context),
                })
                .collect();
            let score = factors.iter().map(|f| f.weight * f.value).sum();
            ranked.push(RankedBus {
                bus_id: id.clone(),
                score,
                factors,
            });
        }

        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.bus_id.cmp(&b.bus_id))
        });
        ranked.dedup_by(|a, b| a.bus_id == b.bus_id);
        debug!(
            candidates = candidates.len(),
            ranked = ranked.len(),
            best = ranked.first().map(|r| r.bus_id.as_str()),
            "ranked candidate buses"
        );
        Ok(ranked)
    }
}

impl Default for CandidateRanker {
    fn default() -> Self {
        Self::with_weights(RankingWeights::default())
    }
}

impl std::fmt::Debug for CandidateRanker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandidateRanker")
            .field(
                "factors",
                &self
                    .factors
                    .iter()
                    .map(|wf| format!("{}(w={})", wf.factor.name(), wf.weight))
                    .collect::<Vec<_>>(),
            )
            .field("thresholds", &self.thresholds)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Bus, Route, ShiftMode, Student};

    fn snapshot() -> Snapshot {
        Snapshot::new()
            .with_route(Route::new("R1").with_stop("S1", "Gate").with_stop("S2", "Hall"))
            .with_route(Route::new("R2").with_stop("S2", "Hall").with_stop("S1", "Gate"))
            .with_bus(Bus::new("src", 20, "R1").with_load(20, 0))
            .with_bus(Bus::new("near", 20, "R1").with_load(5, 0))
            .with_bus(Bus::new("far", 20, "R2").with_load(5, 0))
            .with_bus(Bus::new("twin", 20, "R1").with_load(5, 0))
            .with_bus(
                Bus::new("evening", 20, "R1")
                    .with_load(0, 0)
                    .with_shift_mode(ShiftMode::Evening),
            )
            .with_student(Student::new("A", "src", "R1", "S1"))
    }

    fn ids(raw: &[&str]) -> Vec<BusId> {
        raw.iter().map(|s| BusId::new(*s)).collect()
    }

    #[test]
    fn test_rank_orders_best_first_and_skips_source() {
        let snap = snapshot();
        let ranked = CandidateRanker::default()
            .rank(
                &snap,
                &["A".into()],
                &ids(&["far", "src", "near", "evening"]),
                Some(&"src".into()),
            )
            .unwrap();

        let order: Vec<&str> = ranked.iter().map(|r| r.bus_id.as_str()).collect();
        assert_eq!(order, vec!["near", "far", "evening"]);
        assert!(ranked[0].score > ranked[1].score);
        assert_eq!(ranked[0].factors.len(), 4);
        assert_eq!(ranked[0].factor("proximity"), Some(1.0));
    }

    #[test]
    fn test_ties_broken_by_id() {
        let snap = snapshot();
        let ranked = CandidateRanker::default()
            .rank(&snap, &["A".into()], &ids(&["twin", "near"]), Some(&"src".into()))
            .unwrap();
        assert_eq!(ranked[0].bus_id.as_str(), "near");
        assert_eq!(ranked[1].bus_id.as_str(), "twin");
        assert_eq!(ranked[0].score, ranked[1].score);
    }

    #[test]
    fn test_unknown_candidate_is_error() {
        let snap = snapshot();
        let err = CandidateRanker::default()
            .rank(&snap, &["A".into()], &ids(&["ghost"]), None)
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_custom_weights() {
        let snap = snapshot();
        let ranker = CandidateRanker::new().with_factor(SeatAvailability, 1.0);
        let ranked = ranker
            .rank(&snap, &["A".into()], &ids(&["evening", "near"]), None)
            .unwrap();
        // An evening-only bus has no seat for a morning rider.
        assert_eq!(ranked[0].bus_id.as_str(), "near");
        assert!((ranked[0].score - 0.75).abs() < 1e-10);
        assert_eq!(ranked[1].score, 0.0);
    }
}
