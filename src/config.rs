//! Engine configuration.
//!
//! All fields have defaults, so a config file only needs to name what it
//! overrides:
//!
//! ```
//! use u_reassign::config::EngineConfig;
//!
//! let config = EngineConfig::from_json(r#"{ "allow_capacity_override": true }"#).unwrap();
//! assert!(config.allow_capacity_override);
//! assert!((config.weights.seats - 0.5).abs() < 1e-10);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Weights of the candidate ranking factors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingWeights {
    /// Seat availability.
    pub seats: f64,
    /// Stop proximity.
    pub proximity: f64,
    /// Shift match.
    pub shift: f64,
    /// Load-reduction impact.
    pub load: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            seats: 0.5,
            proximity: 0.3,
            shift: 0.15,
            load: 0.05,
        }
    }
}

impl RankingWeights {
    /// Sum of all weights.
    pub fn total(&self) -> f64 {
        self.seats + self.proximity + self.shift + self.load
    }
}

/// Load ratios used by the ranker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadThresholds {
    /// Above this ratio a bus counts as overloaded.
    pub overloaded: f64,
    /// Up to this ratio a target bus takes no load penalty.
    pub comfortable: f64,
}

impl Default for LoadThresholds {
    fn default() -> Self {
        Self {
            overloaded: 0.9,
            comfortable: 0.7,
        }
    }
}

/// Configuration of a [`ReassignmentEngine`](crate::engine::ReassignmentEngine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Ranking factor weights.
    pub weights: RankingWeights,
    /// Load thresholds for ranking and auto-split.
    pub thresholds: LoadThresholds,
    /// Whether callers may commit despite capacity errors.
    pub allow_capacity_override: bool,
    /// Whether commits and no-ops are written to the audit log.
    pub audit_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            weights: RankingWeights::default(),
            thresholds: LoadThresholds::default(),
            allow_capacity_override: false,
            audit_enabled: true,
        }
    }
}

impl EngineConfig {
    /// Parses a JSON config; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Sets the ranking weights.
    pub fn with_weights(mut self, weights: RankingWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Sets the load thresholds.
    pub fn with_thresholds(mut self, thresholds: LoadThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Allows or forbids capacity overrides.
    pub fn with_capacity_override(mut self, allow: bool) -> Self {
        self.allow_capacity_override = allow;
        self
    }

    /// Enables or disables audit writes.
    pub fn with_audit(mut self, enabled: bool) -> Self {
        self.audit_enabled = enabled;
        self
    }
}
