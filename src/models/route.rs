//! Route model.
//!
//! A route is an ordered list of stops. Routes are read-only to the
//! engine; they are only consulted for stop coverage and proximity.

use serde::{Deserialize, Serialize};

use super::{RouteId, StopId};

/// A stop on a route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stop {
    /// Stop identifier.
    pub id: StopId,
    /// Display name.
    pub name: String,
    /// Position along the route (0-based).
    pub sequence: u32,
}

/// A route document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// Document id.
    pub id: RouteId,
    /// Human-readable alias that some records use instead of the id
    /// (e.g. "Route 5" for document `route-5`).
    pub alias: Option<RouteId>,
    /// Stops in visiting order.
    pub stops: Vec<Stop>,
}

impl Stop {
    /// Creates a stop.
    pub fn new(id: impl Into<StopId>, name: impl Into<String>, sequence: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            sequence,
        }
    }
}

impl Route {
    /// Creates a route with no stops.
    pub fn new(id: impl Into<RouteId>) -> Self {
        Self {
            id: id.into(),
            alias: None,
            stops: Vec::new(),
        }
    }

    /// Sets the alias.
    pub fn with_alias(mut self, alias: impl Into<RouteId>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Appends a stop at the next sequence index.
    pub fn with_stop(mut self, id: impl Into<StopId>, name: impl Into<String>) -> Self {
        let sequence = self.stops.len() as u32;
        self.stops.push(Stop::new(id, name, sequence));
        self
    }

    /// Whether `reference` names this route by id or alias.
    pub fn is_named(&self, reference: &RouteId) -> bool {
        &self.id == reference || self.alias.as_ref() == Some(reference)
    }

    /// Whether the route visits `stop`.
    pub fn contains_stop(&self, stop: &StopId) -> bool {
        self.stops.iter().any(|s| &s.id == stop)
    }

    /// Sequence index of `stop`, if the route visits it.
    pub fn sequence_of(&self, stop: &StopId) -> Option<u32> {
        self.stops.iter().find(|s| &s.id == stop).map(|s| s.sequence)
    }

    /// Stop ids in visiting order.
    pub fn stop_ids(&self) -> Vec<StopId> {
        let mut stops: Vec<&Stop> = self.stops.iter().collect();
        stops.sort_by_key(|s| s.sequence);
        stops.into_iter().map(|s| s.id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_route() -> Route {
        Route::new("route-5")
            .with_alias("Route 5")
            .with_stop("S1", "Main Gate")
            .with_stop("S2", "Library")
            .with_stop("S3", "Hostel")
    }

    #[test]
    fn test_route_naming() {
        let r = sample_route();
        assert!(r.is_named(&RouteId::new("route-5")));
        assert!(r.is_named(&RouteId::new("Route 5")));
        assert!(!r.is_named(&RouteId::new("route-6")));
    }

    #[test]
    fn test_stop_lookup() {
        let r = sample_route();
        assert!(r.contains_stop(&StopId::new("S2")));
        assert_eq!(r.sequence_of(&StopId::new("S3")), Some(2));
        assert_eq!(r.sequence_of(&StopId::new("S9")), None);
        assert_eq!(
            r.stop_ids(),
            vec![StopId::new("S1"), StopId::new("S2"), StopId::new("S3")]
        );
    }
}
