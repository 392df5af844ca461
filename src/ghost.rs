use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::distance::point_distance;
use crate::error::TrackerResult;
use crate::types::{RoutePoint, SessionSummary};

/// A previously recorded or peer-supplied route to race against.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GhostRoute {
    pub start_timestamp: f64,
    pub points: Vec<RoutePoint>,
}

impl GhostRoute {
    pub fn new(start_timestamp: f64, points: Vec<RoutePoint>) -> Self {
        Self {
            start_timestamp,
            points,
        }
    }

    /// Ghost from a finished session; the first route point is the start.
    pub fn from_summary(summary: &SessionSummary) -> Option<Self> {
        let first = summary.route.first()?;
        Some(Self::new(first.timestamp, summary.route.clone()))
    }

    /// Loads a ghost from either a saved session summary or a bare ghost route.
    pub fn from_file(path: impl AsRef<Path>) -> TrackerResult<Option<Self>> {
        let raw = fs::read_to_string(path)?;
        if let Ok(summary) = serde_json::from_str::<SessionSummary>(&raw) {
            return Ok(Self::from_summary(&summary));
        }
        let route: GhostRoute = serde_json::from_str(&raw)?;
        Ok((!route.points.is_empty()).then_some(route))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GhostComparison {
    /// Ghost time at the live distance minus live elapsed; negative means the runner leads.
    pub delta_seconds: f64,
    /// The runner has gone past the ghost's recorded distance and the delta is frozen
    pub ghost_finished: bool,
}

/// Compares the live run against a ghost route by distance covered.
#[derive(Clone, Debug)]
pub struct GhostComparator {
    route: GhostRoute,
    /// Running haversine total at each ghost point
    cumulative: Vec<f64>,
    last: Option<GhostComparison>,
}

impl GhostComparator {
    pub fn new(route: GhostRoute) -> Self {
        let mut cumulative = Vec::with_capacity(route.points.len());
        let mut total = 0.0;
        for (i, point) in route.points.iter().enumerate() {
            if i > 0 {
                let d = point_distance(&route.points[i - 1], point);
                if d.is_finite() {
                    total += d;
                }
            }
            cumulative.push(total);
        }
        Self {
            route,
            cumulative,
            last: None,
        }
    }

    pub fn route(&self) -> &GhostRoute {
        &self.route
    }

    pub fn total_distance_m(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    /// Seconds the ghost needed to reach `distance_m`, `None` past its end.
    pub fn ghost_time_at(&self, distance_m: f64) -> Option<f64> {
        let idx = self.cumulative.partition_point(|total| *total < distance_m);
        let point = self.route.points.get(idx)?;
        Some(point.timestamp - self.route.start_timestamp)
    }

    /// Compare at the live distance. Once the ghost's route is exhausted the
    /// last comparison is returned frozen with `ghost_finished` set.
    pub fn compare(
        &mut self,
        live_distance_m: f64,
        live_elapsed_secs: f64,
    ) -> Option<GhostComparison> {
        match self.ghost_time_at(live_distance_m) {
            Some(ghost_secs) => {
                let comparison = GhostComparison {
                    delta_seconds: ghost_secs - live_elapsed_secs,
                    ghost_finished: false,
                };
                self.last = Some(comparison);
                Some(comparison)
            }
            None => {
                let frozen = self.last.map(|last| GhostComparison {
                    ghost_finished: true,
                    ..last
                });
                self.last = frozen;
                frozen
            }
        }
    }

    pub fn last(&self) -> Option<GhostComparison> {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::EARTH_RADIUS_M;
    use approx::assert_relative_eq;

    /// Ghost covering 100 m every 30 s along a meridian, starting 5 s after its clock.
    fn ghost() -> GhostRoute {
        let step = (100.0 / EARTH_RADIUS_M).to_degrees();
        let points = (0..5)
            .map(|i| RoutePoint::new(55.0 + step * i as f64, 12.0, 1005.0 + 30.0 * i as f64))
            .collect();
        GhostRoute::new(1000.0, points)
    }

    #[test]
    fn test_total_distance() {
        let comparator = GhostComparator::new(ghost());
        assert_relative_eq!(comparator.total_distance_m(), 400.0, max_relative = 1e-6);
    }

    #[test]
    fn test_zero_distance_reports_ghost_start() {
        let mut comparator = GhostComparator::new(ghost());
        let comparison = comparator.compare(0.0, 0.0).unwrap();
        assert_eq!(comparison.delta_seconds, 5.0);
        assert!(!comparison.ghost_finished);
    }

    #[test]
    fn test_lead_and_lag() {
        let mut comparator = GhostComparator::new(ghost());
        // 150 m: first point with running total >= 150 is 200 m, reached at 65 s
        let slower = comparator.compare(150.0, 80.0).unwrap();
        assert_eq!(slower.delta_seconds, -15.0);
        let faster = comparator.compare(150.0, 50.0).unwrap();
        assert_eq!(faster.delta_seconds, 15.0);
    }

    #[test]
    fn test_freezes_after_ghost_finished() {
        let mut comparator = GhostComparator::new(ghost());
        let last = comparator.compare(390.0, 100.0).unwrap();
        let frozen = comparator.compare(450.0, 130.0).unwrap();
        assert!(frozen.ghost_finished);
        assert_eq!(frozen.delta_seconds, last.delta_seconds);
        let still = comparator.compare(600.0, 200.0).unwrap();
        assert_eq!(still, frozen);
    }

    #[test]
    fn test_past_end_without_history_is_none() {
        let mut comparator = GhostComparator::new(ghost());
        assert!(comparator.compare(1_000.0, 10.0).is_none());
        assert!(GhostComparator::new(GhostRoute::new(0.0, vec![]))
            .compare(0.0, 0.0)
            .is_none());
    }

    #[test]
    fn test_from_summary_and_file() {
        let route = ghost().points;
        let summary = SessionSummary {
            session_id: "session_1".into(),
            started_at: chrono::Utc::now(),
            ended_at: chrono::Utc::now(),
            distance_km: 0.4,
            duration_seconds: 125,
            avg_speed_kmh: 11.52,
            max_speed_kmh: 14.0,
            calories_kcal: 21.0,
            start: Some(route[0].lat_lng()),
            end: Some(route[4].lat_lng()),
            route,
        };
        let from_summary = GhostRoute::from_summary(&summary).unwrap();
        assert_eq!(from_summary.start_timestamp, 1005.0);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ghost.json");
        fs::write(&path, summary.to_json().unwrap()).unwrap();
        assert_eq!(GhostRoute::from_file(&path).unwrap(), Some(from_summary));

        let bare = dir.path().join("bare.json");
        fs::write(&bare, serde_json::to_string(&ghost()).unwrap()).unwrap();
        assert_eq!(GhostRoute::from_file(&bare).unwrap(), Some(ghost()));
    }
}
