use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::display::{format_distance, format_duration, format_pace, format_speed};
use crate::sampler::LocationSource;
use crate::session::{LocationStatus, Session, SessionObserver, SessionState};

/// Snapshot of a session for dashboards, rewritten on every tick.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LiveStatus {
    pub timestamp: f64,
    pub session_id: String,
    pub state: SessionState,
    pub location_status: LocationStatus,
    pub elapsed_seconds: u64,
    pub distance_km: f64,
    pub current_speed_kmh: f64,
    pub max_speed_kmh: f64,
    pub calories_kcal: f64,
    pub route_points: usize,
    // Display strings, `--` when undefined
    pub duration: String,
    pub distance: String,
    pub pace: String,
    pub avg_speed: String,
    // Last fix
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub accuracy_meters: Option<f64>,
    // Ghost race
    pub ghost_delta_seconds: Option<f64>,
    pub ghost_finished: bool,
}

impl LiveStatus {
    pub fn from_session<S: LocationSource, O: SessionObserver>(session: &Session<S, O>) -> Self {
        let metrics = session.metrics();
        let position = session.position();
        let ghost = session.ghost_comparison();
        Self {
            timestamp: current_timestamp(),
            session_id: session.id().to_string(),
            state: session.state(),
            location_status: session.location_status(),
            elapsed_seconds: metrics.elapsed_seconds,
            distance_km: metrics.distance_km(),
            current_speed_kmh: metrics.current_speed_kmh,
            max_speed_kmh: metrics.max_speed_kmh,
            calories_kcal: metrics.calories_kcal,
            route_points: session.route().len(),
            duration: format_duration(metrics.elapsed_seconds),
            distance: format_distance(metrics.distance_meters),
            pace: format_pace(metrics.pace_min_per_km()),
            avg_speed: format_speed(metrics.avg_speed_kmh()),
            lat: position.map(|p| p.lat),
            lng: position.map(|p| p.lng),
            accuracy_meters: position.map(|p| p.accuracy_meters),
            ghost_delta_seconds: ghost.map(|g| g.delta_seconds),
            ghost_finished: ghost.is_some_and(|g| g.ghost_finished),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

pub fn current_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::display::PLACEHOLDER;
    use crate::sampler::mock::MockSource;
    use crate::types::LocationSample;

    #[test]
    fn test_fresh_session_uses_placeholders() {
        let (session, _rx) =
            Session::new(EngineConfig::default(), MockSource::new(), ()).unwrap();
        let status = LiveStatus::from_session(&session);
        assert_eq!(status.state, SessionState::Idle);
        assert_eq!(status.location_status, LocationStatus::Waiting);
        assert_eq!(status.pace, PLACEHOLDER);
        assert_eq!(status.avg_speed, PLACEHOLDER);
        assert_eq!(status.duration, "00:00");
        assert!(status.lat.is_none());
        assert!(status.ghost_delta_seconds.is_none());
    }

    #[test]
    fn test_save_running_snapshot() {
        let source = MockSource::new();
        let (mut session, mut rx) =
            Session::new(EngineConfig::default(), source.clone(), ()).unwrap();
        session.start().unwrap();
        source
            .latest_sink()
            .deliver(LocationSample::new(55.676, 12.568, 7.0, 0.0));
        while let Ok(event) = rx.try_recv() {
            session.handle_sampler_event(event);
        }
        session.tick();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live_status.json");
        LiveStatus::from_session(&session).save(&path).unwrap();

        let loaded: LiveStatus =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.state, SessionState::Running);
        assert_eq!(loaded.location_status, LocationStatus::Live);
        assert_eq!(loaded.elapsed_seconds, 1);
        assert_eq!(loaded.route_points, 1);
        assert_eq!(loaded.accuracy_meters, Some(7.0));
        assert_eq!(loaded.avg_speed, "0.0 km/h");
    }
}
