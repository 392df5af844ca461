use serde::{Deserialize, Serialize};

/// MET floor used when the runner is standing still.
pub const BASE_MET: f64 = 8.0;

/// Live metrics for one session. Only mutated while the session is running.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub elapsed_seconds: u64,
    pub distance_meters: f64,
    pub current_speed_kmh: f64,
    pub max_speed_kmh: f64,
    pub calories_kcal: f64,
}

impl SessionMetrics {
    pub fn distance_km(&self) -> f64 {
        self.distance_meters / 1000.0
    }

    /// Minutes per kilometre, `None` before any distance is covered.
    pub fn pace_min_per_km(&self) -> Option<f64> {
        let km = self.distance_km();
        if km <= 0.0 {
            return None;
        }
        finite((self.elapsed_seconds as f64 / 60.0) / km)
    }

    /// Average speed over elapsed time, `None` before the first tick.
    pub fn avg_speed_kmh(&self) -> Option<f64> {
        if self.elapsed_seconds == 0 {
            return None;
        }
        finite(self.distance_km() / self.elapsed_seconds as f64 * 3600.0)
    }
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// kcal burned per minute at the given speed.
pub fn calories_per_minute(speed_kmh: f64, body_weight_kg: f64) -> f64 {
    let met = BASE_MET + speed_kmh.max(0.0) / 5.0;
    met * body_weight_kg * 3.5 / 200.0
}

/// Owns the session clock and derives everything that depends on it.
#[derive(Clone, Debug)]
pub struct MetricsEngine {
    metrics: SessionMetrics,
    body_weight_kg: f64,
}

impl MetricsEngine {
    pub fn new(body_weight_kg: f64) -> Self {
        Self {
            metrics: SessionMetrics::default(),
            body_weight_kg,
        }
    }

    pub fn metrics(&self) -> SessionMetrics {
        self.metrics
    }

    /// Advance the clock by one second and accrue calories for it.
    pub fn tick(&mut self) -> SessionMetrics {
        self.metrics.elapsed_seconds += 1;
        let per_minute = calories_per_minute(self.metrics.current_speed_kmh, self.body_weight_kg);
        let burned = per_minute / 60.0;
        if burned.is_finite() && burned > 0.0 {
            self.metrics.calories_kcal += burned;
        }
        self.metrics
    }

    pub fn set_distance(&mut self, meters: f64) {
        // Route distance never shrinks
        if meters.is_finite() && meters > self.metrics.distance_meters {
            self.metrics.distance_meters = meters;
        }
    }

    pub fn set_speed_kmh(&mut self, speed_kmh: f64) {
        if !speed_kmh.is_finite() || speed_kmh < 0.0 {
            return;
        }
        self.metrics.current_speed_kmh = speed_kmh;
        if speed_kmh > self.metrics.max_speed_kmh {
            self.metrics.max_speed_kmh = speed_kmh;
        }
    }

    pub fn reset(&mut self) {
        self.metrics = SessionMetrics::default();
    }
}
