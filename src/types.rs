use serde::{Deserialize, Serialize};

/// One fix from the platform location watch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub lat: f64,
    pub lng: f64,
    pub accuracy_meters: f64,
    #[serde(default)]
    pub speed_mps: Option<f64>,
    /// Seconds since the Unix epoch
    pub timestamp: f64,
}

impl LocationSample {
    pub fn new(lat: f64, lng: f64, accuracy_meters: f64, timestamp: f64) -> Self {
        Self {
            lat,
            lng,
            accuracy_meters,
            speed_mps: None,
            timestamp,
        }
    }

    pub fn with_speed(mut self, speed_mps: f64) -> Self {
        self.speed_mps = Some(speed_mps);
        self
    }

    /// Reported speed, if the platform gave a usable one.
    pub fn valid_speed_mps(&self) -> Option<f64> {
        self.speed_mps.filter(|s| s.is_finite() && *s >= 0.0)
    }

    /// Finite, in-range coordinates and time with a non-negative accuracy.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && self.timestamp.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
            && self.accuracy_meters.is_finite()
            && self.accuracy_meters >= 0.0
    }

    pub fn to_route_point(&self) -> RoutePoint {
        RoutePoint {
            lat: self.lat,
            lng: self.lng,
            timestamp: self.timestamp,
        }
    }
}

/// A throttled, accepted sample stored in the route.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoutePoint {
    pub lat: f64,
    pub lng: f64,
    pub timestamp: f64,
}

impl RoutePoint {
    pub fn new(lat: f64, lng: f64, timestamp: f64) -> Self {
        Self { lat, lng, timestamp }
    }

    pub fn lat_lng(&self) -> LatLng {
        LatLng {
            lat: self.lat,
            lng: self.lng,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// Last known position as seen by every live sample, accepted or not.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurrentPosition {
    pub lat: f64,
    pub lng: f64,
    pub accuracy_meters: f64,
    pub timestamp: f64,
}

impl From<&LocationSample> for CurrentPosition {
    fn from(sample: &LocationSample) -> Self {
        CurrentPosition {
            lat: sample.lat,
            lng: sample.lng,
            accuracy_meters: sample.accuracy_meters,
            timestamp: sample.timestamp,
        }
    }
}

/// Final snapshot handed to persistence when a session stops.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub ended_at: chrono::DateTime<chrono::Utc>,
    pub distance_km: f64,
    pub duration_seconds: u64,
    /// 0.0 when the session never ticked
    pub avg_speed_kmh: f64,
    pub max_speed_kmh: f64,
    pub calories_kcal: f64,
    pub start: Option<LatLng>,
    pub end: Option<LatLng>,
    pub route: Vec<RoutePoint>,
}

impl SessionSummary {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
