use crate::types::RoutePoint;

/// Mean Earth radius used for every route distance in the engine.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in meters between two lat/lng pairs (degrees).
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).max(0.0).sqrt());
    EARTH_RADIUS_M * c
}

pub fn point_distance(a: &RoutePoint, b: &RoutePoint) -> f64 {
    haversine_distance(a.lat, a.lng, b.lat, b.lng)
}

/// Admits at most one sample per fixed window of sample time.
#[derive(Clone, Debug)]
pub struct SampleThrottle {
    window_secs: f64,
    last_accepted: Option<f64>,
}

impl SampleThrottle {
    pub fn new(window_secs: f64) -> Self {
        Self {
            window_secs,
            last_accepted: None,
        }
    }

    /// Returns true and records the timestamp when the sample should enter the route.
    pub fn admit(&mut self, timestamp: f64) -> bool {
        let accept = match self.last_accepted {
            None => true,
            Some(last) => timestamp - last >= self.window_secs,
        };
        if accept {
            self.last_accepted = Some(timestamp);
        }
        accept
    }

    pub fn reset(&mut self) {
        self.last_accepted = None;
    }
}

/// Running route distance over accepted points.
#[derive(Clone, Debug, Default)]
pub struct DistanceAccumulator {
    total_meters: f64,
    last_point: Option<RoutePoint>,
}

impl DistanceAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the segment from the previous accepted point and returns its length.
    ///
    /// The first point only seeds the reference. Non-finite or negative
    /// segment lengths are treated as zero so the total never decreases.
    pub fn push(&mut self, point: RoutePoint) -> f64 {
        let delta = match self.last_point {
            Some(prev) if prev.lat == point.lat && prev.lng == point.lng => 0.0,
            Some(prev) => {
                let d = point_distance(&prev, &point);
                if d.is_finite() && d > 0.0 {
                    d
                } else {
                    0.0
                }
            }
            None => 0.0,
        };
        self.total_meters += delta;
        self.last_point = Some(point);
        delta
    }

    pub fn total_meters(&self) -> f64 {
        self.total_meters
    }

    pub fn last_point(&self) -> Option<&RoutePoint> {
        self.last_point.as_ref()
    }

    /// Keep the total but make the next point a fresh seed.
    pub fn break_segment(&mut self) {
        self.last_point = None;
    }

    pub fn reset(&mut self) {
        self.total_meters = 0.0;
        self.last_point = None;
    }
}
