use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::types::SessionSummary;

/// GPX track format for mapping applications
#[derive(Debug, Serialize)]
pub struct GpxTrack {
    pub name: String,
    pub description: String,
    pub track_points: Vec<GpxPoint>,
}

#[derive(Debug, Serialize)]
pub struct GpxPoint {
    pub lat: f64,
    pub lon: f64,
    /// RFC 3339, omitted when the sample time is not representable
    pub time: Option<String>,
}

impl GpxTrack {
    /// Generate GPX 1.1 document XML string
    pub fn to_gpx_xml(&self) -> String {
        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str(
            "<gpx version=\"1.1\" creator=\"ActivityTracker\" xmlns=\"http://www.topografix.com/GPX/1/1\">\n",
        );
        xml.push_str("  <metadata>\n");
        xml.push_str(&format!("    <name>{}</name>\n", escape(&self.name)));
        xml.push_str(&format!("    <desc>{}</desc>\n", escape(&self.description)));
        xml.push_str("  </metadata>\n");
        xml.push_str("  <trk>\n");
        xml.push_str(&format!("    <name>{}</name>\n", escape(&self.name)));
        xml.push_str("    <trkseg>\n");

        for point in &self.track_points {
            xml.push_str(&format!("      <trkpt lat=\"{}\" lon=\"{}\">\n", point.lat, point.lon));
            if let Some(time) = &point.time {
                xml.push_str(&format!("        <time>{}</time>\n", time));
            }
            xml.push_str("      </trkpt>\n");
        }

        xml.push_str("    </trkseg>\n");
        xml.push_str("  </trk>\n");
        xml.push_str("</gpx>\n");

        xml
    }
}

/// Create GPX track from a finished session's route
pub fn create_gpx_track(summary: &SessionSummary) -> GpxTrack {
    let track_points = summary
        .route
        .iter()
        .map(|point| GpxPoint {
            lat: point.lat,
            lon: point.lng,
            time: epoch_to_rfc3339(point.timestamp),
        })
        .collect();

    GpxTrack {
        name: format!("Activity {}", summary.session_id),
        description: format!(
            "{:.2} km in {} s, recorded from {}",
            summary.distance_km,
            summary.duration_seconds,
            summary.started_at.to_rfc3339_opts(SecondsFormat::Secs, true)
        ),
        track_points,
    }
}

fn epoch_to_rfc3339(timestamp: f64) -> Option<String> {
    if !timestamp.is_finite() {
        return None;
    }
    let secs = timestamp.floor();
    let nanos = ((timestamp - secs) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::<Utc>::from_timestamp(secs as i64, nanos)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
