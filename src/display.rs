use crate::ghost::GhostComparison;

/// Shown wherever a value is undefined (no distance yet, no tick yet, ...).
pub const PLACEHOLDER: &str = "--";

/// `MM:SS`, or `H:MM:SS` from one hour on.
pub fn format_duration(seconds: u64) -> String {
    let (h, m, s) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{:02}:{:02}", m, s)
    }
}

/// `M:SS /km` from minutes per kilometre.
pub fn format_pace(min_per_km: Option<f64>) -> String {
    match min_per_km {
        Some(pace) if pace.is_finite() && pace >= 0.0 => {
            let total = (pace * 60.0).round() as u64;
            format!("{}:{:02} /km", total / 60, total % 60)
        }
        _ => PLACEHOLDER.to_string(),
    }
}

pub fn format_speed(kmh: Option<f64>) -> String {
    match kmh {
        Some(v) if v.is_finite() && v >= 0.0 => format!("{:.1} km/h", v),
        _ => PLACEHOLDER.to_string(),
    }
}

pub fn format_distance(meters: f64) -> String {
    if !meters.is_finite() || meters < 0.0 {
        return PLACEHOLDER.to_string();
    }
    format!("{:.2} km", meters / 1000.0)
}

/// Signed ghost delta; negative means the runner leads.
pub fn format_ghost_delta(comparison: Option<GhostComparison>) -> String {
    match comparison {
        Some(c) if c.delta_seconds.is_finite() => {
            let secs = c.delta_seconds.round() as i64;
            let sign = if secs < 0 { "-" } else { "+" };
            let text = format!("{}{}", sign, format_duration(secs.unsigned_abs()));
            if c.ghost_finished {
                format!("{} (ghost finished)", text)
            } else {
                text
            }
        }
        _ => PLACEHOLDER.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration() {
        assert_eq!(format_duration(0), "00:00");
        assert_eq!(format_duration(75), "01:15");
        assert_eq!(format_duration(3_725), "1:02:05");
    }

    #[test]
    fn test_pace_and_speed_placeholders() {
        assert_eq!(format_pace(None), PLACEHOLDER);
        assert_eq!(format_pace(Some(f64::INFINITY)), PLACEHOLDER);
        assert_eq!(format_pace(Some(5.5)), "5:30 /km");
        assert_eq!(format_speed(None), PLACEHOLDER);
        assert_eq!(format_speed(Some(f64::NAN)), PLACEHOLDER);
        assert_eq!(format_speed(Some(12.34)), "12.3 km/h");
    }

    #[test]
    fn test_distance() {
        assert_eq!(format_distance(0.0), "0.00 km");
        assert_eq!(format_distance(1_234.0), "1.23 km");
        assert_eq!(format_distance(f64::NAN), PLACEHOLDER);
    }

    #[test]
    fn test_ghost_delta() {
        assert_eq!(format_ghost_delta(None), PLACEHOLDER);
        let leading = GhostComparison {
            delta_seconds: -65.0,
            ghost_finished: false,
        };
        assert_eq!(format_ghost_delta(Some(leading)), "-01:05");
        let trailing = GhostComparison {
            delta_seconds: 5.0,
            ghost_finished: true,
        };
        assert_eq!(format_ghost_delta(Some(trailing)), "+00:05 (ghost finished)");
    }
}
