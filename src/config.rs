use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{TrackerError, TrackerResult};
use crate::gesture::GestureConfig;
use crate::recenter::RecenterConfig;
use crate::sampler::WatchOptions;

/// Default body weight for the calorie estimate when the user has not set one.
pub const DEFAULT_BODY_WEIGHT_KG: f64 = 70.0;

/// Engine tuning. Every field has a default so partial JSON files are fine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub body_weight_kg: f64,
    /// At most one route point per window (seconds of sample time)
    pub throttle_window_secs: f64,
    /// Ticks without a sample before the location is reported stale
    pub stale_after_secs: u64,
    pub recenter: RecenterConfig,
    pub gesture: GestureConfig,
    pub idle_watch: WatchOptions,
    pub active_watch: WatchOptions,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            body_weight_kg: DEFAULT_BODY_WEIGHT_KG,
            throttle_window_secs: 3.0,
            stale_after_secs: 10,
            recenter: RecenterConfig::default(),
            gesture: GestureConfig::default(),
            idle_watch: WatchOptions::idle(),
            active_watch: WatchOptions::active(),
        }
    }
}

impl EngineConfig {
    pub fn from_file(path: impl AsRef<Path>) -> TrackerResult<Self> {
        let raw = fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_body_weight(mut self, kg: f64) -> Self {
        self.body_weight_kg = kg;
        self
    }

    pub fn validate(&self) -> TrackerResult<()> {
        if !(self.body_weight_kg.is_finite() && self.body_weight_kg > 0.0) {
            return Err(TrackerError::Config(format!(
                "body_weight_kg must be positive, got {}",
                self.body_weight_kg
            )));
        }
        if !(self.throttle_window_secs.is_finite() && self.throttle_window_secs > 0.0) {
            return Err(TrackerError::Config(format!(
                "throttle_window_secs must be positive, got {}",
                self.throttle_window_secs
            )));
        }
        self.gesture.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.throttle_window_secs, 3.0);
        assert_eq!(config.body_weight_kg, DEFAULT_BODY_WEIGHT_KG);
        assert!(config.active_watch.high_accuracy);
        assert!(!config.idle_watch.high_accuracy);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"{{ "body_weight_kg": 82.5, "recenter": {{ "min_interval_secs": 5.0 }} }}"#
        )
        .unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.body_weight_kg, 82.5);
        assert_eq!(config.recenter.min_interval_secs, 5.0);
        assert_eq!(config.recenter.first_fix_max_accuracy_m, 50.0);
        assert_eq!(config.throttle_window_secs, 3.0);
    }

    #[test]
    fn test_rejects_bad_weight() {
        let config = EngineConfig::default().with_body_weight(0.0);
        assert!(matches!(config.validate(), Err(TrackerError::Config(_))));
    }
}
