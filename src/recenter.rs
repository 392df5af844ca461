use serde::{Deserialize, Serialize};

use crate::types::CurrentPosition;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecenterConfig {
    /// Accuracy needed for the very first centering
    pub first_fix_max_accuracy_m: f64,
    /// Accuracy needed for any later re-centering
    pub refine_max_accuracy_m: f64,
    /// Required improvement over the best accuracy centered on so far
    pub min_improvement_m: f64,
    pub min_interval_secs: f64,
}

impl Default for RecenterConfig {
    fn default() -> Self {
        Self {
            first_fix_max_accuracy_m: 50.0,
            refine_max_accuracy_m: 20.0,
            min_improvement_m: 15.0,
            min_interval_secs: 8.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RecenterState {
    pub has_centered_once: bool,
    pub best_accuracy_seen_meters: f64,
    pub last_center_timestamp: Option<f64>,
}

impl Default for RecenterState {
    fn default() -> Self {
        Self {
            has_centered_once: false,
            best_accuracy_seen_meters: f64::INFINITY,
            last_center_timestamp: None,
        }
    }
}

/// Advisory map re-centering request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RecenterRequest {
    pub lat: f64,
    pub lng: f64,
}

/// Decides from the accuracy stream when the map should snap to the user.
///
/// Noisy early fixes are ignored until one is good enough to center on;
/// afterwards only a clearly better fix, after a cooldown, moves the map again.
/// All thresholds are inclusive.
#[derive(Clone, Debug, Default)]
pub struct RecenterHeuristic {
    config: RecenterConfig,
    state: RecenterState,
}

impl RecenterHeuristic {
    pub fn new(config: RecenterConfig) -> Self {
        Self {
            config,
            state: RecenterState::default(),
        }
    }

    pub fn state(&self) -> &RecenterState {
        &self.state
    }

    pub fn observe(&mut self, position: &CurrentPosition) -> Option<RecenterRequest> {
        let accuracy = position.accuracy_meters;
        if !accuracy.is_finite() || accuracy < 0.0 {
            return None;
        }

        let fire = if !self.state.has_centered_once {
            accuracy <= self.config.first_fix_max_accuracy_m
        } else {
            let improvement = self.state.best_accuracy_seen_meters - accuracy;
            let since_last = self
                .state
                .last_center_timestamp
                .map_or(f64::INFINITY, |t| position.timestamp - t);
            accuracy <= self.config.refine_max_accuracy_m
                && improvement >= self.config.min_improvement_m
                && since_last >= self.config.min_interval_secs
        };

        if !fire {
            return None;
        }

        self.state.has_centered_once = true;
        self.state.best_accuracy_seen_meters = self.state.best_accuracy_seen_meters.min(accuracy);
        self.state.last_center_timestamp = Some(position.timestamp);
        Some(RecenterRequest {
            lat: position.lat,
            lng: position.lng,
        })
    }

    pub fn reset(&mut self) {
        self.state = RecenterState::default();
    }
}
