use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{TrackerError, TrackerResult};

/// Hint surfaced when a press is released too early.
pub const HOLD_TO_STOP_HINT: &str = "Hold to stop";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Logical timer period
    pub tick_ms: u64,
    /// Progress added per logical tick
    pub step_percent: u8,
    /// Cosmetic feedback pulse period; never consulted by the logic
    pub pulse_ms: u64,
    /// Presses shorter than this that did not complete count as taps
    pub tap_threshold_ms: u64,
}

impl GestureConfig {
    pub fn validate(&self) -> TrackerResult<()> {
        if self.tick_ms == 0 || self.step_percent == 0 {
            return Err(TrackerError::Config(
                "gesture tick_ms and step_percent must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            tick_ms: 50,
            step_percent: 5,
            pulse_ms: 400,
            tap_threshold_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureTick {
    NotPressed,
    Progress(u8),
    /// Reached 100% on this tick; act now
    Confirmed,
    /// Already fired for this press
    Locked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    NotPressed,
    /// Early release: show `HOLD_TO_STOP_HINT`
    ShortTap,
    /// Long but incomplete press, progress reset silently
    Cancelled,
    /// Released after the stop already fired
    Completed,
}

/// Turns a sustained press into exactly one confirmed stop.
#[derive(Debug, Clone)]
pub struct StopConfirmGesture {
    config: GestureConfig,
    pressing: bool,
    progress: u8,
    held_ticks: u32,
    fired: bool,
}

impl StopConfirmGesture {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            pressing: false,
            progress: 0,
            held_ticks: 0,
            fired: false,
        }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn is_pressing(&self) -> bool {
        self.pressing
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    /// How long the current press has been held, by logical ticks.
    pub fn held(&self) -> Duration {
        Duration::from_millis(self.held_ticks as u64 * self.config.tick_ms)
    }

    pub fn press(&mut self) {
        self.pressing = true;
        self.progress = 0;
        self.held_ticks = 0;
        self.fired = false;
    }

    /// Advance one logical tick of the current press.
    pub fn tick(&mut self) -> GestureTick {
        if !self.pressing {
            return GestureTick::NotPressed;
        }
        if self.fired {
            return GestureTick::Locked;
        }

        self.held_ticks += 1;
        self.progress = self.progress.saturating_add(self.config.step_percent).min(100);
        if self.progress >= 100 {
            self.fired = true;
            return GestureTick::Confirmed;
        }
        GestureTick::Progress(self.progress)
    }

    pub fn release(&mut self) -> ReleaseOutcome {
        if !self.pressing {
            return ReleaseOutcome::NotPressed;
        }
        self.pressing = false;
        if self.fired {
            return ReleaseOutcome::Completed;
        }

        let tap = self.held() < Duration::from_millis(self.config.tap_threshold_ms);
        self.progress = 0;
        self.held_ticks = 0;
        if tap {
            ReleaseOutcome::ShortTap
        } else {
            ReleaseOutcome::Cancelled
        }
    }
}

impl Default for StopConfirmGesture {
    fn default() -> Self {
        Self::new(GestureConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hold(gesture: &mut StopConfirmGesture, ticks: u32) -> Vec<GestureTick> {
        (0..ticks).map(|_| gesture.tick()).collect()
    }

    #[test]
    fn test_release_at_900ms_never_fires() {
        let mut gesture = StopConfirmGesture::default();
        gesture.press();
        let ticks = hold(&mut gesture, 18);
        assert!(!ticks.contains(&GestureTick::Confirmed));
        assert_eq!(gesture.progress(), 90);
        assert_eq!(gesture.held(), Duration::from_millis(900));

        assert_eq!(gesture.release(), ReleaseOutcome::ShortTap);
        assert_eq!(gesture.progress(), 0);
        assert!(!gesture.has_fired());
    }

    #[test]
    fn test_full_hold_fires_exactly_once() {
        let mut gesture = StopConfirmGesture::default();
        gesture.press();
        let ticks = hold(&mut gesture, 40);
        let confirmed = ticks.iter().filter(|t| **t == GestureTick::Confirmed).count();
        assert_eq!(confirmed, 1);
        assert_eq!(ticks[19], GestureTick::Confirmed);
        assert!(ticks[20..].iter().all(|t| *t == GestureTick::Locked));
        assert_eq!(gesture.progress(), 100);
        assert_eq!(gesture.held(), Duration::from_secs(1));

        assert_eq!(gesture.release(), ReleaseOutcome::Completed);
    }

    #[test]
    fn test_ticks_without_press_do_nothing() {
        let mut gesture = StopConfirmGesture::default();
        assert_eq!(gesture.tick(), GestureTick::NotPressed);
        assert_eq!(gesture.release(), ReleaseOutcome::NotPressed);
        assert_eq!(gesture.progress(), 0);
    }

    #[test]
    fn test_tap_then_full_hold() {
        let mut gesture = StopConfirmGesture::default();
        gesture.press();
        hold(&mut gesture, 3);
        assert_eq!(gesture.release(), ReleaseOutcome::ShortTap);

        gesture.press();
        let ticks = hold(&mut gesture, 20);
        assert_eq!(ticks.last(), Some(&GestureTick::Confirmed));
    }

    #[test]
    fn test_zero_tick_or_step_is_rejected() {
        assert!(GestureConfig::default().validate().is_ok());
        let frozen = GestureConfig {
            tick_ms: 0,
            ..GestureConfig::default()
        };
        assert!(matches!(frozen.validate(), Err(TrackerError::Config(_))));
        let stuck = GestureConfig {
            step_percent: 0,
            ..GestureConfig::default()
        };
        assert!(stuck.validate().is_err());
    }

    #[test]
    fn test_slow_config_long_incomplete_press_is_cancelled() {
        let mut gesture = StopConfirmGesture::new(GestureConfig {
            step_percent: 2,
            ..GestureConfig::default()
        });
        gesture.press();
        hold(&mut gesture, 30);
        assert_eq!(gesture.progress(), 60);
        assert_eq!(gesture.release(), ReleaseOutcome::Cancelled);
        assert_eq!(gesture.progress(), 0);
    }
}
