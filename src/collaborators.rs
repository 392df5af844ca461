use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{TrackerError, TrackerResult};
use crate::export::create_gpx_track;
use crate::types::SessionSummary;

/// Persistence for finished sessions.
pub trait SessionStore: Send + Sync {
    fn save(&self, summary: &SessionSummary) -> TrackerResult<()>;
}

/// Awards earned for a finished session.
pub trait RewardService: Send + Sync {
    fn award(&self, distance_km: f64) -> TrackerResult<RewardOutcome>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RewardOutcome {
    pub coins_earned: u64,
    pub notifications: Vec<String>,
}

/// Writes `<id>.json` and `<id>.gpx` per session into one directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn summary_path(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", session_id))
    }

    pub fn gpx_path(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{}.gpx", session_id))
    }
}

impl SessionStore for JsonFileStore {
    fn save(&self, summary: &SessionSummary) -> TrackerResult<()> {
        let write = || -> TrackerResult<()> {
            fs::create_dir_all(&self.dir)?;
            fs::write(self.summary_path(&summary.session_id), summary.to_json()?)?;
            let track = create_gpx_track(summary);
            fs::write(self.gpx_path(&summary.session_id), track.to_gpx_xml())?;
            Ok(())
        };
        write().map_err(|e| TrackerError::Store(format!("{}: {}", self.dir.display(), e)))?;
        log::info!(
            "[store] saved {} ({} route points) to {}",
            summary.session_id,
            summary.route.len(),
            self.dir.display()
        );
        Ok(())
    }
}

/// One coin per whole kilometre.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoinRewards;

impl RewardService for CoinRewards {
    fn award(&self, distance_km: f64) -> TrackerResult<RewardOutcome> {
        if !distance_km.is_finite() || distance_km < 0.0 {
            return Err(TrackerError::Reward(format!(
                "invalid distance {}",
                distance_km
            )));
        }
        let coins_earned = distance_km.floor() as u64;
        let mut notifications = Vec::new();
        if coins_earned > 0 {
            notifications.push(format!("You earned {} coins", coins_earned));
        }
        Ok(RewardOutcome {
            coins_earned,
            notifications,
        })
    }
}

/// What happened after the session stopped. Failures never undo the stop.
#[derive(Debug, Default)]
pub struct PostStopReport {
    pub saved: bool,
    pub reward: Option<RewardOutcome>,
    pub errors: Vec<TrackerError>,
}

impl PostStopReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Persist the summary, then award for its distance. Each step runs even if the other failed.
pub fn finalize(
    summary: &SessionSummary,
    store: &dyn SessionStore,
    rewards: &dyn RewardService,
) -> PostStopReport {
    let mut report = PostStopReport::default();

    match store.save(summary) {
        Ok(()) => report.saved = true,
        Err(e) => {
            log::warn!("[finalize] could not save {}: {}", summary.session_id, e);
            report.errors.push(e);
        }
    }

    match rewards.award(summary.distance_km) {
        Ok(outcome) => {
            log::info!("[finalize] {} coins earned", outcome.coins_earned);
            report.reward = Some(outcome);
        }
        Err(e) => {
            log::warn!("[finalize] reward failed: {}", e);
            report.errors.push(e);
        }
    }

    report
}
