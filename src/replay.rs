use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

use crate::error::{TrackerError, TrackerResult};
use crate::sampler::{HandleId, LocationSource, SampleSink, SamplerMode, WatchOptions};
use crate::types::LocationSample;

/// Plays a recorded track as if it were the platform location watch.
///
/// Active watches deliver samples paced by their timestamp gaps divided by
/// `speedup`, resuming where the previous watch left off. Idle watches only
/// report the next pending fix once. Clearing a watch aborts its task.
pub struct ReplaySource {
    samples: Arc<Vec<LocationSample>>,
    cursor: Arc<AtomicUsize>,
    speedup: f64,
    finished: Arc<Notify>,
    tasks: HashMap<HandleId, JoinHandle<()>>,
}

impl ReplaySource {
    pub fn new(samples: Vec<LocationSample>, speedup: f64) -> TrackerResult<Self> {
        if !(speedup.is_finite() && speedup > 0.0) {
            return Err(TrackerError::Config(format!(
                "replay speedup must be positive, got {}",
                speedup
            )));
        }
        Ok(Self {
            samples: Arc::new(samples),
            cursor: Arc::new(AtomicUsize::new(0)),
            speedup,
            finished: Arc::new(Notify::new()),
            tasks: HashMap::new(),
        })
    }

    /// Load a JSON array of samples.
    pub fn from_file(path: impl AsRef<Path>, speedup: f64) -> TrackerResult<Self> {
        let reader = BufReader::new(File::open(path)?);
        let samples: Vec<LocationSample> = serde_json::from_reader(reader)?;
        log::info!("[replay] loaded {} samples", samples.len());
        Self::new(samples, speedup)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples delivered by active watches so far.
    pub fn delivered(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    /// Signalled once the last sample has been delivered.
    pub fn finished(&self) -> Arc<Notify> {
        Arc::clone(&self.finished)
    }
}

impl LocationSource for ReplaySource {
    fn watch(&mut self, _options: &WatchOptions, sink: SampleSink) -> TrackerResult<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| TrackerError::Source(format!("replay needs a tokio runtime: {}", e)))?;

        let handle = sink.handle();
        match sink.mode() {
            SamplerMode::Idle => {
                if let Some(sample) = self.samples.get(self.delivered()) {
                    sink.deliver(sample.clone());
                }
            }
            SamplerMode::Active => {
                let task = runtime.spawn(play(
                    Arc::clone(&self.samples),
                    Arc::clone(&self.cursor),
                    self.speedup,
                    sink,
                    Arc::clone(&self.finished),
                ));
                self.tasks.insert(handle, task);
            }
        }
        Ok(())
    }

    fn clear_watch(&mut self, handle: HandleId) {
        if let Some(task) = self.tasks.remove(&handle) {
            task.abort();
        }
    }
}

impl Drop for ReplaySource {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}

async fn play(
    samples: Arc<Vec<LocationSample>>,
    cursor: Arc<AtomicUsize>,
    speedup: f64,
    sink: SampleSink,
    finished: Arc<Notify>,
) {
    let mut previous: Option<f64> = None;
    loop {
        let index = cursor.load(Ordering::Acquire);
        let Some(sample) = samples.get(index) else {
            log::info!("[replay] track finished after {} samples", index);
            finished.notify_one();
            break;
        };

        if let Some(prev) = previous {
            let gap = (sample.timestamp - prev) / speedup;
            if gap.is_finite() && gap > 0.0 {
                sleep(Duration::from_secs_f64(gap)).await;
            }
        }

        if !sink.deliver(sample.clone()) {
            log::debug!("[replay] watch #{} closed at sample {}", sink.handle(), index);
            break;
        }
        cursor.store(index + 1, Ordering::Release);
        previous = Some(sample.timestamp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::distance::EARTH_RADIUS_M;
    use crate::driver::SessionDriver;
    use crate::sampler::{GeoSampler, SamplerEventKind};
    use crate::session::Session;
    use approx::assert_relative_eq;
    use tokio::time::Instant;

    fn north(meters: f64, t: f64) -> LocationSample {
        let lat = 55.676 + (meters / EARTH_RADIUS_M).to_degrees();
        LocationSample::new(lat, 12.568, 5.0, t)
    }

    fn track(n: usize) -> Vec<LocationSample> {
        (0..n).map(|i| north(100.0 * i as f64, 3.0 * i as f64)).collect()
    }

    fn timestamp(kind: SamplerEventKind) -> f64 {
        match kind {
            SamplerEventKind::Sample(s) => s.timestamp,
            SamplerEventKind::Error(e) => panic!("unexpected error {:?}", e),
        }
    }

    #[test]
    fn test_rejects_bad_speedup() {
        assert!(ReplaySource::new(track(2), 0.0).is_err());
        assert!(ReplaySource::new(track(2), f64::NAN).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_active_watch_paced_by_timestamps() {
        let source = ReplaySource::new(track(3), 2.0).unwrap();
        let finished = source.finished();
        let (mut sampler, mut rx) =
            GeoSampler::new(source, WatchOptions::idle(), WatchOptions::active());

        let begin = Instant::now();
        sampler.start(SamplerMode::Active).unwrap();
        assert_eq!(timestamp(rx.recv().await.unwrap().kind), 0.0);
        assert_eq!(timestamp(rx.recv().await.unwrap().kind), 3.0);
        assert_eq!(begin.elapsed(), Duration::from_millis(1_500));
        assert_eq!(timestamp(rx.recv().await.unwrap().kind), 6.0);

        finished.notified().await;
        assert_eq!(sampler.source().delivered(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleared_watch_stops_and_resumes_from_cursor() {
        let source = ReplaySource::new(track(4), 1.0).unwrap();
        let (mut sampler, mut rx) =
            GeoSampler::new(source, WatchOptions::idle(), WatchOptions::active());

        sampler.start(SamplerMode::Active).unwrap();
        rx.recv().await.unwrap();
        sampler.stop();

        sleep(Duration::from_secs(30)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(sampler.source().delivered(), 1);

        sampler.start(SamplerMode::Active).unwrap();
        assert_eq!(timestamp(rx.recv().await.unwrap().kind), 3.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_watch_reports_next_fix_only() {
        let source = ReplaySource::new(track(3), 1.0).unwrap();
        let (mut sampler, mut rx) =
            GeoSampler::new(source, WatchOptions::idle(), WatchOptions::active());

        sampler.start(SamplerMode::Idle).unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.mode, SamplerMode::Idle);
        assert_eq!(timestamp(event.kind), 0.0);

        sleep(Duration::from_secs(30)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(sampler.source().delivered(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replayed_session_end_to_end() {
        let source = ReplaySource::new(track(5), 1.0).unwrap();
        let finished = source.finished();
        let (session, sampler_events) =
            Session::new(EngineConfig::default(), source, ()).unwrap();
        let (driver, handle) = SessionDriver::new(session, sampler_events);
        let join = tokio::spawn(driver.run());

        handle.start().await.unwrap();
        finished.notified().await;
        sleep(Duration::from_millis(3_500)).await;
        handle.stop().await.unwrap();

        let summary = join.await.unwrap().unwrap().unwrap();
        assert_eq!(summary.route.len(), 5);
        assert_eq!(summary.duration_seconds, 15);
        assert_relative_eq!(summary.distance_km, 0.4, max_relative = 1e-6);
        assert_eq!(
            summary.avg_speed_kmh,
            summary.distance_km / summary.duration_seconds as f64 * 3600.0
        );
    }
}
