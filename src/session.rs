use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use crate::config::EngineConfig;
use crate::distance::{DistanceAccumulator, SampleThrottle};
use crate::error::{TrackerError, TrackerResult};
use crate::ghost::{GhostComparator, GhostComparison, GhostRoute};
use crate::metrics::{MetricsEngine, SessionMetrics};
use crate::recenter::RecenterHeuristic;
use crate::sampler::{
    GeoSampler, LocationSource, SamplerErrorKind, SamplerEvent, SamplerEventKind, SamplerMode,
};
use crate::types::{CurrentPosition, LatLng, LocationSample, RoutePoint, SessionSummary};

/// Session state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Watching location for the map, not recording
    Idle,
    /// Recording: clock ticking, route growing
    Running,
    /// Clock stopped, sampler closed, accumulated state kept
    Paused,
    /// Final; summary emitted
    Stopped,
}

/// Location health as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationStatus {
    /// No fix yet
    Waiting,
    Live,
    /// Last fix is kept but may be outdated
    Stale,
    /// Permission denied; needs an explicit retry
    Denied,
}

/// Everything the engine pushes to its collaborators.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Started(DateTime<Utc>),
    StateChanged(SessionState),
    MetricsTick(SessionMetrics),
    RouteAppended(RoutePoint),
    RecenterRequested { lat: f64, lng: f64 },
    GhostCompared(GhostComparison),
    LocationStatus(LocationStatus),
    Stopped(Box<SessionSummary>),
}

/// Receiver side of the engine's outbound interface. All methods default to no-ops.
pub trait SessionObserver: Send {
    fn on_session_started(&mut self, _started_at: DateTime<Utc>) {}
    fn on_state_changed(&mut self, _state: SessionState) {}
    fn on_metrics_tick(&mut self, _metrics: &SessionMetrics) {}
    fn on_route_appended(&mut self, _point: &RoutePoint) {}
    fn on_recenter_requested(&mut self, _lat: f64, _lng: f64) {}
    fn on_ghost_compared(&mut self, _comparison: &GhostComparison) {}
    fn on_location_status(&mut self, _status: LocationStatus) {}
    fn on_session_stopped(&mut self, _summary: &SessionSummary) {}
}

impl SessionObserver for () {}

/// Forwards every callback as a `SessionEvent`. A dropped receiver is ignored.
impl SessionObserver for UnboundedSender<SessionEvent> {
    fn on_session_started(&mut self, started_at: DateTime<Utc>) {
        let _ = self.send(SessionEvent::Started(started_at));
    }

    fn on_state_changed(&mut self, state: SessionState) {
        let _ = self.send(SessionEvent::StateChanged(state));
    }

    fn on_metrics_tick(&mut self, metrics: &SessionMetrics) {
        let _ = self.send(SessionEvent::MetricsTick(*metrics));
    }

    fn on_route_appended(&mut self, point: &RoutePoint) {
        let _ = self.send(SessionEvent::RouteAppended(*point));
    }

    fn on_recenter_requested(&mut self, lat: f64, lng: f64) {
        let _ = self.send(SessionEvent::RecenterRequested { lat, lng });
    }

    fn on_ghost_compared(&mut self, comparison: &GhostComparison) {
        let _ = self.send(SessionEvent::GhostCompared(*comparison));
    }

    fn on_location_status(&mut self, status: LocationStatus) {
        let _ = self.send(SessionEvent::LocationStatus(status));
    }

    fn on_session_stopped(&mut self, summary: &SessionSummary) {
        let _ = self.send(SessionEvent::Stopped(Box::new(summary.clone())));
    }
}

/// One exercise session. Owns the sampler, the route and the metrics; the
/// only component allowed to open or close location watches.
pub struct Session<S: LocationSource, O: SessionObserver> {
    id: String,
    config: EngineConfig,
    state: SessionState,
    sampler: GeoSampler<S>,
    observer: O,
    throttle: SampleThrottle,
    distance: DistanceAccumulator,
    metrics: MetricsEngine,
    recenter: RecenterHeuristic,
    ghost: Option<GhostComparator>,
    route: Vec<RoutePoint>,
    position: Option<CurrentPosition>,
    location_status: LocationStatus,
    started_at: Option<DateTime<Utc>>,
    ticks_since_sample: u64,
}

impl<S: LocationSource, O: SessionObserver> Session<S, O> {
    /// Create a session in `Idle`. Sampler events must be fed back through
    /// `handle_sampler_event` from the returned receiver. Fails on an invalid config.
    pub fn new(
        config: EngineConfig,
        source: S,
        observer: O,
    ) -> TrackerResult<(Self, UnboundedReceiver<SamplerEvent>)> {
        config.validate()?;
        let (sampler, events) = GeoSampler::new(
            source,
            config.idle_watch.clone(),
            config.active_watch.clone(),
        );
        let session = Session {
            id: format!("session_{}", Utc::now().timestamp_millis()),
            throttle: SampleThrottle::new(config.throttle_window_secs),
            metrics: MetricsEngine::new(config.body_weight_kg),
            recenter: RecenterHeuristic::new(config.recenter.clone()),
            config,
            state: SessionState::Idle,
            sampler,
            observer,
            distance: DistanceAccumulator::new(),
            ghost: None,
            route: Vec::new(),
            position: None,
            location_status: LocationStatus::Waiting,
            started_at: None,
            ticks_since_sample: 0,
        };
        Ok((session, events))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    pub fn metrics(&self) -> SessionMetrics {
        self.metrics.metrics()
    }

    pub fn route(&self) -> &[RoutePoint] {
        &self.route
    }

    pub fn position(&self) -> Option<&CurrentPosition> {
        self.position.as_ref()
    }

    pub fn location_status(&self) -> LocationStatus {
        self.location_status
    }

    pub fn sampler_mode(&self) -> Option<SamplerMode> {
        self.sampler.mode()
    }

    pub fn ghost_comparison(&self) -> Option<GhostComparison> {
        self.ghost.as_ref().and_then(|g| g.last())
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    pub fn sampler_source(&self) -> &S {
        self.sampler.source()
    }

    /// Open the low-commitment watch used before recording starts.
    pub fn watch_idle(&mut self) -> TrackerResult<()> {
        if self.state != SessionState::Idle {
            return Err(self.invalid("watch idle"));
        }
        if self.sampler.mode().is_none() {
            self.open_sampler(SamplerMode::Idle);
        }
        Ok(())
    }

    /// Attach the route to race against. Only allowed before the session starts.
    pub fn attach_ghost(&mut self, route: GhostRoute) -> TrackerResult<()> {
        if self.state != SessionState::Idle {
            return Err(self.invalid("attach ghost"));
        }
        log::info!(
            "[session] ghost attached ({} points)",
            route.points.len()
        );
        self.ghost = Some(GhostComparator::new(route));
        Ok(())
    }

    /// Idle → Running
    pub fn start(&mut self) -> TrackerResult<()> {
        if self.state != SessionState::Idle {
            return Err(self.invalid("start"));
        }

        self.sampler.stop();
        self.route.clear();
        self.distance.reset();
        self.throttle.reset();
        self.metrics.reset();
        self.ticks_since_sample = 0;

        let started_at = Utc::now();
        self.started_at = Some(started_at);
        self.set_state(SessionState::Running);
        self.open_sampler(SamplerMode::Active);

        log::info!("[session] {} started at {}", self.id, started_at.to_rfc3339());
        self.observer.on_session_started(started_at);
        Ok(())
    }

    /// Running → Paused
    pub fn pause(&mut self) -> TrackerResult<()> {
        if self.state != SessionState::Running {
            return Err(self.invalid("pause"));
        }
        self.sampler.stop();
        self.set_state(SessionState::Paused);
        log::info!(
            "[session] paused at {}s, {:.1} m",
            self.metrics().elapsed_seconds,
            self.metrics().distance_meters
        );
        Ok(())
    }

    /// Paused → Running, keeping everything accumulated so far.
    pub fn resume(&mut self) -> TrackerResult<()> {
        if self.state != SessionState::Paused {
            return Err(self.invalid("resume"));
        }
        // Ground covered while paused is not counted: the next accepted
        // point starts a fresh segment.
        self.distance.break_segment();
        self.throttle.reset();
        self.ticks_since_sample = 0;
        self.set_state(SessionState::Running);
        self.open_sampler(SamplerMode::Active);
        log::info!("[session] resumed");
        Ok(())
    }

    /// Running | Paused → Stopped. Returns the final summary.
    pub fn stop(&mut self) -> TrackerResult<SessionSummary> {
        if !matches!(self.state, SessionState::Running | SessionState::Paused) {
            return Err(self.invalid("stop"));
        }
        self.sampler.stop();
        self.set_state(SessionState::Stopped);

        let summary = self.summary();
        log::info!(
            "[session] {} stopped: {:.3} km in {}s",
            self.id,
            summary.distance_km,
            summary.duration_seconds
        );
        self.observer.on_session_stopped(&summary);
        Ok(summary)
    }

    /// Reopen the watch after a permission denial.
    pub fn retry_location(&mut self) -> TrackerResult<()> {
        let mode = match self.state {
            SessionState::Idle => SamplerMode::Idle,
            SessionState::Running => SamplerMode::Active,
            SessionState::Paused | SessionState::Stopped => {
                return Err(self.invalid("retry location"))
            }
        };
        if self.sampler.mode().is_some() {
            return Ok(());
        }
        self.set_location_status(LocationStatus::Waiting);
        self.open_sampler(mode);
        Ok(())
    }

    /// One second of session clock. No-op unless running.
    pub fn tick(&mut self) -> Option<SessionMetrics> {
        if self.state != SessionState::Running {
            return None;
        }

        let metrics = self.metrics.tick();
        self.ticks_since_sample += 1;
        if self.ticks_since_sample >= self.config.stale_after_secs
            && self.location_status == LocationStatus::Live
        {
            log::warn!(
                "[session] no location fix for {}s, marking stale",
                self.ticks_since_sample
            );
            self.set_location_status(LocationStatus::Stale);
        }

        if let Some(ghost) = self.ghost.as_mut() {
            if let Some(comparison) =
                ghost.compare(metrics.distance_meters, metrics.elapsed_seconds as f64)
            {
                self.observer.on_ghost_compared(&comparison);
            }
        }

        self.observer.on_metrics_tick(&metrics);
        Some(metrics)
    }

    /// Apply one callback from the sampler. Callbacks from closed watches are dropped.
    pub fn handle_sampler_event(&mut self, event: SamplerEvent) {
        if !self.sampler.is_live(event.handle) {
            log::debug!(
                "[session] discarding late {:?} event from closed watch #{}",
                event.mode,
                event.handle
            );
            return;
        }
        match event.kind {
            SamplerEventKind::Sample(sample) => self.on_sample(event.mode, sample),
            SamplerEventKind::Error(kind) => self.on_sampler_error(kind),
        }
    }

    fn on_sample(&mut self, mode: SamplerMode, sample: LocationSample) {
        if !sample.is_valid() {
            log::debug!("[session] dropping malformed sample {:?}", sample);
            return;
        }

        let position = CurrentPosition::from(&sample);
        self.position = Some(position);
        self.ticks_since_sample = 0;
        self.set_location_status(LocationStatus::Live);

        if let Some(request) = self.recenter.observe(&position) {
            self.observer.on_recenter_requested(request.lat, request.lng);
        }

        if self.state != SessionState::Running || mode != SamplerMode::Active {
            return;
        }

        let reported_speed = sample.valid_speed_mps();
        if let Some(speed) = reported_speed {
            self.metrics.set_speed_kmh(speed * 3.6);
        }

        if !self.throttle.admit(sample.timestamp) {
            return;
        }

        let point = sample.to_route_point();
        let previous = self.distance.last_point().copied();
        let delta = self.distance.push(point);
        self.route.push(point);
        self.metrics.set_distance(self.distance.total_meters());

        if reported_speed.is_none() {
            if let Some(prev) = previous {
                let dt = point.timestamp - prev.timestamp;
                if dt > 0.0 {
                    self.metrics.set_speed_kmh(delta / dt * 3.6);
                }
            }
        }

        self.observer.on_route_appended(&point);
    }

    fn on_sampler_error(&mut self, kind: SamplerErrorKind) {
        log::warn!("[session] location error: {:?}", kind);
        if kind.is_terminal() {
            self.sampler.stop();
            self.set_location_status(LocationStatus::Denied);
        } else if self.location_status != LocationStatus::Denied {
            self.set_location_status(LocationStatus::Stale);
        }
    }

    fn open_sampler(&mut self, mode: SamplerMode) {
        match self.sampler.start(mode) {
            Ok(_) => {}
            Err(TrackerError::LocationDenied) => {
                self.on_sampler_error(SamplerErrorKind::PermissionDenied)
            }
            Err(e) => {
                log::warn!("[session] could not open {:?} watch: {}", mode, e);
                self.on_sampler_error(SamplerErrorKind::Unavailable);
            }
        }
    }

    fn set_state(&mut self, state: SessionState) {
        self.state = state;
        self.observer.on_state_changed(state);
    }

    fn set_location_status(&mut self, status: LocationStatus) {
        if self.location_status != status {
            self.location_status = status;
            self.observer.on_location_status(status);
        }
    }

    fn invalid(&self, action: &'static str) -> TrackerError {
        TrackerError::InvalidTransition {
            action,
            state: self.state,
        }
    }

    fn summary(&self) -> SessionSummary {
        let metrics = self.metrics();
        let fallback = self.position.map(|p| LatLng {
            lat: p.lat,
            lng: p.lng,
        });
        let ended_at = Utc::now();
        SessionSummary {
            session_id: self.id.clone(),
            started_at: self.started_at.unwrap_or(ended_at),
            ended_at,
            distance_km: metrics.distance_km(),
            duration_seconds: metrics.elapsed_seconds,
            avg_speed_kmh: metrics.avg_speed_kmh().unwrap_or(0.0),
            max_speed_kmh: metrics.max_speed_kmh,
            calories_kcal: metrics.calories_kcal,
            start: self.route.first().map(|p| p.lat_lng()).or(fallback),
            end: self.route.last().map(|p| p.lat_lng()).or(fallback),
            route: self.route.clone(),
        }
    }
}
