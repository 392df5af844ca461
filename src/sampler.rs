use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::error::{TrackerError, TrackerResult};
use crate::types::LocationSample;

/// The two mutually exclusive watch lifetimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SamplerMode {
    /// Before a session starts: cheap fixes for the map only
    Idle,
    /// Recording: highest accuracy, no cached fixes
    Active,
}

/// Options passed to the platform watch for one mode.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchOptions {
    pub high_accuracy: bool,
    /// Oldest cached fix the platform may hand back
    pub maximum_age_ms: u64,
    pub timeout_ms: u64,
}

impl WatchOptions {
    pub fn idle() -> Self {
        Self {
            high_accuracy: false,
            maximum_age_ms: 60_000,
            timeout_ms: 30_000,
        }
    }

    pub fn active() -> Self {
        Self {
            high_accuracy: true,
            maximum_age_ms: 0,
            timeout_ms: 10_000,
        }
    }
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self::active()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SamplerErrorKind {
    /// Terminal for this attempt; needs an explicit user retry
    PermissionDenied,
    Timeout,
    /// Retried by the platform layer
    Unavailable,
}

impl SamplerErrorKind {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SamplerErrorKind::PermissionDenied)
    }
}

pub type HandleId = u64;

#[derive(Debug, Clone, PartialEq)]
pub enum SamplerEventKind {
    Sample(LocationSample),
    Error(SamplerErrorKind),
}

/// A callback from the platform, tagged with the watch it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerEvent {
    pub handle: HandleId,
    pub mode: SamplerMode,
    pub kind: SamplerEventKind,
}

/// Delivery end handed to a `LocationSource` for a single watch.
///
/// Once the watch is stopped the liveness flag drops and every further
/// delivery is a no-op, whatever the platform keeps doing.
#[derive(Debug, Clone)]
pub struct SampleSink {
    handle: HandleId,
    mode: SamplerMode,
    alive: Arc<AtomicBool>,
    tx: UnboundedSender<SamplerEvent>,
}

impl SampleSink {
    pub fn handle(&self) -> HandleId {
        self.handle
    }

    pub fn mode(&self) -> SamplerMode {
        self.mode
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire) && !self.tx.is_closed()
    }

    /// Returns false when the sample was dropped because the watch is gone.
    pub fn deliver(&self, sample: LocationSample) -> bool {
        self.send(SamplerEventKind::Sample(sample))
    }

    pub fn fail(&self, kind: SamplerErrorKind) -> bool {
        self.send(SamplerEventKind::Error(kind))
    }

    fn send(&self, kind: SamplerEventKind) -> bool {
        if !self.alive.load(Ordering::Acquire) {
            return false;
        }
        self.tx
            .send(SamplerEvent {
                handle: self.handle,
                mode: self.mode,
                kind,
            })
            .is_ok()
    }
}

/// Platform location-watch primitive.
pub trait LocationSource: Send {
    /// Begin watching; results arrive later through `sink`.
    fn watch(&mut self, options: &WatchOptions, sink: SampleSink) -> TrackerResult<()>;

    /// Release the watch. Must tolerate unknown or already cleared handles.
    fn clear_watch(&mut self, handle: HandleId);
}

#[derive(Debug)]
struct OpenWatch {
    handle: HandleId,
    mode: SamplerMode,
    alive: Arc<AtomicBool>,
}

/// Owns the single open watch and guarantees modes never overlap.
pub struct GeoSampler<S: LocationSource> {
    source: S,
    idle_options: WatchOptions,
    active_options: WatchOptions,
    tx: UnboundedSender<SamplerEvent>,
    open: Option<OpenWatch>,
    next_handle: HandleId,
}

impl<S: LocationSource> GeoSampler<S> {
    pub fn new(
        source: S,
        idle_options: WatchOptions,
        active_options: WatchOptions,
    ) -> (Self, UnboundedReceiver<SamplerEvent>) {
        let (tx, rx) = unbounded_channel();
        let sampler = GeoSampler {
            source,
            idle_options,
            active_options,
            tx,
            open: None,
            next_handle: 1,
        };
        (sampler, rx)
    }

    /// Open a watch in `mode`. Fails if any watch is already open.
    pub fn start(&mut self, mode: SamplerMode) -> TrackerResult<HandleId> {
        if let Some(open) = &self.open {
            return Err(TrackerError::SamplerBusy(open.mode));
        }

        let handle = self.next_handle;
        self.next_handle += 1;
        let alive = Arc::new(AtomicBool::new(true));
        let sink = SampleSink {
            handle,
            mode,
            alive: Arc::clone(&alive),
            tx: self.tx.clone(),
        };
        let options = match mode {
            SamplerMode::Idle => &self.idle_options,
            SamplerMode::Active => &self.active_options,
        };

        if let Err(e) = self.source.watch(options, sink) {
            alive.store(false, Ordering::Release);
            log::warn!("[sampler] {:?} watch failed to open: {}", mode, e);
            return Err(e);
        }

        log::debug!("[sampler] opened {:?} watch #{}", mode, handle);
        self.open = Some(OpenWatch {
            handle,
            mode,
            alive,
        });
        Ok(handle)
    }

    /// Close the open watch, if any. Idempotent.
    pub fn stop(&mut self) -> Option<SamplerMode> {
        let open = self.open.take()?;
        open.alive.store(false, Ordering::Release);
        self.source.clear_watch(open.handle);
        log::debug!("[sampler] closed {:?} watch #{}", open.mode, open.handle);
        Some(open.mode)
    }

    /// True only for the currently open watch.
    pub fn is_live(&self, handle: HandleId) -> bool {
        self.open.as_ref().is_some_and(|open| open.handle == handle)
    }

    pub fn mode(&self) -> Option<SamplerMode> {
        self.open.as_ref().map(|open| open.mode)
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

impl<S: LocationSource> Drop for GeoSampler<S> {
    fn drop(&mut self) {
        self.stop();
    }
}
