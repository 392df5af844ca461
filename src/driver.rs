use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tokio::time::{interval, interval_at, Instant, Interval};

use crate::error::{TrackerError, TrackerResult};
use crate::gesture::{GestureTick, ReleaseOutcome, StopConfirmGesture, HOLD_TO_STOP_HINT};
use crate::ghost::GhostRoute;
use crate::live_status::LiveStatus;
use crate::sampler::{LocationSource, SamplerEvent};
use crate::session::{Session, SessionObserver, SessionState};
use crate::types::SessionSummary;

/// One session clock tick; `MetricsEngine::tick` counts exactly one second.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// User-driven transitions sent to a running driver.
#[derive(Debug)]
pub enum Command {
    Start,
    Pause,
    Resume,
    Stop,
    RetryLocation,
    AttachGhost(GhostRoute),
}

struct Request {
    command: Command,
    reply: oneshot::Sender<TrackerResult<()>>,
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request").field("command", &self.command).finish()
    }
}

/// Cloneable front end for a `SessionDriver`.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    tx: mpsc::Sender<Request>,
}

impl SessionHandle {
    /// Send a command and wait until the driver has applied it.
    pub async fn send(&self, command: Command) -> TrackerResult<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request { command, reply })
            .await
            .map_err(|_| TrackerError::DriverClosed)?;
        rx.await.map_err(|_| TrackerError::DriverClosed)?
    }

    pub async fn start(&self) -> TrackerResult<()> {
        self.send(Command::Start).await
    }

    pub async fn pause(&self) -> TrackerResult<()> {
        self.send(Command::Pause).await
    }

    pub async fn resume(&self) -> TrackerResult<()> {
        self.send(Command::Resume).await
    }

    pub async fn stop(&self) -> TrackerResult<()> {
        self.send(Command::Stop).await
    }

    pub async fn retry_location(&self) -> TrackerResult<()> {
        self.send(Command::RetryLocation).await
    }

    pub async fn attach_ghost(&self, route: GhostRoute) -> TrackerResult<()> {
        self.send(Command::AttachGhost(route)).await
    }
}

/// Single cooperative event loop for one session: user commands, sampler
/// callbacks and the session clock, applied one at a time.
///
/// The tick timer exists only while the session is running. Dropping the
/// driver (or the future returned by `run`) drops the session, which closes
/// any open location watch.
pub struct SessionDriver<S: LocationSource, O: SessionObserver> {
    session: Session<S, O>,
    sampler_events: UnboundedReceiver<SamplerEvent>,
    commands: mpsc::Receiver<Request>,
    status_file: Option<PathBuf>,
}

impl<S: LocationSource, O: SessionObserver> SessionDriver<S, O> {
    pub fn new(
        session: Session<S, O>,
        sampler_events: UnboundedReceiver<SamplerEvent>,
    ) -> (Self, SessionHandle) {
        let (tx, commands) = mpsc::channel(16);
        let driver = SessionDriver {
            session,
            sampler_events,
            commands,
            status_file: None,
        };
        (driver, SessionHandle { tx })
    }

    /// Rewrite a `LiveStatus` snapshot to `path` after every tick and transition.
    pub fn with_status_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.status_file = Some(path.into());
        self
    }

    pub fn session(&self) -> &Session<S, O> {
        &self.session
    }

    /// Run until the session stops (returning its summary) or every handle is dropped.
    pub async fn run(mut self) -> TrackerResult<Option<SessionSummary>> {
        if self.session.state() == SessionState::Idle {
            self.session.watch_idle()?;
        }
        let mut ticker: Option<Interval> = None;

        loop {
            tokio::select! {
                request = self.commands.recv() => {
                    let Some(Request { command, reply }) = request else {
                        log::info!("[driver] all handles dropped, shutting down");
                        return Ok(None);
                    };
                    log::debug!("[driver] command {:?}", command);
                    match self.apply(command, &mut ticker) {
                        Ok(Some(summary)) => {
                            self.write_status();
                            let _ = reply.send(Ok(()));
                            return Ok(Some(summary));
                        }
                        Ok(None) => {
                            self.write_status();
                            let _ = reply.send(Ok(()));
                        }
                        Err(e) => {
                            log::warn!("[driver] command rejected: {}", e);
                            let _ = reply.send(Err(e));
                        }
                    }
                }
                Some(event) = self.sampler_events.recv() => {
                    self.session.handle_sampler_event(event);
                }
                _ = next_tick(&mut ticker) => {
                    self.session.tick();
                    self.write_status();
                }
            }
        }
    }

    fn apply(
        &mut self,
        command: Command,
        ticker: &mut Option<Interval>,
    ) -> TrackerResult<Option<SessionSummary>> {
        match command {
            Command::Start => {
                self.session.start()?;
                *ticker = Some(self.new_ticker());
            }
            Command::Pause => {
                self.session.pause()?;
                *ticker = None;
            }
            Command::Resume => {
                self.session.resume()?;
                *ticker = Some(self.new_ticker());
            }
            Command::Stop => {
                let summary = self.session.stop()?;
                *ticker = None;
                return Ok(Some(summary));
            }
            Command::RetryLocation => self.session.retry_location()?,
            Command::AttachGhost(route) => self.session.attach_ghost(route)?,
        }
        Ok(None)
    }

    fn write_status(&self) {
        if let Some(path) = &self.status_file {
            if let Err(e) = LiveStatus::from_session(&self.session).save(path) {
                log::warn!("[driver] could not write {}: {}", path.display(), e);
            }
        }
    }

    fn new_ticker(&self) -> Interval {
        // First tick one full period after (re)starting
        interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD)
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Visual feedback while the stop button is held. Purely cosmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureFeedback {
    Progress(u8),
    Pulse,
    Hint(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressOutcome {
    Stopped,
    ShortTap,
    Cancelled,
    /// The hold completed but the session refused to stop
    StopRejected,
}

/// Run one press of the hold-to-stop button against a driver.
///
/// Returns once the stop has fired or `release` resolves. The logical tick
/// alone drives progress; the pulse timer only emits feedback. A logical tick
/// due at the same instant as the release is handled first.
pub async fn hold_to_stop(
    gesture: &mut StopConfirmGesture,
    handle: &SessionHandle,
    release: oneshot::Receiver<()>,
    feedback: Option<&UnboundedSender<GestureFeedback>>,
) -> PressOutcome {
    let notify = |fb: GestureFeedback| {
        if let Some(tx) = feedback {
            let _ = tx.send(fb);
        }
    };

    let tick_period = Duration::from_millis(gesture.config().tick_ms.max(1));
    let mut logical = interval_at(Instant::now() + tick_period, tick_period);
    let mut pulse = interval(Duration::from_millis(gesture.config().pulse_ms.max(1)));
    let mut release = release;
    gesture.press();

    loop {
        tokio::select! {
            biased;
            _ = logical.tick() => match gesture.tick() {
                GestureTick::Confirmed => {
                    notify(GestureFeedback::Progress(100));
                    return match handle.stop().await {
                        Ok(()) => PressOutcome::Stopped,
                        Err(e) => {
                            log::warn!("[gesture] confirmed stop rejected: {}", e);
                            PressOutcome::StopRejected
                        }
                    };
                }
                GestureTick::Progress(p) => notify(GestureFeedback::Progress(p)),
                GestureTick::Locked | GestureTick::NotPressed => {}
            },
            _ = &mut release => {
                return match gesture.release() {
                    ReleaseOutcome::ShortTap => {
                        notify(GestureFeedback::Progress(0));
                        notify(GestureFeedback::Hint(HOLD_TO_STOP_HINT));
                        PressOutcome::ShortTap
                    }
                    ReleaseOutcome::Completed => PressOutcome::Stopped,
                    ReleaseOutcome::Cancelled | ReleaseOutcome::NotPressed => {
                        notify(GestureFeedback::Progress(0));
                        PressOutcome::Cancelled
                    }
                };
            }
            _ = pulse.tick() => notify(GestureFeedback::Pulse),
        }
    }
}
