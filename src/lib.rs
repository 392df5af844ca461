// Activity Engine
// Real-time run/walk tracking: location sampling, route distance, live
// metrics, ghost racing and the session lifecycle.

pub mod collaborators;
pub mod config;
pub mod display;
pub mod distance;
pub mod driver;
pub mod error;
pub mod export;
pub mod gesture;
pub mod ghost;
pub mod live_status;
pub mod metrics;
pub mod recenter;
pub mod replay;
pub mod sampler;
pub mod session;
pub mod types;

pub use collaborators::{
    finalize, CoinRewards, JsonFileStore, PostStopReport, RewardService, SessionStore,
};
pub use config::EngineConfig;
pub use driver::{hold_to_stop, Command, PressOutcome, SessionDriver, SessionHandle};
pub use error::{TrackerError, TrackerResult};
pub use gesture::StopConfirmGesture;
pub use ghost::{GhostComparator, GhostComparison, GhostRoute};
pub use metrics::{MetricsEngine, SessionMetrics};
pub use sampler::{GeoSampler, LocationSource, SamplerMode};
pub use session::{LocationStatus, Session, SessionEvent, SessionObserver, SessionState};
pub use types::{LocationSample, RoutePoint, SessionSummary};
