use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};

use activity_engine::collaborators::{finalize, CoinRewards, JsonFileStore};
use activity_engine::config::EngineConfig;
use activity_engine::display::{
    format_distance, format_duration, format_ghost_delta, format_pace, format_speed,
};
use activity_engine::driver::{hold_to_stop, GestureFeedback, PressOutcome, SessionDriver};
use activity_engine::gesture::StopConfirmGesture;
use activity_engine::ghost::GhostRoute;
use activity_engine::replay::ReplaySource;
use activity_engine::session::{Session, SessionEvent};

#[derive(Parser, Debug)]
#[command(name = "activity_tracker")]
#[command(about = "Replay a recorded track through the activity engine", long_about = None)]
struct Args {
    /// JSON array of location samples to replay
    #[arg(long)]
    track: PathBuf,

    /// Previous session summary (or bare ghost route) to race against
    #[arg(long)]
    ghost: Option<PathBuf>,

    /// Engine config JSON; missing fields use defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Body weight in kg for the calorie estimate
    #[arg(long)]
    weight: Option<f64>,

    /// Replay speed multiplier over the track's own timestamps
    #[arg(long, default_value = "1.0")]
    speedup: f64,

    /// Where finished sessions are saved
    #[arg(long, default_value = "activity_sessions")]
    output_dir: PathBuf,

    /// Live status JSON, rewritten every tick
    #[arg(long)]
    status_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(weight) = args.weight {
        config = config.with_body_weight(weight);
    }
    config.validate()?;

    let source = ReplaySource::from_file(&args.track, args.speedup)
        .with_context(|| format!("loading track {}", args.track.display()))?;
    if source.is_empty() {
        bail!("track {} has no samples", args.track.display());
    }
    let finished = source.finished();

    println!("[{}] Activity Tracker starting", ts_now());
    println!("  Track: {} ({} samples)", args.track.display(), source.len());
    println!("  Speedup: {}x", args.speedup);
    println!("  Body weight: {} kg", config.body_weight_kg);
    println!("  Output Dir: {}", args.output_dir.display());

    let gesture_config = config.gesture.clone();
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (session, sampler_events) = Session::new(config, source, events_tx)?;
    let (mut driver, handle) = SessionDriver::new(session, sampler_events);
    if let Some(path) = &args.status_file {
        driver = driver.with_status_file(path);
    }
    let printer = tokio::spawn(print_events(events_rx));
    let run = tokio::spawn(driver.run());

    if let Some(path) = &args.ghost {
        match GhostRoute::from_file(path)
            .with_context(|| format!("loading ghost {}", path.display()))?
        {
            Some(route) => handle.attach_ghost(route).await?,
            None => log::warn!("ghost {} has no route points, racing alone", path.display()),
        }
    }

    handle.start().await?;
    finished.notified().await;
    println!("[{}] Track finished, holding stop...", ts_now());

    // The simulated finger never lifts; keep the sender alive until the gesture returns
    let (_release_tx, release_rx) = oneshot::channel();
    let (feedback_tx, mut feedback_rx) = mpsc::unbounded_channel();
    let mut gesture = StopConfirmGesture::new(gesture_config);
    let outcome = hold_to_stop(&mut gesture, &handle, release_rx, Some(&feedback_tx)).await;
    drop(feedback_tx);
    while let Some(feedback) = feedback_rx.recv().await {
        if let GestureFeedback::Progress(p) = feedback {
            log::debug!("[gesture] {}%", p);
        }
    }
    if outcome != PressOutcome::Stopped {
        bail!("hold to stop ended with {:?}", outcome);
    }

    let summary = run
        .await??
        .ok_or_else(|| anyhow!("session driver exited without a summary"))?;
    printer.await?;

    let store = JsonFileStore::new(&args.output_dir);
    let report = finalize(&summary, &store, &CoinRewards);
    for error in &report.errors {
        eprintln!("[{}] Post-stop step failed: {}", ts_now(), error);
    }

    println!("\n=== Session Summary ===");
    println!("Session: {}", summary.session_id);
    println!("Distance: {}", format_distance(summary.distance_km * 1000.0));
    println!("Duration: {}", format_duration(summary.duration_seconds));
    println!(
        "Avg speed: {}",
        format_speed((summary.duration_seconds > 0).then_some(summary.avg_speed_kmh))
    );
    println!("Max speed: {}", format_speed(Some(summary.max_speed_kmh)));
    println!("Calories: {:.0} kcal", summary.calories_kcal);
    println!("Route points: {}", summary.route.len());
    if report.saved {
        println!("Saved to: {}", store.summary_path(&summary.session_id).display());
    }
    if let Some(reward) = &report.reward {
        println!("Coins earned: {}", reward.coins_earned);
        for note in &reward.notifications {
            println!("  {}", note);
        }
    }

    Ok(())
}

async fn print_events(mut events: mpsc::UnboundedReceiver<SessionEvent>) {
    let mut ghost_finished = false;
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Started(at) => {
                println!("[{}] Session started at {}", ts_now(), at.to_rfc3339())
            }
            SessionEvent::StateChanged(state) => println!("[{}] State: {:?}", ts_now(), state),
            SessionEvent::MetricsTick(m) if m.elapsed_seconds % 10 == 0 => println!(
                "[{}] {} | {} | pace {} | {:.0} kcal",
                ts_now(),
                format_duration(m.elapsed_seconds),
                format_distance(m.distance_meters),
                format_pace(m.pace_min_per_km()),
                m.calories_kcal
            ),
            SessionEvent::GhostCompared(c) if c.ghost_finished && !ghost_finished => {
                ghost_finished = true;
                println!("[{}] Ghost: {}", ts_now(), format_ghost_delta(Some(c)))
            }
            SessionEvent::RecenterRequested { lat, lng } => {
                log::info!("map recenter to {:.6}, {:.6}", lat, lng)
            }
            SessionEvent::LocationStatus(status) => {
                println!("[{}] Location: {:?}", ts_now(), status)
            }
            SessionEvent::Stopped(summary) => {
                println!("[{}] Session stopped after {}s", ts_now(), summary.duration_seconds)
            }
            _ => {}
        }
    }
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S").to_string()
}
