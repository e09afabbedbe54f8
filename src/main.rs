// src/main.rs
use anyhow::{Context, Result};
use clap::Parser;
use gesture_mixer::config::GestureConfig;
use gesture_mixer::data::{default_output_dir, SessionLog};
use gesture_mixer::events::{deliver_logged, DeliveryError, EventSink, LogSink, StampedEvent};
use gesture_mixer::mixer::{MixerModel, Stem};
use gesture_mixer::runner::{run_loop, RunOptions};
use gesture_mixer::source::{LandmarkSource, ReplaySource};
use gesture_mixer::synthetic::ScriptedSource;
use gesture_mixer::tracking::GestureTracker;
use gesture_mixer::zone::ZoneVolumes;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Set by SIGINT/SIGTERM; the loop finishes its tick and returns.
static STOP_REQUESTED: AtomicBool = AtomicBool::new(false);

#[cfg(unix)]
fn install_signal_handlers() {
    unsafe {
        libc::signal(libc::SIGTERM, signal_handler as libc::sighandler_t);
        libc::signal(libc::SIGINT, signal_handler as libc::sighandler_t);
    }
}

#[cfg(not(unix))]
fn install_signal_handlers() {}

#[cfg(unix)]
extern "C" fn signal_handler(_sig: libc::c_int) {
    STOP_REQUESTED.store(true, Ordering::SeqCst);
}

const PLAYLIST: [&str; 4] = [
    "Astrid-S_I_Dont_Know_Why",
    "Panda-Bear_Hyukoh",
    "Patti-Smith_Gloria",
    "River_Kang",
];

#[derive(Parser, Debug)]
#[command(name = "gesture_mixer", about = "Hand-gesture control for a multi-stem player")]
struct Cli {
    /// JSON file overriding the default thresholds
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON-lines landmark trace to replay (default: built-in demo script)
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Hold the configured frame rate instead of running as fast as possible
    #[arg(long)]
    realtime: bool,

    /// Stop after N frames
    #[arg(long)]
    max_frames: Option<u64>,

    /// Write events.csv and summary.json under this directory
    #[arg(long, num_args = 0..=1, default_missing_value = "")]
    export: Option<PathBuf>,

    /// Session name for exports (default: session_<timestamp>)
    #[arg(long)]
    session: Option<String>,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    dump_config: bool,
}

/// Everything the events go to: the log echo, the player model and the
/// session recording.
struct Outputs {
    echo: LogSink,
    mixer: MixerModel,
    log: SessionLog,
}

impl EventSink for Outputs {
    fn deliver(&mut self, event: &StampedEvent) -> Result<(), DeliveryError> {
        deliver_logged(&mut self.echo, event);
        deliver_logged(&mut self.mixer, event);
        deliver_logged(&mut self.log, event);
        Ok(())
    }

    fn name(&self) -> &str {
        "outputs"
    }

    fn tick(&mut self, now: u64) {
        self.mixer.tick(now);
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gesture_mixer=info".into()),
        )
        .init();

    let config = match &cli.config {
        Some(path) => GestureConfig::load(path)?,
        None => GestureConfig::default(),
    };

    if cli.dump_config {
        println!("{}", config.to_json_pretty()?);
        return Ok(());
    }

    let mut source: Box<dyn LandmarkSource> = match &cli.replay {
        Some(path) => Box::new(ReplaySource::open(path)?),
        None => Box::new(ScriptedSource::demo(config.target_fps)),
    };

    let start_levels = ZoneVolumes::new(&config.volume);
    let mut tracker = GestureTracker::new(config).context("invalid gesture configuration")?;

    let output_dir = match &cli.export {
        Some(dir) if !dir.as_os_str().is_empty() => dir.clone(),
        _ => default_output_dir(),
    };
    let mut outputs = Outputs {
        echo: LogSink,
        mixer: MixerModel::new(PLAYLIST.iter().map(|s| s.to_string()).collect()),
        log: SessionLog::new(&output_dir, cli.session.clone()),
    };

    let options = RunOptions {
        pace: cli.realtime,
        max_frames: cli.max_frames,
    };
    install_signal_handlers();
    let metrics = run_loop(
        source.as_mut(),
        &mut tracker,
        &mut outputs,
        &options,
        &STOP_REQUESTED,
    )?;
    if STOP_REQUESTED.load(Ordering::SeqCst) {
        info!("interrupted after {} frames", metrics.frames);
    }

    println!("=== Session ===");
    println!("Frames: {} ({} with hands)", metrics.frames, metrics.frames_with_hands);
    println!("Events: {}", metrics.events);
    println!(
        "Track: {}  Rate: {:.2}x",
        outputs.mixer.current_track().unwrap_or("-"),
        outputs.mixer.signed_rate()
    );
    for stem in Stem::ALL {
        println!("  {:<7} {:>6.1} dB", stem.as_str(), outputs.mixer.stem_db(stem));
    }

    if cli.export.is_some() {
        let csv = outputs.log.export_csv()?;
        let summary = outputs.log.export_summary(&start_levels)?;
        info!("exported {} and {}", csv.display(), summary.display());
    }

    Ok(())
}
