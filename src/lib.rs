pub mod audio;
mod console;
pub mod sensing;
pub mod settings;
pub mod timer;
mod utils;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;

pub use audio::{AudioCues, AudioEngineHandle, SilentAudio};
pub use sensing::{
    Detection, FrameSource, ModelSlot, ObjectDetector, PresenceGate, PresenceObservation,
    PresenceSource, SimulatedPresence,
};
pub use settings::TimerSettings;
pub use timer::{
    ClockState, IntervalClock, Phase, PhaseDurations, Session, SessionController, SessionCounters,
    SessionEvent, TimerSnapshot,
};

/// Set to 1/true to log at debug level unless `RUST_LOG` says otherwise.
const DEBUG_ENV: &str = "PRESENCE_TIMER_DEBUG";

#[derive(Debug, Parser)]
#[command(name = "presence-timer", version, about = "A work/break timer that runs while you are at your desk")]
struct Cli {
    /// JSON settings file (defaults to $PRESENCE_TIMER_SETTINGS)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Run as a plain manual timer without presence sensing
    #[arg(long)]
    no_camera: bool,

    /// Disable the ambient tick and the phase bell
    #[arg(long)]
    mute: bool,

    /// Print the effective settings as JSON and exit
    #[arg(long)]
    print_settings: bool,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let debug_mode = std::env::var(DEBUG_ENV)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    // Initialize logging (reads RUST_LOG env var)
    let default_level = if debug_mode { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    log::info!("presence-timer starting up...");

    let settings = match TimerSettings::resolve_path(cli.settings.clone()) {
        Some(path) => TimerSettings::load(&path)?,
        None => TimerSettings::default(),
    };

    if cli.print_settings {
        println!("{}", serde_json::to_string_pretty(&settings)?);
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;
    runtime.block_on(serve(cli, settings))
}

async fn serve(cli: Cli, settings: TimerSettings) -> Result<()> {
    let audio: Arc<dyn AudioCues> = if cli.mute || !settings.audio.enabled {
        Arc::new(SilentAudio)
    } else {
        Arc::new(AudioEngineHandle::new(settings.audio.clone()))
    };

    // The bundled sensor stands in for a camera and a detection model; it is
    // flipped with the `h` / `a` commands.
    let sensor = (!cli.no_camera).then(|| SimulatedPresence::new(false));
    let presence = sensor.as_ref().map(|sensor| {
        let model = ModelSlot::empty();
        let detector = Arc::clone(sensor);
        model.spawn_load(move || Ok(detector as Arc<dyn ObjectDetector>));
        PresenceSource::new(Arc::clone(sensor) as Arc<dyn FrameSource>, model)
    });

    let controller = SessionController::spawn(&settings, audio, presence);
    console::run_console(controller, sensor).await
}
