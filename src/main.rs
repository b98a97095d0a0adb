use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use padecho::config::Settings;
use padecho::controller::probe::probe;
use padecho::controller::{CaptureEngine, CaptureError, GilrsCollector};
use padecho::mapping::{PadMapper, VirtualPad};
use padecho::persistence;
use padecho::replay::Replayer;
use padecho::scheme::{Scheme, SchemeBook};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// padecho: record gamepad input and replay it on a virtual controller
#[derive(Parser)]
#[command(name = "padecho")]
#[command(version, about = "Record gamepad input and replay it on a virtual controller")]
#[command(after_help = "EXAMPLES:
    # Record until Ctrl-C
    padecho record

    # Replay the newest recording once
    padecho replay

    # Replay a specific file until Ctrl-C
    padecho replay --loop ~/take.json

    # Show raw ids and their roles for 20 seconds
    padecho probe --seconds 20")]
struct Cli {
    /// Settings file [default: <config dir>/padecho/config.toml]
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record controller input until Ctrl-C
    Record {
        /// Output file [default: timestamped file in the recordings directory]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replay a recording on the virtual controller
    Replay {
        /// Recording to replay [default: newest in the recordings directory]
        path: Option<PathBuf>,

        /// Repeat until Ctrl-C
        #[arg(short = 'l', long = "loop")]
        looped: bool,
    },

    /// Log raw button and axis ids with their scheme roles
    Probe {
        #[arg(short, long, default_value_t = 10)]
        seconds: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup(cli.verbose)?;

    let config_path = cli.config.unwrap_or_else(Settings::default_path);
    let settings = Settings::load_or_create(&config_path)?;
    let scheme = load_scheme(&settings)?;

    match cli.command {
        Commands::Record { output } => record(settings, scheme, output).await,
        Commands::Replay { path, looped } => replay(settings, scheme, path, looped).await,
        Commands::Probe { seconds } => run_probe(scheme, Duration::from_secs(seconds)).await,
    }
}

fn setup(verbose: bool) -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    setup_logging_env(if verbose { Level::DEBUG } else { Level::INFO });
    Ok(())
}

fn setup_logging_env(level: Level) {
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

fn load_scheme(settings: &Settings) -> Result<Arc<Scheme>> {
    let book = SchemeBook::load_dir(&settings.paths.schemes_dir)
        .map_err(|e| eyre!("Failed to load controller schemes: {}", e))?;
    let scheme = book.scheme(&settings.gamepad.name).map_err(|e| {
        let known: Vec<_> = book.devices().collect();
        eyre!("{} (known schemes: {})", e, known.join(", "))
    })?;
    info!("Using controller scheme '{}'", scheme.device());
    Ok(Arc::new(scheme))
}

async fn record(settings: Settings, scheme: Arc<Scheme>, output: Option<PathBuf>) -> Result<()> {
    let source = GilrsCollector::create()
        .map_err(|e| eyre!("Failed to initialize controller input: {}", e))?;

    let mut engine = CaptureEngine::new(Box::new(source), scheme, settings);
    if let Some(path) = output {
        engine = engine.with_output(path);
    }

    let device = engine.start().map_err(|e| eyre!("{}", e))?;
    info!("Recording '{}', press Ctrl-C to stop", device.name);

    let mut watch = tokio::time::interval(Duration::from_millis(100));
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.map_err(|e| eyre!("Failed to listen for Ctrl-C: {}", e))?;
                debug!("Ctrl-C received, {} events captured", engine.events_captured());
                break;
            }
            _ = watch.tick() => {
                if engine.is_interrupted() {
                    warn!("Controller input failed, stopping the recording");
                    break;
                }
            }
        }
    }

    match engine.stop() {
        Ok(outcome) => {
            info!(
                "Saved {} events ({:.3}s) to {}",
                outcome.recording.len(),
                outcome.recording.duration(),
                outcome.path.display()
            );
            Ok(())
        }
        Err(CaptureError::Store {
            recording,
            path,
            source,
        }) => {
            let name = path
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("recording.json"));
            let fallback = std::env::temp_dir().join(name);
            persistence::save(&recording, &fallback).map_err(|e| {
                eyre!(
                    "Recording of {} events lost: {} (fallback failed: {})",
                    recording.len(),
                    source,
                    e
                )
            })?;
            error!(
                "Saved {} events to {} instead",
                recording.len(),
                fallback.display()
            );
            Err(eyre!(
                "Failed to save recording to {}: {}",
                path.display(),
                source
            ))
        }
        Err(e) => Err(eyre!("{}", e)),
    }
}

async fn replay(
    settings: Settings,
    scheme: Arc<Scheme>,
    path: Option<PathBuf>,
    looped: bool,
) -> Result<()> {
    let path = match path {
        Some(path) => path,
        None => persistence::latest_recording(&settings.paths.recordings_dir)
            .map_err(|e| eyre!("{}", e))?,
    };
    let recording = Arc::new(
        persistence::load(&path).map_err(|e| eyre!("Failed to load {}: {}", path.display(), e))?,
    );
    info!("Loaded {} events from {}", recording.len(), path.display());

    let token = CancellationToken::new();
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, stopping replay");
                ctrl_c_token.cancel();
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    let mapper = PadMapper::new(scheme, settings.gamepad.dead_zone);
    let pad = create_pad()?;
    let mut replayer =
        Replayer::new(mapper, pad, &settings.replay).with_cancellation(token.clone());

    let mut pass = 0u64;
    loop {
        pass += 1;
        let shared = recording.clone();
        let (returned, result) = tokio::task::spawn_blocking(move || {
            let result = replayer.replay(&shared);
            (replayer, result)
        })
        .await
        .map_err(|e| eyre!("Replay thread failed: {}", e))?;
        replayer = returned;

        let report = result.map_err(|e| eyre!("{}", e))?;
        info!(
            "Pass {}: {} events in {:.3}s, worst lateness {:?}",
            pass,
            report.dispatched,
            report.elapsed.as_secs_f64(),
            report.worst_lateness
        );

        if !looped || report.cancelled {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(settings.replay.loop_delay()) => {}
            _ = token.cancelled() => break,
        }
    }

    Ok(())
}

#[cfg(all(feature = "uinput", target_os = "linux"))]
fn create_pad() -> Result<Box<dyn VirtualPad>> {
    match padecho::mapping::UinputPad::create() {
        Ok(pad) => Ok(Box::new(pad)),
        Err(e) => {
            warn!("uinput unavailable ({}), falling back to trace pad", e);
            Ok(Box::new(padecho::mapping::TracePad::new()))
        }
    }
}

#[cfg(not(all(feature = "uinput", target_os = "linux")))]
fn create_pad() -> Result<Box<dyn VirtualPad>> {
    warn!("Built without a virtual device backend");
    Ok(Box::new(padecho::mapping::TracePad::new()))
}

async fn run_probe(scheme: Arc<Scheme>, duration: Duration) -> Result<()> {
    let (device, seen) = tokio::task::spawn_blocking(move || -> Result<_, CaptureError> {
        let mut source = GilrsCollector::create()?;
        probe(&mut source, &scheme, duration)
    })
    .await
    .map_err(|e| eyre!("Probe thread failed: {}", e))?
    .map_err(|e| eyre!("{}", e))?;

    info!(
        "Probe of '{}' finished: {} inputs seen",
        device.name,
        seen.len()
    );
    Ok(())
}

