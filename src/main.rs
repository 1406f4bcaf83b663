use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

use motionvid::{
    control_channel, run_recorder, spawn_signal_handlers, EventBus, MotionRecorder,
    MotionvidConfig, SimulatedPipeline,
};

#[derive(Parser, Debug)]
#[command(name = "motionvid")]
#[command(about = "Motion-gated video segment recorder")]
#[command(version)]
#[command(long_about = "Watches a per-frame motion signal from the camera pipeline and \
switches the encoder output to a timestamped segment file while motion is present, \
returning to the default output once motion has ended and the minimum recording \
length has elapsed.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "motionvid.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long, value_name = "DIR")]
    log_file: Option<PathBuf>,

    /// Frames per motion evaluation block
    #[arg(long, visible_alias = "gap", value_name = "FRAMES")]
    block_size: Option<usize>,

    /// Minimum number of frames in a motion segment
    #[arg(long, visible_alias = "minframes", value_name = "FRAMES")]
    min_hold_frames: Option<u32>,

    /// Directory to save motion segments
    #[arg(long, visible_alias = "savedir", value_name = "DIR")]
    save_dir: Option<String>,

    /// Default output while no motion is recorded
    #[arg(short, long, value_name = "DEST")]
    output: Option<String>,

    /// Stop after this many milliseconds (0 = run forever)
    #[arg(short, long, value_name = "MS")]
    timeout: Option<u64>,

    /// Stop after this many frames (0 = unlimited)
    #[arg(long, value_name = "COUNT")]
    frames: Option<u64>,

    /// Read ENTER (manual trigger) and x (stop) from the keyboard
    #[arg(short, long)]
    keypress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    let _log_guard = init_logging(&args)?;

    info!("Starting motionvid v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let mut config = match MotionvidConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };
    apply_overrides(&mut config, &args);

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        eprintln!("✗ Configuration validation failed: {}", e);
        std::process::exit(1);
    }

    if args.validate_config {
        println!("✓ Configuration is valid");
        return Ok(());
    }

    let (control_tx, control_rx) = control_channel();
    spawn_signal_handlers(&config.session, control_tx.clone());

    #[cfg(feature = "keyboard")]
    let keyboard = if config.session.keypress {
        let handler = motionvid::app::keyboard_input::KeyboardInputHandler::new(control_tx.clone());
        handler.start();
        Some(handler)
    } else {
        None
    };

    let event_bus = Arc::new(EventBus::default());
    let pipeline = SimulatedPipeline::from_config(&config.simulation);
    let recorder = MotionRecorder::new(config, pipeline, event_bus, control_rx)?;

    let result = run_recorder(recorder).await;

    #[cfg(feature = "keyboard")]
    if let Some(handler) = keyboard {
        handler.stop().await;
    }

    match result {
        Ok((reason, stats)) => {
            info!("Stopped: {}", reason);
            info!(
                "Processed {} frames, encoded {}, recorded {} segments",
                stats.frames_processed, stats.frames_encoded, stats.segments_closed
            );
            Ok(())
        }
        Err(e) => {
            error!("Fatal {} error: {}", e.kind(), e);
            eprintln!("ERROR: *** {} ***", e);
            Err(e.into())
        }
    }
}

fn apply_overrides(config: &mut MotionvidConfig, args: &Args) {
    if let Some(block_size) = args.block_size {
        config.motion.block_size = block_size;
    }
    if let Some(min_hold_frames) = args.min_hold_frames {
        config.motion.min_hold_frames = min_hold_frames;
    }
    if let Some(save_dir) = &args.save_dir {
        config.output.save_directory = save_dir.clone();
    }
    if let Some(output) = &args.output {
        config.output.default_destination = output.clone();
    }
    if let Some(timeout) = args.timeout {
        config.session.timeout_ms = Some(timeout);
    }
    if let Some(frames) = args.frames {
        config.session.frame_limit = Some(frames);
    }
    if args.keypress {
        config.session.keypress = true;
    }
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("motionvid={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer().with_target(true).boxed()
        }
    };

    let (file_layer, guard) = match &args.log_file {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "motionvid.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer).boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(file_layer)
        .with(env_filter)
        .init();

    Ok(guard)
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# motionvid configuration file");
    println!("# Environment overrides use MOTIONVID_<SECTION>__<KEY>, e.g. MOTIONVID_MOTION__BLOCK_SIZE=40");
    println!();
    println!("{}", toml::to_string_pretty(&MotionvidConfig::default())?);
    Ok(())
}
