//! Console front end.
//!
//! Utterances are typed on stdin (see [`voice_commands::engine::console`] for
//! the syntax) and dispatched to a small set of demo commands.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load and validate [`AppConfig`].
//! 3. Build the console engine, the session and the controller.
//! 4. Register commands and the two fallback callbacks.
//! 5. Schedule the delayed start and run until `quit`, Ctrl-C or end of input.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use voice_commands::{
    config::AppConfig,
    control::{DelayedStart, SessionControl, VoiceController},
    engine::{event_channel, ConsoleEngine},
    router::CommandRouter,
    session::RecognitionSession,
};

#[derive(Debug, Parser)]
#[command(name = "voice-commands", about = "Dispatch spoken (typed) commands")]
struct Cli {
    /// Settings file (defaults to the platform config directory).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the delay before listening starts, in milliseconds.
    #[arg(long)]
    delay_ms: Option<u64>,
}

fn register_commands(router: &CommandRouter, control: &SessionControl) {
    router.clear_commands();

    let listing = router.clone();
    router.add_command("help", move || {
        println!("Commands: {}", listing.commands().join(", "));
    });
    router.add_command("hello", || println!("Hello!"));

    let stop = control.clone();
    router.add_command("stop listening", move || {
        println!("Stopped listening.");
        stop.stop();
    });

    let quit = control.clone();
    router.add_command("quit", move || quit.shutdown());

    router.set_no_match_callback(|transcript| {
        println!("No command found for '{transcript}'");
    });
    router.set_unrecognized_callback(|transcript| {
        println!("I'm not sure, but I think you said, '{transcript}'");
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 2. Configuration
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => AppConfig::load().unwrap_or_else(|e| {
            log::warn!("Failed to load config ({e}); using defaults");
            AppConfig::default()
        }),
    };
    config.validate()?;

    // 3. Engine, session, controller
    let (events_tx, events_rx) = event_channel();
    let engine = ConsoleEngine::spawn(events_tx, &config.console)
        .context("failed to start console engine")?;
    let input_closed = engine.input_closed();

    let session = RecognitionSession::new(Some(Box::new(engine)), &config.recognition);
    let router = CommandRouter::with_threshold(config.recognition.confidence_threshold);
    let controller = VoiceController::new(session, router.clone());
    let control = controller.control();

    // 4. Commands
    register_commands(&router, &control);

    // 5. Run
    let delay = Duration::from_millis(cli.delay_ms.unwrap_or(config.recognition.start_delay_ms));
    log::info!("Listening in {delay:?}; type `help` once started");
    let pending = DelayedStart::schedule(delay, control.clone(), |e| {
        eprintln!("{e}");
    });

    let mut runner = tokio::spawn(controller.run(events_rx));
    let stats = tokio::select! {
        stats = &mut runner => stats?,
        _ = tokio::signal::ctrl_c() => {
            control.shutdown();
            runner.await?
        }
        _ = input_closed.notified() => {
            control.shutdown();
            runner.await?
        }
    };
    pending.cancel();

    log::info!("Session finished: {stats:?}");
    Ok(())
}
