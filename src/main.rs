use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use pos_voice::assistant::Assistant;
use pos_voice::config::{Config, Mode};
use pos_voice::event_bus::{Event, EventBus};
use pos_voice::interpreter::{Intent, normalize};
use pos_voice::knowledge::ResponseCategory;
use pos_voice::ui::UIHandler;
use pos_voice::wake::{Gate, WakeGate};
use pos_voice::logger;

#[derive(Parser)]
#[command(name = "pos_voice", version, about = "Voice command interpreter for a POS terminal")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<String>,
    /// Interpreter selection (overrides the config file)
    #[arg(short, long, value_enum)]
    mode: Option<Mode>,
    /// Only react to utterances addressed with the wake phrase
    #[arg(short, long)]
    wake: bool,
    /// Print outcomes as JSON lines
    #[arg(short, long)]
    json: bool,
    /// Run without colored output
    #[arg(long)]
    headless: bool,
    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
    /// Recognized utterance; read lines from stdin when omitted
    #[arg(last = true)]
    utterance: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    logger::init(args.verbose);

    let (mut config, source) = Config::load(&args.config)?;
    config.merge_with_args(args.mode, args.wake);

    let event_bus = Arc::new(EventBus::new(100));
    let _ = event_bus.emit(Event::ConfigLoaded { path: source }).await;

    let assistant = Assistant::from_config(&config, event_bus.clone())
        .context("Failed to start the voice assistant")?;
    let ui = UIHandler::new(args.headless, args.json);
    ui.start(assistant.mode(), assistant.has_remote())?;

    let mut status = ExitCode::SUCCESS;
    if args.utterance.is_empty() {
        run_session(&assistant, &ui, &config).await?;
    } else {
        let text = normalize(&args.utterance.join(" "));
        // Already reported by the UI; only the exit status is left to set.
        if !ui.show_result(&assistant.handle(&text).await)? {
            status = ExitCode::FAILURE;
        }
    }

    let _ = event_bus.emit(Event::ShutdownRequested).await;
    if args.verbose {
        ui.show_metrics(&event_bus.get_metrics().await);
    }
    Ok(status)
}

/// Interpret stdin line by line until EOF or a farewell.
async fn run_session(assistant: &Assistant, ui: &UIHandler, config: &Config) -> Result<()> {
    let mut gate = config
        .assistant
        .require_wake_phrase
        .then(|| WakeGate::new(&config.assistant.wake_phrase));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let mut text = normalize(&line);
        if let Some(gate) = gate.as_mut() {
            match gate.filter(&text) {
                Gate::Ignore => continue,
                Gate::Acknowledge => {
                    ui.show_acknowledgement(
                        assistant.rules().responses().pick(ResponseCategory::Acknowledge),
                    );
                    continue;
                }
                Gate::Forward(command) => text = command,
            }
        } else if text.is_empty() {
            continue;
        }

        // Transient remote failures are reported and the session goes on.
        ui.show_result(&assistant.handle(&text).await)?;

        if assistant.rules().classify(&text) == Intent::Farewell {
            break;
        }
    }
    Ok(())
}
