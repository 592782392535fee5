use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tripmate_core::Config;

mod animation;
mod app;
mod handler;
mod tui;
mod ui;

use app::{App, Settings};
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "tripmate")]
#[command(about = "Plan a trip by chatting with a Gemini-backed travel assistant", version)]
struct Cli {
    /// Gemini model to use (overrides the saved choice)
    #[arg(short, long)]
    model: Option<String>,

    /// Gemini API key (GEMINI_API_KEY and the config file are used otherwise)
    #[arg(long)]
    api_key: Option<String>,

    /// Base URL of the Gemini API
    #[arg(long)]
    base_url: Option<String>,

    /// Where to write logs (the terminal is owned by the UI)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn default_log_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("tripmate")
        .join("tripmate.log")
}

fn init_logging(path: PathBuf) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.unwrap_or_else(default_log_path))?;

    let config = Config::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "could not read config, using defaults");
        Config::new()
    });
    let settings = Settings::resolve(&config, cli.api_key, cli.model, cli.base_url);
    tracing::info!(model = %settings.model, has_key = settings.api_key.is_some(), "starting tripmate");

    let (notice_tx, notice_rx) = mpsc::unbounded_channel();
    let mut app = App::new(settings, Arc::new(notice_tx));

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new(notice_rx);

    app.start_greeting();

    let result = run(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    result
}

async fn run(terminal: &mut tui::Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await?,
            None => break,
        }
    }
    Ok(())
}
