use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use anyhow::{Context, Result};
use clap::Parser;
use oceanchat_core::{Backend, Config, ConversationController, HttpBackend};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "oceanchat")]
#[command(version, about = "Terminal chat client for the OceanGPT assistant")]
struct Cli {
    /// Backend base URL (overrides OCEANCHAT_BASE_URL and the config file)
    #[arg(short, long)]
    base_url: Option<String>,

    /// Seconds to wait for a chat or upload reply
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Log file (defaults to the user cache directory)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Write the effective settings back to the config file
    #[arg(long)]
    save_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_path = match cli.log_file.clone() {
        Some(path) => path,
        None => default_log_path()?,
    };
    init_logging(&log_path)?;
    info!("Starting oceanchat v{}", env!("CARGO_PKG_VERSION"));

    let config = effective_config(&cli)?;
    if cli.save_config {
        config.save()?;
        info!(path = ?Config::get_config_path()?, "config saved");
    }

    let backend = HttpBackend::new(&config.base_url)
        .with_context(|| format!("Failed to set up a client for {}", config.base_url))?;
    let backend_label = backend.base_url().to_string();
    let backend: Arc<dyn Backend> = Arc::new(backend);
    let controller = ConversationController::new(backend, &config);
    info!(base_url = %backend_label, timeout = ?config.request_timeout(), "backend ready");

    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let result = run(&mut terminal, controller, backend_label).await;

    tui::restore()?;
    if let Err(err) = &result {
        warn!("exiting with error: {err:#}");
    }
    result
}

async fn run(terminal: &mut tui::Tui, controller: ConversationController, backend_label: String) -> Result<()> {
    let mut events = EventHandler::new();
    let mut app = App::new(controller, backend_label, events.sender());

    while !app.should_quit {
        terminal.draw(|frame| ui::render(&mut app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(&mut app, event),
            None => break,
        }
    }

    Ok(())
}

/// Config file, then environment, then command line
fn effective_config(cli: &Cli) -> Result<Config> {
    Ok(apply_overrides(Config::load()?, cli))
}

fn apply_overrides(mut config: Config, cli: &Cli) -> Config {
    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(timeout) = cli.timeout {
        config.request_timeout_secs = timeout;
    }
    config.normalized()
}

fn default_log_path() -> Result<PathBuf> {
    let cache_dir = dirs::cache_dir().context("Could not find cache directory")?;
    Ok(cache_dir.join("oceanchat").join("oceanchat.log"))
}

/// The terminal belongs to the UI, so logs go to a file
fn init_logging(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = File::options()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}
