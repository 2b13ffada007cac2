//! piper-rooms: terminal room client with a create-room workflow.
//!
//! This is the crate root. It declares the module tree, defines the CLI, sets
//! up logging, and runs the main event loop that ties input, the create-room
//! dialog and rendering together.
//!
//! ## Module structure
//!
//! - `service`     Room service boundary and the shared room directory
//! - `homeserver`  In-process room service the binary runs against
//! - `error`       Create-room error taxonomy
//! - `alias`       Debounced room address availability checks
//! - `create_room` Create-room workflow controller
//! - `dialog`      Create-room modal (keys and rendering)
//! - `hotkeys`     Global keyboard router
//! - `search`      Room search modal
//! - `chat`        Application state (`App`) and rendering (`ui()`)
//! - `config`      CLI/file/default configuration layers
//! - `theme`       Color palettes

mod alias;
mod chat;
mod config;
mod create_room;
mod dialog;
mod error;
mod homeserver;
mod hotkeys;
mod search;
mod service;
mod theme;

// ── Imports ─────────────────────────────────────────────────────────────────

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{Event as TermEvent, EventStream, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
// `StreamExt` is an *extension trait*: it adds `.next()` to the terminal
// event stream. It has to be in scope for the method to resolve.
use n0_future::StreamExt;
use tokio::time::{Duration, interval};

use chat::{App, ui};
use config::{Config, Overrides};
use homeserver::LocalHomeserver;
use service::{DEFAULT_CREATOR_POWER_LEVEL, RoomDirectory, RoomId, RoomSummary};
use theme::Theme;

// ── CLI ──────────────────────────────────────────────────────────────────────

/// Flags override the config file, which overrides built-in defaults.
#[derive(Parser)]
#[command(name = "piper-rooms", about = "Terminal room client")]
struct Cli {
    /// Your user id, e.g. @alice:example.org
    #[arg(short, long)]
    user_id: Option<String>,
    /// Config file (default: <config dir>/piper-rooms/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Where to write logs (default: <data dir>/piper-rooms/piper-rooms.log)
    #[arg(long)]
    log_file: Option<PathBuf>,
    /// Simulated homeserver round-trip time in milliseconds
    #[arg(long)]
    latency_ms: Option<u64>,
}

// ── Main ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(
        cli.config.as_deref(),
        Overrides {
            user_id: cli.user_id,
            log_file: cli.log_file,
            latency_ms: cli.latency_ms,
        },
    )?;
    init_logging(&config.log_file, &config.log_filter)?;
    tracing::info!(
        user_id = %config.user_id,
        latency_ms = config.latency.as_millis() as u64,
        "starting"
    );

    // ── Homeserver ───────────────────────────────────────────────────────────

    // The directory is shared (cheap `Arc` clones) between the homeserver,
    // which fills it, and the UI, which reads it and subscribes to it.
    let directory = RoomDirectory::new();
    seed_rooms(&directory, &config);
    let homeserver = LocalHomeserver::new(
        config.server_name.clone(),
        directory.clone(),
        config.latency,
    );

    // ── Terminal setup ───────────────────────────────────────────────────────

    // Raw mode: keys arrive immediately and aren't echoed. The alternate
    // screen keeps the user's scrollback intact for when we exit.
    enable_raw_mode()?;
    execute!(std::io::stdout(), EnterAlternateScreen)?;
    let mut terminal = ratatui::Terminal::new(ratatui::backend::CrosstermBackend::new(
        std::io::stdout(),
    ))?;

    let mut app = App::new(
        directory,
        Arc::new(homeserver),
        config.user_id.clone(),
        config.server_name.clone(),
        Theme::for_mode(config.theme),
    );

    let result = run(&mut terminal, &mut app).await;

    // ── Restore terminal ─────────────────────────────────────────────────────
    // Runs whether the loop ended normally or with an error, so a failure
    // doesn't leave the shell in raw mode.
    app.hotkeys.remove();
    disable_raw_mode()?;
    execute!(std::io::stdout(), LeaveAlternateScreen)?;
    tracing::info!("stopped");

    result
}

// ── Event loop ───────────────────────────────────────────────────────────────

/// Multiplex terminal input, the open dialog's background results and a redraw
/// tick until the user quits.
async fn run<B: ratatui::backend::Backend>(
    terminal: &mut ratatui::Terminal<B>,
    app: &mut App,
) -> Result<()> {
    let mut events = EventStream::new();
    // Redraw even when nothing arrives, so rooms announced by the homeserver
    // and messages appear without a key press.
    let mut tick = interval(Duration::from_millis(50));

    loop {
        terminal.draw(|f| ui(f, app))?;

        tokio::select! {
            // ── Branch 1: Keyboard input ─────────────────────────────────
            ev = events.next() => {
                match ev {
                    Some(Ok(TermEvent::Key(key))) => {
                        // Some platforms report releases too; act on presses only.
                        if key.kind == KeyEventKind::Press {
                            app.on_key(key);
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e).context("reading terminal events"),
                    None => app.should_quit = true,
                }
            }

            // ── Branch 2: Create-room dialog events ──────────────────────
            // Pending forever while no dialog is open.
            event = app.next_dialog_event() => {
                app.handle_dialog_event(event);
            }

            // ── Branch 3: UI tick (50ms) ─────────────────────────────────
            _ = tick.tick() => {}
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

// ── Setup helpers ────────────────────────────────────────────────────────────

/// Send `tracing` output to a file. The terminal belongs to the TUI, so
/// nothing may be written to stdout or stderr while it runs.
///
/// `RUST_LOG` takes precedence over the configured filter.
fn init_logging(path: &Path, filter: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating log directory '{}'", parent.display()))?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file '{}'", path.display()))?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(filter))
        .with_context(|| format!("invalid log filter '{filter}'"))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(file))
        .init();
    Ok(())
}

/// Start with one public lobby so the room list isn't empty on first launch.
fn seed_rooms(directory: &RoomDirectory, config: &Config) {
    directory.insert(RoomSummary {
        id: RoomId::new(format!("!lobby:{}", config.server_name)),
        name: "Lobby".into(),
        topic: Some("Say hello. Ctrl+N creates a room of your own.".into()),
        alias: Some(format!("#lobby:{}", config.server_name)),
        is_public: true,
        is_encrypted: true,
        creator_power_level: DEFAULT_CREATOR_POWER_LEVEL,
        messages: vec![format!("{}: welcome to piper-rooms", config.user_id)],
    });
}
