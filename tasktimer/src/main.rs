//! `TaskTimer`: terminal task timer.
//!
//! Without a subcommand, launches the TUI. With one, applies a single
//! change to the saved tasks and exits. Configuration via CLI flags,
//! environment variables, or config file (`~/.config/tasktimer/config.toml`).
//!
//! ```bash
//! # Interactive view
//! cargo run --bin tasktimer
//!
//! # One-shot commands
//! cargo run --bin tasktimer -- add "Write report"
//! cargo run --bin tasktimer -- start 0190
//! cargo run --bin tasktimer -- export --output hours.csv
//! ```

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::mpsc;
use tracing_appender::non_blocking::WorkerGuard;

use tasktimer::app::{Action, App};
use tasktimer::cli::{mutates, run_command};
use tasktimer::clock::SystemClock;
use tasktimer::config::{AppConfig, CliArgs};
use tasktimer::export::{to_csv, write_export};
use tasktimer::storage::{DataDirLock, FileStore, StorageError};
use tasktimer::tasks::{TaskStore, Transition};
use tasktimer::tracker::{Command, Outcome, TickEvent, TickSink, Tracker};
use tasktimer::ui;

type AppTracker = Tracker<FileStore, SystemClock>;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();

    // Load and resolve configuration (CLI args > env > config file > defaults).
    let config = match AppConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Logs go to a file, never stdout, since the TUI owns the terminal.
    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    tracing::info!(data_dir = %config.data_dir.display(), "tasktimer starting");

    // One session writes the data dir at a time. Read-only commands may
    // still look while another session holds it.
    let (_data_dir_lock, read_only) = match DataDirLock::acquire(&config.data_dir) {
        Ok(lock) => (Some(lock), false),
        Err(StorageError::Locked(_)) if cli.command.as_ref().is_some_and(|c| !mutates(c)) => {
            tracing::info!("data dir in use, reading without writing back");
            (None, true)
        }
        Err(e @ StorageError::Locked(_)) => {
            tracing::warn!(error = %e, "data dir in use");
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            tracing::warn!(error = %e, "could not lock data dir");
            (None, false)
        }
    };

    let mut store = TaskStore::new(FileStore::new(&config.data_dir), SystemClock)
        .with_max_title_len(config.max_title_len);
    if read_only {
        store.load_read_only();
    } else {
        store.load();
    }

    let code = match cli.command {
        Some(ref command) => {
            let result = run_command(&mut store, command, &mut io::stdout().lock());
            for warning in store.take_warnings() {
                eprintln!("warning: {warning}");
            }
            match result {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("error: {e}");
                    ExitCode::FAILURE
                }
            }
        }
        None => match run_tui(store, &config) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("error: {e}");
                ExitCode::FAILURE
            }
        },
    };

    tracing::info!("tasktimer exiting");
    code
}

/// Initialize file-based logging.
///
/// Returns a [`WorkerGuard`] that must be held until shutdown to ensure all
/// buffered log entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("tasktimer.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

/// Set up the terminal, run the interactive loop, and restore the terminal.
fn run_tui(store: TaskStore<FileStore, SystemClock>, config: &AppConfig) -> io::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, store, config);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

/// Main application loop.
fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    store: TaskStore<FileStore, SystemClock>,
    config: &AppConfig,
) -> io::Result<()> {
    let (tick_tx, mut tick_rx) = mpsc::unbounded_channel::<TickEvent>();
    let sink: TickSink = Arc::new(move |event| {
        // The receiver only goes away on shutdown.
        let _ = tick_tx.send(event);
    });

    let mut tracker = Tracker::new(store, config.tick_interval, sink);
    let resumed = tracker.resume_ticking();
    if resumed > 0 {
        tracing::info!(resumed, "resumed ticking for running tasks");
    }

    let mut app = App::new(config.show_millis);
    refresh(&mut app, &tracker);
    surface_warnings(&mut app, &tracker);

    loop {
        // Step 1: Draw the UI frame.
        terminal.draw(|frame| ui::draw(frame, &app))?;

        // Step 2: Drain pending tick events (non-blocking).
        while let Ok(event) = tick_rx.try_recv() {
            app.apply_tick(&event);
        }

        // Step 3: Poll for terminal input events.
        if event::poll(config.poll_timeout)?
            && let Event::Key(key) = event::read()?
        {
            if key.kind != KeyEventKind::Press {
                continue;
            }

            if let Some(action) = app.handle_key_event(key) {
                dispatch(&mut app, &mut tracker, action, config);
            }
        }

        if app.should_quit {
            if !tracker.shutdown() {
                tracing::warn!("exiting with unsaved changes");
            }
            return Ok(());
        }
    }
}

/// Apply one action and bring the view back in step with the store.
fn dispatch(app: &mut App, tracker: &mut AppTracker, action: Action, config: &AppConfig) {
    match action {
        Action::Command(command) => {
            let verb = command_verb(&command);
            match tracker.apply(command) {
                Ok(outcome) => app.set_info(describe(verb, &outcome)),
                Err(e) => app.set_warning(e.to_string()),
            }
        }
        Action::Export => {
            let csv = to_csv(&tracker.store().lock().export_rows());
            let path = PathBuf::from(&config.export_file_name);
            match write_export(&path, &csv) {
                Ok(()) => app.set_info(format!("Exported to {}", path.display())),
                Err(e) => {
                    tracing::warn!(error = %e, path = %path.display(), "export failed");
                    app.set_warning(format!("Export failed: {e}"));
                }
            }
        }
    }

    refresh(app, tracker);
    surface_warnings(app, tracker);
}

fn refresh(app: &mut App, tracker: &AppTracker) {
    let store = tracker.store();
    let store = store.lock();
    app.sync_tasks(store.list(), store.now_ms());
}

/// Show the most recent storage warning, if any, in the status bar.
fn surface_warnings(app: &mut App, tracker: &AppTracker) {
    if let Some(last) = tracker.take_warnings().last() {
        app.set_warning(last.to_string());
    }
}

const fn command_verb(command: &Command) -> &'static str {
    match command {
        Command::Create { .. } => "added",
        Command::Start(_) => "started",
        Command::Pause(_) => "paused",
        Command::Reset(_) => "reset",
        Command::Rename { .. } => "renamed",
        Command::Remove(_) => "removed",
        Command::Clear => "cleared",
    }
}

fn describe(verb: &str, outcome: &Outcome) -> String {
    match outcome {
        Outcome::Updated(Transition::Unchanged) => format!("Already {verb}"),
        Outcome::Removed(task) => format!("Removed {:?}", task.title),
        Outcome::Cleared(count) => format!("Removed {count} tasks"),
        Outcome::Created(_) | Outcome::Updated(Transition::Changed) | Outcome::Renamed => {
            format!("Task {verb}")
        }
    }
}
