//! Configuration system for `TaskTimer`.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/tasktimer/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::PathBuf;
use std::time::Duration;

use tasktimer_proto::task::MAX_TASK_TITLE_LENGTH;

use crate::export::DEFAULT_EXPORT_FILE;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    timer: TimerFileConfig,
    storage: StorageFileConfig,
    ui: UiFileConfig,
    export: ExportFileConfig,
}

/// `[timer]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct TimerFileConfig {
    tick_interval_ms: Option<u64>,
    show_millis: Option<bool>,
}

/// `[storage]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct StorageFileConfig {
    data_dir: Option<PathBuf>,
}

/// `[ui]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct UiFileConfig {
    poll_timeout_ms: Option<u64>,
    max_title_len: Option<usize>,
}

/// `[export]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ExportFileConfig {
    file_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// Fully resolved application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    // -- Timer --
    /// How often running tasks refresh their displayed time.
    pub tick_interval: Duration,
    /// Show milliseconds in the live display.
    pub show_millis: bool,

    // -- Storage --
    /// Directory holding the durable task snapshot.
    pub data_dir: PathBuf,

    // -- UI --
    /// Poll timeout for the TUI event loop.
    pub poll_timeout: Duration,
    /// Maximum task title length in characters.
    pub max_title_len: usize,

    // -- Export --
    /// File name used by the TUI export action.
    pub export_file_name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(250),
            show_millis: false,
            data_dir: default_data_dir(),
            poll_timeout: Duration::from_millis(50),
            max_title_len: MAX_TASK_TITLE_LENGTH,
            export_file_name: DEFAULT_EXPORT_FILE.to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an error.
    /// If no `--config` is given, the default path
    /// (`~/.config/tasktimer/config.toml`) is tried and silently ignored if
    /// missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Resolve an `AppConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    #[must_use]
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            tick_interval: cli
                .tick_interval_ms
                .or(file.timer.tick_interval_ms)
                .map_or(defaults.tick_interval, Duration::from_millis),
            show_millis: cli.show_millis || file.timer.show_millis.unwrap_or(defaults.show_millis),
            data_dir: cli
                .data_dir
                .clone()
                .or_else(|| file.storage.data_dir.clone())
                .unwrap_or(defaults.data_dir),
            poll_timeout: file
                .ui
                .poll_timeout_ms
                .map_or(defaults.poll_timeout, Duration::from_millis),
            max_title_len: file.ui.max_title_len.unwrap_or(defaults.max_title_len),
            export_file_name: file
                .export
                .file_name
                .clone()
                .unwrap_or(defaults.export_file_name),
        }
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Terminal task timer")]
pub struct CliArgs {
    /// Path to config file (default: `~/.config/tasktimer/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory holding saved tasks.
    #[arg(long, env = "TASKTIMER_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Display refresh interval for running tasks, in milliseconds.
    #[arg(long)]
    pub tick_interval_ms: Option<u64>,

    /// Show milliseconds in the live display.
    #[arg(long)]
    pub show_millis: bool,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "TASKTIMER_LOG")]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/tasktimer.log`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// One-shot command; omit to start the interactive view.
    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

/// One-shot commands. `<ID>` accepts any unique prefix of a task id.
#[derive(clap::Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    /// Create a task.
    Add {
        /// Task title (defaults to "Task").
        #[arg(default_value = "")]
        title: String,
    },
    /// Start a task.
    Start {
        /// Task id or unique prefix.
        id: String,
    },
    /// Pause a task.
    Pause {
        /// Task id or unique prefix.
        id: String,
    },
    /// Reset a task to zero.
    Reset {
        /// Task id or unique prefix.
        id: String,
    },
    /// Rename a task.
    Rename {
        /// Task id or unique prefix.
        id: String,
        /// New title.
        title: String,
    },
    /// Delete a task.
    Rm {
        /// Task id or unique prefix.
        id: String,
    },
    /// List tasks with their elapsed time.
    List,
    /// Export all tasks as CSV.
    Export {
        /// Output file (default: stdout).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Delete every task.
    Clear {
        /// Confirm deletion.
        #[arg(long)]
        yes: bool,
    },
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Platform data directory for saved tasks, or `./.tasktimer` if the
/// platform has none.
fn default_data_dir() -> PathBuf {
    dirs::data_dir().map_or_else(|| PathBuf::from(".tasktimer"), |d| d.join("tasktimer"))
}

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and missing file
/// is treated as empty config.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    }

    let Some(config_dir) = dirs::config_dir() else {
        // No config dir available, use defaults.
        return Ok(ConfigFile::default());
    };
    let path = config_dir.join("tasktimer").join("config.toml");

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
