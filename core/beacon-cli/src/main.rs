//! beacon: terminal reader for live coding-assistant sessions.
//!
//! Reads the Beacon session store through the shared reader pipeline, so the
//! list here matches every other client exactly.
//!
//! ## Subcommands
//!
//! - `list` (default): print live sessions
//! - `watch`: re-render whenever the store changes
//! - `prune`: delete records of dead sessions
//! - `reset`: force a stuck session back to idle
//! - `focus`: bring a session's editor window forward
//! - `dot`: print the status transition table as Graphviz
//! - `config`: print resolved paths and settings

mod render;

use std::io::Write;
use std::process::ExitCode;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use beacon_core::state::{dot_diagram, remove_stale};
use beacon_core::{
    focus_detached, match_session_prefix, BeaconError, Config, EditorFocuser, LivenessOracle,
    PrefixMatch, Result, SessionPoller, SessionReader, SessionRecord, SessionStore,
    SessionWatcher, StorageConfig, SystemProbe,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

const DEBUG_LOG_ENV: &str = "BEACON_DEBUG_LOG";

#[derive(Parser)]
#[command(name = "beacon")]
#[command(about = "Show live coding-assistant sessions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print live sessions, most urgent first
    List,

    /// Re-render the session list whenever it changes
    Watch {
        /// Rescan interval in milliseconds (defaults to the configured value)
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Rescan on a timer only, without filesystem notifications
        #[arg(long)]
        poll: bool,
    },

    /// Delete records whose session is no longer running
    Prune {
        /// Also delete records idle for longer than this many hours
        #[arg(long, value_name = "HOURS")]
        older_than: Option<u64>,
    },

    /// Set a session back to idle and clear its tool and notification state
    Reset {
        /// Leading characters of the session id
        #[arg(value_name = "SESSION")]
        prefix: String,
    },

    /// Bring the editor hosting a session to the front
    Focus {
        /// Leading characters of the session id
        #[arg(value_name = "SESSION")]
        prefix: String,
    },

    /// Print the status transition table in Graphviz DOT format
    Dot,

    /// Print resolved paths and configuration
    Config,
}

struct App {
    storage: StorageConfig,
    config: Config,
}

impl App {
    fn load() -> Result<Self> {
        let storage = StorageConfig::from_env()?;
        let config = Config::load(&storage);
        Ok(Self { storage, config })
    }

    fn store(&self) -> SessionStore {
        SessionStore::from_storage(&self.storage)
    }

    fn oracle(&self) -> LivenessOracle<SystemProbe> {
        LivenessOracle::from_config(SystemProbe, &self.config.liveness)
    }

    fn reader(&self) -> SessionReader<SystemProbe> {
        SessionReader::new(self.store(), self.oracle())
    }

    /// Resolves `prefix` against stored records, reporting misses and ambiguity.
    fn resolve(&self, prefix: &str) -> Option<(String, SessionRecord)> {
        match match_session_prefix(self.store().list(), prefix) {
            PrefixMatch::One { key, record } => Some((key, record)),
            PrefixMatch::None => {
                eprintln!("No session matches '{prefix}'");
                None
            }
            PrefixMatch::Ambiguous(ids) => {
                eprintln!("'{prefix}' matches {} sessions:", ids.len());
                for id in ids {
                    eprintln!("  {id}");
                }
                None
            }
        }
    }
}

fn init_logging() {
    let debug = std::env::var(DEBUG_LOG_ENV)
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let result = App::load().and_then(|app| match cli.command.unwrap_or(Commands::List) {
        Commands::List => cmd_list(&app),
        Commands::Watch { interval_ms, poll } => cmd_watch(&app, interval_ms, poll),
        Commands::Prune { older_than } => cmd_prune(&app, older_than),
        Commands::Reset { prefix } => cmd_reset(&app, &prefix),
        Commands::Focus { prefix } => cmd_focus(&app, &prefix),
        Commands::Dot => {
            print!("{}", dot_diagram());
            Ok(true)
        }
        Commands::Config => cmd_config(&app),
    });

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = %e, "beacon failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn cmd_list(app: &App) -> Result<bool> {
    let sessions = app.reader().load();
    print!("{}", render::render_sessions(&sessions, Utc::now()));
    Ok(true)
}

fn redraw(sessions: &[SessionRecord]) {
    let mut stdout = std::io::stdout().lock();
    let _ = write!(
        stdout,
        "\x1b[2J\x1b[H{}",
        render::render_sessions(sessions, Utc::now())
    );
    let _ = stdout.flush();
}

fn cmd_watch(app: &App, interval_ms: Option<u64>, poll: bool) -> Result<bool> {
    let interval = interval_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| app.config.reader.poll_interval());

    if !poll {
        match SessionWatcher::new(&app.store()) {
            Ok(watcher) => {
                let reader = app.reader();
                loop {
                    redraw(&reader.load());
                    // The timeout still fires so sessions whose process died get dropped.
                    watcher.wait_for_change(interval);
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "Filesystem watch unavailable; polling instead");
            }
        }
    }

    // Ctrl-C terminates the process; the poller needs no cleanup.
    let (tx, rx) = mpsc::channel::<Vec<SessionRecord>>();
    let _poller = SessionPoller::spawn(app.reader(), interval, move |sessions| {
        let _ = tx.send(sessions);
    });
    for sessions in rx {
        redraw(&sessions);
    }
    Ok(true)
}

fn cmd_prune(app: &App, older_than: Option<u64>) -> Result<bool> {
    let store = app.store();
    let dead = beacon_core::state::prune_dead(&store, &app.oracle());
    println!("Removed {} dead session(s), kept {}", dead.removed, dead.kept);

    let mut errors = dead.errors;
    if let Some(hours) = older_than {
        let stale = remove_stale(&store, Duration::from_secs(hours * 3600), Utc::now());
        println!("Removed {} session(s) idle for over {hours}h", stale.removed);
        errors.extend(stale.errors);
    }

    for error in &errors {
        eprintln!("  failed: {error}");
    }
    Ok(errors.is_empty())
}

fn cmd_reset(app: &App, prefix: &str) -> Result<bool> {
    let Some((key, mut record)) = app.resolve(prefix) else {
        return Ok(false);
    };
    let before = record.status;
    record.reset(Utc::now());
    app.store().put(&key, &record)?;
    tracing::info!(key = %key, session = %record.session_id, old = %before, "Session reset");
    println!("Reset {} ({}) from {} to idle", record.session_id, record.project_name, before.label());
    Ok(true)
}

fn cmd_focus(app: &App, prefix: &str) -> Result<bool> {
    let Some((_, record)) = app.resolve(prefix) else {
        return Ok(false);
    };
    if !app.oracle().is_alive(&record) {
        eprintln!("Session {} is no longer running", record.session_id);
        return Ok(false);
    }

    let focuser = Arc::new(EditorFocuser::new(app.config.editor.clone()));
    // Join so the editor command finishes before the process exits.
    if focus_detached(focuser, record).join().is_err() {
        return Err(BeaconError::CommandFailed {
            command: "focus".to_string(),
            details: "focus thread panicked".to_string(),
        });
    }
    Ok(true)
}

fn cmd_config(app: &App) -> Result<bool> {
    println!("root:     {}", app.storage.root().display());
    println!("sessions: {}", app.storage.sessions_dir().display());
    println!("logs:     {}", app.storage.logs_dir().display());
    println!("config:   {}", app.storage.config_file().display());
    println!();
    match app.config.to_toml() {
        Ok(toml) => print!("{toml}"),
        Err(details) => {
            return Err(BeaconError::ConfigMalformed {
                path: app.storage.config_file(),
                details,
            })
        }
    }
    Ok(true)
}
