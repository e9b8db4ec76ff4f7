//! beacon-hook: hook handler that records coding-assistant session status.
//!
//! Called directly by the assistant's hook configuration, once per event, with
//! the event payload as JSON on stdin. Each invocation updates one session
//! record in the Beacon store and exits.
//!
//! ## Subcommands
//!
//! - `handle`: Main hook handler, reads JSON from stdin
//!
//! The process always exits 0: a failing hook must never block the host tool,
//! so problems only reach the log file.

mod handle;
mod logging;

use beacon_core::StorageConfig;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "beacon-hook")]
#[command(about = "Beacon session state recorder")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Handle a hook event (reads JSON from stdin)
    Handle {
        /// Hook name to use instead of the payload's `hook_event_name`
        #[arg(value_name = "HOOK")]
        hook_name: Option<String>,
    },
}

fn main() {
    let _logging_guard = StorageConfig::from_env()
        .ok()
        .and_then(|storage| logging::init(&storage));
    let cli = Cli::parse();

    match cli.command {
        Commands::Handle { hook_name } => match handle::run(hook_name.as_deref()) {
            Ok(outcome) => tracing::debug!(?outcome, "beacon-hook handle finished"),
            Err(e) => tracing::error!(error = %e, "beacon-hook handle failed"),
        },
    }
}
