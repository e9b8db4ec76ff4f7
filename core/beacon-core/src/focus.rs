//! Focus seam: bring a session's host window forward.
//!
//! Raising a specific terminal tab is platform automation and stays outside
//! this crate. What lives here is the trait readers call and one portable
//! implementation that reopens the project through the configured editor CLI.
//! Focusing never reads or writes the session store.

use std::process::Command;
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::config::EditorConfig;
use crate::error::{BeaconError, Result};
use crate::host::HostKind;
use crate::state::SessionRecord;

pub trait Focuser: Send + Sync {
    fn focus(&self, record: &SessionRecord) -> Result<()>;
}

/// Reopens the workspace file (or project folder) with the editor CLI.
#[derive(Debug, Clone)]
pub struct EditorFocuser {
    editor: EditorConfig,
}

impl EditorFocuser {
    pub fn new(editor: EditorConfig) -> Self {
        Self { editor }
    }

    /// Command that would be run for `record`, or why there is none.
    pub fn command_for(&self, record: &SessionRecord) -> Result<Command> {
        let program = record
            .terminal
            .as_ref()
            .map(|t| t.program.as_str())
            .unwrap_or_default();
        let host = HostKind::classify(program);
        if !host.is_editor() {
            return Err(BeaconError::UnsupportedHost(if program.is_empty() {
                host.to_string()
            } else {
                program.to_string()
            }));
        }

        let target = record
            .workspace_file
            .as_deref()
            .unwrap_or(&record.project_path);
        let mut command = Command::new(&self.editor.cli_command);
        command.arg(target);
        Ok(command)
    }
}

impl Focuser for EditorFocuser {
    fn focus(&self, record: &SessionRecord) -> Result<()> {
        let mut command = self.command_for(record)?;
        let rendered = format!("{command:?}");
        let output = command.output().map_err(|e| BeaconError::CommandFailed {
            command: rendered.clone(),
            details: e.to_string(),
        })?;
        if !output.status.success() {
            return Err(BeaconError::CommandFailed {
                command: rendered,
                details: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// Runs `focuser` on a background thread. Failures are logged and dropped.
pub fn focus_detached(focuser: Arc<dyn Focuser>, record: SessionRecord) -> JoinHandle<()> {
    std::thread::spawn(move || {
        if let Err(err) = focuser.focus(&record) {
            tracing::warn!(session = %record.session_id, error = %err, "Focus failed");
        }
    })
}
