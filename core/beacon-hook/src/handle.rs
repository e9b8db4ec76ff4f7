//! Event handler for coding-assistant hooks.
//!
//! Reads one event as JSON from stdin, runs the status transition, and
//! persists the session record under the hook's identity key.
//!
//! ## Identity
//!
//! The hook is spawned by the tool process, so the parent pid identifies the
//! session for as long as that process lives. The key is that pid; a resumed
//! conversation in the same process reuses the key and adopts the new
//! session id. Without a pid the sanitized session id is the key.
//!
//! ## State Machine
//!
//! ```text
//! SessionStart                      → idle
//! UserPromptSubmit/PreToolUse/Post  → working
//! Stop                              → idle
//! Notification (idle_prompt)        → waiting_input
//! PermissionRequest                 → waiting_permission
//! PreCompact                        → compacting
//! Notification (other kinds)        → unchanged
//! SessionEnd / unrecognized         → nothing written
//! ```

use std::env;
use std::io::{self, Read};
use std::path::Path;
use std::sync::mpsc;
use std::time::Duration;

use beacon_core::state::cleanup::prune_project;
use beacon_core::state::{next_status, remove_superseded, sanitize_key, Verdict};
use beacon_core::{
    git, BeaconError, HookEvent, LivenessOracle, ProcessProbe, SessionRecord, SessionStore,
    StorageConfig, Status, TerminalInfo,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

/// Upper bound on waiting for the host to close stdin.
const STDIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum length for extracted tool detail strings.
const MAX_TOOL_DETAIL_LEN: usize = 120;

#[derive(Debug, thiserror::Error)]
pub enum HandleError {
    #[error("Failed to read stdin: {0}")]
    Stdin(#[source] io::Error),

    #[error("Timed out waiting for stdin after {0:?}")]
    StdinTimeout(Duration),

    #[error("Failed to parse hook input: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] BeaconError),
}

/// Hook payload. Only `session_id`, `cwd`, and `hook_event_name` are always present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HookInput {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub cwd: String,
    #[serde(default)]
    pub hook_event_name: String,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_input: Option<Value>,
    #[serde(default)]
    pub notification_type: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub trigger: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub session_name: Option<String>,
    #[serde(default)]
    pub workspace_file: Option<String>,
    #[serde(default)]
    pub transcript_path: Option<String>,
    #[serde(default)]
    pub permission_mode: Option<String>,
}

impl HookInput {
    pub fn event(&self, hook_name: Option<&str>) -> HookEvent {
        HookEvent::parse(
            hook_name.unwrap_or(&self.hook_event_name),
            self.notification_type.as_deref(),
        )
    }

    fn tool_detail(&self) -> Option<String> {
        let tool = self.tool_name.as_deref()?;
        extract_tool_detail(tool, self.tool_input.as_ref()?)
    }
}

/// Everything a handled event depends on besides the payload.
pub struct HookContext<P> {
    pub store: SessionStore,
    pub oracle: LivenessOracle<P>,
    /// Pid of the hosting tool process.
    pub pid: Option<u32>,
    pub terminal: Option<TerminalInfo>,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Event carries nothing to persist.
    Skipped,
    Written {
        key: String,
        old: Option<Status>,
        new: Status,
        preserved: bool,
    },
}

pub fn run(hook_name: Option<&str>) -> Result<Outcome, HandleError> {
    let input = read_stdin(STDIN_TIMEOUT)?;
    if input.trim().is_empty() {
        tracing::debug!("Empty stdin; nothing to do");
        return Ok(Outcome::Skipped);
    }
    let hook_input: HookInput = serde_json::from_str(&input)?;

    let storage = StorageConfig::from_env()?;
    let config = beacon_core::Config::load(&storage);
    let ctx = HookContext {
        store: SessionStore::from_storage(&storage),
        oracle: LivenessOracle::from_config(beacon_core::SystemProbe, &config.liveness),
        pid: get_ppid(),
        terminal: capture_terminal_info(),
        now: Utc::now(),
    };

    let event = hook_input.event(hook_name);
    Ok(handle_hook_input(&hook_input, event, &ctx)?)
}

fn read_stdin(timeout: Duration) -> Result<String, HandleError> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let mut buf = String::new();
        let result = io::stdin().read_to_string(&mut buf).map(|_| buf);
        let _ = tx.send(result);
    });
    match rx.recv_timeout(timeout) {
        Ok(Ok(buf)) => Ok(buf),
        Ok(Err(e)) => Err(HandleError::Stdin(e)),
        Err(_) => Err(HandleError::StdinTimeout(timeout)),
    }
}

pub fn handle_hook_input<P: ProcessProbe>(
    input: &HookInput,
    event: HookEvent,
    ctx: &HookContext<P>,
) -> Result<Outcome, BeaconError> {
    if !event.writes_record() {
        tracing::debug!(event = %event, session = %input.session_id, "Event writes nothing");
        return Ok(Outcome::Skipped);
    }

    // The session id is only required when it has to serve as the key.
    let session_id = sanitize_key(&input.session_id).ok();
    let key = match (ctx.pid, &session_id) {
        (Some(pid), _) => pid.to_string(),
        (None, Some(id)) => id.clone(),
        (None, None) => return Err(BeaconError::InvalidKey(input.session_id.clone())),
    };

    let branch = git::current_branch(Path::new(&input.cwd));
    let existing = load_existing(ctx, &key);
    let old = existing.as_ref().map(|r| r.status);
    let mut record = existing.unwrap_or_else(|| {
        let id = session_id.clone().unwrap_or_else(|| key.clone());
        SessionRecord::new(id, &input.cwd, &branch, ctx.now)
    });

    if let Some(pid) = ctx.pid {
        if record.pid != Some(pid) {
            let start_time = ctx.oracle.probe().start_time(pid);
            record.attach_pid(pid, start_time);
        }
    }

    match &session_id {
        Some(id) if record.session_id != *id => {
            tracing::debug!(key = %key, from = %record.session_id, to = %id, "Adopting new session id");
            record.session_id = id.clone();
            if event == HookEvent::SessionStart {
                record.started_at = ctx.now;
                record.last_prompt = None;
            }
        }
        Some(_) => {}
        None => {
            tracing::warn!(key = %key, raw = %input.session_id, "Unusable session id; keeping stored id");
        }
    }

    let transition = next_status(event);
    record.status = transition.apply(record.status);

    record.last_activity = ctx.now;
    record.branch = branch;
    if ctx.terminal.is_some() {
        record.terminal = ctx.terminal.clone();
    }
    if !input.cwd.is_empty() && record.project_path != input.cwd {
        record.project_path = input.cwd.clone();
        record.project_name = beacon_core::state::extract_project_name(&input.cwd);
    }
    for (slot, value) in [
        (&mut record.session_name, &input.session_name),
        (&mut record.workspace_file, &input.workspace_file),
    ] {
        if value.is_some() {
            slot.clone_from(value);
        }
    }

    apply_side_effects(&mut record, event, input);

    put_with_retry(&ctx.store, &key, &record)?;

    tracing::info!(
        event = %event,
        key = %key,
        session = %record.session_id,
        old = old.map(|s| s.as_str()).unwrap_or("none"),
        new = record.status.as_str(),
        preserved = transition.is_noop(),
        permission_mode = input.permission_mode.as_deref().unwrap_or(""),
        transcript = input.transcript_path.as_deref().unwrap_or(""),
        "Session updated"
    );

    if event == HookEvent::SessionStart {
        let superseded = match &session_id {
            Some(id) => remove_superseded(&ctx.store, id, &key),
            None => Default::default(),
        };
        let pruned = prune_project(&ctx.store, &ctx.oracle, &input.cwd, &key, ctx.now);
        if superseded.removed + pruned.removed > 0 {
            tracing::debug!(
                superseded = superseded.removed,
                pruned = pruned.removed,
                "Cleaned up records on session start"
            );
        }
    }

    Ok(Outcome::Written {
        key,
        old,
        new: record.status,
        preserved: transition.is_noop(),
    })
}

/// Current record at `key`, unless it belongs to an earlier owner of a recycled pid.
fn load_existing<P: ProcessProbe>(ctx: &HookContext<P>, key: &str) -> Option<SessionRecord> {
    match ctx.store.get(key) {
        Ok(Some(record)) => {
            if let Verdict::PidRecycled { recorded, current } =
                ctx.oracle.verdict_at(&record, ctx.now)
            {
                tracing::info!(key, recorded, current, "Discarding record from recycled pid");
                return None;
            }
            Some(record)
        }
        Ok(None) => None,
        Err(err) => {
            tracing::warn!(key, error = %err, "Replacing unreadable session record");
            None
        }
    }
}

fn apply_side_effects(record: &mut SessionRecord, event: HookEvent, input: &HookInput) {
    match event {
        HookEvent::SessionStart => {
            record.clear_transient();
            if input.source.is_some() {
                record.source.clone_from(&input.source);
            }
        }
        HookEvent::UserPromptSubmit => {
            record.clear_transient();
            if input.prompt.is_some() {
                record.last_prompt.clone_from(&input.prompt);
            }
        }
        HookEvent::PreToolUse => {
            if let Some(tool) = &input.tool_name {
                record.last_tool = Some(tool.clone());
                record.last_tool_detail = input.tool_detail();
            }
        }
        HookEvent::PermissionRequest => {
            record.notification_message = input.title.clone().or_else(|| {
                input.tool_name.as_ref().map(|tool| match input.tool_detail() {
                    Some(detail) => format!("{tool}: {detail}"),
                    None => tool.clone(),
                })
            });
            record.clear_tool();
        }
        HookEvent::Notification(_) => {
            record.clear_tool();
            if input.message.is_some() {
                record.notification_message.clone_from(&input.message);
            }
        }
        HookEvent::Stop => record.clear_transient(),
        HookEvent::PreCompact => {
            tracing::debug!(trigger = input.trigger.as_deref().unwrap_or("unknown"), "Compacting");
        }
        HookEvent::PostToolUse | HookEvent::SessionEnd | HookEvent::Unknown => {}
    }
}

/// One retry, then the update is dropped by the caller.
fn put_with_retry(store: &SessionStore, key: &str, record: &SessionRecord) -> Result<(), BeaconError> {
    match store.put(key, record) {
        Ok(()) => Ok(()),
        Err(first) => {
            tracing::warn!(key, error = %first, "Session write failed; retrying once");
            store.put(key, record)
        }
    }
}

/// Most relevant field of `tool_input` for display, capped in length.
pub fn extract_tool_detail(tool_name: &str, tool_input: &Value) -> Option<String> {
    let field = match tool_name {
        "Bash" => "command",
        "Edit" | "Write" | "Read" => "file_path",
        "Grep" | "Glob" => "pattern",
        "WebFetch" => "url",
        "WebSearch" => "query",
        "Task" => "description",
        _ => return None,
    };

    let value = tool_input.get(field)?.as_str()?;
    if value.is_empty() {
        return None;
    }

    if value.chars().count() > MAX_TOOL_DETAIL_LEN {
        let truncated: String = value.chars().take(MAX_TOOL_DETAIL_LEN - 3).collect();
        Some(format!("{truncated}..."))
    } else {
        Some(value.to_string())
    }
}

/// Hosting terminal as described by the environment, if any.
pub fn capture_terminal_info() -> Option<TerminalInfo> {
    terminal_info_from(|name| env::var(name).ok().filter(|v| !v.is_empty()))
}

fn terminal_info_from(lookup: impl Fn(&str) -> Option<String>) -> Option<TerminalInfo> {
    let program = lookup("TERM_PROGRAM");
    let session_id = lookup("ITERM_SESSION_ID").or_else(|| lookup("KITTY_WINDOW_ID"));
    let tty = lookup("TTY");
    if program.is_none() && session_id.is_none() && tty.is_none() {
        return None;
    }
    Some(TerminalInfo {
        program: program.unwrap_or_default(),
        session_id,
        tty,
    })
}

fn get_ppid() -> Option<u32> {
    #[cfg(unix)]
    {
        // SAFETY: getppid() is a simple syscall that returns the parent process ID.
        // It has no failure modes and always returns a valid PID (1 if parent exited).
        #[allow(unsafe_code)]
        Some(unsafe { libc::getppid() } as u32)
    }
    #[cfg(not(unix))]
    {
        None
    }
}
