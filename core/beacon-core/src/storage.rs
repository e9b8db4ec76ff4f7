//! Storage configuration and path management for Beacon.
//!
//! Every component that touches disk takes a `StorageConfig` instead of
//! computing paths on its own. Production code resolves the root from the
//! home directory (or the `BEACON_SESSIONS_DIR` override); tests point it at
//! a temp directory with [`StorageConfig::with_root`].
//!
//! ```text
//! ~/.beacon/
//! ├── config.toml      # optional user configuration
//! ├── sessions/        # one `<key>.json` per live session
//! └── logs/            # hook log files (daily rolling)
//! ```

use std::path::{Path, PathBuf};

use crate::error::{BeaconError, Result};

/// Environment variable that relocates the session store (test isolation).
pub const SESSIONS_DIR_ENV: &str = "BEACON_SESSIONS_DIR";

/// Central configuration for all Beacon storage paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Root directory for all Beacon data (default: ~/.beacon)
    root: PathBuf,
    /// Explicit session store location, when overridden.
    sessions_override: Option<PathBuf>,
}

impl StorageConfig {
    /// Resolves the default root under the user's home directory.
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir().ok_or(BeaconError::HomeDirNotFound)?;
        Ok(Self::with_root(home.join(".beacon")))
    }

    /// Creates a StorageConfig with a custom root directory.
    /// Used for testing with temp directories.
    pub fn with_root(root: PathBuf) -> Self {
        Self {
            root,
            sessions_override: None,
        }
    }

    /// Like [`StorageConfig::new`], but honors `BEACON_SESSIONS_DIR`.
    ///
    /// When the override is set the store lives exactly there. Logs and
    /// configuration move next to it so an isolated run never touches the
    /// real home directory.
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(SESSIONS_DIR_ENV) {
            Some(dir) if !dir.is_empty() => Ok(Self::with_sessions_dir(PathBuf::from(dir))),
            _ => Self::new(),
        }
    }

    /// Pins the session store to `dir`; the root becomes its parent.
    pub fn with_sessions_dir(dir: PathBuf) -> Self {
        let root = dir
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| dir.clone());
        Self {
            root,
            sessions_override: Some(dir),
        }
    }

    /// Returns the root directory for Beacon data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Directories
    // ─────────────────────────────────────────────────────────────────────────────

    /// Path to sessions/ directory (one record file per identity key).
    pub fn sessions_dir(&self) -> PathBuf {
        self.sessions_override
            .clone()
            .unwrap_or_else(|| self.root.join("sessions"))
    }

    /// Path to logs/ directory (hook diagnostics).
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Files
    // ─────────────────────────────────────────────────────────────────────────────

    /// Path to config.toml (user preferences).
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }
}
