//! User configuration loaded from `<root>/config.toml`.
//!
//! Every field has a default, so a missing file, a missing section, or a
//! missing key all fall back silently. A file that is not valid TOML is
//! reported once at `warn` and then ignored.
//!
//! ```toml
//! [editor]
//! process_name = "Cursor"
//! cli_command = "cursor"
//!
//! [reader]
//! poll_interval_ms = 2000
//!
//! [liveness]
//! start_time_tolerance_secs = 2.0
//! no_pid_horizon_secs = 14400
//! ```

use std::io;
use std::path::Path;
use std::time::Duration;

use fs_err as fs;
use serde::{Deserialize, Serialize};

use crate::error::{BeaconError, Result};
use crate::storage::StorageConfig;

/// Editor used to open a project when focusing a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Process name as shown by the OS (e.g. "Code", "Cursor").
    pub process_name: String,
    /// CLI command that opens a folder or workspace (e.g. "code", "cursor").
    pub cli_command: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            process_name: "Code".to_string(),
            cli_command: "code".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub poll_interval_ms: u64,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
        }
    }
}

impl ReaderConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    /// Allowed drift between recorded and observed pid start times.
    pub start_time_tolerance_secs: f64,
    /// How long a record without a pid is trusted after its last activity.
    pub no_pid_horizon_secs: u64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            start_time_tolerance_secs: 2.0,
            no_pid_horizon_secs: 4 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub editor: EditorConfig,
    pub reader: ReaderConfig,
    pub liveness: LivenessConfig,
}

impl Config {
    /// Loads `config.toml` under `storage`, falling back to defaults.
    pub fn load(storage: &StorageConfig) -> Config {
        let path = storage.config_file();
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Ignoring unusable config file");
                Config::default()
            }
        }
    }

    /// Strict variant of [`Config::load`]: a missing file is still `Ok(default)`.
    pub fn load_from(path: &Path) -> Result<Config> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Config::default()),
            Err(source) => {
                return Err(BeaconError::Io {
                    context: "reading config file".to_string(),
                    source,
                })
            }
        };
        Self::from_toml(&contents).map_err(|details| BeaconError::ConfigMalformed {
            path: path.to_path_buf(),
            details,
        })
    }

    pub fn from_toml(toml_str: &str) -> std::result::Result<Config, String> {
        toml::from_str(toml_str).map_err(|e| e.to_string())
    }

    pub fn to_toml(&self) -> std::result::Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| e.to_string())
    }
}
