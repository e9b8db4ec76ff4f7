//! # beacon-core
//!
//! Shared coordination layer for Beacon: hook writers record live
//! coding-assistant session status into a directory, and any number of
//! readers display it.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency. Clients can wrap with async if needed.
//! - **No shared process state**: Every component takes an explicit
//!   [`StorageConfig`] or [`SessionStore`]; tests point them at temp directories.
//! - **Graceful degradation**: A missing store or a corrupt record shortens the
//!   session list; it never fails a reader.
//! - **Writers own their key**: Each hook process writes exactly one identity
//!   key; last write wins via atomic rename.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use beacon_core::{LivenessOracle, SessionReader, SessionStore, StorageConfig};
//!
//! let storage = StorageConfig::from_env()?;
//! let reader = SessionReader::new(SessionStore::from_storage(&storage), LivenessOracle::system());
//! for session in reader.load() {
//!     println!("{} {}", session.project_name, session.status);
//! }
//! ```

pub mod config;
pub mod error;
pub mod focus;
pub mod git;
pub mod host;
pub mod sessions;
pub mod state;
pub mod storage;
pub mod watcher;

pub use config::{Config, EditorConfig, LivenessConfig, ReaderConfig};
pub use error::{BeaconError, Result};
pub use focus::{focus_detached, EditorFocuser, Focuser};
pub use host::HostKind;
pub use sessions::*;
pub use state::{
    HookEvent, LivenessOracle, NotificationKind, ProbeOutcome, ProcessProbe, PruneStats,
    SessionRecord, SessionStore, Status, SystemProbe, TerminalInfo, Transition,
};
pub use storage::StorageConfig;
pub use watcher::{SessionPoller, SessionWatcher};
