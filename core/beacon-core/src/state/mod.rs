//! Session state coordination.
//!
//! Writers (one hook process per tool event) and readers (CLI, menubar,
//! launcher) share nothing but a directory. There is no daemon, socket, or
//! lock; correctness rests on rename atomicity and tolerant reads.
//!
//! ```text
//! tool event → transition → SessionRecord → SessionStore::put (tmp + rename)
//!                                                  │
//!            UI ← sessions::SessionReader ← LivenessOracle ← SessionStore::list
//! ```
//!
//! # Module Structure
//!
//! - [`types`]: the record codec and `Status` with forward-compatible decoding
//! - [`store`]: one JSON file per identity key, atomic writes, tolerant listing
//! - [`liveness`]: pid probe plus start-time check against pid reuse
//! - [`transition`]: pure event → status table run inside each writer
//! - [`cleanup`]: optional delete-if-dead maintenance

pub mod cleanup;
pub mod liveness;
pub mod store;
pub mod transition;
pub mod types;

#[cfg(test)]
mod integration_tests;

pub use cleanup::{prune_dead, remove_stale, remove_superseded, PruneStats};
pub use liveness::{LivenessOracle, ProbeOutcome, ProcessProbe, SystemProbe, Verdict};
pub use store::{sanitize_key, SessionStore, StagedWrite};
pub use transition::{dot_diagram, next_status, HookEvent, NotificationKind, Transition};
pub use types::{extract_project_name, SessionRecord, Status, TerminalInfo};
