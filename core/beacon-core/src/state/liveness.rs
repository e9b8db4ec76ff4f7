//! Liveness checks for session records.
//!
//! # PID Verification
//!
//! Operating systems reuse PIDs. A record with pid 12345 might refer to a
//! session that exited long ago while an unrelated process now owns that pid.
//! Records therefore carry the start time observed when the pid was first
//! recorded:
//!
//! 1. **Probe**: a zero signal to the pid. "Not permitted" still means the
//!    process exists.
//! 2. **Start time**: if the record has one, the pid's current start time must
//!    match within a tolerance. A mismatch means the pid was recycled.
//! 3. **No pid**: records from writers that never reported a pid are trusted
//!    while `last_activity` is within a freshness horizon.
//!
//! Nothing here mutates or deletes. Pruning lives in [`super::cleanup`].

use std::cell::RefCell;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::config::LivenessConfig;

use super::types::SessionRecord;

// Per-PID refresh keeps start-time lookups O(1) instead of scanning every process.
thread_local! {
    static SYSTEM_CACHE: RefCell<Option<sysinfo::System>> = const { RefCell::new(None) };
}

/// Result of asking the OS whether a pid exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Exists,
    /// Exists, but owned by someone we may not signal.
    Denied,
    Gone,
    /// Any other probe failure (raw errno).
    Failed(i32),
}

impl ProbeOutcome {
    pub fn is_present(self) -> bool {
        matches!(self, ProbeOutcome::Exists | ProbeOutcome::Denied)
    }
}

/// OS primitives the oracle depends on.
pub trait ProcessProbe {
    fn probe(&self, pid: u32) -> ProbeOutcome;

    /// Start time of `pid` in Unix seconds, if it can be determined.
    fn start_time(&self, pid: u32) -> Option<f64>;
}

/// Probe backed by `kill(pid, 0)` and sysinfo.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbe;

impl ProcessProbe for SystemProbe {
    fn probe(&self, pid: u32) -> ProbeOutcome {
        #[cfg(unix)]
        {
            // pid 0 and negative values address process groups, not a process.
            let raw = match i32::try_from(pid) {
                Ok(raw) if raw > 0 => raw,
                _ => return ProbeOutcome::Gone,
            };
            // SAFETY: signal 0 performs permission and existence checks only.
            #[allow(unsafe_code)]
            let rc = unsafe { libc::kill(raw, 0) };
            if rc == 0 {
                return ProbeOutcome::Exists;
            }
            match std::io::Error::last_os_error().raw_os_error() {
                Some(libc::EPERM) => ProbeOutcome::Denied,
                Some(libc::ESRCH) => ProbeOutcome::Gone,
                Some(code) => ProbeOutcome::Failed(code),
                None => ProbeOutcome::Failed(0),
            }
        }
        #[cfg(not(unix))]
        {
            if self.start_time(pid).is_some() {
                ProbeOutcome::Exists
            } else {
                ProbeOutcome::Gone
            }
        }
    }

    fn start_time(&self, pid: u32) -> Option<f64> {
        use sysinfo::{Pid, ProcessRefreshKind, System};

        SYSTEM_CACHE.with(|cache| {
            let mut cache = cache.borrow_mut();
            let sys = cache.get_or_insert_with(System::new);

            let sysinfo_pid = Pid::from(pid as usize);
            sys.refresh_process_specifics(sysinfo_pid, ProcessRefreshKind::new());

            sys.process(sysinfo_pid)
                .map(|process| process.start_time() as f64)
        })
    }
}

/// Why a record was judged alive or dead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Alive,
    /// The pid no longer exists (or probing failed outright).
    ProcessGone(ProbeOutcome),
    /// The pid exists but started at a different time.
    PidRecycled { recorded: f64, current: f64 },
    /// No pid and `last_activity` is past the horizon.
    Orphaned,
}

impl Verdict {
    pub fn is_alive(&self) -> bool {
        matches!(self, Verdict::Alive)
    }
}

pub struct LivenessOracle<P = SystemProbe> {
    probe: P,
    tolerance_secs: f64,
    no_pid_horizon: Duration,
}

impl LivenessOracle<SystemProbe> {
    /// Oracle over the real OS with default thresholds.
    pub fn system() -> Self {
        Self::new(SystemProbe)
    }
}

impl<P: ProcessProbe> LivenessOracle<P> {
    pub fn new(probe: P) -> Self {
        Self::from_config(probe, &LivenessConfig::default())
    }

    pub fn from_config(probe: P, config: &LivenessConfig) -> Self {
        Self {
            probe,
            tolerance_secs: config.start_time_tolerance_secs,
            no_pid_horizon: Duration::from_secs(config.no_pid_horizon_secs),
        }
    }

    pub fn with_tolerance(mut self, secs: f64) -> Self {
        self.tolerance_secs = secs;
        self
    }

    pub fn with_no_pid_horizon(mut self, horizon: Duration) -> Self {
        self.no_pid_horizon = horizon;
        self
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    pub fn is_alive(&self, record: &SessionRecord) -> bool {
        self.is_alive_at(record, Utc::now())
    }

    pub fn is_alive_at(&self, record: &SessionRecord, now: DateTime<Utc>) -> bool {
        self.verdict_at(record, now).is_alive()
    }

    pub fn verdict_at(&self, record: &SessionRecord, now: DateTime<Utc>) -> Verdict {
        let Some(pid) = record.pid else {
            // A last_activity in the future (clock skew) counts as fresh.
            let fresh = match now.signed_duration_since(record.last_activity).to_std() {
                Ok(age) => age <= self.no_pid_horizon,
                Err(_) => true,
            };
            return if fresh {
                Verdict::Alive
            } else {
                Verdict::Orphaned
            };
        };

        let outcome = self.probe.probe(pid);
        if !outcome.is_present() {
            return Verdict::ProcessGone(outcome);
        }

        let Some(recorded) = record.pid_start_time else {
            return Verdict::Alive;
        };
        // Existence without visibility: an unreadable start time cannot prove reuse.
        let Some(current) = self.probe.start_time(pid) else {
            return Verdict::Alive;
        };

        if (current - recorded).abs() > self.tolerance_secs {
            Verdict::PidRecycled { recorded, current }
        } else {
            Verdict::Alive
        }
    }
}
