//! Process-table reader (backed by /proc on Linux)

mod linux;

pub use linux::LinuxProcessCollector;

use crate::error::ReadError;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    /// Argument vector, program first.
    pub cmdline: Vec<String>,
    /// Owning account name, or the numeric UID when it has no passwd entry.
    pub owner: String,
    /// User + system CPU time consumed so far, in seconds.
    pub cpu_seconds: f64,
    /// When `cpu_seconds` was read.
    pub sampled_at: Instant,
}

impl ProcessInfo {
    /// True when the first argument contains `command_substring` and the
    /// owner equals `owner_account` exactly.
    pub fn matches(&self, command_substring: &str, owner_account: &str) -> bool {
        self.owner == owner_account
            && self
                .cmdline
                .first()
                .is_some_and(|program| program.contains(command_substring))
    }

    /// Percentage of one CPU used between `earlier` and this reading of the
    /// same process. `None` when no time has passed between the two.
    pub fn cpu_percent_since(&self, earlier: &ProcessInfo) -> Option<f64> {
        let elapsed = self
            .sampled_at
            .checked_duration_since(earlier.sampled_at)?
            .as_secs_f64();
        if elapsed <= 0.0 {
            return None;
        }
        let used = (self.cpu_seconds - earlier.cpu_seconds).max(0.0);
        Some(used / elapsed * 100.0)
    }
}

pub trait ProcessCollector: Send + Sync {
    /// Every readable live process. Unreadable entries are skipped.
    fn list_processes(&self) -> Vec<ProcessInfo>;
    fn get_process(&self, pid: u32) -> Result<ProcessInfo, ReadError>;
}
