//! Finds the live CPU usage of a process by command substring and owner

use crate::collector::{ProcessCollector, ProcessInfo};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

#[async_trait]
pub trait ProcessLocator: Send + Sync {
    /// CPU percentage of the first process whose first argument contains
    /// `command_substring` and whose owner is `owner_account`, or `None`.
    async fn locate(&self, command_substring: &str, owner_account: &str) -> Option<f64>;
}

/// Locator over a [`ProcessCollector`].
///
/// Every reading is measured from two snapshots of the located PID taken
/// `baseline_interval` apart within the same call, so concurrent callers
/// and other scans of the table never disturb each other's baseline.
pub struct ProcTableLocator<C> {
    collector: Arc<C>,
    baseline_interval: Duration,
}

impl<C: ProcessCollector + 'static> ProcTableLocator<C> {
    pub fn new(collector: Arc<C>, baseline_interval: Duration) -> Self {
        Self {
            collector,
            baseline_interval,
        }
    }

    async fn candidates(&self, command_substring: &str, owner_account: &str) -> Vec<ProcessInfo> {
        let collector = Arc::clone(&self.collector);
        let command_substring = command_substring.to_string();
        let owner_account = owner_account.to_string();
        let scan = tokio::task::spawn_blocking(move || {
            collector
                .list_processes()
                .into_iter()
                .filter(|p| p.matches(&command_substring, &owner_account))
                .collect::<Vec<_>>()
        });
        match scan.await {
            Ok(matches) => matches,
            Err(e) => {
                warn!("Process table scan failed: {}", e);
                Vec::new()
            }
        }
    }

    /// CPU usage of `earlier.pid` from `earlier` to a fresh reading taken
    /// after `baseline_interval`. `None` if the PID vanished or was reused.
    async fn measure(
        &self,
        earlier: &ProcessInfo,
        command_substring: &str,
        owner_account: &str,
    ) -> Option<f64> {
        tokio::time::sleep(self.baseline_interval).await;
        let collector = Arc::clone(&self.collector);
        let pid = earlier.pid;
        let later = match tokio::task::spawn_blocking(move || collector.get_process(pid)).await {
            Ok(Ok(info)) => info,
            Ok(Err(e)) => {
                trace!("Re-read failed: {}", e);
                return None;
            }
            Err(e) => {
                warn!("Process re-read task failed: {}", e);
                return None;
            }
        };
        if !later.matches(command_substring, owner_account) {
            trace!(pid, "PID no longer matches, skipping");
            return None;
        }
        later.cpu_percent_since(earlier)
    }
}

#[async_trait]
impl<C: ProcessCollector + 'static> ProcessLocator for ProcTableLocator<C> {
    async fn locate(&self, command_substring: &str, owner_account: &str) -> Option<f64> {
        for candidate in self.candidates(command_substring, owner_account).await {
            debug!(
                pid = candidate.pid,
                "Measuring {} over {:?}",
                candidate.name,
                self.baseline_interval
            );
            let reading = self
                .measure(&candidate, command_substring, owner_account)
                .await;
            if reading.is_some() {
                return reading;
            }
        }
        None
    }
}
