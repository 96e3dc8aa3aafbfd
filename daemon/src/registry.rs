//! Per-identity sample windows and the per-request sampling pass

use crate::config::Config;
use crate::identity::TrackedIdentity;
use crate::locator::ProcessLocator;
use crate::stats::{reduce, StatsResult};
use crate::window::SampleWindow;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

/// How a request turns locator readings into statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SamplingStrategy {
    /// One reading per identity per request, merged into a window shared
    /// across requests and reported over the trailing `retention`.
    Passive { retention: Duration },
    /// The request samples every `interval` for `duration` and reports on
    /// those readings alone. Nothing is kept between requests.
    Active { interval: Duration, duration: Duration },
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum ProcessReport {
    Stats(StatsResult),
    NotFound { error: String },
}

impl ProcessReport {
    fn not_found(identity: &TrackedIdentity) -> Self {
        ProcessReport::NotFound {
            error: identity.not_found_message(),
        }
    }

    pub fn stats(&self) -> Option<&StatsResult> {
        match self {
            ProcessReport::Stats(stats) => Some(stats),
            ProcessReport::NotFound { .. } => None,
        }
    }
}

/// One entry per tracked identity, in configured order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateReport {
    entries: Vec<(String, ProcessReport)>,
}

impl AggregateReport {
    fn push(&mut self, key: String, report: ProcessReport) {
        self.entries.push((key, report));
    }

    pub fn get(&self, key: &str) -> Option<&ProcessReport> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, r)| r)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ProcessReport)> {
        self.entries.iter().map(|(k, r)| (k.as_str(), r))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for AggregateReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, report) in &self.entries {
            map.serialize_entry(key, report)?;
        }
        map.end()
    }
}

pub struct TrackerRegistry {
    locator: Arc<dyn ProcessLocator>,
    identities: Vec<TrackedIdentity>,
    /// One shared window per identity under the passive strategy, empty
    /// under the active one.
    windows: Vec<Mutex<SampleWindow>>,
    strategy: SamplingStrategy,
    max_samples: Option<usize>,
}

impl TrackerRegistry {
    pub fn new(
        identities: Vec<TrackedIdentity>,
        locator: Arc<dyn ProcessLocator>,
        strategy: SamplingStrategy,
    ) -> Self {
        Self::build(identities, locator, strategy, None)
    }

    pub fn from_config(config: &Config, locator: Arc<dyn ProcessLocator>) -> Self {
        Self::build(
            config.targets.clone(),
            locator,
            config.sampling_strategy(),
            Some(config.sampling.max_samples),
        )
    }

    fn build(
        identities: Vec<TrackedIdentity>,
        locator: Arc<dyn ProcessLocator>,
        strategy: SamplingStrategy,
        max_samples: Option<usize>,
    ) -> Self {
        let windows = match strategy {
            SamplingStrategy::Passive { retention } => identities
                .iter()
                .map(|_| Mutex::new(new_window(retention, max_samples)))
                .collect(),
            SamplingStrategy::Active { .. } => Vec::new(),
        };
        Self {
            locator,
            identities,
            windows,
            strategy,
            max_samples,
        }
    }

    pub fn strategy(&self) -> SamplingStrategy {
        self.strategy
    }

    pub fn identities(&self) -> impl Iterator<Item = &TrackedIdentity> {
        self.identities.iter()
    }

    /// Number of samples held across requests for `display_name`. `None`
    /// for an unknown name or when the strategy keeps no shared window.
    pub async fn window_len(&self, display_name: &str) -> Option<usize> {
        let index = self
            .identities
            .iter()
            .position(|identity| identity.display_name == display_name)?;
        Some(self.windows.get(index)?.lock().await.len())
    }

    /// Run one sampling pass (or loop, for the active strategy) and reduce.
    pub async fn sample_and_report(&self) -> AggregateReport {
        let report = match self.strategy {
            SamplingStrategy::Passive { .. } => self.sample_passive().await,
            SamplingStrategy::Active { interval, duration } => {
                self.sample_active(interval, duration).await
            }
        };
        let found = report.iter().filter(|(_, r)| r.stats().is_some()).count();
        info!(
            "Sampling pass complete: {}/{} processes found",
            found,
            report.len()
        );
        report
    }

    async fn sample_passive(&self) -> AggregateReport {
        let mut report = AggregateReport::default();
        for (identity, window) in self.identities.iter().zip(&self.windows) {
            let now = Instant::now();
            let reading = self
                .locator
                .locate(&identity.command_substring, &identity.owner_account)
                .await;
            debug!(process = %identity.display_name, ?reading, "Sampled");

            let entry = match reading {
                Some(value) => {
                    let values = {
                        let mut window = window.lock().await;
                        window.record_if_present(Some(value), now);
                        window.current_values()
                    };
                    ProcessReport::Stats(
                        reduce(&values).unwrap_or_else(|| StatsResult::single(value)),
                    )
                }
                None => ProcessReport::not_found(identity),
            };
            report.push(identity.report_key(), entry);
        }
        report
    }

    async fn sample_active(&self, interval: Duration, duration: Duration) -> AggregateReport {
        let mut windows: Vec<SampleWindow> = self
            .identities
            .iter()
            .map(|_| new_window(duration, self.max_samples))
            .collect();

        let start = Instant::now();
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if start.elapsed() >= duration {
                break;
            }
            for (identity, window) in self.identities.iter().zip(windows.iter_mut()) {
                let now = Instant::now();
                let reading = self
                    .locator
                    .locate(&identity.command_substring, &identity.owner_account)
                    .await;
                debug!(process = %identity.display_name, ?reading, "Sampled");
                window.record_if_present(reading, now);
            }
        }

        let mut report = AggregateReport::default();
        for (identity, window) in self.identities.iter().zip(&windows) {
            let entry = match reduce(&window.current_values()) {
                Some(stats) => ProcessReport::Stats(stats),
                None => ProcessReport::not_found(identity),
            };
            report.push(identity.report_key(), entry);
        }
        report
    }
}

fn new_window(retention: Duration, max_samples: Option<usize>) -> SampleWindow {
    let window = SampleWindow::new(retention);
    match max_samples {
        Some(cap) => window.with_max_samples(cap),
        None => window,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Fixed(Option<f64>);

    #[async_trait]
    impl ProcessLocator for Fixed {
        async fn locate(&self, _: &str, _: &str) -> Option<f64> {
            self.0
        }
    }

    #[test]
    fn report_serializes_in_configured_order() {
        let mut report = AggregateReport::default();
        report.push(
            "zeta_cpu_percent".to_string(),
            ProcessReport::NotFound {
                error: "Zeta process not found".to_string(),
            },
        );
        report.push(
            "alpha_cpu_percent".to_string(),
            ProcessReport::Stats(StatsResult::single(1.5)),
        );
        let json = serde_json::to_string(&report).unwrap();
        assert_eq!(
            json,
            r#"{"zeta_cpu_percent":{"error":"Zeta process not found"},"alpha_cpu_percent":{"high":1.5,"average":1.5,"low":1.5,"median":1.5}}"#
        );
    }

    #[tokio::test]
    async fn empty_registry_reports_nothing() {
        let registry = TrackerRegistry::new(
            vec![],
            Arc::new(Fixed(Some(1.0))),
            SamplingStrategy::Passive {
                retention: Duration::from_secs(30),
            },
        );
        assert!(registry.sample_and_report().await.is_empty());
    }

    #[test]
    fn shared_windows_only_for_passive() {
        let identities = vec![
            TrackedIdentity::new("gamma", "gamma", "gamma"),
            TrackedIdentity::new("delta", "delta", "delta"),
        ];
        let passive = TrackerRegistry::new(
            identities.clone(),
            Arc::new(Fixed(None)),
            SamplingStrategy::Passive {
                retention: Duration::from_secs(30),
            },
        );
        assert_eq!(passive.windows.len(), 2);

        let active = TrackerRegistry::new(
            identities,
            Arc::new(Fixed(None)),
            SamplingStrategy::Active {
                interval: Duration::from_secs(1),
                duration: Duration::from_secs(30),
            },
        );
        assert!(active.windows.is_empty());
        assert_eq!(active.identities().count(), 2);
        assert!(matches!(active.strategy(), SamplingStrategy::Active { .. }));
    }

    #[tokio::test]
    async fn missed_reading_keeps_history() {
        let registry = TrackerRegistry::new(
            vec![TrackedIdentity::new("gamma", "gamma", "gamma")],
            Arc::new(Fixed(None)),
            SamplingStrategy::Passive {
                retention: Duration::from_secs(30),
            },
        );
        registry.windows[0]
            .lock()
            .await
            .record_if_present(Some(4.0), Instant::now());
        let report = registry.sample_and_report().await;
        assert_eq!(
            report.get("gamma_cpu_percent"),
            Some(&ProcessReport::NotFound {
                error: "Gamma process not found".to_string()
            })
        );
        assert_eq!(registry.window_len("gamma").await, Some(1));
    }
}
