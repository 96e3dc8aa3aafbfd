//! Time-bounded sample history for one tracked process

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp: Instant,
    pub value: f64,
}

/// Samples ordered oldest first. Entries older than `retention` relative to
/// the latest recorded instant are evicted, but only when a new sample is
/// recorded: a missed reading leaves history untouched.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    retention: Duration,
    max_samples: Option<usize>,
    samples: VecDeque<Sample>,
}

impl SampleWindow {
    pub fn new(retention: Duration) -> Self {
        Self {
            retention,
            max_samples: None,
            samples: VecDeque::new(),
        }
    }

    /// Hard cap on retained entries, oldest dropped first.
    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = Some(max_samples.max(1));
        self
    }

    pub fn record_if_present(&mut self, value: Option<f64>, now: Instant) {
        let Some(value) = value else {
            return;
        };

        // Concurrent passes may finish out of order; keep the buffer sorted.
        let at = self
            .samples
            .iter()
            .rposition(|s| s.timestamp <= now)
            .map_or(0, |i| i + 1);
        self.samples.insert(
            at,
            Sample {
                timestamp: now,
                value,
            },
        );
        self.evict(now);
    }

    fn evict(&mut self, now: Instant) {
        while let Some(oldest) = self.samples.front() {
            if now.saturating_duration_since(oldest.timestamp) > self.retention {
                self.samples.pop_front();
            } else {
                break;
            }
        }
        if let Some(cap) = self.max_samples {
            while self.samples.len() > cap {
                self.samples.pop_front();
            }
        }
    }

    pub fn current_values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.value).collect()
    }

    pub fn samples(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
