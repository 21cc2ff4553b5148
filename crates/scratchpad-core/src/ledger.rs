//! Performance ledger
//!
//! Capped FIFO window of operation samples plus running totals.

use crate::types::OperationKind;
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

/// Default window size
pub const DEFAULT_LEDGER_CAPACITY: usize = 100;

/// One recorded operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationSample {
    /// Operation kind
    pub kind: OperationKind,
    /// Wall time spent
    pub duration: Duration,
    /// Whether the operation succeeded
    pub success: bool,
}

/// Per-kind figures over the current window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KindSummary {
    /// Samples in window
    pub count: usize,
    /// Failed samples in window
    pub failures: usize,
    /// Mean duration in window
    pub average_latency: Option<Duration>,
}

/// Aggregate figures derived from the ledger
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceSummary {
    /// Operations recorded since creation
    pub total_operations: u64,
    /// Failed operations since creation
    pub failed_operations: u64,
    /// `failed_operations / total_operations`, 0 when empty
    pub error_rate: f64,
    /// Mean duration over the window
    pub average_latency: Option<Duration>,
    /// Samples currently in the window
    pub window_len: usize,
    /// Per-kind breakdown over the window
    pub per_kind: BTreeMap<OperationKind, KindSummary>,
}

/// Sliding window of operation durations
#[derive(Debug, Clone)]
pub struct PerformanceLedger {
    capacity: usize,
    samples: VecDeque<OperationSample>,
    total: u64,
    failed: u64,
}

impl PerformanceLedger {
    /// Create ledger keeping at most `capacity` samples
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
            total: 0,
            failed: 0,
        }
    }

    /// Append a sample, evicting the oldest once the window is full
    pub fn record(&mut self, kind: OperationKind, duration: Duration, success: bool) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(OperationSample {
            kind,
            duration,
            success,
        });
        self.total += 1;
        if !success {
            self.failed += 1;
        }

        let outcome = if success { "success" } else { "failure" };
        metrics::counter!("scratchpad_operations_total", "kind" => kind.as_str(), "outcome" => outcome)
            .increment(1);
        metrics::histogram!("scratchpad_operation_duration_ms", "kind" => kind.as_str())
            .record(duration.as_secs_f64() * 1_000.0);
    }

    /// Window size
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples currently in the window
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether nothing was recorded yet
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Operations recorded since creation
    #[inline]
    #[must_use]
    pub fn total_operations(&self) -> u64 {
        self.total
    }

    /// Failed operations since creation
    #[inline]
    #[must_use]
    pub fn failed_operations(&self) -> u64 {
        self.failed
    }

    /// Failure ratio over all recorded operations
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn error_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.failed as f64 / self.total as f64
    }

    /// Mean duration over the window
    #[must_use]
    pub fn average_latency(&self) -> Option<Duration> {
        mean(self.samples.iter().map(|s| s.duration))
    }

    /// Samples oldest first
    pub fn samples(&self) -> impl Iterator<Item = &OperationSample> {
        self.samples.iter()
    }

    /// Derived figures
    #[must_use]
    pub fn summary(&self) -> PerformanceSummary {
        let mut per_kind: BTreeMap<OperationKind, (usize, usize, Duration)> = BTreeMap::new();
        for sample in &self.samples {
            let entry = per_kind.entry(sample.kind).or_default();
            entry.0 += 1;
            if !sample.success {
                entry.1 += 1;
            }
            entry.2 += sample.duration;
        }

        PerformanceSummary {
            total_operations: self.total,
            failed_operations: self.failed,
            error_rate: self.error_rate(),
            average_latency: self.average_latency(),
            window_len: self.samples.len(),
            per_kind: per_kind
                .into_iter()
                .map(|(kind, (count, failures, sum))| {
                    let average_latency = u32::try_from(count)
                        .ok()
                        .filter(|n| *n > 0)
                        .map(|n| sum / n);
                    (
                        kind,
                        KindSummary {
                            count,
                            failures,
                            average_latency,
                        },
                    )
                })
                .collect(),
        }
    }

    /// Drop all samples and totals
    pub fn clear(&mut self) {
        self.samples.clear();
        self.total = 0;
        self.failed = 0;
    }
}

impl Default for PerformanceLedger {
    fn default() -> Self {
        Self::new(DEFAULT_LEDGER_CAPACITY)
    }
}

fn mean(durations: impl ExactSizeIterator<Item = Duration>) -> Option<Duration> {
    let count = u32::try_from(durations.len()).ok().filter(|n| *n > 0)?;
    Some(durations.sum::<Duration>() / count)
}
