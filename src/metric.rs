//! Metric records and run-level aggregation.
//!
//! The [`MetricAggregator`] accumulates per-host outcome counts across the
//! run. At run end it folds them into one [`RunSummary`], a batch of
//! [`Metric`] points (six `task.*` metrics per processed host plus one
//! host-less `elapsed_time`), and the completion [`Event`].

use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::event::{pluralize, AlertType, Event, EventCategory, EventFactory};
use crate::outcome::{Outcome, OutcomeStatus};
use crate::timeline::RunContext;

/// Metric name for the run's wall-clock duration.
pub const ELAPSED_TIME_METRIC: &str = "elapsed_time";

/// Per-host summaries as delivered by a host runtime's final stats object.
pub type HostSummaries = IndexMap<String, HostCounts>;

// ============================================================================
// Metric Record
// ============================================================================

/// A named numeric telemetry point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metric {
    /// Metric name; per-host task counts are namespaced `task.<bucket>`.
    pub name: String,
    /// Value; elapsed time keeps sub-second precision.
    pub value: f64,
    /// Tags; the run's default tags.
    pub tags: Vec<String>,
    /// Host scope, absent for run-wide metrics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

// ============================================================================
// Per-Host Counts
// ============================================================================

/// Outcome counts for one host. Buckets are disjoint: each outcome increments
/// exactly one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostCounts {
    /// Tasks that succeeded without changes.
    pub ok: u64,
    /// Tasks that changed state.
    pub changed: u64,
    /// Tasks that failed.
    pub failures: u64,
    /// Unreachable attempts.
    pub unreachable: u64,
    /// Skipped tasks.
    pub skipped: u64,
}

impl HostCounts {
    /// Create empty counts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one outcome status.
    pub fn record(&mut self, status: OutcomeStatus) {
        match status {
            OutcomeStatus::Ok => self.ok += 1,
            OutcomeStatus::Changed => self.changed += 1,
            OutcomeStatus::Failed => self.failures += 1,
            OutcomeStatus::Unreachable => self.unreachable += 1,
            OutcomeStatus::Skipped => self.skipped += 1,
        }
    }

    /// Error total: failures plus unreachable attempts.
    pub fn errors(&self) -> u64 {
        self.failures + self.unreachable
    }

    /// Tasks that ran to a result on this host; unreachable attempts never
    /// executed and are excluded.
    pub fn completed(&self) -> u64 {
        self.ok + self.changed + self.failures + self.skipped
    }

    /// The six metric buckets emitted per host at finalize.
    pub fn buckets(&self) -> [(&'static str, u64); 6] {
        [
            ("ok", self.ok),
            ("changed", self.changed),
            ("failures", self.failures),
            ("unreachable", self.unreachable),
            ("skipped", self.skipped),
            ("errors", self.errors()),
        ]
    }
}

// ============================================================================
// Run Summary
// ============================================================================

/// One host's contribution to the run's error recap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorHost {
    /// Host identifier.
    pub host: String,
    /// Failure count.
    pub failures: u64,
    /// Unreachable count.
    pub unreachable: u64,
}

/// Aggregated statistics for a completed run. Built once at finalize,
/// read-only thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Per-host counts, in the order hosts were first observed.
    pub per_host: IndexMap<String, HostCounts>,
    /// Tasks that ran to a result across all hosts.
    pub total_tasks: u64,
    /// Tasks that changed state across all hosts.
    pub total_updated: u64,
    /// Failures plus unreachable attempts across all hosts.
    pub total_errors: u64,
    /// Hosts with errors, in the order each was first observed with one.
    pub error_hosts: Vec<ErrorHost>,
}

impl RunSummary {
    /// Number of hosts processed during the run.
    pub fn host_count(&self) -> u64 {
        self.per_host.len() as u64
    }

    /// Iterator over the processed host identifiers, in observation order.
    pub fn processed_hosts(&self) -> impl Iterator<Item = &str> {
        self.per_host.keys().map(String::as_str)
    }
}

// ============================================================================
// Aggregator
// ============================================================================

/// Accumulates outcome counts across a run and folds them into the final
/// summary, metric batch, and completion event.
#[derive(Debug, Default)]
pub struct MetricAggregator {
    counts: IndexMap<String, HostCounts>,
    // Hosts in the order each was first observed with an error; drives the
    // recap ordering in the completion event.
    error_order: Vec<String>,
}

impl MetricAggregator {
    /// Create an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one classified outcome. Called once per outcome.
    pub fn record(&mut self, outcome: &Outcome) {
        self.counts
            .entry(outcome.host.clone())
            .or_default()
            .record(outcome.status);
        if outcome.is_error() && !self.error_order.contains(&outcome.host) {
            self.error_order.push(outcome.host.clone());
        }
    }

    /// Replace per-host counts with a runtime-supplied stats object.
    ///
    /// Host runtimes that track their own statistics deliver them with the
    /// finalize signal; those counts are authoritative for the hosts they
    /// name (a runtime may count skips this engine never saw a signal for).
    pub fn absorb(&mut self, summaries: &HostSummaries) {
        for (host, counts) in summaries {
            self.counts.insert(host.clone(), *counts);
            if counts.errors() > 0 && !self.error_order.contains(host) {
                self.error_order.push(host.clone());
            }
        }
    }

    /// Number of hosts observed so far.
    pub fn host_count(&self) -> usize {
        self.counts.len()
    }

    /// Fold the accumulated counts into a read-only summary.
    pub fn summarize(&self) -> RunSummary {
        let mut total_tasks = 0;
        let mut total_updated = 0;
        let mut total_errors = 0;
        for counts in self.counts.values() {
            total_tasks += counts.completed();
            total_updated += counts.changed;
            total_errors += counts.errors();
        }

        let error_hosts = self
            .error_order
            .iter()
            .filter_map(|host| {
                let counts = self.counts.get(host)?;
                (counts.errors() > 0).then(|| ErrorHost {
                    host: host.clone(),
                    failures: counts.failures,
                    unreachable: counts.unreachable,
                })
            })
            .collect();

        RunSummary {
            per_host: self.counts.clone(),
            total_tasks,
            total_updated,
            total_errors,
            error_hosts,
        }
    }

    /// Compute the run-end telemetry: the summary, the metric batch, and the
    /// completion event.
    ///
    /// The elapsed duration is truncated to whole seconds for the event title
    /// only; the `elapsed_time` metric value keeps sub-second precision.
    pub fn finalize(
        &self,
        context: &RunContext,
        elapsed: Duration,
        factory: &EventFactory,
    ) -> (RunSummary, Vec<Metric>, Event) {
        let summary = self.summarize();

        let mut metrics = Vec::with_capacity(summary.per_host.len() * 6 + 1);
        for (host, counts) in &summary.per_host {
            for (bucket, value) in counts.buckets() {
                metrics.push(Metric {
                    name: format!("task.{}", bucket),
                    value: value as f64,
                    tags: context.default_tags(),
                    host: Some(host.clone()),
                });
            }
        }
        metrics.push(Metric {
            name: ELAPSED_TIME_METRIC.to_string(),
            value: elapsed.as_secs_f64(),
            tags: context.default_tags(),
            host: None,
        });

        let event = self.completion_event(context, &summary, elapsed, factory);
        (summary, metrics, event)
    }

    fn completion_event(
        &self,
        context: &RunContext,
        summary: &RunSummary,
        elapsed: Duration,
        factory: &EventFactory,
    ) -> Event {
        let mut title = format!(
            "Playbook \"{}\" completed in {}",
            context.name(),
            pluralize(elapsed.as_secs(), "second"),
        );
        let mut text = format!(
            "{} of {} updated on {}; {}",
            pluralize(summary.total_updated, "task"),
            pluralize(summary.total_tasks, "task"),
            pluralize(summary.host_count(), "host"),
            pluralize(summary.total_errors, "error"),
        );

        let alert_type = if summary.total_errors > 0 {
            title.push_str(" with errors");
            text.push_str("\nErrors occurred on the following hosts:\n%%%\n");
            for error_host in &summary.error_hosts {
                text.push_str(&format!(
                    "- `{}` (failure: {}, unreachable: {})\n",
                    error_host.host, error_host.failures, error_host.unreachable,
                ));
            }
            text.push_str("\n%%%\n");
            AlertType::Error
        } else {
            title.push_str(" successfully");
            AlertType::Success
        };

        factory.run_event(EventCategory::RunEnd, title, alert_type, text, context)
    }
}
