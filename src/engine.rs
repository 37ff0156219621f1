//! The telemetry engine: the crate's [`RunObserver`] implementation.
//!
//! One engine instance observes one run. The host runtime drives it through
//! the observer methods; the engine classifies outcomes, aggregates counts,
//! and hands finished records to its [`Reporter`].
//!
//! # Guarantees
//!
//! - The run-start event is submitted before any task event; the completion
//!   event is the last submission of the run.
//! - Reporter failures are logged and discarded at the call site. No failure
//!   in this engine can reach the host runtime or alter the observed run.
//! - Without a usable configuration the engine runs disabled: every signal
//!   is a no-op beyond a local diagnostic.
//!
//! Mutable state (timeline + aggregator) sits behind one mutex, so a host
//! runtime that parallelizes task callbacks across workers keeps the
//! single-writer invariant. The lock is never held across an await.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::TelemetryConfig;
use crate::event::{AlertType, Event, EventCategory, EventFactory};
use crate::metric::{HostSummaries, Metric, MetricAggregator};
use crate::outcome::{Outcome, RawTaskResult, ResultClassifier};
use crate::reporter::{HttpReporter, NullReporter, Reporter};
use crate::timeline::{RunStart, RunTimeline};
use crate::traits::RunObserver;

#[derive(Debug, Default)]
struct EngineState {
    timeline: RunTimeline,
    aggregator: MetricAggregator,
}

/// Derives and delivers telemetry for one automation run.
pub struct TelemetryEngine {
    reporter: Arc<dyn Reporter>,
    classifier: ResultClassifier,
    factory: EventFactory,
    state: Mutex<EngineState>,
    disabled: bool,
}

impl std::fmt::Debug for TelemetryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryEngine")
            .field("disabled", &self.disabled)
            .finish_non_exhaustive()
    }
}

impl TelemetryEngine {
    /// Create an engine delivering through the given reporter.
    pub fn new(reporter: Arc<dyn Reporter>) -> Self {
        Self {
            reporter,
            classifier: ResultClassifier::new(),
            factory: EventFactory::new(),
            state: Mutex::new(EngineState::default()),
            disabled: false,
        }
    }

    /// Create an engine from configuration.
    ///
    /// A configuration without a usable credential and URL yields a disabled
    /// engine with a logged diagnostic; this constructor never fails into
    /// the caller.
    pub fn from_config(config: &TelemetryConfig) -> Self {
        match HttpReporter::from_config(config) {
            Ok(reporter) => Self::new(Arc::new(reporter)),
            Err(e) => {
                warn!(error = %e, "telemetry disabled");
                Self::disabled()
            }
        }
    }

    /// Create a disabled engine: every signal is a no-op.
    pub fn disabled() -> Self {
        Self {
            disabled: true,
            ..Self::new(Arc::new(NullReporter::new()))
        }
    }

    /// Whether this engine is in disabled no-op mode.
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Record outcomes and build the events they warrant. Outcomes outside an
    /// active run are a caller error: logged, not aggregated.
    fn ingest(&self, outcomes: &[Outcome]) -> Vec<Event> {
        let mut state = self.state.lock();
        let state = &mut *state;
        if let Err(e) = state.timeline.ensure_running() {
            warn!(
                error = %e,
                phase = %state.timeline.phase(),
                "outcome received outside an active run; dropping"
            );
            return Vec::new();
        }

        let mut events = Vec::new();
        for outcome in outcomes {
            state.aggregator.record(outcome);
            if outcome.emits_event() {
                events.push(self.factory.task_event(outcome, state.timeline.context()));
            }
        }
        events
    }

    async fn deliver_event(&self, event: Event) {
        if let Err(e) = self.reporter.submit_event(&event).await {
            warn!(error = %e, title = %event.title, "failed to deliver event; dropping");
        }
    }

    async fn deliver_metric(&self, metric: Metric) {
        if let Err(e) = self.reporter.submit_metric(&metric).await {
            warn!(error = %e, metric = %metric.name, "failed to deliver metric; dropping");
        }
    }

    async fn deliver_all(&self, events: Vec<Event>) {
        for event in events {
            self.deliver_event(event).await;
        }
    }
}

#[async_trait]
impl RunObserver for TelemetryEngine {
    async fn on_run_start(&self, start: &RunStart) {
        if self.disabled {
            return;
        }
        let event = {
            let mut state = self.state.lock();
            if state.timeline.start(start) {
                let context = state.timeline.context();
                let mut title = format!("Playbook \"{}\" started", context.name());
                if let Some(initiator) = &start.initiator {
                    title.push_str(&format!(" by \"{}\"", initiator));
                }
                if let Some(inventory) = &start.inventory {
                    title.push_str(&format!(" against \"{}\"", inventory));
                }
                Some(self.factory.run_event(
                    EventCategory::RunStart,
                    title,
                    AlertType::Info,
                    String::new(),
                    context,
                ))
            } else {
                debug!("duplicate run-start signal ignored");
                None
            }
        };
        if let Some(event) = event {
            self.deliver_event(event).await;
        }
    }

    async fn on_play_start(&self, play_name: &str) {
        if self.disabled {
            return;
        }
        self.state.lock().timeline.set_play(play_name);
    }

    async fn on_task_ok(&self, host: &str, result: &RawTaskResult) {
        if self.disabled {
            return;
        }
        let outcomes = self.classifier.classify_ok(host, result);
        let events = self.ingest(&outcomes);
        self.deliver_all(events).await;
    }

    async fn on_task_failed(&self, host: &str, result: &RawTaskResult, ignore_errors: bool) {
        if self.disabled {
            return;
        }
        let outcomes = self.classifier.classify_failed(host, result, ignore_errors);
        let events = self.ingest(&outcomes);
        self.deliver_all(events).await;
    }

    async fn on_task_unreachable(&self, host: &str, result: &RawTaskResult) {
        if self.disabled {
            return;
        }
        let outcomes = self.classifier.classify_unreachable(host, result);
        let events = self.ingest(&outcomes);
        self.deliver_all(events).await;
    }

    async fn on_task_skipped(&self, host: &str, result: &RawTaskResult) {
        if self.disabled {
            return;
        }
        let outcomes = self.classifier.classify_skipped(host, result);
        let events = self.ingest(&outcomes);
        self.deliver_all(events).await;
    }

    async fn on_run_finished(&self, summaries: &HostSummaries) {
        if self.disabled {
            return;
        }
        let finalized = {
            let mut state = self.state.lock();
            let state = &mut *state;
            match state.timeline.finish() {
                Ok(elapsed) => {
                    if !summaries.is_empty() {
                        state.aggregator.absorb(summaries);
                    }
                    Some(state.aggregator.finalize(
                        state.timeline.context(),
                        elapsed,
                        &self.factory,
                    ))
                }
                Err(e) => {
                    warn!(error = %e, "finalize signal rejected");
                    None
                }
            }
        };
        let Some((summary, metrics, event)) = finalized else {
            return;
        };

        info!(
            total_tasks = summary.total_tasks,
            total_errors = summary.total_errors,
            hosts = summary.host_count(),
            "run completed"
        );
        for metric in metrics {
            self.deliver_metric(metric).await;
        }
        // The completion event is the last submission of the run.
        self.deliver_event(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::MemoryReporter;

    fn engine_with_memory() -> (TelemetryEngine, Arc<MemoryReporter>) {
        let reporter = Arc::new(MemoryReporter::new());
        (TelemetryEngine::new(reporter.clone()), reporter)
    }

    #[tokio::test]
    async fn test_disabled_engine_is_a_no_op() {
        let engine = TelemetryEngine::disabled();
        assert!(engine.is_disabled());
        engine.on_run_start(&RunStart::named("site")).await;
        engine
            .on_task_failed("web1", &RawTaskResult::new(), false)
            .await;
        engine.on_run_finished(&HostSummaries::new()).await;
    }

    #[tokio::test]
    async fn test_from_config_without_credential_disables() {
        let engine = TelemetryEngine::from_config(&TelemetryConfig::default());
        assert!(engine.is_disabled());
    }

    #[tokio::test]
    async fn test_from_config_with_credential_enables() {
        let config = TelemetryConfig::default()
            .with_api_key("secret")
            .with_url("https://monitoring.example.com");
        let engine = TelemetryEngine::from_config(&config);
        assert!(!engine.is_disabled());
    }

    #[tokio::test]
    async fn test_outcome_before_start_is_dropped_with_diagnostic() {
        let (engine, reporter) = engine_with_memory();
        engine.on_task_ok("web1", &RawTaskResult::new().with_changed(true)).await;
        assert!(reporter.events().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_start_emits_one_event() {
        let (engine, reporter) = engine_with_memory();
        engine.on_run_start(&RunStart::named("site")).await;
        engine.on_run_start(&RunStart::named("other")).await;

        let events = reporter.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Playbook \"site\" started");
    }

    #[tokio::test]
    async fn test_start_title_carries_initiator_and_inventory() {
        let (engine, reporter) = engine_with_memory();
        let start = RunStart::from_source("/srv/plays/site.yml")
            .with_initiator("deploy")
            .with_inventory("production");
        engine.on_run_start(&start).await;

        let events = reporter.events();
        assert_eq!(
            events[0].title,
            "Playbook \"site\" started by \"deploy\" against \"production\""
        );
        assert_eq!(events[0].event_type(), "config_management.run.start");
    }
}
