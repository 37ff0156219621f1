//! Core traits defining the inbound surface of the telemetry engine.
//!
//! The host runtime drives the engine through [`RunObserver`]: one method per
//! lifecycle signal, invoked synchronously as the run progresses. An adapter
//! outside this crate translates whatever host-specific calling convention
//! exists into these calls, so the engine never depends on a runtime version.
//!
//! All methods default to no-ops: observers implement only the signals they
//! care about, and none of them can fail back into the runtime.

use async_trait::async_trait;

use crate::metric::HostSummaries;
use crate::outcome::RawTaskResult;
use crate::timeline::RunStart;

/// Receiver for run lifecycle signals from the host runtime.
///
/// Invocation order for one run: `on_run_start` first, then any number of
/// `on_play_start` / `on_task_*` signals, then `on_run_finished` exactly
/// once.
///
/// # Example
///
/// ```rust,ignore
/// use playbeacon::prelude::*;
///
/// let engine = TelemetryEngine::from_config(&TelemetryConfig::load()?);
/// engine.on_run_start(&RunStart::from_source("site.yml")).await;
/// engine.on_task_ok("web1", &result).await;
/// engine.on_run_finished(&HostSummaries::new()).await;
/// ```
#[async_trait]
pub trait RunObserver: Send + Sync {
    /// The run started. The first signal of a run; repeats are no-ops.
    async fn on_run_start(&self, start: &RunStart) {
        let _ = start;
    }

    /// A play within the run started. Optional; feeds the `play:` event tag.
    async fn on_play_start(&self, play_name: &str) {
        let _ = play_name;
    }

    /// A task completed successfully on a host.
    async fn on_task_ok(&self, host: &str, result: &RawTaskResult) {
        let _ = (host, result);
    }

    /// A task failed on a host. `ignore_errors` reflects the task
    /// declaration: the failure still aggregates but must not alert.
    async fn on_task_failed(&self, host: &str, result: &RawTaskResult, ignore_errors: bool) {
        let _ = (host, result, ignore_errors);
    }

    /// A host could not be reached for a task.
    async fn on_task_unreachable(&self, host: &str, result: &RawTaskResult) {
        let _ = (host, result);
    }

    /// A task was skipped on a host. Feeds the skipped metric bucket only.
    async fn on_task_skipped(&self, host: &str, result: &RawTaskResult) {
        let _ = (host, result);
    }

    /// The run finished. Terminal; carries the runtime's own per-host stats
    /// when it tracks them (may be empty).
    async fn on_run_finished(&self, summaries: &HostSummaries) {
        let _ = summaries;
    }
}
