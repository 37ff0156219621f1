//! Raw task results and outcome classification.
//!
//! The host runtime reports each per-host task result as a loosely-shaped
//! payload ([`RawTaskResult`]). The [`ResultClassifier`] turns one payload
//! into one or more [`Outcome`]s: a semantic status, a module-name tag, and a
//! formatted text body ready for event delivery.
//!
//! # Body Formatting Precedence
//!
//! The body is derived in strict precedence order, because backend alerting
//! keys off it:
//!
//! 1. A `censored` marker wins outright: its content is the body, verbatim.
//! 2. Without invocation metadata, the body is the fenced `msg` block (or
//!    empty).
//! 3. With invocation metadata, the body is a fenced `module_name[args]`
//!    block, the fenced `msg` block when present, and a fenced stdout/stderr
//!    block when the result exposes module-level output separately (some
//!    module-internal failures never populate `msg`).
//!
//! Loop results expand to one outcome per item, each item's own flags
//! refining its status. Delegated results render the host as
//! `actor -> target`.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Module name used when invocation metadata is absent or incomplete.
const UNDEFINED_MODULE: &str = "undefined";

/// Maximum body length in bytes before truncation.
const MAX_BODY_LENGTH: usize = 10_000;

// ============================================================================
// Raw Result Payload
// ============================================================================

/// Invocation metadata attached to a raw task result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Invocation {
    /// Name of the module the task executed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_name: Option<String>,
    /// Arguments the module was invoked with; a string or structured value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_args: Option<JsonValue>,
}

impl Invocation {
    /// Create invocation metadata for a named module.
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: Some(module_name.into()),
            module_args: None,
        }
    }

    /// Set the module arguments.
    pub fn with_args(mut self, args: impl Into<JsonValue>) -> Self {
        self.module_args = Some(args.into());
        self
    }

    fn module_name(&self) -> &str {
        self.module_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(UNDEFINED_MODULE)
    }

    fn render_args(&self) -> String {
        match &self.module_args {
            None => String::new(),
            Some(JsonValue::String(s)) => s.clone(),
            Some(value) => value.to_string(),
        }
    }
}

/// One host's raw result for one task, as reported by the runtime.
///
/// Field presence is explicit: optional payload keys are `Option` fields, so
/// classification never guesses at missing data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawTaskResult {
    /// Free-text message from the module.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    /// Censored replacement text; set when the task suppressed its output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub censored: Option<String>,
    /// Whether the task changed state on the host.
    pub changed: bool,
    /// Per-item failure flag on loop item results.
    pub failed: bool,
    /// Per-item skip flag on loop item results.
    pub skipped: bool,
    /// Invocation metadata, when the runtime recorded it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invocation: Option<Invocation>,
    /// Module-level stdout, present only for certain failure shapes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_stdout: Option<String>,
    /// Module-level stderr, present only for certain failure shapes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_stderr: Option<String>,
    /// Per-item results of a loop task; empty for plain tasks.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<RawTaskResult>,
    /// Target host the task was delegated to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegated_host: Option<String>,
}

impl RawTaskResult {
    /// Create an empty raw result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the message.
    pub fn with_msg(mut self, msg: impl Into<String>) -> Self {
        self.msg = Some(msg.into());
        self
    }

    /// Set the censored replacement text.
    pub fn with_censored(mut self, censored: impl Into<String>) -> Self {
        self.censored = Some(censored.into());
        self
    }

    /// Set the changed flag.
    pub fn with_changed(mut self, changed: bool) -> Self {
        self.changed = changed;
        self
    }

    /// Set the per-item failure flag.
    pub fn with_failed(mut self, failed: bool) -> Self {
        self.failed = failed;
        self
    }

    /// Set the per-item skip flag.
    pub fn with_skipped(mut self, skipped: bool) -> Self {
        self.skipped = skipped;
        self
    }

    /// Set the invocation metadata.
    pub fn with_invocation(mut self, invocation: Invocation) -> Self {
        self.invocation = Some(invocation);
        self
    }

    /// Set module-level stdout and stderr.
    pub fn with_module_output(
        mut self,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        self.module_stdout = Some(stdout.into());
        self.module_stderr = Some(stderr.into());
        self
    }

    /// Set loop item results.
    pub fn with_items(mut self, items: Vec<RawTaskResult>) -> Self {
        self.results = items;
        self
    }

    /// Set the delegation target.
    pub fn with_delegated_host(mut self, target: impl Into<String>) -> Self {
        self.delegated_host = Some(target.into());
        self
    }

    /// Whether this result is a loop task with per-item results.
    pub fn is_loop(&self) -> bool {
        !self.results.is_empty()
    }
}

// ============================================================================
// Classified Outcome
// ============================================================================

/// Semantic classification of one task result on one host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Task succeeded without changing state.
    Ok,
    /// Task succeeded and changed state.
    Changed,
    /// Task failed.
    Failed,
    /// Host could not be reached.
    Unreachable,
    /// Task was skipped.
    Skipped,
}

impl OutcomeStatus {
    /// The metric bucket key for this status.
    pub fn bucket(&self) -> &'static str {
        match self {
            OutcomeStatus::Ok => "ok",
            OutcomeStatus::Changed => "changed",
            OutcomeStatus::Failed => "failures",
            OutcomeStatus::Unreachable => "unreachable",
            OutcomeStatus::Skipped => "skipped",
        }
    }

    /// Whether this status counts toward the host's error total.
    pub fn is_error(&self) -> bool {
        matches!(self, OutcomeStatus::Failed | OutcomeStatus::Unreachable)
    }
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            OutcomeStatus::Ok => "ok",
            OutcomeStatus::Changed => "changed",
            OutcomeStatus::Failed => "failed",
            OutcomeStatus::Unreachable => "unreachable",
            OutcomeStatus::Skipped => "skipped",
        };
        write!(f, "{}", label)
    }
}

/// One classified task outcome, ready for event building and aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    /// Host identifier; `actor -> target` when the task was delegated.
    pub host: String,
    /// Semantic status.
    pub status: OutcomeStatus,
    /// Module name; the literal "undefined" when unavailable.
    pub module_name: String,
    /// Formatted text body for the event.
    pub body: String,
    /// Module-level stdout, when the raw result carried it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_stdout: Option<String>,
    /// Module-level stderr, when the raw result carried it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_stderr: Option<String>,
    /// Whether the task declared that failures are to be ignored.
    pub ignore_errors: bool,
}

impl Outcome {
    /// The `module:<name>` tag for this outcome.
    pub fn module_tag(&self) -> String {
        format!("module:{}", self.module_name)
    }

    /// Whether this outcome counts toward its host's error total.
    pub fn is_error(&self) -> bool {
        self.status.is_error()
    }

    /// Whether this outcome produces an event.
    ///
    /// Failures suppressed by `ignore_errors` and non-changing successes
    /// contribute to metrics only; unreachable hosts always alert.
    pub fn emits_event(&self) -> bool {
        match self.status {
            OutcomeStatus::Failed => !self.ignore_errors,
            OutcomeStatus::Unreachable => true,
            OutcomeStatus::Changed => true,
            OutcomeStatus::Ok | OutcomeStatus::Skipped => false,
        }
    }
}

// ============================================================================
// Classifier
// ============================================================================

/// Converts raw per-host task results into classified outcomes.
#[derive(Debug, Clone)]
pub struct ResultClassifier {
    max_body_len: usize,
}

impl Default for ResultClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultClassifier {
    /// Create a classifier with the default truncation limit.
    pub fn new() -> Self {
        Self {
            max_body_len: MAX_BODY_LENGTH,
        }
    }

    /// Create a classifier with a custom body truncation limit.
    pub fn with_max_body_len(max_body_len: usize) -> Self {
        Self { max_body_len }
    }

    /// Classify a successful task result.
    ///
    /// Loop results expand to one outcome per item.
    pub fn classify_ok(&self, host: &str, raw: &RawTaskResult) -> Vec<Outcome> {
        let display_host = display_host(host, raw);
        if raw.is_loop() {
            return self.classify_items(&display_host, raw, false);
        }
        let status = if raw.changed {
            OutcomeStatus::Changed
        } else {
            OutcomeStatus::Ok
        };
        vec![self.classify_one(&display_host, status, raw, false)]
    }

    /// Classify a failed task result.
    ///
    /// `ignore_errors` rides along so the caller can suppress event emission
    /// while the outcome still feeds aggregation.
    pub fn classify_failed(
        &self,
        host: &str,
        raw: &RawTaskResult,
        ignore_errors: bool,
    ) -> Vec<Outcome> {
        let display_host = display_host(host, raw);
        if raw.is_loop() {
            return self.classify_items(&display_host, raw, ignore_errors);
        }
        vec![self.classify_one(&display_host, OutcomeStatus::Failed, raw, ignore_errors)]
    }

    /// Classify an unreachable-host result.
    ///
    /// The body is the fenced dump of the raw payload: there is no module
    /// output to extract when the host never ran anything.
    pub fn classify_unreachable(&self, host: &str, raw: &RawTaskResult) -> Vec<Outcome> {
        let dump = serde_json::to_string(raw)
            .unwrap_or_else(|_| raw.msg.clone().unwrap_or_default());
        let body = self.truncate(format!("\n$$$\n{}\n$$$\n", dump));
        vec![Outcome {
            host: display_host(host, raw),
            status: OutcomeStatus::Unreachable,
            module_name: UNDEFINED_MODULE.to_string(),
            body,
            raw_stdout: raw.module_stdout.clone(),
            raw_stderr: raw.module_stderr.clone(),
            ignore_errors: false,
        }]
    }

    /// Classify a skipped task result. Feeds metrics only.
    pub fn classify_skipped(&self, host: &str, raw: &RawTaskResult) -> Vec<Outcome> {
        let display_host = display_host(host, raw);
        if raw.is_loop() {
            return self.classify_items(&display_host, raw, false);
        }
        vec![self.classify_one(&display_host, OutcomeStatus::Skipped, raw, false)]
    }

    /// Expand a loop result into one outcome per item.
    fn classify_items(
        &self,
        display_host: &str,
        raw: &RawTaskResult,
        ignore_errors: bool,
    ) -> Vec<Outcome> {
        raw.results
            .iter()
            .map(|item| {
                let status = if item.failed {
                    OutcomeStatus::Failed
                } else if item.skipped {
                    OutcomeStatus::Skipped
                } else if item.changed {
                    OutcomeStatus::Changed
                } else {
                    OutcomeStatus::Ok
                };
                self.classify_one(display_host, status, item, ignore_errors)
            })
            .collect()
    }

    fn classify_one(
        &self,
        display_host: &str,
        status: OutcomeStatus,
        raw: &RawTaskResult,
        ignore_errors: bool,
    ) -> Outcome {
        let (body, module_name) = self.format_body(raw);
        Outcome {
            host: display_host.to_string(),
            status,
            module_name,
            body,
            raw_stdout: raw.module_stdout.clone(),
            raw_stderr: raw.module_stderr.clone(),
            ignore_errors,
        }
    }

    /// Derive the body text and module name from a raw result.
    fn format_body(&self, raw: &RawTaskResult) -> (String, String) {
        // A censored marker takes strict precedence and is passed through
        // verbatim, untruncated; the module name intentionally stays
        // "undefined" even when invocation metadata is present.
        if let Some(censored) = raw.censored.as_deref().filter(|c| !c.is_empty()) {
            return (censored.to_string(), UNDEFINED_MODULE.to_string());
        }

        let msg_block = raw
            .msg
            .as_deref()
            .filter(|m| !m.is_empty())
            .map(|m| format!("$$$\n{}\n$$$\n", m))
            .unwrap_or_default();

        let Some(invocation) = &raw.invocation else {
            return (self.truncate(msg_block), UNDEFINED_MODULE.to_string());
        };

        let module_name = invocation.module_name().to_string();
        let mut body = format!("$$$\n{}[{}]\n$$$\n", module_name, invocation.render_args());
        body.push_str(&msg_block);
        if raw.module_stdout.is_some() {
            // Module-internal failures surface their details in stdout/stderr
            // rather than `msg`.
            body.push_str(&format!(
                "$$$\n{}\n{}\n$$$\n",
                raw.module_stdout.as_deref().unwrap_or(""),
                raw.module_stderr.as_deref().unwrap_or(""),
            ));
        }
        (self.truncate(body), module_name)
    }

    fn truncate(&self, body: String) -> String {
        if body.len() <= self.max_body_len {
            return body;
        }
        let mut end = self.max_body_len;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!(
            "{}... (truncated, {} bytes total)",
            &body[..end],
            body.len()
        )
    }
}

/// Display identifier for a host, annotated when the task was delegated.
fn display_host(host: &str, raw: &RawTaskResult) -> String {
    match raw.delegated_host.as_deref().filter(|t| !t.is_empty()) {
        Some(target) => format!("{} -> {}", host, target),
        None => host.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn classifier() -> ResultClassifier {
        ResultClassifier::new()
    }

    #[test]
    fn test_censored_takes_strict_precedence() {
        let raw = RawTaskResult::new()
            .with_censored("REDACTED")
            .with_msg("real failure details")
            .with_invocation(Invocation::new("shell").with_args("rm -rf /tmp/x"))
            .with_module_output("out", "err");

        let outcomes = classifier().classify_failed("web1", &raw, false);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].body, "REDACTED");
        assert_eq!(outcomes[0].module_name, "undefined");
        assert_eq!(outcomes[0].module_tag(), "module:undefined");
    }

    #[test]
    fn test_no_invocation_uses_fenced_msg() {
        let raw = RawTaskResult::new().with_msg("it broke");
        let outcomes = classifier().classify_failed("web1", &raw, false);
        assert_eq!(outcomes[0].body, "$$$\nit broke\n$$$\n");
        assert_eq!(outcomes[0].module_name, "undefined");
    }

    #[test]
    fn test_no_invocation_no_msg_is_empty_body() {
        let outcomes = classifier().classify_failed("web1", &RawTaskResult::new(), false);
        assert_eq!(outcomes[0].body, "");
    }

    #[test]
    fn test_invocation_composes_module_and_msg() {
        let raw = RawTaskResult::new()
            .with_msg("package not found")
            .with_invocation(Invocation::new("apt").with_args("name=nginx state=present"));

        let outcomes = classifier().classify_failed("web1", &raw, false);
        assert_eq!(
            outcomes[0].body,
            "$$$\napt[name=nginx state=present]\n$$$\n$$$\npackage not found\n$$$\n"
        );
        assert_eq!(outcomes[0].module_name, "apt");
        assert_eq!(outcomes[0].module_tag(), "module:apt");
    }

    #[test]
    fn test_module_output_appended_when_present() {
        let raw = RawTaskResult::new()
            .with_invocation(Invocation::new("command"))
            .with_module_output("Traceback (most recent call last):", "boom");

        let outcomes = classifier().classify_failed("web1", &raw, false);
        assert_eq!(
            outcomes[0].body,
            "$$$\ncommand[]\n$$$\n$$$\nTraceback (most recent call last):\nboom\n$$$\n"
        );
        assert_eq!(outcomes[0].raw_stdout.as_deref(), Some("Traceback (most recent call last):"));
        assert_eq!(outcomes[0].raw_stderr.as_deref(), Some("boom"));
    }

    #[test]
    fn test_structured_args_render_as_json() {
        let raw = RawTaskResult::new().with_invocation(
            Invocation::new("copy").with_args(serde_json::json!({"dest": "/etc/motd"})),
        );
        let outcomes = classifier().classify_failed("web1", &raw, false);
        assert_eq!(outcomes[0].body, "$$$\ncopy[{\"dest\":\"/etc/motd\"}]\n$$$\n");
    }

    #[test]
    fn test_invocation_without_name_defaults_to_undefined() {
        let raw = RawTaskResult::new().with_invocation(Invocation::default());
        let outcomes = classifier().classify_failed("web1", &raw, false);
        assert_eq!(outcomes[0].module_name, "undefined");
        assert!(outcomes[0].body.starts_with("$$$\nundefined[]"));
    }

    #[test]
    fn test_ok_refined_by_changed_flag() {
        let changed = classifier().classify_ok("web1", &RawTaskResult::new().with_changed(true));
        assert_eq!(changed[0].status, OutcomeStatus::Changed);
        assert!(changed[0].emits_event());

        let unchanged = classifier().classify_ok("web1", &RawTaskResult::new());
        assert_eq!(unchanged[0].status, OutcomeStatus::Ok);
        assert!(!unchanged[0].emits_event());
    }

    #[test]
    fn test_ignore_errors_suppresses_event_not_classification() {
        let outcomes =
            classifier().classify_failed("web1", &RawTaskResult::new().with_msg("x"), true);
        assert_eq!(outcomes[0].status, OutcomeStatus::Failed);
        assert!(outcomes[0].is_error());
        assert!(!outcomes[0].emits_event());
    }

    #[test]
    fn test_unreachable_always_emits() {
        let raw = RawTaskResult::new().with_msg("Failed to connect to the host via ssh");
        let outcomes = classifier().classify_unreachable("db1", &raw);
        assert_eq!(outcomes[0].status, OutcomeStatus::Unreachable);
        assert!(outcomes[0].emits_event());
        assert!(outcomes[0].body.starts_with("\n$$$\n"));
        assert!(outcomes[0].body.contains("Failed to connect"));
    }

    #[test]
    fn test_skipped_never_emits() {
        let outcomes = classifier().classify_skipped("web1", &RawTaskResult::new());
        assert_eq!(outcomes[0].status, OutcomeStatus::Skipped);
        assert!(!outcomes[0].emits_event());
    }

    #[test]
    fn test_loop_results_expand_per_item() {
        let raw = RawTaskResult::new().with_items(vec![
            RawTaskResult::new().with_changed(true).with_msg("item a"),
            RawTaskResult::new().with_msg("item b"),
            RawTaskResult::new().with_failed(true).with_msg("item c"),
            RawTaskResult::new().with_skipped(true),
        ]);

        let outcomes = classifier().classify_ok("web1", &raw);
        assert_eq!(outcomes.len(), 4);
        assert_eq!(outcomes[0].status, OutcomeStatus::Changed);
        assert_eq!(outcomes[1].status, OutcomeStatus::Ok);
        assert_eq!(outcomes[2].status, OutcomeStatus::Failed);
        assert_eq!(outcomes[3].status, OutcomeStatus::Skipped);
        assert_eq!(outcomes[0].body, "$$$\nitem a\n$$$\n");
    }

    #[test]
    fn test_loop_failure_keeps_ignore_errors_per_item() {
        let raw = RawTaskResult::new()
            .with_items(vec![RawTaskResult::new().with_failed(true)]);
        let outcomes = classifier().classify_failed("web1", &raw, true);
        assert_eq!(outcomes[0].status, OutcomeStatus::Failed);
        assert!(!outcomes[0].emits_event());
    }

    #[test]
    fn test_delegated_host_display() {
        let raw = RawTaskResult::new().with_delegated_host("lb1");
        let outcomes = classifier().classify_ok("web1", &raw.with_changed(true));
        assert_eq!(outcomes[0].host, "web1 -> lb1");
    }

    #[test]
    fn test_body_truncation() {
        let classifier = ResultClassifier::with_max_body_len(32);
        let raw = RawTaskResult::new().with_msg("x".repeat(100));
        let outcomes = classifier.classify_failed("web1", &raw, false);
        assert!(outcomes[0].body.contains("truncated"));
        // Untruncated fenced body: 4 + 100 + 5 = 109 bytes.
        assert!(outcomes[0].body.contains("109 bytes total"));
    }

    #[test]
    fn test_censored_is_never_truncated() {
        let classifier = ResultClassifier::with_max_body_len(8);
        let raw = RawTaskResult::new().with_censored("a".repeat(64));
        let outcomes = classifier.classify_failed("web1", &raw, false);
        assert_eq!(outcomes[0].body.len(), 64);
    }

    #[test]
    fn test_status_buckets() {
        assert_eq!(OutcomeStatus::Ok.bucket(), "ok");
        assert_eq!(OutcomeStatus::Changed.bucket(), "changed");
        assert_eq!(OutcomeStatus::Failed.bucket(), "failures");
        assert_eq!(OutcomeStatus::Unreachable.bucket(), "unreachable");
        assert_eq!(OutcomeStatus::Skipped.bucket(), "skipped");
        assert!(OutcomeStatus::Failed.is_error());
        assert!(OutcomeStatus::Unreachable.is_error());
        assert!(!OutcomeStatus::Changed.is_error());
    }
}
