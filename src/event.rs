//! Event records and the factory that builds them.
//!
//! An [`Event`] is an immutable, fully-tagged record ready for delivery. The
//! [`EventFactory`] derives titles, tags, and severity from classified
//! outcomes and the run context.
//!
//! # Priority Mapping
//!
//! Priority derives 1:1 from the alert type: `error -> normal`, everything
//! else `-> low`. The backend treats "normal" as actionable and "low" as
//! informational noise, so only failures are promoted.

use serde::{Deserialize, Serialize};

use crate::outcome::{Outcome, OutcomeStatus};
use crate::timeline::RunContext;

// ============================================================================
// Severity
// ============================================================================

/// Severity of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    /// Informational.
    Info,
    /// A desired change happened.
    Success,
    /// A failure that needs attention.
    Error,
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertType::Info => write!(f, "info"),
            AlertType::Success => write!(f, "success"),
            AlertType::Error => write!(f, "error"),
        }
    }
}

/// Delivery priority of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Informational; not actionable.
    Low,
    /// Actionable.
    Normal,
}

impl From<AlertType> for Priority {
    fn from(alert_type: AlertType) -> Self {
        match alert_type {
            AlertType::Error => Priority::Normal,
            AlertType::Info | AlertType::Success => Priority::Low,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Normal => write!(f, "normal"),
        }
    }
}

// ============================================================================
// Category
// ============================================================================

/// Backend aggregation category of an event.
///
/// Task events aggregate per host; run events aggregate per run and stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// Per-host task-level event.
    Task,
    /// Run lifecycle start event.
    RunStart,
    /// Run lifecycle completion event.
    RunEnd,
}

impl EventCategory {
    /// The backend grouping key for this category.
    pub fn event_type(&self) -> &'static str {
        match self {
            EventCategory::Task => "config_management.task",
            EventCategory::RunStart => "config_management.run.start",
            EventCategory::RunEnd => "config_management.run.end",
        }
    }
}

// ============================================================================
// Event Record
// ============================================================================

/// An immutable event record ready for delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Human-readable title, always carrying the host or run identifier.
    pub title: String,
    /// Formatted body text.
    pub text: String,
    /// Severity.
    pub alert_type: AlertType,
    /// Priority, derived from the severity.
    pub priority: Priority,
    /// Tags; the union of caller tags and the run's default tags.
    pub tags: Vec<String>,
    /// Host the event concerns, for task-level events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Aggregation category.
    pub category: EventCategory,
    /// Backend aggregation object: the host for task events, the run name for
    /// run events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_object: Option<String>,
}

impl Event {
    /// The backend grouping key for this event.
    pub fn event_type(&self) -> &'static str {
        self.category.event_type()
    }
}

// ============================================================================
// Factory
// ============================================================================

/// Builds [`Event`] records from outcomes and run context.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventFactory;

impl EventFactory {
    /// Create an event factory.
    pub fn new() -> Self {
        Self
    }

    /// Build a task-level event from a classified outcome.
    ///
    /// Carries a `module:` tag always, a `play:` tag when a play is active,
    /// and the run's default tags.
    pub fn task_event(&self, outcome: &Outcome, context: &RunContext) -> Event {
        let (title, alert_type) = match outcome.status {
            OutcomeStatus::Failed => (
                format!("Task failed on \"{}\"", outcome.host),
                AlertType::Error,
            ),
            OutcomeStatus::Unreachable => (
                format!("Failed on unreachable host \"{}\"", outcome.host),
                AlertType::Error,
            ),
            OutcomeStatus::Changed => (
                format!("Task changed on \"{}\"", outcome.host),
                AlertType::Success,
            ),
            OutcomeStatus::Ok | OutcomeStatus::Skipped => (
                format!("Task completed on \"{}\"", outcome.host),
                AlertType::Info,
            ),
        };

        let mut tags = vec![outcome.module_tag()];
        if let Some(play) = context.play() {
            tags.push(format!("play:{}", play));
        }
        tags.extend(context.default_tags());

        Event {
            title,
            text: outcome.body.clone(),
            alert_type,
            priority: alert_type.into(),
            tags,
            host: Some(outcome.host.clone()),
            category: EventCategory::Task,
            event_object: Some(outcome.host.clone()),
        }
    }

    /// Build a run-level event, tagged with the run's default tags only.
    pub fn run_event(
        &self,
        category: EventCategory,
        title: impl Into<String>,
        alert_type: AlertType,
        text: impl Into<String>,
        context: &RunContext,
    ) -> Event {
        Event {
            title: title.into(),
            text: text.into(),
            alert_type,
            priority: alert_type.into(),
            tags: context.default_tags(),
            host: None,
            category,
            event_object: Some(context.name().to_string()),
        }
    }
}

// ============================================================================
// Formatting Helpers
// ============================================================================

/// Format a count with a singular or plural noun: `1 task`, `0 tasks`.
pub fn pluralize(count: u64, noun: &str) -> String {
    if count == 1 {
        format!("1 {}", noun)
    } else {
        format!("{} {}s", count, noun)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::{RawTaskResult, ResultClassifier};
    use crate::timeline::{RunStart, RunTimeline};
    use pretty_assertions::assert_eq;

    fn running_timeline() -> RunTimeline {
        let mut timeline = RunTimeline::new();
        timeline.start(&RunStart::named("site"));
        timeline
    }

    fn failed_outcome(host: &str) -> Outcome {
        ResultClassifier::new()
            .classify_failed(host, &RawTaskResult::new().with_msg("boom"), false)
            .remove(0)
    }

    #[test]
    fn test_pluralize() {
        assert_eq!(pluralize(1, "task"), "1 task");
        assert_eq!(pluralize(0, "task"), "0 tasks");
        assert_eq!(pluralize(5, "host"), "5 hosts");
        assert_eq!(pluralize(2, "second"), "2 seconds");
    }

    #[test]
    fn test_priority_mapping() {
        assert_eq!(Priority::from(AlertType::Error), Priority::Normal);
        assert_eq!(Priority::from(AlertType::Success), Priority::Low);
        assert_eq!(Priority::from(AlertType::Info), Priority::Low);
    }

    #[test]
    fn test_task_event_carries_host_and_tags() {
        let timeline = running_timeline();
        let event = EventFactory::new().task_event(&failed_outcome("web1"), timeline.context());

        assert_eq!(event.title, "Task failed on \"web1\"");
        assert_eq!(event.alert_type, AlertType::Error);
        assert_eq!(event.priority, Priority::Normal);
        assert_eq!(event.host.as_deref(), Some("web1"));
        assert_eq!(event.category, EventCategory::Task);
        assert_eq!(event.event_type(), "config_management.task");
        assert_eq!(event.event_object.as_deref(), Some("web1"));
        assert_eq!(
            event.tags,
            vec!["module:undefined".to_string(), "playbook:site".to_string()]
        );
    }

    #[test]
    fn test_task_event_includes_play_tag_when_active() {
        let mut timeline = running_timeline();
        timeline.set_play("configure webservers");

        let event = EventFactory::new().task_event(&failed_outcome("web1"), timeline.context());
        assert_eq!(
            event.tags,
            vec![
                "module:undefined".to_string(),
                "play:configure webservers".to_string(),
                "playbook:site".to_string(),
            ]
        );
    }

    #[test]
    fn test_exactly_one_playbook_tag() {
        let timeline = running_timeline();
        let event = EventFactory::new().task_event(&failed_outcome("web1"), timeline.context());
        let playbook_tags = event
            .tags
            .iter()
            .filter(|t| t.starts_with("playbook:"))
            .count();
        assert_eq!(playbook_tags, 1);
    }

    #[test]
    fn test_unreachable_title() {
        let outcome = ResultClassifier::new()
            .classify_unreachable("db1", &RawTaskResult::new())
            .remove(0);
        let timeline = running_timeline();
        let event = EventFactory::new().task_event(&outcome, timeline.context());
        assert_eq!(event.title, "Failed on unreachable host \"db1\"");
        assert_eq!(event.alert_type, AlertType::Error);
    }

    #[test]
    fn test_delegated_title_names_both_hosts() {
        let raw = RawTaskResult::new()
            .with_changed(true)
            .with_delegated_host("lb1");
        let outcome = ResultClassifier::new().classify_ok("web1", &raw).remove(0);
        let timeline = running_timeline();
        let event = EventFactory::new().task_event(&outcome, timeline.context());
        assert_eq!(event.title, "Task changed on \"web1 -> lb1\"");
        assert_eq!(event.host.as_deref(), Some("web1 -> lb1"));
    }

    #[test]
    fn test_run_event_uses_default_tags_and_run_object() {
        let timeline = running_timeline();
        let event = EventFactory::new().run_event(
            EventCategory::RunStart,
            "Playbook \"site\" started",
            AlertType::Info,
            "",
            timeline.context(),
        );

        assert_eq!(event.tags, vec!["playbook:site".to_string()]);
        assert!(event.host.is_none());
        assert_eq!(event.event_type(), "config_management.run.start");
        assert_eq!(event.event_object.as_deref(), Some("site"));
        assert_eq!(event.priority, Priority::Low);
    }

    #[test]
    fn test_event_serialization() {
        let timeline = running_timeline();
        let event = EventFactory::new().task_event(&failed_outcome("web1"), timeline.context());
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"alert_type\":\"error\""));
        assert!(json.contains("\"priority\":\"normal\""));
        assert!(json.contains("\"category\":\"task\""));
    }
}
