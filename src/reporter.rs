//! Reporter boundary: delivery of finished events and metrics.
//!
//! The engine hands fully-formed [`Event`] and [`Metric`] records to a
//! [`Reporter`]. Delivery is fire-and-forget from the engine's perspective:
//! reporters surface failures as an explicit [`ReporterError`], and the
//! engine's calling convention guarantees those are logged and discarded —
//! a delivery failure must never alter the run being observed. Retry policy,
//! if any, belongs to the reporter.
//!
//! Implementations:
//!
//! - [`HttpReporter`]: authenticated JSON delivery to a monitoring backend
//! - [`MemoryReporter`]: captures submissions in memory, with failure
//!   injection for exercising the fire-and-forget contract
//! - [`NullReporter`]: discards everything

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use url::Url;

use crate::config::TelemetryConfig;
use crate::event::{AlertType, Event, Priority};
use crate::metric::Metric;

/// Header carrying the API credential on backend requests.
const API_KEY_HEADER: &str = "X-Api-Key";

/// Upper bound on one delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during delivery.
#[derive(Debug, thiserror::Error)]
pub enum ReporterError {
    /// HTTP transport failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend rejected the submission.
    #[error("Backend rejected submission ({status}): {body}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },

    /// The delivery attempt timed out.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for reporter operations.
pub type ReporterResult<T> = Result<T, ReporterError>;

// ============================================================================
// Reporter Trait
// ============================================================================

/// Delivers finished telemetry records to a backend.
#[async_trait]
pub trait Reporter: Send + Sync {
    /// Deliver one event.
    async fn submit_event(&self, event: &Event) -> ReporterResult<()>;

    /// Deliver one metric point.
    async fn submit_metric(&self, metric: &Metric) -> ReporterResult<()>;
}

// ============================================================================
// Wire Payloads
// ============================================================================

#[derive(Debug, Serialize)]
struct EventPayload<'a> {
    title: &'a str,
    text: &'a str,
    alert_type: AlertType,
    priority: Priority,
    tags: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    host: Option<&'a str>,
    source_type_name: &'a str,
    event_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    event_object: Option<&'a str>,
}

impl<'a> EventPayload<'a> {
    fn new(event: &'a Event, source_type_name: &'a str) -> Self {
        Self {
            title: &event.title,
            text: &event.text,
            alert_type: event.alert_type,
            priority: event.priority,
            tags: &event.tags,
            host: event.host.as_deref(),
            source_type_name,
            event_type: event.event_type(),
            event_object: event.event_object.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
struct SeriesPayload<'a> {
    series: [SeriesPoint<'a>; 1],
}

#[derive(Debug, Serialize)]
struct SeriesPoint<'a> {
    metric: String,
    points: [(i64, f64); 1],
    tags: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    host: Option<&'a str>,
}

// ============================================================================
// HTTP Reporter
// ============================================================================

/// Authenticated JSON delivery to a monitoring backend over HTTP.
///
/// Events go to `<base>/api/v1/events`, metrics to `<base>/api/v1/series`
/// with their names namespaced `<metric_namespace>.<name>` on the wire.
#[derive(Debug, Clone)]
pub struct HttpReporter {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
    metric_namespace: String,
    source_type_name: String,
}

impl HttpReporter {
    /// Build a reporter from configuration.
    ///
    /// Fails when the credential or URL is missing or unparseable; callers
    /// are expected to degrade to disabled mode on error rather than
    /// propagate it.
    pub fn from_config(config: &TelemetryConfig) -> ReporterResult<Self> {
        let api_key = config
            .api_key()
            .ok_or_else(|| ReporterError::Config("no API key configured".to_string()))?
            .to_string();
        let url = config
            .url()
            .ok_or_else(|| ReporterError::Config("no backend URL configured".to_string()))?;

        let mut base_url = Url::parse(url)
            .map_err(|e| ReporterError::Config(format!("invalid backend URL '{}': {}", url, e)))?;
        // Url::join treats a path without a trailing slash as a file and
        // would drop its last segment.
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ReporterError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            api_key,
            metric_namespace: config.metric_namespace.clone(),
            source_type_name: config.source_type_name.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> ReporterResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ReporterError::Config(e.to_string()))
    }

    async fn post<T: Serialize>(&self, url: Url, payload: &T) -> ReporterResult<()> {
        let request = self
            .client
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(payload)
            .send();
        let response = tokio::time::timeout(REQUEST_TIMEOUT, request)
            .await
            .map_err(|_| ReporterError::Timeout(REQUEST_TIMEOUT))??;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ReporterError::Rejected { status, body });
        }
        Ok(())
    }
}

#[async_trait]
impl Reporter for HttpReporter {
    async fn submit_event(&self, event: &Event) -> ReporterResult<()> {
        let url = self.endpoint("api/v1/events")?;
        self.post(url, &EventPayload::new(event, &self.source_type_name))
            .await
    }

    async fn submit_metric(&self, metric: &Metric) -> ReporterResult<()> {
        let url = self.endpoint("api/v1/series")?;
        let payload = SeriesPayload {
            series: [SeriesPoint {
                metric: format!("{}.{}", self.metric_namespace, metric.name),
                points: [(Utc::now().timestamp(), metric.value)],
                tags: &metric.tags,
                host: metric.host.as_deref(),
            }],
        };
        self.post(url, &payload).await
    }
}

// ============================================================================
// Memory Reporter
// ============================================================================

/// Captures every submission in memory. Intended for tests and embedding;
/// `set_failing(true)` makes every submission fail, for exercising the
/// engine's fire-and-forget contract.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    events: Mutex<Vec<Event>>,
    metrics: Mutex<Vec<Metric>>,
    // Submission order across both kinds, as "event:<title>" / "metric:<name>".
    log: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl MemoryReporter {
    /// Create an empty capturing reporter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent submission fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Captured events, in submission order.
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Captured metrics, in submission order.
    pub fn metrics(&self) -> Vec<Metric> {
        self.metrics.lock().clone()
    }

    /// Submission order across events and metrics, as
    /// `event:<title>` / `metric:<name>` entries.
    pub fn submissions(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    fn check_failing(&self) -> ReporterResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ReporterError::Rejected {
                status: 503,
                body: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Reporter for MemoryReporter {
    async fn submit_event(&self, event: &Event) -> ReporterResult<()> {
        self.check_failing()?;
        self.log.lock().push(format!("event:{}", event.title));
        self.events.lock().push(event.clone());
        Ok(())
    }

    async fn submit_metric(&self, metric: &Metric) -> ReporterResult<()> {
        self.check_failing()?;
        self.log.lock().push(format!("metric:{}", metric.name));
        self.metrics.lock().push(metric.clone());
        Ok(())
    }
}

// ============================================================================
// Null Reporter
// ============================================================================

/// Discards every submission. Backs the engine's disabled mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl NullReporter {
    /// Create a null reporter.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Reporter for NullReporter {
    async fn submit_event(&self, _event: &Event) -> ReporterResult<()> {
        Ok(())
    }

    async fn submit_metric(&self, _metric: &Metric) -> ReporterResult<()> {
        Ok(())
    }
}
