//! HTTP-boundary tests for the reporter against a mock backend server.

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use playbeacon::config::TelemetryConfig;
use playbeacon::engine::TelemetryEngine;
use playbeacon::event::{AlertType, Event, EventCategory, Priority};
use playbeacon::metric::{HostSummaries, Metric};
use playbeacon::outcome::RawTaskResult;
use playbeacon::reporter::{HttpReporter, Reporter, ReporterError};
use playbeacon::timeline::RunStart;
use playbeacon::traits::RunObserver;

fn sample_event() -> Event {
    Event {
        title: "Task failed on \"web1\"".to_string(),
        text: "$$$\nboom\n$$$\n".to_string(),
        alert_type: AlertType::Error,
        priority: Priority::Normal,
        tags: vec!["module:apt".to_string(), "playbook:site".to_string()],
        host: Some("web1".to_string()),
        category: EventCategory::Task,
        event_object: Some("web1".to_string()),
    }
}

fn config_for(server: &MockServer) -> TelemetryConfig {
    TelemetryConfig::default()
        .with_api_key("secret")
        .with_url(server.uri())
}

#[tokio::test]
async fn test_submit_event_posts_authenticated_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/events"))
        .and(header("X-Api-Key", "secret"))
        .and(body_partial_json(json!({
            "title": "Task failed on \"web1\"",
            "alert_type": "error",
            "priority": "normal",
            "host": "web1",
            "source_type_name": "playbook",
            "event_type": "config_management.task",
            "event_object": "web1",
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let reporter = HttpReporter::from_config(&config_for(&server)).unwrap();
    reporter.submit_event(&sample_event()).await.unwrap();
}

#[tokio::test]
async fn test_submit_metric_namespaces_the_name() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/series"))
        .and(header("X-Api-Key", "secret"))
        .and(body_partial_json(json!({
            "series": [{
                "metric": "playbook.task.ok",
                "tags": ["playbook:site"],
                "host": "web1",
            }]
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let reporter = HttpReporter::from_config(&config_for(&server)).unwrap();
    reporter
        .submit_metric(&Metric {
            name: "task.ok".to_string(),
            value: 3.0,
            tags: vec!["playbook:site".to_string()],
            host: Some("web1".to_string()),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_backend_rejection_surfaces_as_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/events"))
        .respond_with(ResponseTemplate::new(403).set_body_string("bad key"))
        .mount(&server)
        .await;

    let reporter = HttpReporter::from_config(&config_for(&server)).unwrap();
    let err = reporter.submit_event(&sample_event()).await.unwrap_err();
    match err {
        ReporterError::Rejected { status, body } => {
            assert_eq!(status, 403);
            assert_eq!(body, "bad key");
        }
        other => panic!("expected Rejected, got {:?}", other),
    }
}

#[tokio::test]
async fn test_engine_delivers_over_http_and_survives_rejection() {
    let server = MockServer::start().await;
    // Accept events, reject metrics: the run must still complete cleanly.
    Mock::given(method("POST"))
        .and(path("/api/v1/events"))
        .respond_with(ResponseTemplate::new(202))
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/series"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let engine = TelemetryEngine::from_config(&config_for(&server));
    assert!(!engine.is_disabled());

    engine.on_run_start(&RunStart::named("site")).await;
    engine
        .on_task_ok("web1", &RawTaskResult::new().with_changed(true))
        .await;
    engine.on_run_finished(&HostSummaries::new()).await;
}
