//! # Playbeacon - Telemetry for Playbook Automation Runs
//!
//! Playbeacon observes the execution of a multi-host automation run (a
//! playbook composed of plays composed of per-host tasks) and derives
//! structured telemetry for an external monitoring backend: deduplicated,
//! tagged, prioritized events for state transitions, and aggregated numeric
//! metrics summarized at run completion.
//!
//! ## Core Concepts
//!
//! - **Run**: one execution of an automation workflow across target hosts
//! - **Outcome**: the classified result of one task on one host
//! - **Event**: a discrete, human-readable telemetry record with severity and tags
//! - **Metric**: a numeric telemetry point, optionally tagged and host-scoped
//! - **Reporter**: the collaborator responsible for authenticated delivery
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Host Runtime                             │
//! │      (task scheduling, inventory, process lifecycle)            │
//! └─────────────────────────────────────────────────────────────────┘
//!                 │  lifecycle signals (RunObserver)
//!                 ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      TelemetryEngine                            │
//! │  ┌──────────────┐  ┌──────────────────┐  ┌──────────────────┐   │
//! │  │ RunTimeline  │  │ ResultClassifier │  │ MetricAggregator │   │
//! │  │ (run phase,  │  │ (status, body,   │  │ (per-host counts │   │
//! │  │  identity)   │  │  module tag)     │  │  -> run summary) │   │
//! │  └──────────────┘  └──────────────────┘  └──────────────────┘   │
//! │                      ┌──────────────┐                           │
//! │                      │ EventFactory │                           │
//! │                      └──────────────┘                           │
//! └─────────────────────────────────────────────────────────────────┘
//!                 │  finished Event / Metric records
//!                 ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   Reporter (fire-and-forget)                    │
//! │           HttpReporter │ MemoryReporter │ NullReporter          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use playbeacon::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> playbeacon::Result<()> {
//!     // Missing credentials degrade to a disabled no-op engine.
//!     let engine = TelemetryEngine::from_config(&TelemetryConfig::load()?);
//!
//!     engine
//!         .on_run_start(&RunStart::from_source("site.yml").with_initiator("deploy"))
//!         .await;
//!     engine.on_play_start("configure webservers").await;
//!
//!     let result = RawTaskResult::new()
//!         .with_changed(true)
//!         .with_invocation(Invocation::new("apt"));
//!     engine.on_task_ok("web1", &result).await;
//!
//!     engine.on_run_finished(&HostSummaries::new()).await;
//!     Ok(())
//! }
//! ```
//!
//! Nothing in this crate can abort or alter the run it observes: delivery
//! failures, missing configuration, and malformed payloads all degrade to
//! "telemetry lost" with a local diagnostic.

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

// ============================================================================
// Core Modules
// ============================================================================

/// Error types and result aliases.
pub mod error;

/// Configuration loading: YAML file plus environment overrides.
pub mod config;

/// The inbound observer trait driven by the host runtime.
pub mod traits;

/// Run lifecycle state machine and run identity.
pub mod timeline;

/// Raw task results and outcome classification.
pub mod outcome;

/// Event records, severity/priority mapping, and the event factory.
pub mod event;

/// Metric records and run-level aggregation.
pub mod metric;

/// Delivery boundary: the reporter trait and its implementations.
pub mod reporter;

/// The telemetry engine wiring classification, aggregation, and delivery.
pub mod engine;

pub use error::{Error, Result};

// ============================================================================
// Prelude
// ============================================================================

/// Convenient re-exports of commonly used types and traits.
pub mod prelude {
    pub use crate::config::TelemetryConfig;
    pub use crate::engine::TelemetryEngine;
    pub use crate::error::{Error, Result};
    pub use crate::event::{pluralize, AlertType, Event, EventCategory, EventFactory, Priority};
    pub use crate::metric::{
        ErrorHost, HostCounts, HostSummaries, Metric, MetricAggregator, RunSummary,
    };
    pub use crate::outcome::{
        Invocation, Outcome, OutcomeStatus, RawTaskResult, ResultClassifier,
    };
    pub use crate::reporter::{
        HttpReporter, MemoryReporter, NullReporter, Reporter, ReporterError, ReporterResult,
    };
    pub use crate::timeline::{RunContext, RunPhase, RunStart, RunTimeline};
    pub use crate::traits::RunObserver;

    pub use async_trait::async_trait;
}

// ============================================================================
// Version Information
// ============================================================================

/// Returns the current version of Playbeacon.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
