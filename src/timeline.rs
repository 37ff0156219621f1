//! Run lifecycle tracking.
//!
//! One automation run moves through three phases:
//!
//! ```text
//! NotStarted ──run start──▶ Running ──finalize──▶ Completed
//! ```
//!
//! [`RunTimeline`] owns the transitions and the [`RunContext`] (run name,
//! start instant, active play). The first run-start signal derives the run
//! name and records the start instant; later start signals are idempotent
//! no-ops. The finalize transition is terminal: outcomes recorded after it
//! are a caller error, surfaced as [`Error::RunCompleted`] rather than
//! silently dropped.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Run name used when neither a declared name nor a source file is available.
const FALLBACK_RUN_NAME: &str = "PLAY";

// ============================================================================
// Run Start Signal
// ============================================================================

/// Payload of the run-start signal from the host runtime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunStart {
    /// Declared run name, when the workflow carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Source file the run was loaded from; its stem names the run when no
    /// declared name exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    /// Human-readable description of the targeted inventory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inventory: Option<String>,
    /// Username that launched the run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initiator: Option<String>,
}

impl RunStart {
    /// Create a run-start signal with a declared name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Create a run-start signal from a source file path.
    pub fn from_source(source: impl Into<PathBuf>) -> Self {
        Self {
            source: Some(source.into()),
            ..Default::default()
        }
    }

    /// Set the inventory description.
    pub fn with_inventory(mut self, inventory: impl Into<String>) -> Self {
        self.inventory = Some(inventory.into());
        self
    }

    /// Set the initiating username.
    pub fn with_initiator(mut self, initiator: impl Into<String>) -> Self {
        self.initiator = Some(initiator.into());
        self
    }

    /// Derive the run name: declared name, else source file stem, else "PLAY".
    pub fn derive_name(&self) -> String {
        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        if let Some(stem) = self
            .source
            .as_deref()
            .and_then(Path::file_stem)
            .map(|s| s.to_string_lossy())
            .filter(|s| !s.is_empty())
        {
            return stem.into_owned();
        }
        FALLBACK_RUN_NAME.to_string()
    }
}

// ============================================================================
// Run Context
// ============================================================================

/// Identity and timing for one automation run.
///
/// The name and start instant are set exactly once by the first run-start
/// signal. Default tags are recomputed on every read since the name may be
/// populated after construction but before first use.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    name: Option<String>,
    play: Option<String>,
    start: Option<Instant>,
}

impl RunContext {
    /// The run name, or the "PLAY" placeholder before the run has started.
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(FALLBACK_RUN_NAME)
    }

    /// The active play name, if a play-start signal has been seen.
    pub fn play(&self) -> Option<&str> {
        self.play.as_deref()
    }

    /// Instant the run started, if it has.
    pub fn start(&self) -> Option<Instant> {
        self.start
    }

    /// Default tags attached to every event and metric of this run.
    pub fn default_tags(&self) -> Vec<String> {
        vec![format!("playbook:{}", self.name())]
    }

    fn set_name_once(&mut self, name: String) {
        if self.name.is_none() {
            self.name = Some(name);
        }
    }

    fn set_start_once(&mut self, at: Instant) {
        if self.start.is_none() {
            self.start = Some(at);
        }
    }

    pub(crate) fn set_play(&mut self, play: impl Into<String>) {
        self.play = Some(play.into());
    }
}

// ============================================================================
// Run Timeline State Machine
// ============================================================================

/// Phase of the run lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    /// No run-start signal seen yet.
    NotStarted,
    /// Run in progress; outcomes are accepted.
    Running,
    /// Finalized; any further signal is a caller error.
    Completed,
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunPhase::NotStarted => write!(f, "not_started"),
            RunPhase::Running => write!(f, "running"),
            RunPhase::Completed => write!(f, "completed"),
        }
    }
}

/// Tracks run identity and orders the lifecycle events the engine may emit.
#[derive(Debug)]
pub struct RunTimeline {
    phase: RunPhase,
    context: RunContext,
}

impl Default for RunTimeline {
    fn default() -> Self {
        Self::new()
    }
}

impl RunTimeline {
    /// Create a timeline in the `NotStarted` phase.
    pub fn new() -> Self {
        Self {
            phase: RunPhase::NotStarted,
            context: RunContext::default(),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// The run context.
    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Record a play-start signal on the context.
    pub fn set_play(&mut self, play: impl Into<String>) {
        self.context.set_play(play);
    }

    /// Apply the run-start signal.
    ///
    /// Returns `true` when this call performed the `NotStarted -> Running`
    /// transition. Any later call leaves the name and start instant untouched
    /// and returns `false`.
    pub fn start(&mut self, start: &RunStart) -> bool {
        if self.phase != RunPhase::NotStarted {
            return false;
        }
        self.context.set_name_once(start.derive_name());
        self.context.set_start_once(Instant::now());
        self.phase = RunPhase::Running;
        true
    }

    /// Returns an error unless the run is in the `Running` phase.
    pub fn ensure_running(&self) -> Result<()> {
        match self.phase {
            RunPhase::Running => Ok(()),
            RunPhase::NotStarted => Err(Error::RunNotStarted),
            RunPhase::Completed => Err(Error::RunCompleted),
        }
    }

    /// Apply the finalize signal, returning the elapsed wall-clock duration.
    ///
    /// Terminal: a second finalize, or one before the run started, is an
    /// error.
    pub fn finish(&mut self) -> Result<Duration> {
        self.ensure_running()?;
        self.phase = RunPhase::Completed;
        // ensure_running guarantees start() ran, which set the instant.
        let started = self.context.start().ok_or(Error::RunNotStarted)?;
        Ok(started.elapsed())
    }
}
