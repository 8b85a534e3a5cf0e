// crates/microcks-harness-core/src/telemetry.rs
// ============================================================================
// Module: Microcks Harness Telemetry
// Description: Observability hooks for readiness, synchronization, and tests.
// Purpose: Provide metric events without hard dependencies on a backend.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! This module exposes a thin metrics interface counting health attempts,
//! artifact attempts, test polls, and finished test runs. Deployments plug in
//! Prometheus or OpenTelemetry by implementing [`HarnessMetrics`].
//! Labels are stable enums; raw payloads are never recorded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use crate::artifact::ArtifactCategory;
use crate::model::BackendName;

// ============================================================================
// SECTION: Metric Labels
// ============================================================================

/// Health attempt outcome classification.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum HealthOutcome {
    /// Backend answered with a 2xx status.
    Healthy,
    /// Backend answered with a non-2xx status.
    Unhealthy,
    /// No response was received.
    Error,
}

impl HealthOutcome {
    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Unhealthy => "unhealthy",
            Self::Error => "error",
        }
    }
}

/// Artifact attempt outcome classification.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ArtifactOutcome {
    /// Backend answered `201 Created`.
    Created,
    /// Backend answered with any other status.
    UnexpectedStatus,
    /// Transport failure eligible for retry.
    Transient,
    /// Non-retryable client failure.
    Failed,
}

impl ArtifactOutcome {
    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::UnexpectedStatus => "unexpected_status",
            Self::Transient => "transient",
            Self::Failed => "failed",
        }
    }
}

/// Test poll outcome classification.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum PollOutcome {
    /// Snapshot still reports `inProgress`.
    InProgress,
    /// Snapshot is terminal.
    Terminal,
    /// Refresh failed with a transient transport error.
    Transient,
}

impl PollOutcome {
    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Terminal => "terminal",
            Self::Transient => "transient",
        }
    }
}

/// Final test run classification.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum TestRunOutcome {
    /// Terminal and successful.
    Passed,
    /// Terminal and failed.
    Failed,
    /// Still in progress when the poll loop stopped.
    Incomplete,
}

impl TestRunOutcome {
    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Incomplete => "incomplete",
        }
    }
}

// ============================================================================
// SECTION: Events
// ============================================================================

/// One health endpoint call.
#[derive(Debug, Clone)]
pub struct HealthAttemptEvent {
    /// Backend identity.
    pub backend: BackendName,
    /// One-based attempt number.
    pub attempt: u32,
    /// Attempt outcome.
    pub outcome: HealthOutcome,
}

/// One artifact upload, import, or download call.
#[derive(Debug, Clone)]
pub struct ArtifactAttemptEvent {
    /// Backend identity.
    pub backend: BackendName,
    /// Artifact category.
    pub category: ArtifactCategory,
    /// One-based attempt number.
    pub attempt: u32,
    /// Attempt outcome.
    pub outcome: ArtifactOutcome,
}

/// One refresh call inside the test poll loop.
#[derive(Debug, Clone)]
pub struct TestPollEvent {
    /// Backend identity.
    pub backend: BackendName,
    /// Polled test result id.
    pub test_result_id: String,
    /// Poll outcome.
    pub outcome: PollOutcome,
}

/// A test run returned to the caller.
#[derive(Debug, Clone)]
pub struct TestRunEvent {
    /// Backend identity.
    pub backend: BackendName,
    /// Test result id.
    pub test_result_id: String,
    /// Final classification.
    pub outcome: TestRunOutcome,
    /// Time from submission to the authoritative fetch.
    pub elapsed: Duration,
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Metrics sink for orchestration events.
pub trait HarnessMetrics: Send + Sync {
    /// Records one health endpoint call.
    fn record_health_attempt(&self, event: HealthAttemptEvent);
    /// Records one artifact call.
    fn record_artifact_attempt(&self, event: ArtifactAttemptEvent);
    /// Records one poll-loop refresh.
    fn record_test_poll(&self, event: TestPollEvent);
    /// Records a finished test run.
    fn record_test_run(&self, event: TestRunEvent);
}

/// No-op metrics sink.
///
/// # Invariants
/// - Metrics are discarded.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl HarnessMetrics for NoopMetrics {
    fn record_health_attempt(&self, _event: HealthAttemptEvent) {}

    fn record_artifact_attempt(&self, _event: ArtifactAttemptEvent) {}

    fn record_test_poll(&self, _event: TestPollEvent) {}

    fn record_test_run(&self, _event: TestRunEvent) {}
}
