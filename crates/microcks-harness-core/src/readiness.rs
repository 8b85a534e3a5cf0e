// crates/microcks-harness-core/src/readiness.rs
// ============================================================================
// Module: Microcks Harness Readiness Watcher
// Description: Startup log watch followed by bounded health polling.
// Purpose: Decide when the backend can accept synchronization and tests.
// Dependencies: tokio, tokio-stream, tokio-util, tracing
// ============================================================================

//! ## Overview
//! The watcher runs `WatchingStartupSignal -> PollingHealth -> {Healthy,
//! Unhealthy}`. The log watch ends on the startup marker, on end of stream,
//! or on cancellation; in every case health polling follows. Readiness is
//! advisory: the watcher never returns an error, and callers inspect the
//! terminal [`ReadinessState`].
//! Invariants:
//! - The log stream is dropped before health polling starts.
//! - At most `health_attempts` health calls are issued per wait.
//! - Cancellation is checked at the top of every attempt.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tokio_stream::Stream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::cancel::CancellationScope;
use crate::client::RemoteServiceClient;
use crate::model::BackendName;
use crate::policy::ReadinessPolicy;
use crate::telemetry::HarnessMetrics;
use crate::telemetry::HealthAttemptEvent;
use crate::telemetry::HealthOutcome;
use crate::telemetry::NoopMetrics;

// ============================================================================
// SECTION: States
// ============================================================================

/// Readiness state machine positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessState {
    /// Scanning backend logs for the startup marker.
    WatchingStartupSignal,
    /// Calling the health endpoint.
    PollingHealth,
    /// Health endpoint answered 2xx.
    Healthy,
    /// Attempts exhausted or cancelled without a healthy answer.
    Unhealthy,
}

impl ReadinessState {
    /// Returns a stable label for the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WatchingStartupSignal => "watching_startup_signal",
            Self::PollingHealth => "polling_health",
            Self::Healthy => "healthy",
            Self::Unhealthy => "unhealthy",
        }
    }

    /// Returns true for `Healthy` and `Unhealthy`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Healthy | Self::Unhealthy)
    }

    /// Returns true only for `Healthy`.
    #[must_use]
    pub const fn is_healthy(self) -> bool {
        matches!(self, Self::Healthy)
    }
}

impl fmt::Display for ReadinessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the log watch phase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupSignal {
    /// A line contained the startup marker.
    MarkerSeen,
    /// The log stream ended without the marker.
    StreamEnded,
    /// The caller cancelled while watching.
    Cancelled,
    /// No log stream was supplied.
    Skipped,
}

impl StartupSignal {
    /// Returns a stable label for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MarkerSeen => "marker_seen",
            Self::StreamEnded => "stream_ended",
            Self::Cancelled => "cancelled",
            Self::Skipped => "skipped",
        }
    }
}

// ============================================================================
// SECTION: Watcher
// ============================================================================

/// Detects backend usability for one backend identity.
pub struct ReadinessWatcher {
    /// Backend identity used in logs and metrics.
    backend: BackendName,
    /// Shared client handle.
    client: Arc<dyn RemoteServiceClient>,
    /// Marker and health attempt settings.
    policy: ReadinessPolicy,
    /// Metrics sink.
    metrics: Arc<dyn HarnessMetrics>,
    /// Current state, observable by subscribers.
    state: watch::Sender<ReadinessState>,
}

impl ReadinessWatcher {
    /// Creates a watcher starting in `WatchingStartupSignal`.
    #[must_use]
    pub fn new(
        backend: BackendName,
        client: Arc<dyn RemoteServiceClient>,
        policy: ReadinessPolicy,
    ) -> Self {
        let (state, _) = watch::channel(ReadinessState::WatchingStartupSignal);
        Self {
            backend,
            client,
            policy,
            metrics: Arc::new(NoopMetrics),
            state,
        }
    }

    /// Replaces the metrics sink.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn HarnessMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Returns the latest state.
    #[must_use]
    pub fn state(&self) -> ReadinessState {
        *self.state.borrow()
    }

    /// Subscribes to state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ReadinessState> {
        self.state.subscribe()
    }

    /// Runs the full state machine and returns the terminal state.
    ///
    /// `logs` is the backend's log line stream; pass `None` to go straight to
    /// health polling.
    pub async fn wait_until_ready<S>(
        &self,
        logs: Option<S>,
        cancel: &CancellationToken,
    ) -> ReadinessState
    where
        S: Stream<Item = String> + Send + Unpin,
    {
        self.transition(ReadinessState::WatchingStartupSignal);
        let signal = match logs {
            Some(logs) => self.watch_startup_signal(logs, cancel).await,
            None => StartupSignal::Skipped,
        };
        debug!(backend = %self.backend, signal = signal.as_str(), "startup log watch finished");

        self.transition(ReadinessState::PollingHealth);
        info!(backend = %self.backend, "waiting for backend to be healthy");
        let terminal = self.poll_health(cancel).await;
        self.transition(terminal);
        terminal
    }

    /// Scans log lines until the marker appears, the stream ends, or the caller cancels.
    async fn watch_startup_signal<S>(&self, mut logs: S, cancel: &CancellationToken) -> StartupSignal
    where
        S: Stream<Item = String> + Send + Unpin,
    {
        let marker = self.policy.startup_marker.to_lowercase();
        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return StartupSignal::Cancelled,
                next = logs.next() => next,
            };
            match next {
                None => return StartupSignal::StreamEnded,
                Some(line) if line.to_lowercase().contains(&marker) => {
                    return StartupSignal::MarkerSeen;
                }
                Some(_) => {}
            }
        }
    }

    /// Issues bounded health calls; never fails.
    async fn poll_health(&self, cancel: &CancellationToken) -> ReadinessState {
        let scope = CancellationScope::linked(cancel);
        for attempt in 1..=self.policy.health_attempts {
            if scope.is_cancelled() {
                info!(backend = %self.backend, attempt, "health check cancelled");
                return ReadinessState::Unhealthy;
            }
            let outcome = match self.client.check_health().await {
                Ok(status) if status.is_success() => HealthOutcome::Healthy,
                Ok(status) => {
                    debug!(
                        backend = %self.backend,
                        attempt,
                        status = status.as_u16(),
                        "health endpoint not ready"
                    );
                    HealthOutcome::Unhealthy
                }
                Err(err) => {
                    warn!(backend = %self.backend, attempt, error = %err, "health check failed");
                    HealthOutcome::Error
                }
            };
            self.metrics.record_health_attempt(HealthAttemptEvent {
                backend: self.backend.clone(),
                attempt,
                outcome,
            });
            if outcome == HealthOutcome::Healthy {
                info!(backend = %self.backend, attempt, "backend is healthy");
                return ReadinessState::Healthy;
            }
            if !scope.sleep(self.policy.health_delay).await {
                info!(backend = %self.backend, attempt, "health check cancelled");
                return ReadinessState::Unhealthy;
            }
        }
        info!(backend = %self.backend, "backend is unhealthy");
        ReadinessState::Unhealthy
    }

    /// Publishes a new state to subscribers.
    fn transition(&self, next: ReadinessState) {
        self.state.send_replace(next);
    }
}
