// crates/microcks-harness-core/src/sync.rs
// ============================================================================
// Module: Microcks Harness Artifact Synchronizer
// Description: Ordered artifact push with bounded transient retry.
// Purpose: Load contracts, collections, and snapshots into the backend once.
// Dependencies: reqwest, thiserror, tokio-util, tracing
// ============================================================================

//! ## Overview
//! One synchronization pass walks the [`ArtifactSet`] in category order and
//! issues one upload, download, or import call per artifact. `201 Created` is
//! the only success status. Transient transport failures are retried with a
//! fixed delay up to the policy ceiling; after the final attempt the last
//! failure is returned. Any other failure aborts the pass.
//! Invariants:
//! - Artifacts are processed strictly sequentially in [`ArtifactSet::ordered`] order.
//! - Unexpected statuses are never retried.
//! - Cancellation during a retry delay aborts the pass with [`SyncError::Cancelled`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::artifact::ArtifactCategory;
use crate::artifact::ArtifactRef;
use crate::artifact::ArtifactSet;
use crate::cancel::CancellationScope;
use crate::client::ArtifactUpload;
use crate::client::ClientError;
use crate::client::RemoteServiceClient;
use crate::model::BackendName;
use crate::policy::RetryPolicy;
use crate::telemetry::ArtifactAttemptEvent;
use crate::telemetry::ArtifactOutcome;
use crate::telemetry::HarnessMetrics;
use crate::telemetry::NoopMetrics;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Synchronization failures; each one aborts the remaining pass.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    /// Backend answered with a status other than `201 Created`.
    #[error("failed to synchronize {category} artifact '{artifact}': status {status}")]
    UnexpectedStatus {
        /// Artifact label.
        artifact: String,
        /// Artifact category.
        category: ArtifactCategory,
        /// Status returned by the backend.
        status: StatusCode,
    },
    /// Client call failed and was not retried further.
    #[error("failed to synchronize {category} artifact '{artifact}' after {attempts} attempt(s): {source}")]
    Client {
        /// Artifact label.
        artifact: String,
        /// Artifact category.
        category: ArtifactCategory,
        /// Attempts issued for this artifact.
        attempts: u32,
        /// Last client failure.
        #[source]
        source: ClientError,
    },
    /// Caller cancelled while retrying.
    #[error("synchronization of '{artifact}' cancelled")]
    Cancelled {
        /// Artifact being processed.
        artifact: String,
    },
    /// The artifacts were already pushed for this backend.
    #[error("artifacts already synchronized")]
    AlreadySynchronized,
}

// ============================================================================
// SECTION: Report
// ============================================================================

/// One artifact confirmed by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncedArtifact {
    /// Artifact category.
    pub category: ArtifactCategory,
    /// Artifact label (file name or URL).
    pub artifact: String,
    /// Attempts needed, including the successful one.
    pub attempts: u32,
}

/// Outcome of a successful synchronization pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Confirmed artifacts in processing order.
    pub artifacts: Vec<SyncedArtifact>,
}

impl SyncReport {
    /// Returns the total number of calls issued during the pass.
    #[must_use]
    pub fn total_attempts(&self) -> u32 {
        self.artifacts.iter().map(|artifact| artifact.attempts).sum()
    }
}

// ============================================================================
// SECTION: Synchronizer
// ============================================================================

/// Pushes artifacts into one backend.
pub struct ArtifactSynchronizer {
    /// Backend identity used in logs and metrics.
    backend: BackendName,
    /// Shared client handle.
    client: Arc<dyn RemoteServiceClient>,
    /// Transient retry policy.
    retry: RetryPolicy,
    /// Metrics sink.
    metrics: Arc<dyn HarnessMetrics>,
}

impl ArtifactSynchronizer {
    /// Creates a synchronizer.
    #[must_use]
    pub fn new(backend: BackendName, client: Arc<dyn RemoteServiceClient>, retry: RetryPolicy) -> Self {
        Self {
            backend,
            client,
            retry,
            metrics: Arc::new(NoopMetrics),
        }
    }

    /// Replaces the metrics sink.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn HarnessMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Runs one pass over the set in category order.
    ///
    /// # Errors
    ///
    /// Returns the first [`SyncError`]; later artifacts are not attempted.
    pub async fn synchronize(
        &self,
        artifacts: &ArtifactSet,
        cancel: &CancellationToken,
    ) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::default();
        for artifact in artifacts.ordered() {
            let attempts = self.sync_artifact(artifact, cancel).await?;
            report.artifacts.push(SyncedArtifact {
                category: artifact.category(),
                artifact: artifact.label(),
                attempts,
            });
        }
        info!(
            backend = %self.backend,
            artifacts = report.artifacts.len(),
            "artifact synchronization complete"
        );
        Ok(report)
    }

    /// Pushes one artifact, retrying transient failures.
    ///
    /// Returns the number of attempts issued.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] on an unexpected status, a non-transient client
    /// failure, retry exhaustion, or cancellation.
    pub async fn sync_artifact(
        &self,
        artifact: &ArtifactRef,
        cancel: &CancellationToken,
    ) -> Result<u32, SyncError> {
        let label = artifact.label();
        let category = artifact.category();
        let max_attempts = self.retry.max_attempts.max(1);
        let scope = CancellationScope::linked(cancel);
        let mut attempt = 1;
        loop {
            if scope.is_cancelled() {
                return Err(SyncError::Cancelled {
                    artifact: label,
                });
            }
            match self.send(artifact).await {
                Ok(status) if status == StatusCode::CREATED => {
                    self.record(category, attempt, ArtifactOutcome::Created);
                    info!(
                        backend = %self.backend,
                        artifact = %label,
                        category = category.as_str(),
                        attempt,
                        "artifact synchronized"
                    );
                    return Ok(attempt);
                }
                Ok(status) => {
                    self.record(category, attempt, ArtifactOutcome::UnexpectedStatus);
                    error!(
                        backend = %self.backend,
                        artifact = %label,
                        category = category.as_str(),
                        status = status.as_u16(),
                        "artifact rejected by backend"
                    );
                    return Err(SyncError::UnexpectedStatus {
                        artifact: label,
                        category,
                        status,
                    });
                }
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    self.record(category, attempt, ArtifactOutcome::Transient);
                    warn!(
                        backend = %self.backend,
                        artifact = %label,
                        attempt,
                        error = %err,
                        "transient error synchronizing artifact"
                    );
                    if !scope.sleep(self.retry.delay).await {
                        return Err(SyncError::Cancelled {
                            artifact: label,
                        });
                    }
                    attempt += 1;
                }
                Err(err) => {
                    let outcome = if err.is_transient() {
                        ArtifactOutcome::Transient
                    } else {
                        ArtifactOutcome::Failed
                    };
                    self.record(category, attempt, outcome);
                    error!(
                        backend = %self.backend,
                        artifact = %label,
                        attempt,
                        error = %err,
                        "artifact synchronization failed"
                    );
                    return Err(SyncError::Client {
                        artifact: label,
                        category,
                        attempts: attempt,
                        source: err,
                    });
                }
            }
        }
    }

    /// Issues the wire call matching the artifact variant.
    async fn send(&self, artifact: &ArtifactRef) -> Result<StatusCode, ClientError> {
        match artifact {
            ArtifactRef::MainFile {
                path,
            } => self.client.upload_artifact(&ArtifactUpload::from_path(path.clone()), true).await,
            ArtifactRef::SecondaryFile {
                path,
            } => self.client.upload_artifact(&ArtifactUpload::from_path(path.clone()), false).await,
            ArtifactRef::RemoteUrl {
                url,
                main,
            } => self.client.download_artifact(url.as_str(), *main).await,
            ArtifactRef::SnapshotFile {
                path,
            } => self.client.import_artifact(&ArtifactUpload::from_path(path.clone())).await,
        }
    }

    /// Emits one artifact attempt metric.
    fn record(&self, category: ArtifactCategory, attempt: u32, outcome: ArtifactOutcome) {
        self.metrics.record_artifact_attempt(ArtifactAttemptEvent {
            backend: self.backend.clone(),
            category,
            attempt,
            outcome,
        });
    }
}
