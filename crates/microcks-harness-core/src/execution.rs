// crates/microcks-harness-core/src/execution.rs
// ============================================================================
// Module: Microcks Harness Test Execution
// Description: Submit a conformance test and poll it under a deadline.
// Purpose: Turn the backend's asynchronous test run into one awaited call.
// Dependencies: thiserror, tokio, tokio-util, tracing, url
// ============================================================================

//! ## Overview
//! [`TestExecutionCoordinator::run_test`] submits a [`TestRequest`], waits an
//! initial delay, then refreshes the result at a fixed interval until it is
//! terminal or the linked cancellation scope fires. The scope fires at
//! `timeout + grace` or when the caller cancels. Either way one final fetch
//! is returned as the authoritative result, which may still be in progress.
//! Invariants:
//! - Polls for one result id never overlap.
//! - Cancellation only takes effect between calls; an issued refresh completes.
//! - Timeouts and cancellation are never reported as errors.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;
use url::form_urlencoded;

use crate::cancel::CancellationScope;
use crate::client::ClientError;
use crate::client::RemoteServiceClient;
use crate::model::BackendName;
use crate::model::RequestError;
use crate::model::RequestResponsePair;
use crate::model::TestRequest;
use crate::model::TestResult;
use crate::policy::PollingPolicy;
use crate::telemetry::HarnessMetrics;
use crate::telemetry::NoopMetrics;
use crate::telemetry::PollOutcome;
use crate::telemetry::TestPollEvent;
use crate::telemetry::TestRunEvent;
use crate::telemetry::TestRunOutcome;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Test run failures.
///
/// # Invariants
/// - Deadline expiry and caller cancellation are not represented here.
#[derive(Debug, Clone, Error)]
pub enum TestRunError {
    /// Request failed validation before submission.
    #[error("invalid test request: {0}")]
    InvalidRequest(#[from] RequestError),
    /// Backend returned a result without an id.
    #[error("backend returned a test result without an id")]
    MissingResultId,
    /// Submit, refresh, or message fetch failed.
    #[error(transparent)]
    Client(#[from] ClientError),
}

// ============================================================================
// SECTION: Test Case Identity
// ============================================================================

/// Sentinel replacing `/` in operation names before encoding.
const PATH_SENTINEL: char = '!';

/// Builds the composite test-case id `{result}-{number}-{encoded operation}`.
///
/// The operation name has `/` replaced by `!` and is then form-urlencoded,
/// so `GET /pastries` becomes `GET+%21pastries`.
#[must_use]
pub fn test_case_id(test_result_id: &str, test_number: u64, operation_name: &str) -> String {
    let operation = operation_name.replace('/', &PATH_SENTINEL.to_string());
    let encoded = form_urlencoded::byte_serialize(operation.as_bytes()).collect::<String>();
    format!("{test_result_id}-{test_number}-{encoded}")
}

// ============================================================================
// SECTION: Coordinator
// ============================================================================

/// Runs conformance tests against one backend.
pub struct TestExecutionCoordinator {
    /// Backend identity used in logs and metrics.
    backend: BackendName,
    /// Shared client handle.
    client: Arc<dyn RemoteServiceClient>,
    /// Poll timing.
    polling: PollingPolicy,
    /// Metrics sink.
    metrics: Arc<dyn HarnessMetrics>,
}

impl TestExecutionCoordinator {
    /// Creates a coordinator.
    #[must_use]
    pub fn new(
        backend: BackendName,
        client: Arc<dyn RemoteServiceClient>,
        polling: PollingPolicy,
    ) -> Self {
        Self {
            backend,
            client,
            polling,
            metrics: Arc::new(NoopMetrics),
        }
    }

    /// Replaces the metrics sink.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn HarnessMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Submits a test and polls it to completion or deadline.
    ///
    /// # Errors
    ///
    /// Returns [`TestRunError`] when validation, submission, a non-transient
    /// refresh, or the final fetch fails.
    pub async fn run_test(
        &self,
        request: &TestRequest,
        cancel: &CancellationToken,
    ) -> Result<TestResult, TestRunError> {
        request.validate()?;
        let started = Instant::now();
        let submitted = self.client.submit_test(request).await?;
        if submitted.id.is_empty() {
            return Err(TestRunError::MissingResultId);
        }
        let test_result_id = submitted.id;
        info!(
            backend = %self.backend,
            test_result_id = %test_result_id,
            service_id = %request.service_id,
            runner = request.runner_type.as_str(),
            "test submitted"
        );

        {
            let scope = CancellationScope::with_timeout(
                cancel,
                self.polling.effective_budget(request.timeout),
            );
            if scope.sleep(self.polling.initial_delay).await {
                self.poll_until_terminal(&test_result_id, &scope).await?;
            }
            if let Some(reason) = scope.reason() {
                warn!(
                    backend = %self.backend,
                    test_result_id = %test_result_id,
                    reason = reason.as_str(),
                    "test polling stopped before completion"
                );
            }
        }

        let result = self.client.refresh_test(&test_result_id).await?;
        let outcome = match (result.is_terminal(), result.success) {
            (false, _) => TestRunOutcome::Incomplete,
            (true, true) => TestRunOutcome::Passed,
            (true, false) => TestRunOutcome::Failed,
        };
        self.metrics.record_test_run(TestRunEvent {
            backend: self.backend.clone(),
            test_result_id: test_result_id.clone(),
            outcome,
            elapsed: started.elapsed(),
        });
        info!(
            backend = %self.backend,
            test_result_id = %test_result_id,
            outcome = outcome.as_str(),
            "test finished"
        );
        Ok(result)
    }

    /// Refreshes until the result is terminal or the scope fires.
    async fn poll_until_terminal(
        &self,
        test_result_id: &str,
        scope: &CancellationScope,
    ) -> Result<(), TestRunError> {
        loop {
            if scope.is_cancelled() {
                return Ok(());
            }
            let outcome = match self.client.refresh_test(test_result_id).await {
                Ok(snapshot) if snapshot.is_terminal() => PollOutcome::Terminal,
                Ok(_) => PollOutcome::InProgress,
                Err(err) if err.is_transient() => {
                    warn!(
                        backend = %self.backend,
                        test_result_id,
                        error = %err,
                        "transient error refreshing test result"
                    );
                    PollOutcome::Transient
                }
                Err(err) => return Err(err.into()),
            };
            self.metrics.record_test_poll(TestPollEvent {
                backend: self.backend.clone(),
                test_result_id: test_result_id.to_string(),
                outcome,
            });
            if outcome == PollOutcome::Terminal {
                return Ok(());
            }
            debug!(backend = %self.backend, test_result_id, outcome = outcome.as_str(), "test still running");
            if !scope.sleep(self.polling.interval).await {
                return Ok(());
            }
        }
    }

    /// Fetches the exchanges captured for one operation of a result.
    ///
    /// # Errors
    ///
    /// Returns [`TestRunError::Client`] when the fetch fails.
    pub async fn get_messages(
        &self,
        result: &TestResult,
        operation_name: &str,
    ) -> Result<Vec<RequestResponsePair>, TestRunError> {
        let test_case = test_case_id(&result.id, result.test_number, operation_name);
        debug!(backend = %self.backend, test_result_id = %result.id, test_case = %test_case, "fetching test case messages");
        let pairs = self.client.test_case_messages(&result.id, &test_case).await?;
        Ok(pairs)
    }
}
