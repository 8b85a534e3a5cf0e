// crates/microcks-harness-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Utilities
// Description: Shared fakes and fixtures for microcks-harness-core tests.
// Purpose: Script backend replies in memory and capture wire traffic.
// Dependencies: microcks-harness-core, axum, serde_json, tokio
// ============================================================================

//! ## Overview
//! [`FakeClient`] replays scripted replies for every wire call and records
//! the calls it receives, so timing tests can run on a paused clock.
//! [`spawn_backend`] starts an axum server that mimics the backend API for
//! wire-level tests of the HTTP client.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only panic-based assertions are permitted."
)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use axum::Json;
use axum::Router;
use axum::extract::Multipart;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::routing::get;
use axum::routing::post;
use microcks_harness_core::ArtifactUpload;
use microcks_harness_core::ClientError;
use microcks_harness_core::ClientFactory;
use microcks_harness_core::DailyInvocationStatistic;
use microcks_harness_core::RemoteServiceClient;
use microcks_harness_core::RequestResponsePair;
use microcks_harness_core::ServiceEndpoint;
use microcks_harness_core::StatusCode;
use microcks_harness_core::TestRequest;
use microcks_harness_core::TestResult;
use microcks_harness_core::telemetry::ArtifactAttemptEvent;
use microcks_harness_core::telemetry::HarnessMetrics;
use microcks_harness_core::telemetry::HealthAttemptEvent;
use microcks_harness_core::telemetry::TestPollEvent;
use microcks_harness_core::telemetry::TestRunEvent;
use serde_json::Value;
use serde_json::json;
use time::Date;
use tokio::sync::oneshot;

// ============================================================================
// SECTION: Result Builders
// ============================================================================

/// Builds a test result snapshot.
pub fn test_result(id: &str, in_progress: bool, success: bool) -> TestResult {
    serde_json::from_value(json!({
        "id": id,
        "testNumber": 2,
        "inProgress": in_progress,
        "success": success,
        "testCaseResults": []
    }))
    .expect("test result")
}

/// Builds a terminal failed result with one schema mismatch step.
pub fn schema_mismatch_result(id: &str) -> TestResult {
    serde_json::from_value(json!({
        "id": id,
        "testNumber": 2,
        "inProgress": false,
        "success": false,
        "testCaseResults": [{
            "operationName": "GET /pastries",
            "success": false,
            "testStepResults": [{
                "success": false,
                "message": "string found, number expected"
            }]
        }]
    }))
    .expect("schema mismatch result")
}

/// Builds a captured exchange.
pub fn exchange(body: &str) -> RequestResponsePair {
    serde_json::from_value(json!({
        "request": { "content": null, "queryParameters": [{ "name": "size", "value": "S" }] },
        "response": { "status": "200", "content": body }
    }))
    .expect("exchange")
}

/// Builds a transient transport failure.
pub fn transient() -> ClientError {
    ClientError::Transport("connection reset".to_string())
}

// ============================================================================
// SECTION: Fake Client
// ============================================================================

/// One call observed by [`FakeClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// `GET /api/health`.
    Health,
    /// `POST /api/artifact/upload`.
    Upload {
        /// Uploaded file name.
        file_name: String,
        /// Main artifact flag.
        main: bool,
    },
    /// `POST /api/import`.
    Import {
        /// Imported file name.
        file_name: String,
    },
    /// `POST /api/artifact/download`.
    Download {
        /// Remote URL.
        url: String,
        /// Main artifact flag.
        main: bool,
    },
    /// `POST /api/tests`.
    Submit,
    /// `GET /api/tests/{id}`.
    Refresh(String),
    /// `GET /api/tests/{id}/messages/{case}`.
    Messages {
        /// Result id.
        test_result_id: String,
        /// Composite test case id.
        test_case_id: String,
    },
    /// `GET /api/metrics/invocations/...`.
    Invocations {
        /// Service name.
        service: String,
        /// Service version.
        version: String,
        /// Requested day.
        day: Option<Date>,
    },
}

/// Scripted in-memory backend.
pub struct FakeClient {
    /// Health replies consumed in order.
    health: Mutex<VecDeque<Result<StatusCode, ClientError>>>,
    /// Reply once the health script is exhausted.
    health_default: Mutex<Result<StatusCode, ClientError>>,
    /// Upload/import/download replies consumed in order; `201` afterwards.
    artifacts: Mutex<VecDeque<Result<StatusCode, ClientError>>>,
    /// Result returned by submit.
    submitted: Mutex<TestResult>,
    /// Refresh replies consumed in order; the last success repeats afterwards.
    refreshes: Mutex<VecDeque<Result<TestResult, ClientError>>>,
    /// Last successful refresh snapshot.
    last_refresh: Mutex<Option<TestResult>>,
    /// Message fetch reply.
    messages: Mutex<Vec<RequestResponsePair>>,
    /// Invocation statistic reply.
    statistic: Mutex<DailyInvocationStatistic>,
    /// Observed calls.
    calls: Mutex<Vec<Call>>,
}

impl Default for FakeClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeClient {
    /// Creates a fake whose health check always fails with a transport error.
    pub fn new() -> Self {
        Self {
            health: Mutex::new(VecDeque::new()),
            health_default: Mutex::new(Err(ClientError::Transport("connection refused".to_string()))),
            artifacts: Mutex::new(VecDeque::new()),
            submitted: Mutex::new(test_result("result-1", true, false)),
            refreshes: Mutex::new(VecDeque::new()),
            last_refresh: Mutex::new(None),
            messages: Mutex::new(Vec::new()),
            statistic: Mutex::new(DailyInvocationStatistic::default()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Scripts health replies.
    pub fn script_health(&self, replies: Vec<Result<StatusCode, ClientError>>) {
        self.health.lock().unwrap().extend(replies);
    }

    /// Sets the health reply used once the script is exhausted.
    pub fn set_health_default(&self, reply: Result<StatusCode, ClientError>) {
        *self.health_default.lock().unwrap() = reply;
    }

    /// Scripts artifact call replies.
    pub fn script_artifacts(&self, replies: Vec<Result<StatusCode, ClientError>>) {
        self.artifacts.lock().unwrap().extend(replies);
    }

    /// Sets the submit reply.
    pub fn set_submitted(&self, result: TestResult) {
        *self.submitted.lock().unwrap() = result;
    }

    /// Scripts refresh replies.
    pub fn script_refreshes(&self, replies: Vec<Result<TestResult, ClientError>>) {
        self.refreshes.lock().unwrap().extend(replies);
    }

    /// Sets the message fetch reply.
    pub fn set_messages(&self, pairs: Vec<RequestResponsePair>) {
        *self.messages.lock().unwrap() = pairs;
    }

    /// Sets the invocation statistic reply.
    pub fn set_statistic(&self, statistic: DailyInvocationStatistic) {
        *self.statistic.lock().unwrap() = statistic;
    }

    /// Returns observed calls.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Counts observed calls matching a predicate.
    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|call| predicate(call)).count()
    }

    /// Records a call.
    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    /// Pops the next artifact reply.
    fn next_artifact(&self) -> Result<StatusCode, ClientError> {
        self.artifacts.lock().unwrap().pop_front().unwrap_or(Ok(StatusCode::CREATED))
    }
}

#[async_trait]
impl RemoteServiceClient for FakeClient {
    async fn check_health(&self) -> Result<StatusCode, ClientError> {
        self.record(Call::Health);
        let scripted = self.health.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| self.health_default.lock().unwrap().clone())
    }

    async fn upload_artifact(
        &self,
        upload: &ArtifactUpload,
        main_artifact: bool,
    ) -> Result<StatusCode, ClientError> {
        self.record(Call::Upload {
            file_name: upload.file_name.clone(),
            main: main_artifact,
        });
        self.next_artifact()
    }

    async fn import_artifact(&self, upload: &ArtifactUpload) -> Result<StatusCode, ClientError> {
        self.record(Call::Import {
            file_name: upload.file_name.clone(),
        });
        self.next_artifact()
    }

    async fn download_artifact(
        &self,
        url: &str,
        main_artifact: bool,
    ) -> Result<StatusCode, ClientError> {
        self.record(Call::Download {
            url: url.to_string(),
            main: main_artifact,
        });
        self.next_artifact()
    }

    async fn submit_test(&self, _request: &TestRequest) -> Result<TestResult, ClientError> {
        self.record(Call::Submit);
        Ok(self.submitted.lock().unwrap().clone())
    }

    async fn refresh_test(&self, test_result_id: &str) -> Result<TestResult, ClientError> {
        self.record(Call::Refresh(test_result_id.to_string()));
        let scripted = self.refreshes.lock().unwrap().pop_front();
        match scripted {
            Some(Ok(result)) => {
                *self.last_refresh.lock().unwrap() = Some(result.clone());
                Ok(result)
            }
            Some(Err(err)) => Err(err),
            None => Ok(self
                .last_refresh
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| self.submitted.lock().unwrap().clone())),
        }
    }

    async fn test_case_messages(
        &self,
        test_result_id: &str,
        test_case_id: &str,
    ) -> Result<Vec<RequestResponsePair>, ClientError> {
        self.record(Call::Messages {
            test_result_id: test_result_id.to_string(),
            test_case_id: test_case_id.to_string(),
        });
        Ok(self.messages.lock().unwrap().clone())
    }

    async fn invocation_statistics(
        &self,
        service_name: &str,
        service_version: &str,
        day: Option<Date>,
    ) -> Result<DailyInvocationStatistic, ClientError> {
        self.record(Call::Invocations {
            service: service_name.to_string(),
            version: service_version.to_string(),
            day,
        });
        Ok(self.statistic.lock().unwrap().clone())
    }
}

/// Factory handing out one shared [`FakeClient`] and counting connects.
pub struct FakeFactory {
    /// Shared fake.
    pub client: Arc<FakeClient>,
    /// Number of `connect` calls.
    pub connects: AtomicUsize,
    /// Upcoming `connect` calls that fail before succeeding again.
    pub pending_failures: AtomicUsize,
}

impl FakeFactory {
    /// Wraps a fake client.
    pub fn new(client: Arc<FakeClient>) -> Self {
        Self {
            client,
            connects: AtomicUsize::new(0),
            pending_failures: AtomicUsize::new(0),
        }
    }

    /// Makes the next `count` connects fail with an invalid-request error.
    pub fn fail_next_connects(&self, count: usize) {
        self.pending_failures.store(count, Ordering::SeqCst);
    }

    /// Returns the number of `connect` calls.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl ClientFactory for FakeFactory {
    fn connect(
        &self,
        _endpoint: &ServiceEndpoint,
    ) -> Result<Arc<dyn RemoteServiceClient>, ClientError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ClientError::InvalidRequest("tls init".to_string()));
        }
        Ok(Arc::clone(&self.client) as Arc<dyn RemoteServiceClient>)
    }
}

// ============================================================================
// SECTION: Recording Metrics
// ============================================================================

/// Metrics sink that keeps every event.
#[derive(Default)]
pub struct RecordingMetrics {
    /// Health attempts.
    pub health: Mutex<Vec<HealthAttemptEvent>>,
    /// Artifact attempts.
    pub artifacts: Mutex<Vec<ArtifactAttemptEvent>>,
    /// Poll events.
    pub polls: Mutex<Vec<TestPollEvent>>,
    /// Finished runs.
    pub runs: Mutex<Vec<TestRunEvent>>,
}

impl HarnessMetrics for RecordingMetrics {
    fn record_health_attempt(&self, event: HealthAttemptEvent) {
        self.health.lock().unwrap().push(event);
    }

    fn record_artifact_attempt(&self, event: ArtifactAttemptEvent) {
        self.artifacts.lock().unwrap().push(event);
    }

    fn record_test_poll(&self, event: TestPollEvent) {
        self.polls.lock().unwrap().push(event);
    }

    fn record_test_run(&self, event: TestRunEvent) {
        self.runs.lock().unwrap().push(event);
    }
}

// ============================================================================
// SECTION: Mock Backend Server
// ============================================================================

/// Request observed by the mock backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captured {
    /// Route label.
    pub route: &'static str,
    /// Query string pairs.
    pub query: Vec<(String, String)>,
    /// Path parameters after decoding.
    pub params: Vec<String>,
    /// Multipart field name, file name, and content type.
    pub part: Option<(String, String, String)>,
    /// Multipart or JSON body.
    pub body: String,
}

/// Shared state of the mock backend.
pub struct BackendState {
    /// Status answered by upload, import, download, and health routes.
    pub status: Mutex<StatusCode>,
    /// Captured requests.
    pub captured: Mutex<Vec<Captured>>,
}

impl BackendState {
    /// Creates state answering `status` to artifact and health calls.
    pub fn new(status: StatusCode) -> Arc<Self> {
        Arc::new(Self {
            status: Mutex::new(status),
            captured: Mutex::new(Vec::new()),
        })
    }

    /// Returns captured requests for a route.
    pub fn captured(&self, route: &str) -> Vec<Captured> {
        self.captured.lock().unwrap().iter().filter(|c| c.route == route).cloned().collect()
    }

    /// Stores a captured request.
    fn push(&self, captured: Captured) {
        self.captured.lock().unwrap().push(captured);
    }

    /// Returns the configured status.
    fn status(&self) -> StatusCode {
        *self.status.lock().unwrap()
    }
}

async fn health(State(state): State<Arc<BackendState>>) -> StatusCode {
    state.push(Captured {
        route: "health",
        query: Vec::new(),
        params: Vec::new(),
        part: None,
        body: String::new(),
    });
    state.status()
}

/// Reads the single multipart part.
async fn read_part(mut multipart: Multipart) -> (Option<(String, String, String)>, String) {
    let Some(field) = multipart.next_field().await.expect("multipart") else {
        return (None, String::new());
    };
    let name = field.name().unwrap_or_default().to_string();
    let file_name = field.file_name().unwrap_or_default().to_string();
    let content_type = field.content_type().unwrap_or_default().to_string();
    let body = field.text().await.expect("part text");
    (Some((name, file_name, content_type)), body)
}

async fn upload(
    State(state): State<Arc<BackendState>>,
    Query(query): Query<Vec<(String, String)>>,
    multipart: Multipart,
) -> StatusCode {
    let (part, body) = read_part(multipart).await;
    state.push(Captured {
        route: "upload",
        query,
        params: Vec::new(),
        part,
        body,
    });
    state.status()
}

async fn import(State(state): State<Arc<BackendState>>, multipart: Multipart) -> StatusCode {
    let (part, body) = read_part(multipart).await;
    state.push(Captured {
        route: "import",
        query: Vec::new(),
        params: Vec::new(),
        part,
        body,
    });
    state.status()
}

async fn download(
    State(state): State<Arc<BackendState>>,
    Query(query): Query<Vec<(String, String)>>,
) -> StatusCode {
    state.push(Captured {
        route: "download",
        query,
        params: Vec::new(),
        part: None,
        body: String::new(),
    });
    state.status()
}

async fn submit(
    State(state): State<Arc<BackendState>>,
    Json(body): Json<Value>,
) -> (axum::http::StatusCode, Json<Value>) {
    state.push(Captured {
        route: "submit",
        query: Vec::new(),
        params: Vec::new(),
        part: None,
        body: body.to_string(),
    });
    (
        axum::http::StatusCode::CREATED,
        Json(json!({ "id": "wire-1", "testNumber": 3, "inProgress": true, "success": false })),
    )
}

async fn refresh(
    State(state): State<Arc<BackendState>>,
    Path(id): Path<String>,
) -> Json<Value> {
    state.push(Captured {
        route: "refresh",
        query: Vec::new(),
        params: vec![id.clone()],
        part: None,
        body: String::new(),
    });
    Json(json!({
        "id": id,
        "testNumber": 3,
        "inProgress": false,
        "success": true,
        "testCaseResults": [{
            "operationName": "GET /pastries",
            "success": true,
            "testStepResults": [{ "success": true }]
        }],
        "unknownField": "ignored"
    }))
}

async fn messages(
    State(state): State<Arc<BackendState>>,
    Path((id, case)): Path<(String, String)>,
) -> Json<Value> {
    state.push(Captured {
        route: "messages",
        query: Vec::new(),
        params: vec![id, case],
        part: None,
        body: String::new(),
    });
    Json(json!([
        {
            "request": { "name": "Millefeuille", "queryParameters": [] },
            "response": { "status": "200", "mediaType": "application/json", "content": "{}" }
        }
    ]))
}

async fn invocations(
    State(state): State<Arc<BackendState>>,
    Path((service, version)): Path<(String, String)>,
    Query(query): Query<Vec<(String, String)>>,
) -> Json<Value> {
    state.push(Captured {
        route: "invocations",
        query,
        params: vec![service.clone(), version.clone()],
        part: None,
        body: String::new(),
    });
    Json(json!({
        "serviceName": service,
        "serviceVersion": version,
        "day": "20250101",
        "dailyCount": 4.0,
        "hourlyCount": { "10": 4.0 },
        "minuteCount": {}
    }))
}

/// Starts the mock backend on an ephemeral port and returns its base URL.
pub async fn spawn_backend(state: Arc<BackendState>) -> (String, oneshot::Sender<()>) {
    let app = Router::new()
        .route("/api/health", get(health))
        .route("/api/artifact/upload", post(upload))
        .route("/api/import", post(import))
        .route("/api/artifact/download", post(download))
        .route("/api/tests", post(submit))
        .route("/api/tests/{id}", get(refresh))
        .route("/api/tests/{id}/messages/{case}", get(messages))
        .route("/api/metrics/invocations/{service}/{version}", get(invocations))
        .with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await;
    });
    (format!("http://{addr}"), shutdown_tx)
}
