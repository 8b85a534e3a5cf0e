// crates/microcks-harness-core/src/model.rs
// ============================================================================
// Module: Microcks Harness Wire Model
// Description: Test request, test result, and captured message types.
// Purpose: Mirror the JSON bodies exchanged with the mock backend.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Types in this module are serialized to and from the backend's JSON API.
//! Field names are camelCase on the wire.
//! Invariants:
//! - A [`TestRequest`] is immutable once submitted; validation happens before
//!   any network activity.
//! - A [`TestResult`] is never mutated in place. Each poll replaces the local
//!   copy with a fresher server snapshot.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Backend Identity
// ============================================================================

/// Logical name of an orchestrated backend instance.
///
/// # Invariants
/// - The name is non-empty after trimming.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct BackendName(String);

impl BackendName {
    /// Creates a backend name, rejecting blank input.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::EmptyField`] when the name is blank.
    pub fn new(name: impl Into<String>) -> Result<Self, RequestError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(RequestError::EmptyField("backend name"));
        }
        Ok(Self(name))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackendName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for BackendName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// SECTION: Test Request
// ============================================================================

/// Conformance runner the backend uses to evaluate the target implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestRunnerType {
    /// Plain HTTP response-code checks.
    Http,
    /// SOAP over HTTP checks.
    SoapHttp,
    /// SoapUI project assertions.
    SoapUi,
    /// Postman collection assertions.
    Postman,
    /// `OpenAPI` schema conformance.
    OpenApiSchema,
    /// `AsyncAPI` schema conformance.
    AsyncApiSchema,
    /// gRPC protobuf conformance.
    GrpcProtobuf,
    /// GraphQL schema conformance.
    GraphqlSchema,
}

impl TestRunnerType {
    /// Returns the wire label for the runner.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Http => "HTTP",
            Self::SoapHttp => "SOAP_HTTP",
            Self::SoapUi => "SOAP_UI",
            Self::Postman => "POSTMAN",
            Self::OpenApiSchema => "OPEN_API_SCHEMA",
            Self::AsyncApiSchema => "ASYNC_API_SCHEMA",
            Self::GrpcProtobuf => "GRPC_PROTOBUF",
            Self::GraphqlSchema => "GRAPHQL_SCHEMA",
        }
    }
}

impl FromStr for TestRunnerType {
    type Err = RequestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let runner = match value.trim().to_ascii_uppercase().as_str() {
            "HTTP" => Self::Http,
            "SOAP_HTTP" => Self::SoapHttp,
            "SOAP_UI" => Self::SoapUi,
            "POSTMAN" => Self::Postman,
            "OPEN_API_SCHEMA" => Self::OpenApiSchema,
            "ASYNC_API_SCHEMA" => Self::AsyncApiSchema,
            "GRPC_PROTOBUF" => Self::GrpcProtobuf,
            "GRAPHQL_SCHEMA" => Self::GraphqlSchema,
            _ => return Err(RequestError::UnknownRunner(value.to_string())),
        };
        Ok(runner)
    }
}

/// HTTP header forwarded to the tested endpoint for one operation.
///
/// # Invariants
/// - `values` is a comma-joined list, as the backend expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Header name.
    pub name: String,
    /// Comma-joined header values.
    pub values: String,
}

impl Header {
    /// Builds a header from a name and a list of values.
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let values = values.into_iter().map(|value| value.as_ref().to_string()).collect::<Vec<_>>();
        Self {
            name: name.into(),
            values: values.join(","),
        }
    }

    /// Splits the comma-joined values.
    pub fn split_values(&self) -> impl Iterator<Item = &str> {
        self.values.split(',').map(str::trim).filter(|value| !value.is_empty())
    }
}

/// Test run submitted to the backend.
///
/// # Invariants
/// - `service_id` and `test_endpoint` are non-empty once [`TestRequest::validate`] passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRequest {
    /// Service under test, formatted as `name:version`.
    pub service_id: String,
    /// Runner used to evaluate the implementation.
    pub runner_type: TestRunnerType,
    /// Base URL of the implementation under test.
    pub test_endpoint: String,
    /// Backend-side execution timeout.
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
    /// Optional subset of operations to test.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filtered_operations: Option<Vec<String>>,
    /// Optional per-operation headers forwarded to the implementation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operations_headers: Option<BTreeMap<String, Vec<Header>>>,
}

impl TestRequest {
    /// Creates a request with no timeout, filter, or headers.
    #[must_use]
    pub fn new(
        service_id: impl Into<String>,
        runner_type: TestRunnerType,
        test_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            service_id: service_id.into(),
            runner_type,
            test_endpoint: test_endpoint.into(),
            timeout: Duration::ZERO,
            filtered_operations: None,
            operations_headers: None,
        }
    }

    /// Sets the backend-side execution timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Restricts the run to the given operations.
    #[must_use]
    pub fn with_filtered_operations<I, S>(mut self, operations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filtered_operations = Some(operations.into_iter().map(Into::into).collect());
        self
    }

    /// Adds a header forwarded for one operation.
    #[must_use]
    pub fn with_operation_header(mut self, operation: impl Into<String>, header: Header) -> Self {
        self.operations_headers
            .get_or_insert_with(BTreeMap::new)
            .entry(operation.into())
            .or_default()
            .push(header);
        self
    }

    /// Checks the request before submission.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError`] when a required identifier is blank.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.service_id.trim().is_empty() {
            return Err(RequestError::EmptyField("service id"));
        }
        if self.test_endpoint.trim().is_empty() {
            return Err(RequestError::EmptyField("test endpoint"));
        }
        if let Some(operations) = &self.filtered_operations
            && operations.iter().any(|operation| operation.trim().is_empty())
        {
            return Err(RequestError::EmptyField("filtered operation"));
        }
        Ok(())
    }
}

/// Serde adapter sending durations as integer milliseconds.
mod duration_millis {
    use std::time::Duration;

    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;

    /// Serializes a duration as whole milliseconds, saturating at `u64::MAX`.
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    /// Deserializes whole milliseconds into a duration.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

// ============================================================================
// SECTION: Test Result
// ============================================================================

/// Outcome of one test step within a test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestStepResult {
    /// Whether the step passed.
    #[serde(default)]
    pub success: bool,
    /// Failure description, absent on success.
    #[serde(default)]
    pub message: Option<String>,
    /// Name of the request replayed for this step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_name: Option<String>,
}

impl TestStepResult {
    /// Returns the message, or an empty string when none was reported.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or_default()
    }
}

/// Outcome of one operation under test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseResult {
    /// Operation name, e.g. `GET /pastries`.
    pub operation_name: String,
    /// Whether every step passed.
    #[serde(default)]
    pub success: bool,
    /// Ordered step results.
    #[serde(default)]
    pub test_step_results: Vec<TestStepResult>,
}

/// Server snapshot of a test run.
///
/// # Invariants
/// - Identity is `id`; snapshots for the same id move monotonically from
///   `in_progress = true` to `in_progress = false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    /// Backend-assigned identifier.
    pub id: String,
    /// Sequence number of this run for the tested service.
    #[serde(default)]
    pub test_number: u64,
    /// Whether the backend is still executing the run.
    #[serde(default)]
    pub in_progress: bool,
    /// Whether every test case passed.
    #[serde(default)]
    pub success: bool,
    /// Tested implementation URL echoed by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tested_endpoint: Option<String>,
    /// Tested service identifier echoed by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
    /// Elapsed execution time in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_time: Option<u64>,
    /// Ordered per-operation results.
    #[serde(default)]
    pub test_case_results: Vec<TestCaseResult>,
    /// Headers forwarded per operation, echoed by the backend.
    #[serde(default)]
    pub operations_headers: BTreeMap<String, Vec<Header>>,
}

impl TestResult {
    /// Returns true when the run reached a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !self.in_progress
    }

    /// Returns the test case for an operation when present.
    #[must_use]
    pub fn test_case(&self, operation_name: &str) -> Option<&TestCaseResult> {
        self.test_case_results.iter().find(|case| case.operation_name == operation_name)
    }
}

// ============================================================================
// SECTION: Exchanged Messages
// ============================================================================

/// Query parameter captured on a replayed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParameter {
    /// Parameter name.
    pub name: String,
    /// Parameter value.
    #[serde(default)]
    pub value: String,
}

/// Request half of a captured exchange.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// Request name from the contract examples.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Request body.
    #[serde(default)]
    pub content: Option<String>,
    /// Query parameters sent with the request.
    #[serde(default)]
    pub query_parameters: Vec<QueryParameter>,
}

/// Response half of a captured exchange.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// Status code as reported by the backend.
    #[serde(default)]
    pub status: Option<String>,
    /// Response media type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    /// Response body.
    #[serde(default)]
    pub content: Option<String>,
}

/// One request/response exchange captured during a test run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestResponsePair {
    /// Replayed request.
    pub request: Request,
    /// Observed response.
    pub response: Response,
}

// ============================================================================
// SECTION: Invocation Metrics
// ============================================================================

/// Daily invocation counters for one mocked service.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyInvocationStatistic {
    /// Mocked service name.
    #[serde(default)]
    pub service_name: String,
    /// Mocked service version.
    #[serde(default)]
    pub service_version: String,
    /// Day label (`yyyyMMdd`).
    #[serde(default)]
    pub day: String,
    /// Invocations over the whole day.
    #[serde(default)]
    pub daily_count: f64,
    /// Invocations keyed by hour.
    #[serde(default)]
    pub hourly_count: BTreeMap<String, f64>,
    /// Invocations keyed by minute.
    #[serde(default)]
    pub minute_count: BTreeMap<String, f64>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Request validation failures raised before any network activity.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// A required identifier was blank.
    #[error("{0} must be non-empty")]
    EmptyField(&'static str),
    /// Runner label is not recognized.
    #[error("unknown test runner: {0}")]
    UnknownRunner(String),
}

#[cfg(test)]
mod tests;
