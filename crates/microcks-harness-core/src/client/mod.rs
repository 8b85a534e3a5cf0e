// crates/microcks-harness-core/src/client/mod.rs
// ============================================================================
// Module: Microcks Harness Remote Client
// Description: Client trait for the backend wire calls and its error taxonomy.
// Purpose: Isolate the orchestration core from HTTP transport details.
// Dependencies: async-trait, reqwest, thiserror
// ============================================================================

//! ## Overview
//! [`RemoteServiceClient`] performs single wire calls against the backend.
//! It never retries and never polls; retry and polling policy live in the
//! orchestration components. [`ClientError::is_transient`] marks the one
//! failure category those components may retry.
//! Invariants:
//! - Implementations are safe for concurrent read-only use.
//! - Upload-style calls return the raw status; callers decide success.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;
use time::Date;

use crate::endpoint::ServiceEndpoint;
use crate::model::DailyInvocationStatistic;
use crate::model::RequestResponsePair;
use crate::model::TestRequest;
use crate::model::TestResult;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Remote call failures.
///
/// # Invariants
/// - Only [`ClientError::Transport`] is transient.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// Connection, timeout, or DNS failure before a response arrived.
    #[error("transport failure: {0}")]
    Transport(String),
    /// Response status was not the expected one for a JSON call.
    #[error("unexpected status {status} from {operation}")]
    UnexpectedStatus {
        /// Wire operation label.
        operation: &'static str,
        /// Status returned by the backend.
        status: StatusCode,
    },
    /// Response body could not be decoded.
    #[error("response decode failure: {0}")]
    Decode(String),
    /// Local artifact source could not be read.
    #[error("artifact read failure: {0}")]
    Io(String),
    /// Request URL or body could not be built.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Caller cancelled before the call completed.
    #[error("operation cancelled")]
    Cancelled,
}

impl ClientError {
    /// Returns true for the retryable transport category.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else if err.is_builder() {
            Self::InvalidRequest(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

// ============================================================================
// SECTION: Upload Payload
// ============================================================================

/// Local file streamed to an upload or import endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactUpload {
    /// Source path opened when the call is issued.
    pub path: PathBuf,
    /// File name sent in the multipart part.
    pub file_name: String,
}

impl ArtifactUpload {
    /// Builds an upload payload for a path, deriving the file name.
    #[must_use]
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_name = crate::artifact::file_name(&path);
        Self {
            path,
            file_name,
        }
    }
}

// ============================================================================
// SECTION: Client Trait
// ============================================================================

/// Wire calls offered by the mock backend.
#[async_trait]
pub trait RemoteServiceClient: Send + Sync {
    /// Calls the health endpoint and returns its status.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when no response is received.
    async fn check_health(&self) -> Result<StatusCode, ClientError>;

    /// Streams a file to the upload endpoint with the main/secondary flag.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the file cannot be read or no response is received.
    async fn upload_artifact(
        &self,
        upload: &ArtifactUpload,
        main_artifact: bool,
    ) -> Result<StatusCode, ClientError>;

    /// Streams a file to the import endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the file cannot be read or no response is received.
    async fn import_artifact(&self, upload: &ArtifactUpload) -> Result<StatusCode, ClientError>;

    /// Instructs the backend to fetch and import an artifact from a URL.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when no response is received.
    async fn download_artifact(
        &self,
        url: &str,
        main_artifact: bool,
    ) -> Result<StatusCode, ClientError>;

    /// Submits a test run.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport, status, or decode failures.
    async fn submit_test(&self, request: &TestRequest) -> Result<TestResult, ClientError>;

    /// Fetches the current snapshot of a test run.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport, status, or decode failures.
    async fn refresh_test(&self, test_result_id: &str) -> Result<TestResult, ClientError>;

    /// Fetches the exchanges captured for one test case.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport, status, or decode failures.
    async fn test_case_messages(
        &self,
        test_result_id: &str,
        test_case_id: &str,
    ) -> Result<Vec<RequestResponsePair>, ClientError>;

    /// Fetches daily invocation counters for a mocked service.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport, status, or decode failures.
    async fn invocation_statistics(
        &self,
        service_name: &str,
        service_version: &str,
        day: Option<Date>,
    ) -> Result<DailyInvocationStatistic, ClientError>;
}

// ============================================================================
// SECTION: Client Factory
// ============================================================================

/// Builds the client handle for a backend endpoint.
pub trait ClientFactory: Send + Sync {
    /// Creates a client bound to the endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the client cannot be constructed.
    fn connect(&self, endpoint: &ServiceEndpoint)
    -> Result<Arc<dyn RemoteServiceClient>, ClientError>;
}

// ============================================================================
// SECTION: Implementations
// ============================================================================

pub mod http;

pub use http::HttpClientFactory;
pub use http::HttpClientSettings;
pub use http::HttpServiceClient;
