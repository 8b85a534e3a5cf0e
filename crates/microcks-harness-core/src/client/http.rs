// crates/microcks-harness-core/src/client/http.rs
// ============================================================================
// Module: Microcks Harness HTTP Client
// Description: reqwest-backed implementation of the backend wire calls.
// Purpose: Encode requests, stream artifact files, and decode JSON replies.
// Dependencies: reqwest, tokio, tokio-util, url
// ============================================================================

//! ## Overview
//! [`HttpServiceClient`] maps each [`RemoteServiceClient`] call onto one HTTP
//! request against the backend API. Artifact files are streamed from disk as
//! multipart field `file` rather than buffered.
//! Invariants:
//! - Every URL is built from the immutable [`ServiceEndpoint`] base.
//! - Path parameters are percent-encoded per segment.
//! - Redirects are not followed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Body;
use reqwest::Client;
use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use reqwest::multipart::Form;
use reqwest::multipart::Part;
use reqwest::redirect::Policy;
use serde::de::DeserializeOwned;
use time::Date;
use tokio_util::io::ReaderStream;
use url::Url;

use crate::client::ArtifactUpload;
use crate::client::ClientError;
use crate::client::ClientFactory;
use crate::client::RemoteServiceClient;
use crate::endpoint::ServiceEndpoint;
use crate::model::DailyInvocationStatistic;
use crate::model::RequestResponsePair;
use crate::model::TestRequest;
use crate::model::TestResult;
use crate::policy::DEFAULT_CONNECT_TIMEOUT_MS;
use crate::policy::DEFAULT_REQUEST_TIMEOUT_MS;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Media type declared for JSON requests and multipart parts.
const APPLICATION_JSON: &str = "application/json";
/// Default TCP connect timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS);
/// Default whole-request timeout.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS);

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Transport settings for the HTTP client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpClientSettings {
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Whole-request timeout, including body streaming.
    pub request_timeout: Duration,
}

impl Default for HttpClientSettings {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

// ============================================================================
// SECTION: HTTP Client
// ============================================================================

/// Backend client over HTTP.
///
/// # Invariants
/// - The underlying connection pool is shared by clones.
#[derive(Debug, Clone)]
pub struct HttpServiceClient {
    /// Backend base URL.
    endpoint: ServiceEndpoint,
    /// Pooled reqwest client.
    client: Client,
}

impl HttpServiceClient {
    /// Builds a client for the endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidRequest`] when the reqwest client cannot be built.
    pub fn new(endpoint: ServiceEndpoint, settings: HttpClientSettings) -> Result<Self, ClientError> {
        let client = Client::builder()
            .redirect(Policy::none())
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ClientError::InvalidRequest(err.to_string()))?;
        Ok(Self {
            endpoint,
            client,
        })
    }

    /// Returns the backend endpoint.
    #[must_use]
    pub const fn endpoint(&self) -> &ServiceEndpoint {
        &self.endpoint
    }

    /// Builds an `/api/...` URL from path segments.
    fn api_url(&self, segments: &[&str]) -> Url {
        self.endpoint.join_segments(std::iter::once("api").chain(segments.iter().copied()))
    }

    /// Opens the artifact file and wraps it as a streamed multipart form.
    async fn file_form(upload: &ArtifactUpload) -> Result<Form, ClientError> {
        let file = tokio::fs::File::open(&upload.path)
            .await
            .map_err(|err| ClientError::Io(format!("{}: {err}", upload.path.display())))?;
        let length = file.metadata().await.ok().map(|metadata| metadata.len());
        let body = Body::wrap_stream(ReaderStream::new(file));
        let part = match length {
            Some(length) => Part::stream_with_length(body, length),
            None => Part::stream(body),
        };
        let part = part.file_name(upload.file_name.clone()).mime_str(APPLICATION_JSON)?;
        Ok(Form::new().part("file", part))
    }

    /// Sends a GET and decodes a JSON body, failing on non-success status.
    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        url: Url,
    ) -> Result<T, ClientError> {
        let response = self.client.get(url).header(ACCEPT, APPLICATION_JSON).send().await?;
        decode_json(operation, response).await
    }
}

/// Decodes a JSON response after checking for a success status.
async fn decode_json<T: DeserializeOwned>(
    operation: &'static str,
    response: reqwest::Response,
) -> Result<T, ClientError> {
    let status = response.status();
    if !status.is_success() {
        return Err(ClientError::UnexpectedStatus {
            operation,
            status,
        });
    }
    Ok(response.json::<T>().await?)
}

/// Formats a date as the backend's `yyyyMMdd` day label.
pub(crate) fn day_label(day: Date) -> String {
    format!("{:04}{:02}{:02}", day.year(), u8::from(day.month()), day.day())
}

#[async_trait]
impl RemoteServiceClient for HttpServiceClient {
    async fn check_health(&self) -> Result<StatusCode, ClientError> {
        let url = self.api_url(&["health"]);
        let response = self.client.get(url).header(ACCEPT, APPLICATION_JSON).send().await?;
        Ok(response.status())
    }

    async fn upload_artifact(
        &self,
        upload: &ArtifactUpload,
        main_artifact: bool,
    ) -> Result<StatusCode, ClientError> {
        let mut url = self.api_url(&["artifact", "upload"]);
        url.query_pairs_mut().append_pair("mainArtifact", bool_label(main_artifact));
        let form = Self::file_form(upload).await?;
        let response =
            self.client.post(url).header(ACCEPT, APPLICATION_JSON).multipart(form).send().await?;
        Ok(response.status())
    }

    async fn import_artifact(&self, upload: &ArtifactUpload) -> Result<StatusCode, ClientError> {
        let url = self.api_url(&["import"]);
        let form = Self::file_form(upload).await?;
        let response =
            self.client.post(url).header(ACCEPT, APPLICATION_JSON).multipart(form).send().await?;
        Ok(response.status())
    }

    async fn download_artifact(
        &self,
        url: &str,
        main_artifact: bool,
    ) -> Result<StatusCode, ClientError> {
        let mut request_url = self.api_url(&["artifact", "download"]);
        request_url
            .query_pairs_mut()
            .append_pair("mainArtifact", bool_label(main_artifact))
            .append_pair("url", url);
        let response = self.client.post(request_url).header(ACCEPT, APPLICATION_JSON).send().await?;
        Ok(response.status())
    }

    async fn submit_test(&self, request: &TestRequest) -> Result<TestResult, ClientError> {
        let url = self.api_url(&["tests"]);
        let response =
            self.client.post(url).header(ACCEPT, APPLICATION_JSON).json(request).send().await?;
        decode_json("submit test", response).await
    }

    async fn refresh_test(&self, test_result_id: &str) -> Result<TestResult, ClientError> {
        let url = self.api_url(&["tests", test_result_id]);
        self.get_json("refresh test", url).await
    }

    async fn test_case_messages(
        &self,
        test_result_id: &str,
        test_case_id: &str,
    ) -> Result<Vec<RequestResponsePair>, ClientError> {
        let url = self.api_url(&["tests", test_result_id, "messages", test_case_id]);
        self.get_json("fetch test case messages", url).await
    }

    async fn invocation_statistics(
        &self,
        service_name: &str,
        service_version: &str,
        day: Option<Date>,
    ) -> Result<DailyInvocationStatistic, ClientError> {
        let mut url = self.api_url(&["metrics", "invocations", service_name, service_version]);
        if let Some(day) = day {
            url.query_pairs_mut().append_pair("day", &day_label(day));
        }
        self.get_json("fetch invocation statistics", url).await
    }
}

/// Returns the query-string form of a boolean flag.
const fn bool_label(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

// ============================================================================
// SECTION: Factory
// ============================================================================

/// Factory producing [`HttpServiceClient`] handles.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpClientFactory {
    /// Transport settings applied to every client.
    settings: HttpClientSettings,
}

impl HttpClientFactory {
    /// Creates a factory with explicit transport settings.
    #[must_use]
    pub const fn new(settings: HttpClientSettings) -> Self {
        Self {
            settings,
        }
    }
}

impl ClientFactory for HttpClientFactory {
    fn connect(
        &self,
        endpoint: &ServiceEndpoint,
    ) -> Result<Arc<dyn RemoteServiceClient>, ClientError> {
        let client = HttpServiceClient::new(endpoint.clone(), self.settings)?;
        Ok(Arc::new(client))
    }
}
