// crates/microcks-harness-core/src/endpoint.rs
// ============================================================================
// Module: Microcks Harness Service Endpoint
// Description: Resolved base URL of the mock backend.
// Purpose: Build API and mock URLs from one immutable base.
// Dependencies: url, thiserror
// ============================================================================

//! ## Overview
//! [`ServiceEndpoint`] wraps the backend base URL once the host has allocated
//! it. The URL is validated and normalized on construction and never changes
//! afterwards.
//! Invariants:
//! - Only absolute `http` and `https` URLs with a host are accepted.
//! - The stored base never ends with a trailing slash.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Endpoint construction failures.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    /// URL failed to parse.
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(String),
    /// URL scheme is not http or https.
    #[error("unsupported endpoint scheme: {0}")]
    UnsupportedScheme(String),
    /// URL has no host component.
    #[error("endpoint url has no host")]
    MissingHost,
}

// ============================================================================
// SECTION: Service Endpoint
// ============================================================================

/// Base URL of the backend service.
///
/// # Invariants
/// - Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    /// Normalized base URL (no trailing slash in the path).
    base: Url,
}

impl ServiceEndpoint {
    /// Parses and normalizes a backend base URL.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError`] when the URL is not an absolute http(s) URL.
    pub fn parse(raw: &str) -> Result<Self, EndpointError> {
        let mut base =
            Url::parse(raw.trim()).map_err(|err| EndpointError::InvalidUrl(err.to_string()))?;
        match base.scheme() {
            "http" | "https" => {}
            scheme => return Err(EndpointError::UnsupportedScheme(scheme.to_string())),
        }
        if base.host_str().is_none_or(str::is_empty) {
            return Err(EndpointError::MissingHost);
        }
        let trimmed = base.path().trim_end_matches('/').to_string();
        base.set_path(&trimmed);
        base.set_query(None);
        base.set_fragment(None);
        Ok(Self {
            base,
        })
    }

    /// Returns the base URL as a string without a trailing slash.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.base.as_str().trim_end_matches('/')
    }

    /// Returns the base URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.base
    }

    /// Builds a URL below the base from already-separated path segments.
    ///
    /// Each segment is percent-encoded independently.
    #[must_use]
    pub fn join_segments<I, S>(&self, segments: I) -> Url
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            for segment in segments {
                path.push(segment.as_ref());
            }
        }
        url
    }

    /// Returns the REST mock URL for a service.
    #[must_use]
    pub fn rest_mock_endpoint(&self, service_name: &str, service_version: &str) -> Url {
        self.join_segments(["rest", service_name, service_version])
    }

    /// Returns the SOAP mock URL for a service.
    #[must_use]
    pub fn soap_mock_endpoint(&self, service_name: &str, service_version: &str) -> Url {
        self.join_segments(["soap", service_name, service_version])
    }

    /// Returns the GraphQL mock URL for a service.
    #[must_use]
    pub fn graphql_mock_endpoint(&self, service_name: &str, service_version: &str) -> Url {
        self.join_segments(["graphql", service_name, service_version])
    }

    /// Returns the gRPC mock URL: the backend authority under the `grpc` scheme.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::InvalidUrl`] when the rebuilt URL does not parse.
    pub fn grpc_mock_endpoint(&self) -> Result<Url, EndpointError> {
        let host = self.base.host_str().ok_or(EndpointError::MissingHost)?;
        let authority = match self.base.port_or_known_default() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        Url::parse(&format!("grpc://{authority}"))
            .map_err(|err| EndpointError::InvalidUrl(err.to_string()))
    }
}

impl fmt::Display for ServiceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests;
