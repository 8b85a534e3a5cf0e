// crates/microcks-harness-core/src/endpoint/tests.rs
// ============================================================================
// Module: Service Endpoint Tests
// Description: Unit tests for base URL normalization and mock URL helpers.
// Purpose: Validate scheme checks and per-segment encoding.
// Dependencies: microcks-harness-core
// ============================================================================

//! ## Overview
//! Exercises [`super::ServiceEndpoint`] parsing and the mock URL builders.

// ============================================================================
// SECTION: Lint Configuration
// ============================================================================

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use super::EndpointError;
use super::ServiceEndpoint;

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn parse_strips_trailing_slash_query_and_fragment() {
    let endpoint = ServiceEndpoint::parse("http://localhost:8080/base/?x=1#frag").unwrap();
    assert_eq!(endpoint.as_str(), "http://localhost:8080/base");
    let root = ServiceEndpoint::parse(" http://localhost:8080/ ").unwrap();
    assert_eq!(root.as_str(), "http://localhost:8080");
    assert_eq!(root.to_string(), "http://localhost:8080");
}

#[test]
fn parse_rejects_non_http_schemes_and_garbage() {
    assert_eq!(
        ServiceEndpoint::parse("ftp://localhost"),
        Err(EndpointError::UnsupportedScheme("ftp".to_string()))
    );
    assert!(matches!(ServiceEndpoint::parse("not a url"), Err(EndpointError::InvalidUrl(_))));
}

#[test]
fn mock_endpoints_append_encoded_segments() {
    let endpoint = ServiceEndpoint::parse("http://localhost:8080").unwrap();
    assert_eq!(
        endpoint.rest_mock_endpoint("Pastries Service", "0.0.1").as_str(),
        "http://localhost:8080/rest/Pastries%20Service/0.0.1"
    );
    assert_eq!(
        endpoint.soap_mock_endpoint("Pastries Service", "1.0").as_str(),
        "http://localhost:8080/soap/Pastries%20Service/1.0"
    );
    assert_eq!(
        endpoint.graphql_mock_endpoint("Pastries Graph", "1").as_str(),
        "http://localhost:8080/graphql/Pastries%20Graph/1"
    );
}

#[test]
fn mock_endpoints_keep_base_path_prefix() {
    let endpoint = ServiceEndpoint::parse("http://localhost:8080/microcks/").unwrap();
    assert_eq!(
        endpoint.rest_mock_endpoint("API Pastries", "0.0.1").as_str(),
        "http://localhost:8080/microcks/rest/API%20Pastries/0.0.1"
    );
}

#[test]
fn grpc_endpoint_swaps_scheme_and_keeps_authority() {
    let endpoint = ServiceEndpoint::parse("http://localhost:9090").unwrap();
    assert_eq!(endpoint.grpc_mock_endpoint().unwrap().as_str(), "grpc://localhost:9090");
    let default_port = ServiceEndpoint::parse("https://mocks.example.com").unwrap();
    assert_eq!(default_port.grpc_mock_endpoint().unwrap().as_str(), "grpc://mocks.example.com:443");
}
