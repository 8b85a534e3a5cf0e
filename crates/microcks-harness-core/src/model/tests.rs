// crates/microcks-harness-core/src/model/tests.rs
// ============================================================================
// Module: Wire Model Tests
// Description: Unit tests for request validation and JSON field mapping.
// Purpose: Pin the camelCase wire shape and timeout encoding.
// Dependencies: microcks-harness-core, serde_json
// ============================================================================

//! ## Overview
//! Checks the JSON shape of requests sent to the backend and the lenient
//! decoding of results it returns.

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

use std::time::Duration;

use serde_json::json;

use super::BackendName;
use super::Header;
use super::RequestError;
use super::RequestResponsePair;
use super::TestRequest;
use super::TestResult;
use super::TestRunnerType;

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn test_request_serializes_camel_case_with_millisecond_timeout() {
    let request = TestRequest::new("API Pastries:0.0.1", TestRunnerType::OpenApiSchema, "http://bad-impl:3001")
        .with_timeout(Duration::from_millis(2000));
    let value = serde_json::to_value(&request).unwrap();
    assert_eq!(
        value,
        json!({
            "serviceId": "API Pastries:0.0.1",
            "runnerType": "OPEN_API_SCHEMA",
            "testEndpoint": "http://bad-impl:3001",
            "timeout": 2000
        })
    );
}

#[test]
fn test_request_includes_operation_headers_when_present() {
    let request = TestRequest::new("API Pastries:0.0.1", TestRunnerType::OpenApiSchema, "http://good-impl:3002")
        .with_operation_header("GET /pastries", Header::new("X-Custom-Header-1", ["value1", "value2", "value3"]))
        .with_filtered_operations(["GET /pastries"]);
    let value = serde_json::to_value(&request).unwrap();
    assert_eq!(value["filteredOperations"], json!(["GET /pastries"]));
    assert_eq!(
        value["operationsHeaders"],
        json!({ "GET /pastries": [{ "name": "X-Custom-Header-1", "values": "value1,value2,value3" }] })
    );
}

#[test]
fn test_request_validation_rejects_blank_identifiers() {
    let missing_service = TestRequest::new("  ", TestRunnerType::Http, "http://impl");
    assert_eq!(missing_service.validate(), Err(RequestError::EmptyField("service id")));

    let missing_endpoint = TestRequest::new("svc:1", TestRunnerType::Http, "");
    assert_eq!(missing_endpoint.validate(), Err(RequestError::EmptyField("test endpoint")));

    let blank_filter = TestRequest::new("svc:1", TestRunnerType::Http, "http://impl").with_filtered_operations([""]);
    assert_eq!(blank_filter.validate(), Err(RequestError::EmptyField("filtered operation")));
}

#[test]
fn runner_type_parses_wire_labels_case_insensitively() {
    assert_eq!("open_api_schema".parse::<TestRunnerType>(), Ok(TestRunnerType::OpenApiSchema));
    assert_eq!("GRPC_PROTOBUF".parse::<TestRunnerType>(), Ok(TestRunnerType::GrpcProtobuf));
    assert!(matches!("REST".parse::<TestRunnerType>(), Err(RequestError::UnknownRunner(_))));
    assert_eq!(TestRunnerType::SoapUi.as_str(), "SOAP_UI");
}

#[test]
fn header_split_values_trims_entries() {
    let header = Header {
        name: "X-Test".to_string(),
        values: "a, b,,c".to_string(),
    };
    assert_eq!(header.split_values().collect::<Vec<_>>(), vec!["a", "b", "c"]);
}

#[test]
fn test_result_decodes_backend_snapshot_and_ignores_unknown_fields() {
    let payload = json!({
        "id": "66a1",
        "version": 3,
        "testNumber": 2,
        "inProgress": false,
        "success": false,
        "runnerType": "OPEN_API_SCHEMA",
        "testCaseResults": [{
            "operationName": "GET /pastries",
            "success": false,
            "elapsedTime": 12,
            "testStepResults": [{
                "success": false,
                "requestName": "pastries_json",
                "message": "string found, number expected"
            }]
        }],
        "operationsHeaders": {
            "GET /pastries": [{ "name": "X-Custom-Header-1", "values": "value1,value2" }]
        }
    });
    let result: TestResult = serde_json::from_value(payload).unwrap();
    assert_eq!(result.test_number, 2);
    assert!(result.is_terminal());
    let case = result.test_case("GET /pastries").unwrap();
    assert!(case.test_step_results[0].message().contains("number expected"));
    assert_eq!(result.operations_headers["GET /pastries"][0].name, "X-Custom-Header-1");
}

#[test]
fn test_result_defaults_optional_collections() {
    let result: TestResult = serde_json::from_value(json!({ "id": "1", "inProgress": true })).unwrap();
    assert!(!result.is_terminal());
    assert!(result.test_case_results.is_empty());
    assert!(result.operations_headers.is_empty());
    assert_eq!(result.test_number, 0);
}

#[test]
fn request_response_pair_decodes_query_parameters() {
    let pair: RequestResponsePair = serde_json::from_value(json!({
        "request": {
            "name": "pastries_s",
            "content": null,
            "queryParameters": [{ "name": "size", "value": "S" }]
        },
        "response": { "status": "200", "mediaType": "application/json", "content": "[]" }
    }))
    .unwrap();
    assert_eq!(pair.request.query_parameters.len(), 1);
    assert_eq!(pair.request.query_parameters[0].name, "size");
    assert_eq!(pair.response.status.as_deref(), Some("200"));
}

#[test]
fn backend_name_rejects_blank_input() {
    assert!(BackendName::new(" ").is_err());
    assert_eq!(BackendName::new("microcks").unwrap().as_str(), "microcks");
}
