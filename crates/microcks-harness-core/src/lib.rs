// crates/microcks-harness-core/src/lib.rs
// ============================================================================
// Module: Microcks Harness Core Library
// Description: Orchestration core for a mock and contract-test backend.
// Purpose: Detect readiness, push artifacts, and run conformance tests.
// Dependencies: reqwest, tokio, tokio-util, tracing, url
// ============================================================================

//! ## Overview
//! The core drives a Microcks-style backend once its endpoint is known:
//! [`ReadinessWatcher`] decides when it is usable, [`ArtifactSynchronizer`]
//! loads contracts and snapshots into it, and [`TestExecutionCoordinator`]
//! runs asynchronous conformance tests under a deadline.
//! [`OrchestrationFacade`] composes the three behind one entry point.
//! Invariants:
//! - One client handle per backend, created lazily and shared read-only.
//! - Artifact categories are pushed in the order main, secondary, remote, snapshot.
//! - Test timeouts degrade to a possibly in-progress result, never an error.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod artifact;
pub mod cancel;
pub mod client;
pub mod endpoint;
pub mod execution;
pub mod model;
pub mod policy;
pub mod provider;
pub mod readiness;
pub mod sync;
pub mod telemetry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use artifact::ArtifactCategory;
pub use artifact::ArtifactError;
pub use artifact::ArtifactRef;
pub use artifact::ArtifactSet;
pub use cancel::CancelReason;
pub use cancel::CancellationScope;
pub use client::ArtifactUpload;
pub use client::ClientError;
pub use client::ClientFactory;
pub use client::HttpClientFactory;
pub use client::HttpClientSettings;
pub use client::HttpServiceClient;
pub use client::RemoteServiceClient;
pub use endpoint::EndpointError;
pub use endpoint::ServiceEndpoint;
pub use execution::TestExecutionCoordinator;
pub use execution::TestRunError;
pub use execution::test_case_id;
pub use model::BackendName;
pub use model::DailyInvocationStatistic;
pub use model::Header;
pub use model::RequestError;
pub use model::RequestResponsePair;
pub use model::TestCaseResult;
pub use model::TestRequest;
pub use model::TestResult;
pub use model::TestRunnerType;
pub use model::TestStepResult;
pub use policy::OrchestrationPolicy;
pub use policy::PollingPolicy;
pub use policy::ReadinessPolicy;
pub use policy::RetryPolicy;
pub use provider::FacadeOptions;
pub use provider::OrchestrationFacade;
pub use provider::ProviderError;
pub use provider::ProviderRegistry;
pub use provider::on_ready;
pub use readiness::ReadinessState;
pub use readiness::ReadinessWatcher;
pub use readiness::StartupSignal;
pub use sync::ArtifactSynchronizer;
pub use sync::SyncError;
pub use sync::SyncReport;
pub use sync::SyncedArtifact;
pub use telemetry::HarnessMetrics;
pub use telemetry::NoopMetrics;

// Re-exported so callers can build tokens and status codes without pinning versions.
pub use reqwest::StatusCode;
pub use tokio_util::sync::CancellationToken;
