// crates/microcks-harness-core/src/provider.rs
// ============================================================================
// Module: Microcks Harness Orchestration Facade
// Description: Single entry point per backend plus a keyed provider registry.
// Purpose: Compose readiness, synchronization, and test execution.
// Dependencies: thiserror, tokio, tokio-util, tracing
// ============================================================================

//! ## Overview
//! [`OrchestrationFacade`] owns the resolved endpoint, the configured
//! artifacts, and a lazily constructed client handle for one backend. The
//! host calls [`on_ready`] once the endpoint is known. [`ProviderRegistry`]
//! keeps facades by backend name when several backends share a process.
//! Invariants:
//! - The client handle is created at most once per facade and shared read-only.
//! - Artifacts are synchronized at most once per facade.
//! - Every call takes its backend identity from the facade, never from shared state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::RwLock;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use thiserror::Error;
use time::Date;
use tokio::sync::OnceCell;
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing::warn;
use url::Url;

use crate::artifact::ArtifactSet;
use crate::client::ClientError;
use crate::client::ClientFactory;
use crate::client::HttpClientFactory;
use crate::client::RemoteServiceClient;
use crate::endpoint::EndpointError;
use crate::endpoint::ServiceEndpoint;
use crate::execution::TestExecutionCoordinator;
use crate::execution::TestRunError;
use crate::model::BackendName;
use crate::model::RequestError;
use crate::model::RequestResponsePair;
use crate::model::TestRequest;
use crate::model::TestResult;
use crate::policy::OrchestrationPolicy;
use crate::readiness::ReadinessState;
use crate::readiness::ReadinessWatcher;
use crate::sync::ArtifactSynchronizer;
use crate::sync::SyncError;
use crate::sync::SyncReport;
use crate::telemetry::HarnessMetrics;
use crate::telemetry::NoopMetrics;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Facade and registry failures.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Backend name was blank.
    #[error("invalid backend name: {0}")]
    InvalidName(#[from] RequestError),
    /// Endpoint URL was rejected.
    #[error(transparent)]
    InvalidEndpoint(#[from] EndpointError),
    /// Client construction or a single backend call failed.
    #[error(transparent)]
    Client(#[from] ClientError),
    /// Artifact synchronization failed.
    #[error(transparent)]
    Sync(#[from] SyncError),
    /// Test run failed.
    #[error(transparent)]
    TestRun(#[from] TestRunError),
    /// No provider is registered under the name.
    #[error("no backend registered under '{0}'")]
    UnknownBackend(String),
    /// A provider is already registered under the name.
    #[error("backend '{0}' is already registered")]
    DuplicateBackend(String),
    /// Registry lock was poisoned by a panicking writer.
    #[error("provider registry lock poisoned")]
    RegistryPoisoned,
}

// ============================================================================
// SECTION: Options
// ============================================================================

/// Policies and collaborators applied to a facade.
#[derive(Clone)]
pub struct FacadeOptions {
    /// Timing and retry policies.
    pub policy: OrchestrationPolicy,
    /// Metrics sink shared by every component.
    pub metrics: Arc<dyn HarnessMetrics>,
    /// Builds the client handle on first use.
    pub client_factory: Arc<dyn ClientFactory>,
}

impl FacadeOptions {
    /// Replaces the policies.
    #[must_use]
    pub fn with_policy(mut self, policy: OrchestrationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replaces the metrics sink.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn HarnessMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Replaces the client factory.
    #[must_use]
    pub fn with_client_factory(mut self, client_factory: Arc<dyn ClientFactory>) -> Self {
        self.client_factory = client_factory;
        self
    }
}

impl Default for FacadeOptions {
    fn default() -> Self {
        Self {
            policy: OrchestrationPolicy::default(),
            metrics: Arc::new(NoopMetrics),
            client_factory: Arc::new(HttpClientFactory::default()),
        }
    }
}

// ============================================================================
// SECTION: Lifecycle Trigger
// ============================================================================

/// Builds the facade for a backend whose endpoint has just become known.
///
/// No network call is made; the client is created on first use.
///
/// # Errors
///
/// Returns [`ProviderError`] when the name is blank or the URL is invalid.
pub fn on_ready(
    name: &str,
    endpoint_url: &str,
    artifacts: ArtifactSet,
    options: FacadeOptions,
) -> Result<OrchestrationFacade, ProviderError> {
    let name = BackendName::new(name)?;
    let endpoint = ServiceEndpoint::parse(endpoint_url)?;
    Ok(OrchestrationFacade::new(name, endpoint, artifacts, options))
}

// ============================================================================
// SECTION: Facade
// ============================================================================

/// Orchestration entry point for one backend.
pub struct OrchestrationFacade {
    /// Backend identity.
    name: BackendName,
    /// Resolved base URL.
    endpoint: ServiceEndpoint,
    /// Artifacts pushed by [`OrchestrationFacade::synchronize_artifacts`].
    artifacts: ArtifactSet,
    /// Policies and collaborators.
    options: FacadeOptions,
    /// Memoized client handle.
    client: OnceCell<Arc<dyn RemoteServiceClient>>,
    /// Set once a synchronization pass has started.
    synchronized: AtomicBool,
}

impl OrchestrationFacade {
    /// Creates a facade from already-validated parts.
    #[must_use]
    pub fn new(
        name: BackendName,
        endpoint: ServiceEndpoint,
        artifacts: ArtifactSet,
        options: FacadeOptions,
    ) -> Self {
        Self {
            name,
            endpoint,
            artifacts,
            options,
            client: OnceCell::new(),
            synchronized: AtomicBool::new(false),
        }
    }

    /// Returns the backend identity.
    #[must_use]
    pub const fn name(&self) -> &BackendName {
        &self.name
    }

    /// Returns the backend base URL.
    #[must_use]
    pub const fn endpoint(&self) -> &ServiceEndpoint {
        &self.endpoint
    }

    /// Returns true once a synchronization pass has been started.
    #[must_use]
    pub fn is_synchronized(&self) -> bool {
        self.synchronized.load(Ordering::Acquire)
    }

    /// Returns the shared client, creating it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Client`] when the factory fails.
    pub async fn client(&self) -> Result<Arc<dyn RemoteServiceClient>, ProviderError> {
        let client = self
            .client
            .get_or_try_init(|| async { self.options.client_factory.connect(&self.endpoint) })
            .await?;
        Ok(Arc::clone(client))
    }

    /// Runs the readiness state machine and returns its terminal state.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Client`] only when the client cannot be
    /// created; an unhealthy backend is reported through the state.
    pub async fn wait_until_ready<S>(
        &self,
        logs: Option<S>,
        cancel: &CancellationToken,
    ) -> Result<ReadinessState, ProviderError>
    where
        S: Stream<Item = String> + Send + Unpin,
    {
        let watcher = ReadinessWatcher::new(
            self.name.clone(),
            self.client().await?,
            self.options.policy.readiness.clone(),
        )
        .with_metrics(Arc::clone(&self.options.metrics));
        Ok(watcher.wait_until_ready(logs, cancel).await)
    }

    /// Pushes the configured artifacts once.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Sync`] on the first failing artifact, or with
    /// [`SyncError::AlreadySynchronized`] when a pass already ran.
    pub async fn synchronize_artifacts(
        &self,
        cancel: &CancellationToken,
    ) -> Result<SyncReport, ProviderError> {
        if self.is_synchronized() {
            return Err(SyncError::AlreadySynchronized.into());
        }
        let client = self.client().await?;
        if self
            .synchronized
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SyncError::AlreadySynchronized.into());
        }
        let synchronizer =
            ArtifactSynchronizer::new(self.name.clone(), client, self.options.policy.retry)
                .with_metrics(Arc::clone(&self.options.metrics));
        Ok(synchronizer.synchronize(&self.artifacts, cancel).await?)
    }

    /// Waits for readiness, then synchronizes artifacts.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when synchronization fails.
    pub async fn start<S>(
        &self,
        logs: Option<S>,
        cancel: &CancellationToken,
    ) -> Result<ReadinessState, ProviderError>
    where
        S: Stream<Item = String> + Send + Unpin,
    {
        let state = self.wait_until_ready(logs, cancel).await?;
        info!(backend = %self.name, state = state.as_str(), "readiness wait finished");
        self.synchronize_artifacts(cancel).await?;
        Ok(state)
    }

    /// Runs one conformance test.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on validation or non-transient client failures.
    /// Timeouts yield a possibly in-progress result instead.
    pub async fn run_test(
        &self,
        request: &TestRequest,
        cancel: &CancellationToken,
    ) -> Result<TestResult, ProviderError> {
        Ok(self.coordinator().await?.run_test(request, cancel).await?)
    }

    /// Fetches the exchanges captured for one operation of a result.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the fetch fails or is cancelled.
    pub async fn get_messages(
        &self,
        result: &TestResult,
        operation_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<RequestResponsePair>, ProviderError> {
        let coordinator = self.coordinator().await?;
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ClientError::Cancelled.into()),
            pairs = coordinator.get_messages(result, operation_name) => Ok(pairs?),
        }
    }

    /// Issues one health call; 2xx means healthy.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Client`] when no response is received.
    pub async fn is_healthy(&self, cancel: &CancellationToken) -> Result<bool, ProviderError> {
        let client = self.client().await?;
        let status = cancellable(cancel, client.check_health()).await?;
        Ok(status.is_success())
    }

    /// Returns the daily invocation count of a mocked service.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Client`] when the metrics call fails.
    pub async fn invocation_count(
        &self,
        service_name: &str,
        service_version: &str,
        day: Option<Date>,
        cancel: &CancellationToken,
    ) -> Result<f64, ProviderError> {
        let client = self.client().await?;
        let statistic =
            cancellable(cancel, client.invocation_statistics(service_name, service_version, day))
                .await?;
        Ok(statistic.daily_count)
    }

    /// Returns true when the mocked service was invoked at least once that day.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Client`] when the metrics call fails.
    pub async fn verify(
        &self,
        service_name: &str,
        service_version: &str,
        day: Option<Date>,
        cancel: &CancellationToken,
    ) -> Result<bool, ProviderError> {
        let count = self.invocation_count(service_name, service_version, day, cancel).await?;
        Ok(count > 0.0)
    }

    /// Returns the REST mock URL for a service.
    #[must_use]
    pub fn rest_mock_endpoint(&self, service_name: &str, service_version: &str) -> Url {
        self.endpoint.rest_mock_endpoint(service_name, service_version)
    }

    /// Returns the SOAP mock URL for a service.
    #[must_use]
    pub fn soap_mock_endpoint(&self, service_name: &str, service_version: &str) -> Url {
        self.endpoint.soap_mock_endpoint(service_name, service_version)
    }

    /// Returns the GraphQL mock URL for a service.
    #[must_use]
    pub fn graphql_mock_endpoint(&self, service_name: &str, service_version: &str) -> Url {
        self.endpoint.graphql_mock_endpoint(service_name, service_version)
    }

    /// Returns the gRPC mock URL.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidEndpoint`] when the URL cannot be rebuilt.
    pub fn grpc_mock_endpoint(&self) -> Result<Url, ProviderError> {
        Ok(self.endpoint.grpc_mock_endpoint()?)
    }

    /// Builds a coordinator bound to the shared client.
    async fn coordinator(&self) -> Result<TestExecutionCoordinator, ProviderError> {
        Ok(TestExecutionCoordinator::new(self.name.clone(), self.client().await?, self.options.policy.polling)
            .with_metrics(Arc::clone(&self.options.metrics)))
    }
}

impl fmt::Debug for OrchestrationFacade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrchestrationFacade")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint.as_str())
            .field("synchronized", &self.is_synchronized())
            .finish_non_exhaustive()
    }
}

/// Races a single client call against the caller token.
async fn cancellable<T>(
    cancel: &CancellationToken,
    call: impl Future<Output = Result<T, ClientError>>,
) -> Result<T, ClientError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(ClientError::Cancelled),
        result = call => result,
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Facades keyed by backend name.
///
/// # Invariants
/// - A name maps to at most one facade at a time.
/// - Only facades whose startup succeeded stay registered.
pub struct ProviderRegistry {
    /// Options applied to facades built by [`ProviderRegistry::on_backend_ready`].
    options: FacadeOptions,
    /// Registered facades.
    providers: RwLock<BTreeMap<BackendName, Arc<OrchestrationFacade>>>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(options: FacadeOptions) -> Self {
        Self {
            options,
            providers: RwLock::new(BTreeMap::new()),
        }
    }

    /// Registers a facade built elsewhere.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::DuplicateBackend`] when the name is taken.
    pub fn register(
        &self,
        facade: OrchestrationFacade,
    ) -> Result<Arc<OrchestrationFacade>, ProviderError> {
        let mut providers = self.providers.write().map_err(|_| ProviderError::RegistryPoisoned)?;
        if providers.contains_key(facade.name()) {
            return Err(ProviderError::DuplicateBackend(facade.name().to_string()));
        }
        let facade = Arc::new(facade);
        providers.insert(facade.name().clone(), Arc::clone(&facade));
        Ok(facade)
    }

    /// Lifecycle hook: builds, registers, and starts the facade for a backend.
    ///
    /// Readiness is advisory; synchronization failure is a hard startup error
    /// and unregisters the facade so the hook can be retried.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on invalid input, a duplicate name, or a
    /// failed synchronization pass.
    pub async fn on_backend_ready<S>(
        &self,
        name: &str,
        endpoint_url: &str,
        artifacts: ArtifactSet,
        logs: Option<S>,
        cancel: &CancellationToken,
    ) -> Result<Arc<OrchestrationFacade>, ProviderError>
    where
        S: Stream<Item = String> + Send + Unpin,
    {
        let facade = on_ready(name, endpoint_url, artifacts, self.options.clone())?;
        let facade = self.register(facade)?;
        info!(backend = %facade.name(), endpoint = %facade.endpoint(), "backend ready");
        if let Err(err) = facade.start(logs, cancel).await {
            warn!(backend = %facade.name(), error = %err, "backend startup failed; unregistering");
            self.unregister(&facade)?;
            return Err(err);
        }
        Ok(facade)
    }

    /// Removes a facade if it is still the one registered under its name.
    fn unregister(&self, facade: &Arc<OrchestrationFacade>) -> Result<(), ProviderError> {
        let mut providers = self.providers.write().map_err(|_| ProviderError::RegistryPoisoned)?;
        if providers.get(facade.name().as_str()).is_some_and(|current| Arc::ptr_eq(current, facade)) {
            providers.remove(facade.name().as_str());
        }
        Ok(())
    }

    /// Looks up a facade by name.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::RegistryPoisoned`] when the lock is poisoned.
    pub fn provider(&self, name: &str) -> Result<Option<Arc<OrchestrationFacade>>, ProviderError> {
        let providers = self.providers.read().map_err(|_| ProviderError::RegistryPoisoned)?;
        Ok(providers.get(name).cloned())
    }

    /// Resolves the facade for a backend already running in this process.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::UnknownBackend`] when nothing is registered under the name.
    pub fn create_provider(&self, name: &str) -> Result<Arc<OrchestrationFacade>, ProviderError> {
        self.provider(name)?.ok_or_else(|| ProviderError::UnknownBackend(name.to_string()))
    }

    /// Returns registered names in sorted order.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::RegistryPoisoned`] when the lock is poisoned.
    pub fn names(&self) -> Result<Vec<BackendName>, ProviderError> {
        let providers = self.providers.read().map_err(|_| ProviderError::RegistryPoisoned)?;
        Ok(providers.keys().cloned().collect())
    }
}
