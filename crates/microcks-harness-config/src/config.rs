// crates/microcks-harness-config/src/config.rs
// ============================================================================
// Module: Microcks Harness Configuration
// Description: Configuration loading and validation for the harness.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: microcks-harness-core, serde, toml, url
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section is optional and defaults to the reference timings. Invalid
//! values fail before any backend is contacted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use microcks_harness_core::ArtifactError;
use microcks_harness_core::ArtifactRef;
use microcks_harness_core::ArtifactSet;
use microcks_harness_core::FacadeOptions;
use microcks_harness_core::HttpClientFactory;
use microcks_harness_core::HttpClientSettings;
use microcks_harness_core::OrchestrationPolicy;
use microcks_harness_core::PollingPolicy;
use microcks_harness_core::ReadinessPolicy;
use microcks_harness_core::RetryPolicy;
use microcks_harness_core::ServiceEndpoint;
use microcks_harness_core::policy::DEFAULT_CONNECT_TIMEOUT_MS;
use microcks_harness_core::policy::DEFAULT_HEALTH_ATTEMPTS;
use microcks_harness_core::policy::DEFAULT_HEALTH_DELAY_MS;
use microcks_harness_core::policy::DEFAULT_REQUEST_TIMEOUT_MS;
use microcks_harness_core::policy::DEFAULT_STARTUP_MARKER;
use microcks_harness_core::policy::DEFAULT_SYNC_ATTEMPTS;
use microcks_harness_core::policy::DEFAULT_SYNC_RETRY_DELAY_MS;
use microcks_harness_core::policy::DEFAULT_TEST_GRACE_MS;
use microcks_harness_core::policy::DEFAULT_TEST_INITIAL_DELAY_MS;
use microcks_harness_core::policy::DEFAULT_TEST_POLL_INTERVAL_MS;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "microcks-harness.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "MICROCKS_HARNESS_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum backend name length.
pub(crate) const MAX_BACKEND_NAME_LENGTH: usize = 128;
/// Maximum number of configured artifacts across all categories.
pub(crate) const MAX_ARTIFACTS: usize = 256;
/// Maximum attempt ceiling for health checks and artifact pushes.
pub(crate) const MAX_ATTEMPTS: u32 = 100;
/// Maximum delay or interval in milliseconds.
pub(crate) const MAX_DELAY_MS: u64 = 60_000;
/// Minimum client connect timeout in milliseconds.
pub(crate) const MIN_CONNECT_TIMEOUT_MS: u64 = 100;
/// Maximum client connect timeout in milliseconds.
pub(crate) const MAX_CONNECT_TIMEOUT_MS: u64 = 60_000;
/// Minimum client request timeout in milliseconds.
pub(crate) const MIN_REQUEST_TIMEOUT_MS: u64 = 500;
/// Maximum client request timeout in milliseconds.
pub(crate) const MAX_REQUEST_TIMEOUT_MS: u64 = 300_000;
/// Default backend name.
const DEFAULT_BACKEND_NAME: &str = "microcks";
/// Default backend URL.
const DEFAULT_BACKEND_URL: &str = "http://localhost:8080";

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Harness configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HarnessConfig {
    /// Backend identity and endpoint.
    #[serde(default)]
    pub backend: BackendConfig,
    /// HTTP client transport settings.
    #[serde(default)]
    pub client: ClientConfig,
    /// Readiness detection settings.
    #[serde(default)]
    pub readiness: ReadinessConfig,
    /// Artifact retry settings.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Test polling settings.
    #[serde(default)]
    pub testing: TestingConfig,
    /// Artifacts pushed during synchronization.
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
    /// Directory relative artifact paths resolve against (not serialized).
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl HarnessConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let base_dir = resolved
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        Self::from_toml(content, base_dir)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str, base_dir: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let mut config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.base_dir = base_dir.into();
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.backend.validate()?;
        self.client.validate()?;
        self.readiness.validate()?;
        self.sync.validate()?;
        self.testing.validate()?;
        self.artifacts.validate()?;
        Ok(())
    }

    /// Returns the orchestration policies described by the config.
    #[must_use]
    pub fn policy(&self) -> OrchestrationPolicy {
        OrchestrationPolicy {
            readiness: ReadinessPolicy {
                startup_marker: self.backend.startup_marker.clone(),
                health_attempts: self.readiness.health_attempts,
                health_delay: Duration::from_millis(self.readiness.health_delay_ms),
            },
            retry: RetryPolicy {
                max_attempts: self.sync.max_attempts,
                delay: Duration::from_millis(self.sync.retry_delay_ms),
            },
            polling: PollingPolicy {
                grace: Duration::from_millis(self.testing.grace_ms),
                initial_delay: Duration::from_millis(self.testing.initial_delay_ms),
                interval: Duration::from_millis(self.testing.poll_interval_ms),
            },
        }
    }

    /// Returns the HTTP client settings described by the config.
    #[must_use]
    pub const fn client_settings(&self) -> HttpClientSettings {
        HttpClientSettings {
            connect_timeout: Duration::from_millis(self.client.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.client.request_timeout_ms),
        }
    }

    /// Returns facade options wired to the configured policies and client.
    #[must_use]
    pub fn facade_options(&self) -> FacadeOptions {
        FacadeOptions::default()
            .with_policy(self.policy())
            .with_client_factory(Arc::new(HttpClientFactory::new(self.client_settings())))
    }

    /// Builds the artifact set, checking that every local source exists.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Artifact`] when a file is missing or a URL is invalid.
    pub fn artifact_set(&self) -> Result<ArtifactSet, ConfigError> {
        let mut set = ArtifactSet::new();
        for path in &self.artifacts.main {
            set.push(ArtifactRef::main_file(self.resolve_artifact_path(path))?);
        }
        for path in &self.artifacts.secondary {
            set.push(ArtifactRef::secondary_file(self.resolve_artifact_path(path))?);
        }
        for remote in &self.artifacts.remote {
            set.push(ArtifactRef::remote_url(remote.url.trim(), remote.main)?);
        }
        for path in &self.artifacts.snapshots {
            set.push(ArtifactRef::snapshot_file(self.resolve_artifact_path(path))?);
        }
        Ok(set)
    }

    /// Resolves an artifact path against the config directory.
    #[must_use]
    pub fn resolve_artifact_path(&self, raw: &str) -> PathBuf {
        let path = Path::new(raw.trim());
        if path.is_absolute() { path.to_path_buf() } else { self.base_dir.join(path) }
    }
}

/// Backend identity and endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Backend name used as the registry key.
    #[serde(default = "default_backend_name")]
    pub name: String,
    /// Backend base URL.
    #[serde(default = "default_backend_url")]
    pub url: String,
    /// Log line marker that signals startup completion.
    #[serde(default = "default_startup_marker")]
    pub startup_marker: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            name: default_backend_name(),
            url: default_backend_url(),
            startup_marker: default_startup_marker(),
        }
    }
}

impl BackendConfig {
    /// Parses the configured URL into a backend endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the URL is not an http(s) URL.
    pub fn endpoint(&self) -> Result<ServiceEndpoint, ConfigError> {
        ServiceEndpoint::parse(&self.url)
            .map_err(|err| ConfigError::Invalid(format!("backend.url: {err}")))
    }

    /// Validates backend configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ConfigError::Invalid("backend.name must be non-empty".to_string()));
        }
        if name.len() > MAX_BACKEND_NAME_LENGTH {
            return Err(ConfigError::Invalid("backend.name exceeds max length".to_string()));
        }
        if self.startup_marker.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "backend.startup_marker must be non-empty".to_string(),
            ));
        }
        self.endpoint()?;
        Ok(())
    }
}

/// HTTP client transport settings.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ClientConfig {
    /// TCP connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Whole-request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl ClientConfig {
    /// Validates client timeouts.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_range(
            "client.connect_timeout_ms",
            self.connect_timeout_ms,
            MIN_CONNECT_TIMEOUT_MS,
            MAX_CONNECT_TIMEOUT_MS,
        )?;
        validate_range(
            "client.request_timeout_ms",
            self.request_timeout_ms,
            MIN_REQUEST_TIMEOUT_MS,
            MAX_REQUEST_TIMEOUT_MS,
        )
    }
}

/// Readiness detection settings.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ReadinessConfig {
    /// Maximum health calls.
    #[serde(default = "default_health_attempts")]
    pub health_attempts: u32,
    /// Delay after each failed health call in milliseconds.
    #[serde(default = "default_health_delay_ms")]
    pub health_delay_ms: u64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            health_attempts: default_health_attempts(),
            health_delay_ms: default_health_delay_ms(),
        }
    }
}

impl ReadinessConfig {
    /// Validates readiness bounds.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_attempts("readiness.health_attempts", self.health_attempts)?;
        validate_range("readiness.health_delay_ms", self.health_delay_ms, 0, MAX_DELAY_MS)
    }
}

/// Artifact retry settings.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SyncConfig {
    /// Total attempts per artifact, including the first.
    #[serde(default = "default_sync_attempts")]
    pub max_attempts: u32,
    /// Delay between attempts in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_sync_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl SyncConfig {
    /// Validates retry bounds.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_attempts("sync.max_attempts", self.max_attempts)?;
        validate_range("sync.retry_delay_ms", self.retry_delay_ms, 0, MAX_DELAY_MS)
    }
}

/// Test polling settings.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TestingConfig {
    /// Grace period added to each request timeout in milliseconds.
    #[serde(default = "default_grace_ms")]
    pub grace_ms: u64,
    /// Wait before the first poll in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Interval between polls in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for TestingConfig {
    fn default() -> Self {
        Self {
            grace_ms: default_grace_ms(),
            initial_delay_ms: default_initial_delay_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl TestingConfig {
    /// Validates polling bounds.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_range("testing.grace_ms", self.grace_ms, 0, MAX_DELAY_MS)?;
        validate_range("testing.initial_delay_ms", self.initial_delay_ms, 0, MAX_DELAY_MS)?;
        validate_range("testing.poll_interval_ms", self.poll_interval_ms, 1, MAX_DELAY_MS)
    }
}

/// Artifacts pushed during synchronization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArtifactsConfig {
    /// Primary contract files.
    #[serde(default)]
    pub main: Vec<String>,
    /// Secondary files layered onto primaries.
    #[serde(default)]
    pub secondary: Vec<String>,
    /// Repository snapshot files.
    #[serde(default)]
    pub snapshots: Vec<String>,
    /// Remote artifacts fetched by the backend.
    #[serde(default)]
    pub remote: Vec<RemoteArtifactConfig>,
}

impl ArtifactsConfig {
    /// Returns the number of configured artifacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.main.len() + self.secondary.len() + self.snapshots.len() + self.remote.len()
    }

    /// Returns true when no artifact is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Validates artifact locators without touching the filesystem.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.len() > MAX_ARTIFACTS {
            return Err(ConfigError::Invalid("artifacts exceed max entries".to_string()));
        }
        for path in &self.main {
            validate_path_string("artifacts.main", path)?;
        }
        for path in &self.secondary {
            validate_path_string("artifacts.secondary", path)?;
        }
        for path in &self.snapshots {
            validate_path_string("artifacts.snapshots", path)?;
        }
        for remote in &self.remote {
            remote.validate()?;
        }
        Ok(())
    }
}

/// Remote artifact entry.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteArtifactConfig {
    /// URL the backend downloads.
    pub url: String,
    /// Whether the artifact is a primary contract.
    #[serde(default = "default_remote_main")]
    pub main: bool,
}

impl RemoteArtifactConfig {
    /// Validates the remote URL.
    fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(self.url.trim())
            .map_err(|err| ConfigError::Invalid(format!("artifacts.remote.url: {err}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(
                "artifacts.remote.url must use http:// or https://".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
    /// Configured artifact failed construction.
    #[error("invalid config: {0}")]
    Artifact(#[from] ArtifactError),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} entries must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} entry exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates an attempt ceiling.
fn validate_attempts(field: &str, value: u32) -> Result<(), ConfigError> {
    if value == 0 || value > MAX_ATTEMPTS {
        return Err(ConfigError::Invalid(format!("{field} must be between 1 and {MAX_ATTEMPTS}")));
    }
    Ok(())
}

/// Validates a millisecond value against inclusive bounds.
fn validate_range(field: &str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::Invalid(format!("{field} must be between {min} and {max}")));
    }
    Ok(())
}

/// Default backend name.
fn default_backend_name() -> String {
    DEFAULT_BACKEND_NAME.to_string()
}

/// Default backend URL.
fn default_backend_url() -> String {
    DEFAULT_BACKEND_URL.to_string()
}

/// Default startup marker.
fn default_startup_marker() -> String {
    DEFAULT_STARTUP_MARKER.to_string()
}

/// Default connect timeout.
const fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

/// Default request timeout.
const fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

/// Default health attempt ceiling.
const fn default_health_attempts() -> u32 {
    DEFAULT_HEALTH_ATTEMPTS
}

/// Default artifact attempt ceiling.
const fn default_sync_attempts() -> u32 {
    DEFAULT_SYNC_ATTEMPTS
}

/// Default delay after a failed health call.
const fn default_health_delay_ms() -> u64 {
    DEFAULT_HEALTH_DELAY_MS
}

/// Default delay after a failed artifact push.
const fn default_retry_delay_ms() -> u64 {
    DEFAULT_SYNC_RETRY_DELAY_MS
}

/// Default test grace period.
const fn default_grace_ms() -> u64 {
    DEFAULT_TEST_GRACE_MS
}

/// Default wait before the first poll.
const fn default_initial_delay_ms() -> u64 {
    DEFAULT_TEST_INITIAL_DELAY_MS
}

/// Default poll interval.
const fn default_poll_interval_ms() -> u64 {
    DEFAULT_TEST_POLL_INTERVAL_MS
}

/// Remote artifacts are primaries unless stated otherwise.
const fn default_remote_main() -> bool {
    true
}
