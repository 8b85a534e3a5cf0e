// crates/microcks-harness-core/src/policy.rs
// ============================================================================
// Module: Microcks Harness Policies
// Description: Retry, readiness, and polling timing knobs.
// Purpose: Keep every fixed delay and ceiling in one place with defaults.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Defaults reproduce the reference timings: three health attempts 100ms
//! apart, five artifact attempts 100ms apart, and test polling every 200ms
//! after a 100ms initial delay with a one-second grace period.

use std::time::Duration;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default log marker signalling that the backend finished booting.
pub const DEFAULT_STARTUP_MARKER: &str = "Started MicrocksApplication";
/// Default health attempt ceiling.
pub const DEFAULT_HEALTH_ATTEMPTS: u32 = 3;
/// Default delay after a failed health attempt, in milliseconds.
pub const DEFAULT_HEALTH_DELAY_MS: u64 = 100;
/// Default delay after a failed health attempt.
pub const DEFAULT_HEALTH_DELAY: Duration = Duration::from_millis(DEFAULT_HEALTH_DELAY_MS);
/// Default artifact attempt ceiling.
pub const DEFAULT_SYNC_ATTEMPTS: u32 = 5;
/// Default delay between artifact attempts, in milliseconds.
pub const DEFAULT_SYNC_RETRY_DELAY_MS: u64 = 100;
/// Default delay between artifact attempts.
pub const DEFAULT_SYNC_RETRY_DELAY: Duration = Duration::from_millis(DEFAULT_SYNC_RETRY_DELAY_MS);
/// Default grace period added to a test request's timeout, in milliseconds.
pub const DEFAULT_TEST_GRACE_MS: u64 = 1_000;
/// Default grace period added to a test request's timeout.
pub const DEFAULT_TEST_GRACE: Duration = Duration::from_millis(DEFAULT_TEST_GRACE_MS);
/// Default wait before the first poll, in milliseconds.
pub const DEFAULT_TEST_INITIAL_DELAY_MS: u64 = 100;
/// Default wait before the first poll.
pub const DEFAULT_TEST_INITIAL_DELAY: Duration = Duration::from_millis(DEFAULT_TEST_INITIAL_DELAY_MS);
/// Default interval between polls, in milliseconds.
pub const DEFAULT_TEST_POLL_INTERVAL_MS: u64 = 200;
/// Default interval between polls.
pub const DEFAULT_TEST_POLL_INTERVAL: Duration = Duration::from_millis(DEFAULT_TEST_POLL_INTERVAL_MS);
/// Default TCP connect timeout for backend calls, in milliseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;
/// Default whole-request timeout for backend calls, in milliseconds.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

// ============================================================================
// SECTION: Policies
// ============================================================================

/// Readiness detection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessPolicy {
    /// Case-insensitive marker searched for in the log stream.
    pub startup_marker: String,
    /// Maximum health calls.
    pub health_attempts: u32,
    /// Delay after each failed health call.
    pub health_delay: Duration,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            startup_marker: DEFAULT_STARTUP_MARKER.to_string(),
            health_attempts: DEFAULT_HEALTH_ATTEMPTS,
            health_delay: DEFAULT_HEALTH_DELAY,
        }
    }
}

/// Bounded fixed-delay retry for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_SYNC_ATTEMPTS,
            delay: DEFAULT_SYNC_RETRY_DELAY,
        }
    }
}

/// Test poll loop timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingPolicy {
    /// Added to the request timeout to form the effective deadline.
    pub grace: Duration,
    /// Wait before the first poll.
    pub initial_delay: Duration,
    /// Wait between polls.
    pub interval: Duration,
}

impl PollingPolicy {
    /// Returns the effective deadline budget for a request timeout.
    #[must_use]
    pub const fn effective_budget(&self, timeout: Duration) -> Duration {
        timeout.saturating_add(self.grace)
    }
}

impl Default for PollingPolicy {
    fn default() -> Self {
        Self {
            grace: DEFAULT_TEST_GRACE,
            initial_delay: DEFAULT_TEST_INITIAL_DELAY,
            interval: DEFAULT_TEST_POLL_INTERVAL,
        }
    }
}

/// All orchestration policies for one backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrchestrationPolicy {
    /// Readiness detection.
    pub readiness: ReadinessPolicy,
    /// Artifact retry.
    pub retry: RetryPolicy,
    /// Test polling.
    pub polling: PollingPolicy,
}
