// crates/microcks-harness-core/src/cancel.rs
// ============================================================================
// Module: Microcks Harness Linked Cancellation
// Description: Caller token merged with an optional deadline.
// Purpose: One cancellation boundary for readiness waits and test polling.
// Dependencies: tokio, tokio-util
// ============================================================================

//! ## Overview
//! A [`CancellationScope`] fires when either the caller's token is cancelled
//! or its deadline passes. Cancellation is cooperative: the scope is checked
//! between network calls and never interrupts a call already in flight.
//! Invariants:
//! - The scope owns a child token; dropping the scope cancels the child and
//!   releases its registration on the parent on every exit path.
//! - Cancelling the scope never cancels the caller's token.
//! - No background task is spawned; the deadline is observed by the waiter.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

// ============================================================================
// SECTION: Cancellation Reason
// ============================================================================

/// Source that fired a cancellation scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// Caller token was cancelled.
    Caller,
    /// Scope deadline elapsed.
    Deadline,
}

impl CancelReason {
    /// Returns a stable label for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Caller => "caller",
            Self::Deadline => "deadline",
        }
    }
}

// ============================================================================
// SECTION: Cancellation Scope
// ============================================================================

/// Caller cancellation linked with an optional deadline.
#[derive(Debug)]
pub struct CancellationScope {
    /// Child of the caller token.
    token: CancellationToken,
    /// Instant after which the scope counts as cancelled.
    deadline: Option<Instant>,
}

impl CancellationScope {
    /// Links a scope to the caller token without a deadline.
    #[must_use]
    pub fn linked(parent: &CancellationToken) -> Self {
        Self {
            token: parent.child_token(),
            deadline: None,
        }
    }

    /// Links a scope that also fires once `timeout` has elapsed from now.
    #[must_use]
    pub fn with_timeout(parent: &CancellationToken, timeout: Duration) -> Self {
        let deadline = Instant::now().checked_add(timeout);
        Self {
            token: parent.child_token(),
            deadline,
        }
    }

    /// Returns why the scope fired, or `None` while it is still live.
    #[must_use]
    pub fn reason(&self) -> Option<CancelReason> {
        if self.token.is_cancelled() {
            return Some(CancelReason::Caller);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelReason::Deadline),
            _ => None,
        }
    }

    /// Returns true once the caller cancelled or the deadline passed.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.reason().is_some()
    }

    /// Completes when the scope fires.
    pub async fn cancelled(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    () = self.token.cancelled() => {}
                    () = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }

    /// Sleeps for `duration` unless the scope fires first.
    ///
    /// Returns `true` when the full duration elapsed and `false` when the
    /// scope fired.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            biased;
            () = self.cancelled() => false,
            () = tokio::time::sleep(duration) => true,
        }
    }
}

impl Drop for CancellationScope {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
