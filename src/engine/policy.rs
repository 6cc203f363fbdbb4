//! Retry and skip policies plus the run-scoped state they consult.
//!
//! Policies are pure bounds checks; the counters live in [`RetryState`] and
//! [`SkipState`], which the orchestrator owns for the duration of a run and
//! hands to the policies read-only.

use serde::{Deserialize, Serialize};

/// Bounds whole-chunk commit attempts.
///
/// `max_attempts` counts total attempts, so 1 means no retry. Values below 1
/// are clamped up to 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// True while another whole-chunk attempt is allowed after `attempts`
    /// failed ones.
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Attempt counter scoped to one chunk's lifetime; reset when the chunk
/// succeeds or is abandoned.
#[derive(Debug, Default, Clone, Copy)]
pub struct RetryState {
    attempts: u32,
}

impl RetryState {
    pub fn record_attempt(&mut self) {
        self.attempts += 1;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// Bounds the number of items excluded from commit over a whole run.
///
/// A limit of 0 means skip handling is disabled: the recovery scanner is
/// never entered and a failed chunk fails the step outright.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipPolicy {
    limit: u32,
}

impl SkipPolicy {
    pub fn new(limit: u32) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn is_enabled(&self) -> bool {
        self.limit > 0
    }

    /// True while another item may be skipped after `skipped` already were.
    pub fn should_skip(&self, skipped: u32) -> bool {
        self.limit > 0 && skipped < self.limit
    }
}

/// Skip counter scoped to the whole run; monotonic, never reset.
#[derive(Debug, Default, Clone, Copy)]
pub struct SkipState {
    skipped: u32,
}

impl SkipState {
    pub fn record_skip(&mut self) {
        self.skipped += 1;
    }

    pub fn skipped(&self) -> u32 {
        self.skipped
    }
}
