//! The chunk-processing state machine.
//!
//! Each step run flows through:
//! READING → PROCESSING → COMMITTING → {RETRYING | SCANNING} → ... →
//! COMPLETED | FAILED
//!
//! The two-phase degrade from atomic-chunk commits to per-item transactions
//! is an explicit transition (COMMITTING/RETRYING → SCANNING), not implicit
//! error handling, so the recovery path stays auditable.

use std::fmt;

use serde::{Deserialize, Serialize};

/// States of the chunk-processing state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepState {
    /// Pulling items from the reader until the chunk is full or the source
    /// is exhausted.
    Reading,
    /// Applying the configured item transformation.
    Processing,
    /// Attempting the atomic whole-chunk commit.
    Committing,
    /// A retryable failure occurred and attempts remain; the same chunk will
    /// be re-committed.
    Retrying,
    /// Degraded to per-item transactions to isolate poison items.
    Scanning,
    /// All items consumed; terminal.
    Completed,
    /// The run ended with a recorded failure; terminal.
    Failed,
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepState::Reading => write!(f, "READING"),
            StepState::Processing => write!(f, "PROCESSING"),
            StepState::Committing => write!(f, "COMMITTING"),
            StepState::Retrying => write!(f, "RETRYING"),
            StepState::Scanning => write!(f, "SCANNING"),
            StepState::Completed => write!(f, "COMPLETED"),
            StepState::Failed => write!(f, "FAILED"),
        }
    }
}

impl StepState {
    pub fn is_terminal(self) -> bool {
        matches!(self, StepState::Completed | StepState::Failed)
    }

    /// Legal-transition table for the step lifecycle.
    pub fn can_transition_to(self, next: StepState) -> bool {
        use StepState::*;
        matches!(
            (self, next),
            (Reading, Processing)
                | (Reading, Completed)
                | (Reading, Failed)
                // All items of a chunk may be dropped during processing, in
                // which case there is nothing to commit.
                | (Processing, Committing)
                | (Processing, Reading)
                | (Processing, Failed)
                | (Committing, Reading)
                | (Committing, Retrying)
                | (Committing, Scanning)
                | (Committing, Failed)
                | (Retrying, Committing)
                | (Retrying, Scanning)
                | (Retrying, Failed)
                | (Scanning, Reading)
                | (Scanning, Failed)
        )
    }
}

/// Tracks the current state and the transition history of one run.
#[derive(Debug, Clone)]
pub struct StateLog {
    current: StepState,
    history: Vec<StepState>,
}

impl StateLog {
    pub fn new() -> Self {
        Self {
            current: StepState::Reading,
            history: Vec::new(),
        }
    }

    pub fn current(&self) -> StepState {
        self.current
    }

    /// Moves to `next`, recording the state being left.
    ///
    /// Illegal transitions are a logic error in the orchestrator, not a
    /// runtime condition.
    pub fn advance(&mut self, next: StepState) {
        debug_assert!(
            self.current.can_transition_to(next),
            "illegal transition {} -> {}",
            self.current,
            next
        );
        self.history.push(self.current);
        self.current = next;
    }

    /// Full history including the current (normally terminal) state.
    pub fn into_history(mut self) -> Vec<StepState> {
        self.history.push(self.current);
        self.history
    }
}

impl Default for StateLog {
    fn default() -> Self {
        Self::new()
    }
}
