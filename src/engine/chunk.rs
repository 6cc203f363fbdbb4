//! Chunk data model and the audit record a step run produces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::StepState;
use crate::error::Fault;

/// Bounded, ordered group of items committed as one atomic unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk<I> {
    items: Vec<I>,
    capacity: usize,
}

impl<I> Chunk<I> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Adds an item. The caller is expected to stop at `is_full`.
    pub fn push(&mut self, item: I) {
        self.items.push(item);
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn items(&self) -> &[I] {
        &self.items
    }

    pub fn into_items(self) -> Vec<I> {
        self.items
    }
}

/// Terminal result of a step run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    Completed,
    Failed,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Completed => write!(f, "COMPLETED"),
            StepStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Audit record of one step run, created once when the run reaches a terminal
/// state and immutable thereafter.
///
/// `written` holds every item handed to the sink, including items of failed
/// or retried attempts; `committed` holds the durable subset, in original
/// relative order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepExecution<I> {
    pub id: String,
    pub status: StepStatus,
    pub written: Vec<I>,
    pub committed: Vec<I>,
    pub read_count: u32,
    pub commit_count: u32,
    pub rollback_count: u32,
    pub retry_count: u32,
    pub skip_count: u32,
    pub state_history: Vec<StepState>,
    pub last_fault: Option<Fault>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
}
