//! Recovery scanner: degrades a failed chunk into per-item transactions.
//!
//! Entered after a whole-chunk commit failed and classification permits
//! skipping. Each item of the chunk is re-submitted in original order as its
//! own atomic commit, so the poison item(s) are isolated without discarding
//! the well-formed items around them.

use super::classifier::{Classifier, Decision};
use super::policy::{SkipPolicy, SkipState};
use super::writer::WriteBoundary;
use crate::error::Fault;
use crate::io::ItemWriter;

/// What one scan pass resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport<I> {
    pub committed: u32,
    pub skipped: Vec<I>,
}

pub struct RecoveryScanner;

impl RecoveryScanner {
    /// Resolves every item of `chunk`: committed individually, or skipped
    /// when its fault is skippable and the skip budget allows.
    ///
    /// A fatal fault, a non-skippable fault, or an exhausted skip budget
    /// abandons the scan; the caller fails the step with the returned fault.
    /// Items committed before the abort stay committed. Scanning an empty
    /// (already resolved) chunk is a no-op.
    pub fn scan<I, W>(
        chunk: &[I],
        boundary: &mut WriteBoundary<I, W>,
        classifier: &Classifier,
        skip_policy: &SkipPolicy,
        skip_state: &mut SkipState,
    ) -> Result<ScanReport<I>, Fault>
    where
        I: Clone,
        W: ItemWriter<I>,
    {
        let mut report = ScanReport {
            committed: 0,
            skipped: Vec::new(),
        };
        for item in chunk {
            match boundary.commit_single(item) {
                Ok(()) => report.committed += 1,
                Err(fault) => match classifier.classify(&fault) {
                    Decision::Skippable if skip_policy.should_skip(skip_state.skipped()) => {
                        skip_state.record_skip();
                        report.skipped.push(item.clone());
                    }
                    _ => return Err(fault),
                },
            }
        }
        Ok(report)
    }
}
