//! The chunk commit boundary around the external sink.
//!
//! Every attempt's items are recorded in the written sequence before the sink
//! is invoked, whether or not the attempt succeeds; the committed sequence
//! only grows on success. Written vs committed is the auditable record the
//! rest of the engine is judged against.

use crate::error::Fault;
use crate::io::ItemWriter;

/// Wraps the sink's write call in the atomic commit unit and keeps the two
/// audit sequences.
#[derive(Debug)]
pub struct WriteBoundary<I, W> {
    writer: W,
    written: Vec<I>,
    committed: Vec<I>,
    commit_count: u32,
    rollback_count: u32,
}

/// Audit sequences and counters extracted when the run ends.
#[derive(Debug)]
pub struct WriteAudit<I> {
    pub written: Vec<I>,
    pub committed: Vec<I>,
    pub commit_count: u32,
    pub rollback_count: u32,
}

impl<I, W> WriteBoundary<I, W>
where
    I: Clone,
    W: ItemWriter<I>,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            written: Vec::new(),
            committed: Vec::new(),
            commit_count: 0,
            rollback_count: 0,
        }
    }

    /// Commits a whole chunk as one atomic operation.
    ///
    /// On failure no item of the chunk is committed, but all of them are
    /// recorded as written for this attempt.
    pub fn commit_chunk(&mut self, items: &[I]) -> Result<(), Fault> {
        if items.is_empty() {
            return Ok(());
        }
        self.written.extend_from_slice(items);
        match self.writer.write(items) {
            Ok(()) => {
                self.committed.extend_from_slice(items);
                self.commit_count += 1;
                Ok(())
            }
            Err(fault) => {
                self.rollback_count += 1;
                Err(fault)
            }
        }
    }

    /// Commits a single item as its own transaction (scanner path).
    pub fn commit_single(&mut self, item: &I) -> Result<(), Fault> {
        self.commit_chunk(std::slice::from_ref(item))
    }

    pub fn written(&self) -> &[I] {
        &self.written
    }

    pub fn committed(&self) -> &[I] {
        &self.committed
    }

    pub fn into_audit(self) -> WriteAudit<I> {
        WriteAudit {
            written: self.written,
            committed: self.committed,
            commit_count: self.commit_count,
            rollback_count: self.rollback_count,
        }
    }
}
