//! Drives one chunk-oriented step run to its terminal outcome.
//!
//! The orchestrator pulls items from the reader in bounded chunks, applies
//! the processor, and commits each chunk atomically through the write
//! boundary. On a commit failure it consults the classifier and the retry and
//! skip policies, re-attempts the whole chunk, degrades to the recovery
//! scanner, or fails the run.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use uuid::Uuid;

use crate::engine::{
    Chunk, Classifier, Decision, RecoveryScanner, RetryPolicy, RetryState, SkipPolicy, SkipState,
    StateLog, StepExecution, StepState, StepStatus, WriteBoundary,
};
use crate::error::Fault;
use crate::io::{ItemProcessor, ItemReader, ItemWriter};

/// Fault tag recorded when a run is stopped cooperatively.
pub const STOP_FAULT_TAG: &str = "step.stopped";

const DEFAULT_CHUNK_SIZE: usize = 10;

/// Cooperative stop signal, honored only at chunk boundaries — never
/// mid-chunk or mid-scan, to preserve the atomicity guarantees.
#[derive(Debug, Clone, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Fault-tolerance parameters for one step run.
#[derive(Debug, Clone)]
pub struct StepPolicies {
    pub chunk_size: usize,
    pub retry: RetryPolicy,
    pub skip: SkipPolicy,
    pub classifier: Classifier,
}

impl Default for StepPolicies {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            retry: RetryPolicy::default(),
            skip: SkipPolicy::default(),
            classifier: Classifier::default(),
        }
    }
}

enum Resolution {
    Committed,
    Scan,
    Fail(Fault),
}

/// Executes a single step: read → process → commit, with classification-driven
/// retry, skip and scan handling.
///
/// Owns the retry and skip state for the duration of the run; a host may run
/// several orchestrators concurrently, each with private state.
pub struct StepOrchestrator<I, R, P, W>
where
    I: Clone,
    W: ItemWriter<I>,
{
    reader: R,
    processor: P,
    boundary: WriteBoundary<I, W>,
    policies: StepPolicies,
    stop: StopToken,
}

impl<I, R, P, W> StepOrchestrator<I, R, P, W>
where
    I: Clone,
    R: ItemReader<I>,
    P: ItemProcessor<I>,
    W: ItemWriter<I>,
{
    pub fn new(reader: R, processor: P, writer: W, mut policies: StepPolicies) -> Self {
        policies.chunk_size = policies.chunk_size.max(1);
        Self {
            reader,
            processor,
            boundary: WriteBoundary::new(writer),
            policies,
            stop: StopToken::new(),
        }
    }

    /// Installs a stop token the host can trigger from outside the run.
    pub fn with_stop_token(mut self, stop: StopToken) -> Self {
        self.stop = stop;
        self
    }

    /// Runs the step to a terminal state and returns the audit record.
    pub fn execute(mut self) -> StepExecution<I> {
        let started_at = Utc::now();
        let id = Uuid::new_v4().to_string();
        let mut log = StateLog::new();
        let mut skip_state = SkipState::default();
        let mut read_count: u32 = 0;
        let mut retry_count: u32 = 0;
        let mut last_fault: Option<Fault> = None;

        let status = 'run: loop {
            if self.stop.is_stop_requested() {
                last_fault = Some(Fault::new(STOP_FAULT_TAG, "stop requested"));
                log.advance(StepState::Failed);
                break StepStatus::Failed;
            }

            let chunk = match self.read_chunk(&mut skip_state, &mut read_count) {
                Ok(chunk) => chunk,
                Err(fault) => {
                    last_fault = Some(fault);
                    log.advance(StepState::Failed);
                    break StepStatus::Failed;
                }
            };
            if chunk.is_empty() {
                log.advance(StepState::Completed);
                break StepStatus::Completed;
            }

            log.advance(StepState::Processing);
            let chunk = match self.process_chunk(chunk, &mut skip_state) {
                Ok(chunk) => chunk,
                Err(fault) => {
                    last_fault = Some(fault);
                    log.advance(StepState::Failed);
                    break StepStatus::Failed;
                }
            };
            if chunk.is_empty() {
                // Every item of the chunk was skipped during processing.
                log.advance(StepState::Reading);
                continue;
            }

            log.advance(StepState::Committing);
            let items = chunk.into_items();
            let mut retry_state = RetryState::default();
            let resolution = loop {
                match self.boundary.commit_chunk(&items) {
                    Ok(()) => break Resolution::Committed,
                    Err(fault) => {
                        retry_state.record_attempt();
                        match self.policies.classifier.classify(&fault) {
                            Decision::Fatal => break Resolution::Fail(fault),
                            Decision::Retryable => {
                                if self.policies.retry.should_retry(retry_state.attempts()) {
                                    retry_count += 1;
                                    log_retry(
                                        retry_state.attempts(),
                                        self.policies.retry.max_attempts(),
                                        &fault,
                                    );
                                    log.advance(StepState::Retrying);
                                    log.advance(StepState::Committing);
                                } else if self.policies.skip.is_enabled() {
                                    break Resolution::Scan;
                                } else {
                                    break Resolution::Fail(fault);
                                }
                            }
                            Decision::Skippable => {
                                if !self.policies.skip.is_enabled() {
                                    break Resolution::Fail(fault);
                                }
                                // The scan pass consumes the final allowed
                                // attempt for a skippable failure.
                                if retry_state.attempts() + 1 < self.policies.retry.max_attempts()
                                {
                                    retry_count += 1;
                                    log_retry(
                                        retry_state.attempts(),
                                        self.policies.retry.max_attempts(),
                                        &fault,
                                    );
                                    log.advance(StepState::Retrying);
                                    log.advance(StepState::Committing);
                                } else {
                                    break Resolution::Scan;
                                }
                            }
                        }
                    }
                }
            };

            match resolution {
                Resolution::Committed => log.advance(StepState::Reading),
                Resolution::Fail(fault) => {
                    last_fault = Some(fault);
                    log.advance(StepState::Failed);
                    break 'run StepStatus::Failed;
                }
                Resolution::Scan => {
                    log.advance(StepState::Scanning);
                    match RecoveryScanner::scan(
                        &items,
                        &mut self.boundary,
                        &self.policies.classifier,
                        &self.policies.skip,
                        &mut skip_state,
                    ) {
                        Ok(_) => log.advance(StepState::Reading),
                        Err(fault) => {
                            last_fault = Some(fault);
                            log.advance(StepState::Failed);
                            break 'run StepStatus::Failed;
                        }
                    }
                }
            }
        };

        let audit = self.boundary.into_audit();
        let finished_at = Utc::now();
        StepExecution {
            id,
            status,
            written: audit.written,
            committed: audit.committed,
            read_count,
            commit_count: audit.commit_count,
            rollback_count: audit.rollback_count,
            retry_count,
            skip_count: skip_state.skipped(),
            state_history: log.into_history(),
            last_fault,
            started_at,
            finished_at,
            duration_ms: (finished_at - started_at).num_milliseconds(),
        }
    }

    fn read_chunk(
        &mut self,
        skip_state: &mut SkipState,
        read_count: &mut u32,
    ) -> Result<Chunk<I>, Fault> {
        let mut chunk = Chunk::new(self.policies.chunk_size);
        while !chunk.is_full() {
            match self.read_one(skip_state)? {
                Some(item) => {
                    *read_count += 1;
                    chunk.push(item);
                }
                None => break,
            }
        }
        Ok(chunk)
    }

    /// Reads the next item, classifying reader faults like write failures:
    /// retryable faults re-invoke the source up to the retry bound, then
    /// escalate to the skip budget; skippable faults consume the budget
    /// directly; fatal faults end the run.
    fn read_one(&mut self, skip_state: &mut SkipState) -> Result<Option<I>, Fault> {
        let mut attempts: u32 = 0;
        loop {
            match self.reader.read() {
                Ok(next) => return Ok(next),
                Err(fault) => {
                    match self.policies.classifier.classify(&fault) {
                        Decision::Fatal => return Err(fault),
                        Decision::Retryable => {
                            attempts += 1;
                            if self.policies.retry.should_retry(attempts) {
                                continue;
                            }
                        }
                        Decision::Skippable => {}
                    }
                    if self.policies.skip.should_skip(skip_state.skipped()) {
                        skip_state.record_skip();
                        attempts = 0;
                    } else {
                        return Err(fault);
                    }
                }
            }
        }
    }

    /// Applies the processor to every item of the chunk. Faults are handled
    /// per item — nothing was written yet, so there is no scan to run.
    fn process_chunk(
        &mut self,
        chunk: Chunk<I>,
        skip_state: &mut SkipState,
    ) -> Result<Chunk<I>, Fault> {
        let mut processed = Chunk::new(self.policies.chunk_size);
        'items: for item in chunk.into_items() {
            let mut attempts: u32 = 0;
            loop {
                match self.processor.process(item.clone()) {
                    Ok(out) => {
                        processed.push(out);
                        continue 'items;
                    }
                    Err(fault) => {
                        match self.policies.classifier.classify(&fault) {
                            Decision::Fatal => return Err(fault),
                            Decision::Retryable => {
                                attempts += 1;
                                if self.policies.retry.should_retry(attempts) {
                                    continue;
                                }
                            }
                            Decision::Skippable => {}
                        }
                        if self.policies.skip.should_skip(skip_state.skipped()) {
                            skip_state.record_skip();
                            continue 'items;
                        }
                        return Err(fault);
                    }
                }
            }
        }
        Ok(processed)
    }
}

fn log_retry(attempt: u32, max: u32, fault: &Fault) {
    eprintln!("  ↻ Attempt {attempt}/{max} failed: {fault}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{PassThrough, PoisonWriter, VecReader};

    fn policies(
        chunk_size: usize,
        max_attempts: u32,
        skip_limit: u32,
        classifier: Classifier,
    ) -> StepPolicies {
        StepPolicies {
            chunk_size,
            retry: RetryPolicy::new(max_attempts),
            skip: SkipPolicy::new(skip_limit),
            classifier,
        }
    }

    fn run_step(
        items: Vec<i32>,
        poison: Vec<i32>,
        tag: &str,
        policies: StepPolicies,
    ) -> StepExecution<i32> {
        let reader = VecReader::new(items);
        let writer = PoisonWriter::new(poison, Fault::new(tag, "poison item"));
        StepOrchestrator::new(reader, PassThrough, writer, policies).execute()
    }

    #[test]
    fn no_fault_tolerance_fails_on_first_chunk() {
        // Nothing configured: the unregistered fault is fatal.
        let execution = run_step(
            vec![1, 2, 3, 4],
            vec![3],
            "data.poison",
            policies(3, 1, 0, Classifier::new()),
        );
        assert_eq!(execution.status, StepStatus::Failed);
        assert_eq!(execution.written, vec![1, 2, 3]);
        assert!(execution.committed.is_empty());
        assert_eq!(execution.last_fault.unwrap().tag.as_str(), "data.poison");
    }

    #[test]
    fn skippable_failure_is_isolated_by_the_scanner() {
        let classifier = Classifier::new().rule("data.poison", Decision::Skippable);
        let execution = run_step(
            vec![1, 2, 3, 4],
            vec![3],
            "data.poison",
            policies(3, 1, 2, classifier),
        );
        assert_eq!(execution.status, StepStatus::Completed);
        assert_eq!(execution.written, vec![1, 2, 3, 1, 2, 3, 4]);
        assert_eq!(execution.committed, vec![1, 2, 4]);
        assert_eq!(execution.skip_count, 1);
        assert_eq!(execution.read_count, 4);
    }

    #[test]
    fn fatal_overrides_skip_configuration() {
        // The fault matches both an ancestor skippable rule and an exact
        // fatal rule; fatal wins and neither retry nor scan is attempted.
        let classifier = Classifier::new()
            .rule("data", Decision::Skippable)
            .rule("data.poison", Decision::Fatal);
        let execution = run_step(
            vec![1, 2, 3, 4],
            vec![3],
            "data.poison",
            policies(3, 3, 2, classifier),
        );
        assert_eq!(execution.status, StepStatus::Failed);
        assert_eq!(execution.written, vec![1, 2, 3]);
        assert!(execution.committed.is_empty());
        assert_eq!(execution.retry_count, 0);
        assert_eq!(execution.skip_count, 0);
        assert!(!execution.state_history.contains(&StepState::Scanning));
        assert!(!execution.state_history.contains(&StepState::Retrying));
    }

    #[test]
    fn retryable_failure_exhausts_attempts_then_fails() {
        let classifier = Classifier::new().rule("io", Decision::Retryable);
        let execution = run_step(
            vec![1, 2, 3, 4],
            vec![3],
            "io.timeout",
            policies(3, 3, 0, classifier),
        );
        assert_eq!(execution.status, StepStatus::Failed);
        assert_eq!(execution.written, vec![1, 2, 3, 1, 2, 3, 1, 2, 3]);
        assert!(execution.committed.is_empty());
        assert_eq!(execution.retry_count, 2);
        assert_eq!(execution.rollback_count, 3);
    }

    #[test]
    fn skippable_failure_with_retry_scans_on_the_final_attempt() {
        let classifier = Classifier::new().rule("data.poison", Decision::Skippable);
        let execution = run_step(
            vec![1, 2, 3, 4],
            vec![3],
            "data.poison",
            policies(3, 3, 2, classifier),
        );
        assert_eq!(execution.status, StepStatus::Completed);
        assert_eq!(execution.written, vec![1, 2, 3, 1, 2, 3, 1, 2, 3, 4]);
        assert_eq!(execution.committed, vec![1, 2, 4]);
        assert_eq!(execution.skip_count, 1);
    }

    #[test]
    fn retry_exhaustion_escalates_to_scan_when_skip_is_configured() {
        // The poison fault stays retryable during the scan, so the scan
        // aborts on it; items resolved before the abort stay committed.
        let classifier = Classifier::new().rule("io", Decision::Retryable);
        let execution = run_step(
            vec![1, 2, 3, 4],
            vec![3],
            "io.timeout",
            policies(3, 2, 2, classifier),
        );
        assert_eq!(execution.status, StepStatus::Failed);
        assert_eq!(execution.written, vec![1, 2, 3, 1, 2, 3, 1, 2, 3]);
        assert_eq!(execution.committed, vec![1, 2]);
        assert!(execution.state_history.contains(&StepState::Scanning));
    }

    #[test]
    fn exceeding_the_skip_limit_fails_the_run() {
        let classifier = Classifier::new().rule("data.poison", Decision::Skippable);
        let execution = run_step(
            vec![1, 2, 3, 4],
            vec![2, 3],
            "data.poison",
            policies(3, 1, 1, classifier),
        );
        assert_eq!(execution.status, StepStatus::Failed);
        assert_eq!(execution.written, vec![1, 2, 3, 1, 2, 3]);
        assert_eq!(execution.committed, vec![1]);
        // The limit itself is never exceeded.
        assert_eq!(execution.skip_count, 1);
    }

    #[test]
    fn committed_is_ordered_subset_of_written() {
        let classifier = Classifier::new().rule("data.poison", Decision::Skippable);
        let execution = run_step(
            vec![1, 2, 3, 4, 5, 6, 7],
            vec![2, 5],
            "data.poison",
            policies(3, 1, 3, classifier),
        );
        assert_eq!(execution.status, StepStatus::Completed);
        let mut written = execution.written.iter();
        for item in &execution.committed {
            assert!(written.any(|w| w == item), "committed {item} out of order");
        }
        assert_eq!(execution.committed, vec![1, 3, 4, 6, 7]);
        assert_eq!(execution.skip_count, 2);
    }

    #[test]
    fn empty_source_completes_immediately() {
        let execution = run_step(vec![], vec![], "data.poison", StepPolicies::default());
        assert_eq!(execution.status, StepStatus::Completed);
        assert!(execution.written.is_empty());
        assert_eq!(execution.read_count, 0);
        assert_eq!(
            execution.state_history,
            vec![StepState::Reading, StepState::Completed]
        );
    }

    #[test]
    fn state_history_records_the_degrade_path() {
        let classifier = Classifier::new().rule("data.poison", Decision::Skippable);
        let execution = run_step(
            vec![1, 2, 3, 4],
            vec![3],
            "data.poison",
            policies(3, 1, 2, classifier),
        );
        assert_eq!(
            execution.state_history,
            vec![
                StepState::Reading,
                StepState::Processing,
                StepState::Committing,
                StepState::Scanning,
                StepState::Reading,
                StepState::Processing,
                StepState::Committing,
                StepState::Reading,
                StepState::Completed,
            ]
        );
    }

    #[test]
    fn stop_request_is_honored_at_the_chunk_boundary() {
        let stop = StopToken::new();
        stop.request_stop();
        let reader = VecReader::new(vec![1, 2, 3]);
        let writer = PoisonWriter::new(vec![], Fault::new("data.poison", "unused"));
        let execution = StepOrchestrator::new(reader, PassThrough, writer, StepPolicies::default())
            .with_stop_token(stop)
            .execute();
        assert_eq!(execution.status, StepStatus::Failed);
        assert!(execution.written.is_empty());
        assert_eq!(execution.last_fault.unwrap().tag.as_str(), STOP_FAULT_TAG);
    }

    // --- processor fault handling ---

    struct RejectingProcessor {
        reject: i32,
        tag: &'static str,
    }

    impl ItemProcessor<i32> for RejectingProcessor {
        fn process(&mut self, item: i32) -> Result<i32, Fault> {
            if item == self.reject {
                Err(Fault::new(self.tag, "rejected during processing"))
            } else {
                Ok(item)
            }
        }
    }

    #[test]
    fn skippable_processing_fault_drops_the_item_before_commit() {
        let classifier = Classifier::new().rule("data.invalid", Decision::Skippable);
        let reader = VecReader::new(vec![1, 2, 3, 4]);
        let writer = PoisonWriter::new(vec![], Fault::new("data.poison", "unused"));
        let processor = RejectingProcessor {
            reject: 3,
            tag: "data.invalid",
        };
        let execution =
            StepOrchestrator::new(reader, processor, writer, policies(3, 1, 2, classifier))
                .execute();
        assert_eq!(execution.status, StepStatus::Completed);
        // The rejected item never reaches the writer.
        assert_eq!(execution.written, vec![1, 2, 4]);
        assert_eq!(execution.committed, vec![1, 2, 4]);
        assert_eq!(execution.skip_count, 1);
    }

    #[test]
    fn fatal_processing_fault_fails_the_run() {
        let reader = VecReader::new(vec![1, 2, 3, 4]);
        let writer = PoisonWriter::new(vec![], Fault::new("data.poison", "unused"));
        let processor = RejectingProcessor {
            reject: 1,
            tag: "data.invalid",
        };
        let execution = StepOrchestrator::new(
            reader,
            processor,
            writer,
            policies(3, 1, 2, Classifier::new()),
        )
        .execute();
        assert_eq!(execution.status, StepStatus::Failed);
        assert!(execution.written.is_empty());
    }

    // --- reader fault handling ---

    struct ScriptedReader {
        script: Vec<Result<Option<i32>, Fault>>,
        pos: usize,
    }

    impl ScriptedReader {
        fn new(script: Vec<Result<Option<i32>, Fault>>) -> Self {
            Self { script, pos: 0 }
        }
    }

    impl ItemReader<i32> for ScriptedReader {
        fn read(&mut self) -> Result<Option<i32>, Fault> {
            let entry = self.script.get(self.pos).cloned().unwrap_or(Ok(None));
            self.pos += 1;
            entry
        }
    }

    #[test]
    fn retryable_reader_fault_is_retried() {
        let classifier = Classifier::new().rule("io", Decision::Retryable);
        let reader = ScriptedReader::new(vec![
            Ok(Some(1)),
            Err(Fault::new("io.timeout", "flaky source")),
            Ok(Some(2)),
            Ok(Some(3)),
            Ok(None),
        ]);
        let writer = PoisonWriter::new(vec![], Fault::new("data.poison", "unused"));
        let execution =
            StepOrchestrator::new(reader, PassThrough, writer, policies(3, 2, 0, classifier))
                .execute();
        assert_eq!(execution.status, StepStatus::Completed);
        assert_eq!(execution.committed, vec![1, 2, 3]);
        assert_eq!(execution.skip_count, 0);
    }

    #[test]
    fn skippable_reader_fault_consumes_the_skip_budget() {
        let classifier = Classifier::new().rule("data.malformed", Decision::Skippable);
        let reader = ScriptedReader::new(vec![
            Ok(Some(1)),
            Err(Fault::new("data.malformed", "bad record")),
            Ok(Some(3)),
            Ok(None),
        ]);
        let writer = PoisonWriter::new(vec![], Fault::new("data.poison", "unused"));
        let execution =
            StepOrchestrator::new(reader, PassThrough, writer, policies(3, 1, 1, classifier))
                .execute();
        assert_eq!(execution.status, StepStatus::Completed);
        assert_eq!(execution.committed, vec![1, 3]);
        assert_eq!(execution.skip_count, 1);
    }

    #[test]
    fn fatal_reader_fault_fails_the_run() {
        let reader = ScriptedReader::new(vec![
            Ok(Some(1)),
            Err(Fault::new("io.corrupt", "unreadable source")),
        ]);
        let writer = PoisonWriter::new(vec![], Fault::new("data.poison", "unused"));
        let execution = StepOrchestrator::new(
            reader,
            PassThrough,
            writer,
            policies(3, 1, 5, Classifier::new()),
        )
        .execute();
        assert_eq!(execution.status, StepStatus::Failed);
        assert!(execution.written.is_empty());
        assert_eq!(
            execution.state_history,
            vec![StepState::Reading, StepState::Failed]
        );
    }
}
