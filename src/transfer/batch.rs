//! Bounded-concurrency batch scheduler
//!
//! Transfers are admitted in order while fewer than `parallel` are in
//! flight. Each admitted transfer runs on tokio's blocking pool, since the
//! pipeline itself is synchronous I/O. Outcomes are published once per
//! transfer over a channel and collected after every task joined.
//!
//! With fail-fast enabled, the first failure raises a shared flag:
//! transfers not yet admitted are skipped without any I/O, and transfers
//! already running that fail afterwards are reported as aborted.

use super::{BatchError, ProgressEvent, ProgressSink, Transfer, TransferStatus};
use crate::core::output::error_chain;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, warn};

const SKIPPED_SUMMARY: &str = "skipped (due to previous error)";
const ABORTED_SUMMARY: &str = "aborted (due to previous error)";

/// Final record of one transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    pub subject: String,
    pub status: TransferStatus,
    /// Status line such as `done (sha256 OK; executable)`.
    pub summary: String,
    /// Final location on disk, if the transfer wrote a file.
    pub local_path: Option<PathBuf>,
}

impl TransferOutcome {
    fn new(subject: String, status: TransferStatus, summary: impl Into<String>) -> Self {
        Self {
            subject,
            status,
            summary: summary.into(),
            local_path: None,
        }
    }
}

/// Every outcome of a batch, sorted by subject.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub outcomes: Vec<TransferOutcome>,
}

impl BatchReport {
    /// Names of transfers that failed on their own. Skipped and aborted
    /// transfers are not included.
    pub fn failed(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.status == TransferStatus::Errored)
            .map(|o| o.subject.as_str())
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.status == TransferStatus::Done)
    }

    pub fn outcome(&self, subject: &str) -> Option<&TransferOutcome> {
        self.outcomes.iter().find(|o| o.subject == subject)
    }

    pub fn into_result(self) -> Result<Self, BatchError> {
        if self.is_success() {
            return Ok(self);
        }

        Err(BatchError::Failed {
            names: self.failed().into_iter().map(String::from).collect(),
        })
    }
}

pub struct Batch {
    transfers: Vec<Transfer>,
    parallel: usize,
    fail_fast: bool,
}

impl Batch {
    /// `parallel` below one is treated as one.
    pub fn new(transfers: Vec<Transfer>, parallel: usize) -> Self {
        Self {
            transfers,
            parallel: parallel.max(1),
            fail_fast: false,
        }
    }

    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn len(&self) -> usize {
        self.transfers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty()
    }

    /// Run every transfer and report each outcome.
    ///
    /// Only fails if the runtime cannot be started; transfer failures are
    /// in the report.
    pub fn execute(self, progress: Arc<dyn ProgressSink>) -> Result<BatchReport, BatchError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(BatchError::Runtime)?;

        Ok(runtime.block_on(self.schedule(progress)))
    }

    /// Like [`Batch::execute`], but any failed transfer is an error.
    pub fn run(self, progress: Arc<dyn ProgressSink>) -> Result<BatchReport, BatchError> {
        self.execute(progress)?.into_result()
    }

    async fn schedule(self, progress: Arc<dyn ProgressSink>) -> BatchReport {
        let Self {
            transfers,
            parallel,
            fail_fast,
        } = self;

        debug!(transfers = transfers.len(), parallel, fail_fast, "starting batch");

        let semaphore = Arc::new(Semaphore::new(parallel));
        let cancelled = Arc::new(AtomicBool::new(false));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut running = Vec::with_capacity(transfers.len());

        for transfer in transfers {
            let subject = transfer.subject().to_string();

            // Admission is sequential, so a failure that releases its permit
            // is always observed by the next transfer in line.
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                // The semaphore is never closed.
                break;
            };

            if fail_fast && cancelled.load(Ordering::SeqCst) {
                drop(permit);
                let outcome = TransferOutcome::new(subject, TransferStatus::Skipped, SKIPPED_SUMMARY);
                finish(progress.as_ref(), &outcome);
                let _ = tx.send(outcome);
                continue;
            }

            let tx = tx.clone();
            let progress = Arc::clone(&progress);
            let cancelled = Arc::clone(&cancelled);
            let handle = tokio::task::spawn_blocking(move || {
                let outcome = run_one(transfer, progress.as_ref(), &cancelled, fail_fast);
                drop(permit);
                let _ = tx.send(outcome);
            });

            running.push((subject, handle));
        }

        for (subject, handle) in running {
            if let Err(e) = handle.await {
                cancelled.store(true, Ordering::SeqCst);
                let outcome = TransferOutcome::new(subject, TransferStatus::Errored, format!("errored ({e})"));
                finish(progress.as_ref(), &outcome);
                let _ = tx.send(outcome);
            }
        }

        drop(tx);

        let mut outcomes = Vec::new();
        while let Some(outcome) = rx.recv().await {
            outcomes.push(outcome);
        }
        outcomes.sort_by(|a, b| a.subject.cmp(&b.subject));

        BatchReport { outcomes }
    }
}

fn run_one(
    transfer: Transfer,
    progress: &dyn ProgressSink,
    cancelled: &AtomicBool,
    fail_fast: bool,
) -> TransferOutcome {
    let subject = transfer.subject().to_string();

    let outcome = match transfer.execute(progress) {
        Ok(state) => {
            let summary = if state.results.is_empty() {
                "done".to_string()
            } else {
                format!("done ({})", state.results.join("; "))
            };
            TransferOutcome {
                local_path: state.local_file_path,
                ..TransferOutcome::new(subject, TransferStatus::Done, summary)
            }
        }
        Err(err) => {
            let message = error_chain(&err);
            warn!(subject = %subject, error = %message, "transfer failed");

            let already_cancelled = fail_fast && cancelled.swap(true, Ordering::SeqCst);
            if already_cancelled {
                TransferOutcome::new(subject, TransferStatus::Aborted, ABORTED_SUMMARY)
            } else {
                TransferOutcome::new(subject, TransferStatus::Errored, format!("errored ({message})"))
            }
        }
    };

    finish(progress, &outcome);
    outcome
}

fn finish(progress: &dyn ProgressSink, outcome: &TransferOutcome) {
    progress.event(
        &outcome.subject,
        ProgressEvent::Finished {
            status: outcome.status,
            summary: outcome.summary.clone(),
        },
    );
}
