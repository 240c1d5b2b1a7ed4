//! Verified transfer pipeline
//!
//! Each artifact is moved by a [`Transfer`]: an ordered list of [`Step`]s
//! run strictly in sequence.
//!
//! ```text
//! prepare steps ──► open remote stream ──► copy into every step sink
//!     (stage temp file)                     (target + checksum verifiers)
//!                                  │
//!                                  ▼
//!     execute steps in order: close staging, verify, chmod, rename
//! ```
//!
//! Hashing happens inline with the copy. The destination path only appears
//! after every earlier step succeeded; a failed transfer drops its staged
//! temporary file, which deletes it.

pub mod batch;
mod error;
pub mod plan;
pub mod progress;
pub mod step;

pub use batch::{Batch, BatchReport, TransferOutcome};
pub use error::{BatchError, PlanError, StepError, TransferError};
pub use plan::{build_transfer, plan_transfers, PlanOptions, PlannedResource, TransferOptions, TransferRequest};
pub use progress::{NoProgress, PhaseInfo, ProgressEvent, ProgressSink, TransferStatus};

use crate::service::Resource;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tracing::debug;

/// Where a transfer's bytes end up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferTarget {
    Stdout,
    File(PathBuf),
}

impl TransferTarget {
    /// `-` means standard output.
    pub fn from_destination(destination: &str) -> Self {
        if destination == "-" {
            Self::Stdout
        } else {
            Self::File(PathBuf::from(destination))
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Stdout => None,
            Self::File(path) => Some(path),
        }
    }
}

/// Mutable record threaded through a transfer's steps.
#[derive(Debug, Default)]
pub struct TransferState {
    /// Current location of the artifact: the staged temp file, then the
    /// final path once renamed. `None` when streaming to stdout.
    pub local_file_path: Option<PathBuf>,
    /// Human-readable annotations such as `sha256 OK`.
    pub results: Vec<String>,
    /// The closed staging file awaiting its final rename. Dropping it
    /// deletes the file.
    pub staged: Option<TempPath>,
}

/// One stage of the pipeline.
pub trait Step: Send {
    /// Weight and label reported to progress sinks.
    fn phase(&self) -> PhaseInfo;

    /// Runs before the remote stream is opened.
    fn prepare(&mut self, _state: &mut TransferState) -> Result<(), StepError> {
        Ok(())
    }

    /// A writer that receives every downloaded byte, if this step needs them.
    fn sink(&mut self) -> Option<&mut dyn Write> {
        None
    }

    /// Runs after the download completed, in step order.
    fn execute(&mut self, state: &mut TransferState) -> Result<(), StepError>;
}

/// Phase indices before the steps' own phases.
const CONNECT_PHASE: usize = 0;
const DOWNLOAD_PHASE: usize = 1;
const FIRST_STEP_PHASE: usize = 2;

/// One artifact's pipeline. Executed at most once.
pub struct Transfer {
    resource: Resource,
    target: TransferTarget,
    steps: Vec<Box<dyn Step>>,
}

impl Transfer {
    pub fn new(resource: Resource, target: TransferTarget, steps: Vec<Box<dyn Step>>) -> Self {
        Self {
            resource,
            target,
            steps,
        }
    }

    pub fn subject(&self) -> &str {
        self.resource.name()
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    pub fn target(&self) -> &TransferTarget {
        &self.target
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Every phase in execution order: connect, download, then each step.
    pub fn phases(&self) -> Vec<PhaseInfo> {
        let mut phases = vec![
            PhaseInfo::new(1, "connecting"),
            PhaseInfo::new(self.resource.size().unwrap_or(0), "downloading"),
        ];
        phases.extend(self.steps.iter().map(|step| step.phase()));
        phases
    }

    pub fn execute(mut self, progress: &dyn ProgressSink) -> Result<TransferState, TransferError> {
        let subject = self.resource.name().to_string();
        let mut state = TransferState::default();

        progress.event(&subject, ProgressEvent::Declared { phases: self.phases() });

        for (index, step) in self.steps.iter_mut().enumerate() {
            step.prepare(&mut state).map_err(|source| TransferError::Prepare {
                subject: subject.clone(),
                index,
                source,
            })?;
        }

        let stream = self.resource.open_stream().map_err(|source| TransferError::Connect {
            subject: subject.clone(),
            source,
        })?;
        progress.event(&subject, ProgressEvent::PhaseCompleted { phase: CONNECT_PHASE });

        let copied = {
            let mut reader = ProgressReader {
                inner: stream,
                subject: &subject,
                progress,
            };
            let mut writer = FanOut(self.steps.iter_mut().filter_map(|step| step.sink()).collect());
            io::copy(&mut reader, &mut writer).and_then(|n| writer.flush().map(|_| n))
        }
        .map_err(|source| TransferError::Download {
            subject: subject.clone(),
            source,
        })?;

        debug!(subject = %subject, bytes = copied, "downloaded");
        progress.event(&subject, ProgressEvent::PhaseCompleted { phase: DOWNLOAD_PHASE });

        for (index, step) in self.steps.iter_mut().enumerate() {
            step.execute(&mut state).map_err(|source| TransferError::Step {
                subject: subject.clone(),
                index,
                source,
            })?;
            progress.event(
                &subject,
                ProgressEvent::PhaseCompleted {
                    phase: FIRST_STEP_PHASE + index,
                },
            );
        }

        Ok(state)
    }
}

impl std::fmt::Debug for Transfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transfer")
            .field("subject", &self.subject())
            .field("target", &self.target)
            .field("steps", &self.steps.len())
            .finish()
    }
}

/// Writes every buffer to all inner writers.
struct FanOut<'a>(Vec<&'a mut dyn Write>);

impl Write for FanOut<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for writer in self.0.iter_mut() {
            writer.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        for writer in self.0.iter_mut() {
            writer.flush()?;
        }
        Ok(())
    }
}

/// Reports every read as download progress.
struct ProgressReader<'a, R> {
    inner: R,
    subject: &'a str,
    progress: &'a dyn ProgressSink,
}

impl<R: Read> Read for ProgressReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.progress.event(
                self.subject,
                ProgressEvent::Advanced {
                    phase: DOWNLOAD_PHASE,
                    amount: n as u64,
                },
            );
        }
        Ok(n)
    }
}
