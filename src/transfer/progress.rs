//! Transfer progress events
//!
//! Transfers describe their work as an ordered list of weighted phases and
//! report progress against those phases. Rendering is entirely up to the
//! [`ProgressSink`]; nothing in the pipeline depends on what it does.

use std::fmt;

/// One phase of a transfer as declared up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseInfo {
    /// Units of work: bytes for streaming, a small fixed count for discrete
    /// steps, zero when there is nothing visible to report.
    pub weight: u64,
    pub label: String,
}

impl PhaseInfo {
    pub fn new(weight: u64, label: impl Into<String>) -> Self {
        Self {
            weight,
            label: label.into(),
        }
    }
}

/// Final outcome of one transfer within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Done,
    Errored,
    /// Never started because an earlier transfer failed in fail-fast mode.
    Skipped,
    /// Failed while a fail-fast cancellation was already in effect.
    Aborted,
}

impl TransferStatus {
    /// Single-character marker used by renderers.
    pub fn marker(&self) -> &'static str {
        match self {
            Self::Done => "√",
            Self::Errored => "X",
            Self::Skipped | Self::Aborted => "!",
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Done => "done",
            Self::Errored => "errored",
            Self::Skipped => "skipped",
            Self::Aborted => "aborted",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Emitted once before any work, listing every phase in order.
    Declared { phases: Vec<PhaseInfo> },
    Advanced { phase: usize, amount: u64 },
    PhaseCompleted { phase: usize },
    Finished { status: TransferStatus, summary: String },
}

/// Receives progress events tagged with the transfer's subject.
pub trait ProgressSink: Send + Sync {
    fn event(&self, subject: &str, event: ProgressEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn event(&self, _subject: &str, _event: ProgressEvent) {}
}
