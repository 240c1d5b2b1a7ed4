//! Transfer error types.

use crate::checksum::ChecksumError;
use crate::service::{ClientError, ResourceError};
use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single pipeline step.
#[derive(Error, Debug)]
pub enum StepError {
    #[error("creating temporary file in {}", dir.display())]
    TempFile {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("flushing output")]
    Flush(#[source] std::io::Error),

    #[error(transparent)]
    Checksum(#[from] ChecksumError),

    #[error("chmod'ing {}", path.display())]
    Chmod {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("renaming to {}", target.display())]
    Rename {
        target: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no staged file to finalize")]
    NothingStaged,
}

/// Failure of one artifact's transfer. The artifact name is attached by
/// the batch, so messages here start at the operation.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("connecting")]
    Connect {
        subject: String,
        #[source]
        source: ClientError,
    },

    #[error("downloading")]
    Download {
        subject: String,
        #[source]
        source: std::io::Error,
    },

    #[error("preparing step {index}")]
    Prepare {
        subject: String,
        index: usize,
        #[source]
        source: StepError,
    },

    #[error("processing step {index}")]
    Step {
        subject: String,
        index: usize,
        #[source]
        source: StepError,
    },
}

impl TransferError {
    pub fn subject(&self) -> &str {
        match self {
            Self::Connect { subject, .. }
            | Self::Download { subject, .. }
            | Self::Prepare { subject, .. }
            | Self::Step { subject, .. } => subject,
        }
    }
}

/// Errors raised while turning requests into transfers, before any
/// download starts.
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("invalid transfer request '{input}': {message}")]
    InvalidRequest { input: String, message: String },

    #[error("no resource matched: {0}")]
    NoMatch(String),

    #[error("target file already specified: {0}")]
    DuplicateTarget(String),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error("preparing transfer of {subject}")]
    Checksum {
        subject: String,
        #[source]
        source: ChecksumError,
    },
}

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("transfers failed: {}", names.join(", "))]
    Failed { names: Vec<String> },

    #[error("starting transfer runtime")]
    Runtime(#[source] std::io::Error),
}
