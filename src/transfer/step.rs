//! Pipeline steps

use super::{PhaseInfo, Step, StepError, TransferState};
use crate::checksum::Verifier;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

/// Prefix of staging files created next to the destination.
pub const TEMP_PREFIX: &str = ".repofetch-";

/// Stages the download in a temporary file inside the destination's
/// directory so the final rename stays on one filesystem.
pub struct TempFileTarget {
    dir: PathBuf,
    file: Option<NamedTempFile>,
}

impl TempFileTarget {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            file: None,
        }
    }
}

impl Step for TempFileTarget {
    fn phase(&self) -> PhaseInfo {
        PhaseInfo::new(0, "staging")
    }

    fn prepare(&mut self, state: &mut TransferState) -> Result<(), StepError> {
        let temp_error = |source| StepError::TempFile {
            dir: self.dir.clone(),
            source,
        };

        std::fs::create_dir_all(&self.dir).map_err(temp_error)?;
        let file = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(&self.dir)
            .map_err(temp_error)?;

        state.local_file_path = Some(file.path().to_path_buf());
        self.file = Some(file);
        Ok(())
    }

    fn sink(&mut self) -> Option<&mut dyn Write> {
        self.file.as_mut().map(|file| file as &mut dyn Write)
    }

    fn execute(&mut self, state: &mut TransferState) -> Result<(), StepError> {
        let mut file = self.file.take().ok_or(StepError::NothingStaged)?;
        file.flush().map_err(StepError::Flush)?;
        state.staged = Some(file.into_temp_path());
        Ok(())
    }
}

/// Streams the download to an arbitrary writer, usually stdout.
pub struct WriterTarget {
    writer: Box<dyn Write + Send>,
}

impl WriterTarget {
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self { writer }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }
}

impl Step for WriterTarget {
    fn phase(&self) -> PhaseInfo {
        PhaseInfo::new(0, "writing")
    }

    fn sink(&mut self) -> Option<&mut dyn Write> {
        Some(&mut *self.writer)
    }

    fn execute(&mut self, _state: &mut TransferState) -> Result<(), StepError> {
        self.writer.flush().map_err(StepError::Flush)
    }
}

/// Hashes the download inline and compares against an expected digest.
pub struct VerifyChecksum {
    verifier: Verifier,
}

impl VerifyChecksum {
    pub fn new(verifier: Verifier) -> Self {
        Self { verifier }
    }
}

impl Step for VerifyChecksum {
    fn phase(&self) -> PhaseInfo {
        PhaseInfo::new(1, format!("verifying ({})", self.verifier.algorithm()))
    }

    fn sink(&mut self) -> Option<&mut dyn Write> {
        Some(&mut self.verifier)
    }

    fn execute(&mut self, state: &mut TransferState) -> Result<(), StepError> {
        self.verifier.verify()?;
        state
            .results
            .push(format!("{} OK", self.verifier.algorithm()));
        Ok(())
    }
}

/// Marks the staged file executable (0755).
pub struct Executable;

impl Step for Executable {
    fn phase(&self) -> PhaseInfo {
        PhaseInfo::new(0, "executable")
    }

    fn execute(&mut self, state: &mut TransferState) -> Result<(), StepError> {
        let path = state.local_file_path.clone().ok_or(StepError::NothingStaged)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
                .map_err(|source| StepError::Chmod { path, source })?;
        }

        state.results.push("executable".to_string());
        Ok(())
    }
}

/// Atomically moves the staged file to its destination.
pub struct Rename {
    target: PathBuf,
}

impl Rename {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
        }
    }
}

impl Step for Rename {
    fn phase(&self) -> PhaseInfo {
        PhaseInfo::new(0, "finishing")
    }

    fn execute(&mut self, state: &mut TransferState) -> Result<(), StepError> {
        let staged = state.staged.take().ok_or(StepError::NothingStaged)?;
        staged.persist(&self.target).map_err(|e| StepError::Rename {
            target: self.target.clone(),
            source: e.error,
        })?;

        state.local_file_path = Some(self.target.clone());
        Ok(())
    }
}
