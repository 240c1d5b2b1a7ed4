//! Streaming digest verification
//!
//! A [`Verifier`] is an `io::Write` sink: bytes are hashed as they are
//! written, so verification happens inline with the download.

use super::{Algorithm, ChecksumError};
use digest::DynDigest;
use std::io::{self, Write};

pub struct Verifier {
    algorithm: Algorithm,
    expected: Vec<u8>,
    hasher: Box<dyn DynDigest + Send>,
    written: u64,
}

impl Verifier {
    pub(crate) fn new(algorithm: Algorithm, expected: Vec<u8>) -> Self {
        Self {
            algorithm,
            expected,
            hasher: algorithm.hasher(),
            written: 0,
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Number of bytes hashed so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.written += data.len() as u64;
    }

    /// Compare the accumulated digest to the expected one.
    ///
    /// Resets the accumulator, so a second call verifies the empty input.
    pub fn verify(&mut self) -> Result<(), ChecksumError> {
        let actual = self.hasher.finalize_reset();
        self.written = 0;

        if actual.as_ref() == self.expected.as_slice() {
            return Ok(());
        }

        Err(ChecksumError::Mismatch {
            algorithm: self.algorithm,
            expected: hex::encode(&self.expected),
            actual: hex::encode(actual),
        })
    }
}

impl Write for Verifier {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for Verifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Verifier")
            .field("algorithm", &self.algorithm)
            .field("expected", &hex::encode(&self.expected))
            .field("written", &self.written)
            .finish()
    }
}
