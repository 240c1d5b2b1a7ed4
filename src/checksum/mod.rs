//! Checksum model
//!
//! Algorithms, expected digests, and streaming verifiers. Algorithms are
//! ordered by strength, strongest first, so sorting a list of them puts the
//! preferred algorithm at the front.

pub mod manager;
pub mod parser;
pub mod profile;
mod verifier;

pub use manager::{ChecksumManager, ChecksumSource, DeferredChecksums, InMemoryChecksums};
pub use profile::{ChecksumSelector, VerificationProfile};
pub use verifier::Verifier;

use digest::DynDigest;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced while building, parsing, or verifying checksums.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChecksumError {
    #[error("unrecognized hash: {0}")]
    Unrecognized(String),

    #[error("invalid hex digest '{digest}': {message}")]
    InvalidHex { digest: String, message: String },

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("{algorithm} digest must be {expected} bytes, got {actual}")]
    WrongLength {
        algorithm: Algorithm,
        expected: usize,
        actual: usize,
    },

    #[error("{algorithm} integrity check failed\n  expected: {expected}\n  got:      {actual}")]
    Mismatch {
        algorithm: Algorithm,
        expected: String,
        actual: String,
    },

    #[error("acceptable checksum required but not found: {0}")]
    Required(String),

    #[error("standalone value combined with others: {0}")]
    ConflictingProfile(String),
}

/// Supported digest algorithms, declared strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Sha512,
    Sha384,
    Sha256,
    Sha1,
    Md5,
}

impl Algorithm {
    /// Every algorithm, strongest first.
    pub const BY_STRENGTH: [Algorithm; 5] = [
        Algorithm::Sha512,
        Algorithm::Sha384,
        Algorithm::Sha256,
        Algorithm::Sha1,
        Algorithm::Md5,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha512 => "sha512",
            Self::Sha384 => "sha384",
            Self::Sha256 => "sha256",
            Self::Sha1 => "sha1",
            Self::Md5 => "md5",
        }
    }

    /// Length of a raw digest in bytes.
    pub fn digest_len(&self) -> usize {
        match self {
            Self::Sha512 => 64,
            Self::Sha384 => 48,
            Self::Sha256 => 32,
            Self::Sha1 => 20,
            Self::Md5 => 16,
        }
    }

    /// Infer the algorithm from a raw digest length.
    pub fn from_digest_len(len: usize) -> Option<Self> {
        Self::BY_STRENGTH
            .into_iter()
            .find(|algorithm| algorithm.digest_len() == len)
    }

    /// This algorithm and every stronger one, strongest first.
    pub fn at_least(self) -> Vec<Algorithm> {
        Self::BY_STRENGTH
            .into_iter()
            .filter(|candidate| *candidate <= self)
            .collect()
    }

    pub(crate) fn hasher(&self) -> Box<dyn DynDigest + Send> {
        match self {
            Self::Sha512 => Box::new(sha2::Sha512::default()),
            Self::Sha384 => Box::new(sha2::Sha384::default()),
            Self::Sha256 => Box::new(sha2::Sha256::default()),
            Self::Sha1 => Box::new(sha1::Sha1::default()),
            Self::Md5 => Box::new(md5::Md5::default()),
        }
    }

    /// Compute the digest of an in-memory buffer.
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        let mut hasher = self.hasher();
        hasher.update(data);
        hasher.finalize().into_vec()
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = ChecksumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha512" => Ok(Self::Sha512),
            "sha384" => Ok(Self::Sha384),
            "sha256" => Ok(Self::Sha256),
            "sha1" => Ok(Self::Sha1),
            "md5" => Ok(Self::Md5),
            _ => Err(ChecksumError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

/// Join algorithm names for messages, e.g. "sha512, sha256".
pub fn join_algorithms(algorithms: &[Algorithm]) -> String {
    algorithms
        .iter()
        .map(Algorithm::name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// An expected digest for one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Checksum {
    algorithm: Algorithm,
    expected: Vec<u8>,
}

impl Checksum {
    pub fn new(algorithm: Algorithm, expected: Vec<u8>) -> Result<Self, ChecksumError> {
        if expected.len() != algorithm.digest_len() {
            return Err(ChecksumError::WrongLength {
                algorithm,
                expected: algorithm.digest_len(),
                actual: expected.len(),
            });
        }

        Ok(Self {
            algorithm,
            expected,
        })
    }

    /// Build a checksum whose algorithm is inferred from the digest length.
    pub fn guess(expected: Vec<u8>) -> Result<Self, ChecksumError> {
        match Algorithm::from_digest_len(expected.len()) {
            Some(algorithm) => Ok(Self {
                algorithm,
                expected,
            }),
            None => Err(ChecksumError::Unrecognized(hex::encode(&expected))),
        }
    }

    /// Parse a hex digest (any case) and infer its algorithm.
    pub fn guess_hex(digest: &str) -> Result<Self, ChecksumError> {
        let digest = digest.trim();
        let recognized = digest.len() % 2 == 0 && Algorithm::from_digest_len(digest.len() / 2).is_some();
        if !recognized {
            return Err(ChecksumError::Unrecognized(digest.to_string()));
        }

        let bytes = hex::decode(digest).map_err(|e| ChecksumError::InvalidHex {
            digest: digest.to_string(),
            message: e.to_string(),
        })?;

        Self::guess(bytes)
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn expected(&self) -> &[u8] {
        &self.expected
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.expected)
    }

    /// A verifier bound to a fresh hash accumulator.
    pub fn verifier(&self) -> Verifier {
        Verifier::new(self.algorithm, self.expected.clone())
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.to_hex())
    }
}

/// An ordered collection of checksums for one artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChecksumList(Vec<Checksum>);

impl ChecksumList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a checksum unless an identical one is already present.
    pub fn push(&mut self, checksum: Checksum) {
        if !self.0.contains(&checksum) {
            self.0.push(checksum);
        }
    }

    pub fn extend(&mut self, other: ChecksumList) {
        for checksum in other.0 {
            self.push(checksum);
        }
    }

    /// Keep only checksums whose algorithm is acceptable. An empty
    /// acceptable set keeps everything.
    pub fn filter(&self, acceptable: &[Algorithm]) -> ChecksumList {
        if acceptable.is_empty() {
            return self.clone();
        }

        self.0
            .iter()
            .filter(|checksum| acceptable.contains(&checksum.algorithm))
            .cloned()
            .collect()
    }

    /// The checksum using the strongest algorithm present.
    pub fn strongest(&self) -> Option<&Checksum> {
        self.0.iter().min_by_key(|checksum| checksum.algorithm)
    }

    pub fn algorithms(&self) -> Vec<Algorithm> {
        let mut algorithms: Vec<_> = self.0.iter().map(Checksum::algorithm).collect();
        algorithms.sort();
        algorithms.dedup();
        algorithms
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Checksum> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Checksum> for ChecksumList {
    fn from_iter<I: IntoIterator<Item = Checksum>>(iter: I) -> Self {
        let mut list = ChecksumList::new();
        for checksum in iter {
            list.push(checksum);
        }
        list
    }
}

impl IntoIterator for ChecksumList {
    type Item = Checksum;
    type IntoIter = std::vec::IntoIter<Checksum>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ChecksumList {
    type Item = &'a Checksum;
    type IntoIter = std::slice::Iter<'a, Checksum>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex_of_len(len: usize) -> String {
        "a".repeat(len)
    }

    #[test]
    fn test_guess_hex_by_length() {
        let cases = [
            (32, Algorithm::Md5),
            (40, Algorithm::Sha1),
            (64, Algorithm::Sha256),
            (96, Algorithm::Sha384),
            (128, Algorithm::Sha512),
        ];

        for (len, algorithm) in cases {
            let checksum = Checksum::guess_hex(&hex_of_len(len)).unwrap();
            assert_eq!(checksum.algorithm(), algorithm, "length {}", len);
        }
    }

    #[test]
    fn test_guess_hex_rejects_other_lengths() {
        for len in [0, 1, 16, 31, 33, 39, 41, 63, 65, 100, 127, 130] {
            let err = Checksum::guess_hex(&hex_of_len(len)).unwrap_err();
            assert!(
                err.to_string().contains("unrecognized"),
                "length {}: {}",
                len,
                err
            );
        }
    }

    #[test]
    fn test_guess_hex_case_insensitive() {
        let lower = Checksum::guess_hex(
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9",
        )
        .unwrap();
        let upper = Checksum::guess_hex(
            "B94D27B9934D3E08A52E52D7DA7DABFAC484EFE37A5380EE9088F7ACE2EFCDE9",
        )
        .unwrap();
        assert_eq!(lower, upper);
    }

    #[test]
    fn test_guess_hex_invalid_characters() {
        let err = Checksum::guess_hex(&"z".repeat(64)).unwrap_err();
        assert!(matches!(err, ChecksumError::InvalidHex { .. }));
    }

    #[test]
    fn test_new_checks_length() {
        assert!(Checksum::new(Algorithm::Sha256, vec![0; 32]).is_ok());
        assert!(matches!(
            Checksum::new(Algorithm::Sha256, vec![0; 20]),
            Err(ChecksumError::WrongLength { .. })
        ));
    }

    #[test]
    fn test_algorithm_strength_order() {
        let mut algorithms = vec![Algorithm::Md5, Algorithm::Sha256, Algorithm::Sha512, Algorithm::Sha1];
        algorithms.sort();
        assert_eq!(
            algorithms,
            vec![Algorithm::Sha512, Algorithm::Sha256, Algorithm::Sha1, Algorithm::Md5]
        );
    }

    #[test]
    fn test_at_least() {
        assert_eq!(
            Algorithm::Sha256.at_least(),
            vec![Algorithm::Sha512, Algorithm::Sha384, Algorithm::Sha256]
        );
        assert_eq!(Algorithm::Md5.at_least().len(), 5);
    }

    #[test]
    fn test_algorithm_from_str() {
        assert_eq!("SHA256".parse::<Algorithm>().unwrap(), Algorithm::Sha256);
        assert!("crc32".parse::<Algorithm>().is_err());
    }

    #[test]
    fn test_known_digest() {
        assert_eq!(
            hex::encode(Algorithm::Sha256.digest(b"hello world")),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert_eq!(
            hex::encode(Algorithm::Md5.digest(b"hello world")),
            "5eb63bbbe01eeed093cb22bb8f5acdc3"
        );
        assert_eq!(
            hex::encode(Algorithm::Sha1.digest(b"hello world")),
            "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed"
        );
    }

    #[test]
    fn test_list_strongest_and_filter() {
        let list: ChecksumList = [
            Checksum::new(Algorithm::Md5, Algorithm::Md5.digest(b"x")).unwrap(),
            Checksum::new(Algorithm::Sha256, Algorithm::Sha256.digest(b"x")).unwrap(),
            Checksum::new(Algorithm::Sha1, Algorithm::Sha1.digest(b"x")).unwrap(),
        ]
        .into_iter()
        .collect();

        assert_eq!(list.strongest().unwrap().algorithm(), Algorithm::Sha256);

        let weak = list.filter(&[Algorithm::Md5, Algorithm::Sha1]);
        assert_eq!(weak.strongest().unwrap().algorithm(), Algorithm::Sha1);
        assert_eq!(list.filter(&[]).len(), 3);
    }

    #[test]
    fn test_list_deduplicates() {
        let checksum = Checksum::new(Algorithm::Sha256, Algorithm::Sha256.digest(b"x")).unwrap();
        let mut list = ChecksumList::new();
        list.push(checksum.clone());
        list.push(checksum);
        assert_eq!(list.len(), 1);
    }
}
