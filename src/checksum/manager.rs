//! Checksum sources and the aggregating manager
//!
//! A release can advertise digests in several loosely structured places:
//! the release notes, per-file sidecars (`foo.tar.gz.sha256`), and digest
//! lists (`SHA256SUMS`, `checksums.txt`). Each place is a [`ChecksumSource`];
//! [`ChecksumManager`] merges them behind one lookup.
//!
//! Remote sources are [`DeferredChecksums`]: nothing is fetched until a
//! lookup could actually be answered by that source, and the fetch happens
//! at most once per source even under concurrent lookups.

use super::{parser, Algorithm, Checksum, ChecksumList};
use crate::core::output::error_chain;
use crate::service::ClientError;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{LazyLock, Mutex, PoisonError};
use tracing::{debug, warn};

/// Anything that can answer "which checksums are known for this artifact".
///
/// An empty `algorithms` slice means any algorithm is acceptable.
pub trait ChecksumSource: Send + Sync {
    fn checksums(&self, name: &str, algorithms: &[Algorithm]) -> ChecksumList;
}

/// Checksums that are already known, keyed by artifact name.
#[derive(Debug, Clone, Default)]
pub struct InMemoryChecksums {
    known: HashMap<String, ChecksumList>,
}

impl InMemoryChecksums {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, checksum: Checksum) {
        self.known.entry(name.into()).or_default().push(checksum);
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}

impl FromIterator<(String, Checksum)> for InMemoryChecksums {
    fn from_iter<I: IntoIterator<Item = (String, Checksum)>>(iter: I) -> Self {
        let mut known = InMemoryChecksums::new();
        for (name, checksum) in iter {
            known.add(name, checksum);
        }
        known
    }
}

impl ChecksumSource for InMemoryChecksums {
    fn checksums(&self, name: &str, algorithms: &[Algorithm]) -> ChecksumList {
        self.known
            .get(name)
            .map(|list| list.filter(algorithms))
            .unwrap_or_default()
    }
}

/// Fetches the raw content of a remote checksum source.
pub type ChecksumLoader = Box<dyn Fn() -> Result<Vec<u8>, ClientError> + Send + Sync>;

enum LoadState {
    NotLoaded,
    Loaded(InMemoryChecksums),
}

/// A remote checksum source that is fetched on first relevant lookup.
///
/// The state mutex is held for the duration of the load, so concurrent
/// callers block until the first load completes and then share its result.
/// A failed load is logged and remembered as an empty source.
pub struct DeferredChecksums {
    label: String,
    algorithms: Vec<Algorithm>,
    subject: Option<String>,
    loader: ChecksumLoader,
    state: Mutex<LoadState>,
}

impl DeferredChecksums {
    /// A per-file sidecar such as `tool.tar.gz.sha256`.
    ///
    /// Whatever filename appears inside the sidecar, parsed digests are
    /// pinned to `subject`.
    pub fn sidecar(
        label: impl Into<String>,
        subject: impl Into<String>,
        algorithm: Algorithm,
        loader: ChecksumLoader,
    ) -> Self {
        Self {
            label: label.into(),
            algorithms: vec![algorithm],
            subject: Some(subject.into()),
            loader,
            state: Mutex::new(LoadState::NotLoaded),
        }
    }

    /// A digest list covering many artifacts. An empty `algorithms` means
    /// the list may contain any algorithm.
    pub fn digest_list(
        label: impl Into<String>,
        algorithms: Vec<Algorithm>,
        loader: ChecksumLoader,
    ) -> Self {
        Self {
            label: label.into(),
            algorithms,
            subject: None,
            loader,
            state: Mutex::new(LoadState::NotLoaded),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_loaded(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        matches!(*state, LoadState::Loaded(_))
    }

    fn could_answer(&self, name: &str, algorithms: &[Algorithm]) -> bool {
        if let Some(subject) = &self.subject
            && subject != name
        {
            return false;
        }

        self.algorithms.is_empty()
            || algorithms.is_empty()
            || self.algorithms.iter().any(|a| algorithms.contains(a))
    }

    fn load(&self) -> InMemoryChecksums {
        let content = match (self.loader)() {
            Ok(content) => content,
            Err(e) => {
                warn!(source = %self.label, error = %error_chain(&e), "ignoring unreadable checksum source");
                return InMemoryChecksums::new();
            }
        };
        let content = String::from_utf8_lossy(&content);

        let known: InMemoryChecksums = match &self.subject {
            Some(subject) => parser::parse_sidecar(&content)
                .into_iter()
                .map(|checksum| (subject.clone(), checksum))
                .collect(),
            None => parser::parse_lines(&content).into_iter().collect(),
        };

        debug!(source = %self.label, artifacts = known.len(), "loaded checksum source");
        known
    }
}

impl ChecksumSource for DeferredChecksums {
    fn checksums(&self, name: &str, algorithms: &[Algorithm]) -> ChecksumList {
        if !self.could_answer(name, algorithms) {
            return ChecksumList::new();
        }

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let LoadState::NotLoaded = *state {
            *state = LoadState::Loaded(self.load());
        }

        match &*state {
            LoadState::Loaded(known) => known.checksums(name, algorithms),
            LoadState::NotLoaded => ChecksumList::new(),
        }
    }
}

impl std::fmt::Debug for DeferredChecksums {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredChecksums")
            .field("label", &self.label)
            .field("algorithms", &self.algorithms)
            .field("subject", &self.subject)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

/// Union of several checksum sources.
#[derive(Default)]
pub struct ChecksumManager {
    sources: Vec<Box<dyn ChecksumSource>>,
}

impl ChecksumManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: impl ChecksumSource + 'static) -> Self {
        self.push(source);
        self
    }

    pub fn push(&mut self, source: impl ChecksumSource + 'static) {
        self.sources.push(Box::new(source));
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Every checksum any source knows for `name` in an acceptable
    /// algorithm, loading deferred sources that could contribute.
    pub fn checksums(&self, name: &str, algorithms: &[Algorithm]) -> ChecksumList {
        let mut merged = ChecksumList::new();
        for source in &self.sources {
            merged.extend(source.checksums(name, algorithms));
        }
        merged
    }
}

impl ChecksumSource for ChecksumManager {
    fn checksums(&self, name: &str, algorithms: &[Algorithm]) -> ChecksumList {
        ChecksumManager::checksums(self, name, algorithms)
    }
}

impl std::fmt::Debug for ChecksumManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChecksumManager")
            .field("sources", &self.sources.len())
            .finish()
    }
}

/// How a release attachment relates to checksums.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChecksumAttachment {
    /// `<target>.<algorithm>` holding the digest of one file.
    Sidecar { target: String, algorithm: Algorithm },
    /// A list of `<digest>  <filename>` lines; empty `algorithms` means any.
    DigestList { algorithms: Vec<Algorithm> },
    /// Not a checksum source.
    Other,
}

static DIGEST_LIST_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:.*[._-])?(?:(md5|sha1|sha256|sha384|sha512)sums?|checksums?)(?:\.txt)?$")
        .expect("valid regex")
});

/// Classify a release attachment by its file name.
pub fn classify_attachment(name: &str) -> ChecksumAttachment {
    if let Some((target, extension)) = name.rsplit_once('.')
        && !target.is_empty()
        && let Ok(algorithm) = extension.parse::<Algorithm>()
    {
        return ChecksumAttachment::Sidecar {
            target: target.to_string(),
            algorithm,
        };
    }

    if let Some(captures) = DIGEST_LIST_NAME.captures(name) {
        let algorithms = captures
            .get(1)
            .and_then(|m| m.as_str().parse::<Algorithm>().ok())
            .into_iter()
            .collect();
        return ChecksumAttachment::DigestList { algorithms };
    }

    ChecksumAttachment::Other
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};

    fn sha256_of(data: &[u8]) -> Checksum {
        Checksum::new(Algorithm::Sha256, Algorithm::Sha256.digest(data)).unwrap()
    }

    fn counting_loader(content: String, calls: Arc<AtomicUsize>) -> ChecksumLoader {
        Box::new(move || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(content.clone().into_bytes())
        })
    }

    #[test]
    fn test_in_memory_filters_algorithms() {
        let mut known = InMemoryChecksums::new();
        known.add("a", sha256_of(b"a"));
        known.add("a", Checksum::new(Algorithm::Md5, Algorithm::Md5.digest(b"a")).unwrap());

        assert_eq!(known.checksums("a", &[]).len(), 2);
        assert_eq!(known.checksums("a", &[Algorithm::Md5]).len(), 1);
        assert!(known.checksums("b", &[]).is_empty());
    }

    #[test]
    fn test_sidecar_pins_subject() {
        let calls = Arc::new(AtomicUsize::new(0));
        let content = format!("{}  differently-spelled.tgz\n", sha256_of(b"x").to_hex());
        let sidecar = DeferredChecksums::sidecar(
            "tool.tar.gz.sha256",
            "tool.tar.gz",
            Algorithm::Sha256,
            counting_loader(content, calls.clone()),
        );

        let found = sidecar.checksums("tool.tar.gz", &[]);
        assert_eq!(found.len(), 1);
        assert_eq!(found.strongest().unwrap(), &sha256_of(b"x"));
        assert!(sidecar.checksums("differently-spelled.tgz", &[]).is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_sidecar_not_fetched_for_other_artifacts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let sidecar = DeferredChecksums::sidecar(
            "tool.tar.gz.sha256",
            "tool.tar.gz",
            Algorithm::Sha256,
            counting_loader(String::new(), calls.clone()),
        );

        assert!(sidecar.checksums("other.zip", &[]).is_empty());
        assert!(!sidecar.is_loaded());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_deferred_skips_disjoint_algorithms() {
        let calls = Arc::new(AtomicUsize::new(0));
        let list = DeferredChecksums::digest_list(
            "SHA256SUMS",
            vec![Algorithm::Sha256],
            counting_loader(String::new(), calls.clone()),
        );

        assert!(list.checksums("tool", &[Algorithm::Md5]).is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        list.checksums("tool", &[Algorithm::Sha256]);
        list.checksums("other", &[]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_deferred_failure_is_empty_and_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let list = DeferredChecksums::digest_list(
            "checksums.txt",
            vec![],
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ClientError::NotFound("checksums.txt".into()))
            }),
        );

        assert!(list.checksums("tool", &[]).is_empty());
        assert!(list.checksums("tool", &[]).is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(list.is_loaded());
    }

    #[test]
    fn test_deferred_loads_once_under_concurrency() {
        const CALLERS: usize = 8;

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let content = format!(
            "{}  a.tar.gz\n{}  b.tar.gz\n",
            sha256_of(b"a").to_hex(),
            sha256_of(b"b").to_hex()
        );
        let manager = ChecksumManager::new().with_source(DeferredChecksums::digest_list(
            "checksums.txt",
            vec![],
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(std::time::Duration::from_millis(20));
                Ok(content.clone().into_bytes())
            }),
        ));

        let barrier = Barrier::new(CALLERS);
        std::thread::scope(|scope| {
            for i in 0..CALLERS {
                let manager = &manager;
                let barrier = &barrier;
                scope.spawn(move || {
                    barrier.wait();
                    let name = if i % 2 == 0 { "a.tar.gz" } else { "b.tar.gz" };
                    assert_eq!(manager.checksums(name, &[]).len(), 1);
                });
            }
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_manager_unions_sources() {
        let notes: InMemoryChecksums = [("tool".to_string(), sha256_of(b"tool"))].into_iter().collect();
        let calls = Arc::new(AtomicUsize::new(0));
        let md5 = Checksum::new(Algorithm::Md5, Algorithm::Md5.digest(b"tool")).unwrap();
        let manager = ChecksumManager::new().with_source(notes).with_source(DeferredChecksums::sidecar(
            "tool.md5",
            "tool",
            Algorithm::Md5,
            counting_loader(format!("{}\n", md5.to_hex()), calls.clone()),
        ));

        let found = manager.checksums("tool", &[]);
        assert_eq!(found.algorithms(), vec![Algorithm::Sha256, Algorithm::Md5]);

        let strong_only = manager.checksums("tool", &[Algorithm::Sha256]);
        assert_eq!(strong_only.len(), 1);
    }

    #[test]
    fn test_classify_sidecars() {
        assert_eq!(
            classify_attachment("tool-linux.tar.gz.sha256"),
            ChecksumAttachment::Sidecar {
                target: "tool-linux.tar.gz".into(),
                algorithm: Algorithm::Sha256
            }
        );
        assert_eq!(
            classify_attachment("tool.md5"),
            ChecksumAttachment::Sidecar {
                target: "tool".into(),
                algorithm: Algorithm::Md5
            }
        );
        assert_eq!(classify_attachment(".sha1"), ChecksumAttachment::Other);
    }

    #[test]
    fn test_classify_digest_lists() {
        for name in [
            "checksums.txt",
            "checksums",
            "checksum.txt",
            "tool_1.0.0_checksums.txt",
            "CHECKSUMS",
        ] {
            assert_eq!(
                classify_attachment(name),
                ChecksumAttachment::DigestList { algorithms: vec![] },
                "{}",
                name
            );
        }

        assert_eq!(
            classify_attachment("SHA256SUMS"),
            ChecksumAttachment::DigestList {
                algorithms: vec![Algorithm::Sha256]
            }
        );
        assert_eq!(
            classify_attachment("md5sums.txt"),
            ChecksumAttachment::DigestList {
                algorithms: vec![Algorithm::Md5]
            }
        );
        assert_eq!(
            classify_attachment("sha512sum"),
            ChecksumAttachment::DigestList {
                algorithms: vec![Algorithm::Sha512]
            }
        );
    }

    #[test]
    fn test_classify_other() {
        for name in ["tool.tar.gz", "README.md", "checksums.zip", "notchecksums"] {
            assert_eq!(classify_attachment(name), ChecksumAttachment::Other, "{}", name);
        }
    }
}
