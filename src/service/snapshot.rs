//! Resolved snapshots
//!
//! A snapshot is bound to exactly one commit. [`CommitSnapshot`] serves
//! archives and blobs straight from the commit; [`ReleaseSnapshot`] wraps
//! one and adds release assets plus a release-scoped checksum manager.

use super::client::{ArchiveFormat, Release, RepositoryClient, ServiceKind, TreeEntryKind};
use super::resource::{Resource, ResourceOrigin};
use super::{NamePattern, Ref, RefMetadata, ResourceError, ResourceType};
use crate::checksum::manager::{classify_attachment, ChecksumAttachment, ChecksumLoader};
use crate::checksum::{parser, ChecksumManager, DeferredChecksums, InMemoryChecksums};
use std::io::Read;
use std::sync::{Arc, OnceLock};
use tracing::debug;

const GITHUB_ARCHIVES: [&str; 2] = ["tar.gz", "zip"];
const GITLAB_ARCHIVES: [&str; 8] = ["bz2", "tar", "tar.bz2", "tar.gz", "tb2", "tbz", "tbz2", "zip"];

/// Common behavior of resolved snapshots.
pub trait Snapshot {
    /// The reference with its ref string disambiguated, e.g. a full commit
    /// hash in place of a prefix.
    fn canonical_ref(&self) -> &Ref;

    fn metadata(&self) -> RefMetadata;

    /// Every resource of `resource_type` whose name matches `pattern`.
    fn resolve_resources(
        &self,
        resource_type: ResourceType,
        pattern: &NamePattern,
    ) -> Result<Vec<Resource>, ResourceError>;
}

/// A snapshot that serves archives and blobs of one commit.
pub struct CommitSnapshot {
    client: Arc<dyn RepositoryClient>,
    reference: Ref,
    commit: String,
    archive_base: String,
    metadata: RefMetadata,
}

impl CommitSnapshot {
    pub(crate) fn new(
        client: Arc<dyn RepositoryClient>,
        reference: Ref,
        commit: &str,
        archive_base: String,
        metadata: RefMetadata,
    ) -> Self {
        Self {
            client,
            reference,
            commit: commit.to_string(),
            archive_base,
            metadata,
        }
    }

    pub fn commit(&self) -> &str {
        &self.commit
    }

    /// File name stem of generated archives, e.g. `tool-v1.2.0`.
    pub fn archive_base(&self) -> &str {
        &self.archive_base
    }

    fn resource(&self, name: &str, size: Option<u64>, origin: ResourceOrigin) -> Resource {
        Resource::new(
            self.client.clone(),
            &self.reference.owner,
            &self.reference.repository,
            name,
            size,
            origin,
        )
    }

    fn resolve_archives(&self, pattern: &NamePattern) -> Vec<Resource> {
        let extensions: &[&str] = match self.client.service_kind() {
            ServiceKind::GitHub => &GITHUB_ARCHIVES,
            ServiceKind::GitLab => &GITLAB_ARCHIVES,
        };

        extensions
            .iter()
            .map(|extension| format!("{}.{}", self.archive_base, extension))
            .filter(|candidate| pattern.matches(candidate))
            .filter_map(|candidate| {
                let format = ArchiveFormat::from_name(&candidate)?;
                Some(self.resource(
                    &candidate,
                    None,
                    ResourceOrigin::Archive {
                        target: self.commit.clone(),
                        format,
                    },
                ))
            })
            .collect()
    }

    fn resolve_blobs(&self, pattern: &NamePattern) -> Result<Vec<Resource>, ResourceError> {
        let tree = self
            .client
            .tree(&self.reference.owner, &self.reference.repository, &self.commit, true)
            .map_err(|source| ResourceError::Client {
                reference: self.reference.to_string(),
                operation: "getting commit tree",
                source,
            })?;

        debug!(entries = tree.len(), commit = %self.commit, "fetched commit tree");

        Ok(tree
            .into_iter()
            .filter(|entry| entry.kind == TreeEntryKind::Blob && pattern.matches(&entry.path))
            .map(|entry| self.resource(&entry.path, entry.size, ResourceOrigin::Blob { sha: entry.sha }))
            .collect())
    }
}

impl Snapshot for CommitSnapshot {
    fn canonical_ref(&self) -> &Ref {
        &self.reference
    }

    fn metadata(&self) -> RefMetadata {
        self.metadata.clone()
    }

    fn resolve_resources(
        &self,
        resource_type: ResourceType,
        pattern: &NamePattern,
    ) -> Result<Vec<Resource>, ResourceError> {
        match resource_type {
            ResourceType::Archive => Ok(self.resolve_archives(pattern)),
            ResourceType::Blob => self.resolve_blobs(pattern),
            ResourceType::Asset => Err(ResourceError::Unsupported {
                reference: self.reference.to_string(),
                resource_type,
                kind: "a ref without a release",
            }),
        }
    }
}

/// A commit snapshot decorated with the release published for its tag.
pub struct ReleaseSnapshot {
    commit: CommitSnapshot,
    release: Release,
    checksums: OnceLock<Arc<ChecksumManager>>,
}

impl ReleaseSnapshot {
    pub(crate) fn new(commit: CommitSnapshot, release: Release) -> Self {
        Self {
            commit,
            release,
            checksums: OnceLock::new(),
        }
    }

    pub fn release(&self) -> &Release {
        &self.release
    }

    pub fn commit_snapshot(&self) -> &CommitSnapshot {
        &self.commit
    }

    /// The release's checksum manager, built on first use.
    pub fn checksum_manager(&self) -> Arc<ChecksumManager> {
        self.checksums
            .get_or_init(|| Arc::new(self.build_checksum_manager()))
            .clone()
    }

    fn build_checksum_manager(&self) -> ChecksumManager {
        let mut manager = ChecksumManager::new();

        let notes: InMemoryChecksums = parser::parse_release_notes(&self.release.body)
            .into_iter()
            .collect();
        if !notes.is_empty() {
            debug!(artifacts = notes.len(), "found checksums in release notes");
            manager.push(notes);
        }

        for asset in &self.release.assets {
            match classify_attachment(&asset.name) {
                ChecksumAttachment::Sidecar { target, algorithm } => {
                    manager.push(DeferredChecksums::sidecar(
                        &asset.name,
                        target,
                        algorithm,
                        self.asset_loader(asset.id),
                    ));
                }
                ChecksumAttachment::DigestList { algorithms } => {
                    manager.push(DeferredChecksums::digest_list(
                        &asset.name,
                        algorithms,
                        self.asset_loader(asset.id),
                    ));
                }
                ChecksumAttachment::Other => {}
            }
        }

        debug!(
            release = %self.release.tag_name,
            sources = manager.source_count(),
            "built release checksum manager"
        );
        manager
    }

    fn asset_loader(&self, asset_id: u64) -> ChecksumLoader {
        let client = self.commit.client.clone();
        let owner = self.commit.reference.owner.clone();
        let repository = self.commit.reference.repository.clone();

        Box::new(move || {
            let mut stream = client.release_asset_stream(&owner, &repository, asset_id)?;
            let mut content = Vec::new();
            stream.read_to_end(&mut content)?;
            Ok(content)
        })
    }

    fn resolve_assets(&self, pattern: &NamePattern) -> Vec<Resource> {
        let matched: Vec<_> = self
            .release
            .assets
            .iter()
            .filter(|asset| pattern.matches(&asset.name))
            .collect();

        if matched.is_empty() {
            return Vec::new();
        }

        let checksums = self.checksum_manager();
        matched
            .into_iter()
            .map(|asset| {
                self.commit
                    .resource(&asset.name, Some(asset.size), ResourceOrigin::Asset { id: asset.id })
                    .with_checksums(checksums.clone())
            })
            .collect()
    }

    fn metadata_prefix(&self) -> &'static str {
        self.commit.client.service_kind().name()
    }
}

impl Snapshot for ReleaseSnapshot {
    fn canonical_ref(&self) -> &Ref {
        self.commit.canonical_ref()
    }

    fn metadata(&self) -> RefMetadata {
        let prefix = self.metadata_prefix();
        let mut release = RefMetadata::new();
        release.push(&format!("{}-release-id", prefix), self.release.id.to_string());
        if let Some(published) = &self.release.published_at {
            release.push(&format!("{}-release-published-at", prefix), published.clone());
        }
        release.push(&format!("{}-release-body", prefix), self.release.body.clone());

        self.commit.metadata().prepended(release)
    }

    fn resolve_resources(
        &self,
        resource_type: ResourceType,
        pattern: &NamePattern,
    ) -> Result<Vec<Resource>, ResourceError> {
        match resource_type {
            ResourceType::Asset => Ok(self.resolve_assets(pattern)),
            _ => self.commit.resolve_resources(resource_type, pattern),
        }
    }
}

/// Result of resolving a reference.
pub enum ResolvedSnapshot {
    Commit(CommitSnapshot),
    Release(ReleaseSnapshot),
}

impl ResolvedSnapshot {
    pub fn release(&self) -> Option<&Release> {
        match self {
            Self::Commit(_) => None,
            Self::Release(release) => Some(release.release()),
        }
    }

    pub fn commit(&self) -> &str {
        match self {
            Self::Commit(commit) => commit.commit(),
            Self::Release(release) => release.commit_snapshot().commit(),
        }
    }

    fn inner(&self) -> &dyn Snapshot {
        match self {
            Self::Commit(commit) => commit,
            Self::Release(release) => release,
        }
    }
}

impl Snapshot for ResolvedSnapshot {
    fn canonical_ref(&self) -> &Ref {
        self.inner().canonical_ref()
    }

    fn metadata(&self) -> RefMetadata {
        self.inner().metadata()
    }

    fn resolve_resources(
        &self,
        resource_type: ResourceType,
        pattern: &NamePattern,
    ) -> Result<Vec<Resource>, ResourceError> {
        self.inner().resolve_resources(resource_type, pattern)
    }
}

impl std::fmt::Debug for ResolvedSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSnapshot")
            .field("ref", &self.canonical_ref().to_string())
            .field("commit", &self.commit())
            .field("release", &self.release().map(|r| r.tag_name.as_str()))
            .finish()
    }
}
