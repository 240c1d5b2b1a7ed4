//! Remote repository client capability
//!
//! Everything the resolver and resources need from a hosting service,
//! expressed as already-parsed structures. Implementations are blocking and
//! must be shareable across transfer workers.

use super::ClientError;
use std::fmt;
use std::io::Read;

/// A streaming response body.
pub type RemoteStream = Box<dyn Read + Send>;

/// Hosting service flavor, used where behavior differs between services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    GitHub,
    GitLab,
}

impl ServiceKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::GitHub => "github",
            Self::GitLab => "gitlab",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Object a git reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Commit,
    /// An annotated tag object that must be dereferenced to reach a commit.
    Tag,
}

/// A `refs/tags/*` or `refs/heads/*` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitRef {
    /// Fully qualified name, e.g. `refs/tags/v1.2.0`.
    pub name: String,
    pub object: ObjectKind,
    pub sha: String,
}

/// A dereferenced annotated tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedTag {
    pub name: String,
    pub commit: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseAsset {
    pub id: u64,
    pub name: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Release {
    pub id: u64,
    pub tag_name: String,
    pub name: Option<String>,
    pub body: String,
    pub prerelease: bool,
    /// RFC 3339 publication timestamp, absent for drafts.
    pub published_at: Option<String>,
    pub assets: Vec<ReleaseAsset>,
}

/// One page of the release listing, newest first.
#[derive(Debug, Clone, Default)]
pub struct ReleasePage {
    pub releases: Vec<Release>,
    pub next_page: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeEntryKind {
    Blob,
    Tree,
    Submodule,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: String,
    pub kind: TreeEntryKind,
    pub sha: String,
    pub size: Option<u64>,
}

/// Generated source archive formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    Zip,
    Tar,
    TarBz2,
}

impl ArchiveFormat {
    /// Infer the format from an archive file name.
    pub fn from_name(name: &str) -> Option<Self> {
        const SUFFIXES: [(&str, ArchiveFormat); 10] = [
            (".tar.gz", ArchiveFormat::TarGz),
            (".tgz", ArchiveFormat::TarGz),
            (".zip", ArchiveFormat::Zip),
            (".tar.bz2", ArchiveFormat::TarBz2),
            (".tbz2", ArchiveFormat::TarBz2),
            (".tbz", ArchiveFormat::TarBz2),
            (".tb2", ArchiveFormat::TarBz2),
            (".bz2", ArchiveFormat::TarBz2),
            (".tar", ArchiveFormat::Tar),
            (".gz", ArchiveFormat::TarGz),
        ];

        SUFFIXES
            .iter()
            .find(|(suffix, _)| name.ends_with(suffix))
            .map(|(_, format)| *format)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::TarGz => "tar.gz",
            Self::Zip => "zip",
            Self::Tar => "tar",
            Self::TarBz2 => "tar.bz2",
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Capabilities consumed from a hosting service.
///
/// Lookups return [`ClientError::NotFound`] when the object does not exist
/// so callers can tell absence apart from failure.
pub trait RepositoryClient: Send + Sync {
    fn service_kind(&self) -> ServiceKind;

    fn tag_ref(&self, owner: &str, repo: &str, name: &str) -> Result<GitRef, ClientError>;

    fn branch_ref(&self, owner: &str, repo: &str, name: &str) -> Result<GitRef, ClientError>;

    /// Resolve a full or partial commit hash to the full hash.
    fn commit(&self, owner: &str, repo: &str, hash_or_prefix: &str) -> Result<String, ClientError>;

    /// List releases, 1-based pages.
    fn list_releases(&self, owner: &str, repo: &str, page: u32) -> Result<ReleasePage, ClientError>;

    fn latest_release(&self, owner: &str, repo: &str) -> Result<Release, ClientError>;

    fn release_by_tag(&self, owner: &str, repo: &str, tag: &str) -> Result<Release, ClientError>;

    fn tree(&self, owner: &str, repo: &str, commit: &str, recursive: bool) -> Result<Vec<TreeEntry>, ClientError>;

    fn annotated_tag(&self, owner: &str, repo: &str, sha: &str) -> Result<AnnotatedTag, ClientError>;

    fn archive_stream(
        &self,
        owner: &str,
        repo: &str,
        commit_or_ref: &str,
        format: ArchiveFormat,
    ) -> Result<RemoteStream, ClientError>;

    fn blob_stream(&self, owner: &str, repo: &str, sha: &str) -> Result<RemoteStream, ClientError>;

    fn release_asset_stream(&self, owner: &str, repo: &str, asset_id: u64) -> Result<RemoteStream, ClientError>;
}
