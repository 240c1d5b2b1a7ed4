//! Hosted repository lookups
//!
//! A user reference such as `github.com/owner/repo@v1.2.0` is resolved into
//! a [`ResolvedSnapshot`] bound to exactly one commit, which in turn expands
//! name patterns into downloadable [`Resource`]s.
//!
//! ## Reference syntax
//!
//! ```text
//! [server/]owner/repository[@ref]
//! ```
//!
//! The server defaults to `github.com`. An empty ref means the latest
//! release, optionally narrowed by version constraints and stability.

pub mod client;
mod error;
pub mod github;
pub mod resolver;
pub mod resource;
pub mod snapshot;

pub use client::{RemoteStream, RepositoryClient, ServiceKind};
pub use error::{ClientError, ResolveError, ResourceError};
pub use resolver::Resolver;
pub use resource::{Resource, ResourceOrigin};
pub use snapshot::{CommitSnapshot, ReleaseSnapshot, ResolvedSnapshot, Snapshot};

use glob::{MatchOptions, Pattern};
use semver::{Version, VersionReq};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

pub const DEFAULT_SERVER: &str = "github.com";

/// A possibly ambiguous pointer into a hosted repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Ref {
    pub server: String,
    pub owner: String,
    pub repository: String,
    /// Tag, branch, full or partial commit hash, or empty for "latest".
    #[serde(rename = "ref")]
    pub ref_string: String,
}

impl Ref {
    pub fn new(server: &str, owner: &str, repository: &str, ref_string: &str) -> Self {
        Self {
            server: server.to_string(),
            owner: owner.to_string(),
            repository: repository.to_string(),
            ref_string: ref_string.to_string(),
        }
    }

    /// Parse `[server/]owner/repository[@ref]`.
    pub fn parse(input: &str) -> Result<Self, ResolveError> {
        let invalid = |message: &str| ResolveError::InvalidRef {
            input: input.to_string(),
            message: message.to_string(),
        };

        let (path, ref_string) = input.split_once('@').unwrap_or((input, ""));
        let parts: Vec<&str> = path.trim_end_matches('/').split('/').collect();

        let (server, owner, repository) = match parts.as_slice() {
            [owner, repository] => (DEFAULT_SERVER, *owner, *repository),
            [server, owner, repository] => (*server, *owner, *repository),
            _ => return Err(invalid("expected [server/]owner/repository[@ref]")),
        };

        if server.is_empty() || owner.is_empty() || repository.is_empty() {
            return Err(invalid("server, owner, and repository must not be empty"));
        }

        Ok(Self::new(server, owner, repository, ref_string))
    }

    /// The same repository pointed at a different ref.
    pub fn with_ref(&self, ref_string: &str) -> Self {
        Self {
            ref_string: ref_string.to_string(),
            ..self.clone()
        }
    }
}

impl FromStr for Ref {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.server, self.owner, self.repository)?;
        if !self.ref_string.is_empty() {
            write!(f, "@{}", self.ref_string)?;
        }
        Ok(())
    }
}

/// Release stability levels accepted when resolving "latest".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stability {
    Stable,
    PreRelease,
    Any,
}

impl FromStr for Stability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stable" => Ok(Self::Stable),
            "pre-release" => Ok(Self::PreRelease),
            "any" => Ok(Self::Any),
            other => Err(format!(
                "unknown stability '{}' (expected stable, pre-release, any)",
                other
            )),
        }
    }
}

impl fmt::Display for Stability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stable => "stable",
            Self::PreRelease => "pre-release",
            Self::Any => "any",
        })
    }
}

/// A reference plus the constraints applied when it means "latest".
#[derive(Debug, Clone)]
pub struct LookupRequest {
    pub reference: Ref,
    pub versions: Vec<VersionReq>,
    pub stability: Vec<Stability>,
}

impl LookupRequest {
    pub fn new(reference: Ref) -> Self {
        Self {
            reference,
            versions: Vec::new(),
            stability: Vec::new(),
        }
    }

    pub fn with_versions(mut self, versions: Vec<VersionReq>) -> Self {
        self.versions = versions;
        self
    }

    pub fn with_stability(mut self, stability: Vec<Stability>) -> Self {
        self.stability = stability;
        self
    }

    pub fn satisfies_stability(&self, prerelease: bool) -> bool {
        let actual = if prerelease {
            Stability::PreRelease
        } else {
            Stability::Stable
        };

        self.stability.is_empty()
            || self
                .stability
                .iter()
                .any(|wanted| *wanted == Stability::Any || *wanted == actual)
    }

    /// Whether a release tag satisfies every version constraint.
    ///
    /// Errors when constraints are present and the tag is not a version.
    pub fn satisfies_version(&self, tag: &str) -> Result<bool, semver::Error> {
        if self.versions.is_empty() {
            return Ok(true);
        }

        let version = parse_version(tag)?;
        Ok(self.versions.iter().all(|req| req.matches(&version)))
    }

    /// Names of the active filters, e.g. `["version", "stability"]`.
    pub fn active_filters(&self) -> Vec<&'static str> {
        let mut filters = Vec::new();
        if !self.versions.is_empty() {
            filters.push("version");
        }
        if !self.stability.is_empty() {
            filters.push("stability");
        }
        filters
    }

    pub fn is_constrained(&self) -> bool {
        !self.active_filters().is_empty()
    }
}

/// Parse a release tag as a semantic version, stripping a leading `v` and
/// padding short versions (`1.2` becomes `1.2.0`).
pub fn parse_version(tag: &str) -> Result<Version, semver::Error> {
    let tag = tag.strip_prefix('v').unwrap_or(tag);
    let split = tag.find(['-', '+']).unwrap_or(tag.len());
    let (core, rest) = tag.split_at(split);

    let padded = match core.split('.').count() {
        1 => format!("{}.0.0{}", core, rest),
        2 => format!("{}.0{}", core, rest),
        _ => tag.to_string(),
    };

    Version::parse(&padded)
}

/// One `name = value` entry describing a resolved snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataEntry {
    pub name: String,
    pub value: String,
}

/// Ordered snapshot metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RefMetadata(Vec<MetadataEntry>);

impl RefMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: &str, value: impl Into<String>) {
        self.0.push(MetadataEntry {
            name: name.to_string(),
            value: value.into(),
        });
    }

    /// Entries of `first` followed by these entries.
    pub fn prepended(&self, first: RefMetadata) -> RefMetadata {
        let mut merged = first;
        merged.0.extend(self.0.iter().cloned());
        merged
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.value.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MetadataEntry> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a RefMetadata {
    type Item = &'a MetadataEntry;
    type IntoIter = std::slice::Iter<'a, MetadataEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Kinds of downloadable resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    /// Files uploaded to a release.
    #[default]
    Asset,
    /// Source archives generated by the service.
    Archive,
    /// Files from the commit tree.
    Blob,
}

impl FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asset" => Ok(Self::Asset),
            "archive" => Ok(Self::Archive),
            "blob" => Ok(Self::Blob),
            other => Err(format!(
                "unknown resource type '{}' (expected asset, archive, blob)",
                other
            )),
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Asset => "asset",
            Self::Archive => "archive",
            Self::Blob => "blob",
        })
    }
}

/// A case-sensitive shell glob matched against resource names.
///
/// `*` and `?` never match `/`, so `*.txt` only matches top-level blobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamePattern {
    raw: String,
    pattern: Pattern,
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

impl NamePattern {
    pub fn new(raw: &str) -> Result<Self, ResourceError> {
        let pattern = Pattern::new(raw).map_err(|e| ResourceError::InvalidPattern {
            pattern: raw.to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            raw: raw.to_string(),
            pattern,
        })
    }

    /// Matches every top-level name.
    pub fn any() -> Self {
        static ANY: LazyLock<Pattern> = LazyLock::new(|| Pattern::new("*").expect("valid glob"));

        Self {
            raw: "*".to_string(),
            pattern: ANY.clone(),
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        self.pattern.matches_with(name, MATCH_OPTIONS)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for NamePattern {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for NamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
