//! Reference resolution
//!
//! Strategies are tried in a fixed order and the first hit wins:
//!
//! 1. empty ref: latest release (optionally filtered), then continue with
//!    its tag name
//! 2. tag, dereferencing annotated tags, decorated with its release
//! 3. branch head
//! 4. commit, only when the ref looks like a (partial) hex hash
//!
//! A `NotFound` answer means "try the next strategy"; any other client
//! error aborts resolution.

use super::client::{GitRef, ObjectKind, Release, RepositoryClient};
use super::snapshot::{CommitSnapshot, ReleaseSnapshot, ResolvedSnapshot};
use super::{ClientError, LookupRequest, Ref, RefMetadata, ResolveError};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info};

/// Upper bound on release pages scanned for a constrained "latest".
pub const MAX_RELEASE_PAGES: u32 = 5;

static POTENTIAL_COMMIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-f]{1,40}$").expect("valid regex"));

/// Whether a ref string could name a full or partial commit hash.
pub fn is_potential_commit(ref_string: &str) -> bool {
    POTENTIAL_COMMIT.is_match(ref_string)
}

/// Turns lookup requests into snapshots using one repository client.
pub struct Resolver {
    client: Arc<dyn RepositoryClient>,
}

impl Resolver {
    pub fn new(client: Arc<dyn RepositoryClient>) -> Self {
        Self { client }
    }

    pub fn resolve(&self, request: &LookupRequest) -> Result<ResolvedSnapshot, ResolveError> {
        let mut reference = request.reference.clone();
        let mut latest = None;

        if reference.ref_string.is_empty() {
            let release = self.resolve_latest(request)?;
            info!(tag = %release.tag_name, "resolved latest release");
            reference.ref_string = release.tag_name.clone();
            latest = Some(release);
        }

        let (owner, repo, name) = (
            reference.owner.as_str(),
            reference.repository.as_str(),
            reference.ref_string.as_str(),
        );

        let tag = found(&reference, "attempting tag resolution", self.client.tag_ref(owner, repo, name))?;
        if let Some(tag) = tag {
            return self.resolve_tag(&reference, tag, latest);
        }

        let branch = found(&reference, "attempting branch resolution", self.client.branch_ref(owner, repo, name))?;
        if let Some(branch) = branch {
            return Ok(self.resolve_branch(&reference, branch));
        }

        if is_potential_commit(name) {
            let commit = found(&reference, "attempting commit resolution", self.client.commit(owner, repo, name))?;
            if let Some(commit) = commit {
                return Ok(self.resolve_commit(&reference, &commit));
            }
        } else {
            debug!(ref_string = name, "not a potential commit hash");
        }

        Err(ResolveError::Unresolvable {
            reference: reference.to_string(),
            ref_string: reference.ref_string.clone(),
        })
    }

    fn resolve_latest(&self, request: &LookupRequest) -> Result<Release, ResolveError> {
        let reference = &request.reference;
        let (owner, repo) = (reference.owner.as_str(), reference.repository.as_str());

        if !request.is_constrained() {
            return self.client.latest_release(owner, repo).map_err(|e| match e {
                ClientError::NotFound(_) => ResolveError::RepositoryNotFound {
                    reference: reference.to_string(),
                },
                source => ResolveError::Client {
                    reference: reference.to_string(),
                    operation: "getting latest release",
                    source,
                },
            });
        }

        let mut page = 1;
        for _ in 0..MAX_RELEASE_PAGES {
            let listing = self.client.list_releases(owner, repo, page).map_err(|e| match e {
                ClientError::NotFound(_) => ResolveError::RepositoryNotFound {
                    reference: reference.to_string(),
                },
                source => ResolveError::Client {
                    reference: reference.to_string(),
                    operation: "iterating releases",
                    source,
                },
            })?;

            for release in listing.releases {
                if !request.satisfies_stability(release.prerelease) {
                    continue;
                }

                match request.satisfies_version(&release.tag_name) {
                    Ok(true) => return Ok(release),
                    Ok(false) => continue,
                    Err(e) => {
                        debug!(tag = %release.tag_name, error = %e, "skipping invalid semver tag");
                        continue;
                    }
                }
            }

            match listing.next_page {
                Some(next) => page = next,
                None => break,
            }
        }

        Err(ResolveError::NoMatchingRelease {
            reference: reference.to_string(),
            filters: request.active_filters().join(", "),
        })
    }

    fn resolve_tag(
        &self,
        reference: &Ref,
        tag: GitRef,
        latest: Option<Release>,
    ) -> Result<ResolvedSnapshot, ResolveError> {
        let (owner, repo) = (reference.owner.as_str(), reference.repository.as_str());
        let tag_name = tag.name.trim_start_matches("refs/tags/").to_string();

        let commit = match tag.object {
            ObjectKind::Commit => tag.sha,
            ObjectKind::Tag => {
                self.client
                    .annotated_tag(owner, repo, &tag.sha)
                    .map_err(|source| ResolveError::Client {
                        reference: reference.to_string(),
                        operation: "getting tag of annotated tag",
                        source,
                    })?
                    .commit
            }
        };

        info!(tag = %tag_name, commit = %commit, annotated = tag.object == ObjectKind::Tag, "resolved tag");

        let mut metadata = RefMetadata::new();
        metadata.push("tag", tag_name.as_str());
        metadata.push("commit", commit.as_str());

        let snapshot = CommitSnapshot::new(
            self.client.clone(),
            reference.with_ref(&tag_name),
            &commit,
            format!("{}-{}", reference.repository, tag_name),
            metadata,
        );

        let release = match latest {
            Some(release) if release.tag_name == tag_name => Some(release),
            _ => found(
                reference,
                "getting release by tag",
                self.client.release_by_tag(owner, repo, &tag_name),
            )?,
        };

        Ok(match release {
            Some(release) => {
                debug!(release = release.id, assets = release.assets.len(), "tag has a release");
                ResolvedSnapshot::Release(ReleaseSnapshot::new(snapshot, release))
            }
            None => ResolvedSnapshot::Commit(snapshot),
        })
    }

    fn resolve_branch(&self, reference: &Ref, branch: GitRef) -> ResolvedSnapshot {
        let branch_name = branch.name.trim_start_matches("refs/heads/");
        let last_segment = branch_name.rsplit('/').next().unwrap_or(branch_name);

        info!(branch = %branch_name, commit = %branch.sha, "resolved branch");

        let mut metadata = RefMetadata::new();
        metadata.push("branch", branch_name);
        metadata.push("commit", branch.sha.as_str());

        ResolvedSnapshot::Commit(CommitSnapshot::new(
            self.client.clone(),
            reference.with_ref(branch_name),
            &branch.sha,
            format!("{}-{}", reference.repository, last_segment),
            metadata,
        ))
    }

    fn resolve_commit(&self, reference: &Ref, commit: &str) -> ResolvedSnapshot {
        info!(commit = %commit, "resolved commit");

        let short = commit.get(..9).unwrap_or(commit);
        let mut metadata = RefMetadata::new();
        metadata.push("commit", commit);

        ResolvedSnapshot::Commit(CommitSnapshot::new(
            self.client.clone(),
            reference.with_ref(commit),
            commit,
            format!("{}-{}", reference.repository, short),
            metadata,
        ))
    }
}

/// Map `NotFound` to `None` and wrap any other failure as fatal.
fn found<T>(
    reference: &Ref,
    operation: &'static str,
    result: Result<T, ClientError>,
) -> Result<Option<T>, ResolveError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => {
            debug!(%reference, operation, "not found");
            Ok(None)
        }
        Err(source) => Err(ResolveError::Client {
            reference: reference.to_string(),
            operation,
            source,
        }),
    }
}
