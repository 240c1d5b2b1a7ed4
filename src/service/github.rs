//! GitHub REST client
//!
//! Implements [`RepositoryClient`] with blocking `ureq` requests against the
//! v3 API.
//!
//! ## Authentication
//!
//! A token raises the rate limit from 60/hr to 5000/hr:
//! ```bash
//! export GITHUB_TOKEN="ghp_xxxxxxxxxxxxxxxxxxxx"
//! ```

use super::client::{
    AnnotatedTag, ArchiveFormat, GitRef, ObjectKind, Release, ReleaseAsset, ReleasePage,
    RemoteStream, RepositoryClient, ServiceKind, TreeEntry, TreeEntryKind,
};
use super::ClientError;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Public GitHub API base URL.
pub const GITHUB_API_BASE: &str = "https://api.github.com";

const RELEASES_PER_PAGE: u32 = 25;
const JSON_MEDIA_TYPE: &str = "application/vnd.github.v3+json";

/// API base URL for a server: `api.github.com` for `github.com`, the
/// `/api/v3` prefix for enterprise hosts.
pub fn api_base_for(server: &str) -> String {
    if server == "github.com" {
        GITHUB_API_BASE.to_string()
    } else {
        format!("https://{}/api/v3", server)
    }
}

pub struct GitHubClient {
    api_base: String,
    token: Option<String>,
    user_agent: String,
    timeout: Duration,
    agent: ureq::Agent,
}

impl GitHubClient {
    pub fn new(api_base: impl Into<String>, timeout: Duration) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: None,
            user_agent: concat!("repofetch/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout,
            agent: ureq::AgentBuilder::new()
                .timeout_connect(timeout)
                .timeout_read(timeout)
                .build(),
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_string();
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn request(&self, url: &str, accept: &str) -> ureq::Request {
        let mut request = self
            .agent
            .get(url)
            .set("Accept", accept)
            .set("User-Agent", &self.user_agent);

        if let Some(token) = &self.token {
            request = request.set("Authorization", &format!("Bearer {}", token));
        }

        request
    }

    fn call(&self, url: &str, accept: &str, bounded: bool) -> Result<ureq::Response, ClientError> {
        debug!(url, "GET");

        let mut request = self.request(url, accept);
        if bounded {
            request = request.timeout(self.timeout);
        }

        request.call().map_err(|e| map_error(url, e))
    }

    /// The API base followed by `segments`, each percent-encoded. A `/`
    /// inside a segment (as in `heads/feature/x`) stays a path separator.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let invalid = |message: String| ClientError::InvalidUrl {
            url: self.api_base.clone(),
            message,
        };

        let mut url = Url::parse(&self.api_base).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid("cannot be a base URL".to_string()))?
            .pop_if_empty()
            .extend(segments.iter().flat_map(|segment| segment.split('/')));
        Ok(url)
    }

    fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ClientError> {
        self.call(url.as_str(), JSON_MEDIA_TYPE, true)?
            .into_json()
            .map_err(|e| ClientError::Decode {
                url: url.to_string(),
                message: e.to_string(),
            })
    }

    fn get_stream(&self, url: Url, accept: &str) -> Result<RemoteStream, ClientError> {
        Ok(self.call(url.as_str(), accept, false)?.into_reader())
    }
}

fn map_error(url: &str, error: ureq::Error) -> ClientError {
    match error {
        ureq::Error::Status(404, _) => ClientError::NotFound(url.to_string()),
        ureq::Error::Status(403 | 429, _) => ClientError::RateLimited(url.to_string()),
        ureq::Error::Status(code, _) => ClientError::Status {
            code,
            url: url.to_string(),
        },
        ureq::Error::Transport(transport) => ClientError::Transport {
            url: url.to_string(),
            message: transport.to_string(),
        },
    }
}

/// Extract the page number of the `rel="next"` entry of a `Link` header.
pub(crate) fn next_page(link: &str) -> Option<u32> {
    link.split(',')
        .find(|entry| entry.contains(r#"rel="next""#))
        .and_then(|entry| {
            let start = entry.find('<')? + 1;
            let end = entry.find('>')?;
            let url = entry.get(start..end)?;
            let query = url.split_once('?')?.1;
            query
                .split('&')
                .find_map(|pair| pair.strip_prefix("page="))
                .and_then(|page| page.parse().ok())
        })
}

// ==================== wire types ====================

#[derive(Deserialize)]
struct GitObjectJson {
    sha: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Deserialize)]
struct RefJson {
    #[serde(rename = "ref")]
    name: String,
    object: GitObjectJson,
}

#[derive(Deserialize)]
struct TagJson {
    tag: String,
    object: GitObjectJson,
}

#[derive(Deserialize)]
struct CommitJson {
    sha: String,
}

#[derive(Deserialize)]
struct AssetJson {
    id: u64,
    name: String,
    #[serde(default)]
    size: u64,
}

#[derive(Deserialize)]
struct ReleaseJson {
    id: u64,
    tag_name: String,
    name: Option<String>,
    body: Option<String>,
    #[serde(default)]
    prerelease: bool,
    published_at: Option<String>,
    #[serde(default)]
    assets: Vec<AssetJson>,
}

impl From<ReleaseJson> for Release {
    fn from(json: ReleaseJson) -> Self {
        Release {
            id: json.id,
            tag_name: json.tag_name,
            name: json.name,
            body: json.body.unwrap_or_default(),
            prerelease: json.prerelease,
            published_at: json.published_at,
            assets: json
                .assets
                .into_iter()
                .map(|asset| ReleaseAsset {
                    id: asset.id,
                    name: asset.name,
                    size: asset.size,
                })
                .collect(),
        }
    }
}

#[derive(Deserialize)]
struct TreeEntryJson {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    sha: String,
    size: Option<u64>,
}

#[derive(Deserialize)]
struct TreeJson {
    tree: Vec<TreeEntryJson>,
    #[serde(default)]
    truncated: bool,
}

fn object_kind(kind: &str) -> ObjectKind {
    if kind == "tag" {
        ObjectKind::Tag
    } else {
        ObjectKind::Commit
    }
}

impl GitHubClient {
    fn git_ref(&self, owner: &str, repo: &str, qualified: &str) -> Result<GitRef, ClientError> {
        let json: RefJson = self.get_json(self.endpoint(&["repos", owner, repo, "git", "ref", qualified])?)?;
        Ok(GitRef {
            name: json.name,
            object: object_kind(&json.object.kind),
            sha: json.object.sha,
        })
    }
}

impl GitHubClient {
    /// Every entry below `root`, fetched one non-recursive listing per
    /// directory.
    fn walk_tree(&self, owner: &str, repo: &str, root: &str) -> Result<Vec<TreeEntry>, ClientError> {
        let mut entries = Vec::new();
        let mut pending = vec![(String::new(), root.to_string())];

        while let Some((prefix, sha)) = pending.pop() {
            let json: TreeJson = self.get_json(self.endpoint(&["repos", owner, repo, "git", "trees", sha.as_str()])?)?;
            if json.truncated {
                warn!(tree = %sha, prefix = %prefix, "tree was truncated by the server; some blobs may be missing");
            }

            for entry in json.tree {
                let entry = tree_entry(entry, &prefix);
                if entry.kind == TreeEntryKind::Tree {
                    pending.push((entry.path.clone(), entry.sha.clone()));
                }
                entries.push(entry);
            }
        }

        debug!(entries = entries.len(), "walked tree");
        Ok(entries)
    }
}

fn tree_entry(json: TreeEntryJson, prefix: &str) -> TreeEntry {
    TreeEntry {
        kind: match json.kind.as_str() {
            "tree" => TreeEntryKind::Tree,
            "commit" => TreeEntryKind::Submodule,
            _ => TreeEntryKind::Blob,
        },
        path: if prefix.is_empty() {
            json.path
        } else {
            format!("{}/{}", prefix, json.path)
        },
        sha: json.sha,
        size: json.size,
    }
}

impl RepositoryClient for GitHubClient {
    fn service_kind(&self) -> ServiceKind {
        ServiceKind::GitHub
    }

    fn tag_ref(&self, owner: &str, repo: &str, name: &str) -> Result<GitRef, ClientError> {
        self.git_ref(owner, repo, &format!("tags/{}", name))
    }

    fn branch_ref(&self, owner: &str, repo: &str, name: &str) -> Result<GitRef, ClientError> {
        self.git_ref(owner, repo, &format!("heads/{}", name))
    }

    fn commit(&self, owner: &str, repo: &str, hash_or_prefix: &str) -> Result<String, ClientError> {
        // 422 means the prefix matched nothing
        let url = self.endpoint(&["repos", owner, repo, "commits", hash_or_prefix])?;
        match self.get_json::<CommitJson>(url) {
            Ok(commit) => Ok(commit.sha),
            Err(ClientError::Status { code: 422, url }) => Err(ClientError::NotFound(url)),
            Err(e) => Err(e),
        }
    }

    fn list_releases(&self, owner: &str, repo: &str, page: u32) -> Result<ReleasePage, ClientError> {
        let mut url = self.endpoint(&["repos", owner, repo, "releases"])?;
        url.query_pairs_mut()
            .append_pair("per_page", &RELEASES_PER_PAGE.to_string())
            .append_pair("page", &page.to_string());

        let response = self.call(url.as_str(), JSON_MEDIA_TYPE, true)?;
        let next_page = response.header("link").and_then(next_page);
        let releases: Vec<ReleaseJson> = response.into_json().map_err(|e| ClientError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        debug!(page, releases = releases.len(), ?next_page, "listed releases");

        Ok(ReleasePage {
            releases: releases.into_iter().map(Release::from).collect(),
            next_page,
        })
    }

    fn latest_release(&self, owner: &str, repo: &str) -> Result<Release, ClientError> {
        let json: ReleaseJson = self.get_json(self.endpoint(&["repos", owner, repo, "releases", "latest"])?)?;
        Ok(json.into())
    }

    fn release_by_tag(&self, owner: &str, repo: &str, tag: &str) -> Result<Release, ClientError> {
        let json: ReleaseJson = self.get_json(self.endpoint(&["repos", owner, repo, "releases", "tags", tag])?)?;
        Ok(json.into())
    }

    /// A recursive listing the server truncated is redone one directory
    /// at a time, since non-recursive listings are far below the limit.
    fn tree(&self, owner: &str, repo: &str, commit: &str, recursive: bool) -> Result<Vec<TreeEntry>, ClientError> {
        let mut url = self.endpoint(&["repos", owner, repo, "git", "trees", commit])?;
        if recursive {
            url.query_pairs_mut().append_pair("recursive", "1");
        }

        let json: TreeJson = self.get_json(url)?;
        if recursive && json.truncated {
            warn!(commit, "recursive tree was truncated by the server; listing subtrees individually");
            return self.walk_tree(owner, repo, commit);
        }
        if json.truncated {
            warn!(commit, "tree was truncated by the server; some blobs may be missing");
        }

        Ok(json.tree.into_iter().map(|entry| tree_entry(entry, "")).collect())
    }

    fn annotated_tag(&self, owner: &str, repo: &str, sha: &str) -> Result<AnnotatedTag, ClientError> {
        let json: TagJson = self.get_json(self.endpoint(&["repos", owner, repo, "git", "tags", sha])?)?;
        if json.object.kind == "tag" {
            // nested annotated tags: follow until a commit
            return self.annotated_tag(owner, repo, &json.object.sha);
        }

        Ok(AnnotatedTag {
            name: json.tag,
            commit: json.object.sha,
        })
    }

    fn archive_stream(
        &self,
        owner: &str,
        repo: &str,
        commit_or_ref: &str,
        format: ArchiveFormat,
    ) -> Result<RemoteStream, ClientError> {
        let endpoint = match format {
            ArchiveFormat::TarGz => "tarball",
            ArchiveFormat::Zip => "zipball",
            other => return Err(ClientError::Unsupported(format!("{} archives", other))),
        };

        self.get_stream(self.endpoint(&["repos", owner, repo, endpoint, commit_or_ref])?, "*/*")
    }

    fn blob_stream(&self, owner: &str, repo: &str, sha: &str) -> Result<RemoteStream, ClientError> {
        self.get_stream(
            self.endpoint(&["repos", owner, repo, "git", "blobs", sha])?,
            "application/vnd.github.raw",
        )
    }

    fn release_asset_stream(&self, owner: &str, repo: &str, asset_id: u64) -> Result<RemoteStream, ClientError> {
        let asset_id = asset_id.to_string();
        self.get_stream(
            self.endpoint(&["repos", owner, repo, "releases", "assets", asset_id.as_str()])?,
            "application/octet-stream",
        )
    }
}
