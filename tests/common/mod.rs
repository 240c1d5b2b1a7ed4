//! Common test utilities: an in-memory repository client.

#![allow(dead_code)]

mod fixtures;
mod streams;

pub use fixtures::*;
pub use streams::*;

use repofetch::service::client::{
    AnnotatedTag, ArchiveFormat, GitRef, Release, ReleasePage, TreeEntry,
};
use repofetch::service::{ClientError, RemoteStream, RepositoryClient, ServiceKind};
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Releases per `list_releases` page.
pub const PAGE_SIZE: usize = 2;

/// Replaces the stream of a release asset: `(asset id, stream) -> stream`.
pub type StreamWrapper = Arc<dyn Fn(u64, RemoteStream) -> RemoteStream + Send + Sync>;

/// A repository held in memory. Every client call is recorded.
#[derive(Default)]
pub struct StubRepository {
    pub tags: HashMap<String, GitRef>,
    pub branches: HashMap<String, GitRef>,
    pub commits: Vec<String>,
    pub annotated: HashMap<String, AnnotatedTag>,
    /// Newest first.
    pub releases: Vec<Release>,
    pub tree: Vec<TreeEntry>,
    pub asset_content: HashMap<u64, Vec<u8>>,
    /// Assets whose stream fails to open.
    pub broken_assets: HashSet<u64>,
    /// Tag lookups fail with HTTP 500 instead of answering.
    pub fail_tag_lookups: bool,
    pub stream_wrapper: Option<StreamWrapper>,

    calls: Mutex<Vec<String>>,
    streams: AtomicUsize,
}

impl StubRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tag(mut self, name: &str, sha: &str) -> Self {
        self.tags.insert(name.to_string(), tag_ref(name, sha));
        self
    }

    pub fn with_annotated_tag(mut self, name: &str, tag_sha: &str, commit: &str) -> Self {
        self.tags.insert(name.to_string(), annotated_tag_ref(name, tag_sha));
        self.annotated.insert(
            tag_sha.to_string(),
            AnnotatedTag {
                name: name.to_string(),
                commit: commit.to_string(),
            },
        );
        self
    }

    pub fn with_branch(mut self, name: &str, sha: &str) -> Self {
        self.branches.insert(name.to_string(), branch_ref(name, sha));
        self
    }

    pub fn with_commit(mut self, sha: &str) -> Self {
        self.commits.push(sha.to_string());
        self
    }

    pub fn with_release(mut self, release: Release) -> Self {
        self.releases.push(release);
        self
    }

    pub fn with_asset_content(mut self, id: u64, content: &[u8]) -> Self {
        self.asset_content.insert(id, content.to_vec());
        self
    }

    pub fn with_broken_asset(mut self, id: u64) -> Self {
        self.broken_assets.insert(id);
        self
    }

    pub fn with_stream_wrapper(
        mut self,
        wrapper: impl Fn(u64, RemoteStream) -> RemoteStream + Send + Sync + 'static,
    ) -> Self {
        self.stream_wrapper = Some(Arc::new(wrapper));
        self
    }

    pub fn with_tree(mut self, tree: Vec<TreeEntry>) -> Self {
        self.tree = tree;
        self
    }

    pub fn into_client(self) -> (Arc<StubRepository>, Arc<dyn RepositoryClient>) {
        let stub = Arc::new(self);
        let client: Arc<dyn RepositoryClient> = stub.clone();
        (stub, client)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called(&self, prefix: &str) -> bool {
        self.calls().iter().any(|call| call.starts_with(prefix))
    }

    /// Number of content streams opened (assets, archives, blobs).
    pub fn streams_opened(&self) -> usize {
        self.streams.load(Ordering::SeqCst)
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn open(&self, content: Vec<u8>) -> RemoteStream {
        self.streams.fetch_add(1, Ordering::SeqCst);
        Box::new(Cursor::new(content))
    }
}

fn not_found(what: impl Into<String>) -> ClientError {
    ClientError::NotFound(what.into())
}

impl RepositoryClient for StubRepository {
    fn service_kind(&self) -> ServiceKind {
        ServiceKind::GitHub
    }

    fn tag_ref(&self, _owner: &str, _repo: &str, name: &str) -> Result<GitRef, ClientError> {
        self.record(format!("tag_ref {}", name));
        if self.fail_tag_lookups {
            return Err(ClientError::Status {
                code: 500,
                url: format!("stub://git/ref/tags/{}", name),
            });
        }
        self.tags.get(name).cloned().ok_or_else(|| not_found(name))
    }

    fn branch_ref(&self, _owner: &str, _repo: &str, name: &str) -> Result<GitRef, ClientError> {
        self.record(format!("branch_ref {}", name));
        self.branches.get(name).cloned().ok_or_else(|| not_found(name))
    }

    fn commit(&self, _owner: &str, _repo: &str, hash_or_prefix: &str) -> Result<String, ClientError> {
        self.record(format!("commit {}", hash_or_prefix));
        let matches: Vec<&String> = self
            .commits
            .iter()
            .filter(|sha| sha.starts_with(hash_or_prefix))
            .collect();
        match matches.as_slice() {
            [only] => Ok(only.to_string()),
            _ => Err(not_found(hash_or_prefix)),
        }
    }

    fn list_releases(&self, _owner: &str, _repo: &str, page: u32) -> Result<ReleasePage, ClientError> {
        self.record(format!("list_releases {}", page));
        let start = (page.max(1) as usize - 1) * PAGE_SIZE;
        let releases: Vec<Release> = self.releases.iter().skip(start).take(PAGE_SIZE).cloned().collect();
        let next_page = (start + PAGE_SIZE < self.releases.len()).then_some(page + 1);
        Ok(ReleasePage { releases, next_page })
    }

    fn latest_release(&self, _owner: &str, _repo: &str) -> Result<Release, ClientError> {
        self.record("latest_release".to_string());
        self.releases.first().cloned().ok_or_else(|| not_found("latest release"))
    }

    fn release_by_tag(&self, _owner: &str, _repo: &str, tag: &str) -> Result<Release, ClientError> {
        self.record(format!("release_by_tag {}", tag));
        self.releases
            .iter()
            .find(|release| release.tag_name == tag)
            .cloned()
            .ok_or_else(|| not_found(tag))
    }

    fn tree(&self, _owner: &str, _repo: &str, commit: &str, _recursive: bool) -> Result<Vec<TreeEntry>, ClientError> {
        self.record(format!("tree {}", commit));
        Ok(self.tree.clone())
    }

    fn annotated_tag(&self, _owner: &str, _repo: &str, sha: &str) -> Result<AnnotatedTag, ClientError> {
        self.record(format!("annotated_tag {}", sha));
        self.annotated.get(sha).cloned().ok_or_else(|| not_found(sha))
    }

    fn archive_stream(
        &self,
        _owner: &str,
        _repo: &str,
        commit_or_ref: &str,
        format: ArchiveFormat,
    ) -> Result<RemoteStream, ClientError> {
        self.record(format!("archive_stream {} {}", commit_or_ref, format.extension()));
        Ok(self.open(format!("archive of {}", commit_or_ref).into_bytes()))
    }

    fn blob_stream(&self, _owner: &str, _repo: &str, sha: &str) -> Result<RemoteStream, ClientError> {
        self.record(format!("blob_stream {}", sha));
        Ok(self.open(format!("blob {}", sha).into_bytes()))
    }

    fn release_asset_stream(&self, _owner: &str, _repo: &str, asset_id: u64) -> Result<RemoteStream, ClientError> {
        self.record(format!("release_asset_stream {}", asset_id));
        if self.broken_assets.contains(&asset_id) {
            return Err(ClientError::Transport {
                url: format!("stub://releases/assets/{}", asset_id),
                message: "connection reset".to_string(),
            });
        }
        let content = self
            .asset_content
            .get(&asset_id)
            .cloned()
            .ok_or_else(|| not_found(format!("asset {}", asset_id)))?;
        let stream = self.open(content);
        Ok(match &self.stream_wrapper {
            Some(wrap) => wrap(asset_id, stream),
            None => stream,
        })
    }
}
