//! Test fixtures - refs, releases and commit hashes.

#![allow(dead_code)]

use repofetch::service::client::{GitRef, ObjectKind, Release, ReleaseAsset, TreeEntry, TreeEntryKind};

pub const COMMIT_A: &str = "abc1234def5678abc1234def5678abc1234def56";
pub const COMMIT_B: &str = "0f1e2d3c4b5a69780f1e2d3c4b5a69780f1e2d3c";
pub const COMMIT_C: &str = "5555aaaa5555aaaa5555aaaa5555aaaa5555aaaa";

pub fn tag_ref(name: &str, sha: &str) -> GitRef {
    GitRef {
        name: format!("refs/tags/{}", name),
        object: ObjectKind::Commit,
        sha: sha.to_string(),
    }
}

pub fn annotated_tag_ref(name: &str, tag_sha: &str) -> GitRef {
    GitRef {
        name: format!("refs/tags/{}", name),
        object: ObjectKind::Tag,
        sha: tag_sha.to_string(),
    }
}

pub fn branch_ref(name: &str, sha: &str) -> GitRef {
    GitRef {
        name: format!("refs/heads/{}", name),
        object: ObjectKind::Commit,
        sha: sha.to_string(),
    }
}

pub fn asset(id: u64, name: &str, size: u64) -> ReleaseAsset {
    ReleaseAsset {
        id,
        name: name.to_string(),
        size,
    }
}

pub fn release(id: u64, tag: &str, prerelease: bool, assets: Vec<ReleaseAsset>) -> Release {
    Release {
        id,
        tag_name: tag.to_string(),
        name: Some(tag.to_string()),
        body: String::new(),
        prerelease,
        published_at: Some("2024-05-01T12:00:00Z".to_string()),
        assets,
    }
}

pub fn blob(path: &str, sha: &str, size: u64) -> TreeEntry {
    TreeEntry {
        path: path.to_string(),
        kind: TreeEntryKind::Blob,
        sha: sha.to_string(),
        size: Some(size),
    }
}

pub fn tree_dir(path: &str, sha: &str) -> TreeEntry {
    TreeEntry {
        path: path.to_string(),
        kind: TreeEntryKind::Tree,
        sha: sha.to_string(),
        size: None,
    }
}

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(repofetch::checksum::Algorithm::Sha256.digest(data))
}
