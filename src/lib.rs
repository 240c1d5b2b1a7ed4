//! Download verified artifacts from hosted git repositories
//!
//! A reference like `github.com/dpb587/gget@v0.5.0` is resolved to exactly
//! one commit (and the release published for it, if any). Name patterns are
//! then expanded into release assets, source archives or tree blobs, and
//! each match is streamed to disk through a verified pipeline.
//!
//! # Flow
//!
//! ```text
//! Ref ──► Resolver ──► ResolvedSnapshot ──► plan_transfers ──► build_transfer ──► Batch
//!          (tag, branch,     (commit or         (destination     (stage, verify,     (bounded,
//!           commit, latest)   release)           map)             chmod, rename)      fail-fast)
//! ```
//!
//! # Checksums
//!
//! Release notes, `.sha256`-style sidecars and `SHA256SUMS`-style digest lists
//! are discovered from the release's assets. Sidecars and digest lists are
//! only fetched when a matching artifact's checksum is first requested, and
//! never more than once.
//!
//! # Example
//!
//! ```no_run
//! use repofetch::service::github::GitHubClient;
//! use repofetch::service::{LookupRequest, Ref, Resolver};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let client = Arc::new(GitHubClient::new("https://api.github.com", Duration::from_secs(30)));
//! let reference = Ref::parse("dpb587/gget@v0.5.0")?;
//! let _snapshot = Resolver::new(client).resolve(&LookupRequest::new(reference))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod checksum;
pub mod core;
pub mod export;
pub mod service;
pub mod transfer;
