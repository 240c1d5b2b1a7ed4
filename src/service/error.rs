//! Service error types.

use thiserror::Error;

/// Errors returned by a [`RepositoryClient`](super::RepositoryClient).
///
/// `NotFound` is the only variant a resolution strategy may treat as
/// "does not apply"; everything else aborts resolution.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limit exceeded for {0} (set GITHUB_TOKEN to raise the limit)")]
    RateLimited(String),

    #[error("unexpected HTTP status {code} from {url}")]
    Status { code: u16, url: String },

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("invalid API URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("unsupported by this service: {0}")]
    Unsupported(String),

    #[error("reading response body")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Errors produced while turning a reference into a snapshot.
///
/// `reference` is always the full `server/owner/repository@ref` string.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("invalid repository reference '{input}': {message}")]
    InvalidRef { input: String, message: String },

    #[error("{reference}: unable to resolve as tag, branch, nor commit: {ref_string}")]
    Unresolvable {
        reference: String,
        ref_string: String,
    },

    #[error("{reference}: failed to find release matching constraints: {filters}")]
    NoMatchingRelease { reference: String, filters: String },

    #[error("{reference}: repository not found")]
    RepositoryNotFound { reference: String },

    #[error("{reference}: {operation}")]
    Client {
        reference: String,
        operation: &'static str,
        #[source]
        source: ClientError,
    },
}

/// Errors produced while expanding a name pattern into resources.
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("invalid resource pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("{reference}: {resource_type} resources are not available for {kind}")]
    Unsupported {
        reference: String,
        resource_type: super::ResourceType,
        kind: &'static str,
    },

    #[error("{reference}: {operation}")]
    Client {
        reference: String,
        operation: &'static str,
        #[source]
        source: ClientError,
    },
}
