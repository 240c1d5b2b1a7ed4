//! Downloadable resources of a resolved snapshot

use super::client::{ArchiveFormat, RemoteStream, RepositoryClient};
use super::{ClientError, ResourceType};
use crate::checksum::{Algorithm, ChecksumList, ChecksumManager};
use std::fmt;
use std::sync::Arc;

/// How a resource's bytes are fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceOrigin {
    /// A file uploaded to a release.
    Asset { id: u64 },
    /// A source archive generated on request.
    Archive { target: String, format: ArchiveFormat },
    /// A file from the commit tree.
    Blob { sha: String },
}

/// One remote artifact.
///
/// Nothing is fetched until [`Resource::open_stream`] is called. Release
/// assets carry the release's checksum manager; other kinds have none.
#[derive(Clone)]
pub struct Resource {
    name: String,
    size: Option<u64>,
    origin: ResourceOrigin,
    owner: String,
    repository: String,
    client: Arc<dyn RepositoryClient>,
    checksums: Option<Arc<ChecksumManager>>,
}

impl Resource {
    pub(crate) fn new(
        client: Arc<dyn RepositoryClient>,
        owner: &str,
        repository: &str,
        name: &str,
        size: Option<u64>,
        origin: ResourceOrigin,
    ) -> Self {
        Self {
            name: name.to_string(),
            size,
            origin,
            owner: owner.to_string(),
            repository: repository.to_string(),
            client,
            checksums: None,
        }
    }

    pub(crate) fn with_checksums(mut self, manager: Arc<ChecksumManager>) -> Self {
        self.checksums = Some(manager);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size in bytes, when the service reports it up front.
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn origin(&self) -> &ResourceOrigin {
        &self.origin
    }

    pub fn resource_type(&self) -> ResourceType {
        match self.origin {
            ResourceOrigin::Asset { .. } => ResourceType::Asset,
            ResourceOrigin::Archive { .. } => ResourceType::Archive,
            ResourceOrigin::Blob { .. } => ResourceType::Blob,
        }
    }

    pub fn has_checksum_source(&self) -> bool {
        self.checksums.is_some()
    }

    /// Known checksums for this resource in any of `algorithms`.
    ///
    /// May fetch deferred checksum sources on first use.
    pub fn checksums(&self, algorithms: &[Algorithm]) -> ChecksumList {
        match &self.checksums {
            Some(manager) => manager.checksums(&self.name, algorithms),
            None => ChecksumList::new(),
        }
    }

    pub fn open_stream(&self) -> Result<RemoteStream, ClientError> {
        match &self.origin {
            ResourceOrigin::Asset { id } => {
                self.client
                    .release_asset_stream(&self.owner, &self.repository, *id)
            }
            ResourceOrigin::Archive { target, format } => {
                self.client
                    .archive_stream(&self.owner, &self.repository, target, *format)
            }
            ResourceOrigin::Blob { sha } => self.client.blob_stream(&self.owner, &self.repository, sha),
        }
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("origin", &self.origin)
            .field("checksums", &self.checksums.is_some())
            .finish()
    }
}
