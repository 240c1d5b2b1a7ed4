//! Turning user requests into transfers
//!
//! Requests use the `[LOCAL-PATH=]RESOURCE-GLOB` syntax. Every matched
//! resource gets exactly one destination; two resources landing on the same
//! path is rejected here, before anything touches the network.

use super::step::{Executable, Rename, TempFileTarget, VerifyChecksum, WriterTarget};
use super::{PlanError, Step, Transfer, TransferTarget};
use crate::checksum::VerificationProfile;
use crate::service::{NamePattern, Resource, ResourceType, Snapshot};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Destination meaning standard output.
pub const STDOUT_PATH: &str = "-";

/// One `[LOCAL-PATH=]RESOURCE-GLOB` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub pattern: NamePattern,
    /// Empty means "use the remote name"; a trailing `/` means "into this
    /// directory"; `-` means stdout.
    pub local_path: String,
}

impl TransferRequest {
    pub fn parse(input: &str) -> Result<Self, PlanError> {
        let (local_path, glob) = match input.split_once('=') {
            Some((local, glob)) => (local, glob),
            None => ("", input),
        };

        if glob.is_empty() {
            return Err(PlanError::InvalidRequest {
                input: input.to_string(),
                message: "resource glob must not be empty".to_string(),
            });
        }

        let pattern = NamePattern::new(glob).map_err(|e| PlanError::InvalidRequest {
            input: input.to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            pattern,
            local_path: local_path.to_string(),
        })
    }

    /// Request for every resource, written under its remote name.
    pub fn all() -> Self {
        Self {
            pattern: NamePattern::any(),
            local_path: String::new(),
        }
    }

    pub fn is_stdout(&self) -> bool {
        self.local_path == STDOUT_PATH
    }

    /// Local destination for a resource this request matched.
    pub fn destination(&self, remote_name: &str) -> String {
        if self.local_path.is_empty() {
            remote_name.to_string()
        } else if self.local_path.ends_with('/') {
            Path::new(&self.local_path)
                .join(remote_name)
                .to_string_lossy()
                .into_owned()
        } else {
            self.local_path.clone()
        }
    }
}

impl FromStr for TransferRequest {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// How requests are matched and where their results go.
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    pub resource_type: ResourceType,
    /// Resources whose names match are dropped.
    pub exclude: Vec<NamePattern>,
    /// Requests whose glob matches one of these may match nothing.
    pub ignore_missing: Vec<NamePattern>,
    /// Send requests without an explicit local path to stdout.
    pub stdout: bool,
    /// Directory prefixed to every non-stdout destination.
    pub cd: Option<PathBuf>,
}

impl PlanOptions {
    /// Apply `--stdout` and `--cd` to the raw requests.
    fn normalize(&self, requests: &[TransferRequest]) -> Vec<TransferRequest> {
        let mut requests = if requests.is_empty() {
            vec![TransferRequest::all()]
        } else {
            requests.to_vec()
        };

        for request in &mut requests {
            if self.stdout && request.local_path.is_empty() {
                request.local_path = STDOUT_PATH.to_string();
            }

            if let Some(cd) = &self.cd {
                if request.is_stdout() {
                    continue;
                }

                // Keep the trailing separator so the remote name is still appended.
                let mut joined = cd.join(&request.local_path).to_string_lossy().into_owned();
                if (request.local_path.is_empty() || request.local_path.ends_with('/'))
                    && !joined.ends_with('/')
                {
                    joined.push('/');
                }
                request.local_path = joined;
            }
        }

        requests
    }

    fn is_excluded(&self, name: &str) -> bool {
        self.exclude.iter().any(|pattern| pattern.matches(name))
    }

    fn may_be_missing(&self, request: &TransferRequest) -> bool {
        self.ignore_missing
            .iter()
            .any(|pattern| pattern.matches(request.pattern.as_str()))
    }
}

/// A matched resource and the destination it will be written to.
#[derive(Debug, Clone)]
pub struct PlannedResource {
    pub destination: String,
    pub resource: Resource,
}

/// Expand every request against the snapshot into a destination map.
///
/// Results are sorted by resource name. No remote streams are opened.
pub fn plan_transfers(
    snapshot: &dyn Snapshot,
    requests: &[TransferRequest],
    options: &PlanOptions,
) -> Result<Vec<PlannedResource>, PlanError> {
    let mut planned: BTreeMap<String, Resource> = BTreeMap::new();

    for request in options.normalize(requests) {
        let candidates = snapshot.resolve_resources(options.resource_type, &request.pattern)?;

        if candidates.is_empty() {
            if options.may_be_missing(&request) {
                debug!(pattern = %request.pattern, "no match, ignored");
                continue;
            }

            return Err(PlanError::NoMatch(request.pattern.to_string()));
        }

        for resource in candidates {
            if options.is_excluded(resource.name()) {
                debug!(resource = resource.name(), "excluded");
                continue;
            }

            let destination = request.destination(resource.name());
            if planned.contains_key(&destination) {
                return Err(PlanError::DuplicateTarget(destination));
            }

            planned.insert(destination, resource);
        }
    }

    let mut planned: Vec<PlannedResource> = planned
        .into_iter()
        .map(|(destination, resource)| PlannedResource {
            destination,
            resource,
        })
        .collect();
    planned.sort_by(|a, b| a.resource.name().cmp(b.resource.name()));

    Ok(planned)
}

/// Per-transfer behavior applied when building the step list.
#[derive(Debug, Clone, Default)]
pub struct TransferOptions {
    /// Resources whose names match are marked executable.
    pub executable: Vec<NamePattern>,
    pub verification: VerificationProfile,
}

impl TransferOptions {
    fn is_executable(&self, name: &str) -> bool {
        self.executable.iter().any(|pattern| pattern.matches(name))
    }
}

/// Build the step pipeline for one planned resource.
///
/// Checksums are looked up here, so a required checksum that cannot be
/// found fails before any download starts.
pub fn build_transfer(planned: PlannedResource, options: &TransferOptions) -> Result<Transfer, PlanError> {
    let PlannedResource {
        destination,
        resource,
    } = planned;
    let target = TransferTarget::from_destination(&destination);
    let mut steps: Vec<Box<dyn Step>> = Vec::new();

    match &target {
        TransferTarget::Stdout => steps.push(Box::new(WriterTarget::stdout())),
        TransferTarget::File(path) => {
            let dir = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            };
            steps.push(Box::new(TempFileTarget::new(dir)));
        }
    }

    let profile = &options.verification;
    if !profile.is_disabled() {
        let found = resource.checksums(&profile.acceptable);
        let selected = profile
            .select(resource.name(), &found)
            .map_err(|source| PlanError::Checksum {
                subject: resource.name().to_string(),
                source,
            })?;

        for checksum in selected {
            steps.push(Box::new(VerifyChecksum::new(checksum.verifier())));
        }
    }

    if let TransferTarget::File(path) = &target {
        if options.is_executable(resource.name()) {
            steps.push(Box::new(Executable));
        }
        steps.push(Box::new(Rename::new(path.clone())));
    }

    Ok(Transfer::new(resource, target, steps))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(input: &str) -> TransferRequest {
        TransferRequest::parse(input).unwrap()
    }

    // ==================== TransferRequest ====================

    #[test]
    fn test_parse_glob_only() {
        let r = request("*.tar.gz");
        assert_eq!(r.pattern.as_str(), "*.tar.gz");
        assert_eq!(r.local_path, "");
        assert!(!r.is_stdout());
    }

    #[test]
    fn test_parse_local_path() {
        let r = request("bin/tool=tool-linux-amd64");
        assert_eq!(r.pattern.as_str(), "tool-linux-amd64");
        assert_eq!(r.local_path, "bin/tool");
    }

    #[test]
    fn test_parse_stdout() {
        assert!(request("-=checksums.txt").is_stdout());
    }

    #[test]
    fn test_parse_rejects_empty_glob() {
        assert!(matches!(
            TransferRequest::parse("out="),
            Err(PlanError::InvalidRequest { .. })
        ));
        assert!(TransferRequest::parse("").is_err());
    }

    #[test]
    fn test_parse_rejects_bad_glob() {
        let err = TransferRequest::parse("[").unwrap_err();
        assert!(err.to_string().contains("invalid transfer request '['"));
    }

    #[test]
    fn test_destination_rules() {
        assert_eq!(request("*").destination("tool.tgz"), "tool.tgz");
        assert_eq!(request("dl/=*").destination("tool.tgz"), "dl/tool.tgz");
        assert_eq!(request("renamed=*").destination("tool.tgz"), "renamed");
        assert_eq!(request("-=*").destination("tool.tgz"), "-");
    }

    // ==================== PlanOptions ====================

    #[test]
    fn test_normalize_defaults_to_everything() {
        let requests = PlanOptions::default().normalize(&[]);
        assert_eq!(requests, vec![TransferRequest::all()]);
    }

    #[test]
    fn test_normalize_stdout_only_fills_empty_paths() {
        let options = PlanOptions {
            stdout: true,
            ..Default::default()
        };
        let requests = options.normalize(&[request("*.txt"), request("keep=*.bin")]);
        assert_eq!(requests[0].local_path, "-");
        assert_eq!(requests[1].local_path, "keep");
    }

    #[test]
    fn test_normalize_cd_prefix() {
        let options = PlanOptions {
            cd: Some(PathBuf::from("/tmp/out")),
            ..Default::default()
        };
        let requests = options.normalize(&[request("*.txt"), request("x/=*.bin"), request("-=*.sh"), request("name=*.gz")]);

        assert_eq!(requests[0].destination("a.txt"), "/tmp/out/a.txt");
        assert_eq!(requests[1].destination("b.bin"), "/tmp/out/x/b.bin");
        assert_eq!(requests[2].destination("c.sh"), "-");
        assert_eq!(requests[3].destination("d.gz"), "/tmp/out/name");
    }

    #[test]
    fn test_ignore_missing_matches_request_glob() {
        let options = PlanOptions {
            ignore_missing: vec![NamePattern::new("*.sig").unwrap()],
            ..Default::default()
        };
        assert!(options.may_be_missing(&request("tool.sig")));
        assert!(!options.may_be_missing(&request("tool.tgz")));
    }
}
