//! Reports describing a resolved ref and its matched resources.

use crate::checksum::VerificationProfile;
use crate::service::{Ref, Resource, ServiceKind, Snapshot};
use serde::Serialize;
use std::borrow::Cow;
use std::io::{self, Write};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Tab-separated `kind<TAB>key<TAB>value` lines.
    Plain,
    Json,
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plain" => Ok(Self::Plain),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown export format '{}' (expected plain, json)", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportOrigin {
    #[serde(rename = "string")]
    pub resolved: String,
    pub service: String,
    pub server: String,
    pub owner: String,
    pub repository: String,
    #[serde(rename = "ref")]
    pub ref_string: String,
}

impl ExportOrigin {
    fn new(reference: &Ref, service: ServiceKind) -> Self {
        Self {
            resolved: reference.to_string(),
            service: service.to_string(),
            server: reference.server.clone(),
            owner: reference.owner.clone(),
            repository: reference.repository.clone(),
            ref_string: reference.ref_string.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportMetadatum {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportChecksum {
    pub algo: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportResource {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub checksums: Vec<ExportChecksum>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportData {
    pub origin: ExportOrigin,
    pub metadata: Vec<ExportMetadatum>,
    pub resources: Vec<ExportResource>,
}

impl ExportData {
    /// Collect everything reported about `snapshot`.
    ///
    /// Checksums are the ones the profile would select, without enforcing
    /// `required`; this may load deferred checksum sources.
    pub fn collect<'a>(
        snapshot: &dyn Snapshot,
        service: ServiceKind,
        resources: impl IntoIterator<Item = &'a Resource>,
        profile: &VerificationProfile,
    ) -> Self {
        let mut metadata: Vec<ExportMetadatum> = snapshot
            .metadata()
            .iter()
            .map(|entry| ExportMetadatum {
                key: entry.name.clone(),
                value: entry.value.clone(),
            })
            .collect();
        metadata.sort_by(|a, b| a.key.cmp(&b.key));

        let mut resources: Vec<ExportResource> = resources
            .into_iter()
            .map(|resource| ExportResource {
                name: resource.name().to_string(),
                size: resource.size(),
                checksums: selected_checksums(resource, profile),
            })
            .collect();
        resources.sort_by(|a, b| a.name.cmp(&b.name));

        Self {
            origin: ExportOrigin::new(snapshot.canonical_ref(), service),
            metadata,
            resources,
        }
    }

    /// Plain output is one tab-separated record per line; backslash,
    /// newline, carriage return and tab inside a field are escaped.
    pub fn write(&self, format: ExportFormat, mut w: impl Write) -> io::Result<()> {
        match format {
            ExportFormat::Plain => self.write_plain(&mut w),
            ExportFormat::Json => {
                serde_json::to_writer_pretty(&mut w, self)?;
                writeln!(w)
            }
        }
    }

    fn write_plain(&self, w: &mut impl Write) -> io::Result<()> {
        let origin = &self.origin;
        writeln!(w, "origin\tresolved\t{}", origin.resolved)?;
        writeln!(w, "origin\tservice\t{}", origin.service)?;
        writeln!(w, "origin\tserver\t{}", origin.server)?;
        writeln!(w, "origin\towner\t{}", origin.owner)?;
        writeln!(w, "origin\trepository\t{}", origin.repository)?;
        writeln!(w, "origin\tref\t{}", origin.ref_string)?;

        for metadatum in &self.metadata {
            writeln!(w, "metadata\t{}\t{}", escape(&metadatum.key), escape(&metadatum.value))?;
        }

        for resource in &self.resources {
            let name = escape(&resource.name);
            writeln!(w, "resource-name\t{}", name)?;
            if let Some(size) = resource.size {
                writeln!(w, "resource-size\t{}\t{}", name, size)?;
            }
            for checksum in &resource.checksums {
                writeln!(
                    w,
                    "resource-checksum\t{}\t{}\t{}",
                    name, checksum.algo, checksum.data
                )?;
            }
        }

        Ok(())
    }
}

/// Keep a plain field on one line and inside its column.
fn escape(value: &str) -> Cow<'_, str> {
    if !value.contains(['\\', '\n', '\r', '\t']) {
        return Cow::Borrowed(value);
    }

    let mut escaped = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            c => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

fn selected_checksums(resource: &Resource, profile: &VerificationProfile) -> Vec<ExportChecksum> {
    if profile.is_disabled() {
        return Vec::new();
    }

    let found = resource.checksums(&profile.acceptable).filter(&profile.acceptable);
    profile
        .selector
        .select(&found)
        .into_iter()
        .map(|checksum| ExportChecksum {
            algo: checksum.algorithm().to_string(),
            data: checksum.to_hex(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ExportData {
        ExportData {
            origin: ExportOrigin::new(&Ref::new("github.com", "dpb587", "gget", "v0.5.0"), ServiceKind::GitHub),
            metadata: vec![ExportMetadatum {
                key: "commit".to_string(),
                value: "abc123".to_string(),
            }],
            resources: vec![
                ExportResource {
                    name: "gget-linux-amd64".to_string(),
                    size: Some(42),
                    checksums: vec![ExportChecksum {
                        algo: "sha256".to_string(),
                        data: "00ff".to_string(),
                    }],
                },
                ExportResource {
                    name: "source.tar.gz".to_string(),
                    size: None,
                    checksums: Vec::new(),
                },
            ],
        }
    }

    #[test]
    fn test_export_format_from_str() {
        assert_eq!("plain".parse::<ExportFormat>().unwrap(), ExportFormat::Plain);
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!("yaml".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_plain_export() {
        let mut out = Vec::new();
        sample().write(ExportFormat::Plain, &mut out).unwrap();
        let out = String::from_utf8(out).unwrap();

        let expected = "\
origin\tresolved\tgithub.com/dpb587/gget@v0.5.0
origin\tservice\tgithub
origin\tserver\tgithub.com
origin\towner\tdpb587
origin\trepository\tgget
origin\tref\tv0.5.0
metadata\tcommit\tabc123
resource-name\tgget-linux-amd64
resource-size\tgget-linux-amd64\t42
resource-checksum\tgget-linux-amd64\tsha256\t00ff
resource-name\tsource.tar.gz
";
        assert_eq!(out, expected);
    }

    #[test]
    fn test_plain_export_keeps_one_record_per_line() {
        let mut data = sample();
        data.metadata = vec![ExportMetadatum {
            key: "github-release-body".to_string(),
            value: "## Changes\r\n\n* fix\tthing\nC:\\path".to_string(),
        }];
        data.resources.clear();

        let mut out = Vec::new();
        data.write(ExportFormat::Plain, &mut out).unwrap();
        let out = String::from_utf8(out).unwrap();

        let line = out.lines().find(|l| l.starts_with("metadata\t")).unwrap();
        assert_eq!(
            line,
            "metadata\tgithub-release-body\t## Changes\\r\\n\\n* fix\\tthing\\nC:\\\\path"
        );
        assert_eq!(line.split('\t').count(), 3);
        assert_eq!(out.lines().count(), 7);
    }

    #[test]
    fn test_json_export_omits_empty_fields() {
        let mut out = Vec::new();
        sample().write(ExportFormat::Json, &mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();

        assert_eq!(value["origin"]["string"], "github.com/dpb587/gget@v0.5.0");
        assert_eq!(value["origin"]["ref"], "v0.5.0");
        assert_eq!(value["metadata"][0]["key"], "commit");
        assert_eq!(value["resources"][0]["checksums"][0]["algo"], "sha256");
        assert!(value["resources"][1].get("size").is_none());
        assert!(value["resources"][1].get("checksums").is_none());
    }
}
