//! Checksum text parsers
//!
//! Release notes and digest-list files share one line convention:
//! `<hex-digest> <whitespace> <filename>`. Lines that don't look like that,
//! or whose digest length doesn't map to a known algorithm, are skipped.

use super::Checksum;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

static CHECKSUM_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^([a-f0-9]{16,128})\s+(\S+)$").expect("valid regex"));

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```([^`]+)```").expect("valid regex"));

static CODE_INDENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)^ {4}([a-f0-9]{16,128})[ \t]+(\S+)[ \t]*$").expect("valid regex")
});

/// Parse a single `<digest>  <filename>` line.
///
/// A leading `*` on the filename (binary mode marker from `sha256sum -b`)
/// is dropped.
pub fn parse_line(line: &str) -> Option<(String, Checksum)> {
    let captures = CHECKSUM_LINE.captures(line.trim())?;
    let digest = &captures[1];
    let name = captures[2].trim_start_matches('*');
    if name.is_empty() {
        return None;
    }

    match Checksum::guess_hex(digest) {
        Ok(checksum) => Some((name.to_string(), checksum)),
        Err(e) => {
            debug!(line, error = %e, "ignoring checksum-like line");
            None
        }
    }
}

/// Parse every checksum line of a digest-list file.
pub fn parse_lines(content: &str) -> Vec<(String, Checksum)> {
    content.lines().filter_map(parse_line).collect()
}

/// Parse a per-file sidecar. The filename column is optional here since
/// the sidecar's own name already identifies the subject.
pub fn parse_sidecar(content: &str) -> Vec<Checksum> {
    content
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter_map(|token| Checksum::guess_hex(token).ok())
        .collect()
}

/// Extract checksums from fenced (```) and four-space indented blocks of
/// free-text release notes.
pub fn parse_release_notes(notes: &str) -> Vec<(String, Checksum)> {
    let mut found = Vec::new();

    for fence in CODE_FENCE.captures_iter(notes) {
        found.extend(parse_lines(&fence[1]));
    }

    for indented in CODE_INDENT.captures_iter(notes) {
        if let Ok(checksum) = Checksum::guess_hex(&indented[1]) {
            found.push((indented[2].to_string(), checksum));
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::Algorithm;

    const DARWIN: &str = "bc894542e78dace00fc0357d4c591cc1e2193877636ad5b9da3c5dfc9b790320";
    const LINUX: &str = "9b0731100e631ca92d5f6979f30e3e3cc275c84f466647462d7afa0819801348";

    fn find<'a>(found: &'a [(String, Checksum)], name: &str) -> Option<&'a Checksum> {
        found.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    #[test]
    fn test_parse_line() {
        let (name, checksum) = parse_line(&format!("{}  tool-linux", LINUX)).unwrap();
        assert_eq!(name, "tool-linux");
        assert_eq!(checksum.algorithm(), Algorithm::Sha256);
        assert_eq!(checksum.to_hex(), LINUX);
    }

    #[test]
    fn test_parse_line_binary_marker() {
        let (name, _) = parse_line(&format!("{} *tool.tar.gz", LINUX)).unwrap();
        assert_eq!(name, "tool.tar.gz");
    }

    #[test]
    fn test_parse_line_rejects_noise() {
        assert!(parse_line("").is_none());
        assert!(parse_line("some prose here").is_none());
        assert!(parse_line("abc123  short-token").is_none());
        assert!(parse_line(&format!("{}  a  b", LINUX)).is_none());
        // 18 hex bytes is in range for the pattern but not a known algorithm
        assert!(parse_line(&format!("{}  file", "ab".repeat(18))).is_none());
    }

    #[test]
    fn test_parse_lines_mixed_algorithms() {
        let content = format!(
            "{}  a.tar.gz\n{}  b.tar.gz\n\nnot a checksum\n",
            "5eb63bbbe01eeed093cb22bb8f5acdc3", LINUX
        );
        let found = parse_lines(&content);
        assert_eq!(found.len(), 2);
        assert_eq!(find(&found, "a.tar.gz").unwrap().algorithm(), Algorithm::Md5);
        assert_eq!(find(&found, "b.tar.gz").unwrap().algorithm(), Algorithm::Sha256);
    }

    #[test]
    fn test_release_notes_code_fence() {
        let notes = [
            "dear release note readers. here are your checksums",
            "```",
            &format!("{}  gget-0.1.1-darwin-amd64", DARWIN),
            &format!("{}  gget-0.1.1-linux-amd64", LINUX),
            "```",
        ]
        .join("\n");

        let found = parse_release_notes(&notes);
        assert_eq!(find(&found, "gget-0.1.1-darwin-amd64").unwrap().to_hex(), DARWIN);
        assert_eq!(find(&found, "gget-0.1.1-linux-amd64").unwrap().to_hex(), LINUX);
    }

    #[test]
    fn test_release_notes_code_fence_ignores_other_blocks() {
        let notes = [
            "dear release note readers. here are your checksums",
            "",
            "```",
            "other",
            "```",
            "",
            "some other note",
            "",
            "```",
            &format!("{}  gget-0.1.1-darwin-amd64", DARWIN),
            "```",
        ]
        .join("\n");

        let found = parse_release_notes(&notes);
        assert_eq!(found.len(), 1);
        assert_eq!(find(&found, "gget-0.1.1-darwin-amd64").unwrap().to_hex(), DARWIN);
    }

    #[test]
    fn test_release_notes_code_indent() {
        let notes = [
            "dear release note readers. here are your checksums",
            "",
            "    other",
            "",
            "some other note",
            "",
            &format!("    {}  gget-0.1.1-darwin-amd64", DARWIN),
            &format!("    {}  gget-0.1.1-linux-amd64", LINUX),
        ]
        .join("\n");

        let found = parse_release_notes(&notes);
        assert_eq!(found.len(), 2);
        assert_eq!(find(&found, "gget-0.1.1-linux-amd64").unwrap().to_hex(), LINUX);
    }

    #[test]
    fn test_release_notes_prose_digest_ignored() {
        let notes = format!("The sha256 of the tarball is {} tool.tar.gz", LINUX);
        assert!(parse_release_notes(&notes).is_empty());
    }

    #[test]
    fn test_parse_sidecar_bare_and_named() {
        assert_eq!(parse_sidecar(&format!("{}\n", LINUX)).len(), 1);
        let found = parse_sidecar(&format!("{}  some-other-name.tar.gz\n", LINUX));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].to_hex(), LINUX);
        assert!(parse_sidecar("not a digest\n").is_empty());
    }
}
