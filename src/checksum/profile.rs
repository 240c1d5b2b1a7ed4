//! Which checksums to look for and which of them to verify

use super::{Algorithm, Checksum, ChecksumError, ChecksumList};

/// Reduces the checksums found for an artifact to the ones actually verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumSelector {
    /// Verify only the strongest algorithm present.
    #[default]
    Strongest,
    /// Verify every checksum found.
    All,
}

impl ChecksumSelector {
    pub fn select(&self, found: &ChecksumList) -> Vec<Checksum> {
        match self {
            Self::Strongest => found.strongest().cloned().into_iter().collect(),
            Self::All => {
                let mut all: Vec<_> = found.iter().cloned().collect();
                all.sort_by_key(Checksum::algorithm);
                all
            }
        }
    }
}

/// Verification policy derived from `--verify-checksum` values.
///
/// An empty `acceptable` list disables verification entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationProfile {
    pub acceptable: Vec<Algorithm>,
    pub required: bool,
    pub selector: ChecksumSelector,
}

impl Default for VerificationProfile {
    fn default() -> Self {
        Self {
            acceptable: Algorithm::BY_STRENGTH.to_vec(),
            required: false,
            selector: ChecksumSelector::Strongest,
        }
    }
}

impl VerificationProfile {
    /// A profile that never verifies anything.
    pub fn disabled() -> Self {
        Self {
            acceptable: Vec::new(),
            required: false,
            selector: ChecksumSelector::Strongest,
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.acceptable.is_empty()
    }

    /// Parse option values.
    ///
    /// `required` and `all` are modifiers. `auto` and `none` are standalone
    /// and may not be combined with each other. `<algo>` and `<algo>-min`
    /// narrow the acceptable set and imply `required`.
    pub fn parse<S: AsRef<str>>(values: &[S]) -> Result<Self, ChecksumError> {
        let mut profile = Self::disabled();
        let mut standalone = Vec::new();
        let mut custom = false;

        for value in values {
            let value = value.as_ref();
            match value {
                "required" => profile.required = true,
                "all" => profile.selector = ChecksumSelector::All,
                "auto" => standalone.push(value),
                "none" => {
                    profile.acceptable.clear();
                    standalone.push(value);
                    custom = true;
                }
                _ => {
                    let added = match value.strip_suffix("-min") {
                        Some(algorithm) => algorithm.parse::<Algorithm>()?.at_least(),
                        None => vec![value.parse::<Algorithm>()?],
                    };
                    for algorithm in added {
                        if !profile.acceptable.contains(&algorithm) {
                            profile.acceptable.push(algorithm);
                        }
                    }
                    profile.required = true;
                    custom = true;
                }
            }
        }

        if standalone.len() > 1 {
            return Err(ChecksumError::ConflictingProfile(standalone.join(", ")));
        }

        if !custom {
            profile.acceptable = Algorithm::BY_STRENGTH.to_vec();
        }

        profile.acceptable.sort();
        Ok(profile)
    }

    /// Select the checksums to verify from what the sources found.
    ///
    /// Fails when verification is required and nothing acceptable was found.
    pub fn select(&self, subject: &str, found: &ChecksumList) -> Result<Vec<Checksum>, ChecksumError> {
        if self.is_disabled() {
            return Ok(Vec::new());
        }

        let selected = self.selector.select(&found.filter(&self.acceptable));
        if selected.is_empty() && self.required {
            return Err(ChecksumError::Required(subject.to_string()));
        }

        Ok(selected)
    }
}
