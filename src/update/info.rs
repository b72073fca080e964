//! Parsed release metadata.

use crate::error::{Error, Result};
use semver::Version;
use serde::Deserialize;

/// Information about an available release.
///
/// Built once from the version document and never mutated. Two values are
/// equal when their versions are equal.
#[derive(Debug, Clone)]
pub struct UpdateInfo {
    version: Version,
    version_string: String,
    download_url: String,
    notes: String,
    web_url: String,
}

/// Wire shape of the version document.
#[derive(Debug, Deserialize)]
struct VersionDocument {
    version: String,
    #[serde(default, alias = "versionString", alias = "version_string")]
    versionstring: Option<String>,
    #[serde(default, alias = "downloadUrl", alias = "download_url")]
    downloadurl: Option<String>,
    #[serde(default, alias = "webUrl", alias = "web_url")]
    web: Option<String>,
    #[serde(default, alias = "releaseNotes", alias = "release_notes")]
    notes: Option<String>,
}

impl UpdateInfo {
    /// Create release info for `version`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the version cannot be parsed.
    pub fn new(version: &str, download_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            version: parse_version(version)?,
            version_string: version.trim().to_string(),
            download_url: download_url.into(),
            notes: String::new(),
            web_url: String::new(),
        })
    }

    /// Release info known only by its version, e.g. a previously staged installer.
    #[must_use]
    pub fn from_version(version: Version) -> Self {
        Self {
            version_string: version.to_string(),
            version,
            download_url: String::new(),
            notes: String::new(),
            web_url: String::new(),
        }
    }

    /// Set the release notes.
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// Set the release web page.
    #[must_use]
    pub fn with_web_url(mut self, web_url: impl Into<String>) -> Self {
        self.web_url = web_url.into();
        self
    }

    /// Parse a JSON version document.
    ///
    /// No partial value is ever returned: a document without a usable
    /// `version` is rejected as a whole.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the document is malformed.
    pub fn parse_json(body: &[u8]) -> Result<Self> {
        let doc: VersionDocument = serde_json::from_slice(body)?;
        let raw = doc.version.trim();
        if raw.is_empty() {
            return Err(Error::Parse("version document has an empty version".to_string()));
        }

        let version_string = doc
            .versionstring
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| raw.to_string());

        Ok(Self {
            version: parse_version(raw)?,
            version_string,
            download_url: doc.downloadurl.unwrap_or_default(),
            notes: doc.notes.unwrap_or_default(),
            web_url: doc.web.unwrap_or_default(),
        })
    }

    /// The release version.
    #[must_use]
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Human readable version, e.g. "Desktop Client 2.6.0".
    #[must_use]
    pub fn version_string(&self) -> &str {
        &self.version_string
    }

    /// Installer download URL; empty if the release has no installer.
    #[must_use]
    pub fn download_url(&self) -> &str {
        &self.download_url
    }

    /// Release notes.
    #[must_use]
    pub fn notes(&self) -> &str {
        &self.notes
    }

    /// Release web page.
    #[must_use]
    pub fn web_url(&self) -> &str {
        &self.web_url
    }

    /// Whether this release is strictly newer than `running`.
    #[must_use]
    pub fn is_newer_than(&self, running: &Version) -> bool {
        &self.version > running
    }
}

impl PartialEq for UpdateInfo {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
    }
}

impl Eq for UpdateInfo {}

/// Parse a release version leniently.
///
/// Accepts a leading `v`, fills in a missing minor or patch component and
/// ignores numeric components past the patch level (`2.6.0.1234` is
/// `2.6.0`). Anything else must be valid semver.
///
/// # Errors
///
/// Returns [`Error::Parse`] if no version can be recovered.
pub fn parse_version(raw: &str) -> Result<Version> {
    let trimmed = raw.trim().trim_start_matches(['v', 'V']);
    if let Ok(version) = Version::parse(trimmed) {
        return Ok(version);
    }

    let parts: Vec<&str> = trimmed.split('.').collect();
    if parts.is_empty() || parts.len() > 4 {
        return Err(Error::Parse(format!("invalid version '{raw}'")));
    }

    let mut numbers = [0u64; 3];
    for (slot, part) in numbers.iter_mut().zip(parts.iter()) {
        *slot = part
            .parse()
            .map_err(|_| Error::Parse(format!("invalid version '{raw}'")))?;
    }
    if let Some(build) = parts.get(3) {
        build
            .parse::<u64>()
            .map_err(|_| Error::Parse(format!("invalid version '{raw}'")))?;
    }

    Ok(Version::new(numbers[0], numbers[1], numbers[2]))
}
