//! Published version metadata for a single package
//!
//! A `VersionSet` is the immutable view of what the registry knows about
//! one package: the ordered list of published versions, the dist-tag map
//! and which versions are deprecated. It is built once per fetch, owned
//! by the resolution cache, and handed to the resolver read-only.

use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Immutable published-version view of one package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSet {
    /// Package name
    pub name: String,
    /// Published versions, ascending semver order
    versions: Vec<String>,
    /// dist-tag → version
    dist_tags: BTreeMap<String, String>,
    /// Versions flagged deprecated by the registry
    deprecated: BTreeSet<String>,
}

impl VersionSet {
    /// Build a VersionSet; version strings that do not parse as semver
    /// are dropped, the rest are sorted ascending.
    pub fn new(
        name: impl Into<String>,
        versions: Vec<String>,
        dist_tags: BTreeMap<String, String>,
        deprecated: BTreeSet<String>,
    ) -> Self {
        let mut parsed: Vec<Version> = versions
            .iter()
            .filter_map(|s| Version::parse(s).ok())
            .collect();
        parsed.sort();
        Self {
            name: name.into(),
            versions: parsed.into_iter().map(|v| v.to_string()).collect(),
            dist_tags,
            deprecated,
        }
    }

    /// All published versions, parsed, ascending
    pub fn versions(&self) -> impl Iterator<Item = Version> + '_ {
        self.versions.iter().filter_map(|s| Version::parse(s).ok())
    }

    /// Number of published versions
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    /// True if no versions are published
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Maximum published version, optionally considering prereleases
    pub fn max_version(&self, include_prerelease: bool) -> Option<Version> {
        self.versions()
            .filter(|v| include_prerelease || v.pre.is_empty())
            .max()
    }

    /// Version a dist-tag points at, if the tag exists and parses
    pub fn version_at_tag(&self, tag: &str) -> Option<Version> {
        self.dist_tags
            .get(tag)
            .and_then(|s| Version::parse(s).ok())
    }

    /// True if the exact version string is flagged deprecated
    pub fn is_deprecated(&self, v: &Version) -> bool {
        self.deprecated.contains(&v.to_string())
    }

    /// The dist-tag map (read-only)
    pub fn dist_tags(&self) -> &BTreeMap<String, String> {
        &self.dist_tags
    }
}
