//! Upgrade decision types
//!
//! One `UpgradeDecision` is produced per dependency by the resolver and
//! consumed by the engine; it is never mutated after creation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reason a dependency was left unchanged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Already at the selected target version
    UpToDate,
    /// Candidate would move the release triple backwards
    WouldDowngrade,
    /// No published version fits the policy and prerelease rules
    NoSuitableVersion,
    /// Specifier is not a semver range (file:, git, comment entry, ...)
    Unparseable,
    /// Manifest value was not a plain string
    NotAString,
    /// Excluded by a name filter
    NameFiltered,
    /// Excluded by a version filter against the current specifier
    VersionFiltered,
    /// Registry fetch failed or timed out; degraded to "no change"
    FetchFailed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UpToDate => write!(f, "up to date"),
            SkipReason::WouldDowngrade => write!(f, "candidate would downgrade"),
            SkipReason::NoSuitableVersion => write!(f, "no suitable version"),
            SkipReason::Unparseable => write!(f, "specifier is not a semver range"),
            SkipReason::NotAString => write!(f, "manifest value is not a string"),
            SkipReason::NameFiltered => write!(f, "excluded by name filter"),
            SkipReason::VersionFiltered => write!(f, "excluded by version filter"),
            SkipReason::FetchFailed(msg) => write!(f, "fetch failed: {}", msg),
        }
    }
}

/// The outcome of target resolution for one dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeDecision {
    /// Package name
    pub name: String,
    /// Current specifier as declared
    pub from: String,
    /// Replacement specifier, when accepted
    pub to: Option<String>,
    /// Whether the upgrade was accepted
    pub accepted: bool,
    /// Why the dependency was skipped, when not accepted
    pub reason: Option<SkipReason>,
}

impl UpgradeDecision {
    /// An accepted upgrade from one specifier to another
    pub fn upgrade(
        name: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            from: from.into(),
            to: Some(to.into()),
            accepted: true,
            reason: None,
        }
    }

    /// A skipped dependency with its reason
    pub fn skip(name: impl Into<String>, from: impl Into<String>, reason: SkipReason) -> Self {
        Self {
            name: name.into(),
            from: from.into(),
            to: None,
            accepted: false,
            reason: Some(reason),
        }
    }

    /// True if this decision carries a replacement specifier
    pub fn is_upgrade(&self) -> bool {
        self.accepted && self.to.is_some()
    }

    /// True if the skip came from a non-fatal failure worth surfacing
    pub fn is_diagnostic(&self) -> bool {
        matches!(self.reason, Some(SkipReason::FetchFailed(_)))
    }
}

impl fmt::Display for UpgradeDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.to, &self.reason) {
            (Some(to), _) => write!(f, "{}: {} → {}", self.name, self.from, to),
            (None, Some(reason)) => write!(f, "{}: unchanged ({})", self.name, reason),
            (None, None) => write!(f, "{}: unchanged", self.name),
        }
    }
}
