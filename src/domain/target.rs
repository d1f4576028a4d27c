//! Target policy: which version a dependency should move to
//!
//! The fixed modes mirror the resolution table in the resolver; a custom
//! target is a callback that maps (name, comparators) to one of the fixed
//! modes, so the resolver only ever sees a fixed mode after one
//! indirection step.

use super::comparator::Comparator;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Fixed target resolution modes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetPolicy {
    /// Version at the registry's `latest` dist-tag
    Latest,
    /// Maximum published version, prereleases included
    Newest,
    /// Maximum valid release (prereleases only when allowed)
    Greatest,
    /// Maximum version within the current major
    Minor,
    /// Maximum version within the current major.minor
    Patch,
    /// Maximum version still satisfying the current range
    Semver,
    /// Version at a named dist-tag
    DistTag(String),
}

impl fmt::Display for TargetPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetPolicy::Latest => write!(f, "latest"),
            TargetPolicy::Newest => write!(f, "newest"),
            TargetPolicy::Greatest => write!(f, "greatest"),
            TargetPolicy::Minor => write!(f, "minor"),
            TargetPolicy::Patch => write!(f, "patch"),
            TargetPolicy::Semver => write!(f, "semver"),
            TargetPolicy::DistTag(tag) => write!(f, "tag:{}", tag),
        }
    }
}

impl FromStr for TargetPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "latest" => Ok(TargetPolicy::Latest),
            "newest" => Ok(TargetPolicy::Newest),
            "greatest" => Ok(TargetPolicy::Greatest),
            "minor" => Ok(TargetPolicy::Minor),
            "patch" => Ok(TargetPolicy::Patch),
            "semver" => Ok(TargetPolicy::Semver),
            other => match other.strip_prefix("tag:") {
                Some(tag) if !tag.is_empty() => Ok(TargetPolicy::DistTag(tag.to_string())),
                _ => Err(format!(
                    "invalid target '{}': expected latest, newest, greatest, \
                     minor, patch, semver, or tag:<name>",
                    other
                )),
            },
        }
    }
}

/// Callback form of a target: picks a fixed mode per dependency
pub type TargetFn = dyn Fn(&str, &[Comparator]) -> TargetPolicy + Send + Sync;

/// A target strategy: a fixed mode for every dependency, or a
/// per-dependency callback
#[derive(Clone)]
pub enum Target {
    Fixed(TargetPolicy),
    Custom(Arc<TargetFn>),
}

impl Target {
    /// Resolve the effective fixed policy for one dependency
    pub fn policy_for(&self, name: &str, comparators: &[Comparator]) -> TargetPolicy {
        match self {
            Target::Fixed(policy) => policy.clone(),
            Target::Custom(f) => f(name, comparators),
        }
    }
}

impl Default for Target {
    fn default() -> Self {
        Target::Fixed(TargetPolicy::Latest)
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Fixed(policy) => write!(f, "Target::Fixed({})", policy),
            Target::Custom(_) => write!(f, "Target::Custom(..)"),
        }
    }
}

impl From<TargetPolicy> for Target {
    fn from(policy: TargetPolicy) -> Self {
        Target::Fixed(policy)
    }
}
