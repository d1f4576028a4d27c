//! Target resolution: picks the replacement version for one dependency
//!
//! Given the parsed current specifier, the package's published version
//! set, and the effective target policy, `TargetResolver` selects a
//! candidate version and applies the acceptance rules:
//! - candidates never downgrade the release triple for numeric policies;
//! - deprecated versions are invisible unless explicitly included;
//! - prereleases are opt-in except for newest/latest/dist-tag targets;
//! - dist-tag targets treat a same-triple change as an intentional tag
//!   switch, because prerelease identifiers across tags are not totally
//!   ordered.

use crate::domain::{
    SkipReason, Specifier, SpecifierKind, Target, TargetPolicy, UpgradeDecision, VersionSet,
};
use semver::Version;

/// Knobs that widen the candidate pool
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    /// Consider prereleases even where the policy would not
    pub allow_prerelease: bool,
    /// Consider versions the registry flags as deprecated
    pub include_deprecated: bool,
}

/// Decides the replacement specifier for each dependency
#[derive(Debug, Clone)]
pub struct TargetResolver {
    target: Target,
    options: ResolveOptions,
}

impl TargetResolver {
    /// Create a resolver with the given target strategy and options
    pub fn new(target: Target, options: ResolveOptions) -> Self {
        Self { target, options }
    }

    /// Resolve one dependency against its published versions.
    ///
    /// Never fails: unparseable specifiers and empty version sets degrade
    /// to a skip decision.
    pub fn resolve(&self, name: &str, raw_spec: &str, set: &VersionSet) -> UpgradeDecision {
        let Some(spec) = Specifier::parse(raw_spec) else {
            return UpgradeDecision::skip(name, raw_spec, SkipReason::Unparseable);
        };

        let comparators = match &spec.kind {
            SpecifierKind::Range { comparators } => comparators.as_slice(),
            SpecifierKind::DistTag { .. } => &[],
        };
        let policy = self.target.policy_for(name, comparators);

        let Some(candidate) = self.select_candidate(&spec, set, &policy) else {
            return UpgradeDecision::skip(name, raw_spec, SkipReason::NoSuitableVersion);
        };

        match spec.current_version() {
            // A dist-tag reference has no pinned version to compare with;
            // the first resolution pins it.
            None => UpgradeDecision::upgrade(name, raw_spec, spec.format_upgraded(&candidate)),
            Some(current) => self.accept(name, &spec, &current, candidate, &policy),
        }
    }

    /// Candidate selection per the policy table
    fn select_candidate(
        &self,
        spec: &Specifier,
        set: &VersionSet,
        policy: &TargetPolicy,
    ) -> Option<Version> {
        let allow_pre = self.options.allow_prerelease || spec.references_prerelease();

        let pool = |keep_pre: bool| {
            set.versions().filter(move |v| {
                (keep_pre || v.pre.is_empty())
                    && (self.options.include_deprecated || !set.is_deprecated(v))
            })
        };
        let tagged = |tag: &str| {
            set.version_at_tag(tag)
                .filter(|v| self.options.include_deprecated || !set.is_deprecated(v))
        };

        match policy {
            TargetPolicy::Latest => tagged("latest"),
            TargetPolicy::DistTag(tag) => tagged(tag),
            TargetPolicy::Newest => pool(true).max(),
            TargetPolicy::Greatest => pool(allow_pre).max(),
            TargetPolicy::Minor => {
                let current = spec.current_version()?;
                pool(allow_pre)
                    .filter(|v| v.major == current.major)
                    .max()
            }
            TargetPolicy::Patch => {
                let current = spec.current_version()?;
                pool(allow_pre)
                    .filter(|v| v.major == current.major && v.minor == current.minor)
                    .max()
            }
            TargetPolicy::Semver => pool(allow_pre).filter(|v| spec.satisfies(v)).max(),
        }
    }

    /// Acceptance rules after candidate selection
    fn accept(
        &self,
        name: &str,
        spec: &Specifier,
        current: &Version,
        candidate: Version,
        policy: &TargetPolicy,
    ) -> UpgradeDecision {
        let raw = &spec.raw;
        if candidate == *current {
            return UpgradeDecision::skip(name, raw, SkipReason::UpToDate);
        }

        let current_triple = (current.major, current.minor, current.patch);
        let candidate_triple = (candidate.major, candidate.minor, candidate.patch);

        let accepted = match policy {
            // A dist-tag comparison is not purely numeric: within the same
            // release triple any change is an intentional tag switch, since
            // prerelease identifiers are not comparable across tags.
            TargetPolicy::DistTag(_) => {
                candidate_triple == current_triple || candidate_triple > current_triple
            }
            // Numeric-order policies: strictly newer by semver, and never
            // a lower release triple.
            _ => candidate_triple >= current_triple && candidate > *current,
        };

        if accepted {
            UpgradeDecision::upgrade(name, raw, spec.format_upgraded(&candidate))
        } else if candidate_triple < current_triple {
            UpgradeDecision::skip(name, raw, SkipReason::WouldDowngrade)
        } else {
            UpgradeDecision::skip(name, raw, SkipReason::UpToDate)
        }
    }
}
