//! Specifier parsing into comparator clauses
//!
//! Handles npm range formats:
//! - Exact: `1.2.3`, `=1.2.3`, `v1.2.3`
//! - Caret: `^1.2.3`, Tilde: `~1.2.3`
//! - Comparison: `>=1.2.3`, `>1.2.3`, `<=1.2.3`, `<1.2.3`
//! - Wildcard: `*`, `1.x`, `1.2.*`
//! - Compound: `>=1.0.0 <2.0.0`, `1.0.0 - 2.0.0`, `^1 || ^2`
//! - Dist-tag references: `latest`, `next`, `beta`
//!
//! Anything else (`file:`, `link:`, `git+ssh://...`, `workspace:*`, empty
//! strings) is unparseable; callers leave such specifiers untouched.

use regex::Regex;
use semver::{Prerelease, Version};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

// One pattern covers operator-prefixed and partial versions; wildcard and
// dist-tag forms are matched separately.
static COMPARATOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\^|~|>=|>|<=|<|=)?\s*v?(\d+)(?:\.(\d+))?(?:\.(\d+))?(?:-([0-9A-Za-z][0-9A-Za-z.-]*))?(?:\+([0-9A-Za-z][0-9A-Za-z.-]*))?$",
    )
    .unwrap()
});
static WILDCARD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:(\d+)(?:\.(\d+))?\.)?[x*X]$|^\*$").unwrap());
static DIST_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z][0-9A-Za-z_-]*$").unwrap());

/// Protocol prefixes that mark a specifier as not registry-resolvable
const NON_REGISTRY_PREFIXES: &[&str] = &[
    "file:",
    "link:",
    "portal:",
    "patch:",
    "workspace:",
    "git:",
    "git+",
    "github:",
    "http:",
    "https:",
    "npm:",
];

/// The operator of a single comparator clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// Pinned version (`1.2.3` or `=1.2.3`)
    Exact,
    /// Caret range (`^1.2.3`)
    Caret,
    /// Tilde range (`~1.2.3`)
    Tilde,
    /// Greater than or equal (`>=1.2.3`)
    Gte,
    /// Greater than (`>1.2.3`)
    Gt,
    /// Less than or equal (`<=1.2.3`)
    Lte,
    /// Less than (`<1.2.3`)
    Lt,
    /// Wildcard (`*`, `1.x`, `1.2.*`)
    Wildcard,
}

impl Operator {
    /// The prefix string reapplied when formatting an upgraded specifier
    pub fn prefix(&self) -> &'static str {
        match self {
            Operator::Exact | Operator::Wildcard => "",
            Operator::Caret => "^",
            Operator::Tilde => "~",
            Operator::Gte => ">=",
            Operator::Gt => ">",
            Operator::Lte => "<=",
            Operator::Lt => "<",
        }
    }

    /// Restrictiveness rank; the highest-ranked comparator of a compound
    /// range drives resolution. Ties keep declaration order.
    fn restrictiveness(&self) -> u8 {
        match self {
            Operator::Exact => 6,
            Operator::Tilde => 5,
            Operator::Caret => 4,
            Operator::Lte | Operator::Lt => 3,
            Operator::Gte | Operator::Gt => 2,
            Operator::Wildcard => 1,
        }
    }
}

/// A decomposed comparator clause of a version range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparator {
    pub op: Operator,
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    /// Prerelease identifier (`beta` in `1.0.0-beta.2`)
    pub pre_id: Option<String>,
    /// Trailing numeric prerelease component (`2` in `1.0.0-beta.2`)
    pub pre_num: Option<u64>,
    /// Build metadata, carried but ignored for ordering
    pub build: Option<String>,
}

impl Comparator {
    /// The release triple (major, minor, patch)
    pub fn triple(&self) -> (u64, u64, u64) {
        (self.major, self.minor, self.patch)
    }

    /// True if this comparator references a prerelease version
    pub fn is_prerelease(&self) -> bool {
        self.pre_id.is_some() || self.pre_num.is_some()
    }

    /// Full prerelease string (`beta.2`), if any
    pub fn prerelease(&self) -> Option<String> {
        match (&self.pre_id, self.pre_num) {
            (Some(id), Some(n)) => Some(format!("{}.{}", id, n)),
            (Some(id), None) => Some(id.clone()),
            (None, Some(n)) => Some(n.to_string()),
            (None, None) => None,
        }
    }

    /// Reconstruct the version this comparator anchors on
    pub fn version(&self) -> Version {
        let mut v = Version::new(self.major, self.minor, self.patch);
        if let Some(pre) = self.prerelease() {
            if let Ok(p) = Prerelease::new(&pre) {
                v.pre = p;
            }
        }
        v
    }

    /// Whether a published version satisfies this single clause.
    ///
    /// Prereleases only match a clause that itself anchors on a prerelease
    /// of the same release triple (npm's opt-in rule).
    pub fn matches(&self, v: &Version) -> bool {
        if !v.pre.is_empty() && !(self.is_prerelease() && self.triple() == triple_of(v)) {
            return false;
        }
        let anchor = self.version();
        match self.op {
            Operator::Exact => triple_of(v) == self.triple() && v.pre == anchor.pre,
            Operator::Caret => *v >= anchor && triple_of(v) < caret_upper(&anchor),
            Operator::Tilde => {
                *v >= anchor && triple_of(v) < (anchor.major, anchor.minor + 1, 0)
            }
            Operator::Gte => *v >= anchor,
            Operator::Gt => *v > anchor,
            Operator::Lte => *v <= anchor,
            Operator::Lt => *v < anchor,
            Operator::Wildcard => true,
        }
    }
}

fn triple_of(v: &Version) -> (u64, u64, u64) {
    (v.major, v.minor, v.patch)
}

/// Exclusive upper bound of a caret range
fn caret_upper(anchor: &Version) -> (u64, u64, u64) {
    if anchor.major > 0 {
        (anchor.major + 1, 0, 0)
    } else if anchor.minor > 0 {
        (0, anchor.minor + 1, 0)
    } else {
        (0, 0, anchor.patch + 1)
    }
}

/// A parsed dependency specifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Specifier {
    /// The raw string as declared in the manifest
    pub raw: String,
    pub kind: SpecifierKind,
}

/// What a specifier resolved to structurally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SpecifierKind {
    /// One or more comparator clauses
    Range { comparators: Vec<Comparator> },
    /// A registry dist-tag reference (`latest`, `next`)
    DistTag { tag: String },
}

impl Specifier {
    /// Parse a raw specifier. Returns `None` for non-semver strings,
    /// which the caller must treat as "leave unchanged".
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || has_non_registry_protocol(trimmed) {
            return None;
        }

        // Hyphen range: `1.0.0 - 2.0.0`
        if let Some((lo, hi)) = split_hyphen_range(trimmed) {
            let lo = parse_comparator(lo, Some(Operator::Gte))?;
            let hi = parse_comparator(hi, Some(Operator::Lte))?;
            return Some(Specifier {
                raw: raw.to_string(),
                kind: SpecifierKind::Range {
                    comparators: vec![lo, hi],
                },
            });
        }

        // OR-joined clauses, each possibly space-joined
        if let Some(comparators) = parse_clauses(trimmed) {
            return Some(Specifier {
                raw: raw.to_string(),
                kind: SpecifierKind::Range { comparators },
            });
        }

        // Bare identifier: treat as a dist-tag reference
        if DIST_TAG_RE.is_match(trimmed) {
            return Some(Specifier {
                raw: raw.to_string(),
                kind: SpecifierKind::DistTag {
                    tag: trimmed.to_string(),
                },
            });
        }

        None
    }

    /// The dominant (most restrictive) comparator, if this is a range
    pub fn dominant(&self) -> Option<&Comparator> {
        match &self.kind {
            SpecifierKind::Range { comparators } => comparators
                .iter()
                .max_by_key(|c| c.op.restrictiveness()),
            SpecifierKind::DistTag { .. } => None,
        }
    }

    /// True for compound ranges (more than one comparator clause)
    pub fn is_compound(&self) -> bool {
        matches!(&self.kind, SpecifierKind::Range { comparators } if comparators.len() > 1)
    }

    /// The version the current specifier pins or anchors on, if any
    pub fn current_version(&self) -> Option<Version> {
        self.dominant().map(|c| c.version())
    }

    /// True if the current specifier already references a prerelease
    pub fn references_prerelease(&self) -> bool {
        self.dominant().is_some_and(|c| c.is_prerelease())
    }

    /// Whether a version satisfies this specifier.
    ///
    /// Compound ranges are judged by the dominant comparator only; full
    /// range-intersection semantics are intentionally out of scope.
    pub fn satisfies(&self, v: &Version) -> bool {
        match self.dominant() {
            Some(c) => c.matches(v),
            None => false,
        }
    }

    /// Format a chosen version back into a specifier, preserving the
    /// original operator style. A dist-tag reference becomes a version
    /// literal: tag semantics are resolved once, not kept symbolic.
    pub fn format_upgraded(&self, new: &Version) -> String {
        match &self.kind {
            SpecifierKind::DistTag { .. } => format_version(new),
            SpecifierKind::Range { .. } => {
                let dominant = match self.dominant() {
                    Some(c) => c,
                    None => return format_version(new),
                };
                if dominant.op == Operator::Wildcard {
                    // Keep the wildcard shape (`1.x` → `2.x`) where the
                    // original spelled one out; bare `*` stays `*`-less.
                    if self.raw.contains(".x") || self.raw.contains(".X") {
                        return format!("{}.x", new.major);
                    }
                    if self.raw.contains(".*") {
                        return format!("{}.*", new.major);
                    }
                    return format_version(new);
                }
                format!("{}{}", dominant.op.prefix(), format_version(new))
            }
        }
    }
}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Format a version without build metadata
fn format_version(v: &Version) -> String {
    if v.pre.is_empty() {
        format!("{}.{}.{}", v.major, v.minor, v.patch)
    } else {
        format!("{}.{}.{}-{}", v.major, v.minor, v.patch, v.pre)
    }
}

/// True if the raw value uses a protocol the registry cannot resolve
pub fn has_non_registry_protocol(raw: &str) -> bool {
    let lower = raw.trim().to_ascii_lowercase();
    NON_REGISTRY_PREFIXES.iter().any(|p| lower.starts_with(p))
}

/// Parse `||`-joined, space-joined comparator clauses into a flat list.
/// Returns `None` if any token fails to parse as a comparator.
fn parse_clauses(s: &str) -> Option<Vec<Comparator>> {
    let mut comparators = Vec::new();
    for clause in s.split("||") {
        for part in clause.split_whitespace() {
            comparators.push(parse_comparator(part, None)?);
        }
    }
    if comparators.is_empty() {
        None
    } else {
        Some(comparators)
    }
}

fn split_hyphen_range(s: &str) -> Option<(&str, &str)> {
    let (lo, hi) = s.split_once(" - ")?;
    Some((lo.trim(), hi.trim()))
}

/// Parse one comparator token; `forced_op` overrides the operator for
/// hyphen-range endpoints.
fn parse_comparator(token: &str, forced_op: Option<Operator>) -> Option<Comparator> {
    if WILDCARD_RE.is_match(token) {
        let caps = WILDCARD_RE.captures(token)?;
        return Some(Comparator {
            op: forced_op.unwrap_or(Operator::Wildcard),
            major: caps.get(1).and_then(|m| m.as_str().parse().ok()).unwrap_or(0),
            minor: caps.get(2).and_then(|m| m.as_str().parse().ok()).unwrap_or(0),
            patch: 0,
            pre_id: None,
            pre_num: None,
            build: None,
        });
    }

    let caps = COMPARATOR_RE.captures(token)?;
    let op = match forced_op {
        Some(op) => op,
        None => match caps.get(1).map(|m| m.as_str()) {
            None | Some("=") => Operator::Exact,
            Some("^") => Operator::Caret,
            Some("~") => Operator::Tilde,
            Some(">=") => Operator::Gte,
            Some(">") => Operator::Gt,
            Some("<=") => Operator::Lte,
            Some("<") => Operator::Lt,
            Some(_) => return None,
        },
    };

    let (pre_id, pre_num) = split_prerelease(caps.get(5).map(|m| m.as_str()));

    Some(Comparator {
        op,
        major: caps.get(2)?.as_str().parse().ok()?,
        minor: caps.get(3).and_then(|m| m.as_str().parse().ok()).unwrap_or(0),
        patch: caps.get(4).and_then(|m| m.as_str().parse().ok()).unwrap_or(0),
        pre_id,
        pre_num,
        build: caps.get(6).map(|m| m.as_str().to_string()),
    })
}

/// Split `beta.2` into (`beta`, 2); a lone identifier or lone number
/// fills only its own slot.
fn split_prerelease(pre: Option<&str>) -> (Option<String>, Option<u64>) {
    let Some(pre) = pre else {
        return (None, None);
    };
    match pre.rsplit_once('.') {
        Some((id, num)) => match num.parse::<u64>() {
            Ok(n) => (Some(id.to_string()), Some(n)),
            Err(_) => (Some(pre.to_string()), None),
        },
        None => match pre.parse::<u64>() {
            Ok(n) => (None, Some(n)),
            Err(_) => (Some(pre.to_string()), None),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Specifier {
        Specifier::parse(raw).unwrap()
    }

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_parse_exact() {
        let spec = parse("1.2.3");
        let c = spec.dominant().unwrap();
        assert_eq!(c.op, Operator::Exact);
        assert_eq!(c.triple(), (1, 2, 3));
        assert!(!c.is_prerelease());
    }

    #[test]
    fn test_parse_caret() {
        let spec = parse("^1.2.3");
        let c = spec.dominant().unwrap();
        assert_eq!(c.op, Operator::Caret);
        assert_eq!(c.triple(), (1, 2, 3));
    }

    #[test]
    fn test_parse_tilde() {
        let spec = parse("~0.4.1");
        let c = spec.dominant().unwrap();
        assert_eq!(c.op, Operator::Tilde);
        assert_eq!(c.triple(), (0, 4, 1));
    }

    #[test]
    fn test_parse_gte() {
        let c = parse(">=2.0.0").dominant().unwrap().clone();
        assert_eq!(c.op, Operator::Gte);
    }

    #[test]
    fn test_parse_partial_version() {
        let c = parse("^1").dominant().unwrap().clone();
        assert_eq!(c.triple(), (1, 0, 0));
        let c = parse("~2.1").dominant().unwrap().clone();
        assert_eq!(c.triple(), (2, 1, 0));
    }

    #[test]
    fn test_parse_v_prefix() {
        let c = parse("v1.2.3").dominant().unwrap().clone();
        assert_eq!(c.op, Operator::Exact);
        assert_eq!(c.triple(), (1, 2, 3));
    }

    #[test]
    fn test_parse_prerelease_split() {
        let c = parse("1.0.0-beta.2").dominant().unwrap().clone();
        assert_eq!(c.pre_id.as_deref(), Some("beta"));
        assert_eq!(c.pre_num, Some(2));
        assert_eq!(c.prerelease().unwrap(), "beta.2");
        assert!(c.is_prerelease());
    }

    #[test]
    fn test_parse_prerelease_hyphenated_id() {
        let c = parse("1.0.0-task-42.0").dominant().unwrap().clone();
        assert_eq!(c.pre_id.as_deref(), Some("task-42"));
        assert_eq!(c.pre_num, Some(0));
        assert_eq!(c.version(), v("1.0.0-task-42.0"));
    }

    #[test]
    fn test_parse_prerelease_bare_id() {
        let c = parse("^2.0.0-alpha").dominant().unwrap().clone();
        assert_eq!(c.pre_id.as_deref(), Some("alpha"));
        assert_eq!(c.pre_num, None);
        assert_eq!(c.prerelease().unwrap(), "alpha");
    }

    #[test]
    fn test_parse_build_metadata() {
        let c = parse("1.2.3+build.5").dominant().unwrap().clone();
        assert_eq!(c.build.as_deref(), Some("build.5"));
        assert!(!c.is_prerelease());
    }

    #[test]
    fn test_parse_compound_space_range() {
        let spec = parse(">=1.0.0 <2.0.0");
        assert!(spec.is_compound());
        match &spec.kind {
            SpecifierKind::Range { comparators } => {
                assert_eq!(comparators.len(), 2);
                assert_eq!(comparators[0].op, Operator::Gte);
                assert_eq!(comparators[1].op, Operator::Lt);
            }
            _ => panic!("expected range"),
        }
    }

    #[test]
    fn test_parse_hyphen_range() {
        let spec = parse("1.0.0 - 2.0.0");
        match &spec.kind {
            SpecifierKind::Range { comparators } => {
                assert_eq!(comparators[0].op, Operator::Gte);
                assert_eq!(comparators[1].op, Operator::Lte);
            }
            _ => panic!("expected range"),
        }
    }

    #[test]
    fn test_parse_or_range_dominant() {
        // Exact outranks caret, so 2.0.0 dominates
        let spec = parse("^1.0.0 || 2.0.0");
        assert!(spec.is_compound());
        let c = spec.dominant().unwrap();
        assert_eq!(c.op, Operator::Exact);
        assert_eq!(c.triple(), (2, 0, 0));
    }

    #[test]
    fn test_dominant_tie_keeps_first() {
        let spec = parse("^1.0.0 || ^2.0.0");
        assert_eq!(spec.dominant().unwrap().triple(), (1, 0, 0));
    }

    #[test]
    fn test_parse_wildcards() {
        assert!(matches!(
            parse("*").kind,
            SpecifierKind::Range { .. }
        ));
        let c = parse("1.x").dominant().unwrap().clone();
        assert_eq!(c.op, Operator::Wildcard);
        assert_eq!(c.major, 1);
        let c = parse("1.2.*").dominant().unwrap().clone();
        assert_eq!((c.major, c.minor), (1, 2));
    }

    #[test]
    fn test_parse_dist_tag_reference() {
        let spec = parse("next");
        assert_eq!(
            spec.kind,
            SpecifierKind::DistTag {
                tag: "next".to_string()
            }
        );
        assert!(spec.dominant().is_none());
    }

    #[test]
    fn test_parse_rejects_non_registry_protocols() {
        for raw in [
            "file:../local",
            "link:../local",
            "git+ssh://git@github.com/u/r.git",
            "github:user/repo",
            "workspace:*",
            "https://example.com/pkg.tgz",
        ] {
            assert!(Specifier::parse(raw).is_none(), "{raw} should be opaque");
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Specifier::parse("").is_none());
        assert!(Specifier::parse("   ").is_none());
        assert!(Specifier::parse(">>1.0").is_none());
    }

    #[test]
    fn test_has_non_registry_protocol() {
        assert!(has_non_registry_protocol("file:../x"));
        assert!(has_non_registry_protocol("npm:alias@1.0.0"));
        assert!(!has_non_registry_protocol("^1.0.0"));
        assert!(!has_non_registry_protocol("latest"));
    }

    #[test]
    fn test_format_upgraded_preserves_caret() {
        let spec = parse("^2.1.0");
        assert_eq!(spec.format_upgraded(&v("2.4.2")), "^2.4.2");
    }

    #[test]
    fn test_format_upgraded_exact_stays_exact() {
        let spec = parse("1.0.0");
        assert_eq!(spec.format_upgraded(&v("1.1.0")), "1.1.0");
    }

    #[test]
    fn test_format_upgraded_tilde_and_gte() {
        assert_eq!(parse("~1.2.3").format_upgraded(&v("1.3.0")), "~1.3.0");
        assert_eq!(parse(">=1.2.3").format_upgraded(&v("2.0.0")), ">=2.0.0");
    }

    #[test]
    fn test_format_upgraded_prerelease_carried() {
        let spec = parse("^1.0.0-beta.1");
        assert_eq!(spec.format_upgraded(&v("1.0.0-beta.3")), "^1.0.0-beta.3");
    }

    #[test]
    fn test_format_upgraded_dist_tag_becomes_literal() {
        let spec = parse("latest");
        assert_eq!(spec.format_upgraded(&v("3.2.1")), "3.2.1");
    }

    #[test]
    fn test_format_upgraded_wildcard_shape() {
        assert_eq!(parse("1.x").format_upgraded(&v("2.3.0")), "2.x");
        assert_eq!(parse("1.2.*").format_upgraded(&v("2.3.0")), "2.*");
        assert_eq!(parse("*").format_upgraded(&v("2.3.0")), "2.3.0");
    }

    #[test]
    fn test_matches_caret() {
        let c = parse("^1.2.3").dominant().unwrap().clone();
        assert!(c.matches(&v("1.2.3")));
        assert!(c.matches(&v("1.9.0")));
        assert!(!c.matches(&v("2.0.0")));
        assert!(!c.matches(&v("1.2.2")));
    }

    #[test]
    fn test_matches_caret_zero_major() {
        let c = parse("^0.4.1").dominant().unwrap().clone();
        assert!(c.matches(&v("0.4.9")));
        assert!(!c.matches(&v("0.5.0")));
    }

    #[test]
    fn test_matches_tilde() {
        let c = parse("~1.2.3").dominant().unwrap().clone();
        assert!(c.matches(&v("1.2.9")));
        assert!(!c.matches(&v("1.3.0")));
    }

    #[test]
    fn test_matches_rejects_foreign_prerelease() {
        let c = parse("^1.2.3").dominant().unwrap().clone();
        assert!(!c.matches(&v("1.5.0-beta.1")));

        let pre = parse("^1.2.3-rc.1").dominant().unwrap().clone();
        assert!(pre.matches(&v("1.2.3-rc.2")));
        assert!(!pre.matches(&v("1.3.0-rc.1")));
    }

    #[test]
    fn test_satisfies_uses_dominant() {
        let spec = parse("^1.0.0 || 2.0.0");
        // Dominant clause is the exact 2.0.0
        assert!(spec.satisfies(&v("2.0.0")));
        assert!(!spec.satisfies(&v("1.5.0")));
    }

    #[test]
    fn test_current_version_and_prerelease_flags() {
        let spec = parse("^1.0.0-beta.0");
        assert_eq!(spec.current_version().unwrap(), v("1.0.0-beta.0"));
        assert!(spec.references_prerelease());
        assert!(!parse("^1.0.0").references_prerelease());
    }

    #[test]
    fn test_serde_round_trip() {
        let spec = parse("^1.2.3-beta.1");
        let json = serde_json::to_string(&spec).unwrap();
        let parsed: Specifier = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, spec);
    }
}
