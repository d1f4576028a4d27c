//! Dependency filter chain
//!
//! Two independent predicate stages evaluated before any registry fetch:
//! a name filter (exact string, glob pattern, or set membership) and a
//! version filter matched against the *current* specifier. Exclusion wins
//! over inclusion. Non-string manifest values and non-registry protocol
//! specifiers are always excluded, regardless of configured filters.

use crate::domain::{has_non_registry_protocol, SkipReason};
use regex::Regex;

/// A single name or version predicate
#[derive(Debug, Clone)]
enum Pattern {
    Exact(String),
    Glob(Regex),
}

impl Pattern {
    /// Build a predicate from a user-supplied string. `*` and `?` turn
    /// the string into a glob; anything else matches exactly.
    fn new(raw: &str) -> Self {
        if raw.contains('*') || raw.contains('?') {
            let mut regex = String::from("^");
            for ch in raw.chars() {
                match ch {
                    '*' => regex.push_str(".*"),
                    '?' => regex.push('.'),
                    other => regex.push_str(&regex::escape(&other.to_string())),
                }
            }
            regex.push('$');
            // The escaped pattern is always valid
            match Regex::new(&regex) {
                Ok(re) => Pattern::Glob(re),
                Err(_) => Pattern::Exact(raw.to_string()),
            }
        } else {
            Pattern::Exact(raw.to_string())
        }
    }

    fn matches(&self, value: &str) -> bool {
        match self {
            Pattern::Exact(s) => s == value,
            Pattern::Glob(re) => re.is_match(value),
        }
    }
}

/// Name and version inclusion/exclusion predicates
#[derive(Debug, Clone, Default)]
pub struct FilterChain {
    include_names: Vec<Pattern>,
    exclude_names: Vec<Pattern>,
    include_versions: Vec<Pattern>,
    exclude_versions: Vec<Pattern>,
}

impl FilterChain {
    /// A chain that lets everything through
    pub fn new() -> Self {
        Self::default()
    }

    /// Only process dependencies whose name matches one of these
    pub fn with_filter(mut self, patterns: &[String]) -> Self {
        self.include_names = split_patterns(patterns);
        self
    }

    /// Never process dependencies whose name matches one of these
    pub fn with_reject(mut self, patterns: &[String]) -> Self {
        self.exclude_names = split_patterns(patterns);
        self
    }

    /// Only process dependencies whose current specifier matches
    pub fn with_filter_version(mut self, patterns: &[String]) -> Self {
        self.include_versions = split_patterns(patterns);
        self
    }

    /// Never process dependencies whose current specifier matches
    pub fn with_reject_version(mut self, patterns: &[String]) -> Self {
        self.exclude_versions = split_patterns(patterns);
        self
    }

    /// Evaluate a dependency before fetching. Returns the skip reason if
    /// it must not be resolved; `raw_spec` is `None` for manifest values
    /// that are not plain strings (comment entries and the like).
    pub fn evaluate(&self, name: &str, raw_spec: Option<&str>) -> Option<SkipReason> {
        let Some(raw) = raw_spec else {
            return Some(SkipReason::NotAString);
        };
        if has_non_registry_protocol(raw) {
            return Some(SkipReason::Unparseable);
        }

        // Exclusion wins when both sides match
        if self.exclude_names.iter().any(|p| p.matches(name)) {
            return Some(SkipReason::NameFiltered);
        }
        if !self.include_names.is_empty() && !self.include_names.iter().any(|p| p.matches(name)) {
            return Some(SkipReason::NameFiltered);
        }

        if self.exclude_versions.iter().any(|p| p.matches(raw)) {
            return Some(SkipReason::VersionFiltered);
        }
        if !self.include_versions.is_empty()
            && !self.include_versions.iter().any(|p| p.matches(raw))
        {
            return Some(SkipReason::VersionFiltered);
        }

        None
    }
}

/// Each entry may itself be a comma or space delimited list
fn split_patterns(patterns: &[String]) -> Vec<Pattern> {
    patterns
        .iter()
        .flat_map(|entry| entry.split([',', ' ']))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Pattern::new)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_chain_passes_everything() {
        let chain = FilterChain::new();
        assert!(chain.evaluate("lodash", Some("^4.17.21")).is_none());
    }

    #[test]
    fn test_exact_reject() {
        let chain = FilterChain::new().with_reject(&strings(&["lodash"]));
        assert_eq!(
            chain.evaluate("lodash", Some("^4.17.21")),
            Some(SkipReason::NameFiltered)
        );
        assert!(chain.evaluate("react", Some("^19.0.0")).is_none());
    }

    #[test]
    fn test_glob_filter() {
        let chain = FilterChain::new().with_filter(&strings(&["@types/*"]));
        assert!(chain.evaluate("@types/node", Some("^22.0.0")).is_none());
        assert_eq!(
            chain.evaluate("react", Some("^19.0.0")),
            Some(SkipReason::NameFiltered)
        );
    }

    #[test]
    fn test_exclusion_wins_over_inclusion() {
        let chain = FilterChain::new()
            .with_filter(&strings(&["react*"]))
            .with_reject(&strings(&["react-dom"]));
        assert!(chain.evaluate("react", Some("^19.0.0")).is_none());
        assert_eq!(
            chain.evaluate("react-dom", Some("^19.0.0")),
            Some(SkipReason::NameFiltered)
        );
    }

    #[test]
    fn test_comma_and_space_delimited_lists() {
        let chain = FilterChain::new().with_reject(&strings(&["lodash, react express"]));
        for name in ["lodash", "react", "express"] {
            assert_eq!(
                chain.evaluate(name, Some("1.0.0")),
                Some(SkipReason::NameFiltered),
                "{name}"
            );
        }
        assert!(chain.evaluate("vue", Some("1.0.0")).is_none());
    }

    #[test]
    fn test_version_reject_matches_current_specifier() {
        let chain = FilterChain::new().with_reject_version(&strings(&["^4.*"]));
        assert_eq!(
            chain.evaluate("lodash", Some("^4.17.21")),
            Some(SkipReason::VersionFiltered)
        );
        assert!(chain.evaluate("lodash", Some("^5.0.0")).is_none());
    }

    #[test]
    fn test_version_filter_literal() {
        let chain = FilterChain::new().with_filter_version(&strings(&["^1.0.0"]));
        assert!(chain.evaluate("a", Some("^1.0.0")).is_none());
        assert_eq!(
            chain.evaluate("a", Some("^2.0.0")),
            Some(SkipReason::VersionFiltered)
        );
    }

    #[test]
    fn test_non_string_value_always_excluded() {
        let chain = FilterChain::new().with_filter(&strings(&["*"]));
        assert_eq!(chain.evaluate("//", None), Some(SkipReason::NotAString));
    }

    #[test]
    fn test_non_registry_protocols_always_excluded() {
        let chain = FilterChain::new();
        for raw in ["file:../x", "link:../y", "git+ssh://host/r.git", "workspace:^"] {
            assert_eq!(
                chain.evaluate("local", Some(raw)),
                Some(SkipReason::Unparseable),
                "{raw}"
            );
        }
    }

    #[test]
    fn test_protocol_exclusion_beats_filters() {
        // Even an explicit include cannot resurrect a protocol specifier
        let chain = FilterChain::new().with_filter(&strings(&["local"]));
        assert_eq!(
            chain.evaluate("local", Some("file:../x")),
            Some(SkipReason::Unparseable)
        );
    }
}
