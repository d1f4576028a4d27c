//! Upgrade engine: concurrent fetch + resolve across all dependencies
//!
//! For each dependency: filter chain → cache lookup (fetch on miss,
//! deduplicated per key) → target resolution. Fetches run under a
//! bounded semaphore (unbounded concurrency invites registry rate
//! limiting) and a per-fetch timeout; a failed or timed-out fetch
//! degrades that one package to "no change" with a diagnostic instead of
//! aborting the batch. The report lists decisions in manifest
//! declaration order, so identical inputs produce identical output.

use crate::cache::{CacheKey, ResolutionCache};
use crate::domain::{SkipReason, UpgradeDecision};
use crate::filter::FilterChain;
use crate::registry::Registry;
use crate::resolver::TargetResolver;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Default number of concurrent registry fetches
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Default per-fetch deadline
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// One dependency as declared in the manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEntry {
    /// Package name
    pub name: String,
    /// Manifest section (`dependencies`, `devDependencies`, ...)
    pub section: String,
    /// Raw specifier; `None` when the manifest value is not a string
    pub raw: Option<String>,
}

impl DependencyEntry {
    pub fn new(
        name: impl Into<String>,
        section: impl Into<String>,
        raw: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            section: section.into(),
            raw,
        }
    }
}

/// Aggregated outcome of one resolution run
#[derive(Debug, Clone, Default)]
pub struct EngineReport {
    /// One decision per dependency, in manifest declaration order
    pub decisions: Vec<UpgradeDecision>,
}

impl EngineReport {
    /// Accepted upgrades as an ordered name → new specifier map.
    /// A name appearing in several sections converges to the same
    /// candidate (shared cache), so the first occurrence wins.
    pub fn upgrades(&self) -> Vec<(String, String)> {
        let mut seen = HashSet::new();
        self.decisions
            .iter()
            .filter(|d| d.is_upgrade())
            .filter(|d| seen.insert(d.name.clone()))
            .filter_map(|d| d.to.clone().map(|to| (d.name.clone(), to)))
            .collect()
    }

    /// Non-fatal failures worth reporting (fetch errors, timeouts)
    pub fn diagnostics(&self) -> Vec<String> {
        self.decisions
            .iter()
            .filter(|d| d.is_diagnostic())
            .map(|d| d.to_string())
            .collect()
    }

    /// Count of dependencies that produced an upgrade
    pub fn upgrade_count(&self) -> usize {
        self.upgrades().len()
    }
}

/// Orchestrates filtering, fetching and resolution for a dependency set
pub struct UpgradeEngine {
    registry: Arc<dyn Registry>,
    cache: Arc<ResolutionCache>,
    filter: FilterChain,
    resolver: TargetResolver,
    semaphore: Arc<Semaphore>,
    fetch_timeout: Duration,
}

impl UpgradeEngine {
    pub fn new(
        registry: Arc<dyn Registry>,
        cache: Arc<ResolutionCache>,
        filter: FilterChain,
        resolver: TargetResolver,
    ) -> Self {
        Self {
            registry,
            cache,
            filter,
            resolver,
            semaphore: Arc::new(Semaphore::new(DEFAULT_CONCURRENCY)),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Bound the number of concurrent registry fetches
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        self
    }

    /// Deadline applied to each registry fetch
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Resolve every dependency concurrently; the returned report is
    /// ordered by manifest declaration order regardless of completion
    /// order.
    pub async fn resolve_all(&self, dependencies: &[DependencyEntry]) -> EngineReport {
        let mut tasks: JoinSet<(usize, UpgradeDecision)> = JoinSet::new();
        let mut decisions: Vec<Option<UpgradeDecision>> = vec![None; dependencies.len()];

        for (index, dep) in dependencies.iter().enumerate() {
            // Filters run before any network is touched
            if let Some(reason) = self.filter.evaluate(&dep.name, dep.raw.as_deref()) {
                let raw = dep.raw.clone().unwrap_or_default();
                decisions[index] = Some(UpgradeDecision::skip(&dep.name, raw, reason));
                continue;
            }

            let name = dep.name.clone();
            let raw = dep.raw.clone().unwrap_or_default();
            let registry = self.registry.clone();
            let cache = self.cache.clone();
            let resolver = self.resolver.clone();
            let semaphore = self.semaphore.clone();
            let fetch_timeout = self.fetch_timeout;

            tasks.spawn(async move {
                let key = CacheKey::new(name.clone(), registry.identity());
                let fetched = cache
                    .get_or_fetch(&key, || async {
                        // Semaphore scopes the actual network call only;
                        // cache hits never wait on a permit.
                        let _permit = semaphore.acquire().await;
                        match tokio::time::timeout(
                            fetch_timeout,
                            registry.fetch_version_set(&name),
                        )
                        .await
                        {
                            Ok(result) => result,
                            Err(_) => Err(crate::error::RegistryError::timeout(
                                name.clone(),
                                registry.identity(),
                            )),
                        }
                    })
                    .await;

                let decision = match fetched {
                    Ok(set) => resolver.resolve(&name, &raw, &set),
                    Err(e) => {
                        UpgradeDecision::skip(&name, &raw, SkipReason::FetchFailed(e.to_string()))
                    }
                };
                (index, decision)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Ok((index, decision)) = joined {
                decisions[index] = Some(decision);
            }
        }

        EngineReport {
            decisions: decisions.into_iter().flatten().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Target, TargetPolicy, VersionSet};
    use crate::error::RegistryError;
    use crate::resolver::ResolveOptions;
    use async_trait::async_trait;
    use std::collections::{BTreeMap, BTreeSet, HashMap};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockRegistry {
        sets: HashMap<String, VersionSet>,
        fetches: AtomicUsize,
    }

    impl MockRegistry {
        fn new(packages: &[(&str, &[&str])]) -> Self {
            let mut sets = HashMap::new();
            for (name, versions) in packages {
                sets.insert(
                    name.to_string(),
                    VersionSet::new(
                        *name,
                        versions.iter().map(|s| s.to_string()).collect(),
                        BTreeMap::new(),
                        BTreeSet::new(),
                    ),
                );
            }
            Self {
                sets,
                fetches: AtomicUsize::new(0),
            }
        }

        fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Registry for MockRegistry {
        fn identity(&self) -> &str {
            "mock://registry"
        }

        async fn fetch_version_set(&self, package: &str) -> Result<VersionSet, RegistryError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.sets
                .get(package)
                .cloned()
                .ok_or_else(|| RegistryError::package_not_found(package, "mock"))
        }
    }

    fn engine_with(registry: Arc<MockRegistry>, filter: FilterChain) -> UpgradeEngine {
        let cache = Arc::new(ResolutionCache::new(Duration::from_secs(3600)));
        let resolver = TargetResolver::new(
            Target::Fixed(TargetPolicy::Greatest),
            ResolveOptions::default(),
        );
        UpgradeEngine::new(registry, cache, filter, resolver)
    }

    fn dep(name: &str, raw: &str) -> DependencyEntry {
        DependencyEntry::new(name, "dependencies", Some(raw.to_string()))
    }

    #[tokio::test]
    async fn test_resolves_in_declaration_order() {
        let registry = Arc::new(MockRegistry::new(&[
            ("alpha", &["1.0.0", "2.0.0"]),
            ("beta", &["0.1.0", "0.2.0"]),
            ("gamma", &["3.0.0", "3.1.0"]),
        ]));
        let engine = engine_with(registry, FilterChain::new());

        let deps = vec![
            dep("gamma", "^3.0.0"),
            dep("alpha", "^1.0.0"),
            dep("beta", "^0.1.0"),
        ];
        let report = engine.resolve_all(&deps).await;

        let names: Vec<&str> = report.decisions.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["gamma", "alpha", "beta"]);
        assert_eq!(
            report.upgrades(),
            vec![
                ("gamma".to_string(), "^3.1.0".to_string()),
                ("alpha".to_string(), "^2.0.0".to_string()),
                ("beta".to_string(), "^0.2.0".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_duplicate_across_sections_shares_one_fetch() {
        let registry = Arc::new(MockRegistry::new(&[("shared", &["1.0.0", "1.5.0"])]));
        let engine = engine_with(registry.clone(), FilterChain::new());

        let deps = vec![
            DependencyEntry::new("shared", "dependencies", Some("^1.0.0".to_string())),
            DependencyEntry::new("shared", "devDependencies", Some("^1.0.0".to_string())),
        ];
        let report = engine.resolve_all(&deps).await;

        assert_eq!(registry.fetch_count(), 1);
        // Both sections decided independently, converging on the same
        // candidate; the upgrade map carries the name once.
        assert_eq!(report.decisions.len(), 2);
        assert!(report.decisions.iter().all(|d| d.is_upgrade()));
        assert_eq!(
            report.upgrades(),
            vec![("shared".to_string(), "^1.5.0".to_string())]
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_degrades_to_no_change() {
        let registry = Arc::new(MockRegistry::new(&[("ok", &["1.0.0", "2.0.0"])]));
        let engine = engine_with(registry, FilterChain::new());

        let deps = vec![dep("missing", "^1.0.0"), dep("ok", "^1.0.0")];
        let report = engine.resolve_all(&deps).await;

        assert_eq!(
            report.upgrades(),
            vec![("ok".to_string(), "^2.0.0".to_string())]
        );
        let failed = &report.decisions[0];
        assert!(matches!(
            failed.reason,
            Some(SkipReason::FetchFailed(_))
        ));
        assert_eq!(report.diagnostics().len(), 1);
    }

    #[tokio::test]
    async fn test_filtered_dependency_never_fetches() {
        let registry = Arc::new(MockRegistry::new(&[("lodash", &["9.9.9"])]));
        let filter = FilterChain::new().with_reject(&["lodash".to_string()]);
        let engine = engine_with(registry.clone(), filter);

        let report = engine.resolve_all(&[dep("lodash", "^1.0.0")]).await;

        assert_eq!(registry.fetch_count(), 0);
        assert!(report.upgrades().is_empty());
        assert_eq!(
            report.decisions[0].reason,
            Some(SkipReason::NameFiltered)
        );
    }

    #[tokio::test]
    async fn test_non_registry_specifiers_never_in_result_map() {
        let registry = Arc::new(MockRegistry::new(&[("local", &["9.9.9"])]));
        let engine = engine_with(registry.clone(), FilterChain::new());

        let deps = vec![
            DependencyEntry::new("local", "dependencies", Some("file:../local".to_string())),
            DependencyEntry::new("//", "dependencies", None),
        ];
        let report = engine.resolve_all(&deps).await;

        assert_eq!(registry.fetch_count(), 0);
        assert!(report.upgrades().is_empty());
        assert_eq!(report.decisions[0].reason, Some(SkipReason::Unparseable));
        assert_eq!(report.decisions[1].reason, Some(SkipReason::NotAString));
    }

    #[tokio::test]
    async fn test_empty_dependency_list() {
        let registry = Arc::new(MockRegistry::new(&[]));
        let engine = engine_with(registry, FilterChain::new());
        let report = engine.resolve_all(&[]).await;
        assert!(report.decisions.is_empty());
        assert_eq!(report.upgrade_count(), 0);
    }
}
