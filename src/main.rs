//! depdoctor - npm dependency upgrade checker CLI
//!
//! Checks the dependencies in a package.json against the npm registry,
//! optionally writes the upgrades back, and in doctor mode verifies
//! them against the project's own test command.

use clap::Parser;
use depdoctor::cache::{FileCacheStore, ResolutionCache};
use depdoctor::cli::CliArgs;
use depdoctor::doctor::{DoctorConfig, DoctorReport, DoctorSession};
use depdoctor::domain::Target;
use depdoctor::engine::UpgradeEngine;
use depdoctor::filter::FilterChain;
use depdoctor::manifest::Workspace;
use depdoctor::output::{JsonReport, TextReport};
use depdoctor::package_manager::SystemPackageManager;
use depdoctor::progress::Progress;
use depdoctor::registry::{HttpClient, NpmRegistry};
use depdoctor::resolver::{ResolveOptions, TargetResolver};
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    match run(args).await {
        Ok(exit_code) => exit_code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Main application logic
async fn run(args: CliArgs) -> anyhow::Result<ExitCode> {
    if args.verbose {
        eprintln!("depdoctor v{}", env!("CARGO_PKG_VERSION"));
        eprintln!("Project: {}", args.path.display());
    }

    let workspace = Workspace::open(&args.path)?;
    let dependencies = workspace.dependencies()?;

    // Resolution collaborators
    let client = HttpClient::new()?;
    let registry: Arc<dyn depdoctor::registry::Registry> = match &args.registry {
        Some(url) => Arc::new(NpmRegistry::with_base_url(client, url.clone())),
        None => Arc::new(NpmRegistry::new(client)),
    };

    // --no-cache keeps the single-flight coordination but makes every
    // stored entry immediately stale.
    let ttl = if args.no_cache {
        Duration::ZERO
    } else {
        args.cache_ttl
    };
    let cache = Arc::new(ResolutionCache::new(ttl));
    let store = args.cache_file.as_ref().map(|p| FileCacheStore::new(p));
    if let Some(store) = &store {
        if !args.no_cache {
            match cache.load_from(store).await {
                Ok(count) if args.verbose => {
                    eprintln!("Loaded {} cached entries from {}", count, store.path().display())
                }
                Ok(_) => {}
                Err(e) => eprintln!("Warning: {}", e),
            }
        }
    }

    let filter = FilterChain::new()
        .with_filter(&args.filter)
        .with_reject(&args.reject)
        .with_filter_version(&args.filter_version)
        .with_reject_version(&args.reject_version);
    let resolver = TargetResolver::new(
        Target::Fixed(args.target.clone()),
        ResolveOptions {
            allow_prerelease: args.pre,
            include_deprecated: args.deprecated,
        },
    );
    let engine = UpgradeEngine::new(registry, cache.clone(), filter, resolver)
        .with_concurrency(args.concurrency)
        .with_fetch_timeout(args.timeout);

    let mut progress = Progress::new(args.progress_enabled());
    progress.spinner(&format!("Checking {} dependencies", dependencies.len()));
    let report = engine.resolve_all(&dependencies).await;
    progress.finish_and_clear();

    if let Some(store) = &store {
        if let Err(e) = cache.flush_to(store).await {
            eprintln!("Warning: {}", e);
        }
    }

    let upgrades = report.upgrades();

    // Doctor verifies before anything is committed; a plain -u writes
    // directly.
    let doctor_report: Option<DoctorReport> = if args.doctor && !upgrades.is_empty() {
        let pm = SystemPackageManager::detect(workspace.root());
        let config = DoctorConfig {
            test_command: args.test_command.clone(),
            ..DoctorConfig::default()
        };
        let mut session = DoctorSession::new(&workspace, &pm, config);
        Some(session.run(&upgrades)?)
    } else {
        if args.writes_manifest() && !upgrades.is_empty() {
            workspace.apply_upgrades(&upgrades)?;
        }
        None
    };

    let mut stdout = io::stdout().lock();
    if args.json {
        JsonReport::write(&report, doctor_report.as_ref(), &mut stdout)?;
    } else {
        let text = TextReport::new(args.verbosity(), args.writes_manifest());
        text.write(&report, doctor_report.as_ref(), &mut stdout)?;
    }
    stdout.flush()?;

    // 2 flags a run that completed but could not check every package
    if report.diagnostics().is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(2))
    }
}
