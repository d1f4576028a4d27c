//! Application error types using thiserror
//!
//! Error hierarchy:
//! - ManifestError: package.json / lockfile reading and rewriting
//! - RegistryError: npm registry communication
//! - CacheError: resolution cache persistence
//! - DoctorError: fatal conditions in the doctor verification protocol
//!
//! Per-package resolution failures (unparseable specifier, fetch timeout)
//! are deliberately NOT errors; they degrade to a skip reason on the
//! decision and surface as diagnostics.

use std::path::PathBuf;
use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Manifest file related errors
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Package registry related errors
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Cache persistence related errors
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Doctor session fatal conditions
    #[error(transparent)]
    Doctor(#[from] DoctorError),
}

/// Errors related to manifest and lockfile operations
#[derive(Error, Debug)]
pub enum ManifestError {
    /// Manifest file not found
    #[error("manifest file not found: {path}")]
    NotFound { path: PathBuf },

    /// Failed to read manifest or lockfile
    #[error("failed to read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write manifest or lockfile
    #[error("failed to write {path}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON parsing error
    #[error("failed to parse JSON in {path}: {message}")]
    JsonParseError { path: PathBuf, message: String },

    /// A dependency entry could not be rewritten in place
    #[error("dependency '{package}' not found in {path} while rewriting")]
    EntryNotFound { path: PathBuf, package: String },
}

/// Errors related to npm registry communication
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Package not found in the registry
    #[error("package '{package}' not found in {registry}")]
    PackageNotFound { package: String, registry: String },

    /// Network request failed
    #[error("failed to fetch '{package}' from {registry}: {message}")]
    NetworkError {
        package: String,
        registry: String,
        message: String,
    },

    /// Rate limit exceeded
    #[error("rate limit exceeded for {registry}")]
    RateLimitExceeded { registry: String },

    /// Invalid response from registry
    #[error("invalid response from {registry} for '{package}': {message}")]
    InvalidResponse {
        package: String,
        registry: String,
        message: String,
    },

    /// Request or overall fetch deadline exceeded
    #[error("timeout while fetching '{package}' from {registry}")]
    Timeout { package: String, registry: String },
}

/// Errors related to resolution cache persistence
#[derive(Error, Debug)]
pub enum CacheError {
    /// Failed to read the cache store
    #[error("failed to load cache from {path}: {message}")]
    LoadError { path: PathBuf, message: String },

    /// Failed to write the cache store
    #[error("failed to store cache to {path}: {message}")]
    StoreError { path: PathBuf, message: String },
}

/// Fatal conditions raised by the doctor verification protocol.
///
/// Anything recoverable (a failing upgrade during bisection) is handled
/// inside the session and reported, not raised.
#[derive(Error, Debug)]
pub enum DoctorError {
    /// Baseline install failed before anything was mutated
    #[error("baseline install failed, aborting before any change: {output}")]
    BaselineInstall { output: String },

    /// Baseline tests failed before anything was mutated
    #[error("baseline tests failed, aborting before any change: {output}")]
    BaselineTest { output: String },

    /// Re-install after rollback failed: the restore-to-known-good
    /// invariant can no longer be guaranteed
    #[error(
        "re-install after rollback failed; the working tree may be \
         inconsistent (check connectivity or a partial install): {output}"
    )]
    InconsistentEnvironment { output: String },

    /// Snapshot or restore of manifest/lock bytes failed
    #[error(transparent)]
    Workspace(#[from] ManifestError),
}

impl RegistryError {
    /// Creates a new PackageNotFound error
    pub fn package_not_found(package: impl Into<String>, registry: impl Into<String>) -> Self {
        RegistryError::PackageNotFound {
            package: package.into(),
            registry: registry.into(),
        }
    }

    /// Creates a new NetworkError
    pub fn network_error(
        package: impl Into<String>,
        registry: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        RegistryError::NetworkError {
            package: package.into(),
            registry: registry.into(),
            message: message.into(),
        }
    }

    /// Creates a new Timeout error
    pub fn timeout(package: impl Into<String>, registry: impl Into<String>) -> Self {
        RegistryError::Timeout {
            package: package.into(),
            registry: registry.into(),
        }
    }
}

impl ManifestError {
    /// Creates a new NotFound error
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        ManifestError::NotFound { path: path.into() }
    }

    /// Creates a new ReadError
    pub fn read_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ManifestError::ReadError {
            path: path.into(),
            source,
        }
    }

    /// Creates a new WriteError
    pub fn write_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ManifestError::WriteError {
            path: path.into(),
            source,
        }
    }

    /// Creates a new JsonParseError
    pub fn json_parse_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ManifestError::JsonParseError {
            path: path.into(),
            message: message.into(),
        }
    }
}
