//! Registry collaborators for fetching published version metadata
//!
//! The engine only depends on the `Registry` trait; the npm adapter over
//! HTTP is the production implementation, tests inject mocks.

mod client;
mod npm;

pub use client::HttpClient;
pub use npm::NpmRegistry;

use crate::domain::VersionSet;
use crate::error::RegistryError;
use async_trait::async_trait;

/// A source of published version metadata
#[async_trait]
pub trait Registry: Send + Sync {
    /// Stable identity of this registry (cache key component)
    fn identity(&self) -> &str;

    /// Fetch the version set for a package
    async fn fetch_version_set(&self, package: &str) -> Result<VersionSet, RegistryError>;
}
