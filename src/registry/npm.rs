//! npm registry adapter
//!
//! Fetches the packument for a package and condenses it into a
//! `VersionSet`: published versions, dist-tags, and which versions carry
//! a deprecation notice.
//! API endpoint: `{registry}/{package}`

use crate::domain::VersionSet;
use crate::error::RegistryError;
use crate::registry::{HttpClient, Registry};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Default npm registry base URL
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.npmjs.org";

/// npm registry adapter
pub struct NpmRegistry {
    client: HttpClient,
    base_url: String,
}

/// The slice of a packument we consume
#[derive(Debug, Deserialize)]
struct Packument {
    #[serde(rename = "dist-tags", default)]
    dist_tags: BTreeMap<String, String>,
    #[serde(default)]
    versions: HashMap<String, VersionMeta>,
}

#[derive(Debug, Deserialize)]
struct VersionMeta {
    /// String message or boolean; presence means deprecated
    #[serde(default)]
    deprecated: Option<serde_json::Value>,
}

impl NpmRegistry {
    /// Adapter against the public npm registry
    pub fn new(client: HttpClient) -> Self {
        Self::with_base_url(client, DEFAULT_REGISTRY_URL)
    }

    /// Adapter against a custom registry base URL
    pub fn with_base_url(client: HttpClient, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { client, base_url }
    }

    fn build_url(&self, package: &str) -> String {
        format!("{}/{}", self.base_url, package)
    }

    fn condense(&self, package: &str, packument: Packument) -> VersionSet {
        let mut versions = Vec::with_capacity(packument.versions.len());
        let mut deprecated = BTreeSet::new();
        for (version, meta) in packument.versions {
            if is_deprecated(&meta) {
                deprecated.insert(version.clone());
            }
            versions.push(version);
        }
        VersionSet::new(package, versions, packument.dist_tags, deprecated)
    }
}

/// `deprecated: false` is not a deprecation; anything else present is
fn is_deprecated(meta: &VersionMeta) -> bool {
    match &meta.deprecated {
        None => false,
        Some(serde_json::Value::Bool(flag)) => *flag,
        Some(_) => true,
    }
}

#[async_trait]
impl Registry for NpmRegistry {
    fn identity(&self) -> &str {
        &self.base_url
    }

    async fn fetch_version_set(&self, package: &str) -> Result<VersionSet, RegistryError> {
        let url = self.build_url(package);
        let packument: Packument = self.client.get_json(&url, package, &self.base_url).await?;
        Ok(self.condense(package, packument))
    }
}
