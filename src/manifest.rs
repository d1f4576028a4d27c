//! package.json access for a Node.js project directory
//!
//! Covers:
//! - dependency extraction from all four sections, in declaration order
//! - format-preserving in-place rewrite of version specifiers
//! - byte-level snapshots of the manifest and lockfile for rollback
//!
//! Rewrites go through regex text replacement rather than serializing
//! the parsed JSON back out, so indentation, key order and trailing
//! whitespace survive an upgrade untouched.

use crate::engine::DependencyEntry;
use crate::error::ManifestError;
use crate::package_manager::LOCKFILE_NAMES;
use regex::Regex;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Manifest sections scanned for dependencies, in scan order
pub const DEPENDENCY_SECTIONS: &[&str] = &[
    "dependencies",
    "devDependencies",
    "peerDependencies",
    "optionalDependencies",
];

pub const MANIFEST_FILE: &str = "package.json";

/// A project directory holding a package.json and, optionally, a lockfile
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

/// Byte-exact copies of the manifest and lockfile, for exact restore
#[derive(Debug, Clone)]
pub struct WorkspaceSnapshot {
    manifest: Vec<u8>,
    lock: Option<(PathBuf, Vec<u8>)>,
}

impl WorkspaceSnapshot {
    pub fn manifest_bytes(&self) -> &[u8] {
        &self.manifest
    }

    pub fn lock_bytes(&self) -> Option<&[u8]> {
        self.lock.as_ref().map(|(_, bytes)| bytes.as_slice())
    }
}

impl Workspace {
    /// Open a project directory. Fails if package.json is missing.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ManifestError> {
        let root = root.into();
        let manifest = root.join(MANIFEST_FILE);
        if !manifest.is_file() {
            return Err(ManifestError::NotFound { path: manifest });
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    /// Path of the first known lockfile present in the project, if any
    pub fn lockfile_path(&self) -> Option<PathBuf> {
        LOCKFILE_NAMES
            .iter()
            .map(|name| self.root.join(name))
            .find(|p| p.is_file())
    }

    pub fn read_manifest(&self) -> Result<String, ManifestError> {
        let path = self.manifest_path();
        fs::read_to_string(&path).map_err(|source| ManifestError::ReadError { path, source })
    }

    fn write_manifest(&self, content: &str) -> Result<(), ManifestError> {
        let path = self.manifest_path();
        fs::write(&path, content).map_err(|source| ManifestError::WriteError { path, source })
    }

    /// Extract all dependency entries in manifest declaration order:
    /// sections in the fixed scan order, entries within a section as
    /// written. Non-string values are kept with `raw: None` so they can
    /// be reported instead of silently dropped.
    pub fn dependencies(&self) -> Result<Vec<DependencyEntry>, ManifestError> {
        let content = self.read_manifest()?;
        let json: Value =
            serde_json::from_str(&content).map_err(|e| ManifestError::JsonParseError {
                path: self.manifest_path(),
                message: e.to_string(),
            })?;

        let mut entries = Vec::new();
        for section in DEPENDENCY_SECTIONS {
            if let Some(deps) = json.get(section).and_then(|v| v.as_object()) {
                for (name, value) in deps {
                    let raw = value.as_str().map(|s| s.to_string());
                    entries.push(DependencyEntry::new(name.clone(), *section, raw));
                }
            }
        }
        Ok(entries)
    }

    /// Whether package.json declares the named lifecycle script
    pub fn has_script(&self, name: &str) -> Result<bool, ManifestError> {
        let content = self.read_manifest()?;
        let json: Value =
            serde_json::from_str(&content).map_err(|e| ManifestError::JsonParseError {
                path: self.manifest_path(),
                message: e.to_string(),
            })?;
        Ok(json
            .get("scripts")
            .and_then(|v| v.as_object())
            .is_some_and(|scripts| scripts.contains_key(name)))
    }

    /// Rewrite the given packages to their new specifiers in place.
    /// Returns the number of packages actually rewritten.
    pub fn apply_upgrades(&self, upgrades: &[(String, String)]) -> Result<usize, ManifestError> {
        if upgrades.is_empty() {
            return Ok(0);
        }
        let content = self.read_manifest()?;
        let (rewritten, count) = rewrite_specifiers(&content, upgrades, &self.manifest_path())?;
        if count > 0 {
            self.write_manifest(&rewritten)?;
        }
        Ok(count)
    }

    /// Capture the current manifest and lockfile bytes
    pub fn snapshot(&self) -> Result<WorkspaceSnapshot, ManifestError> {
        let manifest_path = self.manifest_path();
        let manifest = fs::read(&manifest_path).map_err(|source| ManifestError::ReadError {
            path: manifest_path,
            source,
        })?;
        let lock = match self.lockfile_path() {
            Some(path) => {
                let bytes = fs::read(&path)
                    .map_err(|source| ManifestError::ReadError { path: path.clone(), source })?;
                Some((path, bytes))
            }
            None => None,
        };
        Ok(WorkspaceSnapshot { manifest, lock })
    }

    /// Write a snapshot back byte for byte
    pub fn restore(&self, snapshot: &WorkspaceSnapshot) -> Result<(), ManifestError> {
        let path = self.manifest_path();
        fs::write(&path, &snapshot.manifest)
            .map_err(|source| ManifestError::WriteError { path, source })?;
        if let Some((path, bytes)) = &snapshot.lock {
            fs::write(path, bytes).map_err(|source| ManifestError::WriteError {
                path: path.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Restore only the lockfile portion of a snapshot
    pub fn restore_lock(&self, snapshot: &WorkspaceSnapshot) -> Result<(), ManifestError> {
        if let Some((path, bytes)) = &snapshot.lock {
            fs::write(path, bytes).map_err(|source| ManifestError::WriteError {
                path: path.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

/// Replace each package's quoted specifier value with its new one,
/// leaving all surrounding text untouched. A package declared in several
/// sections is rewritten in every one. Packages not found in the text
/// are skipped rather than treated as fatal.
fn rewrite_specifiers(
    content: &str,
    upgrades: &[(String, String)],
    path: &Path,
) -> Result<(String, usize), ManifestError> {
    let mut result = content.to_string();
    let mut count = 0;

    for (package, new_spec) in upgrades {
        // Matches: "package-name": "anything", with flexible whitespace.
        // The name is escaped because scoped packages contain '@' and '/'.
        let pattern = format!(r#"("{}"\s*:\s*)"[^"]*""#, regex::escape(package));
        let re = Regex::new(&pattern).map_err(|e| ManifestError::JsonParseError {
            path: path.to_path_buf(),
            message: format!("invalid rewrite pattern for '{}': {}", package, e),
        })?;

        let mut replaced = false;
        let rewritten = re.replace_all(&result, |caps: &regex::Captures| {
            replaced = true;
            format!(r#"{}"{}""#, &caps[1], new_spec)
        });
        if replaced {
            result = rewritten.into_owned();
            count += 1;
        }
    }

    Ok((result, count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project(manifest: &str) -> (TempDir, Workspace) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), manifest).unwrap();
        let ws = Workspace::open(dir.path()).unwrap();
        (dir, ws)
    }

    #[test]
    fn test_open_missing_manifest() {
        let dir = TempDir::new().unwrap();
        let result = Workspace::open(dir.path());
        assert!(matches!(result, Err(ManifestError::NotFound { .. })));
    }

    #[test]
    fn test_dependencies_in_declaration_order() {
        let (_dir, ws) = project(
            r#"{
  "dependencies": {
    "zod": "^3.0.0",
    "axios": "^1.0.0"
  },
  "devDependencies": {
    "typescript": "^5.0.0"
  }
}"#,
        );

        let deps = ws.dependencies().unwrap();
        let names: Vec<&str> = deps.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["zod", "axios", "typescript"]);
        assert_eq!(deps[0].section, "dependencies");
        assert_eq!(deps[2].section, "devDependencies");
    }

    #[test]
    fn test_non_string_value_kept_with_no_raw() {
        let (_dir, ws) = project(
            r#"{
  "dependencies": {
    "weird": 42,
    "normal": "^1.0.0"
  }
}"#,
        );

        let deps = ws.dependencies().unwrap();
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].raw, None);
        assert_eq!(deps[1].raw, Some("^1.0.0".to_string()));
    }

    #[test]
    fn test_invalid_json() {
        let (_dir, ws) = project("not json");
        assert!(matches!(
            ws.dependencies(),
            Err(ManifestError::JsonParseError { .. })
        ));
    }

    #[test]
    fn test_apply_upgrades_preserves_formatting() {
        let manifest = r#"{
  "name": "test-package",
  "version": "1.0.0",
  "dependencies": {
    "zod": "^3.0.0",
    "axios": "^1.0.0",
    "lodash": "^4.17.21"
  }
}"#;
        let (_dir, ws) = project(manifest);

        let count = ws
            .apply_upgrades(&[("axios".to_string(), "^1.5.0".to_string())])
            .unwrap();
        assert_eq!(count, 1);

        let result = ws.read_manifest().unwrap();
        assert_eq!(result, manifest.replace("^1.0.0", "^1.5.0"));
    }

    #[test]
    fn test_apply_upgrades_rewrites_every_section() {
        let (_dir, ws) = project(
            r#"{
  "dependencies": { "react": "^17.0.0" },
  "peerDependencies": { "react": "^17.0.0" }
}"#,
        );

        ws.apply_upgrades(&[("react".to_string(), "^18.2.0".to_string())])
            .unwrap();

        let result = ws.read_manifest().unwrap();
        assert_eq!(result.matches("^18.2.0").count(), 2);
        assert!(!result.contains("^17.0.0"));
    }

    #[test]
    fn test_apply_upgrades_scoped_package() {
        let (_dir, ws) = project(
            r#"{
  "dependencies": {
    "@types/node": "^20.0.0"
  }
}"#,
        );

        ws.apply_upgrades(&[("@types/node".to_string(), "^20.10.0".to_string())])
            .unwrap();
        assert!(ws
            .read_manifest()
            .unwrap()
            .contains(r#""@types/node": "^20.10.0""#));
    }

    #[test]
    fn test_apply_upgrades_missing_package_is_skipped() {
        let (_dir, ws) = project(r#"{ "dependencies": {} }"#);
        let count = ws
            .apply_upgrades(&[("ghost".to_string(), "^1.0.0".to_string())])
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_has_script() {
        let (_dir, ws) = project(
            r#"{
  "scripts": {
    "test": "jest",
    "doctor": "node check.js"
  }
}"#,
        );
        assert!(ws.has_script("test").unwrap());
        assert!(ws.has_script("doctor").unwrap());
        assert!(!ws.has_script("build").unwrap());
    }

    #[test]
    fn test_snapshot_and_restore_round_trip() {
        let (dir, ws) = project(r#"{ "dependencies": { "a": "^1.0.0" } }"#);
        fs::write(dir.path().join("package-lock.json"), b"lock-v1").unwrap();

        let snapshot = ws.snapshot().unwrap();

        ws.apply_upgrades(&[("a".to_string(), "^2.0.0".to_string())])
            .unwrap();
        fs::write(dir.path().join("package-lock.json"), b"lock-v2").unwrap();

        ws.restore(&snapshot).unwrap();
        assert!(ws.read_manifest().unwrap().contains("^1.0.0"));
        assert_eq!(
            fs::read(dir.path().join("package-lock.json")).unwrap(),
            b"lock-v1"
        );
    }

    #[test]
    fn test_restore_lock_only() {
        let (dir, ws) = project(r#"{ "dependencies": { "a": "^1.0.0" } }"#);
        fs::write(dir.path().join("yarn.lock"), b"good").unwrap();

        let snapshot = ws.snapshot().unwrap();
        fs::write(dir.path().join("yarn.lock"), b"broken").unwrap();
        ws.apply_upgrades(&[("a".to_string(), "^2.0.0".to_string())])
            .unwrap();

        ws.restore_lock(&snapshot).unwrap();
        assert_eq!(fs::read(dir.path().join("yarn.lock")).unwrap(), b"good");
        // Manifest untouched by a lock-only restore
        assert!(ws.read_manifest().unwrap().contains("^2.0.0"));
    }
}
