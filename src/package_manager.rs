//! Node.js package manager integration
//!
//! This module provides:
//! - Lockfile-based detection of the package manager in use
//! - Install, single-package install and test-command execution
//!
//! The doctor protocol drives these commands; everything here is
//! synchronous process execution with captured output.

use std::path::Path;
use std::process::{Command, Output};

/// Known lockfile names, in detection preference order
pub const LOCKFILE_NAMES: &[&str] = &[
    "pnpm-lock.yaml",
    "yarn.lock",
    "bun.lockb",
    "package-lock.json",
];

/// A Node.js package manager flavor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PmKind {
    Npm,
    Yarn,
    Pnpm,
    Bun,
}

impl PmKind {
    pub fn binary(&self) -> &'static str {
        match self {
            PmKind::Npm => "npm",
            PmKind::Yarn => "yarn",
            PmKind::Pnpm => "pnpm",
            PmKind::Bun => "bun",
        }
    }

    /// Detect the package manager from lockfiles, defaulting to npm
    pub fn detect(working_dir: &Path) -> Self {
        if working_dir.join("pnpm-lock.yaml").exists() {
            return PmKind::Pnpm;
        }
        if working_dir.join("yarn.lock").exists() {
            return PmKind::Yarn;
        }
        if working_dir.join("bun.lockb").exists() {
            return PmKind::Bun;
        }
        PmKind::Npm
    }
}

/// Result of one executed package manager command
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    /// The command that was executed
    pub command: String,
    /// Whether the command exited successfully
    pub success: bool,
    /// Standard output from the command
    pub stdout: String,
    /// Standard error from the command
    pub stderr: String,
}

impl CommandOutcome {
    pub fn success(command: String, stdout: String, stderr: String) -> Self {
        Self {
            command,
            success: true,
            stdout,
            stderr,
        }
    }

    pub fn failure(command: String, stdout: String, stderr: String) -> Self {
        Self {
            command,
            success: false,
            stdout,
            stderr,
        }
    }

    /// Last portion of stderr, for compact failure reporting
    pub fn stderr_tail(&self, lines: usize) -> String {
        let all: Vec<&str> = self.stderr.lines().collect();
        let start = all.len().saturating_sub(lines);
        all[start..].join("\n")
    }
}

/// Trait for running package manager commands in a project directory
pub trait PackageManagerRunner: Send + Sync {
    /// Full install from the manifest (`npm install` and friends)
    fn install(&self, working_dir: &Path) -> CommandOutcome;

    /// Install one package at an exact version without touching the
    /// manifest where the manager supports that
    fn install_single(&self, working_dir: &Path, package: &str, version: &str) -> CommandOutcome;

    /// Run an arbitrary test command, split on whitespace
    fn run_test(&self, working_dir: &Path, command: &str) -> CommandOutcome;

    /// Run a lifecycle script declared in package.json
    fn run_script(&self, working_dir: &Path, script: &str) -> CommandOutcome;

    /// Whether `install_single` writes the package into the manifest.
    /// When true the caller must restore the manifest afterwards.
    fn persists_single_install(&self) -> bool;
}

/// Runner that executes real package manager processes
#[derive(Debug, Clone, Copy)]
pub struct SystemPackageManager {
    kind: PmKind,
}

impl SystemPackageManager {
    pub fn new(kind: PmKind) -> Self {
        Self { kind }
    }

    /// Detect the manager for a project directory
    pub fn detect(working_dir: &Path) -> Self {
        Self::new(PmKind::detect(working_dir))
    }

    pub fn kind(&self) -> PmKind {
        self.kind
    }

    fn install_single_command(&self, package: &str, version: &str) -> Vec<String> {
        let spec = format!("{}@{}", package, version);
        match self.kind {
            PmKind::Npm => vec![
                "npm".into(),
                "install".into(),
                spec,
                "--no-save".into(),
            ],
            PmKind::Yarn => vec!["yarn".into(), "add".into(), spec],
            PmKind::Pnpm => vec!["pnpm".into(), "add".into(), spec],
            PmKind::Bun => vec!["bun".into(), "add".into(), spec],
        }
    }

    fn run(&self, command: &[String], working_dir: &Path) -> CommandOutcome {
        let command_str = command.join(" ");
        if command.is_empty() {
            return CommandOutcome::failure(command_str, String::new(), "empty command".into());
        }

        match self.spawn(command, working_dir) {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout).to_string();
                let stderr = String::from_utf8_lossy(&output.stderr).to_string();
                if output.status.success() {
                    CommandOutcome::success(command_str, stdout, stderr)
                } else {
                    CommandOutcome::failure(command_str, stdout, stderr)
                }
            }
            Err(e) => CommandOutcome::failure(
                command_str,
                String::new(),
                format!("failed to execute command: {}", e),
            ),
        }
    }

    fn spawn(&self, command: &[String], working_dir: &Path) -> std::io::Result<Output> {
        Command::new(&command[0])
            .args(&command[1..])
            .current_dir(working_dir)
            .output()
    }
}

impl PackageManagerRunner for SystemPackageManager {
    fn install(&self, working_dir: &Path) -> CommandOutcome {
        let command = vec![self.kind.binary().to_string(), "install".to_string()];
        self.run(&command, working_dir)
    }

    fn install_single(&self, working_dir: &Path, package: &str, version: &str) -> CommandOutcome {
        let command = self.install_single_command(package, version);
        self.run(&command, working_dir)
    }

    fn run_test(&self, working_dir: &Path, command: &str) -> CommandOutcome {
        let parts: Vec<String> = command.split_whitespace().map(String::from).collect();
        if parts.is_empty() {
            return CommandOutcome::failure(
                command.to_string(),
                String::new(),
                "empty test command".into(),
            );
        }
        self.run(&parts, working_dir)
    }

    fn run_script(&self, working_dir: &Path, script: &str) -> CommandOutcome {
        let command = vec![
            self.kind.binary().to_string(),
            "run".to_string(),
            script.to_string(),
        ];
        self.run(&command, working_dir)
    }

    fn persists_single_install(&self) -> bool {
        // npm honors --no-save; the add-style managers write the
        // manifest on every single-package install.
        self.kind != PmKind::Npm
    }
}
