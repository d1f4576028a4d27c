//! Doctor verification protocol
//!
//! Verifies a batch of resolved upgrades against the project's own test
//! command before committing them:
//! 1. snapshot manifest + lockfile, install and test the baseline;
//! 2. apply the whole batch, install and test; both passing accepts it
//!    wholesale;
//! 3. otherwise roll back and bisect sequentially, one upgrade at a
//!    time, folding each passing upgrade into a last-known-good
//!    snapshot and restoring it on each failure;
//! 4. persist the accepted subset and reinstall the final state.
//!
//! The whole protocol is strictly sequential. Every mutation of the
//! working tree is paired with a snapshot it can be rolled back to; a
//! rollback reinstall that fails is the one unrecoverable condition.

use crate::domain::Specifier;
use crate::error::DoctorError;
use crate::manifest::{Workspace, WorkspaceSnapshot};
use crate::package_manager::{CommandOutcome, PackageManagerRunner};

/// How many stderr lines of a failing command end up in diagnostics
const FAILURE_TAIL_LINES: usize = 20;

/// Protocol states, tracked for reporting and tracing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoctorState {
    Idle,
    BaselineVerify,
    AllApplied,
    VerifiedAll,
    Bisecting,
    Done,
    Fatal,
}

/// Doctor run configuration
#[derive(Debug, Clone)]
pub struct DoctorConfig {
    /// Test command to run after each install
    pub test_command: String,
    /// Lifecycle scripts re-run after a single-package install, which
    /// does not trigger them the way a full install does. Only scripts
    /// actually declared in package.json are invoked.
    pub install_scripts: Vec<String>,
}

impl Default for DoctorConfig {
    fn default() -> Self {
        Self {
            test_command: "npm test".to_string(),
            install_scripts: vec!["prepare".to_string()],
        }
    }
}

/// Outcome of a completed doctor session
#[derive(Debug, Clone, Default)]
pub struct DoctorReport {
    /// Upgrades that passed verification, in manifest order
    pub accepted: Vec<(String, String)>,
    /// Names of upgrades rejected during bisection
    pub rejected: Vec<String>,
    /// True when the whole batch passed without bisection
    pub verified_wholesale: bool,
}

impl DoctorReport {
    pub fn rejected_count(&self) -> usize {
        self.rejected.len()
    }
}

/// One doctor session over a project directory
pub struct DoctorSession<'a> {
    workspace: &'a Workspace,
    pm: &'a dyn PackageManagerRunner,
    config: DoctorConfig,
    state: DoctorState,
}

impl<'a> DoctorSession<'a> {
    pub fn new(
        workspace: &'a Workspace,
        pm: &'a dyn PackageManagerRunner,
        config: DoctorConfig,
    ) -> Self {
        Self {
            workspace,
            pm,
            config,
            state: DoctorState::Idle,
        }
    }

    pub fn state(&self) -> DoctorState {
        self.state
    }

    /// Run the full protocol over an upgrade map in manifest order.
    /// Recoverable failures (a bad upgrade) land in the report; only
    /// invariant violations and baseline failures are errors.
    pub fn run(&mut self, upgrades: &[(String, String)]) -> Result<DoctorReport, DoctorError> {
        let baseline = self.baseline_verify()?;

        if upgrades.is_empty() {
            self.state = DoctorState::Done;
            return Ok(DoctorReport::default());
        }

        if self.apply_all(upgrades, &baseline)? {
            self.state = DoctorState::Done;
            return Ok(DoctorReport {
                accepted: upgrades.to_vec(),
                rejected: Vec::new(),
                verified_wholesale: true,
            });
        }

        let report = self.bisect(upgrades, baseline)?;
        self.state = DoctorState::Done;
        Ok(report)
    }

    /// Snapshot and verify the untouched project. Nothing has been
    /// mutated yet, so failure aborts with nothing to roll back.
    fn baseline_verify(&mut self) -> Result<WorkspaceSnapshot, DoctorError> {
        self.state = DoctorState::BaselineVerify;
        let baseline = self.workspace.snapshot()?;

        let install = self.pm.install(self.workspace.root());
        if !install.success {
            self.state = DoctorState::Fatal;
            return Err(DoctorError::BaselineInstall {
                output: tail(&install),
            });
        }

        let test = self.run_test();
        if !test.success {
            self.state = DoctorState::Fatal;
            return Err(DoctorError::BaselineTest {
                output: tail(&test),
            });
        }

        Ok(baseline)
    }

    /// Apply the whole batch at once. Returns true when install and
    /// test both pass; on failure the baseline is restored and, if the
    /// environment was disturbed by a successful install, reinstalled.
    fn apply_all(
        &mut self,
        upgrades: &[(String, String)],
        baseline: &WorkspaceSnapshot,
    ) -> Result<bool, DoctorError> {
        self.state = DoctorState::AllApplied;
        self.workspace.apply_upgrades(upgrades)?;

        let install = self.pm.install(self.workspace.root());
        let test_passed = install.success && self.run_test().success;
        if test_passed {
            self.state = DoctorState::VerifiedAll;
            return Ok(true);
        }

        self.workspace.restore(baseline)?;
        // A failed install never disturbed the environment, so only a
        // post-install test failure forces a reinstall of the baseline.
        if install.success {
            let reinstall = self.pm.install(self.workspace.root());
            if !reinstall.success {
                self.state = DoctorState::Fatal;
                return Err(DoctorError::InconsistentEnvironment {
                    output: tail(&reinstall),
                });
            }
        }
        Ok(false)
    }

    /// Try each upgrade alone, in manifest order, folding successes
    /// into an accumulating last-known-good snapshot.
    fn bisect(
        &mut self,
        upgrades: &[(String, String)],
        baseline: WorkspaceSnapshot,
    ) -> Result<DoctorReport, DoctorError> {
        self.state = DoctorState::Bisecting;
        let mut good = baseline;
        let mut report = DoctorReport::default();

        for (name, spec) in upgrades {
            let version = pinned_version(spec);
            let install = self
                .pm
                .install_single(self.workspace.root(), name, &version);

            let candidate_ok = install.success
                && self.run_install_scripts()
                && self.run_test().success;

            if candidate_ok {
                report.accepted.push((name.clone(), spec.clone()));
                // The lock now reflects this upgrade; it becomes the
                // rollback point for the remaining candidates.
                good = self.workspace.snapshot()?;
            } else {
                report.rejected.push(name.clone());
                if self.pm.persists_single_install() {
                    self.workspace.restore(&good)?;
                } else {
                    self.workspace.restore_lock(&good)?;
                }
                // The rejected package is still in the working tree;
                // reinstall from the restored lock before moving on.
                let reinstall = self.pm.install(self.workspace.root());
                if !reinstall.success {
                    self.state = DoctorState::Fatal;
                    return Err(DoctorError::InconsistentEnvironment {
                        output: tail(&reinstall),
                    });
                }
            }
        }

        self.finish(&report)?;
        Ok(report)
    }

    /// Persist the accepted subset and reinstall so the working tree
    /// matches exactly what was verified.
    fn finish(&mut self, report: &DoctorReport) -> Result<(), DoctorError> {
        if !report.accepted.is_empty() {
            self.workspace.apply_upgrades(&report.accepted)?;
        }
        let reinstall = self.pm.install(self.workspace.root());
        if !reinstall.success {
            self.state = DoctorState::Fatal;
            return Err(DoctorError::InconsistentEnvironment {
                output: tail(&reinstall),
            });
        }
        Ok(())
    }

    /// Declared lifecycle scripts are skipped by single-package
    /// installs, so re-run them explicitly. A failing script counts as
    /// a failing candidate.
    fn run_install_scripts(&self) -> bool {
        for script in &self.config.install_scripts {
            let declared = self.workspace.has_script(script).unwrap_or(false);
            if declared && !self.pm.run_script(self.workspace.root(), script).success {
                return false;
            }
        }
        true
    }

    fn run_test(&self) -> CommandOutcome {
        self.pm
            .run_test(self.workspace.root(), &self.config.test_command)
    }
}

/// Exact version to hand to the package manager for a single install,
/// stripped of any range operator.
fn pinned_version(spec: &str) -> String {
    Specifier::parse(spec)
        .and_then(|s| s.current_version())
        .map(|v| v.to_string())
        .unwrap_or_else(|| spec.trim().to_string())
}

fn tail(outcome: &CommandOutcome) -> String {
    let t = outcome.stderr_tail(FAILURE_TAIL_LINES);
    if t.is_empty() {
        outcome.command.clone()
    } else {
        t
    }
}
