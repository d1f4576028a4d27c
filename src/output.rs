//! Report formatting for resolution and doctor runs
//!
//! This module provides:
//! - Human-readable text output with colored bump levels
//! - Skip reasons per package in verbose mode
//! - Doctor accepted/rejected summary
//! - JSON output for machine consumption

use crate::doctor::DoctorReport;
use crate::domain::Specifier;
use crate::engine::EngineReport;
use colored::Colorize;
use serde_json::json;
use std::io::Write;

/// How much detail the text report carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

/// Which part of a version changed between two specifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BumpLevel {
    Major,
    Minor,
    Patch,
    Unknown,
}

impl BumpLevel {
    /// Classify the jump between two specifier strings by their
    /// release triples. Operator prefixes are ignored.
    pub fn between(from: &str, to: &str) -> Self {
        let triple = |s: &str| {
            Specifier::parse(s)
                .and_then(|spec| spec.current_version())
                .map(|v| (v.major, v.minor, v.patch))
        };
        match (triple(from), triple(to)) {
            (Some((fm, fi, _)), Some((tm, ti, _))) => {
                if tm != fm {
                    BumpLevel::Major
                } else if ti != fi {
                    BumpLevel::Minor
                } else {
                    BumpLevel::Patch
                }
            }
            _ => BumpLevel::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BumpLevel::Major => "major",
            BumpLevel::Minor => "minor",
            BumpLevel::Patch => "patch",
            BumpLevel::Unknown => "?",
        }
    }

    fn colored_label(&self) -> String {
        match self {
            BumpLevel::Major => "major".red().bold().to_string(),
            BumpLevel::Minor => "minor".cyan().to_string(),
            BumpLevel::Patch => "patch".green().to_string(),
            BumpLevel::Unknown => "?".dimmed().to_string(),
        }
    }
}

/// Human-readable text report
pub struct TextReport {
    verbosity: Verbosity,
    /// True when the manifest was (or will be) rewritten; changes the
    /// closing hint from "run with -u" to "upgraded"
    upgrading: bool,
    color: bool,
}

impl TextReport {
    pub fn new(verbosity: Verbosity, upgrading: bool) -> Self {
        Self {
            verbosity,
            upgrading,
            color: true,
        }
    }

    pub fn with_color(verbosity: Verbosity, upgrading: bool, color: bool) -> Self {
        Self {
            verbosity,
            upgrading,
            color,
        }
    }

    pub fn write(
        &self,
        report: &EngineReport,
        doctor: Option<&DoctorReport>,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        let upgrades: Vec<_> = report
            .decisions
            .iter()
            .filter(|d| d.is_upgrade())
            .collect();

        if self.verbosity == Verbosity::Quiet {
            return self.write_quiet_summary(upgrades.len(), writer);
        }

        let width = upgrades
            .iter()
            .map(|d| d.name.len())
            .max()
            .unwrap_or(0)
            .max(16);

        for decision in &upgrades {
            let Some(to) = &decision.to else { continue };
            let level = BumpLevel::between(&decision.from, to);
            if self.color {
                writeln!(
                    writer,
                    "  {:width$} {} {} {} [{}]",
                    decision.name,
                    decision.from.dimmed(),
                    "→".dimmed(),
                    to.bright_white().bold(),
                    level.colored_label(),
                    width = width
                )?;
            } else {
                writeln!(
                    writer,
                    "  {:width$} {} -> {} [{}]",
                    decision.name,
                    decision.from,
                    to,
                    level.label(),
                    width = width
                )?;
            }
        }

        if self.verbosity == Verbosity::Verbose {
            self.write_skips(report, writer)?;
        }
        self.write_diagnostics(report, writer)?;
        self.write_summary(report, writer)?;

        if let Some(doctor) = doctor {
            self.write_doctor(doctor, writer)?;
        }
        Ok(())
    }

    fn write_skips(&self, report: &EngineReport, writer: &mut dyn Write) -> std::io::Result<()> {
        let skips: Vec<_> = report
            .decisions
            .iter()
            .filter(|d| !d.is_upgrade() && !d.is_diagnostic())
            .collect();
        if skips.is_empty() {
            return Ok(());
        }

        writeln!(writer)?;
        if self.color {
            writeln!(writer, "  {}", "Skipped:".dimmed())?;
        } else {
            writeln!(writer, "  Skipped:")?;
        }
        let width = skips.iter().map(|d| d.name.len()).max().unwrap_or(0).max(16);
        for decision in &skips {
            let reason = decision
                .reason
                .as_ref()
                .map(|r| r.to_string())
                .unwrap_or_default();
            if self.color {
                writeln!(
                    writer,
                    "  {} {}",
                    format!("{:width$}", decision.name, width = width).dimmed(),
                    format!("({})", reason).dimmed()
                )?;
            } else {
                writeln!(writer, "  {:width$} ({})", decision.name, reason, width = width)?;
            }
        }
        Ok(())
    }

    fn write_diagnostics(
        &self,
        report: &EngineReport,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        let diagnostics = report.diagnostics();
        if diagnostics.is_empty() {
            return Ok(());
        }
        writeln!(writer)?;
        if self.color {
            writeln!(writer, "{}:", "Warnings".yellow().bold())?;
        } else {
            writeln!(writer, "Warnings:")?;
        }
        for line in &diagnostics {
            if self.color {
                writeln!(writer, "  {} {}", "!".yellow(), line)?;
            } else {
                writeln!(writer, "  - {}", line)?;
            }
        }
        Ok(())
    }

    fn write_summary(&self, report: &EngineReport, writer: &mut dyn Write) -> std::io::Result<()> {
        let count = report.upgrade_count();
        writeln!(writer)?;
        if count == 0 {
            if self.color {
                writeln!(writer, "{}", "All dependencies match their targets.".dimmed())?;
            } else {
                writeln!(writer, "All dependencies match their targets.")?;
            }
            return Ok(());
        }

        let noun = if count == 1 { "upgrade" } else { "upgrades" };
        if self.upgrading {
            if self.color {
                writeln!(
                    writer,
                    "{} {} written to package.json",
                    count.to_string().green(),
                    noun
                )?;
            } else {
                writeln!(writer, "{} {} written to package.json", count, noun)?;
            }
        } else if self.color {
            writeln!(
                writer,
                "{} {} available. Run with {} to apply them.",
                count.to_string().green(),
                noun,
                "-u".cyan()
            )?;
        } else {
            writeln!(writer, "{} {} available. Run with -u to apply them.", count, noun)?;
        }
        Ok(())
    }

    fn write_doctor(&self, doctor: &DoctorReport, writer: &mut dyn Write) -> std::io::Result<()> {
        writeln!(writer)?;
        if self.color {
            writeln!(writer, "{}:", "Doctor".bold())?;
        } else {
            writeln!(writer, "Doctor:")?;
        }
        if doctor.verified_wholesale {
            if self.color {
                writeln!(writer, "  {} all upgrades verified together", "✓".green())?;
            } else {
                writeln!(writer, "  all upgrades verified together")?;
            }
            return Ok(());
        }
        for (name, to) in &doctor.accepted {
            if self.color {
                writeln!(writer, "  {} {} {}", "✓".green(), name, to)?;
            } else {
                writeln!(writer, "  + {} {}", name, to)?;
            }
        }
        for name in &doctor.rejected {
            if self.color {
                writeln!(writer, "  {} {} {}", "✗".red(), name, "(breaks tests)".dimmed())?;
            } else {
                writeln!(writer, "  - {} (breaks tests)", name)?;
            }
        }
        writeln!(
            writer,
            "  {} accepted, {} rejected",
            doctor.accepted.len(),
            doctor.rejected_count()
        )?;
        Ok(())
    }

    fn write_quiet_summary(&self, count: usize, writer: &mut dyn Write) -> std::io::Result<()> {
        if count > 0 {
            writeln!(writer, "{} upgradable", count)?;
        } else {
            writeln!(writer, "No upgrades")?;
        }
        Ok(())
    }
}

/// Machine-readable JSON report
pub struct JsonReport;

impl JsonReport {
    pub fn write(
        report: &EngineReport,
        doctor: Option<&DoctorReport>,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        let upgrades: Vec<_> = report
            .decisions
            .iter()
            .filter(|d| d.is_upgrade())
            .map(|d| {
                json!({
                    "name": d.name,
                    "from": d.from,
                    "to": d.to,
                    "level": d.to.as_deref()
                        .map(|to| BumpLevel::between(&d.from, to).label()),
                })
            })
            .collect();
        let skipped: Vec<_> = report
            .decisions
            .iter()
            .filter(|d| !d.is_upgrade())
            .map(|d| {
                json!({
                    "name": d.name,
                    "from": d.from,
                    "reason": d.reason.as_ref().map(|r| r.to_string()),
                })
            })
            .collect();

        let mut root = json!({
            "upgrades": upgrades,
            "skipped": skipped,
        });
        if let Some(doctor) = doctor {
            root["doctor"] = json!({
                "accepted": doctor
                    .accepted
                    .iter()
                    .map(|(name, to)| json!({ "name": name, "to": to }))
                    .collect::<Vec<_>>(),
                "rejected": doctor.rejected,
                "verifiedWholesale": doctor.verified_wholesale,
            });
        }

        writeln!(writer, "{}", serde_json::to_string_pretty(&root)?)?;
        Ok(())
    }
}
