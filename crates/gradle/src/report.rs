//! Migration report generation
//!
//! One deterministic, ordered report per run: a before/after entry for
//! every changed declaration, one entry per issue with severity and
//! location, and summary counts. Renders as colored terminal text or JSON.

use crate::error::Result;
use crate::model::{Dialect, MigrationIssue, Severity};
use crate::rewrite::Change;
use colored::Colorize;
use kspshift_core::error::exit_codes;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How the run treats the files it processes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// Report only, never write
    Analyze,
    /// Full pipeline, preview writes
    DryRun,
    /// Full pipeline, write rewritten scripts
    Migrate,
}

/// Report for one build script
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReport {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dialect: Option<Dialect>,
    /// Applied (or planned) changes, in source order
    pub changes: Vec<Change>,
    /// Findings, in source order
    pub issues: Vec<MigrationIssue>,
    /// Parse or IO failure that aborted this file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// A conflict blocked rewriting this file
    pub blocked: bool,
    /// The rewritten content was written back
    pub rewritten: bool,
}

impl FileReport {
    /// A file that could not be processed at all
    pub fn failed(path: PathBuf, message: String) -> Self {
        Self {
            path,
            dialect: None,
            changes: Vec::new(),
            issues: Vec::new(),
            error: Some(message),
            blocked: false,
            rewritten: false,
        }
    }

    pub fn conflict_count(&self) -> usize {
        self.count(Severity::Conflict)
    }

    pub fn manual_review_count(&self) -> usize {
        self.count(Severity::ManualReview)
    }

    fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }
}

/// Aggregated report over one batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationReport {
    pub mode: RunMode,
    pub rule_table_version: String,
    pub files: Vec<FileReport>,
}

impl MigrationReport {
    pub fn new(mode: RunMode, rule_table_version: impl Into<String>) -> Self {
        Self {
            mode,
            rule_table_version: rule_table_version.into(),
            files: Vec::new(),
        }
    }

    pub fn add(&mut self, file: FileReport) {
        self.files.push(file);
    }

    pub fn change_count(&self) -> usize {
        self.files.iter().map(|f| f.changes.len()).sum()
    }

    pub fn conflict_count(&self) -> usize {
        self.files.iter().map(FileReport::conflict_count).sum()
    }

    pub fn manual_review_count(&self) -> usize {
        self.files.iter().map(FileReport::manual_review_count).sum()
    }

    pub fn failure_count(&self) -> usize {
        self.files.iter().filter(|f| f.error.is_some()).count()
    }

    /// Process exit code for this run
    ///
    /// Unreadable input outranks conflicts; manual-review findings never
    /// change the exit code.
    pub fn exit_code(&self) -> i32 {
        if self.failure_count() > 0 {
            exit_codes::PARSE_ERROR
        } else if self.conflict_count() > 0 {
            exit_codes::CONFLICT
        } else {
            exit_codes::SUCCESS
        }
    }

    /// Export the report as pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Print the report to the terminal
    pub fn print(&self) {
        let title = match self.mode {
            RunMode::Analyze => "KAPT → KSP Analysis",
            RunMode::DryRun => "KAPT → KSP Migration (dry run)",
            RunMode::Migrate => "KAPT → KSP Migration",
        };
        println!("\n{} {}", title.bold(), format!("(rules {})", self.rule_table_version).dimmed());
        println!("{}", "=".repeat(title.chars().count() + 1).bold());

        for file in &self.files {
            println!();
            println!("📄 {}", file.path.display().to_string().bold());

            if let Some(error) = &file.error {
                println!("  {} {}", "✗".red(), error.red());
                continue;
            }

            if file.changes.is_empty() && file.issues.is_empty() {
                println!("  {}", "nothing to migrate".dimmed());
                continue;
            }

            for change in &file.changes {
                println!(
                    "  {} {} {}",
                    "✓".green(),
                    change.description,
                    format!("(line {})", change.line).dimmed()
                );
                for line in change.before.lines() {
                    println!("    {} {}", "-".red(), line.dimmed());
                }
                for line in change.after.lines() {
                    println!("    {} {}", "+".green(), line);
                }
            }

            for issue in &file.issues {
                let tag = match issue.severity {
                    Severity::Info => "ℹ".blue().to_string(),
                    Severity::ManualReview => "⚠".yellow().to_string(),
                    Severity::Conflict => "✗".red().to_string(),
                };
                println!(
                    "  {} {} {}",
                    tag,
                    issue.message,
                    format!("(line {})", issue.line).dimmed()
                );
            }

            if file.blocked {
                println!("  {}", "file left unchanged because of conflicts".red());
            }
        }

        self.print_summary();
    }

    fn print_summary(&self) {
        let verb = match self.mode {
            RunMode::Migrate => "applied",
            _ => "planned",
        };

        println!();
        let summary = format!(
            "{} change(s) {}, {} manual review(s), {} conflict(s), {} failure(s) across {} file(s)",
            self.change_count(),
            verb,
            self.manual_review_count(),
            self.conflict_count(),
            self.failure_count(),
            self.files.len()
        );

        if self.exit_code() == exit_codes::SUCCESS {
            println!("✅ {}", summary.green());
        } else {
            println!("❌ {}", summary.red());
        }
    }
}
