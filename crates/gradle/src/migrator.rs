//! Pipeline orchestration
//!
//! Drives parse → classify → rewrite → report for each build script and
//! aggregates a batch. Every failure is scoped to its file: a script that
//! cannot be read or parsed becomes a failed entry in the report and the
//! batch moves on.

use crate::classify::{classify, ActionKind};
use crate::error::Result;
use crate::model::{MigrationIssue, Severity};
use crate::parse::parse;
use crate::report::{FileReport, MigrationReport, RunMode};
use crate::rewrite::rewrite;
use crate::rules::RuleTable;
use kspshift_core::file_scanner::{is_gradle_script, scan_gradle_scripts};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// One-shot migration runner over a set of build scripts
///
/// The rule table is immutable for the lifetime of a run, so one instance
/// can process any number of files.
pub struct GradleMigrator {
    rules: RuleTable,
    mode: RunMode,
    output: Option<PathBuf>,
}

impl GradleMigrator {
    pub fn new(rules: RuleTable, mode: RunMode) -> Self {
        Self {
            rules,
            mode,
            output: None,
        }
    }

    /// Write the rewritten script here instead of back in place
    ///
    /// Only meaningful for single-file runs; the caller enforces that.
    pub fn with_output(mut self, output: Option<PathBuf>) -> Self {
        self.output = output;
        self
    }

    /// Expand files and directories into the list of scripts to process
    ///
    /// Directories are scanned recursively for `build.gradle` /
    /// `build.gradle.kts`; explicit file paths are taken as given.
    pub fn collect_scripts(paths: &[PathBuf], extra_excludes: &[String]) -> Result<Vec<PathBuf>> {
        let mut scripts = Vec::new();
        let mut seen = HashSet::new();

        for path in paths {
            if path.is_dir() {
                for script in scan_gradle_scripts(path, extra_excludes)? {
                    if seen.insert(script.clone()) {
                        scripts.push(script);
                    }
                }
            } else if seen.insert(path.clone()) {
                if !is_gradle_script(path) {
                    tracing::debug!(path = %path.display(), "explicit path does not follow the build-script naming convention");
                }
                scripts.push(path.clone());
            }
        }

        Ok(scripts)
    }

    /// Process a batch of scripts into one aggregated report
    pub fn run(&self, scripts: &[PathBuf]) -> MigrationReport {
        let mut report = MigrationReport::new(self.mode, self.rules.table.version.clone());
        for path in scripts {
            report.add(self.process_file(path));
        }
        report
    }

    /// Run the four pipeline stages for one script
    pub fn process_file(&self, path: &Path) -> FileReport {
        let source = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot read build script");
                return FileReport::failed(path.to_path_buf(), format!("cannot read: {e}"));
            }
        };

        let descriptor = match parse(path, &source) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "parse failed");
                return FileReport::failed(path.to_path_buf(), e.to_string());
            }
        };

        let classification = classify(&descriptor, &self.rules);
        let rw = rewrite(&descriptor, &classification, &self.rules);

        let mut issues: Vec<MigrationIssue> = classification
            .actions
            .iter()
            .filter_map(|a| {
                let severity = match a.kind {
                    ActionKind::Migrate => return None,
                    ActionKind::ManualReview => Severity::ManualReview,
                    ActionKind::Conflict => Severity::Conflict,
                };
                Some(MigrationIssue {
                    severity,
                    message: a.message.clone(),
                    line: a.line,
                })
            })
            .collect();
        issues.extend(classification.notes.iter().cloned());
        issues.sort_by(|a, b| (a.line, a.severity).cmp(&(b.line, b.severity)));

        let mut rewritten = false;
        if self.mode == RunMode::Migrate && !rw.blocked && !rw.is_noop() {
            let dest = self.output.as_deref().unwrap_or(path);
            if let Err(e) = std::fs::write(dest, &rw.text) {
                tracing::warn!(path = %dest.display(), error = %e, "cannot write rewritten script");
                return FileReport::failed(path.to_path_buf(), format!("cannot write: {e}"));
            }
            rewritten = true;
            tracing::info!(
                path = %dest.display(),
                changes = rw.changes.len(),
                "rewrote build script"
            );
        }

        FileReport {
            path: path.to_path_buf(),
            dialect: Some(descriptor.dialect),
            changes: rw.changes,
            issues,
            error: None,
            blocked: rw.blocked,
            rewritten,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kspshift_core::error::exit_codes;
    use std::fs;

    const KAPT_SCRIPT: &str = "plugins {\n    id 'org.jetbrains.kotlin.kapt'\n}\n\ndependencies {\n    kapt \"g:a:1.0\"\n}\n";

    fn migrator(mode: RunMode) -> GradleMigrator {
        GradleMigrator::new(RuleTable::embedded().unwrap(), mode)
    }

    #[test]
    fn test_analyze_does_not_modify_files() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("build.gradle");
        fs::write(&script, KAPT_SCRIPT).unwrap();

        let report = migrator(RunMode::Analyze).run(&[script.clone()]);

        assert_eq!(report.change_count(), 2);
        assert_eq!(report.exit_code(), exit_codes::SUCCESS);
        assert_eq!(fs::read_to_string(&script).unwrap(), KAPT_SCRIPT);
        assert!(!report.files[0].rewritten);
    }

    #[test]
    fn test_migrate_writes_rewritten_script() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("build.gradle");
        fs::write(&script, KAPT_SCRIPT).unwrap();

        let report = migrator(RunMode::Migrate).run(&[script.clone()]);

        assert!(report.files[0].rewritten);
        let migrated = fs::read_to_string(&script).unwrap();
        assert!(migrated.contains("id 'com.google.devtools.ksp'"));
        assert!(migrated.contains("ksp \"g:a:1.0\""));
        assert!(!migrated.contains("kapt"));
    }

    #[test]
    fn test_dry_run_leaves_files_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("build.gradle");
        fs::write(&script, KAPT_SCRIPT).unwrap();

        let report = migrator(RunMode::DryRun).run(&[script.clone()]);

        assert_eq!(report.change_count(), 2);
        assert!(!report.files[0].rewritten);
        assert_eq!(fs::read_to_string(&script).unwrap(), KAPT_SCRIPT);
    }

    #[test]
    fn test_conflict_blocks_file_and_sets_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("build.gradle");
        let src = "dependencies {\n    kapt \"g:a:1.0\"\n    ksp \"g:a:1.0\"\n}\n";
        fs::write(&script, src).unwrap();

        let report = migrator(RunMode::Migrate).run(&[script.clone()]);

        assert_eq!(report.conflict_count(), 1);
        assert_eq!(report.exit_code(), exit_codes::CONFLICT);
        assert!(report.files[0].blocked);
        assert_eq!(fs::read_to_string(&script).unwrap(), src);
    }

    #[test]
    fn test_parse_failure_is_file_scoped() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("build.gradle");
        fs::write(&broken, "dependencies {\n    kapt \"g:a:1.0\"\n").unwrap();
        let good = dir.path().join("build.gradle.kts");
        fs::write(&good, "dependencies {\n    kapt(\"g:a:1.0\")\n}\n").unwrap();

        let report =
            migrator(RunMode::Migrate).run(&[broken.clone(), good.clone()]);

        assert_eq!(report.failure_count(), 1);
        assert_eq!(report.exit_code(), exit_codes::PARSE_ERROR);
        assert!(report.files[0].error.as_deref().unwrap().contains("unbalanced"));

        // The broken file is untouched, the good one still migrated
        assert!(fs::read_to_string(&broken).unwrap().contains("kapt"));
        assert!(fs::read_to_string(&good).unwrap().contains("ksp(\"g:a:1.0\")"));
    }

    #[test]
    fn test_output_path_leaves_original_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("build.gradle");
        fs::write(&script, KAPT_SCRIPT).unwrap();
        let out = dir.path().join("build.gradle.migrated");

        let m = migrator(RunMode::Migrate).with_output(Some(out.clone()));
        let report = m.run(&[script.clone()]);

        assert!(report.files[0].rewritten);
        assert_eq!(fs::read_to_string(&script).unwrap(), KAPT_SCRIPT);
        assert!(fs::read_to_string(&out).unwrap().contains("ksp \"g:a:1.0\""));
    }

    #[test]
    fn test_second_migrate_run_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("build.gradle");
        fs::write(&script, KAPT_SCRIPT).unwrap();

        let m = migrator(RunMode::Migrate);
        m.run(&[script.clone()]);
        let after_first = fs::read_to_string(&script).unwrap();

        let second = m.run(&[script.clone()]);
        assert_eq!(second.change_count(), 0);
        assert!(!second.files[0].rewritten);
        assert_eq!(fs::read_to_string(&script).unwrap(), after_first);
    }

    #[test]
    fn test_collect_scripts_expands_directories() {
        let dir = tempfile::tempdir().unwrap();
        let app = dir.path().join("app");
        fs::create_dir_all(&app).unwrap();
        fs::write(app.join("build.gradle"), KAPT_SCRIPT).unwrap();
        fs::write(dir.path().join("build.gradle.kts"), "plugins {\n}\n").unwrap();

        let scripts = GradleMigrator::collect_scripts(
            &[dir.path().to_path_buf(), app.join("build.gradle")],
            &[],
        )
        .unwrap();

        // Directory expansion plus an explicit duplicate collapses to two
        assert_eq!(scripts.len(), 2);
    }

    #[test]
    fn test_missing_file_reported_not_fatal() {
        let report = migrator(RunMode::Analyze).run(&[PathBuf::from("/nonexistent/build.gradle")]);
        assert_eq!(report.failure_count(), 1);
        assert_eq!(report.exit_code(), exit_codes::PARSE_ERROR);
    }
}
