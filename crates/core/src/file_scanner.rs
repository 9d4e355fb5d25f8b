//! File scanning utilities
//!
//! Provides build-script discovery and filtering across a project tree.

use crate::error::Result;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File names recognized as Gradle build scripts
pub const GRADLE_SCRIPT_NAMES: &[&str] = &["build.gradle", "build.gradle.kts"];

/// File scanner with configurable filters
pub struct FileScanner {
    root: PathBuf,
    file_names: Vec<String>,
    exclude_patterns: Vec<String>,
}

impl FileScanner {
    /// Create a new file scanner rooted at the given path
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            file_names: Vec::new(),
            exclude_patterns: Vec::new(),
        }
    }

    /// Filter by exact file names (e.g. "build.gradle")
    pub fn with_file_names(mut self, names: &[&str]) -> Self {
        self.file_names = names.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Add patterns to exclude (glob patterns)
    pub fn exclude(mut self, patterns: &[&str]) -> Self {
        self.exclude_patterns
            .extend(patterns.iter().map(|s| s.to_string()));
        self
    }

    /// Scan and return matching files, sorted for deterministic output
    pub fn scan(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for entry in WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            // The explicit root is always traversed, hidden or not
            .filter_entry(|e| e.depth() == 0 || !self.is_hidden(e.path()))
            .filter_map(|e| e.ok())
        {
            let path = entry.path();

            if !path.is_file() {
                continue;
            }

            // Check file name filter
            if !self.file_names.is_empty() {
                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("");
                if !self.file_names.iter().any(|f| f == name) {
                    continue;
                }
            }

            // Check exclude patterns
            let path_str = path.to_string_lossy();
            if self.should_exclude(&path_str) {
                continue;
            }

            files.push(path.to_path_buf());
        }

        files.sort();
        Ok(files)
    }

    fn is_hidden(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with('.') && n != "." && n != "..")
            .unwrap_or(false)
    }

    fn should_exclude(&self, path_str: &str) -> bool {
        for pattern in &self.exclude_patterns {
            // Simple glob matching
            if pattern.contains("**") {
                let parts: Vec<&str> = pattern.split("**").collect();
                if parts.len() == 3 {
                    // "**/name/**" means any path containing the segment
                    let segment = parts[1].trim_matches('/');
                    if path_str
                        .split('/')
                        .any(|component| component == segment)
                    {
                        return true;
                    }
                } else if parts.len() == 2 {
                    let suffix = parts[1].trim_start_matches('/');
                    if path_str.contains(suffix) {
                        return true;
                    }
                }
            } else if let Ok(pat) = glob::Pattern::new(pattern) {
                if pat.matches(path_str) {
                    return true;
                }
            }
        }
        false
    }
}

/// Whether a path names a Gradle build script
pub fn is_gradle_script(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| GRADLE_SCRIPT_NAMES.contains(&n))
        .unwrap_or(false)
}

/// Scan for Gradle build scripts in a directory
///
/// Output directories are excluded so a previous build cannot feed generated
/// scripts back into the scan.
pub fn scan_gradle_scripts(root: &Path, extra_excludes: &[String]) -> Result<Vec<PathBuf>> {
    let extra: Vec<&str> = extra_excludes.iter().map(String::as_str).collect();
    FileScanner::new(root)
        .with_file_names(GRADLE_SCRIPT_NAMES)
        .exclude(&["**/build/**"])
        .exclude(&extra)
        .scan()
}
