//! KAPT → KSP migration engine for Gradle build scripts
//!
//! This crate provides functionality to:
//! - Parse Gradle build scripts (Groovy and Kotlin DSL) into a span-based model
//! - Classify annotation-processor declarations against a versioned rule table
//! - Rewrite migratable declarations while preserving every unmatched byte
//! - Report changes, manual-review findings, and conflicts
//!
//! The pipeline is one-shot and per-file: parse → classify → rewrite →
//! report, with no state shared between files beyond the immutable rule
//! table.

pub mod classify;
pub mod error;
pub mod migrator;
pub mod model;
pub mod parse;
pub mod report;
pub mod rewrite;
pub mod rules;

pub use error::{MigrateError, ParseError, Result};
pub use migrator::GradleMigrator;
pub use model::{Descriptor, Dialect, MigrationIssue, Severity};
pub use report::{FileReport, MigrationReport, RunMode};
pub use rules::RuleTable;

/// Canonical KSP plugin id
pub const KSP_PLUGIN_ID: &str = "com.google.devtools.ksp";

/// Canonical KAPT plugin id
pub const KAPT_PLUGIN_ID: &str = "org.jetbrains.kotlin.kapt";
