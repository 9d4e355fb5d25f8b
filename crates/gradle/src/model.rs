//! Parsed representation of one Gradle build script
//!
//! The model keeps byte spans into the original text instead of a full
//! syntax tree. Everything the parser does not recognize stays in the
//! original buffer untouched, which is what makes lossless rewriting
//! possible: the rewriter splices replacements into the source text rather
//! than re-serializing a model.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Byte range into the original script text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// The text this span covers
    pub fn slice<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Which Gradle DSL a script is written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dialect {
    Groovy,
    KotlinDsl,
}

impl Dialect {
    /// Infer the dialect from the script file name
    pub fn from_path(path: &Path) -> Self {
        if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(".kts"))
        {
            Self::KotlinDsl
        } else {
            Self::Groovy
        }
    }
}

/// How a plugin is declared in the script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PluginForm {
    /// `id 'x'` / `id("x")` inside a plugins block
    PluginsDslId,
    /// `kotlin("kapt")` shorthand (Kotlin DSL)
    KotlinShorthand,
    /// `apply plugin: 'x'` / `apply(plugin = "x")`
    LegacyApply,
}

/// A plugin declaration
#[derive(Debug, Clone)]
pub struct PluginDeclaration {
    /// Plugin id, with `kotlin("x")` normalized to `org.jetbrains.kotlin.x`
    pub id: String,
    pub form: PluginForm,
    pub version: Option<String>,
    /// Trailing `apply true/false`, when present
    pub apply_flag: Option<bool>,
    /// The whole declaration statement, excluding trailing comments
    pub span: Span,
    pub line: usize,
    /// Quote character the declaration uses
    pub quote: char,
}

/// A `group:artifact[:version]` dependency notation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coordinate {
    pub group: String,
    pub artifact: String,
    pub version: Option<String>,
}

impl Coordinate {
    /// Parse a `group:artifact[:version]` string; anything else is not a
    /// coordinate (project refs, catalog accessors, ...)
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.split(':');
        let group = parts.next()?.trim();
        let artifact = parts.next()?.trim();
        if group.is_empty() || artifact.is_empty() {
            return None;
        }
        let version = parts.next().map(|v| v.trim().to_string());
        // More than three segments is not a plain coordinate
        if parts.next().is_some() {
            return None;
        }
        Some(Self {
            group: group.to_string(),
            artifact: artifact.to_string(),
            version,
        })
    }

    /// `group:artifact`, the identity of the processor regardless of version
    pub fn key(&self) -> String {
        format!("{}:{}", self.group, self.artifact)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{}:{}:{}", self.group, self.artifact, v),
            None => write!(f, "{}:{}", self.group, self.artifact),
        }
    }
}

/// A dependency declared under an annotation-processing configuration
#[derive(Debug, Clone)]
pub struct DependencyDeclaration {
    /// Full configuration keyword, e.g. `kaptAndroidTest`
    pub configuration: String,
    /// Base keyword: `kapt` or `ksp`
    pub base: String,
    /// Variant qualifier, e.g. `AndroidTest` (empty for the base keyword)
    pub qualifier: String,
    /// Span of the configuration keyword only
    pub keyword_span: Span,
    /// Parsed coordinate, when the argument is a plain string notation
    pub coordinate: Option<Coordinate>,
    /// Span of the coordinate string contents (inside the quotes)
    pub coordinate_span: Option<Span>,
    pub line: usize,
}

/// A directive inside a `kapt`/`ksp` block that is not an argument
#[derive(Debug, Clone)]
pub struct BlockSetting {
    pub name: String,
    pub line: usize,
}

/// A top-level `kapt { ... }` or `ksp { ... }` configuration block
#[derive(Debug, Clone)]
pub struct ConfigurationBlock {
    /// Block name: `kapt` or `ksp`
    pub name: String,
    /// From the block name through the closing brace
    pub span: Span,
    /// Processor arguments in declaration order
    pub args: Vec<(String, String)>,
    /// Non-argument directives found in the block
    pub settings: Vec<BlockSetting>,
    pub line: usize,
    /// Leading whitespace of the line the block starts on
    pub indent: String,
}

/// The parsed form of one build script
#[derive(Debug, Clone)]
pub struct Descriptor {
    pub path: PathBuf,
    pub dialect: Dialect,
    /// The original text; spans index into this buffer
    pub source: String,
    pub plugins: Vec<PluginDeclaration>,
    pub dependencies: Vec<DependencyDeclaration>,
    pub blocks: Vec<ConfigurationBlock>,
}

impl Descriptor {
    /// 1-based line number of a byte offset
    pub fn line_of(&self, offset: usize) -> usize {
        line_of(&self.source, offset)
    }
}

/// 1-based line number of a byte offset in `source`
pub fn line_of(source: &str, offset: usize) -> usize {
    source
        .as_bytes()
        .iter()
        .take(offset)
        .filter(|&&b| b == b'\n')
        .count()
        + 1
}

/// Severity of a migration issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
    /// Advisory note, nothing to do before migrating
    Info,
    /// A human must review source code or build setup
    ManualReview,
    /// Mutually exclusive declarations; blocks rewriting the file
    Conflict,
}

/// A finding produced while classifying or rewriting one script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationIssue {
    pub severity: Severity,
    pub message: String,
    pub line: usize,
}
