//! The rule table
//!
//! All KAPT → KSP knowledge lives in a versioned TOML document, not in
//! code: plugin-id mappings, dependency-configuration mappings, the
//! argument-block syntax mapping, and per-library processor records. The
//! default table is embedded in the binary; `--rules` swaps in another one.
//! Adding support for a new library means adding a `[[processor]]` record,
//! never touching the engine.

use crate::model::Severity;
use kspshift_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// The embedded default rule table
pub const DEFAULT_RULES: &str = include_str!("../rules/default.toml");

/// Which side of the migration a token belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolchainSide {
    /// KAPT, the mechanism being migrated away from
    Source,
    /// KSP, the mechanism being migrated to
    Target,
}

/// Table metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableInfo {
    pub version: String,
}

/// Kotlin plugin version to KSP plugin version mapping entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginVersionRule {
    pub kotlin: String,
    pub ksp: String,
}

/// Plugin-identifier mapping rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginRules {
    pub target_id: String,
    pub source_ids: Vec<String>,
    /// Module name in the `kotlin("...")` shorthand, e.g. `kapt`
    #[serde(default)]
    pub source_shorthand: Option<String>,
    #[serde(default)]
    pub versions: Vec<PluginVersionRule>,
}

/// Dependency-configuration keyword mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigurationRules {
    pub source_base: String,
    pub target_base: String,
}

/// A KAPT block setting with no KSP equivalent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsupportedSetting {
    pub name: String,
    pub note: String,
}

/// Argument-block syntax mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgumentRules {
    pub source_block: String,
    pub target_block: String,
    /// The nested wrapper the source syntax uses (`arguments { ... }`)
    pub nested_wrapper: String,
    #[serde(default)]
    pub unsupported: Vec<UnsupportedSetting>,
}

/// How a known processor supports KSP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessorSupport {
    /// Same artifact works under both mechanisms
    Native,
    /// The library ships a dedicated KSP artifact
    Renamed,
    /// No KSP processor exists
    Unsupported,
}

/// An advisory note attached to a processor record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorNote {
    pub severity: Severity,
    pub text: String,
}

/// A known annotation processor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorRule {
    pub name: String,
    /// `group:artifact` of the KAPT-side processor
    pub artifact: String,
    pub support: ProcessorSupport,
    /// `group:artifact` of the KSP-side processor, for `renamed` support
    #[serde(default)]
    pub replacement: Option<String>,
    #[serde(default)]
    pub notes: Vec<ProcessorNote>,
}

/// The complete, validated rule table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleTable {
    pub table: TableInfo,
    pub plugins: PluginRules,
    pub configurations: ConfigurationRules,
    pub arguments: ArgumentRules,
    #[serde(default, rename = "processor")]
    pub processors: Vec<ProcessorRule>,
}

impl RuleTable {
    /// The embedded default table
    pub fn embedded() -> Result<Self> {
        Self::from_str(DEFAULT_RULES)
            .map_err(|e| e.with_context("While loading the embedded rule table"))
    }

    /// Load a table from a TOML file
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::file_not_found(path));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
            .map_err(|e| e.with_context(format!("While loading rule table {}", path.display())))
    }

    /// Load the table from `path`, or the embedded default when `None`
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_path(p),
            None => Self::embedded(),
        }
    }

    fn from_str(content: &str) -> Result<Self> {
        let table: RuleTable = toml::from_str(content)?;
        table.validate()?;
        Ok(table)
    }

    /// Reject inconsistent tables so classification stays deterministic
    ///
    /// A source token mapped twice would make the rewrite ambiguous; such
    /// tables are refused outright instead of being resolved silently.
    fn validate(&self) -> Result<()> {
        if self.plugins.source_ids.is_empty() {
            return Err(Error::rule_table("plugins.source_ids must not be empty"));
        }
        if self.plugins.source_ids.contains(&self.plugins.target_id) {
            return Err(Error::rule_table(format!(
                "plugin id {} appears as both source and target",
                self.plugins.target_id
            )));
        }

        let mut seen = HashSet::new();
        for id in &self.plugins.source_ids {
            if !seen.insert(id.as_str()) {
                return Err(Error::duplicate_rule(id));
            }
        }

        let mut seen = HashSet::new();
        for v in &self.plugins.versions {
            if !seen.insert(v.kotlin.as_str()) {
                return Err(Error::duplicate_rule(&v.kotlin));
            }
        }

        if self.configurations.source_base == self.configurations.target_base {
            return Err(Error::rule_table(
                "configurations.source_base and target_base must differ",
            ));
        }

        let mut seen = HashSet::new();
        for s in &self.arguments.unsupported {
            if !seen.insert(s.name.as_str()) {
                return Err(Error::duplicate_rule(&s.name));
            }
        }

        let mut seen = HashSet::new();
        for p in &self.processors {
            if !seen.insert(p.artifact.as_str()) {
                return Err(Error::duplicate_rule(&p.artifact));
            }
            match p.support {
                ProcessorSupport::Renamed if p.replacement.is_none() => {
                    return Err(Error::rule_table(format!(
                        "processor {} is marked renamed but has no replacement artifact",
                        p.name
                    )));
                }
                ProcessorSupport::Native | ProcessorSupport::Unsupported
                    if p.replacement.is_some() =>
                {
                    return Err(Error::rule_table(format!(
                        "processor {} must not carry a replacement artifact",
                        p.name
                    )));
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Which side a plugin id belongs to, if either
    pub fn plugin_side(&self, id: &str) -> Option<ToolchainSide> {
        if self.plugins.source_ids.iter().any(|s| s == id) {
            Some(ToolchainSide::Source)
        } else if self.plugins.target_id == id {
            Some(ToolchainSide::Target)
        } else {
            None
        }
    }

    /// KSP plugin version matching a Kotlin plugin version
    pub fn ksp_version_for(&self, kotlin: &str) -> Option<&str> {
        self.plugins
            .versions
            .iter()
            .find(|v| v.kotlin == kotlin)
            .map(|v| v.ksp.as_str())
    }

    /// Known-processor record for a KAPT-side `group:artifact` key
    pub fn processor_for(&self, key: &str) -> Option<&ProcessorRule> {
        self.processors.iter().find(|p| p.artifact == key)
    }

    /// Known-processor record that a KSP-side `group:artifact` key belongs to
    ///
    /// For `renamed` processors the KSP side uses the replacement artifact;
    /// for everything else both sides share one artifact.
    pub fn processor_for_target(&self, key: &str) -> Option<&ProcessorRule> {
        self.processors.iter().find(|p| match p.support {
            ProcessorSupport::Renamed => p.replacement.as_deref() == Some(key),
            _ => p.artifact == key,
        })
    }

    /// Note attached to a KAPT block setting, when the setting is unmapped
    pub fn unsupported_setting(&self, name: &str) -> Option<&UnsupportedSetting> {
        self.arguments.unsupported.iter().find(|s| s.name == name)
    }

    /// Target configuration keyword for a variant qualifier
    pub fn target_configuration(&self, qualifier: &str) -> String {
        format!("{}{}", self.configurations.target_base, qualifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_embedded_table_loads() {
        let table = RuleTable::embedded().unwrap();
        assert_eq!(table.plugins.target_id, crate::KSP_PLUGIN_ID);
        assert!(table
            .plugins
            .source_ids
            .iter()
            .any(|id| id == crate::KAPT_PLUGIN_ID));
        assert!(table.processors.len() >= 5);
    }

    #[test]
    fn test_plugin_side() {
        let table = RuleTable::embedded().unwrap();
        assert_eq!(
            table.plugin_side("org.jetbrains.kotlin.kapt"),
            Some(ToolchainSide::Source)
        );
        assert_eq!(table.plugin_side("kotlin-kapt"), Some(ToolchainSide::Source));
        assert_eq!(
            table.plugin_side("com.google.devtools.ksp"),
            Some(ToolchainSide::Target)
        );
        assert_eq!(table.plugin_side("com.android.application"), None);
    }

    #[test]
    fn test_version_mapping() {
        let table = RuleTable::embedded().unwrap();
        assert_eq!(table.ksp_version_for("1.9.24"), Some("1.9.24-1.0.20"));
        assert!(table.ksp_version_for("1.5.0").is_none());
    }

    #[test]
    fn test_processor_lookup() {
        let table = RuleTable::embedded().unwrap();
        let room = table.processor_for("androidx.room:room-compiler").unwrap();
        assert_eq!(room.support, ProcessorSupport::Native);

        let glide = table.processor_for("com.github.bumptech.glide:compiler").unwrap();
        assert_eq!(glide.support, ProcessorSupport::Renamed);
        assert_eq!(
            glide.replacement.as_deref(),
            Some("com.github.bumptech.glide:ksp")
        );

        // The KSP-side artifact maps back to the same logical processor
        let back = table
            .processor_for_target("com.github.bumptech.glide:ksp")
            .unwrap();
        assert_eq!(back.name, glide.name);
    }

    #[test]
    fn test_unsupported_setting_lookup() {
        let table = RuleTable::embedded().unwrap();
        assert!(table.unsupported_setting("correctErrorTypes").is_some());
        assert!(table.unsupported_setting("arguments").is_none());
    }

    #[test]
    fn test_target_configuration() {
        let table = RuleTable::embedded().unwrap();
        assert_eq!(table.target_configuration(""), "ksp");
        assert_eq!(table.target_configuration("AndroidTest"), "kspAndroidTest");
    }

    #[test]
    fn test_duplicate_processor_rejected() {
        let mut table = RuleTable::embedded().unwrap();
        table.processors.push(ProcessorRule {
            name: "Room again".to_string(),
            artifact: "androidx.room:room-compiler".to_string(),
            support: ProcessorSupport::Native,
            replacement: None,
            notes: Vec::new(),
        });
        assert!(table.validate().is_err());
    }

    #[test]
    fn test_renamed_requires_replacement() {
        let mut table = RuleTable::embedded().unwrap();
        table.processors.push(ProcessorRule {
            name: "Broken".to_string(),
            artifact: "g:a".to_string(),
            support: ProcessorSupport::Renamed,
            replacement: None,
            notes: Vec::new(),
        });
        assert!(table.validate().is_err());
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DEFAULT_RULES.as_bytes()).unwrap();
        let table = RuleTable::from_path(file.path()).unwrap();
        assert_eq!(table.table.version, "2024.2");
    }

    #[test]
    fn test_missing_rules_file() {
        assert!(RuleTable::from_path(Path::new("/nonexistent/rules.toml")).is_err());
    }
}
