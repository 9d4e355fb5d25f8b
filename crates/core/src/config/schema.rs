//! Configuration schema definitions

use serde::{Deserialize, Serialize};

/// Root configuration schema
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigSchema {
    /// Build-script discovery settings
    #[serde(default)]
    pub scan: ScanConfig,

    /// Rule table settings
    #[serde(default)]
    pub rules: RulesConfig,

    /// Report rendering settings
    #[serde(default)]
    pub report: ReportConfig,
}

/// Build-script discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Additional glob patterns to exclude from directory scans
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self { exclude: Vec::new() }
    }
}

/// Rule table configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RulesConfig {
    /// Path to a rule table overriding the embedded one
    #[serde(default)]
    pub path: Option<String>,
}

/// Report rendering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Default output format: "text" or "json"
    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
        }
    }
}

fn default_format() -> String {
    "text".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let schema = ConfigSchema::default();
        assert!(schema.scan.exclude.is_empty());
        assert!(schema.rules.path.is_none());
        assert_eq!(schema.report.format, "text");
    }

    #[test]
    fn test_partial_toml() {
        let schema: ConfigSchema = toml::from_str(
            r#"
            [scan]
            exclude = ["**/samples/**"]
            "#,
        )
        .unwrap();
        assert_eq!(schema.scan.exclude, vec!["**/samples/**"]);
        assert_eq!(schema.report.format, "text");
    }
}
