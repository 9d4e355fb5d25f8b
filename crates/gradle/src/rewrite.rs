//! Span-edit rewriting
//!
//! The rewriter never re-serializes the parsed model. It plans
//! `(span, replacement)` edits for the migrate-tagged actions and splices
//! them into the original buffer, so every unmatched byte survives
//! unchanged and rewriting one declaration cannot touch another. A conflict
//! anywhere in the file blocks all of its edits.

use crate::classify::{ActionKind, Classification, TargetRef};
use crate::model::{
    ConfigurationBlock, DependencyDeclaration, Descriptor, Dialect, PluginDeclaration, PluginForm,
    Span,
};
use crate::rules::{ProcessorSupport, RuleTable};
use serde::{Deserialize, Serialize};

/// One applied change as a before/after pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub description: String,
    pub line: usize,
    pub before: String,
    pub after: String,
}

/// The result of rewriting one descriptor
#[derive(Debug, Clone)]
pub struct Rewrite {
    /// Full rewritten text; equals the input when nothing was applied
    pub text: String,
    pub changes: Vec<Change>,
    /// True when a conflict blocked the whole file
    pub blocked: bool,
}

impl Rewrite {
    pub fn is_noop(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Apply every migrate-tagged action to the descriptor's text
pub fn rewrite(desc: &Descriptor, classification: &Classification, rules: &RuleTable) -> Rewrite {
    if classification.has_conflict() {
        return Rewrite {
            text: desc.source.clone(),
            changes: Vec::new(),
            blocked: true,
        };
    }

    let mut edits: Vec<(Span, String)> = Vec::new();
    let mut changes = Vec::new();

    for action in &classification.actions {
        if action.kind != ActionKind::Migrate {
            continue;
        }

        let planned = match action.target {
            TargetRef::Plugin(i) => plugin_edits(desc, &desc.plugins[i], rules),
            TargetRef::Dependency(i) => dependency_edits(&desc.dependencies[i], rules),
            TargetRef::Block(i) => block_edits(&desc.blocks[i], rules),
        };

        changes.push(change_entry(desc, &action.message, action.line, &planned));
        edits.extend(planned);
    }

    edits.sort_by_key(|(span, _)| span.start);
    debug_assert!(edits.windows(2).all(|w| w[0].0.end <= w[1].0.start));

    Rewrite {
        text: splice(&desc.source, &edits),
        changes,
        blocked: false,
    }
}

/// Splice sorted, non-overlapping edits into `source`
fn splice(source: &str, edits: &[(Span, String)]) -> String {
    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;
    for (span, replacement) in edits {
        out.push_str(&source[cursor..span.start]);
        out.push_str(replacement);
        cursor = span.end;
    }
    out.push_str(&source[cursor..]);
    out
}

/// Build a before/after pair covering the lines an action's edits touch
fn change_entry(desc: &Descriptor, message: &str, line: usize, edits: &[(Span, String)]) -> Change {
    let start = edits.iter().map(|(s, _)| s.start).min().unwrap_or(0);
    let end = edits.iter().map(|(s, _)| s.end).max().unwrap_or(0);

    let region_start = desc.source[..start].rfind('\n').map(|p| p + 1).unwrap_or(0);
    let region_end = desc.source[end..]
        .find('\n')
        .map(|p| end + p)
        .unwrap_or(desc.source.len());
    let region = Span::new(region_start, region_end);

    let relative: Vec<(Span, String)> = edits
        .iter()
        .map(|(s, r)| {
            (
                Span::new(s.start - region_start, s.end - region_start),
                r.clone(),
            )
        })
        .collect();

    Change {
        description: message.to_string(),
        line,
        before: region.slice(&desc.source).trim().to_string(),
        after: splice(region.slice(&desc.source), &relative).trim().to_string(),
    }
}

fn plugin_edits(
    desc: &Descriptor,
    plugin: &PluginDeclaration,
    rules: &RuleTable,
) -> Vec<(Span, String)> {
    let target = &rules.plugins.target_id;
    let version = plugin
        .version
        .as_deref()
        .and_then(|v| rules.ksp_version_for(v));

    let mut text = match (plugin.form, desc.dialect) {
        (PluginForm::LegacyApply, Dialect::Groovy) => {
            format!("apply plugin: {q}{target}{q}", q = plugin.quote)
        }
        (PluginForm::LegacyApply, Dialect::KotlinDsl) => {
            format!("apply(plugin = \"{target}\")")
        }
        (_, Dialect::KotlinDsl) => format!("id(\"{target}\")"),
        (_, Dialect::Groovy) => format!("id {q}{target}{q}", q = plugin.quote),
    };

    if let Some(ksp) = version {
        match desc.dialect {
            Dialect::KotlinDsl => text.push_str(&format!(" version \"{ksp}\"")),
            Dialect::Groovy => {
                text.push_str(&format!(" version {q}{ksp}{q}", q = plugin.quote));
            }
        }
    }

    if let Some(flag) = plugin.apply_flag {
        text.push_str(&format!(" apply {flag}"));
    }

    vec![(plugin.span, text)]
}

fn dependency_edits(dep: &DependencyDeclaration, rules: &RuleTable) -> Vec<(Span, String)> {
    let mut edits = vec![(dep.keyword_span, rules.target_configuration(&dep.qualifier))];

    if let (Some(coord), Some(coord_span)) = (&dep.coordinate, dep.coordinate_span) {
        if let Some(rule) = rules.processor_for(&coord.key()) {
            if rule.support == ProcessorSupport::Renamed {
                if let Some(replacement) = &rule.replacement {
                    let new_coord = match &coord.version {
                        Some(v) => format!("{}:{}", replacement, v),
                        None => replacement.clone(),
                    };
                    edits.push((coord_span, new_coord));
                }
            }
        }
    }

    edits
}

fn block_edits(block: &ConfigurationBlock, rules: &RuleTable) -> Vec<(Span, String)> {
    let target = &rules.arguments.target_block;
    let indent = &block.indent;

    let mut text = format!("{target} {{\n");
    for (key, value) in &block.args {
        text.push_str(&format!("{indent}    arg(\"{key}\", \"{value}\")\n"));
    }
    text.push_str(&format!("{indent}}}"));

    vec![(block.span, text)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::parse::parse;
    use std::path::Path;

    fn run(path: &str, src: &str) -> Rewrite {
        let desc = parse(Path::new(path), src).unwrap();
        let rules = RuleTable::embedded().unwrap();
        let classification = classify(&desc, &rules);
        rewrite(&desc, &classification, &rules)
    }

    fn run_groovy(src: &str) -> Rewrite {
        run("app/build.gradle", src)
    }

    #[test]
    fn test_plugin_swap_groovy() {
        let r = run_groovy("plugins {\n    id 'org.jetbrains.kotlin.kapt'\n}\n");
        assert_eq!(r.text, "plugins {\n    id 'com.google.devtools.ksp'\n}\n");
        assert_eq!(r.changes.len(), 1);
    }

    #[test]
    fn test_plugin_swap_kts_with_version() {
        let r = run(
            "build.gradle.kts",
            "plugins {\n    id(\"org.jetbrains.kotlin.kapt\") version \"1.9.24\" apply false\n}\n",
        );
        assert_eq!(
            r.text,
            "plugins {\n    id(\"com.google.devtools.ksp\") version \"1.9.24-1.0.20\" apply false\n}\n"
        );
    }

    #[test]
    fn test_kotlin_shorthand_rewrite() {
        let r = run("build.gradle.kts", "plugins {\n    kotlin(\"kapt\")\n}\n");
        assert_eq!(
            r.text,
            "plugins {\n    id(\"com.google.devtools.ksp\")\n}\n"
        );
    }

    #[test]
    fn test_legacy_apply_rewrite() {
        let r = run_groovy("apply plugin: 'kotlin-kapt'\n");
        assert_eq!(r.text, "apply plugin: 'com.google.devtools.ksp'\n");
    }

    #[test]
    fn test_dependency_keyword_swap_preserves_coordinate() {
        let r = run_groovy("dependencies {\n    kapt \"g:a:1.0\"\n}\n");
        assert_eq!(r.text, "dependencies {\n    ksp \"g:a:1.0\"\n}\n");
    }

    #[test]
    fn test_qualified_configuration_swap() {
        let r = run_groovy(
            "dependencies {\n    kaptAndroidTest \"com.google.dagger:hilt-android-compiler:2.51\"\n}\n",
        );
        assert!(r.text.contains("kspAndroidTest \"com.google.dagger:hilt-android-compiler:2.51\""));
    }

    #[test]
    fn test_renamed_artifact_keeps_version() {
        let r = run_groovy(
            "dependencies {\n    kapt \"com.github.bumptech.glide:compiler:4.15.1\"\n}\n",
        );
        assert_eq!(
            r.text,
            "dependencies {\n    ksp \"com.github.bumptech.glide:ksp:4.15.1\"\n}\n"
        );
    }

    #[test]
    fn test_block_translation_preserves_argument_order() {
        let r = run_groovy(
            "kapt {\n    arguments {\n        arg(\"room.schemaLocation\", \"$projectDir/schemas\")\n        arg(\"room.incremental\", \"true\")\n    }\n}\n",
        );
        assert_eq!(
            r.text,
            "ksp {\n    arg(\"room.schemaLocation\", \"$projectDir/schemas\")\n    arg(\"room.incremental\", \"true\")\n}\n"
        );
    }

    #[test]
    fn test_indented_block_translation() {
        let r = run_groovy(
            "android {\n}\n  kapt {\n      arguments {\n          arg(\"k\", \"v\")\n      }\n  }\n",
        );
        assert_eq!(r.text, "android {\n}\n  ksp {\n      arg(\"k\", \"v\")\n  }\n");
    }

    #[test]
    fn test_unmatched_content_is_byte_identical() {
        let src = "// header comment\nplugins {\n    id 'com.android.application'\n    id 'org.jetbrains.kotlin.kapt'\n}\n\nandroid {\n    compileSdk 34\n}\n\ndependencies {\n    implementation \"androidx.core:core-ktx:1.12.0\"\n    kapt \"g:a:1.0\"\n}\n";
        let r = run_groovy(src);
        assert_eq!(
            r.text,
            src.replace("id 'org.jetbrains.kotlin.kapt'", "id 'com.google.devtools.ksp'")
                .replace("kapt \"g:a:1.0\"", "ksp \"g:a:1.0\"")
        );
    }

    #[test]
    fn test_conflict_blocks_rewrite() {
        let src = "dependencies {\n    kapt \"g:a:1.0\"\n    ksp \"g:a:1.0\"\n}\n";
        let r = run_groovy(src);
        assert!(r.blocked);
        assert_eq!(r.text, src);
        assert!(r.changes.is_empty());
    }

    #[test]
    fn test_manual_review_left_untouched() {
        let src = "kapt {\n    correctErrorTypes = true\n    arguments {\n        arg(\"k\", \"v\")\n    }\n}\n";
        let r = run_groovy(src);
        assert!(!r.blocked);
        assert_eq!(r.text, src);
        assert!(r.changes.is_empty());
    }

    #[test]
    fn test_change_entries_carry_before_and_after() {
        let r = run_groovy("dependencies {\n    kapt \"androidx.room:room-compiler:2.6.1\"\n}\n");
        assert_eq!(r.changes.len(), 1);
        assert_eq!(r.changes[0].before, "kapt \"androidx.room:room-compiler:2.6.1\"");
        assert_eq!(r.changes[0].after, "ksp \"androidx.room:room-compiler:2.6.1\"");
        assert_eq!(r.changes[0].line, 2);
    }

    #[test]
    fn test_every_table_entry_round_trips() {
        let rules = RuleTable::embedded().unwrap();

        for id in &rules.plugins.source_ids {
            let r = run_groovy(&format!("plugins {{\n    id '{}'\n}}\n", id));
            assert_eq!(
                r.text,
                format!("plugins {{\n    id '{}'\n}}\n", rules.plugins.target_id)
            );
        }

        for v in &rules.plugins.versions {
            let r = run_groovy(&format!(
                "plugins {{\n    id 'org.jetbrains.kotlin.kapt' version '{}'\n}}\n",
                v.kotlin
            ));
            assert!(r.text.contains(&format!("version '{}'", v.ksp)));
        }

        for p in &rules.processors {
            let src = format!("dependencies {{\n    kapt \"{}:1.0\"\n}}\n", p.artifact);
            let r = run_groovy(&src);
            match p.support {
                ProcessorSupport::Unsupported => assert_eq!(r.text, src),
                ProcessorSupport::Renamed => assert_eq!(
                    r.text,
                    format!(
                        "dependencies {{\n    ksp \"{}:1.0\"\n}}\n",
                        p.replacement.as_deref().unwrap()
                    )
                ),
                ProcessorSupport::Native => assert_eq!(
                    r.text,
                    format!("dependencies {{\n    ksp \"{}:1.0\"\n}}\n", p.artifact)
                ),
            }
        }
    }

    #[test]
    fn test_rewrite_is_idempotent_on_full_example() {
        let src = "plugins {\n    id 'com.android.application'\n    id 'org.jetbrains.kotlin.kapt'\n}\n\ndependencies {\n    kapt \"androidx.room:room-compiler:2.6.1\"\n    kaptTest \"g:a:1.0\"\n}\n\nkapt {\n    arguments {\n        arg(\"room.schemaLocation\", \"$projectDir/schemas\")\n    }\n}\n";
        let first = run_groovy(src);
        assert!(!first.is_noop());

        let second = run_groovy(&first.text);
        assert!(second.is_noop());
        assert_eq!(second.text, first.text);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        /// Assemble a valid descriptor from independent fragments
        fn build_source(
            has_plugin: bool,
            versioned: bool,
            dep_mask: u8,
            has_block: bool,
        ) -> String {
            let mut src = String::from("plugins {\n    id 'com.android.application'\n");
            if has_plugin {
                if versioned {
                    src.push_str("    id 'org.jetbrains.kotlin.kapt' version '1.9.24'\n");
                } else {
                    src.push_str("    id 'org.jetbrains.kotlin.kapt'\n");
                }
            }
            src.push_str("}\n\nandroid {\n    compileSdk 34\n}\n\ndependencies {\n");
            if dep_mask & 1 != 0 {
                src.push_str("    implementation \"androidx.core:core-ktx:1.12.0\"\n");
            }
            if dep_mask & 2 != 0 {
                src.push_str("    kapt \"androidx.room:room-compiler:2.6.1\"\n");
            }
            if dep_mask & 4 != 0 {
                src.push_str("    kaptAndroidTest \"g:a:1.0\"\n");
            }
            if dep_mask & 8 != 0 {
                src.push_str("    kapt \"com.github.bumptech.glide:compiler:4.15.1\"\n");
            }
            src.push_str("}\n");
            if has_block {
                src.push_str("\nkapt {\n    arguments {\n        arg(\"k\", \"v\")\n    }\n}\n");
            }
            src
        }

        proptest! {
            #[test]
            fn rewrite_twice_is_rewrite_once(
                has_plugin in any::<bool>(),
                versioned in any::<bool>(),
                dep_mask in 0u8..16,
                has_block in any::<bool>(),
            ) {
                let src = build_source(has_plugin, versioned, dep_mask, has_block);
                let first = run_groovy(&src);
                prop_assert!(!first.blocked);

                let second = run_groovy(&first.text);
                prop_assert!(second.is_noop());
                prop_assert_eq!(second.text, first.text);
            }

            #[test]
            fn unrelated_lines_survive_verbatim(
                has_plugin in any::<bool>(),
                dep_mask in 0u8..16,
            ) {
                let src = build_source(has_plugin, false, dep_mask, false);
                let rewritten = run_groovy(&src).text;
                prop_assert!(
                    rewritten.contains("android {\n    compileSdk 34\n}"),
                    "android block should survive verbatim"
                );
                if dep_mask & 1 != 0 {
                    prop_assert!(
                        rewritten.contains("implementation \"androidx.core:core-ktx:1.12.0\"")
                    );
                }
            }
        }
    }
}
