//! Declaration classification
//!
//! A pure pass over one [`Descriptor`] against the rule table. Every
//! matched declaration gets exactly one action from a closed set: migrate,
//! manual-review, or conflict. Classification depends only on the
//! descriptor's content and the table, so the same input always yields the
//! same action list.

use crate::model::{Descriptor, MigrationIssue, PluginForm, Severity};
use crate::rules::{ProcessorSupport, RuleTable, ToolchainSide};
use std::collections::BTreeMap;

/// What should happen to one declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// A direct, unambiguous rewrite exists
    Migrate,
    /// A rewrite exists but needs human judgment; left untouched
    ManualReview,
    /// Mutually exclusive declarations coexist; blocks the file
    Conflict,
}

/// Which declaration an action refers to (index into the descriptor)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetRef {
    Plugin(usize),
    Dependency(usize),
    Block(usize),
}

/// One classified action
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub target: TargetRef,
    pub kind: ActionKind,
    pub line: usize,
    pub message: String,
}

/// The ordered result of classifying one descriptor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    /// One entry per matched declaration, in source order
    pub actions: Vec<Action>,
    /// Advisory findings attached to the actions (never blocking)
    pub notes: Vec<MigrationIssue>,
}

impl Classification {
    pub fn has_conflict(&self) -> bool {
        self.actions.iter().any(|a| a.kind == ActionKind::Conflict)
    }

    pub fn migrate_count(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| a.kind == ActionKind::Migrate)
            .count()
    }
}

/// Classify every matched declaration of a descriptor
pub fn classify(desc: &Descriptor, rules: &RuleTable) -> Classification {
    let mut c = Classification::default();

    classify_plugins(desc, rules, &mut c);
    classify_dependencies(desc, rules, &mut c);
    classify_blocks(desc, rules, &mut c);

    c.actions.sort_by_key(|a| a.line);
    c.notes.sort_by(|a, b| (a.line, a.severity).cmp(&(b.line, b.severity)));

    tracing::debug!(
        path = %desc.path.display(),
        actions = c.actions.len(),
        conflicts = c.actions.iter().filter(|a| a.kind == ActionKind::Conflict).count(),
        "classified build script"
    );

    c
}

fn classify_plugins(desc: &Descriptor, rules: &RuleTable, c: &mut Classification) {
    let mut source = Vec::new();
    let mut target = Vec::new();

    for (i, p) in desc.plugins.iter().enumerate() {
        match rules.plugin_side(&p.id) {
            Some(ToolchainSide::Source) => source.push(i),
            Some(ToolchainSide::Target) => target.push(i),
            None => {}
        }
    }

    // Mixing both mechanisms in one compilation unit is invalid; raise it
    // instead of picking a side.
    if let (Some(&s), Some(&t)) = (source.first(), target.first()) {
        let sp = &desc.plugins[s];
        let tp = &desc.plugins[t];
        c.actions.push(Action {
            target: TargetRef::Plugin(s),
            kind: ActionKind::Conflict,
            line: sp.line,
            message: format!(
                "both {} (line {}) and {} (line {}) are applied; a module cannot mix both annotation-processing mechanisms",
                sp.id, sp.line, tp.id, tp.line
            ),
        });
        return;
    }

    for &i in &source {
        let p = &desc.plugins[i];
        match p.version.as_deref() {
            None => {
                c.actions.push(Action {
                    target: TargetRef::Plugin(i),
                    kind: ActionKind::Migrate,
                    line: p.line,
                    message: format!("plugin {} → {}", p.id, rules.plugins.target_id),
                });
                if p.form == PluginForm::KotlinShorthand {
                    c.notes.push(MigrationIssue {
                        severity: Severity::Info,
                        message: format!(
                            "{} has no implicit version; pin it to the release matching the project's Kotlin version",
                            rules.plugins.target_id
                        ),
                        line: p.line,
                    });
                }
            }
            Some(v) => match rules.ksp_version_for(v) {
                Some(ksp) => {
                    c.actions.push(Action {
                        target: TargetRef::Plugin(i),
                        kind: ActionKind::Migrate,
                        line: p.line,
                        message: format!(
                            "plugin {} {} → {} {}",
                            p.id, v, rules.plugins.target_id, ksp
                        ),
                    });
                }
                None => {
                    c.actions.push(Action {
                        target: TargetRef::Plugin(i),
                        kind: ActionKind::ManualReview,
                        line: p.line,
                        message: format!(
                            "no known {} release for Kotlin {}; add it to the rule table or migrate this declaration manually",
                            rules.plugins.target_id, v
                        ),
                    });
                }
            },
        }
    }
}

fn classify_dependencies(desc: &Descriptor, rules: &RuleTable, c: &mut Classification) {
    // Logical processor key → (source-side indices, target-side indices).
    // Known processors group by rule name so a renamed artifact pair still
    // collides; unknown ones group by group:artifact.
    let mut by_key: BTreeMap<String, (Vec<usize>, Vec<usize>)> = BTreeMap::new();

    for (i, d) in desc.dependencies.iter().enumerate() {
        let Some(coord) = &d.coordinate else { continue };
        let key = coord.key();
        if d.base == rules.configurations.source_base {
            let logical = rules
                .processor_for(&key)
                .map(|p| p.name.clone())
                .unwrap_or(key);
            by_key.entry(logical).or_default().0.push(i);
        } else {
            let logical = rules
                .processor_for_target(&key)
                .map(|p| p.name.clone())
                .unwrap_or(key);
            by_key.entry(logical).or_default().1.push(i);
        }
    }

    let mut conflicted: Vec<usize> = Vec::new();
    for (key, (sources, targets)) in &by_key {
        if sources.is_empty() || targets.is_empty() {
            continue;
        }
        let s = &desc.dependencies[sources[0]];
        let t = &desc.dependencies[targets[0]];
        c.actions.push(Action {
            target: TargetRef::Dependency(sources[0]),
            kind: ActionKind::Conflict,
            line: s.line,
            message: format!(
                "{} is declared under both {} (line {}) and {} (line {}); remove one before migrating",
                key, s.configuration, s.line, t.configuration, t.line
            ),
        });
        conflicted.extend(sources.iter().chain(targets.iter()));
    }

    for (i, d) in desc.dependencies.iter().enumerate() {
        if d.base != rules.configurations.source_base || conflicted.contains(&i) {
            continue;
        }

        let target_conf = rules.target_configuration(&d.qualifier);
        let Some(coord) = &d.coordinate else {
            c.actions.push(Action {
                target: TargetRef::Dependency(i),
                kind: ActionKind::Migrate,
                line: d.line,
                message: format!("dependency configuration {} → {}", d.configuration, target_conf),
            });
            continue;
        };

        match rules.processor_for(&coord.key()) {
            Some(rule) if rule.support == ProcessorSupport::Unsupported => {
                let detail = rule
                    .notes
                    .iter()
                    .find(|n| n.severity == Severity::ManualReview)
                    .map(|n| n.text.as_str())
                    .unwrap_or("no KSP processor exists for it");
                c.actions.push(Action {
                    target: TargetRef::Dependency(i),
                    kind: ActionKind::ManualReview,
                    line: d.line,
                    message: format!("{} ({}) cannot move to KSP: {}", rule.name, coord, detail),
                });
            }
            Some(rule) => {
                let message = match (&rule.support, &rule.replacement) {
                    (ProcessorSupport::Renamed, Some(replacement)) => format!(
                        "dependency configuration {} → {} and artifact {} → {}",
                        d.configuration,
                        target_conf,
                        coord.key(),
                        replacement
                    ),
                    _ => format!(
                        "dependency configuration {} → {} for {}",
                        d.configuration, target_conf, coord
                    ),
                };
                c.actions.push(Action {
                    target: TargetRef::Dependency(i),
                    kind: ActionKind::Migrate,
                    line: d.line,
                    message,
                });
                for note in &rule.notes {
                    c.notes.push(MigrationIssue {
                        severity: note.severity,
                        message: format!("{}: {}", rule.name, note.text),
                        line: d.line,
                    });
                }
            }
            None => {
                c.actions.push(Action {
                    target: TargetRef::Dependency(i),
                    kind: ActionKind::Migrate,
                    line: d.line,
                    message: format!(
                        "dependency configuration {} → {} for {}",
                        d.configuration, target_conf, coord
                    ),
                });
            }
        }
    }
}

fn classify_blocks(desc: &Descriptor, rules: &RuleTable, c: &mut Classification) {
    let has_target_block = desc
        .blocks
        .iter()
        .any(|b| b.name == rules.arguments.target_block);

    for (i, block) in desc.blocks.iter().enumerate() {
        if block.name != rules.arguments.source_block {
            continue;
        }

        if !block.settings.is_empty() {
            let names: Vec<&str> = block.settings.iter().map(|s| s.name.as_str()).collect();
            c.actions.push(Action {
                target: TargetRef::Block(i),
                kind: ActionKind::ManualReview,
                line: block.line,
                message: format!(
                    "{} block carries settings with no {} equivalent: {}",
                    block.name,
                    rules.arguments.target_block,
                    names.join(", ")
                ),
            });
            for setting in &block.settings {
                let detail = rules
                    .unsupported_setting(&setting.name)
                    .map(|s| s.note.clone())
                    .unwrap_or_else(|| {
                        format!("{} has no documented KSP equivalent", setting.name)
                    });
                c.notes.push(MigrationIssue {
                    severity: Severity::ManualReview,
                    message: format!("{}: {}", setting.name, detail),
                    line: setting.line,
                });
            }
        } else if has_target_block {
            c.actions.push(Action {
                target: TargetRef::Block(i),
                kind: ActionKind::ManualReview,
                line: block.line,
                message: format!(
                    "a {} block already exists; merge the {} arguments into it manually",
                    rules.arguments.target_block, block.name
                ),
            });
        } else {
            c.actions.push(Action {
                target: TargetRef::Block(i),
                kind: ActionKind::Migrate,
                line: block.line,
                message: format!(
                    "{} arguments block → {} block ({} arguments)",
                    block.name,
                    rules.arguments.target_block,
                    block.args.len()
                ),
            });
        }
    }
}
