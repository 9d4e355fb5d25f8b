//! Build-script parsing
//!
//! Not a full Gradle grammar: a structural scan builds the brace-block
//! layout (string- and comment-aware), then line-level patterns extract the
//! three tracked declaration kinds: plugin declarations, annotation-
//! processor dependency declarations, and `kapt`/`ksp` configuration
//! blocks. Every byte the extractor does not claim stays in the source
//! buffer and is reproduced verbatim on rewrite.

use crate::error::{ParseError, ParseErrorKind};
use crate::model::{
    line_of, BlockSetting, ConfigurationBlock, Coordinate, DependencyDeclaration, Descriptor,
    Dialect, PluginDeclaration, PluginForm, Span,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

/// `id 'x' [version 'v'] [apply true|false]`, either DSL
static PLUGIN_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^id\s*\(?\s*(['"])([A-Za-z0-9_.\-]+)['"]\s*\)?(?:\s+version\s*\(?\s*['"]([^'"]+)['"]\s*\)?)?(?:\s+apply\s+(true|false))?$"#,
    )
    .unwrap()
});

/// `kotlin("kapt") [version "v"]` shorthand
static KOTLIN_SHORTHAND_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^kotlin\s*\(\s*"([A-Za-z0-9_.\-]+)"\s*\)(?:\s+version\s+"([^"]+)")?$"#).unwrap()
});

/// `apply plugin: 'x'` / `apply(plugin = "x")`
static APPLY_PLUGIN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^apply\s*(?:\(\s*plugin\s*=\s*|plugin\s*:\s*)(['"])([A-Za-z0-9_.\-]+)['"]\s*\)?$"#)
        .unwrap()
});

/// `kapt "g:a:v"` / `kspTest("g:a:v")` string-notation dependency
static DEP_STRING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(kapt|ksp)([A-Z][A-Za-z0-9]*)?\s*\(?\s*(['"])([^'"]+)['"]\s*\)?$"#).unwrap()
});

/// `kapt(project(":lib"))` and other call-notation dependencies
static DEP_CALL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(kapt|ksp)([A-Z][A-Za-z0-9]*)?\s*\(.*\)$").unwrap());

/// `kapt libs.room.compiler` bare-reference dependency (Groovy)
static DEP_BARE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(kapt|ksp)([A-Z][A-Za-z0-9]*)?\s+[A-Za-z_][A-Za-z0-9_.]*$").unwrap());

/// `arg("key", "value")` processor argument
static ARG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^arg\s*\(\s*(['"])([^'"]+)['"]\s*,\s*(['"])([^'"]*)['"]\s*\)$"#).unwrap()
});

/// Leading identifier of a block directive, e.g. `correctErrorTypes = true`
static SETTING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z][A-Za-z0-9]*)").unwrap());

/// A brace-delimited block found by the structural scanner
#[derive(Debug, Clone)]
struct RawBlock {
    name: String,
    /// Offset of the block-name identifier
    name_start: usize,
    /// Text between the braces, exclusive
    body: Span,
    /// Offset just past the closing brace
    end: usize,
    /// Nesting depth, 0 = top level
    depth: usize,
}

/// Parse one build script into a [`Descriptor`]
pub fn parse(path: &Path, source: &str) -> Result<Descriptor, ParseError> {
    let dialect = Dialect::from_path(path);
    let layout = scan_blocks(source)?;
    let blocks = &layout.blocks;
    let masked = &layout.masked;

    let mut plugins = Vec::new();
    let mut dependencies = Vec::new();
    let mut cfg_blocks = Vec::new();

    for block in blocks.iter().filter(|b| b.depth == 0) {
        match block.name.as_str() {
            "plugins" => extract_plugins(source, block, masked, &mut plugins),
            "dependencies" => {
                extract_dependencies(source, block, blocks, masked, &mut dependencies);
            }
            "kapt" | "ksp" => {
                cfg_blocks.push(extract_config_block(source, block, blocks, masked));
            }
            _ => {}
        }
    }

    extract_legacy_applies(source, blocks, masked, &mut plugins);

    plugins.sort_by_key(|p| p.span.start);
    dependencies.sort_by_key(|d| d.keyword_span.start);
    cfg_blocks.sort_by_key(|b| b.span.start);

    tracing::debug!(
        path = %path.display(),
        plugins = plugins.len(),
        dependencies = dependencies.len(),
        blocks = cfg_blocks.len(),
        "parsed build script"
    );

    Ok(Descriptor {
        path: path.to_path_buf(),
        dialect,
        source: source.to_string(),
        plugins,
        dependencies,
        blocks: cfg_blocks,
    })
}

/// The structural layout of a script: its blocks, plus the ranges that are
/// comments or multi-line strings and must never yield declarations
#[derive(Debug, Default)]
struct Layout {
    blocks: Vec<RawBlock>,
    masked: Vec<Span>,
}

/// Scan the brace-block structure of the script
///
/// Skips strings (single-, double-, and triple-quoted) and comments, so a
/// brace inside either never unbalances the scan. Fails on unbalanced
/// braces, unterminated strings, and unterminated block comments.
fn scan_blocks(source: &str) -> Result<Layout, ParseError> {
    let bytes = source.as_bytes();
    let mut blocks = Vec::new();
    let mut masked = Vec::new();
    let mut stack: Vec<(String, usize, usize)> = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let start = i;
                i += 2;
                loop {
                    if i + 1 >= bytes.len() {
                        return Err(error_at(source, ParseErrorKind::UnterminatedComment, start));
                    }
                    if bytes[i] == b'*' && bytes[i + 1] == b'/' {
                        i += 2;
                        break;
                    }
                    i += 1;
                }
                masked.push(Span::new(start, i));
            }
            q @ (b'\'' | b'"') => {
                let start = i;
                i = skip_string(source, i, q)?;
                if source[start..i].contains('\n') {
                    masked.push(Span::new(start, i));
                }
            }
            b'{' => {
                let (name, name_start) = block_name_before(source, i);
                stack.push((name, name_start, i + 1));
                i += 1;
            }
            b'}' => match stack.pop() {
                Some((name, name_start, body_start)) => {
                    blocks.push(RawBlock {
                        name,
                        name_start,
                        body: Span::new(body_start, i),
                        end: i + 1,
                        depth: stack.len(),
                    });
                    i += 1;
                }
                None => {
                    return Err(error_at(source, ParseErrorKind::UnexpectedClosingBrace, i));
                }
            },
            _ => i += 1,
        }
    }

    if let Some((_, _, body_start)) = stack.last() {
        // The innermost unclosed brace is the most useful location to report
        return Err(error_at(source, ParseErrorKind::UnbalancedBrace, body_start - 1));
    }

    blocks.sort_by_key(|b| b.name_start);
    Ok(Layout { blocks, masked })
}

/// Skip a string literal starting at `start`; returns the offset past it
fn skip_string(source: &str, start: usize, quote: u8) -> Result<usize, ParseError> {
    let bytes = source.as_bytes();
    let triple = bytes.get(start + 1) == Some(&quote) && bytes.get(start + 2) == Some(&quote);

    if triple {
        let mut i = start + 3;
        while i + 2 < bytes.len() {
            if bytes[i] == quote && bytes[i + 1] == quote && bytes[i + 2] == quote {
                return Ok(i + 3);
            }
            i += 1;
        }
        return Err(error_at(source, ParseErrorKind::UnterminatedString, start));
    }

    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => break,
            b if b == quote => return Ok(i + 1),
            _ => i += 1,
        }
    }
    Err(error_at(source, ParseErrorKind::UnterminatedString, start))
}

/// Identify the block name preceding an opening brace
///
/// Walks backwards over optional call arguments, then collects the
/// identifier. Returns an empty name for anonymous braces (lambdas).
fn block_name_before(source: &str, brace_pos: usize) -> (String, usize) {
    let bytes = source.as_bytes();
    let mut i = brace_pos;

    while i > 0 && bytes[i - 1].is_ascii_whitespace() {
        i -= 1;
    }

    // Skip balanced call arguments, e.g. `register("x") {`
    if i > 0 && bytes[i - 1] == b')' {
        let mut depth = 0usize;
        while i > 0 {
            i -= 1;
            match bytes[i] {
                b')' => depth += 1,
                b'(' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
        }
        while i > 0 && bytes[i - 1].is_ascii_whitespace() {
            i -= 1;
        }
    }

    let end = i;
    while i > 0 {
        let b = bytes[i - 1];
        if b.is_ascii_alphanumeric() || b == b'_' || b == b'.' {
            i -= 1;
        } else {
            break;
        }
    }

    (source[i..end].to_string(), if i < end { i } else { brace_pos })
}

fn error_at(source: &str, kind: ParseErrorKind, offset: usize) -> ParseError {
    let near = source[offset..]
        .split_whitespace()
        .next()
        .unwrap_or("<eof>")
        .chars()
        .take(24)
        .collect();
    ParseError {
        kind,
        offset,
        line: line_of(source, offset),
        near,
    }
}

/// The code portion of a line: everything before a trailing `//` comment
fn code_part(line: &str) -> &str {
    let bytes = line.as_bytes();
    let mut in_str: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if in_str.is_some() => i += 1,
            q @ (b'\'' | b'"') => match in_str {
                Some(open) if open == q => in_str = None,
                None => in_str = Some(q),
                _ => {}
            },
            b'/' if in_str.is_none() && bytes.get(i + 1) == Some(&b'/') => {
                return &line[..i];
            }
            _ => {}
        }
        i += 1;
    }
    line
}

/// Iterate the lines of a span as `(statement_offset, trimmed_statement)`
///
/// Lines inside masked ranges (block comments, multi-line strings) are
/// never statements.
fn statements<'a>(source: &'a str, span: Span, masked: &[Span]) -> Vec<(usize, &'a str)> {
    let mut out = Vec::new();
    let mut offset = span.start;
    for line in source[span.start..span.end].split_inclusive('\n') {
        let code = code_part(line);
        let trimmed = code.trim();
        if !trimmed.is_empty() && trimmed != "{" && trimmed != "}" {
            let lead = code.len() - code.trim_start().len();
            let start = offset + lead;
            if !masked.iter().any(|m| start >= m.start && start < m.end) {
                out.push((start, code.trim_end().trim_start()));
            }
        }
        offset += line.len();
    }
    out
}

fn extract_plugins(
    source: &str,
    block: &RawBlock,
    masked: &[Span],
    plugins: &mut Vec<PluginDeclaration>,
) {
    for (offset, stmt) in statements(source, block.body, masked) {
        let span = Span::new(offset, offset + stmt.len());
        let line = line_of(source, offset);

        if let Some(caps) = PLUGIN_ID_RE.captures(stmt) {
            plugins.push(PluginDeclaration {
                id: caps[2].to_string(),
                form: PluginForm::PluginsDslId,
                version: caps.get(3).map(|m| m.as_str().to_string()),
                apply_flag: caps.get(4).map(|m| m.as_str() == "true"),
                span,
                line,
                quote: caps[1].chars().next().unwrap_or('"'),
            });
        } else if let Some(caps) = KOTLIN_SHORTHAND_RE.captures(stmt) {
            plugins.push(PluginDeclaration {
                id: format!("org.jetbrains.kotlin.{}", &caps[1]),
                form: PluginForm::KotlinShorthand,
                version: caps.get(2).map(|m| m.as_str().to_string()),
                apply_flag: None,
                span,
                line,
                quote: '"',
            });
        }
    }
}

fn extract_legacy_applies(
    source: &str,
    blocks: &[RawBlock],
    masked: &[Span],
    plugins: &mut Vec<PluginDeclaration>,
) {
    let top_level_bodies: Vec<Span> = blocks
        .iter()
        .filter(|b| b.depth == 0)
        .map(|b| b.body)
        .collect();

    for (offset, stmt) in statements(source, Span::new(0, source.len()), masked) {
        if top_level_bodies
            .iter()
            .any(|b| offset >= b.start && offset < b.end)
        {
            continue;
        }
        if let Some(caps) = APPLY_PLUGIN_RE.captures(stmt) {
            plugins.push(PluginDeclaration {
                id: caps[2].to_string(),
                form: PluginForm::LegacyApply,
                version: None,
                apply_flag: None,
                span: Span::new(offset, offset + stmt.len()),
                line: line_of(source, offset),
                quote: caps[1].chars().next().unwrap_or('\''),
            });
        }
    }
}

fn extract_dependencies(
    source: &str,
    block: &RawBlock,
    all_blocks: &[RawBlock],
    masked: &[Span],
    dependencies: &mut Vec<DependencyDeclaration>,
) {
    let children: Vec<&RawBlock> = all_blocks
        .iter()
        .filter(|b| b.depth == block.depth + 1 && b.body.start >= block.body.start && b.end <= block.body.end)
        .collect();

    for (offset, stmt) in statements(source, block.body, masked) {
        if children
            .iter()
            .any(|c| offset >= c.name_start && offset < c.end)
        {
            continue;
        }

        let caps = DEP_STRING_RE
            .captures(stmt)
            .or_else(|| DEP_CALL_RE.captures(stmt))
            .or_else(|| DEP_BARE_RE.captures(stmt));
        let Some(caps) = caps else { continue };

        let base = caps[1].to_string();
        let qualifier = caps.get(2).map(|m| m.as_str().to_string()).unwrap_or_default();
        let keyword_end = caps.get(2).map_or(caps.get(1).unwrap().end(), |m| m.end());

        let (coordinate, coordinate_span) = match caps.get(4) {
            Some(m) => (
                Coordinate::parse(m.as_str()),
                Some(Span::new(offset + m.start(), offset + m.end())),
            ),
            None => (None, None),
        };

        dependencies.push(DependencyDeclaration {
            configuration: format!("{}{}", base, qualifier),
            base,
            qualifier,
            keyword_span: Span::new(offset, offset + keyword_end),
            coordinate,
            coordinate_span,
            line: line_of(source, offset),
        });
    }
}

fn extract_config_block(
    source: &str,
    block: &RawBlock,
    all_blocks: &[RawBlock],
    masked: &[Span],
) -> ConfigurationBlock {
    let children: Vec<&RawBlock> = all_blocks
        .iter()
        .filter(|b| b.depth == block.depth + 1 && b.body.start >= block.body.start && b.end <= block.body.end)
        .collect();

    let mut args = Vec::new();
    let mut settings = Vec::new();

    // Nested `arguments { arg(...) }` wrapper (KAPT syntax)
    for child in &children {
        if child.name == "arguments" {
            for (_, stmt) in statements(source, child.body, masked) {
                if let Some(caps) = ARG_RE.captures(stmt) {
                    args.push((caps[2].to_string(), caps[4].to_string()));
                }
            }
        } else if !child.name.is_empty() {
            settings.push(BlockSetting {
                name: child.name.clone(),
                line: line_of(source, child.name_start),
            });
        }
    }

    // Direct block body: flat `arg(...)` (KSP syntax) and other directives
    for (offset, stmt) in statements(source, block.body, masked) {
        if children
            .iter()
            .any(|c| offset >= c.name_start && offset < c.end)
        {
            continue;
        }
        if let Some(caps) = ARG_RE.captures(stmt) {
            args.push((caps[2].to_string(), caps[4].to_string()));
        } else if let Some(caps) = SETTING_RE.captures(stmt) {
            settings.push(BlockSetting {
                name: caps[1].to_string(),
                line: line_of(source, offset),
            });
        }
    }

    settings.sort_by_key(|s| s.line);

    let line_start = source[..block.name_start]
        .rfind('\n')
        .map(|p| p + 1)
        .unwrap_or(0);
    let prefix = &source[line_start..block.name_start];
    let indent = if prefix.chars().all(char::is_whitespace) {
        prefix.to_string()
    } else {
        String::new()
    };

    ConfigurationBlock {
        name: block.name.clone(),
        span: Span::new(block.name_start, block.end),
        args,
        settings,
        line: line_of(source, block.name_start),
        indent,
    }
}
