//! Comment metadata extraction.
//!
//! Functions declare their dependencies in a comment block such as
//!
//! ```text
//! /**
//!  * Metadata:
//!  * name: add
//!  * dependencies: [validate, log_error]
//!  */
//! ```
//!
//! Python uses the same block inside a docstring and Rust inside `///` doc
//! comments. `name:` is optional; without it the declared function's own
//! name is used.

use std::fs;
use std::path::Path;

use syn::{Attribute, Expr, ImplItem, Item, Lit, Meta, TraitItem};

use crate::common::error::ExtractionError;
use crate::domain::language::{CommentStyle, Language};
use crate::domain::metadata::DependencyMetadata;
use crate::ports::MetadataExtractor;

const MARKER: &str = "metadata:";

/// A parsed `Metadata:` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataBlock {
    pub name: Option<String>,
    pub dependencies: Vec<String>,
}

/// Extractor dispatching on the file's language.
#[derive(Debug, Clone, Default)]
pub struct CommentMetadataExtractor;

impl MetadataExtractor for CommentMetadataExtractor {
    fn extract(&self, path: &Path) -> Result<DependencyMetadata, ExtractionError> {
        let language = Language::from_path(path)
            .ok_or_else(|| ExtractionError::UnsupportedLanguage(path.to_path_buf()))?;
        let source = fs::read_to_string(path).map_err(|source| ExtractionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        extract_from_source(language, &source).map_err(|message| ExtractionError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }
}

/// Extract metadata from source text in `language`.
pub fn extract_from_source(language: Language, source: &str) -> Result<DependencyMetadata, String> {
    match language.comment_style() {
        CommentStyle::Block => scan_block_comments(source),
        CommentStyle::Docstring => scan_docstrings(source),
        CommentStyle::DocAttribute => scan_rust_docs(source),
    }
}

/// Parse the lines of one comment. `Ok(None)` when it holds no metadata.
pub fn parse_metadata_block<'a, I>(lines: I) -> Result<Option<MetadataBlock>, String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut found = false;
    let mut name = None;
    let mut dependencies = Vec::new();

    for raw in lines {
        let line = strip_comment_decoration(raw);
        let lower = line.to_lowercase();
        if lower.starts_with(MARKER) {
            found = true;
        } else if let Some(rest) = line.strip_prefix("name:") {
            let rest = rest.trim();
            if !rest.is_empty() {
                name = Some(rest.to_string());
            }
        } else if lower.starts_with("dependencies:") {
            let list = line.get("dependencies:".len()..).unwrap_or_default();
            dependencies = parse_dependency_list(list)?;
        }
    }

    Ok(found.then_some(MetadataBlock { name, dependencies }))
}

/// Parse `[a, b, 'c']`.
pub fn parse_dependency_list(text: &str) -> Result<Vec<String>, String> {
    let text = text.trim();
    let inner = text
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .ok_or_else(|| format!("malformed dependency list: {}", text))?;
    Ok(inner
        .split(',')
        .map(|d| d.trim().trim_matches(|c| c == '\'' || c == '"').trim())
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .collect())
}

fn strip_comment_decoration(line: &str) -> &str {
    let line = line.trim();
    let line = line.strip_prefix("/**").or_else(|| line.strip_prefix("/*")).unwrap_or(line);
    let line = line.strip_suffix("*/").unwrap_or(line);
    line.trim().trim_start_matches('*').trim()
}

// ─────────────────────────────────────────────────────────────────────
// C-like block comments
// ─────────────────────────────────────────────────────────────────────

fn scan_block_comments(source: &str) -> Result<DependencyMetadata, String> {
    let lines: Vec<&str> = source.lines().collect();
    let mut metadata = DependencyMetadata::new();
    let mut i = 0;

    while i < lines.len() {
        if !lines[i].trim_start().starts_with("/*") {
            i += 1;
            continue;
        }
        let start = i;
        while i < lines.len() && !lines[i].contains("*/") {
            i += 1;
        }
        let end = i.min(lines.len() - 1);
        i = end + 1;

        if let Some(block) = parse_metadata_block(lines[start..=end].iter().copied())? {
            let name = block
                .name
                .or_else(|| declaration_name(&lines[i.min(lines.len())..]));
            if let Some(name) = name {
                metadata.insert(name, block.dependencies);
            }
        }
    }

    Ok(metadata)
}

/// Identifier before the first `(` in the next declaration line.
fn declaration_name(following: &[&str]) -> Option<String> {
    let line = following.iter().map(|l| l.trim()).find(|l| !l.is_empty())?;
    let head = &line[..line.find('(')?];
    let ident: String = head
        .trim_end()
        .chars()
        .rev()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    (!ident.is_empty()).then_some(ident)
}

// ─────────────────────────────────────────────────────────────────────
// Python docstrings
// ─────────────────────────────────────────────────────────────────────

fn scan_docstrings(source: &str) -> Result<DependencyMetadata, String> {
    let mut metadata = DependencyMetadata::new();
    let mut current_def: Option<String> = None;
    let mut lines = source.lines();

    while let Some(line) = lines.next() {
        let trimmed = line.trim();
        if let Some(name) = python_def_name(trimmed) {
            current_def = Some(name);
            continue;
        }

        let Some(quote) = ["\"\"\"", "'''"].into_iter().find(|q| trimmed.starts_with(q)) else {
            continue;
        };

        let mut body: Vec<&str> = Vec::new();
        let opening = &trimmed[quote.len()..];
        if let Some(pos) = opening.find(quote) {
            body.push(&opening[..pos]);
        } else {
            body.push(opening);
            for next in lines.by_ref() {
                if let Some(pos) = next.find(quote) {
                    body.push(&next[..pos]);
                    break;
                }
                body.push(next);
            }
        }

        if let Some(block) = parse_metadata_block(body)? {
            if let Some(name) = block.name.or_else(|| current_def.clone()) {
                metadata.insert(name, block.dependencies);
            }
        }
        current_def = None;
    }

    Ok(metadata)
}

fn python_def_name(line: &str) -> Option<String> {
    let rest = line
        .strip_prefix("def ")
        .or_else(|| line.strip_prefix("async def "))?;
    let name = rest[..rest.find('(')?].trim();
    (!name.is_empty()).then(|| name.to_string())
}

// ─────────────────────────────────────────────────────────────────────
// Rust doc comments
// ─────────────────────────────────────────────────────────────────────

fn scan_rust_docs(source: &str) -> Result<DependencyMetadata, String> {
    let file = syn::parse_file(source).map_err(|e| e.to_string())?;
    let mut metadata = DependencyMetadata::new();
    collect_items(&file.items, &mut metadata)?;
    Ok(metadata)
}

fn collect_items(items: &[Item], out: &mut DependencyMetadata) -> Result<(), String> {
    for item in items {
        match item {
            Item::Fn(func) => record_fn(&func.attrs, &func.sig.ident, out)?,
            Item::Impl(imp) => {
                for impl_item in &imp.items {
                    if let ImplItem::Fn(method) = impl_item {
                        record_fn(&method.attrs, &method.sig.ident, out)?;
                    }
                }
            }
            Item::Trait(tr) => {
                for trait_item in &tr.items {
                    if let TraitItem::Fn(method) = trait_item {
                        record_fn(&method.attrs, &method.sig.ident, out)?;
                    }
                }
            }
            Item::Mod(module) => {
                if let Some((_, content)) = &module.content {
                    collect_items(content, out)?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn record_fn(attrs: &[Attribute], ident: &syn::Ident, out: &mut DependencyMetadata) -> Result<(), String> {
    let docs = doc_lines(attrs);
    if let Some(block) = parse_metadata_block(docs.iter().map(String::as_str))? {
        let name = block.name.unwrap_or_else(|| ident.to_string());
        out.insert(name, block.dependencies);
    }
    Ok(())
}

fn doc_lines(attrs: &[Attribute]) -> Vec<String> {
    attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta {
            Meta::NameValue(nv) => match &nv.value {
                Expr::Lit(expr) => match &expr.lit {
                    Lit::Str(s) => Some(s.value()),
                    _ => None,
                },
                _ => None,
            },
            _ => None,
        })
        .flat_map(|doc| doc.lines().map(str::to_string).collect::<Vec<_>>())
        .collect()
}
