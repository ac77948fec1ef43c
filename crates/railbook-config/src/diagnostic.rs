// SPDX-FileCopyrightText: 2026 Railbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Miette diagnostics for configuration problems.
//!
//! Figment reports where a bad key came from but not where it sits in the
//! file, so the offending line is located again in the TOML text. Unknown
//! keys get a "did you mean" hint ranked by Jaro-Winkler similarity.

#![allow(unused_assignments)] // emitted by miette's Diagnostic derive

use figment::error::{Error as FigmentError, Kind};
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Below this Jaro-Winkler score a key is not offered as a correction.
const SUGGESTION_THRESHOLD: f64 = 0.75;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(railbook::config::unknown_key),
        help("{}", unknown_key_help(section.as_deref(), suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        /// Table the key was found in, `None` at the top level.
        section: Option<String>,
        suggestion: Option<String>,
        /// Comma-separated keys accepted by the table.
        valid_keys: String,
        #[label("not a railbook setting")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("`{key}` has the wrong type: found {found}")]
    #[diagnostic(code(railbook::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        found: String,
        expected: String,
        #[label("expected {expected}")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(railbook::config::missing_key),
        help("add `{key} = <value>` to railbook.toml")
    )]
    MissingKey { key: String },

    /// A value parsed but is out of range or inconsistent with another one.
    #[error("invalid configuration: {message}")]
    #[diagnostic(code(railbook::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(railbook::config::other))]
    Other(String),
}

fn unknown_key_help(section: Option<&str>, suggestion: Option<&str>, valid_keys: &str) -> String {
    let table = section.map_or_else(|| "the top level".to_string(), |s| format!("[{s}]"));
    match suggestion {
        Some(s) => format!("did you mean `{s}`? {table} accepts: {valid_keys}"),
        None => format!("{table} accepts: {valid_keys}"),
    }
}

/// Converts every error figment collected into a diagnostic.
///
/// `toml_sources` holds `(path, content)` for each file that was read, so
/// spans can be attached when figment names the file an error came from.
pub fn figment_to_config_errors(
    err: FigmentError,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| {
            let tables = table_path(&error);
            match &error.kind {
                Kind::UnknownField(field, expected) => {
                    let (span, src) = locate(&error, &tables, field, toml_sources);
                    ConfigError::UnknownKey {
                        key: field.clone(),
                        section: (!tables.is_empty()).then(|| tables.join(".")),
                        suggestion: suggest_key(field, expected),
                        valid_keys: expected.join(", "),
                        span,
                        src,
                    }
                }
                Kind::MissingField(field) => ConfigError::MissingKey {
                    key: dotted(&tables, field),
                },
                Kind::InvalidType(found, expected) => {
                    // For type errors the last path element is the key itself.
                    let (key, parents) = match tables.split_last() {
                        Some((key, parents)) => (key.as_str(), parents),
                        None => ("", &tables[..]),
                    };
                    let (span, src) = locate(&error, parents, key, toml_sources);
                    ConfigError::InvalidType {
                        key: tables.join("."),
                        found: found.to_string(),
                        expected: expected.clone(),
                        span,
                        src,
                    }
                }
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

/// Non-numeric path segments; array indices carry no table name.
fn table_path(error: &FigmentError) -> Vec<String> {
    error
        .path
        .iter()
        .filter(|segment| segment.parse::<usize>().is_err())
        .cloned()
        .collect()
}

fn dotted(tables: &[String], key: &str) -> String {
    if tables.is_empty() {
        key.to_string()
    } else {
        format!("{}.{key}", tables.join("."))
    }
}

fn locate(
    error: &FigmentError,
    tables: &[String],
    key: &str,
    toml_sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let Some(figment::Source::File(origin)) = error.metadata.as_ref().and_then(|m| m.source.as_ref())
    else {
        return (None, None);
    };
    let origin = origin.display().to_string();
    let Some((path, content)) = toml_sources.iter().find(|(p, _)| *p == origin) else {
        return (None, None);
    };
    match find_key_offset(content, tables, key) {
        Some(offset) if !key.is_empty() => (
            Some(SourceSpan::new(offset.into(), key.len())),
            Some(NamedSource::new(path, content.clone())),
        ),
        _ => (None, None),
    }
}

/// Byte offset of `key` as an assignment inside the table named by `tables`.
///
/// The search covers the lines between the matching `[table]` (or
/// `[[table]]`) header and the next header. An empty `tables` means the
/// lines before the first header.
pub fn find_key_offset(content: &str, tables: &[String], key: &str) -> Option<usize> {
    let wanted = tables.join(".");
    let mut in_table = wanted.is_empty();
    let mut offset = 0;

    for line in content.split_inclusive('\n') {
        let start = offset;
        offset += line.len();
        let trimmed = line.trim();

        if trimmed.starts_with('[') {
            let name = trimmed.trim_start_matches('[').trim_end_matches(']').trim();
            in_table = !wanted.is_empty() && name == wanted;
            continue;
        }
        if !in_table {
            continue;
        }

        let indent = line.len() - line.trim_start().len();
        let Some(rest) = line.trim_start().strip_prefix(key) else {
            continue;
        };
        if rest.trim_start().starts_with('=') {
            return Some(start + indent);
        }
    }
    None
}

/// Closest valid key to `unknown`, if any is similar enough.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|&key| (key, strsim::jaro_winkler(unknown, key)))
        .filter(|&(_, score)| score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(key, _)| key.to_string())
}

/// Prints every diagnostic to stderr, followed by a count.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = miette::GraphicalReportHandler::new();
    for error in errors {
        let mut rendered = String::new();
        match handler.render_report(&mut rendered, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{rendered}"),
            Err(_) => eprintln!("error: {error}"),
        }
    }
    if errors.len() > 1 {
        eprintln!("railbook: {} configuration errors", errors.len());
    }
}
