//! Tool-specific output normalization.
//!
//! Each detector reports file paths and smell locations in its own encoding.
//! This module converts the raw rows of both tools into [`SmellRecord`]s:
//!
//! - paths become repository-relative with a leading `/`
//! - locations become a [`LineLocation`]
//!
//! The two encodings are decoded separately and only meet at the
//! [`SmellRecord`] boundary.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::discovery::DEFAULT_CORPUS_DIR;
use crate::error::PipelineError;
use crate::model::{LineLocation, SmellRecord, ToolId};

// ── raw rows ──────────────────────────────────────────────────────────────

/// Row of snutsjs' `smells_detected.csv`.
///
/// The location is a JSON array in the `smells` column; older exports used a
/// `line` column instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnutsRow {
    #[serde(default)]
    pub file: String,
    #[serde(rename = "type", default)]
    pub smell_type: String,
    #[serde(default)]
    pub smells: Option<String>,
    #[serde(default)]
    pub line: Option<String>,
}

impl SnutsRow {
    /// Raw location text, preferring `smells` over `line`.
    pub fn location_text(&self) -> &str {
        self.smells
            .as_deref()
            .or(self.line.as_deref())
            .unwrap_or_default()
    }
}

/// Row of the intermediate `steel_output/smells_detected.csv`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SteelRow {
    #[serde(default)]
    pub file: String,
    #[serde(rename = "type", default)]
    pub smell_type: String,
    #[serde(default)]
    pub line: String,
    #[serde(default)]
    pub frame: String,
}

/// Tool-native row awaiting normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawRow {
    Snuts(SnutsRow),
    Steel(SteelRow),
}

impl RawRow {
    pub fn source(&self) -> ToolId {
        match self {
            RawRow::Snuts(_) => ToolId::Snuts,
            RawRow::Steel(_) => ToolId::Steel,
        }
    }
}

// ── paths ─────────────────────────────────────────────────────────────────

/// Snuts paths are relative to the analysed directory; add the leading `/`.
pub fn normalize_snuts_path(path: &str) -> String {
    if path.is_empty() || path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// Steel paths are absolute; strip everything up to and including the
/// repository-name segment that follows the `<corpus_dir>/` segment.
///
/// `/home/u/repositories/alpha/pkg/test/foo.js` becomes `/pkg/test/foo.js`.
/// The marker only matches a whole path segment. Paths without it pass
/// through unchanged.
pub fn normalize_steel_path(path: &str, corpus_dir: &str) -> String {
    let marker = format!("{corpus_dir}/");
    let Some(idx) = segment_match(path, &marker) else {
        return path.to_string();
    };
    let after_marker = &path[idx + marker.len()..];
    match after_marker.find('/') {
        Some(sep) => format!("/{}", &after_marker[sep + 1..]),
        None => path.to_string(),
    }
}

/// First occurrence of `marker` that starts a path segment.
fn segment_match(path: &str, marker: &str) -> Option<usize> {
    path.match_indices(marker)
        .map(|(idx, _)| idx)
        .find(|&idx| idx == 0 || path.as_bytes()[idx - 1] == b'/')
}

/// Strip `<corpus_root>/<repo>/` from `path` component-wise.
fn strip_corpus_root(path: &str, corpus_root: &Path) -> Option<String> {
    let rest = Path::new(path).strip_prefix(corpus_root).ok()?;
    let mut components = rest.components();
    components.next()?;
    let inner = components.as_path();
    if inner.as_os_str().is_empty() {
        return None;
    }
    Some(format!("/{}", inner.display()))
}

/// Dispatch on a source name; unknown sources pass through.
pub fn normalize_file_path(path: &str, source: &str) -> String {
    match ToolId::parse(source) {
        Some(ToolId::Snuts) => normalize_snuts_path(path),
        Some(ToolId::Steel) => normalize_steel_path(path, DEFAULT_CORPUS_DIR),
        None => path.to_string(),
    }
}

// ── locations ─────────────────────────────────────────────────────────────

fn json_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Decode a snuts location.
///
/// The column holds a JSON array such as `[{"startLine":3,"endLine":8}]`,
/// possibly with CSV-doubled quotes. Anything that does not decode is kept
/// verbatim as [`LineLocation::Raw`].
pub fn decode_snuts_location(raw: &str) -> LineLocation {
    if raw.trim().is_empty() {
        return LineLocation::None;
    }

    let cleaned = raw.replace("\"\"", "\"");
    let decoded = serde_json::from_str::<Value>(&cleaned)
        .ok()
        .and_then(|parsed| {
            let first = parsed.as_array()?.first()?.as_object()?;
            let start = json_u32(first.get("startLine")?)?;
            let end = json_u32(first.get("endLine")?)?;
            Some(LineLocation::range(start, end))
        });

    match decoded {
        Some(location) => location,
        None => {
            let err = PipelineError::MalformedLocation {
                tool: ToolId::Snuts,
                raw: raw.to_string(),
            };
            debug!(error = %err, "keeping raw location");
            LineLocation::raw(raw)
        }
    }
}

/// Decode a steel location: a bare line number or a `{'line': n, ...}` object.
pub fn decode_steel_location(raw: &str) -> LineLocation {
    let trimmed = raw.trim();
    if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return trimmed
            .parse()
            .map(LineLocation::line)
            .unwrap_or(LineLocation::None);
    }

    if trimmed.contains("'line'") || trimmed.contains("\"line\"") {
        let parsed = serde_json::from_str::<Value>(&trimmed.replace('\'', "\""));
        if let Some(line) = parsed
            .ok()
            .as_ref()
            .and_then(|v| v.get("line"))
            .and_then(json_u32)
        {
            return LineLocation::line(line);
        }
    }

    LineLocation::None
}

fn start_line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"startLine['"]?\s*:\s*(\d+)"#).expect("startLine pattern is valid")
    })
}

/// Best-effort integer line from a raw tool encoding; `0` when nothing usable.
pub fn extract_line_number(raw: &str, source: ToolId) -> u32 {
    match source {
        ToolId::Snuts => start_line_pattern()
            .captures(raw)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0),
        ToolId::Steel => match decode_steel_location(raw) {
            LineLocation::Line { line } => line,
            _ => 0,
        },
    }
}

/// Integer line handed to method resolution. Never fails.
pub fn resolve_line(location: &LineLocation, source: ToolId) -> u32 {
    match location {
        LineLocation::None => 0,
        LineLocation::Line { line } => *line,
        LineLocation::Range { start, .. } => *start,
        LineLocation::Raw { value } => extract_line_number(value, source),
    }
}

// ── rows ──────────────────────────────────────────────────────────────────

/// Converts raw tool rows into canonical records for one corpus layout.
#[derive(Debug, Clone)]
pub struct Normalizer {
    corpus_dir: String,
    corpus_root: Option<PathBuf>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_CORPUS_DIR)
    }
}

impl Normalizer {
    /// `corpus_dir` is the directory name steel paths are anchored on.
    pub fn new(corpus_dir: impl Into<String>) -> Self {
        Self {
            corpus_dir: corpus_dir.into(),
            corpus_root: None,
        }
    }

    /// Anchor steel paths on the corpus root itself before falling back to
    /// the directory-name marker.
    pub fn with_corpus_root(mut self, corpus_root: impl Into<PathBuf>) -> Self {
        self.corpus_root = Some(corpus_root.into());
        self
    }

    fn steel_path(&self, path: &str) -> String {
        self.corpus_root
            .as_deref()
            .and_then(|root| strip_corpus_root(path, root))
            .unwrap_or_else(|| normalize_steel_path(path, &self.corpus_dir))
    }

    pub fn normalize_row(&self, row: &RawRow) -> SmellRecord {
        match row {
            RawRow::Snuts(r) => SmellRecord::new(
                normalize_snuts_path(&r.file),
                r.smell_type.clone(),
                decode_snuts_location(r.location_text()),
                ToolId::Snuts,
            ),
            RawRow::Steel(r) => SmellRecord::new(
                self.steel_path(&r.file),
                r.smell_type.clone(),
                decode_steel_location(&r.line),
                ToolId::Steel,
            ),
        }
    }

    /// Normalize rows in input order; every row yields exactly one record.
    pub fn normalize(&self, rows: &[RawRow]) -> Vec<SmellRecord> {
        rows.iter().map(|row| self.normalize_row(row)).collect()
    }
}
