//! Domain model: repositories, tool runs, canonical smell records and
//! per-repository run results.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Method name used whenever enrichment is skipped or fails.
pub const UNKNOWN_METHOD: &str = "Unknown";

/// Header of the canonical per-repository CSV.
pub const CANONICAL_HEADERS: [&str; 5] = ["file", "type", "line", "method", "source"];

/// External smell detectors known to the pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ToolId {
    /// snutsjs, run through `export-csv-local.js`.
    Snuts,
    /// steel, run through `npx steel detect`.
    Steel,
}

impl ToolId {
    /// All tools in pipeline execution order.
    pub const ALL: [ToolId; 2] = [ToolId::Snuts, ToolId::Steel];

    /// Name used in the `source` column and in messages.
    pub fn name(&self) -> &'static str {
        match self {
            ToolId::Snuts => "snuts",
            ToolId::Steel => "steel",
        }
    }

    /// Output subdirectory under the repository's output folder.
    pub fn output_dir_name(&self) -> &'static str {
        match self {
            ToolId::Snuts => "snutsjs_output",
            ToolId::Steel => "steel_output",
        }
    }

    /// Parse a tool name as accepted on the command line.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "snuts" | "snutsjs" => Some(ToolId::Snuts),
            "steel" => Some(ToolId::Steel),
            _ => None,
        }
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A repository discovered under the corpus directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub path: PathBuf,
}

impl Repository {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// Captured result of one external detector invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolRun {
    pub tool_id: ToolId,

    /// Process exit code; `None` when the process timed out or died by signal.
    pub exit_code: Option<i32>,

    pub stdout: String,

    pub stderr: String,

    pub timed_out: bool,

    /// Native artifact produced by the tool, when one was found on disk.
    pub artifact_path: Option<PathBuf>,
}

impl ToolRun {
    /// Whether the process exited normally with code 0.
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Decoded smell location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineLocation {
    #[default]
    None,
    Line { line: u32 },
    Range { start: u32, end: u32 },
    /// Undecodable tool encoding, kept verbatim.
    Raw { value: String },
}

impl LineLocation {
    pub fn line(line: u32) -> Self {
        LineLocation::Line { line }
    }

    pub fn range(start: u32, end: u32) -> Self {
        LineLocation::Range { start, end }
    }

    pub fn raw(value: impl Into<String>) -> Self {
        LineLocation::Raw {
            value: value.into(),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, LineLocation::None)
    }
}

/// Rendering used in the `line` column of `smells.csv`.
impl fmt::Display for LineLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineLocation::None => Ok(()),
            LineLocation::Line { line } => write!(f, "{line}"),
            LineLocation::Range { start, end } => {
                write!(f, "{{'startLine':{start},'endLine':{end}}}")
            }
            LineLocation::Raw { value } => f.write_str(value),
        }
    }
}

/// Canonical smell record shared by every tool after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmellRecord {
    /// Repository-relative path with a leading separator.
    pub file: String,
    #[serde(rename = "type")]
    pub smell_type: String,
    pub location: LineLocation,
    pub method: String,
    pub source: ToolId,
}

impl SmellRecord {
    /// New record pending enrichment (`method = "Unknown"`).
    pub fn new(
        file: impl Into<String>,
        smell_type: impl Into<String>,
        location: LineLocation,
        source: ToolId,
    ) -> Self {
        Self {
            file: file.into(),
            smell_type: smell_type.into(),
            location,
            method: UNKNOWN_METHOD.to_string(),
            source,
        }
    }

    /// Row in canonical column order.
    pub fn to_csv_row(&self) -> [String; 5] {
        [
            self.file.clone(),
            self.smell_type.clone(),
            self.location.to_string(),
            self.method.clone(),
            self.source.name().to_string(),
        ]
    }
}

/// Success flag and message reported by one tool for one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolStatus {
    pub success: bool,
    pub message: String,
}

impl ToolStatus {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Overall per-repository classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepoStatus {
    Success,
    Warning,
    Skipped,
    Error,
}

impl RepoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepoStatus::Success => "success",
            RepoStatus::Warning => "warning",
            RepoStatus::Skipped => "skipped",
            RepoStatus::Error => "error",
        }
    }
}

impl fmt::Display for RepoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of creating the repository's output folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderOutcome {
    /// Folder exists after the step (created now or before).
    pub ok: bool,
    /// Folder was already present before the step.
    pub existed: bool,
    pub message: String,
}

/// Outcome of writing the canonical `smells.csv`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CsvOutcome {
    Written { rows: usize },
    /// File already present and `force` was off.
    Skipped,
    Failed { reason: String },
}

impl CsvOutcome {
    pub fn written(&self) -> bool {
        matches!(self, CsvOutcome::Written { .. })
    }

    pub fn message(&self) -> String {
        match self {
            CsvOutcome::Written { rows } => format!("CSV created ({rows} smells)"),
            CsvOutcome::Skipped => "CSV already exists (skipped)".to_string(),
            CsvOutcome::Failed { reason } => format!("CSV error: {reason}"),
        }
    }
}

/// Result of processing a single repository.
///
/// `status` and `message` are derived from the step outcomes by
/// [`crate::aggregate::derive_status`] and are only readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoRunResult {
    pub repo: String,
    pub folder_created: bool,
    pub folder_existed: bool,
    pub csv_created: bool,
    pub rows: usize,
    pub tool_statuses: BTreeMap<ToolId, ToolStatus>,
    status: RepoStatus,
    message: String,
}

impl RepoRunResult {
    /// Build a result, deriving status and message from the step outcomes.
    pub fn from_outcomes(
        repo: impl Into<String>,
        folder: &FolderOutcome,
        csv: &CsvOutcome,
        tool_statuses: BTreeMap<ToolId, ToolStatus>,
    ) -> Self {
        let (status, message) = crate::aggregate::derive_status(folder, csv, &tool_statuses);
        let rows = match csv {
            CsvOutcome::Written { rows } => *rows,
            _ => 0,
        };
        Self {
            repo: repo.into(),
            folder_created: folder.ok && !folder.existed,
            folder_existed: folder.existed,
            csv_created: csv.written(),
            rows,
            tool_statuses,
            status,
            message,
        }
    }

    pub fn status(&self) -> RepoStatus {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Run-wide counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub total: usize,
    pub created: usize,
    pub warnings: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl RunStats {
    pub fn from_results(results: &[RepoRunResult]) -> Self {
        let mut stats = RunStats {
            total: results.len(),
            ..Default::default()
        };
        for result in results {
            match result.status() {
                RepoStatus::Success => stats.created += 1,
                RepoStatus::Warning => stats.warnings += 1,
                RepoStatus::Skipped => stats.skipped += 1,
                RepoStatus::Error => stats.errors += 1,
            }
        }
        stats
    }
}

/// Ordered per-repository results plus summary counts for one run.
#[derive(Debug, Clone, Serialize)]
pub struct AggregationReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub corpus_root: PathBuf,
    pub output_root: PathBuf,
    pub results: Vec<RepoRunResult>,
    pub stats: RunStats,
}

impl AggregationReport {
    pub fn new(
        run_id: Uuid,
        corpus_root: PathBuf,
        output_root: PathBuf,
        results: Vec<RepoRunResult>,
    ) -> Self {
        let stats = RunStats::from_results(&results);
        Self {
            run_id,
            generated_at: Utc::now(),
            corpus_root,
            output_root,
            results,
            stats,
        }
    }

    /// Look up a repository's result by name.
    pub fn result_for(&self, repo: &str) -> Option<&RepoRunResult> {
        self.results.iter().find(|r| r.repo == repo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_id_names() {
        assert_eq!(ToolId::Snuts.name(), "snuts");
        assert_eq!(ToolId::Steel.name(), "steel");
        assert_eq!(ToolId::Snuts.output_dir_name(), "snutsjs_output");
        assert_eq!(ToolId::Steel.output_dir_name(), "steel_output");
    }

    #[test]
    fn test_tool_id_parse() {
        assert_eq!(ToolId::parse("snuts"), Some(ToolId::Snuts));
        assert_eq!(ToolId::parse(" SnutsJS "), Some(ToolId::Snuts));
        assert_eq!(ToolId::parse("steel"), Some(ToolId::Steel));
        assert_eq!(ToolId::parse("eslint"), None);
    }

    #[test]
    fn test_line_location_rendering() {
        assert_eq!(LineLocation::None.to_string(), "");
        assert_eq!(LineLocation::line(42).to_string(), "42");
        assert_eq!(
            LineLocation::range(3, 9).to_string(),
            "{'startLine':3,'endLine':9}"
        );
        assert_eq!(LineLocation::raw("not json").to_string(), "not json");
    }

    #[test]
    fn test_new_record_defaults_to_unknown_method() {
        let record = SmellRecord::new("/a.js", "Anonymous Test", LineLocation::None, ToolId::Snuts);
        assert_eq!(record.method, UNKNOWN_METHOD);
        assert_eq!(
            record.to_csv_row(),
            [
                "/a.js".to_string(),
                "Anonymous Test".to_string(),
                String::new(),
                "Unknown".to_string(),
                "snuts".to_string()
            ]
        );
    }

    #[test]
    fn test_tool_run_succeeded() {
        let mut run = ToolRun {
            tool_id: ToolId::Steel,
            exit_code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
            timed_out: false,
            artifact_path: None,
        };
        assert!(run.succeeded());
        run.exit_code = Some(1);
        assert!(!run.succeeded());
        run.exit_code = None;
        run.timed_out = true;
        assert!(!run.succeeded());
    }

    #[test]
    fn test_run_stats_accounting() {
        let folder = FolderOutcome {
            ok: true,
            existed: false,
            message: "Directory created".to_string(),
        };
        let skipped_folder = FolderOutcome {
            existed: true,
            ..folder.clone()
        };
        let mut failing = BTreeMap::new();
        failing.insert(ToolId::Steel, ToolStatus::failed("boom"));

        let results = vec![
            RepoRunResult::from_outcomes(
                "a",
                &folder,
                &CsvOutcome::Written { rows: 1 },
                BTreeMap::new(),
            ),
            RepoRunResult::from_outcomes("b", &folder, &CsvOutcome::Written { rows: 0 }, failing),
            RepoRunResult::from_outcomes(
                "c",
                &skipped_folder,
                &CsvOutcome::Skipped,
                BTreeMap::new(),
            ),
            RepoRunResult::from_outcomes(
                "d",
                &folder,
                &CsvOutcome::Failed {
                    reason: "denied".to_string(),
                },
                BTreeMap::new(),
            ),
        ];
        let stats = RunStats::from_results(&results);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.created, 1);
        assert_eq!(stats.warnings, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.errors, 1);
        assert_eq!(
            stats.total,
            stats.created + stats.warnings + stats.skipped + stats.errors
        );
    }

    #[test]
    fn test_serde_smell_record_uses_type_key() {
        let record = SmellRecord::new("/t.js", "Sleepy Test", LineLocation::line(7), ToolId::Steel);
        let value = serde_json::to_value(&record).expect("serialize");
        assert_eq!(value["type"], "Sleepy Test");
        assert_eq!(value["source"], "steel");
        assert_eq!(value["location"]["kind"], "line");
    }
}
