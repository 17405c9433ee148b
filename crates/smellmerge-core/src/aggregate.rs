//! Canonical CSV emission and per-repository status derivation.
//!
//! [`Aggregator`] owns the on-disk side of a repository's processing: the
//! output folder, the skip check and `smells.csv`. [`derive_status`] turns the
//! step outcomes into one [`RepoStatus`] using a fixed decision table.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::model::{
    CsvOutcome, FolderOutcome, RepoStatus, SmellRecord, ToolId, ToolStatus, CANONICAL_HEADERS,
};

/// Name of the canonical merged CSV inside each repository folder.
pub const CANONICAL_CSV: &str = "smells.csv";

/// Name of each tool's CSV inside its output subdirectory.
pub const TOOL_CSV: &str = "smells_detected.csv";

/// Paths of one repository's output folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoLayout {
    pub root: PathBuf,
}

impl RepoLayout {
    pub fn new(output_root: &Path, repo_name: &str) -> Self {
        Self {
            root: output_root.join(repo_name),
        }
    }

    pub fn canonical_csv(&self) -> PathBuf {
        self.root.join(CANONICAL_CSV)
    }

    pub fn tool_dir(&self, tool: ToolId) -> PathBuf {
        self.root.join(tool.output_dir_name())
    }

    pub fn tool_csv(&self, tool: ToolId) -> PathBuf {
        self.tool_dir(tool).join(TOOL_CSV)
    }
}

/// Decision table, first match wins:
///
/// 1. folder ok, CSV written, every invoked tool succeeded -> `Success`
/// 2. folder ok, CSV written, some invoked tool failed -> `Warning`
/// 3. folder ok, CSV written, no tool invoked -> `Success`
/// 4. folder pre-existed, CSV skipped -> `Skipped`
/// 5. anything else -> `Error`
pub fn derive_status(
    folder: &FolderOutcome,
    csv: &CsvOutcome,
    tools: &BTreeMap<ToolId, ToolStatus>,
) -> (RepoStatus, String) {
    if folder.ok && csv.written() {
        let failing: Vec<String> = tools
            .iter()
            .filter(|(_, status)| !status.success)
            .map(|(tool, status)| format!("{tool}: {}", status.message))
            .collect();

        if !tools.is_empty() && failing.is_empty() {
            return (
                RepoStatus::Success,
                format!("Detection completed, {}", csv.message()),
            );
        }
        if !failing.is_empty() {
            return (
                RepoStatus::Warning,
                format!("{} | {}", csv.message(), failing.join("; ")),
            );
        }
        return (RepoStatus::Success, "Created folder and CSV".to_string());
    }

    if folder.existed && matches!(csv, CsvOutcome::Skipped) {
        return (RepoStatus::Skipped, "Already exists (skipped)".to_string());
    }

    (
        RepoStatus::Error,
        format!("{} | {}", folder.message, csv.message()),
    )
}

/// Counts of output structures already present for a set of repositories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingStructures {
    pub folders_exist: usize,
    pub csvs_exist: usize,
}

/// Count output folders and canonical CSVs that already exist.
pub fn count_existing(output_root: &Path, repo_names: &[String]) -> ExistingStructures {
    let mut counts = ExistingStructures::default();
    for name in repo_names {
        let layout = RepoLayout::new(output_root, name);
        if layout.root.exists() {
            counts.folders_exist += 1;
        }
        if layout.canonical_csv().is_file() {
            counts.csvs_exist += 1;
        }
    }
    counts
}

/// Create `output_root` if needed and check it is writable.
pub fn validate_output_directory(output_root: &Path) -> PipelineResult<()> {
    std::fs::create_dir_all(output_root)
        .map_err(|e| {
            PipelineError::filesystem(output_root, format!("invalid output directory: {e}"))
        })?;

    let probe = output_root.join(".write_test");
    std::fs::write(&probe, b"")
        .map_err(|e| PipelineError::filesystem(output_root, format!("cannot write: {e}")))?;
    std::fs::remove_file(&probe).map_err(|e| PipelineError::filesystem(&probe, e))?;
    Ok(())
}

/// Writes canonical per-repository output.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    force: bool,
}

impl Aggregator {
    /// With `force`, existing `smells.csv` files are rewritten instead of skipped.
    pub fn new(force: bool) -> Self {
        Self { force }
    }

    /// Create the repository's output folder.
    pub fn prepare_folder(&self, layout: &RepoLayout) -> FolderOutcome {
        let existed = layout.root.exists();
        match std::fs::create_dir_all(&layout.root) {
            Ok(()) => FolderOutcome {
                ok: true,
                existed,
                message: if existed {
                    "Directory exists".to_string()
                } else {
                    "Directory created".to_string()
                },
            },
            Err(e) => FolderOutcome {
                ok: false,
                existed,
                message: format!("Error creating directory: {e}"),
            },
        }
    }

    /// Whether the repository should be skipped because its CSV already exists.
    pub fn should_skip(&self, layout: &RepoLayout) -> bool {
        !self.force && layout.canonical_csv().is_file()
    }

    /// Concatenate per-tool records, snuts first, keeping each tool's order.
    pub fn merge(&self, per_tool: Vec<(ToolId, Vec<SmellRecord>)>) -> Vec<SmellRecord> {
        let mut per_tool = per_tool;
        per_tool.sort_by_key(|(tool, _)| *tool);
        per_tool.into_iter().flat_map(|(_, records)| records).collect()
    }

    /// Write `smells.csv`. On failure a header-only file is left behind when
    /// possible and the failure is reported in the outcome.
    pub fn emit(&self, layout: &RepoLayout, records: &[SmellRecord]) -> CsvOutcome {
        let path = layout.canonical_csv();
        match write_canonical_csv(&path, records) {
            Ok(rows) => {
                debug!(path = %path.display(), rows, "canonical csv written");
                CsvOutcome::Written { rows }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to write canonical csv");
                if let Err(fallback) = write_canonical_csv(&path, &[]) {
                    warn!(path = %path.display(), error = %fallback, "header-only fallback failed");
                }
                CsvOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

/// Write the canonical header plus one row per record. Returns the row count.
pub fn write_canonical_csv(path: &Path, records: &[SmellRecord]) -> PipelineResult<usize> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(CANONICAL_HEADERS)?;
    for record in records {
        writer.write_record(record.to_csv_row())?;
    }
    writer.flush()?;
    Ok(records.len())
}
