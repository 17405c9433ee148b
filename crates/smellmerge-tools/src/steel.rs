//! steel adapter.
//!
//! steel is launched through a package runner (`npx steel detect <glob> -o
//! <dir>`) and writes `steel.json`. After a successful run the report is
//! flattened into `steel_output/smells_detected.csv` with columns
//! `file,type,line,frame`, which is what the artifact reader consumes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use smellmerge_core::{
    PipelineConfig, PipelineError, PipelineResult, RepoLayout, Repository, SteelRow, ToolId,
    ToolRun,
};

use crate::adapter::{
    default_search_starts, prepare_tool_dir, require_install, tool_run, ToolAdapter,
};
use crate::process::{invoke, Invocation};

/// Native report written by steel into its output directory.
pub const STEEL_REPORT: &str = "steel.json";

/// Test-file patterns handed to steel, relative to the repository root.
pub const TEST_FILE_GLOB: &str = "{**/__tests__/**/*.js,**/test/**/*.js,**/?(*.)+(test|tests|spec|specs).js,**/test_*.js,**/test-*.js,**/Spec*.js,**/*Test.js,**/*Tests.js}";

const UNKNOWN: &str = "Unknown";

#[derive(Debug, Default, Deserialize)]
struct SteelReport {
    #[serde(rename = "smelledFiles", default)]
    smelled_files: Vec<SmelledFile>,
}

#[derive(Debug, Default, Deserialize)]
struct SmelledFile {
    #[serde(default)]
    path: Option<String>,
    #[serde(rename = "smellInfo", default)]
    smell_info: Vec<SmellInfo>,
}

#[derive(Debug, Default, Deserialize)]
struct SmellInfo {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    items: Vec<SmellItem>,
}

#[derive(Debug, Default, Deserialize)]
struct SmellItem {
    #[serde(default)]
    start: Option<Value>,
    #[serde(default)]
    frame: Option<Value>,
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

impl SmellItem {
    /// `start.line` when `start` is an object, else `start` itself.
    fn line(&self) -> String {
        let line = match &self.start {
            Some(Value::Object(map)) => map.get("line").and_then(scalar_text),
            Some(other) => scalar_text(other),
            None => None,
        };
        line.unwrap_or_else(|| UNKNOWN.to_string())
    }

    fn frame(&self) -> String {
        self.frame
            .as_ref()
            .and_then(scalar_text)
            .unwrap_or_else(|| UNKNOWN.to_string())
    }
}

/// Flatten a parsed steel report into one row per smell occurrence.
fn flatten_report(report: &SteelReport) -> Vec<SteelRow> {
    let mut rows = Vec::new();
    for file in &report.smelled_files {
        let path = file.path.clone().unwrap_or_else(|| UNKNOWN.to_string());
        for info in &file.smell_info {
            let name = info.name.clone().unwrap_or_else(|| UNKNOWN.to_string());
            for item in &info.items {
                rows.push(SteelRow {
                    file: path.clone(),
                    smell_type: name.clone(),
                    line: item.line(),
                    frame: item.frame(),
                });
            }
        }
    }
    rows
}

/// Convert `steel.json` into the intermediate CSV. Returns the row count.
pub fn convert_report(json_path: &Path, csv_path: &Path) -> PipelineResult<usize> {
    let malformed = |reason: String| PipelineError::MalformedArtifact {
        tool: ToolId::Steel,
        path: json_path.to_path_buf(),
        reason,
    };

    let content = std::fs::read_to_string(json_path).map_err(|e| malformed(e.to_string()))?;
    let report: SteelReport = serde_json::from_str(&content).map_err(|e| malformed(e.to_string()))?;
    let rows = flatten_report(&report);

    let mut writer = csv::Writer::from_path(csv_path)?;
    for row in &rows {
        writer.serialize(row)?;
    }
    // serialize only emits headers alongside the first record
    if rows.is_empty() {
        writer.write_record(["file", "type", "line", "frame"])?;
    }
    writer.flush()?;
    Ok(rows.len())
}

#[derive(Debug, Clone)]
pub struct SteelAdapter {
    runner: String,
    subpath: PathBuf,
    search_starts: Vec<PathBuf>,
    timeout: Duration,
}

impl SteelAdapter {
    pub fn new(
        runner: impl Into<String>,
        subpath: impl Into<PathBuf>,
        search_starts: Vec<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            runner: runner.into(),
            subpath: subpath.into(),
            search_starts,
            timeout,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.steel_runner.clone(),
            config.tool_subpath(ToolId::Steel),
            default_search_starts(&config.search_start),
            config.timeout(),
        )
    }

    /// `<runner> steel detect "<repo>/<glob>" -o <out_dir>`, run from the install root.
    pub fn invocation(&self, install_root: &Path, repo: &Repository, out_dir: &Path) -> Invocation {
        Invocation::new(
            self.runner.clone(),
            vec![
                "steel".to_string(),
                "detect".to_string(),
                format!("{}/{}", repo.path.display(), TEST_FILE_GLOB),
                "-o".to_string(),
                out_dir.display().to_string(),
            ],
            self.timeout,
        )
        .current_dir(install_root)
    }
}

#[async_trait]
impl ToolAdapter for SteelAdapter {
    fn tool_id(&self) -> ToolId {
        ToolId::Steel
    }

    async fn run(&self, repo: &Repository, layout: &RepoLayout) -> PipelineResult<ToolRun> {
        let install_root = require_install(ToolId::Steel, &self.search_starts, &self.subpath)?;
        let out_dir = layout.tool_dir(ToolId::Steel);
        let json_path = out_dir.join(STEEL_REPORT);
        let csv_path = layout.tool_csv(ToolId::Steel);
        prepare_tool_dir(layout, ToolId::Steel, &[json_path.clone(), csv_path.clone()])?;

        let invocation = self.invocation(&install_root, repo, &out_dir);
        let output = invoke(&invocation).await?;
        debug!(
            repo = %repo.name,
            exit_code = ?output.exit_code,
            timed_out = output.timed_out,
            duration_ms = output.duration_ms,
            "steel finished"
        );

        let run = tool_run(ToolId::Steel, output, &json_path);
        if run.succeeded() {
            // A missing or unreadable report is not a tool failure: it yields no rows.
            if json_path.is_file() {
                match convert_report(&json_path, &csv_path) {
                    Ok(rows) => debug!(repo = %repo.name, rows, "steel report converted"),
                    Err(e) => warn!(repo = %repo.name, error = %e, "skipping steel report"),
                }
            } else {
                warn!(repo = %repo.name, path = %json_path.display(), "steel produced no report");
            }
        }
        Ok(run)
    }
}
