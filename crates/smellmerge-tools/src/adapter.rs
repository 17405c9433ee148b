//! The [`ToolAdapter`] seam shared by all external detectors.
//!
//! An adapter knows how to locate its tool, build the command line for one
//! repository and where the tool leaves its native artifact. It never decides
//! a repository's status; it only reports a [`ToolRun`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use smellmerge_core::{
    absolute_path, PipelineError, PipelineResult, RepoLayout, Repository, ToolId, ToolRun,
    ToolStatus,
};

use crate::process::ProcessOutput;

/// Maximum stderr characters carried into a status message.
const STDERR_EXCERPT_CHARS: usize = 200;

/// An external smell detector.
#[async_trait]
pub trait ToolAdapter: Send + Sync {
    fn tool_id(&self) -> ToolId;

    /// Run the tool against `repo`, writing its output under `layout`.
    ///
    /// Returns `Err` only when the tool could not be started at all
    /// (missing install directory, spawn failure). A nonzero exit or a
    /// timeout is reported through the returned [`ToolRun`].
    async fn run(&self, repo: &Repository, layout: &RepoLayout) -> PipelineResult<ToolRun>;
}

/// Walk each start directory and its ancestors looking for `subpath`.
///
/// Starts are made absolute first so the walk reaches the filesystem root and
/// the returned path can serve as a child's working directory.
pub fn locate_install(starts: &[PathBuf], subpath: &Path) -> Option<PathBuf> {
    starts.iter().map(|start| absolute_path(start)).find_map(|start| {
        start
            .ancestors()
            .map(|dir| dir.join(subpath))
            .find(|candidate| candidate.exists())
    })
}

/// Default lookup starts: the configured search start, then the directory of
/// the running executable.
pub fn default_search_starts(search_start: &Path) -> Vec<PathBuf> {
    let mut starts = vec![search_start.to_path_buf()];
    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        if !starts.contains(&exe_dir) {
            starts.push(exe_dir);
        }
    }
    starts
}

/// Resolve a tool's install root or fail with [`PipelineError::ToolNotFound`].
pub fn require_install(
    tool: ToolId,
    starts: &[PathBuf],
    subpath: &Path,
) -> PipelineResult<PathBuf> {
    locate_install(starts, subpath).ok_or_else(|| PipelineError::ToolNotFound {
        tool,
        subpath: subpath.to_path_buf(),
    })
}

/// Create the tool's output subdirectory and drop artifacts left by a
/// previous run so a failing tool cannot resurface stale rows.
pub fn prepare_tool_dir(
    layout: &RepoLayout,
    tool: ToolId,
    stale: &[PathBuf],
) -> PipelineResult<PathBuf> {
    let dir = layout.tool_dir(tool);
    std::fs::create_dir_all(&dir).map_err(|e| PipelineError::filesystem(&dir, e))?;
    for path in stale {
        if path.is_file() {
            debug!(tool = %tool, path = %path.display(), "removing stale artifact");
            std::fs::remove_file(path).map_err(|e| PipelineError::filesystem(path, e))?;
        }
    }
    Ok(dir)
}

/// Build a [`ToolRun`] from captured process output.
pub fn tool_run(tool: ToolId, output: ProcessOutput, artifact: &Path) -> ToolRun {
    ToolRun {
        tool_id: tool,
        exit_code: output.exit_code,
        stdout: output.stdout,
        stderr: output.stderr,
        timed_out: output.timed_out,
        artifact_path: artifact.is_file().then(|| artifact.to_path_buf()),
    }
}

fn stderr_excerpt(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.chars().count() <= STDERR_EXCERPT_CHARS {
        return trimmed.to_string();
    }
    let tail: String = trimmed
        .chars()
        .rev()
        .take(STDERR_EXCERPT_CHARS)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("...{tail}")
}

/// Classify a finished run as success, timeout or execution error.
pub fn check_run(run: &ToolRun, repo: &str, timeout_secs: u64) -> PipelineResult<()> {
    if run.timed_out {
        return Err(PipelineError::ToolTimeout {
            tool: run.tool_id,
            repo: repo.to_string(),
            timeout_secs,
        });
    }
    match run.exit_code {
        Some(0) => Ok(()),
        code => Err(PipelineError::ToolExecutionError {
            tool: run.tool_id,
            exit_code: code.unwrap_or(-1),
            stderr: stderr_excerpt(&run.stderr),
        }),
    }
}

/// Success message for a tool that completed on `repo`.
pub fn completion_message(tool: ToolId, repo: &str) -> String {
    match tool {
        ToolId::Snuts => format!("Smell detection completed for {repo}"),
        ToolId::Steel => format!("Steel detection completed for {repo}"),
    }
}

/// Per-tool status for the repository result.
pub fn tool_status(outcome: &PipelineResult<ToolRun>, repo: &str, timeout_secs: u64) -> ToolStatus {
    match outcome {
        Ok(run) => match check_run(run, repo, timeout_secs) {
            Ok(()) => ToolStatus::ok(completion_message(run.tool_id, repo)),
            Err(e) => ToolStatus::failed(e.to_string()),
        },
        Err(e) => ToolStatus::failed(e.to_string()),
    }
}
