//! Structured lifecycle events for pipeline runs.
//!
//! Every event is a single `tracing` record with an `event` field so log
//! aggregation can filter on it (`RUST_LOG=smellmerge=info` plus `--json`).

use tracing::{info, warn};

use crate::model::{RepoStatus, RunStats, ToolId};

/// Run-scoped span tagged with the run id.
///
/// Attach it to the run future with `tracing::Instrument::instrument` so every
/// event of the run carries `run_id`.
pub fn run_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("smellmerge.run", run_id = %run_id)
}

pub fn emit_run_started(run_id: &str, corpus: &str, repositories: usize) {
    info!(event = "run.started", run_id = %run_id, corpus = %corpus, repositories);
}

pub fn emit_repo_started(repo: &str) {
    info!(event = "repo.started", repo = %repo);
}

/// Emit the outcome of one detector invocation; failures log at `warn`.
pub fn emit_tool_finished(repo: &str, tool: ToolId, success: bool, message: &str) {
    if success {
        info!(event = "tool.finished", repo = %repo, tool = %tool, success, message = %message);
    } else {
        warn!(event = "tool.finished", repo = %repo, tool = %tool, success, message = %message);
    }
}

pub fn emit_enrichment_finished(repo: &str, records: usize, resolved: bool) {
    info!(event = "enrichment.finished", repo = %repo, records, resolved);
}

pub fn emit_repo_finished(repo: &str, status: RepoStatus, rows: usize) {
    info!(event = "repo.finished", repo = %repo, status = %status, rows);
}

pub fn emit_run_finished(run_id: &str, stats: &RunStats, duration_ms: u64) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        total = stats.total,
        created = stats.created,
        warnings = stats.warnings,
        skipped = stats.skipped,
        errors = stats.errors,
        duration_ms,
    );
}
