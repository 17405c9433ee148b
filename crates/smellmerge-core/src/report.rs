//! Run summary artifacts.
//!
//! - [`render_summary`]: human-readable text report printed after a run
//! - [`write_report_json`]: machine-readable `AggregationReport` dump

use std::path::Path;

use anyhow::{Context, Result};

use crate::model::{AggregationReport, RepoRunResult, RepoStatus, RunStats};

const RULE_WIDTH: usize = 50;

fn status_marker(status: RepoStatus) -> &'static str {
    match status {
        RepoStatus::Success => "[ok]",
        RepoStatus::Warning => "[warn]",
        RepoStatus::Skipped => "[skip]",
        RepoStatus::Error => "[err]",
    }
}

/// One line per repository, in processing order.
pub fn render_processing_list(results: &[RepoRunResult]) -> String {
    let mut out = String::from("Processing repositories:\n");
    for result in results {
        out.push_str(&format!(
            "  {:<7}{:<30} {}\n",
            status_marker(result.status()),
            result.repo,
            result.message()
        ));
    }
    out
}

/// Summary block with the run-wide counters.
pub fn render_stats(stats: &RunStats) -> String {
    let rule = "─".repeat(RULE_WIDTH);
    format!(
        concat!(
            "{rule}\nSummary:\n",
            "  ├─ Total repositories: {}\n",
            "  ├─ Successfully processed: {}\n",
            "  ├─ Warnings: {}\n",
            "  ├─ Skipped (already exist): {}\n",
            "  └─ Errors: {}\n",
            "{rule}\n",
        ),
        stats.total,
        stats.created,
        stats.warnings,
        stats.skipped,
        stats.errors,
        rule = rule,
    )
}

/// Full text report for a run.
pub fn render_summary(report: &AggregationReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Scanning repositories from: {}\n",
        report.corpus_root.display()
    ));
    out.push_str(&format!("Found {} repositories\n\n", report.stats.total));
    out.push_str(&format!(
        "Creating output structure in: {}\n\n",
        report.output_root.display()
    ));
    out.push_str(&render_processing_list(&report.results));
    out.push('\n');
    out.push_str(&render_stats(&report.stats));
    out.push_str(&format!(
        "\nOutput location: {}\nResults are saved to {{repo_name}}/smells.csv\n",
        report.output_root.display()
    ));
    out
}

/// Write the report as pretty JSON.
pub fn write_report_json(path: &Path, report: &AggregationReport) -> Result<()> {
    let content = serde_json::to_string_pretty(report).context("serialize aggregation report")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}
