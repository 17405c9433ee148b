//! Reading tool artifacts back into raw rows.

use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use smellmerge_core::{
    PipelineError, PipelineResult, RawRow, RepoLayout, SnutsRow, SteelRow, ToolId,
};

/// Deserialize every readable row of a tool CSV.
///
/// A missing file yields no rows. A file whose header cannot be read is a
/// [`PipelineError::MalformedArtifact`]. Individual rows that fail to
/// deserialize are skipped; extra trailing fields are ignored.
pub fn read_csv_rows<T: DeserializeOwned>(tool: ToolId, path: &Path) -> PipelineResult<Vec<T>> {
    if !path.is_file() {
        debug!(tool = %tool, path = %path.display(), "no artifact");
        return Ok(Vec::new());
    }

    let malformed = |reason: String| PipelineError::MalformedArtifact {
        tool,
        path: path.to_path_buf(),
        reason,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| malformed(e.to_string()))?;
    reader.headers().map_err(|e| malformed(e.to_string()))?;

    let mut rows = Vec::new();
    for (idx, result) in reader.deserialize::<T>().enumerate() {
        match result {
            Ok(row) => rows.push(row),
            Err(e) => warn!(tool = %tool, row = idx + 1, error = %e, "skipping unreadable row"),
        }
    }
    Ok(rows)
}

/// Raw rows for `tool` from its artifact under `layout`.
pub fn read_tool_rows(tool: ToolId, layout: &RepoLayout) -> PipelineResult<Vec<RawRow>> {
    let path = layout.tool_csv(tool);
    let rows = match tool {
        ToolId::Snuts => read_csv_rows::<SnutsRow>(tool, &path)?
            .into_iter()
            .map(RawRow::Snuts)
            .collect(),
        ToolId::Steel => read_csv_rows::<SteelRow>(tool, &path)?
            .into_iter()
            .map(RawRow::Steel)
            .collect(),
    };
    Ok(rows)
}

/// Like [`read_tool_rows`], but a malformed artifact contributes zero rows.
pub fn load_tool_rows(tool: ToolId, layout: &RepoLayout) -> Vec<RawRow> {
    match read_tool_rows(tool, layout) {
        Ok(rows) => rows,
        Err(e) => {
            warn!(tool = %tool, error = %e, "ignoring tool artifact");
            Vec::new()
        }
    }
}
