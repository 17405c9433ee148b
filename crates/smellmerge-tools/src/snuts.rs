//! snutsjs adapter.
//!
//! snutsjs is driven through its `export-csv-local.js` script, which takes the
//! repository path and the CSV destination as positional arguments and must
//! run from the snutsjs install directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use smellmerge_core::{PipelineConfig, PipelineResult, RepoLayout, Repository, ToolId, ToolRun};

use crate::adapter::{
    default_search_starts, prepare_tool_dir, require_install, tool_run, ToolAdapter,
};
use crate::process::{invoke, Invocation};

/// Export script inside the snutsjs install directory.
pub const SNUTS_EXPORT_SCRIPT: &str = "export-csv-local.js";

#[derive(Debug, Clone)]
pub struct SnutsAdapter {
    runtime: String,
    subpath: PathBuf,
    search_starts: Vec<PathBuf>,
    timeout: Duration,
}

impl SnutsAdapter {
    pub fn new(
        runtime: impl Into<String>,
        subpath: impl Into<PathBuf>,
        search_starts: Vec<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            runtime: runtime.into(),
            subpath: subpath.into(),
            search_starts,
            timeout,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.snuts_runtime.clone(),
            config.tool_subpath(ToolId::Snuts),
            default_search_starts(&config.search_start),
            config.timeout(),
        )
    }

    /// `<runtime> <install>/export-csv-local.js <repo> <csv>`, run from the install root.
    pub fn invocation(&self, install_root: &Path, repo: &Repository, csv_out: &Path) -> Invocation {
        Invocation::new(
            self.runtime.clone(),
            vec![
                install_root.join(SNUTS_EXPORT_SCRIPT).display().to_string(),
                repo.path.display().to_string(),
                csv_out.display().to_string(),
            ],
            self.timeout,
        )
        .current_dir(install_root)
    }
}

#[async_trait]
impl ToolAdapter for SnutsAdapter {
    fn tool_id(&self) -> ToolId {
        ToolId::Snuts
    }

    async fn run(&self, repo: &Repository, layout: &RepoLayout) -> PipelineResult<ToolRun> {
        let install_root = require_install(ToolId::Snuts, &self.search_starts, &self.subpath)?;
        let csv_out = layout.tool_csv(ToolId::Snuts);
        prepare_tool_dir(layout, ToolId::Snuts, &[csv_out.clone()])?;

        let invocation = self.invocation(&install_root, repo, &csv_out);
        let output = invoke(&invocation).await?;
        debug!(
            repo = %repo.name,
            exit_code = ?output.exit_code,
            timed_out = output.timed_out,
            duration_ms = output.duration_ms,
            "snuts finished"
        );
        Ok(tool_run(ToolId::Snuts, output, &csv_out))
    }
}
