//! Run context for one pipeline invocation.
//!
//! A [`PipelineConfig`] is built once per process (from defaults, the
//! environment or the CLI) and passed by reference to every component.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::discovery::DEFAULT_CORPUS_DIR;
use crate::model::ToolId;

/// Default hard wall-clock limit for every external process.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Default name of the output directory created next to the corpus.
pub const DEFAULT_OUTPUT_DIR: &str = "smell_detected";

/// Configuration for a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    /// Name of the corpus directory searched for in ancestor directories.
    pub corpus_dir_name: String,

    /// Explicit corpus root; skips the ancestor search when set.
    pub corpus_path: Option<PathBuf>,

    /// Where corpus and tool lookups start.
    pub search_start: PathBuf,

    /// Output root; defaults to `<corpus parent>/smell_detected`.
    pub output_dir: Option<PathBuf>,

    /// Rewrite existing `smells.csv` files instead of skipping.
    pub force: bool,

    /// Detectors to run, in order. Empty means folder/CSV setup only.
    pub tools: Vec<ToolId>,

    /// Timeout for each external process, in seconds.
    pub timeout_secs: u64,

    /// Program used to run snutsjs' export script.
    pub snuts_runtime: String,

    /// Program used to launch steel.
    pub steel_runner: String,

    /// Install subpath of snutsjs, relative to some ancestor directory.
    pub snuts_subpath: PathBuf,

    /// Install subpath of steel, relative to some ancestor directory.
    pub steel_subpath: PathBuf,

    /// Program used to run the method resolver script.
    pub resolver_program: String,

    /// Explicit resolver script; otherwise located via `resolver_subpath`.
    pub resolver_script: Option<PathBuf>,

    /// Subpath of the resolver script, relative to some ancestor directory.
    pub resolver_subpath: PathBuf,

    /// Maximum repositories processed concurrently.
    pub jobs: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            corpus_dir_name: DEFAULT_CORPUS_DIR.to_string(),
            corpus_path: None,
            search_start: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            output_dir: None,
            force: false,
            tools: ToolId::ALL.to_vec(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            snuts_runtime: "node".to_string(),
            steel_runner: "npx".to_string(),
            snuts_subpath: PathBuf::from("smell_detection_tools/snutsjs"),
            steel_subpath: PathBuf::from("smell_detection_tools/steel"),
            resolver_program: "node".to_string(),
            resolver_script: None,
            resolver_subpath: PathBuf::from("smell_detection_tools/get_method/extract_method.js"),
            jobs: 1,
        }
    }
}

impl PipelineConfig {
    /// Defaults overridden by `SMELLMERGE_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("SMELLMERGE_CORPUS") {
            config.corpus_path = Some(PathBuf::from(v));
        }
        if let Some(v) = non_empty("SMELLMERGE_OUTPUT_DIR") {
            config.output_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = non_empty("SMELLMERGE_FORCE") {
            config.force = matches!(v.trim(), "1" | "true" | "yes");
        }
        if let Some(v) = lookup("SMELLMERGE_TOOLS") {
            config.tools = parse_tool_list(&v);
        }
        if let Some(secs) =
            non_empty("SMELLMERGE_TIMEOUT_SECS").and_then(|v| v.trim().parse().ok())
        {
            config.timeout_secs = secs;
        }
        if let Some(v) = non_empty("SMELLMERGE_SNUTS_RUNTIME") {
            config.snuts_runtime = v;
        }
        if let Some(v) = non_empty("SMELLMERGE_STEEL_RUNNER") {
            config.steel_runner = v;
        }
        if let Some(v) = non_empty("SMELLMERGE_RESOLVER_SCRIPT") {
            config.resolver_script = Some(PathBuf::from(v));
        }
        if let Some(jobs) = non_empty("SMELLMERGE_JOBS").and_then(|v| v.trim().parse().ok()) {
            config.jobs = jobs;
        }
        config
    }

    pub fn with_search_start(mut self, start: impl Into<PathBuf>) -> Self {
        self.search_start = start.into();
        self
    }

    pub fn with_corpus_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.corpus_path = Some(path.into());
        self
    }

    pub fn with_output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolId>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Configured output root, or `smell_detected` beside the corpus.
    pub fn output_root(&self, corpus_root: &Path) -> PathBuf {
        match &self.output_dir {
            Some(dir) => dir.clone(),
            None => corpus_root
                .parent()
                .unwrap_or(corpus_root)
                .join(DEFAULT_OUTPUT_DIR),
        }
    }

    /// Install subpath for a tool.
    pub fn tool_subpath(&self, tool: ToolId) -> &Path {
        match tool {
            ToolId::Snuts => &self.snuts_subpath,
            ToolId::Steel => &self.steel_subpath,
        }
    }
}

/// Parse a comma-separated tool list, ignoring unknown names and duplicates.
pub fn parse_tool_list(value: &str) -> Vec<ToolId> {
    let mut tools = Vec::new();
    for tool in value.split(',').filter_map(ToolId::parse) {
        if !tools.contains(&tool) {
            tools.push(tool);
        }
    }
    tools.sort();
    tools
}
