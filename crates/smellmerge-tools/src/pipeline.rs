//! Per-repository pipeline orchestration.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use tracing::{info, Instrument};
use uuid::Uuid;

use smellmerge_core::obs::{
    emit_enrichment_finished, emit_repo_finished, emit_repo_started, emit_run_finished,
    emit_run_started, emit_tool_finished, run_span,
};
use smellmerge_core::{
    absolute_path, validate_output_directory, AggregationReport, Aggregator, Corpus, CsvOutcome,
    Normalizer, PipelineConfig, PipelineResult, RepoLayout, RepoRunResult, Repository, ToolId,
    ToolStatus, DEFAULT_CORPUS_DIR,
};

use crate::adapter::{tool_status, ToolAdapter};
use crate::artifact::load_tool_rows;
use crate::enrich::{MethodContextExtractor, MethodResolver, ProcessMethodResolver};
use crate::snuts::SnutsAdapter;
use crate::steel::SteelAdapter;

/// Adapter for `tool` configured from `config`.
pub fn adapter_for(tool: ToolId, config: &PipelineConfig) -> Arc<dyn ToolAdapter> {
    match tool {
        ToolId::Snuts => Arc::new(SnutsAdapter::from_config(config)),
        ToolId::Steel => Arc::new(SteelAdapter::from_config(config)),
    }
}

/// Locate the corpus from the configured path or by ancestor search.
pub fn discover_corpus(config: &PipelineConfig) -> PipelineResult<Corpus> {
    let corpus = match &config.corpus_path {
        Some(path) => Corpus::open(path.clone())?,
        None => Corpus::discover(&config.search_start, &config.corpus_dir_name)?,
    };
    Ok(corpus)
}

/// Smell aggregation pipeline orchestrator.
///
/// Repositories are independent: no failure in one affects another, and the
/// report lists results in discovery order.
pub struct SmellPipeline {
    config: PipelineConfig,
    adapters: Vec<Arc<dyn ToolAdapter>>,
    extractor: MethodContextExtractor,
    aggregator: Aggregator,
}

impl SmellPipeline {
    /// Pipeline with the configured tools and the external method resolver.
    pub fn from_config(config: PipelineConfig) -> Self {
        let adapters = config
            .tools
            .iter()
            .map(|tool| adapter_for(*tool, &config))
            .collect();
        let resolver = Arc::new(ProcessMethodResolver::from_config(&config));
        Self::new(config, adapters, resolver)
    }

    /// Pipeline with explicit adapters and resolver. Adapters run in tool order.
    pub fn new(
        config: PipelineConfig,
        mut adapters: Vec<Arc<dyn ToolAdapter>>,
        resolver: Arc<dyn MethodResolver>,
    ) -> Self {
        adapters.sort_by_key(|adapter| adapter.tool_id());
        adapters.dedup_by_key(|adapter| adapter.tool_id());
        let aggregator = Aggregator::new(config.force);
        Self {
            config,
            adapters,
            extractor: MethodContextExtractor::new(resolver),
            aggregator,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn discover(&self) -> PipelineResult<Corpus> {
        discover_corpus(&self.config)
    }

    /// Discover the corpus and process every repository in it.
    pub async fn run(&self) -> PipelineResult<AggregationReport> {
        let corpus = self.discover()?;
        self.run_corpus(&corpus).await
    }

    /// Process every repository of `corpus`.
    ///
    /// Fails only when the output root is unusable; per-repository problems
    /// end up in the report.
    pub async fn run_corpus(&self, corpus: &Corpus) -> PipelineResult<AggregationReport> {
        let run_id = Uuid::new_v4();
        self.run_corpus_inner(run_id, corpus)
            .instrument(run_span(&run_id.to_string()))
            .await
    }

    async fn run_corpus_inner(
        &self,
        run_id: Uuid,
        corpus: &Corpus,
    ) -> PipelineResult<AggregationReport> {
        let start = Instant::now();
        let run_id_str = run_id.to_string();
        let output_root = self.config.output_root(&corpus.root);
        validate_output_directory(&output_root)?;
        // Tools run from their install directories.
        let output_root = absolute_path(&output_root);

        emit_run_started(
            &run_id_str,
            &corpus.root.display().to_string(),
            corpus.repositories.len(),
        );
        if corpus.is_empty() {
            info!(corpus = %corpus.root.display(), "no repositories found");
        }

        let jobs = self.config.jobs.max(1);
        let results: Vec<RepoRunResult> = stream::iter(&corpus.repositories)
            .map(|repo| self.process_repository(repo, &corpus.root, &output_root))
            .buffered(jobs)
            .collect()
            .await;

        let report = AggregationReport::new(run_id, corpus.root.clone(), output_root, results);
        emit_run_finished(&run_id_str, &report.stats, start.elapsed().as_millis() as u64);
        Ok(report)
    }

    /// Run the whole per-repository sequence and derive its status.
    pub async fn process_repository(
        &self,
        repo: &Repository,
        corpus_root: &Path,
        output_root: &Path,
    ) -> RepoRunResult {
        emit_repo_started(&repo.name);

        let layout = RepoLayout::new(output_root, &repo.name);
        let folder = self.aggregator.prepare_folder(&layout);
        if !folder.ok {
            let csv = CsvOutcome::Failed {
                reason: "output folder unavailable".to_string(),
            };
            return finish(RepoRunResult::from_outcomes(
                &repo.name,
                &folder,
                &csv,
                BTreeMap::new(),
            ));
        }

        if self.aggregator.should_skip(&layout) {
            return finish(RepoRunResult::from_outcomes(
                &repo.name,
                &folder,
                &CsvOutcome::Skipped,
                BTreeMap::new(),
            ));
        }

        let normalizer =
            Normalizer::new(corpus_dir_name(corpus_root)).with_corpus_root(corpus_root);
        let mut statuses: BTreeMap<ToolId, ToolStatus> = BTreeMap::new();
        let mut per_tool = Vec::with_capacity(self.adapters.len());

        for adapter in &self.adapters {
            let tool = adapter.tool_id();
            let outcome = adapter.run(repo, &layout).await;
            let status = tool_status(&outcome, &repo.name, self.config.timeout_secs);
            emit_tool_finished(&repo.name, tool, status.success, &status.message);
            statuses.insert(tool, status);

            // A tool that never started has no artifact of this run to read.
            let rows = match outcome {
                Ok(_) => load_tool_rows(tool, &layout),
                Err(_) => Vec::new(),
            };
            per_tool.push((tool, normalizer.normalize(&rows)));
        }

        let mut records = self.aggregator.merge(per_tool);
        if !records.is_empty() {
            let resolved = self.extractor.enrich(repo, corpus_root, &mut records).await;
            emit_enrichment_finished(&repo.name, records.len(), resolved);
        }

        let csv = self.aggregator.emit(&layout, &records);
        finish(RepoRunResult::from_outcomes(&repo.name, &folder, &csv, statuses))
    }
}

fn finish(result: RepoRunResult) -> RepoRunResult {
    emit_repo_finished(&result.repo, result.status(), result.rows);
    result
}

/// Directory name steel paths are anchored on.
fn corpus_dir_name(corpus_root: &Path) -> String {
    corpus_root
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_CORPUS_DIR.to_string())
}
