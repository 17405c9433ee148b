//! Method-context enrichment.
//!
//! All records of a repository are resolved in a single batched call to an
//! external resolver. Request element `i` corresponds to record `i` and the
//! resolver answers with an array of the same length in the same order.
//! Any failure degrades every record of the batch to [`UNKNOWN_METHOD`];
//! enrichment never fails a repository.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use smellmerge_core::{
    absolute_path, resolve_line, PipelineConfig, PipelineError, PipelineResult, Repository,
    SmellRecord, UNKNOWN_METHOD,
};

use crate::adapter::{default_search_starts, locate_install};
use crate::process::{invoke, Invocation};

/// One lookup in a batch request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodQuery {
    /// Repository-relative path with a leading `/`.
    pub file_path: String,
    pub line: u32,
    pub repo_name: String,
}

/// Request document written to the resolver's stdin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodBatchRequest {
    pub rows: Vec<MethodQuery>,
    pub repositories_path: String,
}

/// One element of the resolver's response array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodAnswer {
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl MethodAnswer {
    /// The method name, or [`UNKNOWN_METHOD`] when absent or empty.
    pub fn method_or_unknown(&self) -> String {
        match self.method.as_deref().map(str::trim) {
            Some(m) if !m.is_empty() => m.to_string(),
            _ => UNKNOWN_METHOD.to_string(),
        }
    }
}

/// Resolves enclosing method names for a batch of locations.
#[async_trait]
pub trait MethodResolver: Send + Sync {
    /// Answer `request` with exactly one [`MethodAnswer`] per query, in order.
    async fn resolve(&self, request: &MethodBatchRequest) -> PipelineResult<Vec<MethodAnswer>>;
}

/// Resolver backed by an external script speaking JSON over stdin/stdout.
#[derive(Debug, Clone)]
pub struct ProcessMethodResolver {
    program: String,
    script: Option<PathBuf>,
    timeout: Duration,
}

impl ProcessMethodResolver {
    /// `script` is `None` when no resolver could be located; every batch then
    /// degrades to unknown methods. A relative script is anchored on the
    /// working directory since the resolver runs from the script's directory.
    pub fn new(program: impl Into<String>, script: Option<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            script: script.map(|path| absolute_path(&path)),
            timeout,
        }
    }

    /// Use the configured script, or look for the resolver subpath upwards.
    pub fn from_config(config: &PipelineConfig) -> Self {
        let script = config.resolver_script.clone().or_else(|| {
            locate_install(
                &default_search_starts(&config.search_start),
                &config.resolver_subpath,
            )
        });
        if script.is_none() {
            warn!(
                subpath = %config.resolver_subpath.display(),
                "method resolver not found; methods will be Unknown"
            );
        }
        Self::new(config.resolver_program.clone(), script, config.timeout())
    }

    pub fn script(&self) -> Option<&Path> {
        self.script.as_deref()
    }
}

#[async_trait]
impl MethodResolver for ProcessMethodResolver {
    async fn resolve(&self, request: &MethodBatchRequest) -> PipelineResult<Vec<MethodAnswer>> {
        let script = self.script.as_ref().ok_or_else(|| {
            PipelineError::EnrichmentFailure("method resolver script not found".to_string())
        })?;

        let input = serde_json::to_vec(request)?;
        let mut invocation = Invocation::new(
            self.program.clone(),
            vec![script.display().to_string()],
            self.timeout,
        )
        .stdin(input);
        if let Some(dir) = script.parent().filter(|d| !d.as_os_str().is_empty()) {
            invocation = invocation.current_dir(dir);
        }

        let output = invoke(&invocation).await.map_err(|e| {
            PipelineError::EnrichmentFailure(format!("failed to start resolver: {e}"))
        })?;

        if output.timed_out {
            return Err(PipelineError::EnrichmentFailure(format!(
                "resolver timed out after {}s",
                self.timeout.as_secs()
            )));
        }
        if !output.success() {
            return Err(PipelineError::EnrichmentFailure(format!(
                "resolver exited with code {:?}: {}",
                output.exit_code,
                output.stderr.trim()
            )));
        }

        serde_json::from_str(output.stdout.trim()).map_err(|e| {
            PipelineError::EnrichmentFailure(format!("malformed resolver response: {e}"))
        })
    }
}

/// Attaches method names to records through a [`MethodResolver`].
#[derive(Clone)]
pub struct MethodContextExtractor {
    resolver: Arc<dyn MethodResolver>,
}

impl MethodContextExtractor {
    pub fn new(resolver: Arc<dyn MethodResolver>) -> Self {
        Self { resolver }
    }

    /// Build the batch request for `records` in record order.
    pub fn build_request(
        repo: &Repository,
        corpus_root: &Path,
        records: &[SmellRecord],
    ) -> MethodBatchRequest {
        MethodBatchRequest {
            rows: records
                .iter()
                .map(|record| MethodQuery {
                    file_path: record.file.clone(),
                    line: resolve_line(&record.location, record.source),
                    repo_name: repo.name.clone(),
                })
                .collect(),
            repositories_path: corpus_root.display().to_string(),
        }
    }

    /// Fill `method` on every record. Returns whether the batch resolved.
    ///
    /// An empty batch makes no external call. On any failure, including a
    /// response whose length differs from the request, every record gets
    /// [`UNKNOWN_METHOD`].
    pub async fn enrich(
        &self,
        repo: &Repository,
        corpus_root: &Path,
        records: &mut [SmellRecord],
    ) -> bool {
        if records.is_empty() {
            return true;
        }

        let request = Self::build_request(repo, corpus_root, records);
        let answers = match self.resolver.resolve(&request).await {
            Ok(answers) if answers.len() == records.len() => answers,
            Ok(answers) => {
                let err = PipelineError::EnrichmentFailure(format!(
                    "expected {} answers, got {}",
                    records.len(),
                    answers.len()
                ));
                warn!(repo = %repo.name, error = %err, "discarding resolver response");
                mark_unknown(records);
                return false;
            }
            Err(e) => {
                warn!(repo = %repo.name, error = %e, "method enrichment failed");
                mark_unknown(records);
                return false;
            }
        };

        for (record, answer) in records.iter_mut().zip(&answers) {
            if let Some(err) = &answer.error {
                debug!(file = %record.file, error = %err, "method not resolved");
            }
            record.method = answer.method_or_unknown();
        }
        true
    }
}

fn mark_unknown(records: &mut [SmellRecord]) {
    for record in records {
        record.method = UNKNOWN_METHOD.to_string();
    }
}
