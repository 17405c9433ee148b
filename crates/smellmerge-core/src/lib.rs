//! smellmerge core library
//!
//! Domain model, corpus discovery, output normalization and canonical CSV
//! aggregation for merging the results of several test-smell detectors.
//! Process execution and the per-repository pipeline live in
//! `smellmerge-tools`.

pub mod aggregate;
pub mod config;
pub mod discovery;
pub mod error;
pub mod model;
pub mod normalize;
pub mod obs;
pub mod report;
pub mod telemetry;

pub use aggregate::{
    count_existing, derive_status, validate_output_directory, write_canonical_csv, Aggregator,
    ExistingStructures, RepoLayout, CANONICAL_CSV, TOOL_CSV,
};
pub use config::{parse_tool_list, PipelineConfig, DEFAULT_TIMEOUT_SECS};
pub use discovery::{absolute_path, find_corpus_dir, list_repositories, Corpus, DEFAULT_CORPUS_DIR};
pub use error::{DiscoveryError, PipelineError, PipelineResult};
pub use model::{
    AggregationReport, CsvOutcome, FolderOutcome, LineLocation, RepoRunResult, RepoStatus,
    Repository, RunStats, SmellRecord, ToolId, ToolRun, ToolStatus, CANONICAL_HEADERS,
    UNKNOWN_METHOD,
};
pub use normalize::{
    decode_snuts_location, decode_steel_location, normalize_file_path, resolve_line, Normalizer,
    RawRow, SnutsRow, SteelRow,
};
pub use obs::run_span;
pub use report::{render_summary, write_report_json};
pub use telemetry::init_tracing;

/// smellmerge version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
