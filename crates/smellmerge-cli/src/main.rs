//! smellmerge - test smell aggregation CLI
//!
//! Runs several JavaScript test-smell detectors over every repository of a
//! corpus and merges their findings into one `smells.csv` per repository.
//!
//! ## Commands
//!
//! - `detect`: run the detectors and write the canonical CSVs
//! - `status`: report how much output already exists

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::builder::BoolishValueParser;
use clap::{Parser, Subcommand};
use tracing::{info, Level};

use smellmerge_core::{
    count_existing, parse_tool_list, render_summary, write_report_json, PipelineConfig,
};
use smellmerge_tools::{discover_corpus, SmellPipeline};

#[derive(Parser)]
#[command(name = "smellmerge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Merge test smell detector results per repository", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Where the corpus and the output live.
#[derive(clap::Args, Debug, Clone, Default)]
struct LocationArgs {
    /// Corpus directory (default: nearest `repositories` directory upwards)
    #[arg(long, env = "SMELLMERGE_CORPUS")]
    corpus: Option<PathBuf>,

    /// Output directory (default: `smell_detected` next to the corpus)
    #[arg(short, long, env = "SMELLMERGE_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the detectors and write `<output>/<repo>/smells.csv`
    Detect {
        #[command(flatten)]
        location: LocationArgs,

        /// Rewrite existing smells.csv files instead of skipping them
        #[arg(
            short,
            long,
            env = "SMELLMERGE_FORCE",
            value_parser = BoolishValueParser::new()
        )]
        force: bool,

        /// Comma-separated detectors to run; empty sets up folders only
        #[arg(long, env = "SMELLMERGE_TOOLS")]
        tools: Option<String>,

        /// Timeout for each external process, in seconds
        #[arg(long, env = "SMELLMERGE_TIMEOUT_SECS")]
        timeout_secs: Option<u64>,

        /// Repositories processed concurrently
        #[arg(short, long, env = "SMELLMERGE_JOBS")]
        jobs: Option<usize>,

        /// Program used to run the snutsjs export script
        #[arg(long, env = "SMELLMERGE_SNUTS_RUNTIME")]
        snuts_runtime: Option<String>,

        /// Program used to launch steel
        #[arg(long, env = "SMELLMERGE_STEEL_RUNNER")]
        steel_runner: Option<String>,

        /// Method resolver script (default: located upwards)
        #[arg(long, env = "SMELLMERGE_RESOLVER_SCRIPT")]
        resolver_script: Option<PathBuf>,

        /// Also write the run report as JSON
        #[arg(long)]
        report_json: Option<PathBuf>,
    },

    /// Count output folders and CSVs that already exist
    Status {
        #[command(flatten)]
        location: LocationArgs,
    },
}

/// Overrides applied on top of the environment-derived configuration.
#[derive(Debug, Default)]
struct DetectOverrides {
    force: bool,
    tools: Option<String>,
    timeout_secs: Option<u64>,
    jobs: Option<usize>,
    snuts_runtime: Option<String>,
    steel_runner: Option<String>,
    resolver_script: Option<PathBuf>,
}

fn build_config(
    base: PipelineConfig,
    location: &LocationArgs,
    overrides: DetectOverrides,
) -> PipelineConfig {
    let mut config = base;
    if let Some(corpus) = &location.corpus {
        config.corpus_path = Some(corpus.clone());
    }
    if let Some(dir) = &location.output_dir {
        config.output_dir = Some(dir.clone());
    }
    config.force = config.force || overrides.force;
    if let Some(tools) = overrides.tools {
        config.tools = parse_tool_list(&tools);
    }
    if let Some(secs) = overrides.timeout_secs {
        config.timeout_secs = secs;
    }
    if let Some(jobs) = overrides.jobs {
        config.jobs = jobs.max(1);
    }
    if let Some(runtime) = overrides.snuts_runtime {
        config.snuts_runtime = runtime;
    }
    if let Some(runner) = overrides.steel_runner {
        config.steel_runner = runner;
    }
    if let Some(script) = overrides.resolver_script {
        config.resolver_script = Some(script);
    }
    config
}

async fn cmd_detect(config: PipelineConfig, report_json: Option<PathBuf>) -> Result<()> {
    info!(
        tools = ?config.tools,
        force = config.force,
        jobs = config.jobs,
        "starting smell detection"
    );
    let pipeline = SmellPipeline::from_config(config);
    let report = pipeline.run().await.context("Smell detection run failed")?;

    print!("{}", render_summary(&report));

    if let Some(path) = report_json {
        write_report_json(&path, &report)?;
        println!("Report written to {}", path.display());
    }

    if report.stats.errors > 0 {
        bail!("{} repositories failed", report.stats.errors);
    }
    Ok(())
}

fn cmd_status(config: PipelineConfig) -> Result<()> {
    let corpus = discover_corpus(&config).context("Failed to locate repositories")?;
    let output_root = config.output_root(&corpus.root);

    let names: Vec<String> = corpus.repositories.iter().map(|r| r.name.clone()).collect();
    let existing = count_existing(&output_root, &names);

    println!("Corpus: {}", corpus.root.display());
    println!("Output: {}", output_root.display());
    println!("  Repositories:        {}", names.len());
    println!("  Output folders:      {}", existing.folders_exist);
    println!("  smells.csv present:  {}", existing.csvs_exist);
    println!(
        "  Pending:             {}",
        names.len().saturating_sub(existing.csvs_exist)
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    smellmerge_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Detect {
            location,
            force,
            tools,
            timeout_secs,
            jobs,
            snuts_runtime,
            steel_runner,
            resolver_script,
            report_json,
        } => {
            let overrides = DetectOverrides {
                force,
                tools,
                timeout_secs,
                jobs,
                snuts_runtime,
                steel_runner,
                resolver_script,
            };
            let config = build_config(PipelineConfig::from_env(), &location, overrides);
            cmd_detect(config, report_json).await
        }
        Commands::Status { location } => {
            let config = build_config(
                PipelineConfig::from_env(),
                &location,
                DetectOverrides::default(),
            );
            cmd_status(config)
        }
    }
}
