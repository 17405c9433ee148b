//! End-to-end pipeline runs against stand-in detectors.
//!
//! The detectors and the method resolver are replaced by small `sh` scripts
//! laid out the way the real installs are, so every process boundary
//! (arguments, working directory, stdin/stdout, exit codes) is exercised.

use std::path::{Path, PathBuf};

use smellmerge_core::{PipelineConfig, RepoRunResult, RepoStatus, ToolId, UNKNOWN_METHOD};
use smellmerge_tools::SmellPipeline;

const SNUTS_ALPHA_ONLY: &str = r##"
echo run >> "$(dirname "$0")/calls"
printf 'file,type,smells,itCount,describeCount\n' > "$2"
case "$1" in
  */alpha)
    printf '%s\n' 'test/a.test.js,Anonymous Test,"[{""startLine"":3,""endLine"":5}]",1,1' >> "$2"
    ;;
esac
"##;

const SNUTS_N_ROWS: &str = r##"
n=$(cat "$(dirname "$0")/rows")
printf 'file,type,smells,itCount,describeCount\n' > "$2"
i=1
while [ "$i" -le "$n" ]; do
  printf '%s\n' "test/f$i.test.js,Anonymous Test,\"[{\"\"startLine\"\":$i,\"\"endLine\"\":$i}]\",1,1" >> "$2"
  i=$((i + 1))
done
"##;

const STEEL_ALPHA_ONLY: &str = r##"
repo=$(printf '%s' "$2" | sed 's#/{.*##')
case "$repo" in
  */alpha)
    printf '{"smelledFiles":[{"path":"%s/test/b.test.js","smellInfo":[{"name":"Sleepy Test","items":[{"start":{"line":9},"frame":"setTimeout(done, 10)"}]}]}]}' "$repo" > "$4/steel.json"
    ;;
  *)
    printf '{"smelledFiles":[]}' > "$4/steel.json"
    ;;
esac
"##;

const FAILING_TOOL: &str = "echo 'detector crashed' >&2\nexit 1\n";

/// Answers each query with `L<line>` so positional alignment is observable.
const LINE_RESOLVER: &str = r##"
input=$(cat)
echo call >> "$(dirname "$0")/resolver_calls"
printf '['
sep=''
for line in $(printf '%s' "$input" | grep -o '"line":[0-9]*' | cut -d: -f2); do
  printf '%s{"method":"L%s","error":null}' "$sep" "$line"
  sep=','
done
printf ']\n'
"##;

const FAILING_RESOLVER: &str = "cat > /dev/null\necho 'parse error' >&2\nexit 1\n";

struct Fixture {
    _tmp: tempfile::TempDir,
    project: PathBuf,
}

impl Fixture {
    fn new(repos: &[&str]) -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let project = tmp.path().join("project");
        for repo in repos {
            std::fs::create_dir_all(project.join("repositories").join(repo).join("test")).unwrap();
        }
        std::fs::create_dir_all(project.join("smell_detection_tools/snutsjs")).unwrap();
        std::fs::create_dir_all(project.join("smell_detection_tools/steel")).unwrap();
        std::fs::create_dir_all(project.join("resolver")).unwrap();
        let fixture = Self { _tmp: tmp, project };
        fixture.snuts(SNUTS_ALPHA_ONLY);
        fixture.steel(STEEL_ALPHA_ONLY);
        fixture.resolver(LINE_RESOLVER);
        fixture
    }

    fn snuts(&self, script: &str) {
        std::fs::write(self.snuts_dir().join("export-csv-local.js"), script).unwrap();
    }

    fn steel(&self, script: &str) {
        std::fs::write(self.project.join("smell_detection_tools/steel/steel"), script).unwrap();
    }

    fn resolver(&self, script: &str) {
        std::fs::write(self.project.join("resolver/resolve.sh"), script).unwrap();
    }

    fn snuts_dir(&self) -> PathBuf {
        self.project.join("smell_detection_tools/snutsjs")
    }

    fn snuts_calls(&self) -> usize {
        count_lines(&self.snuts_dir().join("calls"))
    }

    fn resolver_calls(&self) -> usize {
        count_lines(&self.project.join("resolver/resolver_calls"))
    }

    fn config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::default()
            .with_search_start(&self.project)
            .with_timeout_secs(30);
        config.snuts_runtime = "sh".to_string();
        config.steel_runner = "sh".to_string();
        config.resolver_program = "sh".to_string();
        config.resolver_script = Some(self.project.join("resolver/resolve.sh"));
        config
    }

    fn output_root(&self) -> PathBuf {
        self.project.join("smell_detected")
    }

    fn smells_csv(&self, repo: &str) -> String {
        std::fs::read_to_string(self.output_root().join(repo).join("smells.csv")).unwrap()
    }
}

fn count_lines(path: &Path) -> usize {
    std::fs::read_to_string(path)
        .map(|s| s.lines().count())
        .unwrap_or(0)
}

const HEADER: &str = "file,type,line,method,source";

#[tokio::test]
async fn test_two_repositories_end_to_end() {
    let fx = Fixture::new(&["alpha", "beta"]);
    let report = SmellPipeline::from_config(fx.config()).run().await.expect("run");

    assert_eq!(report.stats.total, 2);
    assert_eq!(report.stats.created, 2);
    assert_eq!(report.stats.errors, 0);

    let alpha = fx.smells_csv("alpha");
    let lines: Vec<&str> = alpha.lines().collect();
    assert_eq!(
        lines,
        vec![
            HEADER,
            "/test/a.test.js,Anonymous Test,\"{'startLine':3,'endLine':5}\",L3,snuts",
            "/test/b.test.js,Sleepy Test,9,L9,steel",
        ]
    );
    assert_eq!(fx.smells_csv("beta"), format!("{HEADER}\n"));

    let alpha = report.result_for("alpha").unwrap();
    assert_eq!(alpha.status(), RepoStatus::Success);
    assert_eq!(alpha.rows, 2);
    assert_eq!(
        alpha.tool_statuses[&ToolId::Snuts].message,
        "Smell detection completed for alpha"
    );
    assert_eq!(
        alpha.tool_statuses[&ToolId::Steel].message,
        "Steel detection completed for alpha"
    );

    // per-tool artifacts stay next to the canonical CSV
    let alpha_out = fx.output_root().join("alpha");
    assert!(alpha_out.join("snutsjs_output/smells_detected.csv").is_file());
    assert!(alpha_out.join("steel_output/steel.json").is_file());
    assert!(alpha_out.join("steel_output/smells_detected.csv").is_file());

    // beta has no smells, so only alpha triggers a resolver call
    assert_eq!(fx.resolver_calls(), 1);
}

#[tokio::test]
async fn test_both_tools_failing_leaves_header_only_csv() {
    let fx = Fixture::new(&["alpha"]);
    fx.snuts(FAILING_TOOL);
    fx.steel(FAILING_TOOL);

    let report = SmellPipeline::from_config(fx.config()).run().await.expect("run");
    let result = report.result_for("alpha").unwrap();

    assert_eq!(result.status(), RepoStatus::Warning);
    assert!(result.csv_created);
    assert_eq!(result.rows, 0);
    assert!(result.tool_statuses.values().all(|s| !s.success));
    assert!(result.message().contains("exit code 1"));
    assert!(result.message().contains("detector crashed"));
    assert_eq!(fx.smells_csv("alpha"), format!("{HEADER}\n"));
}

#[tokio::test]
async fn test_resolver_failure_degrades_to_unknown() {
    let fx = Fixture::new(&["alpha"]);
    fx.resolver(FAILING_RESOLVER);

    let report = SmellPipeline::from_config(fx.config()).run().await.expect("run");
    let result = report.result_for("alpha").unwrap();
    assert_eq!(result.status(), RepoStatus::Success);
    assert_eq!(result.rows, 2);

    let csv = fx.smells_csv("alpha");
    for line in csv.lines().skip(1) {
        let fields: Vec<&str> = line.rsplitn(3, ',').collect();
        assert_eq!(fields[1], UNKNOWN_METHOD, "line {line}");
    }
}

async fn run_with_rows(n: usize) -> (Fixture, String) {
    let fx = Fixture::new(&["alpha"]);
    fx.snuts(SNUTS_N_ROWS);
    std::fs::write(fx.snuts_dir().join("rows"), n.to_string()).unwrap();

    let config = fx.config().with_tools(vec![ToolId::Snuts]);
    let report = SmellPipeline::from_config(config).run().await.expect("run");
    assert_eq!(report.result_for("alpha").unwrap().rows, n);
    let csv = fx.smells_csv("alpha");
    (fx, csv)
}

#[tokio::test]
async fn test_enrichment_empty_batch_makes_no_call() {
    let (fx, csv) = run_with_rows(0).await;
    assert_eq!(csv, format!("{HEADER}\n"));
    assert_eq!(fx.resolver_calls(), 0);
}

#[tokio::test]
async fn test_enrichment_single_record() {
    let (fx, csv) = run_with_rows(1).await;
    assert_eq!(
        csv.lines().nth(1),
        Some("/test/f1.test.js,Anonymous Test,\"{'startLine':1,'endLine':1}\",L1,snuts")
    );
    assert_eq!(fx.resolver_calls(), 1);
}

#[tokio::test]
async fn test_enrichment_assigns_by_position() {
    let (fx, csv) = run_with_rows(50).await;
    let rows: Vec<&str> = csv.lines().skip(1).collect();
    assert_eq!(rows.len(), 50);
    for (i, row) in rows.iter().enumerate() {
        let line = i + 1;
        assert!(row.starts_with(&format!("/test/f{line}.test.js,")), "row {row}");
        assert!(row.ends_with(&format!(",L{line},snuts")), "row {row}");
    }
    assert_eq!(fx.resolver_calls(), 1);
}

#[tokio::test]
async fn test_rerun_skips_then_force_rewrites() {
    let fx = Fixture::new(&["alpha"]);

    let first = SmellPipeline::from_config(fx.config()).run().await.expect("first");
    assert_eq!(first.result_for("alpha").unwrap().status(), RepoStatus::Success);
    assert_eq!(fx.snuts_calls(), 1);

    let second = SmellPipeline::from_config(fx.config()).run().await.expect("second");
    let skipped = second.result_for("alpha").unwrap();
    assert_eq!(skipped.status(), RepoStatus::Skipped);
    assert_eq!(skipped.message(), "Already exists (skipped)");
    assert_eq!(second.stats.skipped, 1);
    assert_eq!(fx.snuts_calls(), 1);

    let forced = SmellPipeline::from_config(fx.config().with_force(true))
        .run()
        .await
        .expect("forced");
    assert_eq!(forced.result_for("alpha").unwrap().status(), RepoStatus::Success);
    assert_eq!(fx.snuts_calls(), 2);
    assert_eq!(fx.smells_csv("alpha").lines().count(), 3);
}

#[tokio::test]
async fn test_timeout_is_reported_per_tool() {
    let fx = Fixture::new(&["alpha"]);
    fx.snuts("sleep 10\n");

    let config = fx.config().with_timeout_secs(1);
    let report = SmellPipeline::from_config(config).run().await.expect("run");
    let result = report.result_for("alpha").unwrap();

    assert_eq!(result.status(), RepoStatus::Warning);
    assert_eq!(
        result.tool_statuses[&ToolId::Snuts].message,
        "snuts timeout for alpha (exceeded 1s)"
    );
    assert!(result.tool_statuses[&ToolId::Steel].success);
    // steel rows still make it into the canonical CSV
    assert_eq!(result.rows, 1);
}

#[tokio::test]
async fn test_missing_install_is_tool_failure() {
    let fx = Fixture::new(&["alpha"]);
    let mut config = fx.config();
    config.steel_subpath = PathBuf::from("smell_detection_tools/not-installed");

    let report = SmellPipeline::from_config(config).run().await.expect("run");
    let result = report.result_for("alpha").unwrap();
    assert_eq!(result.status(), RepoStatus::Warning);
    assert!(result.tool_statuses[&ToolId::Steel]
        .message
        .contains("not found within project"));
    assert_eq!(result.rows, 1);
}

#[tokio::test]
async fn test_missing_corpus_aborts_run() {
    let tmp = tempfile::tempdir().unwrap();
    let config = PipelineConfig::default()
        .with_search_start(tmp.path())
        .with_corpus_path(tmp.path().join("nowhere"));
    let err = SmellPipeline::from_config(config).run().await.unwrap_err();
    assert!(err.to_string().contains("not found"));
}

/// `path` spelled relative to the test process' working directory.
fn relative_to_cwd(path: &Path) -> PathBuf {
    let cwd = std::env::current_dir().unwrap();
    let mut rel = PathBuf::new();
    for _ in cwd.components().skip(1) {
        rel.push("..");
    }
    rel.join(path.strip_prefix("/").unwrap())
}

#[tokio::test]
async fn test_relative_locations_reach_the_tools() {
    let fx = Fixture::new(&["alpha"]);
    let out = fx.project.join("out");
    let mut config = fx
        .config()
        .with_corpus_path(relative_to_cwd(&fx.project.join("repositories")))
        .with_output_dir(relative_to_cwd(&out));
    config.resolver_script = Some(relative_to_cwd(&fx.project.join("resolver/resolve.sh")));

    let report = SmellPipeline::from_config(config).run().await.expect("run");
    assert!(report.output_root.is_absolute());

    let result = report.result_for("alpha").unwrap();
    assert_eq!(result.status(), RepoStatus::Success, "{}", result.message());
    assert_eq!(result.rows, 2);

    let csv = std::fs::read_to_string(out.join("alpha/smells.csv")).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(
        lines,
        vec![
            HEADER,
            "/test/a.test.js,Anonymous Test,\"{'startLine':3,'endLine':5}\",L3,snuts",
            "/test/b.test.js,Sleepy Test,9,L9,steel",
        ]
    );
}

async fn run_with_steel(script: &str) -> RepoRunResult {
    let fx = Fixture::new(&["alpha"]);
    fx.steel(script);
    let report = SmellPipeline::from_config(fx.config()).run().await.expect("run");
    let result = report.result_for("alpha").unwrap().clone();

    let csv = fx.smells_csv("alpha");
    assert!(csv.lines().skip(1).all(|line| line.ends_with(",snuts")), "{csv}");
    result
}

#[tokio::test]
async fn test_steel_without_report_still_succeeds() {
    let result = run_with_steel("exit 0\n").await;
    assert_eq!(result.status(), RepoStatus::Success);
    assert!(result.tool_statuses[&ToolId::Steel].success);
    assert_eq!(result.rows, 1);
}

#[tokio::test]
async fn test_steel_corrupt_report_yields_no_rows() {
    let result = run_with_steel("printf '{\"smelledFiles\": [' > \"$4/steel.json\"\n").await;
    assert_eq!(result.status(), RepoStatus::Success);
    assert!(result.tool_statuses[&ToolId::Steel].success);
    assert_eq!(result.rows, 1);
}
