//! Bounded external process execution.
//!
//! [`invoke`] is the single way smellmerge runs an external program: both
//! detector adapters and the method resolver go through it. The child is
//! killed when the wall-clock timeout expires.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// A fully specified external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Executable name or path.
    pub program: String,

    pub args: Vec<String>,

    /// Working directory; inherits the caller's when `None`.
    pub cwd: Option<PathBuf>,

    /// Bytes written to the child's stdin, which is then closed.
    pub stdin: Option<Vec<u8>>,

    /// Hard wall-clock limit.
    pub timeout: Duration,
}

impl Invocation {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            cwd: None,
            stdin: None,
            timeout,
        }
    }

    pub fn current_dir(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn stdin(mut self, input: Vec<u8>) -> Self {
        self.stdin = Some(input);
        self
    }

    /// Command line for display.
    pub fn display(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.as_str());
        parts.extend(self.args.iter().map(String::as_str));
        parts.join(" ")
    }
}

/// Captured result of an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `None` on timeout or when killed by a signal.
    pub exit_code: Option<i32>,

    pub stdout: String,

    pub stderr: String,

    pub timed_out: bool,

    pub duration_ms: u64,
}

impl ProcessOutput {
    /// Exited normally with code 0.
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Run `invocation` to completion or until its timeout expires.
///
/// Spawn failures (missing executable, bad working directory) are returned
/// as errors. A timeout is not an error: the child is killed and the output
/// is marked `timed_out`.
pub async fn invoke(invocation: &Invocation) -> std::io::Result<ProcessOutput> {
    let start = Instant::now();

    let mut command = Command::new(&invocation.program);
    command
        .args(&invocation.args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(if invocation.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .kill_on_drop(true);
    if let Some(cwd) = &invocation.cwd {
        command.current_dir(cwd);
    }

    debug!(command = %invocation.display(), "spawning process");
    let mut child = command.spawn()?;

    // Feed stdin from a separate task so a chatty child cannot deadlock us.
    let writer = match (child.stdin.take(), invocation.stdin.clone()) {
        (Some(mut pipe), Some(input)) => Some(tokio::spawn(async move {
            let result = pipe.write_all(&input).await;
            drop(pipe);
            result
        })),
        _ => None,
    };

    let waited = tokio::time::timeout(invocation.timeout, child.wait_with_output()).await;

    if let Some(writer) = writer {
        if waited.is_err() {
            writer.abort();
        } else if let Ok(Err(e)) = writer.await {
            // Children that exit without reading their input close the pipe.
            if e.kind() != std::io::ErrorKind::BrokenPipe {
                debug!(error = %e, "failed writing child stdin");
            }
        }
    }

    let duration_ms = start.elapsed().as_millis() as u64;

    match waited {
        Ok(output) => {
            let output = output?;
            Ok(ProcessOutput {
                exit_code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                timed_out: false,
                duration_ms,
            })
        }
        Err(_elapsed) => {
            debug!(
                command = %invocation.display(),
                timeout_secs = invocation.timeout.as_secs(),
                "process timed out and was killed"
            );
            Ok(ProcessOutput {
                exit_code: None,
                stdout: String::new(),
                stderr: String::new(),
                timed_out: true,
                duration_ms,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str, timeout: Duration) -> Invocation {
        Invocation::new("sh", vec!["-c".to_string(), script.to_string()], timeout)
    }

    #[test]
    fn test_invocation_display() {
        let inv = Invocation::new(
            "node",
            vec!["export-csv-local.js".to_string(), "/r".to_string()],
            Duration::from_secs(1),
        );
        assert_eq!(inv.display(), "node export-csv-local.js /r");
    }

    #[test]
    fn test_process_output_success() {
        let mut out = ProcessOutput {
            exit_code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
            timed_out: false,
            duration_ms: 1,
        };
        assert!(out.success());
        out.exit_code = Some(3);
        assert!(!out.success());
    }

    #[tokio::test]
    async fn test_invoke_captures_stdout() {
        let out = invoke(&sh("echo hello", Duration::from_secs(10)))
            .await
            .expect("invoke failed");
        assert!(out.success());
        assert!(out.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn test_invoke_failing_command() {
        let out = invoke(&sh("echo broken >&2; exit 3", Duration::from_secs(10)))
            .await
            .expect("invoke failed");
        assert!(!out.success());
        assert_eq!(out.exit_code, Some(3));
        assert!(out.stderr.contains("broken"));
    }

    #[tokio::test]
    async fn test_invoke_times_out() {
        let out = invoke(&sh("sleep 5", Duration::from_millis(200)))
            .await
            .expect("invoke failed");
        assert!(out.timed_out);
        assert_eq!(out.exit_code, None);
        assert!(out.duration_ms < 5000);
    }

    #[tokio::test]
    async fn test_invoke_feeds_stdin() {
        let inv = sh("cat", Duration::from_secs(10)).stdin(b"{\"rows\":[]}".to_vec());
        let out = invoke(&inv).await.expect("invoke failed");
        assert!(out.success());
        assert_eq!(out.stdout, "{\"rows\":[]}");
    }

    #[tokio::test]
    async fn test_invoke_uses_working_directory() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("marker.txt"), "here").unwrap();
        let inv = sh("cat marker.txt", Duration::from_secs(10)).current_dir(tmp.path());
        let out = invoke(&inv).await.expect("invoke failed");
        assert_eq!(out.stdout, "here");
    }

    #[tokio::test]
    async fn test_invoke_missing_program_is_error() {
        let inv = Invocation::new(
            "definitely-not-a-real-program-xyz",
            vec![],
            Duration::from_secs(1),
        );
        assert!(invoke(&inv).await.is_err());
    }
}
