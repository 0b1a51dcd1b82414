//! Runner boundary (spec §4.3): the sole capability trait separating the
//! deterministic pipeline from the external, non-deterministic model
//! process. A single `Runner` trait replaces the original's duck-typed
//! Protocol, per spec §9's redesign guidance.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use wait_timeout::ChildExt;

use crate::{PipelineError, PipelineResult};

/// What the runner boundary invokes the external process with.
#[derive(Debug, Clone)]
pub struct RunnerInvocation {
    pub command: String,
    pub config_path: PathBuf,
    pub output_dir: PathBuf,
    pub adapter_id: Option<String>,
    pub seed: Option<i64>,
    pub timeout: Duration,
}

/// The artifacts a successful run is required to have produced.
pub const REQUIRED_RUN_ARTIFACTS: &[&str] = &["spec.json", "manifest.json", "trace_pack.jsonl"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub output_dir: PathBuf,
}

/// Capability boundary to the external inference runner. Implementations
/// never share memory or imports with the caller — only a process
/// boundary and the artifact-presence postcondition checked by
/// `ProcessRunner::run`.
pub trait Runner {
    fn run(&self, invocation: &RunnerInvocation) -> PipelineResult<RunResult>;
}

/// Split a command string the way a POSIX shell would (`shell-words`), or
/// fall back to naive whitespace splitting on non-POSIX platforms — the
/// same split-policy divergence the original runner documents.
fn split_command(command: &str) -> PipelineResult<Vec<String>> {
    if cfg!(unix) {
        shell_words::split(command)
            .map_err(|e| PipelineError::InvalidInput(format!("cannot parse runner command: {e}")))
    } else {
        Ok(command.split_whitespace().map(str::to_string).collect())
    }
}

/// The real runner boundary: spawns an external CLI process with a
/// bounded timeout and verifies the required artifacts exist afterward.
pub struct ProcessRunner;

impl Runner for ProcessRunner {
    fn run(&self, invocation: &RunnerInvocation) -> PipelineResult<RunResult> {
        let mut parts = split_command(&invocation.command)?;
        if parts.is_empty() {
            return Err(PipelineError::InvalidInput("empty runner command".into()));
        }
        let program = parts.remove(0);

        let mut cmd = Command::new(program);
        cmd.args(parts);
        cmd.arg("--config").arg(&invocation.config_path);
        cmd.arg("--output").arg(&invocation.output_dir);
        if let Some(adapter) = &invocation.adapter_id {
            cmd.arg("--adapter").arg(adapter);
        }
        if let Some(seed) = invocation.seed {
            cmd.arg("--seed").arg(seed.to_string());
        }
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| PipelineError::InvocationFailed { exit: None, stdout: String::new(), stderr: e.to_string() })?;

        let status = match child
            .wait_timeout(invocation.timeout)
            .map_err(|e| PipelineError::InvocationFailed { exit: None, stdout: String::new(), stderr: e.to_string() })?
        {
            Some(status) => status,
            None => {
                let _ = child.kill();
                // The child is dead, so its pipe write-ends are closed: these
                // reads drain whatever it had buffered and hit EOF, they
                // don't block waiting for more.
                let mut stdout_buf = Vec::new();
                if let Some(mut out) = child.stdout.take() {
                    let _ = out.read_to_end(&mut stdout_buf);
                }
                let mut stderr_buf = Vec::new();
                if let Some(mut err) = child.stderr.take() {
                    let _ = err.read_to_end(&mut stderr_buf);
                }
                let _ = child.wait();
                return Err(PipelineError::RunnerTimeout {
                    timeout: invocation.timeout,
                    stdout: String::from_utf8_lossy(&stdout_buf).to_string(),
                    stderr: String::from_utf8_lossy(&stderr_buf).to_string(),
                });
            }
        };

        let output = child
            .wait_with_output()
            .unwrap_or_else(|_| std::process::Output { status, stdout: Vec::new(), stderr: Vec::new() });
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !status.success() {
            return Err(PipelineError::InvocationFailed { exit: status.code(), stdout, stderr });
        }

        verify_required_artifacts(&invocation.output_dir)?;

        Ok(RunResult { output_dir: invocation.output_dir.clone() })
    }
}

fn verify_required_artifacts(output_dir: &Path) -> PipelineResult<()> {
    for name in REQUIRED_RUN_ARTIFACTS {
        let path = output_dir.join(name);
        if !path.is_file() {
            return Err(PipelineError::ArtifactAbsent(path.display().to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_command_handles_quoted_args() {
        let parts = split_command("python3 -m runner --flag \"a b\"").unwrap();
        assert_eq!(parts, vec!["python3", "-m", "runner", "--flag", "a b"]);
    }

    #[cfg(unix)]
    #[test]
    fn timeout_captures_partial_stdout_before_kill() {
        let dir = tempfile::tempdir().unwrap();
        let invocation = RunnerInvocation {
            command: "sh -c \"echo partial-output; sleep 5\"".into(),
            config_path: dir.path().join("spec.json"),
            output_dir: dir.path().to_path_buf(),
            adapter_id: None,
            seed: None,
            timeout: Duration::from_millis(200),
        };
        match ProcessRunner.run(&invocation) {
            Err(PipelineError::RunnerTimeout { timeout, stdout, .. }) => {
                assert_eq!(timeout, invocation.timeout);
                assert!(stdout.contains("partial-output"), "got stdout: {stdout:?}");
            }
            other => panic!("expected RunnerTimeout, got {other:?}"),
        }
    }
}
