//! Timed compile-and-run of one program.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;

use crate::diagnostics::{render, Diagnostic, Severity};
use crate::error::RunnerError;
use crate::toolchain::{RunWorkspace, Toolchain};

/// How long to wait for output pipes to close after the process is gone.
const PIPE_GRACE: Duration = Duration::from_secs(2);

/// Execution bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Wall-clock bound for running the program.
    pub time_budget: Duration,
    /// Wall-clock bound for the compile stage.
    pub compile_timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            time_budget: Duration::from_secs(15),
            compile_timeout: Duration::from_secs(60),
        }
    }
}

/// One program to execute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub source: String,
    /// Extra environment for the run stage.
    pub env: Vec<(String, String)>,
    /// Files written into the workspace before compiling.
    pub inputs: Vec<(String, String)>,
    /// Workspace files read back after the run, whatever its outcome.
    pub collect: Vec<String>,
}

impl ExecutionRequest {
    pub fn new(source: impl Into<String>) -> Self {
        ExecutionRequest {
            source: source.into(),
            ..ExecutionRequest::default()
        }
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn input(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.inputs.push((name.into(), content.into()));
        self
    }

    pub fn collect(mut self, name: impl Into<String>) -> Self {
        self.collect.push(name.into());
        self
    }
}

/// How an execution ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    /// The compiler reported errors; nothing was executed.
    CompilationFailed { diagnostics: Vec<Diagnostic> },
    /// The program exited unsuccessfully.
    RuntimeFault {
        message: String,
        exit_code: Option<i32>,
    },
    /// The program was killed at the deadline.
    TimedOut { budget: Duration },
}

/// Result of one execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub standard_output: String,
    pub error_output: String,
    pub warning_output: String,
    pub elapsed: Duration,
    pub timed_out: bool,
    pub outcome: RunOutcome,
    /// Contents of the requested files that existed after the run.
    pub collected: BTreeMap<String, String>,
}

impl ExecutionResult {
    fn compilation_failed(diagnostics: Vec<Diagnostic>, error_output: String, elapsed: Duration) -> Self {
        ExecutionResult {
            success: false,
            standard_output: String::new(),
            error_output,
            warning_output: render(&diagnostics, Severity::Warning),
            elapsed,
            timed_out: false,
            outcome: RunOutcome::CompilationFailed { diagnostics },
            collected: BTreeMap::new(),
        }
    }
}

/// What one process stage produced. `status` is `None` when the stage was
/// killed at its deadline.
struct StageOutput {
    status: Option<ExitStatus>,
    stdout: String,
    stderr: String,
    elapsed: Duration,
}

/// Compiles and runs programs with a toolchain.
#[derive(Debug, Clone)]
pub struct Runner<T> {
    toolchain: T,
    config: RunnerConfig,
}

impl<T: Toolchain> Runner<T> {
    pub fn new(toolchain: T, config: RunnerConfig) -> Self {
        Runner { toolchain, config }
    }

    pub fn toolchain(&self) -> &T {
        &self.toolchain
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Executes `request` in a fresh workspace that is removed afterwards.
    ///
    /// The run stage's working directory is the workspace, so relative
    /// paths in `request.env` resolve inside it.
    pub async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult, RunnerError> {
        let dir = tempfile::Builder::new()
            .prefix("vartrace-")
            .tempdir()
            .map_err(RunnerError::Workspace)?;
        let workspace = RunWorkspace::new(
            dir.path(),
            self.toolchain.source_file_name(),
            self.toolchain.binary_file_name(),
        );
        tokio::fs::write(&workspace.source_path, &request.source)
            .await
            .map_err(RunnerError::Workspace)?;
        for (name, content) in &request.inputs {
            let path = workspace_file(&workspace, name)?;
            tokio::fs::write(path, content)
                .await
                .map_err(RunnerError::Workspace)?;
        }

        let mut warning_output = String::new();
        let compile = self.toolchain.compile_command(&workspace);
        if !compile.is_empty() {
            let stage = run_stage(&compile, &workspace.dir, &[], self.config.compile_timeout).await?;
            let combined = format!("{}\n{}", stage.stdout, stage.stderr);
            let diagnostics = self.toolchain.parse_diagnostics(&combined);
            let errors = render(&diagnostics, Severity::Error);
            let failed = !errors.is_empty() || !stage.status.is_some_and(|s| s.success());
            tracing::debug!(
                language = self.toolchain.language(),
                diagnostics = diagnostics.len(),
                failed,
                "compile stage finished"
            );
            if failed {
                let error_output = match stage.status {
                    None => format!(
                        "compilation timed out after {}s",
                        self.config.compile_timeout.as_secs_f64()
                    ),
                    Some(_) if errors.is_empty() => combined.trim().to_string(),
                    Some(_) => errors,
                };
                return Ok(ExecutionResult::compilation_failed(
                    diagnostics,
                    error_output,
                    stage.elapsed,
                ));
            }
            warning_output = render(&diagnostics, Severity::Warning);
        }

        let run = self.toolchain.run_command(&workspace);
        if run.is_empty() {
            return Err(RunnerError::EmptyCommand { stage: "run" });
        }
        let budget = self.config.time_budget;
        let stage = run_stage(&run, &workspace.dir, &request.env, budget).await?;

        let mut collected = BTreeMap::new();
        for name in &request.collect {
            let path = workspace_file(&workspace, name)?;
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => {
                    collected.insert(name.clone(), content);
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(RunnerError::Workspace(err)),
            }
        }

        let (outcome, elapsed) = match stage.status {
            None => (RunOutcome::TimedOut { budget }, budget),
            Some(status) if status.success() => (RunOutcome::Completed, stage.elapsed),
            Some(status) => {
                let message = if stage.stderr.trim().is_empty() {
                    format!("process exited with {}", status)
                } else {
                    stage.stderr.trim().to_string()
                };
                (
                    RunOutcome::RuntimeFault {
                        message,
                        exit_code: status.code(),
                    },
                    stage.elapsed,
                )
            }
        };
        let error_output = match &outcome {
            RunOutcome::RuntimeFault { message, .. } => message.clone(),
            RunOutcome::TimedOut { budget } => {
                format!("execution timed out after {}s", budget.as_secs_f64())
            }
            _ => stage.stderr.clone(),
        };

        let result = ExecutionResult {
            success: outcome == RunOutcome::Completed,
            standard_output: stage.stdout,
            error_output,
            warning_output,
            elapsed,
            timed_out: matches!(outcome, RunOutcome::TimedOut { .. }),
            outcome,
            collected,
        };
        tracing::info!(
            success = result.success,
            timed_out = result.timed_out,
            elapsed_ms = result.elapsed.as_millis() as u64,
            "execution finished"
        );
        Ok(result)
    }
}

/// A file name inside the workspace; anything with a path separator or a
/// parent reference is rejected.
fn workspace_file(workspace: &RunWorkspace, name: &str) -> Result<std::path::PathBuf, RunnerError> {
    let plain = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\');
    if !plain {
        return Err(RunnerError::InvalidFileName(name.to_string()));
    }
    Ok(workspace.dir.join(name))
}

async fn run_stage(
    argv: &[String],
    dir: &Path,
    env: &[(String, String)],
    limit: Duration,
) -> Result<StageOutput, RunnerError> {
    let Some((program, args)) = argv.split_first() else {
        return Err(RunnerError::EmptyCommand { stage: "stage" });
    };
    let mut child = Command::new(program)
        .args(args)
        .current_dir(dir)
        .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| RunnerError::Spawn {
            program: program.clone(),
            source,
        })?;

    let stdout = child.stdout.take().map(|pipe| tokio::spawn(read_all(pipe)));
    let stderr = child.stderr.take().map(|pipe| tokio::spawn(read_all(pipe)));

    let started = Instant::now();
    let status = match tokio::time::timeout(limit, child.wait()).await {
        Ok(waited) => Some(waited.map_err(|source| RunnerError::Wait {
            program: program.clone(),
            source,
        })?),
        Err(_) => {
            tracing::warn!(program = %program, limit_ms = limit.as_millis() as u64, "deadline reached, killing process");
            if let Err(err) = child.kill().await {
                tracing::warn!(program = %program, "failed to kill process: {}", err);
            }
            None
        }
    };
    let elapsed = started.elapsed();

    Ok(StageOutput {
        status,
        stdout: drain(stdout).await,
        stderr: drain(stderr).await,
        elapsed,
    })
}

async fn read_all<R: AsyncRead + Unpin>(mut pipe: R) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Err(err) = pipe.read_to_end(&mut buf).await {
        tracing::debug!("output pipe closed with error: {}", err);
    }
    buf
}

/// Collects a reader task's output. A pipe still held open by a leftover
/// grandchild is abandoned after [`PIPE_GRACE`].
async fn drain(reader: Option<JoinHandle<Vec<u8>>>) -> String {
    let Some(mut reader) = reader else {
        return String::new();
    };
    match tokio::time::timeout(PIPE_GRACE, &mut reader).await {
        Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
        Ok(Err(err)) => {
            tracing::debug!("output reader failed: {}", err);
            String::new()
        }
        Err(_) => {
            reader.abort();
            String::new()
        }
    }
}
