//! Runner behaviour against `sh` scripts standing in for compiled programs.

use std::time::Duration;

use vartrace_runner::{CommandToolchain, ExecutionRequest, RunOutcome, Runner, RunnerConfig, Severity};

fn shell(compile: &str) -> CommandToolchain {
    CommandToolchain {
        language: "sh".to_string(),
        source_file: "main.sh".to_string(),
        binary_file: "main.run".to_string(),
        compile: if compile.is_empty() {
            Vec::new()
        } else {
            vec!["sh".to_string(), "-c".to_string(), compile.to_string()]
        },
        run: vec!["sh".to_string(), "{binary}".to_string()],
    }
}

fn runner(compile: &str, budget: Duration) -> Runner<CommandToolchain> {
    Runner::new(
        shell(compile),
        RunnerConfig {
            time_budget: budget,
            compile_timeout: Duration::from_secs(10),
        },
    )
}

const COPY: &str = "cp main.sh main.run";

#[tokio::test]
async fn completed_run_returns_stdout_and_collected_files() {
    let script = "echo hello\nprintf '1//1//x//Int32//0//5\\n' >> \"$VARTRACE_TRACE_PATH\"\n";
    let request = ExecutionRequest::new(script)
        .env("VARTRACE_TRACE_PATH", "values.txt")
        .collect("values.txt")
        .collect("missing.txt");
    let result = runner(COPY, Duration::from_secs(10))
        .execute(&request)
        .await
        .unwrap();
    assert!(result.success);
    assert!(!result.timed_out);
    assert_eq!(result.outcome, RunOutcome::Completed);
    assert_eq!(result.standard_output, "hello\n");
    assert_eq!(result.collected["values.txt"], "1//1//x//Int32//0//5\n");
    assert!(!result.collected.contains_key("missing.txt"));
}

#[tokio::test]
async fn missing_binary_is_a_runtime_fault() {
    // No compile stage, so the run command's binary never appears.
    let result = runner("", Duration::from_secs(10))
        .execute(&ExecutionRequest::new("echo hi\n"))
        .await
        .unwrap();
    assert!(!result.success);
    assert!(matches!(result.outcome, RunOutcome::RuntimeFault { .. }));
}

#[tokio::test]
async fn input_files_are_visible_to_the_program() {
    let request = ExecutionRequest::new("cat expected.txt\n").input("expected.txt", "1 1 x 7\n");
    let result = runner(COPY, Duration::from_secs(10))
        .execute(&request)
        .await
        .unwrap();
    assert_eq!(result.standard_output, "1 1 x 7\n");
}

#[tokio::test]
async fn compile_errors_stop_before_running() {
    let compile = "echo 'Program.cs(3,5): error CS1002: ; expected'; \
                   echo 'Program.cs(1,1): warning CS0168: unused' ; exit 1";
    let request = ExecutionRequest::new("echo never\n");
    let result = runner(compile, Duration::from_secs(10))
        .execute(&request)
        .await
        .unwrap();
    assert!(!result.success);
    assert_eq!(result.standard_output, "");
    assert_eq!(result.error_output, "Program.cs(3,5): error CS1002: ; expected");
    assert_eq!(result.warning_output, "Program.cs(1,1): warning CS0168: unused");
    let RunOutcome::CompilationFailed { diagnostics } = &result.outcome else {
        panic!("expected compilation failure, got {:?}", result.outcome);
    };
    assert_eq!(diagnostics.len(), 2);
    assert_eq!(diagnostics[0].severity, Severity::Error);
}

#[tokio::test]
async fn warnings_are_kept_on_success() {
    let compile = "echo 'Program.cs(2,9): warning CS0219: assigned but never used'; cp main.sh main.run";
    let result = runner(compile, Duration::from_secs(10))
        .execute(&ExecutionRequest::new("echo ok\n"))
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.warning_output, "Program.cs(2,9): warning CS0219: assigned but never used");
}

#[tokio::test]
async fn non_zero_exit_is_a_runtime_fault_with_prior_output() {
    let script = "echo partial\necho 'Unhandled exception: IndexOutOfRangeException' >&2\nexit 3\n";
    let result = runner(COPY, Duration::from_secs(10))
        .execute(&ExecutionRequest::new(script))
        .await
        .unwrap();
    assert!(!result.success);
    assert!(!result.timed_out);
    assert_eq!(result.standard_output, "partial\n");
    assert_eq!(result.error_output, "Unhandled exception: IndexOutOfRangeException");
    assert!(matches!(
        result.outcome,
        RunOutcome::RuntimeFault { exit_code: Some(3), .. }
    ));
}

#[tokio::test]
async fn endless_loop_times_out_with_partial_trace() {
    let script = "printf '1//1//i//Int32//0//0\\n' >> \"$VARTRACE_TRACE_PATH\"\nwhile :; do :; done\n";
    let budget = Duration::from_millis(500);
    let request = ExecutionRequest::new(script)
        .env("VARTRACE_TRACE_PATH", "values.txt")
        .collect("values.txt");
    let result = runner(COPY, budget).execute(&request).await.unwrap();
    assert!(result.timed_out);
    assert!(!result.success);
    assert_eq!(result.elapsed, budget);
    assert_eq!(result.outcome, RunOutcome::TimedOut { budget });
    assert_eq!(result.collected["values.txt"], "1//1//i//Int32//0//0\n");
}
