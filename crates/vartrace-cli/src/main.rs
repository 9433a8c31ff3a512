//! Variable trace CLI.
//!
//! Provides the `vartrace` binary with subcommands covering the whole
//! workflow: upload a C# program with its tracking points, instrument it,
//! submit expected values, run it and inspect the stored artifacts.
//!
//! Uses the same `vartrace_service::TraceService` as any other front end.
//! Results are printed to stdout as JSON; logs go to stderr (`RUST_LOG`
//! overrides the default `info` filter).

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use vartrace_runner::Runner;
use vartrace_service::{ServiceConfig, ServiceError, TraceService, UploadRequest};
use vartrace_storage::{ArtifactKind, FsStore};

/// Exit code for success.
const EXIT_OK: i32 = 0;
/// The program ran but did not complete (compile error, fault, timeout).
const EXIT_RUN_FAILED: i32 = 1;
/// Bad input or unknown program.
const EXIT_BAD_INPUT: i32 = 2;
/// I/O or internal failure.
const EXIT_INTERNAL: i32 = 3;

/// Instrument learner programs and check their variable traces.
#[derive(Parser, Debug)]
#[command(name = "vartrace", about = "Instrument C# programs and check variable traces")]
struct Cli {
    /// Artifact directory (default: $VARTRACE_STORAGE_DIR or ./code_files).
    #[arg(long, global = true)]
    storage_dir: Option<PathBuf>,

    /// Wall-clock bound for a run, in seconds.
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    time_budget: Option<u64>,

    /// Wall-clock bound for compiling, in seconds.
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    compile_timeout: Option<u64>,

    /// Compile command template, e.g. "mcs -out:{binary} {source}".
    #[arg(long, global = true)]
    compiler: Option<String>,

    /// Run command template, e.g. "mono {binary}".
    #[arg(long, global = true)]
    runtime: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Store a new program with its tracking points.
    Upload {
        /// Program id (ASCII letters, digits, '_' and '-').
        #[arg(short, long)]
        id: String,

        /// C# source file.
        #[arg(short, long)]
        source: PathBuf,

        /// Tracking points file: one `line [probe] var...` per line.
        #[arg(short, long)]
        tracking: PathBuf,

        /// Run the program once first and reject it if it fails.
        #[arg(long)]
        verify: bool,
    },

    /// Replace a stored program's source.
    Update {
        #[arg(short, long)]
        id: String,

        #[arg(short, long)]
        source: PathBuf,

        /// New tracking points (default: keep the stored ones).
        #[arg(short, long)]
        tracking: Option<PathBuf>,
    },

    /// Instrument a stored program.
    Instrument {
        #[arg(short, long)]
        id: String,
    },

    /// Submit expected values: one `step probe variable value` per line.
    Expect {
        #[arg(short, long)]
        id: String,

        #[arg(short, long)]
        file: PathBuf,
    },

    /// Run a program and compare its trace with the expected values.
    Run {
        #[arg(short, long)]
        id: String,
    },

    /// List the variables a program declares.
    Variables {
        #[arg(short, long)]
        id: String,
    },

    /// List stored programs.
    List,

    /// Print a stored artifact.
    Show {
        /// Program id or run id.
        #[arg(short, long)]
        owner: String,

        /// Artifact kind: source, tracking_spec, instrumented, expected,
        /// trace, mismatches, output, errors, warnings, report.
        #[arg(short, long)]
        kind: ArtifactKind,
    },
}

/// Why a command did not exit cleanly.
enum Failure {
    Service(ServiceError),
    Input { path: PathBuf, source: std::io::Error },
}

impl From<ServiceError> for Failure {
    fn from(err: ServiceError) -> Self {
        Failure::Service(err)
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli);
    tracing::debug!(?config, "resolved configuration");

    let exit_code = match execute(config, cli.command).await {
        Ok(code) => code,
        Err(failure) => report_failure(failure),
    };
    process::exit(exit_code);
}

/// Environment first, command-line flags on top.
fn resolve_config(cli: &Cli) -> ServiceConfig {
    let mut config = ServiceConfig::from_env();
    if let Some(dir) = &cli.storage_dir {
        config.storage_dir = dir.clone();
    }
    if let Some(secs) = cli.time_budget {
        config.time_budget_secs = secs;
    }
    if let Some(secs) = cli.compile_timeout {
        config.compile_timeout_secs = secs;
    }
    if let Some(compiler) = &cli.compiler {
        config.compiler = compiler.clone();
    }
    if let Some(runtime) = &cli.runtime {
        config.runtime = runtime.clone();
    }
    config
}

/// Runs one subcommand and returns its exit code.
async fn execute(config: ServiceConfig, command: Commands) -> Result<i32, Failure> {
    let store = FsStore::open(&config.storage_dir).map_err(ServiceError::from)?;
    let runner = Runner::new(config.toolchain(), config.runner_config());
    let service = TraceService::new(store, runner);

    let code = match command {
        Commands::Upload {
            id,
            source,
            tracking,
            verify,
        } => {
            let request = UploadRequest {
                code_id: id,
                file_name: file_name(&source),
                source: read_input(&source)?,
                tracking_spec: read_input(&tracking)?,
                verify,
            };
            print_json(&service.upload(request).await?)
        }
        Commands::Update {
            id,
            source,
            tracking,
        } => {
            let source = read_input(&source)?;
            let tracking = match &tracking {
                Some(path) => Some(read_input(path)?),
                None => None,
            };
            print_json(&service.update_source(&id, &source, tracking.as_deref()).await?)
        }
        Commands::Instrument { id } => print_json(&service.instrument(&id).await?),
        Commands::Expect { id, file } => {
            let text = read_input(&file)?;
            print_json(&service.submit_expected(&id, &text).await?)
        }
        Commands::Run { id } => {
            let report = service.run(&id).await?;
            match print_json(&report) {
                EXIT_OK if !report.execution.success => EXIT_RUN_FAILED,
                code => code,
            }
        }
        Commands::Variables { id } => print_json(&service.variables(&id).await?),
        Commands::List => print_json(&service.list().await?),
        Commands::Show { owner, kind } => {
            print!("{}", service.artifact(&owner, kind).await?);
            EXIT_OK
        }
    };
    Ok(code)
}

fn read_input(path: &Path) -> Result<String, Failure> {
    std::fs::read_to_string(path).map_err(|source| Failure::Input {
        path: path.to_path_buf(),
        source,
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Prints `value` as pretty JSON to stdout.
fn print_json<T: Serialize>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{}", json);
            EXIT_OK
        }
        Err(e) => {
            eprintln!("Error: failed to serialize result: {}", e);
            EXIT_INTERNAL
        }
    }
}

fn exit_code(err: &ServiceError) -> i32 {
    match err {
        ServiceError::NotFound(_) | ServiceError::BadRequest(_) | ServiceError::Conflict(_) => {
            EXIT_BAD_INPUT
        }
        ServiceError::Internal(_) => EXIT_INTERNAL,
    }
}

fn report_failure(failure: Failure) -> i32 {
    match failure {
        Failure::Service(err) => {
            let body = serde_json::json!({
                "success": false,
                "error": err.detail(),
            });
            println!("{}", body);
            eprintln!("Error: {}", err);
            exit_code(&err)
        }
        Failure::Input { path, source } => {
            eprintln!("Error: failed to read '{}': {}", path.display(), source);
            EXIT_INTERNAL
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_override_the_environment() {
        let cli = Cli::try_parse_from([
            "vartrace",
            "run",
            "--id",
            "42",
            "--time-budget",
            "3",
            "--storage-dir",
            "/tmp/vt",
        ])
        .unwrap();
        let config = resolve_config(&cli);
        assert_eq!(config.time_budget_secs, 3);
        assert_eq!(config.storage_dir, PathBuf::from("/tmp/vt"));
        assert!(matches!(cli.command, Commands::Run { ref id } if id == "42"));
    }

    #[test]
    fn zero_durations_are_rejected() {
        for flag in ["--time-budget", "--compile-timeout"] {
            let err = Cli::try_parse_from(["vartrace", "list", flag, "0"]).unwrap_err();
            assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        }
        assert!(Cli::try_parse_from(["vartrace", "list", "--time-budget", "1"]).is_ok());
    }

    #[test]
    fn show_parses_artifact_kinds() {
        let cli = Cli::try_parse_from(["vartrace", "show", "-o", "42", "-k", "tracking_spec"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Show { kind: ArtifactKind::TrackingSpec, .. }
        ));
        assert!(Cli::try_parse_from(["vartrace", "show", "-o", "42", "-k", "binary"]).is_err());
    }

    #[test]
    fn error_categories_map_to_exit_codes() {
        assert_eq!(exit_code(&ServiceError::NotFound("x".into())), EXIT_BAD_INPUT);
        assert_eq!(exit_code(&ServiceError::Conflict("x".into())), EXIT_BAD_INPUT);
        assert_eq!(exit_code(&ServiceError::Internal("x".into())), EXIT_INTERNAL);
    }
}
