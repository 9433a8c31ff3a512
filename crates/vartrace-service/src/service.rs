//! TraceService: the single coordinator between front ends and the
//! instrumentation, runner, check and storage crates.
//!
//! All business logic flows through [`TraceService`]. Artifacts live in an
//! [`ArtifactStore`] behind an async mutex that is never held across a
//! program execution, so runs of different programs proceed concurrently.

use std::sync::Arc;

use tokio::sync::Mutex;

use vartrace_check::{collect, Comparator, RunContext};
use vartrace_core::{
    parse_expected_values, parse_tracking_spec, CodeId, ExpectedValueEntry, TrackingPoint,
};
use vartrace_instrument::tracker::{ENV_EXPECTED_PATH, ENV_RUN_ID, ENV_TRACE_PATH};
use vartrace_instrument::{instrument, TypeIndex};
use vartrace_runner::{ExecutionRequest, Runner, Toolchain};
use vartrace_storage::{ArtifactKey, ArtifactKind, ArtifactStore, StorageError};

use crate::error::ServiceError;
use crate::registry::ActiveRuns;
use crate::schema::{
    ExpectedSummary, InstrumentReport, RunReport, UploadRequest, UploadResponse, VariableListing,
};

/// Workspace file the tracker appends to.
const TRACE_FILE: &str = "values.txt";
/// Workspace file the tracker loads expected values from.
const EXPECTED_FILE: &str = "expected.txt";

/// The central service for uploading, instrumenting and running programs.
pub struct TraceService<S, T> {
    store: Arc<Mutex<S>>,
    runner: Arc<Runner<T>>,
    active: ActiveRuns,
}

impl<S, T> Clone for TraceService<S, T> {
    fn clone(&self) -> Self {
        TraceService {
            store: Arc::clone(&self.store),
            runner: Arc::clone(&self.runner),
            active: self.active.clone(),
        }
    }
}

impl<S, T> TraceService<S, T>
where
    S: ArtifactStore + Send,
    T: Toolchain,
{
    pub fn new(store: S, runner: Runner<T>) -> Self {
        TraceService {
            store: Arc::new(Mutex::new(store)),
            runner: Arc::new(runner),
            active: ActiveRuns::new(),
        }
    }

    pub fn active_runs(&self) -> &ActiveRuns {
        &self.active
    }

    // -------------------------------------------------------------------
    // Programs
    // -------------------------------------------------------------------

    /// Stores a new program and its tracking points.
    pub async fn upload(&self, request: UploadRequest) -> Result<UploadResponse, ServiceError> {
        let code_id = CodeId::parse(&request.code_id)?;
        if !request.file_name.to_ascii_lowercase().ends_with(".cs") {
            return Err(ServiceError::BadRequest(format!(
                "'{}' is not a C# source file",
                request.file_name
            )));
        }
        if request.source.trim().is_empty() {
            return Err(ServiceError::BadRequest("source file is empty".to_string()));
        }
        let spec = parse_tracking_spec(&request.tracking_spec);
        if spec.items.is_empty() {
            return Err(ServiceError::BadRequest(
                "tracking spec has no usable tracking points".to_string(),
            ));
        }

        let source_key = ArtifactKey::code(&code_id, ArtifactKind::Source);
        source_key.validate()?;
        if self.store.lock().await.exists(&source_key)? {
            return Err(ServiceError::Conflict(format!(
                "program {} already exists",
                code_id.as_str()
            )));
        }

        if request.verify {
            let result = self
                .runner
                .execute(&ExecutionRequest::new(request.source.clone()))
                .await?;
            if !result.success {
                return Err(ServiceError::BadRequest(format!(
                    "program does not run cleanly: {}",
                    result.error_output
                )));
            }
        }

        let mut store = self.store.lock().await;
        // Re-checked under the lock: another upload may have won the race
        // while the program was being verified.
        if store.exists(&source_key)? {
            return Err(ServiceError::Conflict(format!(
                "program {} already exists",
                code_id.as_str()
            )));
        }
        store.put(&source_key, &request.source)?;
        store.put(
            &ArtifactKey::code(&code_id, ArtifactKind::TrackingSpec),
            &request.tracking_spec,
        )?;
        tracing::info!(
            code = code_id.as_str(),
            points = spec.items.len(),
            skipped = spec.skipped.len(),
            "program uploaded"
        );

        Ok(UploadResponse {
            code_id,
            tracking_points: spec.items.len(),
            skipped_lines: spec.skipped,
        })
    }

    /// Replaces a program's source (and optionally its tracking points).
    /// The stale instrumented artifact is removed.
    pub async fn update_source(
        &self,
        code_id: &str,
        source: &str,
        tracking_spec: Option<&str>,
    ) -> Result<UploadResponse, ServiceError> {
        let code_id = CodeId::parse(code_id)?;
        if source.trim().is_empty() {
            return Err(ServiceError::BadRequest("source file is empty".to_string()));
        }
        let mut store = self.store.lock().await;
        let source_key = ArtifactKey::code(&code_id, ArtifactKind::Source);
        if !store.exists(&source_key)? {
            return Err(ServiceError::NotFound(format!("program {}", code_id.as_str())));
        }

        let spec_key = ArtifactKey::code(&code_id, ArtifactKind::TrackingSpec);
        let spec_text = match tracking_spec {
            Some(text) => text.to_string(),
            None => store.get(&spec_key)?,
        };
        let spec = parse_tracking_spec(&spec_text);
        if spec.items.is_empty() {
            return Err(ServiceError::BadRequest(
                "tracking spec has no usable tracking points".to_string(),
            ));
        }

        store.put(&source_key, source)?;
        if tracking_spec.is_some() {
            store.put(&spec_key, &spec_text)?;
        }
        let removed = store.delete(&ArtifactKey::code(&code_id, ArtifactKind::Instrumented))?;
        tracing::info!(
            code = code_id.as_str(),
            stale_artifact_removed = removed,
            "program source updated"
        );

        Ok(UploadResponse {
            code_id,
            tracking_points: spec.items.len(),
            skipped_lines: spec.skipped,
        })
    }

    /// Instruments a stored program and stores the artifact.
    pub async fn instrument(&self, code_id: &str) -> Result<InstrumentReport, ServiceError> {
        let code_id = CodeId::parse(code_id)?;
        let mut store = self.store.lock().await;
        let (report, source) = instrument_stored(&*store, &code_id)?;
        store.put(&ArtifactKey::code(&code_id, ArtifactKind::Instrumented), &source)?;
        Ok(report)
    }

    /// Validates and stores the learner's expected values. Only lines that
    /// decode are kept.
    pub async fn submit_expected(
        &self,
        code_id: &str,
        text: &str,
    ) -> Result<ExpectedSummary, ServiceError> {
        let code_id = CodeId::parse(code_id)?;
        let decoded = parse_expected_values(text);
        if decoded.items.is_empty() {
            return Err(ServiceError::BadRequest(
                "no expected values could be read".to_string(),
            ));
        }
        for skipped in &decoded.skipped {
            tracing::debug!(line_no = skipped.line_no, "skipping expected-value line: {}", skipped.reason);
        }

        let mut store = self.store.lock().await;
        if !store.exists(&ArtifactKey::code(&code_id, ArtifactKind::Source))? {
            return Err(ServiceError::NotFound(format!("program {}", code_id.as_str())));
        }
        let normalized: String = decoded
            .items
            .iter()
            .map(|entry| format!("{}\n", entry.to_line()))
            .collect();
        store.put(&ArtifactKey::code(&code_id, ArtifactKind::Expected), &normalized)?;

        Ok(ExpectedSummary {
            code_id,
            entries: decoded.items.len(),
            skipped_lines: decoded.skipped,
        })
    }

    /// Declared variables in a stored program.
    pub async fn variables(&self, code_id: &str) -> Result<VariableListing, ServiceError> {
        let code_id = CodeId::parse(code_id)?;
        let source = self
            .store
            .lock()
            .await
            .get(&ArtifactKey::code(&code_id, ArtifactKind::Source))?;
        Ok(VariableListing {
            variables: TypeIndex::scan(&source).listing(),
            code_id,
        })
    }

    /// Ids of all stored programs, sorted.
    pub async fn list(&self) -> Result<Vec<CodeId>, ServiceError> {
        Ok(self.store.lock().await.list_codes()?)
    }

    /// Reads any stored artifact.
    pub async fn artifact(&self, owner: &str, kind: ArtifactKind) -> Result<String, ServiceError> {
        Ok(self.store.lock().await.get(&ArtifactKey::new(owner, kind))?)
    }

    // -------------------------------------------------------------------
    // Runs
    // -------------------------------------------------------------------

    /// Executes a program's instrumented artifact, instrumenting it first if
    /// needed, then checks the trace against the expected values.
    ///
    /// A program that fails to compile, faults or times out still produces
    /// a report; only infrastructure failures are errors.
    pub async fn run(&self, code_id: &str) -> Result<RunReport, ServiceError> {
        let code_id = CodeId::parse(code_id)?;
        let ctx = RunContext::new();
        let run_id = ctx.run_id();
        let _guard = self.active.begin(&code_id, run_id)?;

        let (instrumented, points, expected_text) = {
            let mut store = self.store.lock().await;
            let instrumented_key = ArtifactKey::code(&code_id, ArtifactKind::Instrumented);
            let instrumented = match store.get(&instrumented_key) {
                Ok(source) => source,
                Err(StorageError::NotFound(_)) => {
                    let (report, source) = instrument_stored(&*store, &code_id)?;
                    tracing::debug!(code = code_id.as_str(), probes = report.probes.len(), "instrumented before run");
                    store.put(&instrumented_key, &source)?;
                    source
                }
                Err(err) => return Err(err.into()),
            };
            let points = load_points(&*store, &code_id)?;
            let expected_text =
                optional(store.get(&ArtifactKey::code(&code_id, ArtifactKind::Expected)))?;
            (instrumented, points, expected_text)
        };
        let expected: Vec<ExpectedValueEntry> = expected_text
            .as_deref()
            .map(|text| parse_expected_values(text).items)
            .unwrap_or_default();

        tracing::info!(run = %run_id, code = code_id.as_str(), expected = expected.len(), "run started");
        let mut request = ExecutionRequest::new(instrumented)
            .env(ENV_RUN_ID, run_id.to_string())
            .env(ENV_TRACE_PATH, TRACE_FILE)
            .collect(TRACE_FILE);
        if let Some(text) = expected_text {
            request = request.env(ENV_EXPECTED_PATH, EXPECTED_FILE).input(EXPECTED_FILE, text);
        }
        let mut execution = self.runner.execute(&request).await?;
        let trace_text = execution.collected.remove(TRACE_FILE).unwrap_or_default();

        let trace = collect(&trace_text);
        let steps_increasing = match trace.check_step_order(run_id) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(run = %run_id, "{}", err);
                false
            }
        };
        let comparison = Comparator::new(&points, &expected).compare(&ctx, &trace.values);

        let report = RunReport {
            run_id,
            code_id,
            execution,
            values: trace.values,
            mismatches: comparison.mismatches,
            corrections: comparison.corrections,
            step_diagnostics: comparison.step_diagnostics,
            skipped_lines: trace.skipped,
            steps_increasing,
        };
        self.persist_run(&report, &trace_text).await?;
        tracing::info!(
            run = %run_id,
            success = report.execution.success,
            timed_out = report.execution.timed_out,
            values = report.values.len(),
            mismatches = report.mismatches.len(),
            "run finished"
        );
        Ok(report)
    }

    /// Stores a run's artifacts under its run id.
    async fn persist_run(&self, report: &RunReport, trace_text: &str) -> Result<(), ServiceError> {
        let mismatches: String = report
            .mismatches
            .iter()
            .map(|m| format!("{}\n", m.to_line()))
            .collect();
        let json = serde_json::to_string_pretty(report)?;
        let run = |kind| ArtifactKey::run(report.run_id, kind);

        let mut store = self.store.lock().await;
        store.put(&run(ArtifactKind::Trace), trace_text)?;
        store.put(&run(ArtifactKind::Mismatches), &mismatches)?;
        store.put(&run(ArtifactKind::Output), &report.execution.standard_output)?;
        store.put(&run(ArtifactKind::Errors), &report.execution.error_output)?;
        store.put(&run(ArtifactKind::Warnings), &report.execution.warning_output)?;
        store.put(&run(ArtifactKind::Report), &json)?;
        Ok(())
    }
}

fn load_points<S: ArtifactStore>(store: &S, code_id: &CodeId) -> Result<Vec<TrackingPoint>, ServiceError> {
    let text = store.get(&ArtifactKey::code(code_id, ArtifactKind::TrackingSpec))?;
    Ok(parse_tracking_spec(&text).items)
}

fn instrument_stored<S: ArtifactStore>(
    store: &S,
    code_id: &CodeId,
) -> Result<(InstrumentReport, String), ServiceError> {
    let source = store.get(&ArtifactKey::code(code_id, ArtifactKind::Source))?;
    let points = load_points(store, code_id)?;
    let artifact = instrument(&source, &points)?;
    let report = InstrumentReport {
        code_id: code_id.clone(),
        probes: artifact.probes,
        failures: artifact.failures,
        entry_line: artifact.entry_line,
        digest: artifact.digest,
    };
    Ok((report, artifact.source))
}

/// `Ok(None)` for a missing artifact.
fn optional(result: Result<String, StorageError>) -> Result<Option<String>, ServiceError> {
    match result {
        Ok(text) => Ok(Some(text)),
        Err(StorageError::NotFound(_)) => Ok(None),
        Err(err) => Err(err.into()),
    }
}
