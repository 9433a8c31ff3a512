//! In-process probe firing.
//!
//! [`Tracker`] does in Rust what the emitted C# `VarTracker` does inside the
//! learner's program: number the firing, append trace lines, and look up
//! corrections from the expected trace. It lets host-side code (and tests)
//! produce traces that go through exactly the same collector and comparator
//! as traces from a real run.

use std::io::Write;
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;
use vartrace_core::{ExpectedValueEntry, ProbeId, Step, TypedValue, ValueRecord};

use crate::compare::ExpectedIndex;
use crate::context::RunContext;
use crate::error::CheckError;

/// What one probe firing produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Firing {
    pub step: Step,
    /// Corrected values by variable name, in capture order.
    pub corrections: IndexMap<String, TypedValue>,
}

/// Fires probes for one run, writing trace lines to `W`.
#[derive(Debug)]
pub struct Tracker<W: Write> {
    ctx: Arc<RunContext>,
    expected: ExpectedIndex,
    sink: Mutex<W>,
}

impl<W: Write> Tracker<W> {
    pub fn new(ctx: Arc<RunContext>, sink: W, expected: &[ExpectedValueEntry]) -> Self {
        Tracker {
            ctx,
            expected: ExpectedIndex::new(expected),
            sink: Mutex::new(sink),
        }
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    /// Fires `probe_id` with the given variable values.
    ///
    /// The step is allocated while the sink is held, so steps appear in the
    /// trace in increasing order even when several threads fire at once.
    pub fn track(
        &self,
        probe_id: ProbeId,
        values: &[(&str, TypedValue)],
    ) -> Result<Firing, CheckError> {
        let run_id = self.ctx.run_id();
        let mut sink = self
            .sink
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let step = self.ctx.next_step();

        let mut buf = String::new();
        for (name, value) in values {
            for record in ValueRecord::from_serialized(step, probe_id, name, &value.serialize()) {
                buf.push_str(&record.to_line());
                buf.push('\n');
            }
        }
        sink.write_all(buf.as_bytes())
            .and_then(|_| sink.flush())
            .map_err(|source| CheckError::TraceWrite { run_id, source })?;
        drop(sink);

        let mut corrections = IndexMap::new();
        if self.expected.diverges_at(step, probe_id) {
            return Ok(Firing { step, corrections });
        }
        for (name, value) in values {
            let Some(text) = self.expected.value(step, probe_id, name) else {
                continue;
            };
            match value.value_type().parse(text) {
                Ok(wanted) if wanted != *value => {
                    corrections.insert(name.to_string(), wanted);
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(run = %run_id, variable = %name, "ignoring expected value: {}", err)
                }
            }
        }
        Ok(Firing { step, corrections })
    }

    pub fn into_sink(self) -> W {
        self.sink
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
