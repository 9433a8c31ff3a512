//! Artifact addressing.
//!
//! A program submission owns its source, tracking spec, instrumented
//! artifact and expected values; each run owns its trace, mismatches,
//! captured output and report. The file-name suffix of each kind is the
//! on-disk layout `<owner><suffix>`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use vartrace_core::{CodeId, RunId};

use crate::error::StorageError;

/// What an artifact holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// The learner's uninstrumented program.
    Source,
    /// Tracking points, one `line [probe] var...` per line.
    TrackingSpec,
    /// The program with probes and the tracker runtime spliced in.
    Instrumented,
    /// The learner's expected-value submission.
    Expected,
    Trace,
    Mismatches,
    Output,
    Errors,
    Warnings,
    /// JSON run report.
    Report,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 10] = [
        ArtifactKind::Source,
        ArtifactKind::TrackingSpec,
        ArtifactKind::Instrumented,
        ArtifactKind::Expected,
        ArtifactKind::Trace,
        ArtifactKind::Mismatches,
        ArtifactKind::Output,
        ArtifactKind::Errors,
        ArtifactKind::Warnings,
        ArtifactKind::Report,
    ];

    /// File-name suffix appended to the owner id.
    pub fn suffix(self) -> &'static str {
        match self {
            ArtifactKind::Source => ".cs",
            ArtifactKind::TrackingSpec => "init.txt",
            ArtifactKind::Instrumented => "modified.cs",
            ArtifactKind::Expected => "expected.txt",
            ArtifactKind::Trace => "values.txt",
            ArtifactKind::Mismatches => "mismatches.txt",
            ArtifactKind::Output => "output.txt",
            ArtifactKind::Errors => "errors.txt",
            ArtifactKind::Warnings => "warnings.txt",
            ArtifactKind::Report => "report.json",
        }
    }

    /// Whether artifacts of this kind belong to a run rather than a program.
    pub fn is_per_run(self) -> bool {
        matches!(
            self,
            ArtifactKind::Trace
                | ArtifactKind::Mismatches
                | ArtifactKind::Output
                | ArtifactKind::Errors
                | ArtifactKind::Warnings
                | ArtifactKind::Report
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::Source => "source",
            ArtifactKind::TrackingSpec => "tracking_spec",
            ArtifactKind::Instrumented => "instrumented",
            ArtifactKind::Expected => "expected",
            ArtifactKind::Trace => "trace",
            ArtifactKind::Mismatches => "mismatches",
            ArtifactKind::Output => "output",
            ArtifactKind::Errors => "errors",
            ArtifactKind::Warnings => "warnings",
            ArtifactKind::Report => "report",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        ArtifactKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| format!("unknown artifact kind '{s}'"))
    }
}

/// Address of one stored artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArtifactKey {
    /// Code id or run id text.
    pub owner: String,
    pub kind: ArtifactKind,
}

impl ArtifactKey {
    pub fn new(owner: impl Into<String>, kind: ArtifactKind) -> Self {
        ArtifactKey {
            owner: owner.into(),
            kind,
        }
    }

    pub fn code(code_id: &CodeId, kind: ArtifactKind) -> Self {
        ArtifactKey::new(code_id.as_str(), kind)
    }

    pub fn run(run_id: RunId, kind: ArtifactKind) -> Self {
        ArtifactKey::new(run_id.to_string(), kind)
    }

    /// Checks that the owner can be used as a file name prefix.
    ///
    /// A source owner may not end in `modified`: its file name would be the
    /// instrumented artifact of another program.
    pub fn validate(&self) -> Result<(), StorageError> {
        let invalid = |reason: &str| StorageError::InvalidKey {
            key: self.clone(),
            reason: reason.to_string(),
        };
        if self.owner.is_empty() {
            return Err(invalid("empty owner"));
        }
        if !self
            .owner
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(invalid("owner must be ASCII alphanumerics, '_' or '-'"));
        }
        if self.kind == ArtifactKind::Source && self.owner.ends_with("modified") {
            return Err(invalid("owner clashes with an instrumented artifact name"));
        }
        Ok(())
    }

    /// `<owner><suffix>`, e.g. `42modified.cs`.
    pub fn file_name(&self) -> String {
        format!("{}{}", self.owner, self.kind.suffix())
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.kind)
    }
}
