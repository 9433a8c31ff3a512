//! Identifier newtypes for probes, steps, runs and submitted programs.
//!
//! Each ID is a distinct wrapper so a `ProbeId` cannot be passed where a
//! line number or a `Step` is expected.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Identity of one probe inside an instrumented artifact.
///
/// Stable for the lifetime of the artifact; re-instrumenting may renumber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProbeId(pub u32);

/// One probe firing. Strictly increasing within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Step(pub u64);

/// Unique identifier of one execution of an instrumented artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

/// Identifier of a submitted program (the key its artifacts are stored under).
///
/// Restricted to ASCII alphanumerics, `_` and `-` so it can be used verbatim
/// as a file name prefix.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CodeId(String);

impl RunId {
    /// Allocates a fresh random run id.
    pub fn new() -> Self {
        RunId(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        RunId::new()
    }
}

impl CodeId {
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let valid = !raw.is_empty()
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if valid {
            Ok(CodeId(raw.to_string()))
        } else {
            Err(CoreError::InvalidCodeId {
                raw: raw.to_string(),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for CodeId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CodeId::parse(s)
    }
}

impl TryFrom<String> for CodeId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        CodeId::parse(&value)
    }
}

impl From<CodeId> for String {
    fn from(id: CodeId) -> Self {
        id.0
    }
}

impl FromStr for RunId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(RunId)
            .map_err(|_| CoreError::InvalidRunId { raw: s.to_string() })
    }
}

// Display implementations -- just print the inner value, which is also the
// form used on the wire and in artifact names.

impl fmt::Display for ProbeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl fmt::Display for CodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_and_step_display() {
        assert_eq!(format!("{}", ProbeId(12)), "12");
        assert_eq!(format!("{}", Step(3)), "3");
    }

    #[test]
    fn run_ids_are_unique_and_parse_back() {
        let a = RunId::new();
        let b = RunId::new();
        assert_ne!(a, b);

        let text = a.to_string();
        assert_eq!(text.len(), 32);
        let back: RunId = text.parse().unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn code_id_accepts_file_safe_names() {
        assert_eq!(CodeId::parse("61_358067").unwrap().as_str(), "61_358067");
        assert_eq!(CodeId::parse("algo-7").unwrap().to_string(), "algo-7");
    }

    #[test]
    fn code_id_rejects_path_like_names() {
        assert!(CodeId::parse("").is_err());
        assert!(CodeId::parse("../etc").is_err());
        assert!(CodeId::parse("a b").is_err());
    }

    #[test]
    fn serde_roundtrip() {
        let probe = ProbeId(42);
        let json = serde_json::to_string(&probe).unwrap();
        let back: ProbeId = serde_json::from_str(&json).unwrap();
        assert_eq!(probe, back);

        let code = CodeId::parse("43").unwrap();
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, "\"43\"");
    }
}
