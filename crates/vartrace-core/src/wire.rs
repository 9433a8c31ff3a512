//! Line-oriented text formats shared by the tracker runtime, the collector
//! and the artifact store.
//!
//! | artifact | line |
//! |---|---|
//! | trace | `step//probe//variable//type//rank//value` |
//! | mismatches | `step//probe//line//variable//actual[//expected]` |
//! | expected values | `step probe variable value...` |
//! | tracking spec | `line [probe] variable...` |
//!
//! Decoders work one line at a time so callers can skip bad lines and keep
//! going; the bulk helpers here do exactly that for the two input formats.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::{ProbeId, Step};
use crate::record::{ExpectedValueEntry, MismatchRecord, TrackingPoint, ValueRecord};
use crate::value::Rank;

/// Separator between fields of trace and mismatch lines.
pub const FIELD_SEPARATOR: &str = "//";

const ESCAPE: char = '\\';

const TRACE_FIELDS: usize = 6;

/// A line that could not be decoded, kept for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedLine {
    /// 1-based line number within the artifact.
    pub line_no: usize,
    pub content: String,
    pub reason: String,
}

/// Result of decoding an input artifact that tolerates bad lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decoded<T> {
    pub items: Vec<T>,
    pub skipped: Vec<SkippedLine>,
}

impl<T> Default for Decoded<T> {
    fn default() -> Self {
        Decoded {
            items: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

impl ValueRecord {
    pub fn to_line(&self) -> String {
        format!(
            "{step}{sep}{probe}{sep}{name}{sep}{ty}{sep}{rank}{sep}{value}",
            sep = FIELD_SEPARATOR,
            step = self.step,
            probe = self.probe_id,
            name = self.variable_name,
            ty = self.type_name,
            rank = self.rank.as_u8(),
            value = self.serialized_value,
        )
    }

    /// Decodes one trace line. The value field is the remainder of the line,
    /// so it may itself contain the separator.
    pub fn parse_line(line: &str, line_no: usize) -> Result<ValueRecord, CoreError> {
        let malformed = |reason: String| CoreError::MalformedLine {
            kind: "trace",
            line_no,
            reason,
        };
        let fields: Vec<&str> = line.splitn(TRACE_FIELDS, FIELD_SEPARATOR).collect();
        if fields.len() != TRACE_FIELDS {
            return Err(malformed(format!(
                "expected {} fields, found {}",
                TRACE_FIELDS,
                fields.len()
            )));
        }
        let step = parse_step(fields[0]).map_err(&malformed)?;
        let probe_id = parse_probe(fields[1]).map_err(&malformed)?;
        let variable_name = parse_name(fields[2]).map_err(&malformed)?;
        let rank = fields[4]
            .trim()
            .parse::<u8>()
            .ok()
            .and_then(Rank::from_u8)
            .ok_or_else(|| malformed(format!("invalid rank '{}'", fields[4])))?;

        Ok(ValueRecord {
            step,
            probe_id,
            variable_name,
            type_name: fields[3].trim().to_string(),
            rank,
            serialized_value: fields[5].trim_end_matches('\r').to_string(),
        })
    }
}

impl MismatchRecord {
    /// Encodes as the 6-field (expected present) or 5-field (expected absent)
    /// form. Value fields are escaped (`\` and `/` get a leading `\`) so a
    /// value holding `//` never adds a field.
    pub fn to_line(&self) -> String {
        let mut line = format!(
            "{step}{sep}{probe}{sep}{line}{sep}{name}{sep}{actual}",
            sep = FIELD_SEPARATOR,
            step = self.step,
            probe = self.probe_id,
            line = self.line_number,
            name = self.variable_name,
            actual = escape_value(&self.actual_value),
        );
        if let Some(expected) = &self.expected_value {
            line.push_str(FIELD_SEPARATOR);
            line.push_str(&escape_value(expected));
        }
        line
    }

    /// Decodes either arity into the optional `expected_value` field.
    pub fn parse_line(line: &str, line_no: usize) -> Result<MismatchRecord, CoreError> {
        let malformed = |reason: String| CoreError::MalformedLine {
            kind: "mismatch",
            line_no,
            reason,
        };
        let fields = split_escaped(line.trim_end_matches('\r'));
        let expected_value = match fields.len() {
            5 => None,
            6 => Some(fields[5].clone()),
            n => return Err(malformed(format!("expected 5 or 6 fields, found {}", n))),
        };
        let line_number = fields[2]
            .trim()
            .parse::<usize>()
            .map_err(|_| malformed(format!("invalid line number '{}'", fields[2])))?;

        Ok(MismatchRecord {
            step: parse_step(&fields[0]).map_err(&malformed)?,
            probe_id: parse_probe(&fields[1]).map_err(&malformed)?,
            line_number,
            variable_name: parse_name(&fields[3]).map_err(&malformed)?,
            actual_value: fields[4].clone(),
            expected_value,
        })
    }
}

impl ExpectedValueEntry {
    pub fn to_line(&self) -> String {
        format!(
            "{} {} {} {}",
            self.step, self.probe_id, self.variable_name, self.value
        )
    }

    /// Decodes `step probe variable value`; the value is the rest of the line
    /// so string values may contain spaces.
    pub fn parse_line(line: &str, line_no: usize) -> Result<ExpectedValueEntry, CoreError> {
        let malformed = |reason: String| CoreError::MalformedLine {
            kind: "expected-value",
            line_no,
            reason,
        };
        let shape_error = || malformed("expected 'step probe variable value'".to_string());
        let mut rest = line.trim();
        let mut heads = Vec::with_capacity(3);
        for _ in 0..3 {
            let (head, tail) = rest.split_once(char::is_whitespace).ok_or_else(shape_error)?;
            heads.push(head);
            rest = tail.trim_start();
        }
        if rest.is_empty() {
            return Err(shape_error());
        }

        Ok(ExpectedValueEntry {
            step: parse_step(heads[0]).map_err(&malformed)?,
            probe_id: parse_probe(heads[1]).map_err(&malformed)?,
            variable_name: parse_name(heads[2]).map_err(&malformed)?,
            value: rest.to_string(),
        })
    }
}

/// Decodes an expected-value submission, skipping header, blank and
/// malformed lines.
pub fn parse_expected_values(text: &str) -> Decoded<ExpectedValueEntry> {
    let mut decoded = Decoded::default();
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match ExpectedValueEntry::parse_line(line, idx + 1) {
            Ok(entry) => decoded.items.push(entry),
            Err(err) => decoded.skipped.push(SkippedLine {
                line_no: idx + 1,
                content: line.to_string(),
                reason: err.to_string(),
            }),
        }
    }
    decoded
}

/// Decodes a tracking spec: `line [probe] variable...` per line.
///
/// Probe ids left out are assigned in file order, continuing after the
/// highest id seen so far. Lines with no variables or a bad line number are
/// skipped, as are lines needing an id once `u32::MAX` has been handed out.
pub fn parse_tracking_spec(text: &str) -> Decoded<TrackingPoint> {
    let mut decoded: Decoded<TrackingPoint> = Decoded::default();
    let mut next_probe = Some(1u32);
    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let mut tokens = line.split_whitespace().peekable();
        let Some(first) = tokens.next() else {
            continue;
        };
        let skip = |reason: &str| SkippedLine {
            line_no,
            content: line.to_string(),
            reason: reason.to_string(),
        };
        let Ok(line_number) = first.parse::<usize>() else {
            decoded.skipped.push(skip("line number is not an integer"));
            continue;
        };
        let explicit = tokens.peek().and_then(|t| t.parse::<u32>().ok());
        if explicit.is_some() {
            tokens.next();
        }
        let names: Vec<&str> = tokens.collect();
        if names.is_empty() {
            decoded.skipped.push(skip("no variables listed"));
            continue;
        }
        let probe_id = match explicit {
            Some(id) => {
                next_probe = next_probe
                    .zip(id.checked_add(1))
                    .map(|(next, after)| next.max(after));
                ProbeId(id)
            }
            None => {
                let Some(id) = next_probe else {
                    decoded.skipped.push(skip("no probe id left to assign"));
                    continue;
                };
                next_probe = id.checked_add(1);
                ProbeId(id)
            }
        };
        decoded
            .items
            .push(TrackingPoint::new(line_number, probe_id, names));
    }
    decoded
}

fn escape_value(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c == ESCAPE || c == '/' {
            out.push(ESCAPE);
        }
        out.push(c);
    }
    out
}

/// Splits on unescaped `//` and unescapes each field.
fn split_escaped(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            ESCAPE => match chars.next() {
                Some(next) => current.push(next),
                None => current.push(ESCAPE),
            },
            '/' if chars.peek() == Some(&'/') => {
                chars.next();
                fields.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

fn parse_step(raw: &str) -> Result<Step, String> {
    raw.trim()
        .parse::<u64>()
        .map(Step)
        .map_err(|_| format!("invalid step '{}'", raw))
}

fn parse_probe(raw: &str) -> Result<ProbeId, String> {
    raw.trim()
        .parse::<u32>()
        .map(ProbeId)
        .map_err(|_| format!("invalid probe id '{}'", raw))
}

fn parse_name(raw: &str) -> Result<String, String> {
    let name = raw.trim();
    if name.is_empty() {
        Err("empty variable name".to_string())
    } else {
        Ok(name.to_string())
    }
}
