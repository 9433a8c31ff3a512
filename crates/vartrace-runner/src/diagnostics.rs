//! Compiler diagnostics in the `csc`/`mcs` format:
//!
//! ```text
//! Program.cs(12,9): error CS1002: ; expected
//! Program.cs(3,13): warning CS0168: The variable 'e' is declared but never used
//! error CS2001: Source file 'x.cs' could not be found
//! ```

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static DIAGNOSTIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:(?P<file>[^()]+)\((?P<line>\d+),(?P<col>\d+)\)\s*:\s*)?(?P<severity>error|warning)\s+(?P<code>[A-Z]+\d+)\s*:\s*(?P<message>.*?)\s*$",
    )
    .expect("diagnostic pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// One compiler message, with its original text kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub message: String,
    pub file: Option<String>,
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub raw: String,
}

impl Diagnostic {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Extracts diagnostics from compiler output. Lines that are not
/// diagnostics (banners, summaries) are ignored; a diagnostic reported
/// twice is kept once.
pub fn parse_diagnostics(output: &str) -> Vec<Diagnostic> {
    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    for line in output.lines() {
        let Some(caps) = DIAGNOSTIC.captures(line) else {
            continue;
        };
        let severity = if &caps["severity"] == "error" {
            Severity::Error
        } else {
            Severity::Warning
        };
        let diagnostic = Diagnostic {
            severity,
            code: caps["code"].to_string(),
            message: caps["message"].to_string(),
            file: caps.name("file").map(|m| m.as_str().trim().to_string()),
            line: caps.name("line").and_then(|m| m.as_str().parse().ok()),
            column: caps.name("col").and_then(|m| m.as_str().parse().ok()),
            raw: line.trim().to_string(),
        };
        if !diagnostics.contains(&diagnostic) {
            diagnostics.push(diagnostic);
        }
    }
    diagnostics
}

/// Raw text of the diagnostics with the given severity, one per line.
pub fn render(diagnostics: &[Diagnostic], severity: Severity) -> String {
    diagnostics
        .iter()
        .filter(|d| d.severity == severity)
        .map(|d| d.raw.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT: &str = "\
Program.cs(12,9): error CS1002: ; expected
Program.cs(3,13): warning CS0168: The variable 'e' is declared but never used
error CS2001: Source file 'x.cs' could not be found
Compilation failed: 2 error(s), 1 warnings
Program.cs(12,9): error CS1002: ; expected";

    #[test]
    fn located_and_unlocated_diagnostics_parse() {
        let diags = parse_diagnostics(OUTPUT);
        assert_eq!(diags.len(), 3);
        assert_eq!(diags[0].severity, Severity::Error);
        assert_eq!(diags[0].code, "CS1002");
        assert_eq!(diags[0].message, "; expected");
        assert_eq!(diags[0].file.as_deref(), Some("Program.cs"));
        assert_eq!(diags[0].line, Some(12));
        assert_eq!(diags[0].column, Some(9));
        assert_eq!(diags[2].file, None);
        assert_eq!(diags[2].line, None);
    }

    #[test]
    fn render_keeps_raw_text_by_severity() {
        let diags = parse_diagnostics(OUTPUT);
        assert_eq!(
            render(&diags, Severity::Warning),
            "Program.cs(3,13): warning CS0168: The variable 'e' is declared but never used"
        );
        assert_eq!(render(&diags, Severity::Error).lines().count(), 2);
    }

    #[test]
    fn banners_are_not_diagnostics() {
        assert!(parse_diagnostics("Microsoft (R) Visual C# Compiler\nok\n").is_empty());
    }
}
