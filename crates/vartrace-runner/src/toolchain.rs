//! The toolchain contract: how a source file in a workspace is compiled
//! and run.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::diagnostics::{parse_diagnostics, Diagnostic};

/// Paths of one execution's temporary workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunWorkspace {
    pub dir: PathBuf,
    pub source_path: PathBuf,
    pub binary_path: PathBuf,
}

impl RunWorkspace {
    pub fn new(dir: &Path, source_file: &str, binary_file: &str) -> Self {
        RunWorkspace {
            dir: dir.to_path_buf(),
            source_path: dir.join(source_file),
            binary_path: dir.join(binary_file),
        }
    }
}

/// Language-specific compile and run stages.
pub trait Toolchain: Send + Sync {
    fn language(&self) -> &str;

    /// File name the source is written to inside the workspace.
    fn source_file_name(&self) -> &str;

    fn binary_file_name(&self) -> &str;

    /// Compile command line. An empty command skips the compile stage.
    fn compile_command(&self, workspace: &RunWorkspace) -> Vec<String>;

    fn run_command(&self, workspace: &RunWorkspace) -> Vec<String>;

    /// Diagnostics from the compile stage's combined output.
    fn parse_diagnostics(&self, output: &str) -> Vec<Diagnostic> {
        parse_diagnostics(output)
    }
}

/// A toolchain described by argv templates.
///
/// Arguments may contain `{source}`, `{binary}` and `{dir}`, replaced by
/// the workspace paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandToolchain {
    pub language: String,
    pub source_file: String,
    pub binary_file: String,
    pub compile: Vec<String>,
    pub run: Vec<String>,
}

impl CommandToolchain {
    pub const DEFAULT_COMPILE: &'static str = "mcs -out:{binary} {source}";
    pub const DEFAULT_RUN: &'static str = "mono {binary}";

    /// C# through Mono: `mcs` then `mono`.
    pub fn mono() -> Self {
        CommandToolchain::from_templates(Self::DEFAULT_COMPILE, Self::DEFAULT_RUN)
    }

    /// C# toolchain from whitespace-separated command templates.
    pub fn from_templates(compile: &str, run: &str) -> Self {
        CommandToolchain {
            language: "csharp".to_string(),
            source_file: "Program.cs".to_string(),
            binary_file: "Program.exe".to_string(),
            compile: split_template(compile),
            run: split_template(run),
        }
    }

    pub fn with_files(mut self, source_file: &str, binary_file: &str) -> Self {
        self.source_file = source_file.to_string();
        self.binary_file = binary_file.to_string();
        self
    }

    fn expand(template: &[String], workspace: &RunWorkspace) -> Vec<String> {
        let source = workspace.source_path.display().to_string();
        let binary = workspace.binary_path.display().to_string();
        let dir = workspace.dir.display().to_string();
        template
            .iter()
            .map(|arg| {
                arg.replace("{source}", &source)
                    .replace("{binary}", &binary)
                    .replace("{dir}", &dir)
            })
            .collect()
    }
}

impl Default for CommandToolchain {
    fn default() -> Self {
        CommandToolchain::mono()
    }
}

impl Toolchain for CommandToolchain {
    fn language(&self) -> &str {
        &self.language
    }

    fn source_file_name(&self) -> &str {
        &self.source_file
    }

    fn binary_file_name(&self) -> &str {
        &self.binary_file
    }

    fn compile_command(&self, workspace: &RunWorkspace) -> Vec<String> {
        Self::expand(&self.compile, workspace)
    }

    fn run_command(&self, workspace: &RunWorkspace) -> Vec<String> {
        Self::expand(&self.run, workspace)
    }
}

fn split_template(template: &str) -> Vec<String> {
    template.split_whitespace().map(str::to_string).collect()
}
