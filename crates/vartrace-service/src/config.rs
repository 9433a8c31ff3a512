//! Service configuration from the environment.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use vartrace_runner::{CommandToolchain, RunnerConfig};

pub const ENV_STORAGE_DIR: &str = "VARTRACE_STORAGE_DIR";
pub const ENV_TIME_BUDGET_SECS: &str = "VARTRACE_TIME_BUDGET_SECS";
pub const ENV_COMPILE_TIMEOUT_SECS: &str = "VARTRACE_COMPILE_TIMEOUT_SECS";
pub const ENV_COMPILER: &str = "VARTRACE_COMPILER";
pub const ENV_RUNTIME: &str = "VARTRACE_RUNTIME";

/// Where artifacts live and how programs are built and run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub storage_dir: PathBuf,
    pub time_budget_secs: u64,
    pub compile_timeout_secs: u64,
    /// Compile argv template (`{source}`, `{binary}`, `{dir}`).
    pub compiler: String,
    /// Run argv template.
    pub runtime: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            storage_dir: PathBuf::from("code_files"),
            time_budget_secs: 15,
            compile_timeout_secs: 60,
            compiler: CommandToolchain::DEFAULT_COMPILE.to_string(),
            runtime: CommandToolchain::DEFAULT_RUN.to_string(),
        }
    }
}

impl ServiceConfig {
    /// Reads the configuration from process environment variables, falling
    /// back to defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        ServiceConfig::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = ServiceConfig::default();
        let secs = |key: &str, default: u64| match lookup(key) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(value) if value > 0 => value,
                _ => {
                    tracing::warn!(key, value = %raw, "ignoring invalid duration, using {}s", default);
                    default
                }
            },
            None => default,
        };
        let text = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        ServiceConfig {
            storage_dir: text(ENV_STORAGE_DIR)
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_dir),
            time_budget_secs: secs(ENV_TIME_BUDGET_SECS, defaults.time_budget_secs),
            compile_timeout_secs: secs(ENV_COMPILE_TIMEOUT_SECS, defaults.compile_timeout_secs),
            compiler: text(ENV_COMPILER).unwrap_or(defaults.compiler),
            runtime: text(ENV_RUNTIME).unwrap_or(defaults.runtime),
        }
    }

    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            time_budget: Duration::from_secs(self.time_budget_secs),
            compile_timeout: Duration::from_secs(self.compile_timeout_secs),
        }
    }

    pub fn toolchain(&self) -> CommandToolchain {
        CommandToolchain::from_templates(&self.compiler, &self.runtime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = ServiceConfig::from_lookup(|_| None);
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.runner_config(), RunnerConfig::default());
    }

    #[test]
    fn environment_overrides_defaults() {
        let env: HashMap<&str, &str> = [
            (ENV_STORAGE_DIR, "/var/vartrace"),
            (ENV_TIME_BUDGET_SECS, "3"),
            (ENV_COMPILER, "csc -out:{binary} {source}"),
            (ENV_COMPILE_TIMEOUT_SECS, "soon"),
        ]
        .into_iter()
        .collect();
        let config = ServiceConfig::from_lookup(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.storage_dir, PathBuf::from("/var/vartrace"));
        assert_eq!(config.time_budget_secs, 3);
        assert_eq!(config.compile_timeout_secs, 60);
        assert_eq!(config.toolchain().compile[0], "csc");
        assert_eq!(config.runtime, "mono {binary}");
    }
}
