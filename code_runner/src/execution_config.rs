use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Default wall-clock bound for one evaluation.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Runtime knobs for the runner. Loaded from the environment with sane
/// defaults; tests construct it directly.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    pub timeout_secs: u64,
    pub python_bin: String,
    pub go_bin: String,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            python_bin: "python3".to_string(),
            go_bin: "go".to_string(),
        }
    }
}

impl ExecutionConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            timeout_secs: env::var("RUNNER_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.timeout_secs),
            python_bin: env::var("PYTHON_BIN").unwrap_or(defaults.python_bin),
            go_bin: env::var("GO_BIN").unwrap_or(defaults.go_bin),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = ExecutionConfig::default();
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(config.python_bin, "python3");
        assert_eq!(config.go_bin, "go");
        assert_eq!(config.timeout(), Duration::from_secs(10));
    }
}
