use std::io::ErrorKind;
use std::process::Stdio;
use tempfile::Builder;
use tokio::{process::Command, time::timeout};

use crate::execution_config::ExecutionConfig;
use crate::{RunOutcome, SUCCESS_MARKER, merge_output};

/// Runs a Python submission: code and test code concatenated into one
/// script, executed in a fresh temp file.
///
/// The working directory is the *generic* OS temp dir, not the script's own
/// directory: submitted files must not be importable as local modules next
/// to each other.
pub async fn run(code: &str, test_code: &str, config: &ExecutionConfig) -> RunOutcome {
    let source = format!("{}\n\n{}", code, test_code);

    // The handle owns the file: dropped (and deleted) on every exit path
    // below, including spawn failures.
    let script = match Builder::new().prefix("submission_").suffix(".py").tempfile() {
        Ok(file) => file,
        Err(e) => return RunOutcome::failure(format!("Failed to create temp file: {}", e)),
    };
    if let Err(e) = std::fs::write(script.path(), &source) {
        return RunOutcome::failure(format!("Failed to write temp file: {}", e));
    }

    log::debug!("running python submission via {}", script.path().display());
    let child = Command::new(&config.python_bin)
        .arg(script.path())
        .current_dir(std::env::temp_dir())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let child = match child {
        Ok(child) => child,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return RunOutcome::failure(format!(
                "Python interpreter '{}' is not installed on this machine",
                config.python_bin
            ));
        }
        Err(e) => return RunOutcome::failure(format!("Failed to start interpreter: {}", e)),
    };

    match timeout(config.timeout(), child.wait_with_output()).await {
        // Partial output from a killed process is not authoritative.
        Err(_) => RunOutcome::failure(format!(
            "Execution timed out after {} seconds",
            config.timeout_secs
        )),
        Ok(Err(e)) => RunOutcome::failure(format!("Failed to collect output: {}", e)),
        Ok(Ok(out)) => {
            let output = merge_output(&out.stdout, &out.stderr);
            RunOutcome {
                passed: out.status.success() && output.contains(SUCCESS_MARKER),
                output,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;

    fn config_with_timeout(secs: u64) -> ExecutionConfig {
        ExecutionConfig {
            timeout_secs: secs,
            ..ExecutionConfig::default()
        }
    }

    fn leftover_scripts() -> usize {
        fs::read_dir(env::temp_dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| {
                let name = e.file_name();
                let name = name.to_string_lossy();
                name.starts_with("submission_") && name.ends_with(".py")
            })
            .count()
    }

    #[tokio::test]
    async fn passing_submission() {
        let result = run(
            "def add(a, b):\n    return a + b",
            "assert add(2, 3) == 5\nprint('✅')",
            &ExecutionConfig::default(),
        )
        .await;
        assert!(result.passed, "expected pass, output:\n{}", result.output);
        assert!(result.output.contains("✅"));
    }

    #[tokio::test]
    async fn wrong_answer_fails() {
        let result = run(
            "def add(a, b):\n    return a - b",
            "assert add(2, 3) == 5\nprint('✅')",
            &ExecutionConfig::default(),
        )
        .await;
        assert!(!result.passed);
        assert!(result.output.contains("AssertionError"));
    }

    #[tokio::test]
    async fn clean_exit_without_marker_fails() {
        let result = run("x = 1", "print('done')", &ExecutionConfig::default()).await;
        assert!(!result.passed);
    }

    #[tokio::test]
    async fn timeout_kills_the_run_and_cleans_up() {
        let before = leftover_scripts();
        let result = run(
            "import time",
            "time.sleep(30)\nprint('✅')",
            &config_with_timeout(1),
        )
        .await;
        assert!(!result.passed);
        assert!(result.output.contains("timed out after 1 seconds"));
        // The temp script must be gone; other tests may have finished and
        // cleaned up theirs in the meantime, so no-growth is the invariant.
        assert!(leftover_scripts() <= before);
    }

    #[tokio::test]
    async fn missing_interpreter_is_reported() {
        let config = ExecutionConfig {
            python_bin: "definitely-not-a-python".to_string(),
            ..ExecutionConfig::default()
        };
        let result = run("x = 1", "print('✅')", &config).await;
        assert!(!result.passed);
        assert!(result.output.contains("not installed"));
    }
}
