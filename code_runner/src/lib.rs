use serde::Serialize;

pub mod execution_config;
pub mod go;
pub mod python;

pub use crate::execution_config::ExecutionConfig;

/// Glyph whose presence in captured output marks a passing run. Test code is
/// expected to print it on success; there is no structured result parsing.
pub const SUCCESS_MARKER: &str = "✅";

/// Result of evaluating one code + test pair.
///
/// The runner never surfaces execution-domain failures as errors: timeouts,
/// crashes, a missing toolchain and a clean-but-markerless run all come back
/// as `passed: false` with a diagnostic in `output`.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub passed: bool,
    pub output: String,
}

impl RunOutcome {
    pub(crate) fn failure(output: impl Into<String>) -> Self {
        Self {
            passed: false,
            output: output.into(),
        }
    }
}

/// Evaluate `code` against `test_code` in the given language.
///
/// Any language value that is not recognizably Go takes the Python path.
pub async fn run_code(
    code: &str,
    test_code: &str,
    language: &str,
    config: &ExecutionConfig,
) -> RunOutcome {
    match language.trim().to_lowercase().as_str() {
        "go" | "golang" => go::run(code, test_code, config).await,
        _ => python::run(code, test_code, config).await,
    }
}

/// Merge captured stdout and stderr into the single stream callers see.
pub(crate) fn merge_output(stdout: &[u8], stderr: &[u8]) -> String {
    let stdout = String::from_utf8_lossy(stdout);
    let stderr = String::from_utf8_lossy(stderr);
    if stderr.trim().is_empty() {
        stdout.into_owned()
    } else if stdout.trim().is_empty() {
        stderr.into_owned()
    } else {
        format!("{}\n{}", stdout.trim_end(), stderr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_output_joins_streams() {
        assert_eq!(merge_output(b"out", b""), "out");
        assert_eq!(merge_output(b"", b"err"), "err");
        assert_eq!(merge_output(b"out\n", b"err\n"), "out\nerr\n");
    }
}
