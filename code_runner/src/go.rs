use std::io::ErrorKind;
use std::process::Stdio;
use tempfile::tempdir;
use tokio::{process::Command, time::timeout};

use crate::execution_config::ExecutionConfig;
use crate::{RunOutcome, SUCCESS_MARKER, merge_output};

/// Banner prepended when `go test` passes without printing the marker
/// itself, so Go results render like Python ones.
const SUCCESS_BANNER: &str = "✅ All tests passed!";

/// Substring → stdlib import. Scanning test source against this table is a
/// deliberate enumerable heuristic, not dependency analysis: only names
/// listed here ever trigger an import.
const IMPORT_MARKERS: &[(&str, &str)] = &[
    ("time.", "time"),
    ("math.", "math"),
    ("fmt.", "fmt"),
    ("strings.", "strings"),
    ("sync.", "sync"),
    ("atomic.", "sync/atomic"),
    ("context.", "context"),
    ("errors.", "errors"),
    ("sort.", "sort"),
    ("bytes.", "bytes"),
    ("cmp.", "cmp"),
];

/// Prepend `package main` unless the submission already declares it.
pub(crate) fn ensure_package_main(code: &str) -> String {
    if code.contains("package main") {
        code.to_string()
    } else {
        format!("package main\n\n{}", code)
    }
}

/// Imports the synthesized test header needs: `testing` always, plus every
/// allow-listed package whose marker appears in the test source.
pub(crate) fn infer_imports(test_code: &str) -> Vec<&'static str> {
    let mut imports = vec!["testing"];
    for (marker, package) in IMPORT_MARKERS {
        if test_code.contains(marker) && !imports.contains(package) {
            imports.push(package);
        }
    }
    imports
}

/// Build the test file. Test sources that already declare `package main`
/// are taken as-is; otherwise a header with the inferred import block is
/// synthesized around them.
pub(crate) fn build_test_file(test_code: &str) -> String {
    if test_code.contains("package main") {
        return test_code.to_string();
    }
    let mut header = String::from("package main\n\nimport (\n");
    for import in infer_imports(test_code) {
        header.push_str(&format!("\t\"{}\"\n", import));
    }
    header.push_str(")\n\n");
    header.push_str(test_code);
    header
}

/// Runs a Go submission inside a throwaway module: fresh temp directory as
/// the module root, removed on every exit path.
pub async fn run(code: &str, test_code: &str, config: &ExecutionConfig) -> RunOutcome {
    let dir = match tempdir() {
        Ok(dir) => dir,
        Err(e) => return RunOutcome::failure(format!("Failed to create temp directory: {}", e)),
    };

    let files = [
        ("solution.go", ensure_package_main(code)),
        ("solution_test.go", build_test_file(test_code)),
        ("go.mod", "module sandbox\n\ngo 1.22\n".to_string()),
    ];
    for (name, contents) in files {
        if let Err(e) = std::fs::write(dir.path().join(name), contents) {
            return RunOutcome::failure(format!("Failed to write {}: {}", name, e));
        }
    }

    log::debug!("running go submission in {}", dir.path().display());
    let child = Command::new(&config.go_bin)
        .args(["test", "-v", "./..."])
        .current_dir(dir.path())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let child = match child {
        Ok(child) => child,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return RunOutcome::failure("Go toolchain is not installed on this machine");
        }
        Err(e) => return RunOutcome::failure(format!("Failed to start Go toolchain: {}", e)),
    };

    match timeout(config.timeout(), child.wait_with_output()).await {
        Err(_) => RunOutcome::failure(format!(
            "Execution timed out after {} seconds",
            config.timeout_secs
        )),
        Ok(Err(e)) => RunOutcome::failure(format!("Failed to collect output: {}", e)),
        Ok(Ok(out)) => {
            let mut output = merge_output(&out.stdout, &out.stderr);
            let passed = out.status.success()
                && (output.contains("PASS") || output.contains(SUCCESS_MARKER));
            if passed && !output.contains(SUCCESS_MARKER) {
                output = format!("{}\n\n{}", SUCCESS_BANNER, output);
            }
            RunOutcome { passed, output }
        }
    }
}
