//! Usage and exit codes of the `flashloop` binary.

use std::process::{Command, Output, Stdio};

fn flashloop(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_flashloop"))
        .args(args)
        .stdin(Stdio::null())
        .output()
        .unwrap()
}

#[test]
fn missing_source_path_prints_usage_and_fails() {
    let output = flashloop(&[]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("USAGE"), "no usage in: {}", stderr);
    assert!(stderr.contains("SOURCE_PATH"));
}

#[test]
fn nonexistent_source_path_fails() {
    let output = flashloop(&["/nonexistent/flashloop/sketch"]);
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("/nonexistent/flashloop/sketch` does not exist"),
        "unexpected output: {}",
        stdout
    );
}

#[test]
fn non_numeric_baud_rate_fails() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().to_string_lossy().into_owned();
    let output = flashloop(&["--baud-rate=fast", &source]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stdout).contains("needs to be a numeric value"));
}
