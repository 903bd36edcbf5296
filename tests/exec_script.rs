//! End-to-end runs of the built binary in script mode.

use std::env;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use tempfile::NamedTempFile;

fn bin_path() -> String {
    if let Ok(path) = env::var("CARGO_BIN_EXE_ebb") {
        return path;
    }
    let mut fallback =
        PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("manifest dir not set by cargo"));
    fallback.push("target");
    fallback.push("debug");
    fallback.push("ebb");
    if cfg!(windows) {
        fallback.set_extension("exe");
    }
    if fallback.exists() {
        return fallback.to_string_lossy().into_owned();
    }
    panic!(
        "binary path not set by cargo test and fallback {:?} not found",
        fallback
    );
}

fn run_script(script: &str) -> std::process::Output {
    let mut file = NamedTempFile::new().expect("temp script");
    file.write_all(script.as_bytes()).expect("write script");
    Command::new(bin_path())
        .arg("exec")
        .arg(file.path())
        .output()
        .expect("run ebb exec")
}

#[test]
fn exec_runs_a_scripted_session() {
    let output = run_script(
        "x := 40\n\
         x = x + 2\n\
         x\n\
         fmt.Println(\"done\")\n",
    );
    assert!(output.status.success(), "{:?}", output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout, "=> int: 42\ndone\n");
}

#[test]
fn exec_honors_multi_line_continuations() {
    let output = run_script(
        "f := func(n int) int {\n\
         return n * 2\n\
         }\n\
         f(21)\n",
    );
    assert!(output.status.success(), "{:?}", output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout, "=> int: 42\n");
}

#[test]
fn exec_reports_errors_but_keeps_going() {
    let output = run_script(
        "x := 1\n\
         *x\n\
         x\n",
    );
    // The type error is reported and the exit code is non-zero, but later
    // lines still run.
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("=> int: 1"), "stdout: {}", stdout);
}

#[test]
fn exec_fails_on_dangling_continuation() {
    let output = run_script("f := func() int {\n");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("mid-statement"), "stderr: {}", stderr);
}
