//! `--passthrough` / `-pt`: the target runs directly, nothing is logged.

use crate::common::{TestEnv, run_with_input, snapshot_run};
use rstest::rstest;

#[rstest]
#[case("passthrough_long_flag", "--passthrough")]
#[case("passthrough_short_flag", "-pt")]
fn test_passthrough_receives_filtered_args(#[case] name: &str, #[case] flag: &str) {
    let env = TestEnv::new();
    let mut cmd = env.command();
    cmd.args([flag, "args", "foo", "--output-format", "json"]);

    snapshot_run(name, cmd);

    assert!(env.log_files().is_empty());
    assert!(!env.log_dir().exists(), "log directory should not be created");
}

#[test]
fn test_passthrough_flag_anywhere_in_invocation() {
    let env = TestEnv::new();
    let mut cmd = env.command();
    cmd.args(["args", "--input-format=text", "x", "-pt", "--flag"]);

    let output = run_with_input(cmd, "");

    assert_eq!(output.stdout, "args\nx\n--flag\n");
    assert!(env.log_files().is_empty());
}

#[test]
fn test_passthrough_keeps_stdio_and_exit_code() {
    let env = TestEnv::new();
    let mut cmd = env.command();
    cmd.args(["-pt", "emit", "to stdout", "to stderr", "5"]);

    snapshot_run("passthrough_emit_exit_code", cmd);
}

#[test]
fn test_passthrough_stdin_goes_straight_to_target() {
    let env = TestEnv::new();
    let mut cmd = env.command();
    cmd.args(["--passthrough", "echo"]);

    let output = run_with_input(cmd, "hello\nworld\n");

    assert!(output.status.success());
    assert_eq!(output.stdout, "hello\nworld\n");
    assert!(env.log_files().is_empty());
}

#[test]
fn test_passthrough_missing_target_fails() {
    let env = TestEnv::new();
    let mut cmd = env.command();
    cmd.env("STREAMTAP_BINARY", "/does/not/exist").arg("-pt");

    let output = run_with_input(cmd, "");

    assert_eq!(output.status.code(), Some(127));
    assert!(output.stderr.contains("Failed to launch"), "stderr: {}", output.stderr);
    assert!(env.log_files().is_empty());
}

#[cfg(unix)]
#[test]
fn test_passthrough_missing_target_with_closed_stderr() {
    use crate::common::finish;
    use std::process::Stdio;

    let env = TestEnv::new();
    let (reader, writer) = std::io::pipe().unwrap();
    drop(reader);

    let mut cmd = env.command();
    cmd.env("STREAMTAP_BINARY", "/does/not/exist")
        .arg("-pt")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(writer);
    let output = finish(cmd.spawn().unwrap());

    // Reporting the failure hits a broken pipe; the exit code is unaffected
    assert_eq!(output.status.code(), Some(127));
}

#[cfg(unix)]
#[test]
fn test_passthrough_keeps_non_utf8_arguments() {
    use std::os::unix::ffi::OsStrExt;

    let env = TestEnv::new();
    let mut cmd = env.command();
    cmd.args([
        std::ffi::OsStr::new("-pt"),
        std::ffi::OsStr::new("args"),
        std::ffi::OsStr::from_bytes(b"caf\xe9"),
    ]);

    let output = run_with_input(cmd, "");

    assert!(output.status.success(), "stderr: {}", output.stderr);
    assert_eq!(output.raw_stdout, b"args\ncaf\xe9\n");
}
