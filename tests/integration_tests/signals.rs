//! SIGINT/SIGTERM sent to the supervisor reach the child.

use crate::common::{TestEnv, finish, records};
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use rstest::rstest;
use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Stdio};

/// Start `mock-child wait-signal` under the supervisor and wait until it is listening.
fn spawn_waiting(env: &TestEnv) -> (Child, BufReader<std::process::ChildStdout>) {
    let mut cmd = env.command();
    cmd.arg("wait-signal")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = cmd.spawn().unwrap();

    let mut stdout = BufReader::new(child.stdout.take().unwrap());
    let mut line = String::new();
    stdout.read_line(&mut line).unwrap();
    assert_eq!(line, "ready\n");
    (child, stdout)
}

fn signal(child: &Child, sig: Signal) {
    kill(Pid::from_raw(child.id() as i32), sig).unwrap();
}

#[rstest]
#[case(Signal::SIGTERM)]
#[case(Signal::SIGINT)]
fn test_signal_is_forwarded(#[case] sig: Signal) {
    let env = TestEnv::new();
    let (child, mut stdout) = spawn_waiting(&env);

    signal(&child, sig);
    let output = finish(child);
    let mut rest = String::new();
    stdout.read_to_string(&mut rest).unwrap();

    assert_eq!(output.status.code(), Some(42), "stderr: {}", output.stderr);
    assert_eq!(rest, format!("caught {}\n", sig.as_str()));

    let meta = records(&env.only_log(), "META");
    assert!(
        meta.iter()
            .any(|m| m.starts_with(&format!("Forwarded {} to child", sig.as_str()))),
        "{meta:?}"
    );
    assert_eq!(meta.last().unwrap(), "Exited with code: 42");
}

#[test]
fn test_repeated_signals_do_not_crash_supervisor() {
    let env = TestEnv::new();
    let (child, mut stdout) = spawn_waiting(&env);

    // The child exits on the first; later ones either reach it or are dropped
    signal(&child, Signal::SIGTERM);
    signal(&child, Signal::SIGTERM);
    signal(&child, Signal::SIGTERM);
    let output = finish(child);
    let mut rest = String::new();
    stdout.read_to_string(&mut rest).unwrap();

    assert_eq!(output.status.code(), Some(42), "stderr: {}", output.stderr);
    assert_eq!(records(&env.only_log(), "STDOUT"), ["ready", "caught SIGTERM"]);
}
