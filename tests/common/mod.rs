//! Shared helpers: an isolated log directory and config per test, and bounded
//! process execution so a hung supervisor fails the test instead of the suite.

use insta::Settings;
use insta_cmd::{assert_cmd_snapshot, get_cargo_bin};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Duration;
use tempfile::TempDir;
use wait_timeout::ChildExt;

/// Upper bound for any single supervisor run in tests.
pub const RUN_TIMEOUT: Duration = Duration::from_secs(30);

pub fn mock_child_bin() -> PathBuf {
    get_cargo_bin("mock-child")
}

/// A throwaway environment for one supervisor invocation.
pub struct TestEnv {
    temp: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            temp: TempDir::new().unwrap(),
        }
    }

    pub fn log_dir(&self) -> PathBuf {
        self.temp.path().join("logs")
    }

    /// `streamtap` wired to `mock-child`, logging into this environment.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(get_cargo_bin("streamtap"));
        self.configure(&mut cmd);
        cmd
    }

    /// Point the supervisor at this environment, ignoring any user config.
    pub fn configure(&self, cmd: &mut Command) {
        for (key, _) in std::env::vars_os() {
            if key.to_string_lossy().starts_with("STREAMTAP_") {
                cmd.env_remove(key);
            }
        }
        cmd.env("STREAMTAP_CONFIG", self.temp.path().join("config.toml"))
            .env("STREAMTAP_BINARY", mock_child_bin())
            .env("STREAMTAP_LOG_DIR", self.log_dir())
            .env("STREAMTAP_GRACE_PERIOD_MS", "200");
    }

    pub fn write_config(&self, contents: &str) {
        fs::write(self.temp.path().join("config.toml"), contents).unwrap();
    }

    pub fn log_files(&self) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(self.log_dir()) else {
            return Vec::new();
        };
        entries.map(|entry| entry.unwrap().path()).collect()
    }

    /// The single log file of this environment.
    pub fn only_log(&self) -> PathBuf {
        let files = self.log_files();
        assert_eq!(files.len(), 1, "expected exactly one log file: {files:?}");
        files.into_iter().next().unwrap()
    }
}

/// What a finished supervisor run produced.
pub struct RunOutput {
    pub pid: u32,
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    /// `stdout` before lossy decoding.
    pub raw_stdout: Vec<u8>,
}

/// Run `cmd` with `input` on stdin (then closed), bounded by [`RUN_TIMEOUT`].
pub fn run_with_input(mut cmd: Command, input: &str) -> RunOutput {
    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn streamtap");

    let mut stdin = child.stdin.take().unwrap();
    // The child may exit without reading; a broken pipe here is fine
    let _ = stdin.write_all(input.as_bytes());
    drop(stdin);

    finish(child)
}

/// Wait for a spawned run, collecting whatever is left on its pipes.
pub fn finish(mut child: Child) -> RunOutput {
    let pid = child.id();
    let Some(status) = child.wait_timeout(RUN_TIMEOUT).unwrap() else {
        child.kill().unwrap();
        panic!("streamtap did not exit within {RUN_TIMEOUT:?}");
    };
    let output = child.wait_with_output().unwrap();
    RunOutput {
        pid,
        status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        raw_stdout: output.stdout,
    }
}

/// Snapshot a run with `insta_cmd`, stored as `tests/snapshots/<name>.snap`.
pub fn snapshot_run(name: &str, mut cmd: Command) {
    let mut settings = Settings::clone_current();
    settings.set_snapshot_path("../snapshots");
    settings.set_prepend_module_to_snapshot(false);
    settings.bind(|| {
        assert_cmd_snapshot!(name, cmd);
    });
}

/// Text of every record tagged `direction` (e.g. `"STDOUT"`), in file order.
pub fn records(log: &Path, direction: &str) -> Vec<String> {
    let tag = format!("] [{direction}] ");
    fs::read_to_string(log)
        .unwrap()
        .lines()
        .filter_map(|line| line.split_once(&tag).map(|(_, text)| text.to_string()))
        .collect()
}

/// Every line of `log` is a well-formed record.
pub fn assert_well_formed(log: &Path) {
    let re = regex::Regex::new(r"^\[\d{2}:\d{2}:\d{2}\.\d{3}\] \[(META|STDIN|STDOUT|STDERR)\] ")
        .unwrap();
    for line in fs::read_to_string(log).unwrap().lines() {
        assert!(re.is_match(line), "malformed record: {line:?}");
    }
}
