//! Starting the target, either in place of this process or as a piped child.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};

use crate::error::StreamtapError;

/// Exit code reported for a child that did not exit normally.
const SIGNAL_EXIT_BASE: i32 = 128;

/// The resolved target and the exact arguments it receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildSpec {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl ChildSpec {
    pub fn new<I, S>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Shell-escaped command line, for META records. Lossy for non-UTF-8 arguments.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.to_string_lossy())
            .chain(self.args.iter().map(|arg| arg.to_string_lossy()))
            .map(shell_escape::escape)
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

/// Resolve the configured `binary` to an executable path.
///
/// Paths (anything with a separator) are used as given. Bare names are
/// looked up on `PATH`, skipping matches that are this executable, so the
/// supervisor can be installed under the target's own name.
pub fn resolve_binary(binary: &str) -> Result<PathBuf, StreamtapError> {
    let current = std::env::current_exe().ok();
    resolve_binary_excluding(binary, current.as_deref())
}

fn resolve_binary_excluding(
    binary: &str,
    own_exe: Option<&Path>,
) -> Result<PathBuf, StreamtapError> {
    if Path::new(binary).components().count() > 1 || Path::new(binary).is_absolute() {
        return Ok(PathBuf::from(binary));
    }

    let not_found = || StreamtapError::BinaryNotFound {
        binary: binary.to_string(),
    };
    let own_exe = own_exe.and_then(|exe| std::fs::canonicalize(exe).ok());
    let mut matches = which::which_all(binary).map_err(|_| not_found())?.peekable();
    let first = matches.peek().cloned().ok_or_else(not_found)?;

    for candidate in matches {
        let is_self = own_exe.as_ref().is_some_and(|exe| {
            std::fs::canonicalize(&candidate).is_ok_and(|resolved| &resolved == exe)
        });
        if is_self {
            log::debug!("Skipping {} (this executable)", candidate.display());
            continue;
        }
        return Ok(candidate);
    }

    Err(StreamtapError::WrapsItself {
        binary: binary.to_string(),
        path: first,
    })
}

/// Pipe handles of a spawned child, handed to the relays.
#[derive(Debug)]
pub struct ChildPipes {
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
}

/// A target running under supervision.
///
/// Owned by the coordinator. The exit status is cached once observed, so a
/// reaped child is never signalled.
#[derive(Debug)]
pub struct ChildProcess {
    child: Child,
    status: Option<ExitStatus>,
}

impl ChildProcess {
    /// Spawn with all three standard streams piped.
    pub fn spawn(spec: &ChildSpec) -> Result<Self, StreamtapError> {
        let child = spec
            .command()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| StreamtapError::launch(&spec.program, &e))?;
        log::debug!("Spawned {} as pid {}", spec.program.display(), child.id());
        Ok(Self {
            child,
            status: None,
        })
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Take the pipe handles. Returns `None` on a second call.
    pub fn take_pipes(&mut self) -> Option<ChildPipes> {
        Some(ChildPipes {
            stdin: self.child.stdin.take()?,
            stdout: self.child.stdout.take()?,
            stderr: self.child.stderr.take()?,
        })
    }

    /// Non-blocking exit check.
    pub fn poll_exit(&mut self) -> io::Result<Option<ExitStatus>> {
        if self.status.is_none() {
            self.status = self.child.try_wait()?;
        }
        Ok(self.status)
    }

    /// Deliver `signal` to the child if it is still running.
    ///
    /// Returns `false` without sending anything once the child has exited.
    pub fn forward_signal(&mut self, signal: i32) -> io::Result<bool> {
        if self.poll_exit()?.is_some() {
            return Ok(false);
        }
        send_signal(self.pid(), signal)?;
        Ok(true)
    }

    /// Kill and reap the child.
    pub fn kill(&mut self) -> io::Result<ExitStatus> {
        if let Some(status) = self.poll_exit()? {
            return Ok(status);
        }
        self.child.kill()?;
        let status = self.child.wait()?;
        self.status = Some(status);
        Ok(status)
    }
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: i32) -> io::Result<()> {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let signal = Signal::try_from(signal).map_err(io::Error::from)?;
    let pid = i32::try_from(pid).map_err(io::Error::other)?;
    kill(Pid::from_raw(pid), signal).map_err(io::Error::from)
}

#[cfg(not(unix))]
fn send_signal(pid: u32, signal: i32) -> io::Result<()> {
    // Console control events reach the whole process group on their own
    log::debug!("Not forwarding signal {signal} to {pid}: unsupported on this platform");
    Ok(())
}

/// The supervisor's exit code for a child's exit status.
///
/// A child killed by a signal maps to `128 + signal`, as shells report it.
pub fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return SIGNAL_EXIT_BASE + signal;
        }
    }
    SIGNAL_EXIT_BASE
}

/// Replace this process with the target. Only returns on failure.
///
/// `CommandExt::exec` resets SIGPIPE to its default before replacing the
/// image, so the target starts as if invoked natively. The reset sticks when
/// exec fails, so SIGPIPE is caught again before returning: reporting the
/// error on a closed stderr must yield `EPIPE`, not kill us.
#[cfg(unix)]
pub fn exec_direct(spec: &ChildSpec) -> StreamtapError {
    use std::os::unix::process::CommandExt;

    log::debug!("Exec'ing {}", spec.command_line());
    let err = spec.command().exec();
    if let Err(e) = catch_sigpipe() {
        log::debug!("Failed to restore SIGPIPE handling: {e}");
    }
    StreamtapError::launch(&spec.program, &err)
}

/// Handle SIGPIPE with a no-op flag so broken pipes surface as write errors.
#[cfg(unix)]
fn catch_sigpipe() -> io::Result<()> {
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    signal_hook::flag::register(signal_hook::consts::SIGPIPE, Arc::new(AtomicBool::new(false)))?;
    Ok(())
}

/// Run the target with inherited stdio and exit with its code.
///
/// Stands in for exec where the platform has no process replacement.
#[cfg(not(unix))]
pub fn exec_direct(spec: &ChildSpec) -> StreamtapError {
    match spec.command().status() {
        Ok(status) => std::process::exit(exit_code_of(status)),
        Err(e) => StreamtapError::launch(&spec.program, &e),
    }
}
