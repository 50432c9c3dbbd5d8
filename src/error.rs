//! Streamtap error types and formatting
//!
//! - **`StreamtapError`** - A typed enum for the failures that decide the
//!   supervisor's own exit code. Use `.into()` to convert to `anyhow::Error`
//!   while preserving the type for pattern matching and `exit_code()`.
//!   Display produces styled output for users.
//!
//! Stream I/O failures inside relays never reach this module: a closed pipe
//! is how a relay learns it is done.

use std::io;
use std::path::PathBuf;

use color_print::cwrite;

use crate::path::format_path_for_display;
use crate::styling::{ERROR_EMOJI, HINT_EMOJI};

/// Exit code used when the target cannot be found (shell convention).
pub const EXIT_NOT_FOUND: i32 = 127;

/// Exit code used when the target exists but cannot be executed.
pub const EXIT_NOT_EXECUTABLE: i32 = 126;

/// Exit code for every other supervisor-side failure.
pub const EXIT_FAILURE: i32 = 1;

/// Domain errors for launching and supervising a child.
///
/// # Usage
///
/// ```ignore
/// return Err(StreamtapError::BinaryNotFound { binary: "claude".into() }.into());
///
/// if let Some(StreamtapError::LaunchFailed { kind, .. }) = err.downcast_ref() {
///     println!("spawn failed: {kind:?}");
/// }
/// ```
#[derive(Debug, Clone)]
pub enum StreamtapError {
    /// A bare `binary` name did not resolve on `PATH`.
    BinaryNotFound { binary: String },
    /// The only `PATH` match for `binary` is the supervisor itself.
    WrapsItself { binary: String, path: PathBuf },
    /// Spawning or exec'ing the target failed.
    LaunchFailed {
        program: PathBuf,
        kind: io::ErrorKind,
        error: String,
    },
    /// The log directory or file could not be created.
    LogOpenFailed { dir: PathBuf, error: String },
    /// A record could not be written; the run is aborted.
    LogWriteFailed { path: PathBuf, error: String },
    /// Configuration could not be loaded or is invalid.
    Config { message: String },
}

impl std::error::Error for StreamtapError {}

impl std::fmt::Display for StreamtapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamtapError::BinaryNotFound { binary } => {
                cwrite!(
                    f,
                    "{ERROR_EMOJI} <red>Target <bold>{binary}</> not found on PATH</>\n\n{HINT_EMOJI} <dim>Set an absolute path with STREAMTAP_BINARY or 'binary' in the config file</>"
                )
            }

            StreamtapError::WrapsItself { binary, path } => {
                let path_display = format_path_for_display(path);
                cwrite!(
                    f,
                    "{ERROR_EMOJI} <red>Target <bold>{binary}</> resolves to streamtap itself (<bold>{path_display}</>)</>\n\n{HINT_EMOJI} <dim>Point 'binary' at the real executable</>"
                )
            }

            StreamtapError::LaunchFailed { program, error, .. } => {
                let program = format_path_for_display(program);
                cwrite!(f, "{ERROR_EMOJI} <red>Failed to launch <bold>{program}</>: {error}</>")
            }

            StreamtapError::LogOpenFailed { dir, error } => {
                let dir = format_path_for_display(dir);
                cwrite!(
                    f,
                    "{ERROR_EMOJI} <red>Cannot create log file in <bold>{dir}</>: {error}</>\n\n{HINT_EMOJI} <dim>Set a writable directory with STREAMTAP_LOG_DIR</>"
                )
            }

            StreamtapError::LogWriteFailed { path, error } => {
                let path = format_path_for_display(path);
                cwrite!(
                    f,
                    "{ERROR_EMOJI} <red>Writing to <bold>{path}</> failed, aborting: {error}</>"
                )
            }

            StreamtapError::Config { message } => {
                cwrite!(f, "{ERROR_EMOJI} <red>Invalid configuration: {message}</>")
            }
        }
    }
}

impl StreamtapError {
    /// Wrap a spawn/exec failure, keeping the kind for exit code selection.
    pub fn launch(program: impl Into<PathBuf>, err: &io::Error) -> Self {
        StreamtapError::LaunchFailed {
            program: program.into(),
            kind: err.kind(),
            error: err.to_string(),
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            StreamtapError::BinaryNotFound { .. } => EXIT_NOT_FOUND,
            StreamtapError::LaunchFailed { kind, .. } => match kind {
                io::ErrorKind::NotFound => EXIT_NOT_FOUND,
                io::ErrorKind::PermissionDenied => EXIT_NOT_EXECUTABLE,
                _ => EXIT_FAILURE,
            },
            StreamtapError::WrapsItself { .. }
            | StreamtapError::LogOpenFailed { .. }
            | StreamtapError::LogWriteFailed { .. }
            | StreamtapError::Config { .. } => EXIT_FAILURE,
        }
    }
}

/// Extract the process exit code for an error reaching `main`.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<StreamtapError>()
        .map_or(EXIT_FAILURE, StreamtapError::exit_code)
}
