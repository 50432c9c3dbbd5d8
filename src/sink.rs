//! The run log: one append-only text file per supervised run.
//!
//! Every record is a single line:
//!
//! ```text
//! [14:03:27.512] [STDOUT] {"type":"result"}
//! ```
//!
//! Relays append from their own threads. Each append formats the whole line
//! first and writes it under a mutex, so records never interleave and a
//! reader never sees a partial line that is not already flushed.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Local};

/// Which stream (or the supervisor itself) a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Direction {
    Meta,
    Stdin,
    Stdout,
    Stderr,
}

/// One line of the run log.
#[derive(Debug, Clone)]
pub struct LogRecord<'a> {
    pub timestamp: DateTime<Local>,
    pub direction: Direction,
    pub text: &'a str,
}

impl<'a> LogRecord<'a> {
    /// A record stamped now. A single trailing newline is not part of the text.
    pub fn now(direction: Direction, text: &'a str) -> Self {
        Self {
            timestamp: Local::now(),
            direction,
            text: text.strip_suffix('\n').unwrap_or(text),
        }
    }
}

impl std::fmt::Display for LogRecord<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] [{}] {}",
            self.timestamp.format("%H:%M:%S%.3f"),
            self.direction,
            self.text
        )
    }
}

/// Options controlling how hard each append pushes data to disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct SinkOptions {
    /// Call `sync_data` after each record, not just `flush`.
    pub fsync: bool,
}

/// The shared run log.
#[derive(Debug)]
pub struct LogSink {
    path: PathBuf,
    options: SinkOptions,
    // None once closed
    writer: Mutex<Option<BufWriter<File>>>,
}

impl LogSink {
    /// Create the log file for this run inside `dir`.
    ///
    /// The directory is created if missing. The file is named from the
    /// current time and this process's id and created exclusively, so two
    /// concurrent runs never share a file.
    pub fn create(dir: &Path, options: SinkOptions) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(log_file_name(Local::now(), std::process::id()));
        Self::create_at(path, options)
    }

    /// Create a log file at an exact path, failing if it already exists.
    pub fn create_at(path: PathBuf, options: SinkOptions) -> io::Result<Self> {
        let file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        log::debug!("Opened run log {}", path.display());
        Ok(Self::from_file(file, path, options))
    }

    /// Log into an already open file; `path` is only used for reporting.
    pub fn from_file(file: File, path: PathBuf, options: SinkOptions) -> Self {
        Self {
            path,
            options,
            writer: Mutex::new(Some(BufWriter::new(file))),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record and flush it before returning.
    ///
    /// Appends after [`close`](Self::close) are discarded; only relays that
    /// outlived the grace period can attempt them.
    pub fn append(&self, direction: Direction, text: &str) -> io::Result<()> {
        let line = format!("{}\n", LogRecord::now(direction, text));

        let mut guard = self.lock();
        let Some(writer) = guard.as_mut() else {
            log::debug!("Dropping {direction} record after log was closed");
            return Ok(());
        };
        writer.write_all(line.as_bytes())?;
        writer.flush()?;
        if self.options.fsync {
            writer.get_ref().sync_data()?;
        }
        Ok(())
    }

    /// Flush and release the file. Idempotent.
    pub fn close(&self) -> io::Result<()> {
        let Some(mut writer) = self.lock().take() else {
            return Ok(());
        };
        writer.flush()?;
        writer.get_ref().sync_all()?;
        log::debug!("Closed run log {}", self.path.display());
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.lock().is_none()
    }

    fn lock(&self) -> MutexGuard<'_, Option<BufWriter<File>>> {
        // A relay panicking mid-append leaves at worst a flushed partial line;
        // keep logging rather than cascading the panic.
        self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// `<YYYYmmdd-HHMMSS>-<pid>.log`
pub fn log_file_name(now: DateTime<Local>, pid: u32) -> String {
    format!("{}-{pid}.log", now.format("%Y%m%d-%H%M%S"))
}
