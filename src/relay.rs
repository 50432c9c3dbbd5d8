//! Line pumps between the supervisor's standard streams and the child's.
//!
//! Each relay owns one source and one destination and runs on its own
//! thread, so a blocking read on one stream never stalls another. For every
//! line it appends a record to the run log, then forwards the line and
//! flushes. Bytes that are not UTF-8 are replaced with U+FFFD; the relay
//! keeps going.
//!
//! A closed or broken stream is the normal way a relay ends. The only
//! failure a relay reports as fatal is a failed log write.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;

use crate::sink::{Direction, LogSink};

/// Why a relay stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEnd {
    /// Source reached end of stream.
    Eof,
    /// Source or destination was closed under us (broken pipe and friends).
    Closed,
    /// Some other I/O failure on the source.
    ReadFailed(io::ErrorKind),
    /// Some other I/O failure on the destination.
    WriteFailed(io::ErrorKind),
    /// The run log rejected a record.
    LogFailed(String),
}

/// Sent by a relay thread when it finishes.
#[derive(Debug, Clone)]
pub struct RelayReport {
    pub direction: Direction,
    pub lines: u64,
    pub end: RelayEnd,
}

/// One unidirectional pump.
pub struct Relay<R, W> {
    direction: Direction,
    source: BufReader<R>,
    destination: W,
    sink: Arc<LogSink>,
}

impl<R: Read, W: Write> Relay<R, W> {
    pub fn new(direction: Direction, source: R, destination: W, sink: Arc<LogSink>) -> Self {
        Self {
            direction,
            source: BufReader::new(source),
            destination,
            sink,
        }
    }

    /// Pump until the source ends or a stream closes.
    ///
    /// Consumes the relay: the destination is dropped on return, which for
    /// the stdin relay closes the child's input.
    pub fn run(mut self) -> RelayReport {
        let mut lines = 0;
        let end = self.pump(&mut lines);
        log::debug!("{} relay ended after {lines} lines: {end:?}", self.direction);
        RelayReport {
            direction: self.direction,
            lines,
            end,
        }
    }

    fn pump(&mut self, lines: &mut u64) -> RelayEnd {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match self.source.read_until(b'\n', &mut buf) {
                Ok(0) => return RelayEnd::Eof,
                Ok(_) => {}
                Err(e) if is_closed(&e) => return RelayEnd::Closed,
                Err(e) => return RelayEnd::ReadFailed(e.kind()),
            }

            let line = String::from_utf8_lossy(&buf);
            if let Err(e) = self.sink.append(self.direction, &line) {
                return RelayEnd::LogFailed(e.to_string());
            }

            let forwarded = self
                .destination
                .write_all(line.as_bytes())
                .and_then(|()| self.destination.flush());
            match forwarded {
                Ok(()) => *lines += 1,
                Err(e) if is_closed(&e) => return RelayEnd::Closed,
                Err(e) => return RelayEnd::WriteFailed(e.kind()),
            }
        }
    }
}

impl<R, W> Relay<R, W>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    /// Run on a named thread, reporting the outcome on `done`.
    pub fn spawn(self, done: Sender<RelayReport>) -> io::Result<JoinHandle<()>> {
        let name = format!("relay-{}", self.direction.to_string().to_lowercase());
        thread::Builder::new().name(name).spawn(move || {
            let report = self.run();
            // The coordinator stops listening once the grace period is over
            let _ = done.send(report);
        })
    }
}

fn is_closed(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::WriteZero
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
    )
}
