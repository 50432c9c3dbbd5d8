//! Lifecycle coordination for a supervised run.
//!
//! ```text
//! Starting ──spawn + relays──▶ Running ──child exits──▶ Draining ──relays done
//!                                                                  or grace over──▶ Finalized
//! ```
//!
//! The coordinator is the only owner of the child. While the child runs it
//! waits on three things at once: received signals (forwarded to the child),
//! relay reports (a failed log write aborts the run), and a short poll tick
//! to notice the child's exit. After exit, relays get a bounded grace period
//! to drain before the final META record is written and the log closed.

use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use crossbeam_channel::{Receiver, Sender, select};
use strum::IntoEnumIterator;

use crate::error::StreamtapError;
use crate::launch::{ChildPipes, ChildProcess, ChildSpec, exit_code_of};
use crate::relay::{Relay, RelayEnd, RelayReport};
use crate::signals::signal_name;
use crate::sink::{Direction, LogSink};

/// Timing knobs for a run.
#[derive(Debug, Clone, Copy)]
pub struct SupervisorOptions {
    /// How long relays may keep draining after the child exits.
    pub grace_period: Duration,
    /// How often to check for child exit while idle.
    pub poll_interval: Duration,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_millis(500),
            poll_interval: Duration::from_millis(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum LifecycleState {
    Starting,
    Running,
    Draining,
    Finalized,
}

impl LifecycleState {
    /// The only state reachable from this one.
    pub fn next(self) -> Option<LifecycleState> {
        match self {
            LifecycleState::Starting => Some(LifecycleState::Running),
            LifecycleState::Running => Some(LifecycleState::Draining),
            LifecycleState::Draining => Some(LifecycleState::Finalized),
            LifecycleState::Finalized => None,
        }
    }
}

/// The supervisor's own standard streams, as seen by the relays.
pub struct ParentStreams {
    pub stdin: Box<dyn Read + Send>,
    pub stdout: Box<dyn Write + Send>,
    pub stderr: Box<dyn Write + Send>,
}

impl ParentStreams {
    pub fn inherit() -> Self {
        Self {
            stdin: Box::new(io::stdin()),
            stdout: Box::new(io::stdout()),
            stderr: Box::new(io::stderr()),
        }
    }
}

/// Coordinates one supervised run from spawn to exit code.
pub struct Supervisor {
    spec: ChildSpec,
    sink: Arc<LogSink>,
    options: SupervisorOptions,
    state: LifecycleState,
}

impl Supervisor {
    pub fn new(spec: ChildSpec, sink: Arc<LogSink>, options: SupervisorOptions) -> Self {
        Self {
            spec,
            sink,
            options,
            state: LifecycleState::Starting,
        }
    }

    /// Run the child to completion and return the exit code to propagate.
    ///
    /// `signals` carries signal numbers to forward to the child.
    pub fn run(mut self, streams: ParentStreams, signals: Receiver<i32>) -> anyhow::Result<i32> {
        self.meta(&format!("Started: {}", self.spec.command_line()))?;
        self.meta(&format!("Log file: {}", self.sink.path().display()))?;

        let mut child = match ChildProcess::spawn(&self.spec) {
            Ok(child) => child,
            Err(err) => {
                let detail = match &err {
                    StreamtapError::LaunchFailed { error, .. } => error.clone(),
                    other => other.to_string(),
                };
                self.meta(&format!("Launch failed: {detail}"))?;
                self.close_sink()?;
                return Err(err.into());
            }
        };

        let result = self.supervise(&mut child, streams, signals);
        if result.is_err() {
            match child.kill() {
                Ok(status) => log::debug!("Killed child after fatal error: {status}"),
                Err(e) => log::debug!("Failed to kill child after fatal error: {e}"),
            }
            let _ = self.sink.close();
        }
        result
    }

    fn supervise(
        &mut self,
        child: &mut ChildProcess,
        streams: ParentStreams,
        signals: Receiver<i32>,
    ) -> anyhow::Result<i32> {
        let pipes = child
            .take_pipes()
            .context("child was spawned without piped streams")?;
        let (report_tx, report_rx) = crossbeam_channel::unbounded();
        self.start_relays(pipes, streams, &report_tx)
            .context("failed to start relay threads")?;
        self.advance(LifecycleState::Running);

        // report_tx stays alive here, so report_rx never disconnects while waiting
        let mut reports = Vec::with_capacity(3);
        let status = self.wait_for_exit(child, &signals, &report_rx, &mut reports)?;
        let code = exit_code_of(status);
        log::debug!("Child exited: {status}");
        self.advance(LifecycleState::Draining);

        self.drain(&report_rx, &mut reports)?;
        self.meta(&format!("Exited with code: {code}"))?;
        self.close_sink()?;
        self.advance(LifecycleState::Finalized);
        drop(report_tx);

        Ok(code)
    }

    fn start_relays(
        &self,
        pipes: ChildPipes,
        streams: ParentStreams,
        done: &Sender<RelayReport>,
    ) -> io::Result<()> {
        let sink = &self.sink;
        Relay::new(Direction::Stdin, streams.stdin, pipes.stdin, Arc::clone(sink))
            .spawn(done.clone())?;
        Relay::new(Direction::Stdout, pipes.stdout, streams.stdout, Arc::clone(sink))
            .spawn(done.clone())?;
        Relay::new(Direction::Stderr, pipes.stderr, streams.stderr, Arc::clone(sink))
            .spawn(done.clone())?;
        Ok(())
    }

    fn wait_for_exit(
        &self,
        child: &mut ChildProcess,
        signals: &Receiver<i32>,
        report_rx: &Receiver<RelayReport>,
        reports: &mut Vec<RelayReport>,
    ) -> anyhow::Result<std::process::ExitStatus> {
        let never = crossbeam_channel::never();
        let mut signals_closed = false;
        loop {
            if let Some(status) = child.poll_exit().context("failed to wait for child")? {
                return Ok(status);
            }

            // A disconnected channel is always ready; stop selecting on it
            let signal_rx = if signals_closed { &never } else { signals };
            select! {
                recv(signal_rx) -> msg => match msg {
                    Ok(signal) => self.forward(child, signal)?,
                    Err(_) => signals_closed = true,
                },
                recv(report_rx) -> msg => {
                    if let Ok(report) = msg {
                        self.check_report(&report)?;
                        reports.push(report);
                    }
                },
                default(self.options.poll_interval) => {}
            }
        }
    }

    fn forward(&self, child: &mut ChildProcess, signal: i32) -> Result<(), StreamtapError> {
        let name = signal_name(signal);
        match child.forward_signal(signal) {
            Ok(true) => self.meta(&format!("Forwarded {name} to child {}", child.pid())),
            Ok(false) => {
                log::debug!("Not forwarding {name}: child already exited");
                Ok(())
            }
            Err(e) => {
                log::warn!("Failed to forward {name} to child {}: {e}", child.pid());
                Ok(())
            }
        }
    }

    fn drain(
        &self,
        report_rx: &Receiver<RelayReport>,
        reports: &mut Vec<RelayReport>,
    ) -> Result<(), StreamtapError> {
        let deadline = Instant::now() + self.options.grace_period;
        while reports.len() < 3 {
            match report_rx.recv_deadline(deadline) {
                Ok(report) => {
                    self.check_report(&report)?;
                    reports.push(report);
                }
                Err(_) => break,
            }
        }

        for report in reports.iter() {
            log::debug!(
                "{} relay forwarded {} lines ({:?})",
                report.direction,
                report.lines,
                report.end
            );
        }

        let abandoned: Vec<String> = Direction::iter()
            .filter(|d| *d != Direction::Meta)
            .filter(|d| !reports.iter().any(|r| r.direction == *d))
            .map(|d| d.to_string())
            .collect();
        if !abandoned.is_empty() {
            let abandoned = abandoned.join(", ");
            log::debug!("Abandoning relays still running after grace period: {abandoned}");
            self.meta(&format!("Abandoned relays after grace period: {abandoned}"))?;
        }
        Ok(())
    }

    fn check_report(&self, report: &RelayReport) -> Result<(), StreamtapError> {
        match &report.end {
            RelayEnd::LogFailed(error) => Err(self.write_failed(error.clone())),
            _ => Ok(()),
        }
    }

    fn meta(&self, text: &str) -> Result<(), StreamtapError> {
        self.sink
            .append(Direction::Meta, text)
            .map_err(|e| self.write_failed(e.to_string()))
    }

    fn close_sink(&self) -> Result<(), StreamtapError> {
        self.sink
            .close()
            .map_err(|e| self.write_failed(e.to_string()))
    }

    fn write_failed(&self, error: String) -> StreamtapError {
        StreamtapError::LogWriteFailed {
            path: self.sink.path().to_path_buf(),
            error,
        }
    }

    fn advance(&mut self, to: LifecycleState) {
        debug_assert_eq!(self.state.next(), Some(to), "illegal lifecycle transition");
        log::debug!("Lifecycle: {} -> {to}", self.state);
        self.state = to;
    }
}
