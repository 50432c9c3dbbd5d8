//! Catching SIGINT/SIGTERM aimed at the supervisor so the child gets them instead.
//!
//! Signals are turned into channel messages on a dedicated thread. The
//! coordinator owns the child and decides whether to forward: once the
//! child has been reaped nothing is sent.

use std::io;

use crossbeam_channel::Receiver;

#[cfg(unix)]
pub use imp::FORWARDED_SIGNALS;
pub use imp::SignalForwarder;

/// Human-readable name for a signal number (`SIGTERM`), for META records.
pub fn signal_name(signal: i32) -> String {
    known_name(signal).map_or_else(|| format!("signal {signal}"), str::to_string)
}

#[cfg(unix)]
fn known_name(signal: i32) -> Option<&'static str> {
    nix::sys::signal::Signal::try_from(signal)
        .ok()
        .map(|sig| sig.as_str())
}

#[cfg(not(unix))]
fn known_name(_signal: i32) -> Option<&'static str> {
    None
}

#[cfg(unix)]
mod imp {
    use super::*;
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::{Handle, Signals};
    use std::thread::{self, JoinHandle};

    /// Signals delivered to the supervisor that are re-sent to the child.
    pub const FORWARDED_SIGNALS: [i32; 2] = [SIGINT, SIGTERM];

    /// Owns the signal registration and the thread draining it.
    pub struct SignalForwarder {
        handle: Handle,
        thread: Option<JoinHandle<()>>,
    }

    impl SignalForwarder {
        /// Register handlers and start forwarding received signals to the returned channel.
        ///
        /// While installed, SIGINT and SIGTERM no longer terminate the
        /// supervisor; the child's exit does.
        pub fn install() -> io::Result<(Self, Receiver<i32>)> {
            let mut signals = Signals::new(FORWARDED_SIGNALS)?;
            let handle = signals.handle();
            let (tx, rx) = crossbeam_channel::unbounded();

            let thread = thread::Builder::new()
                .name("signal-forwarder".to_string())
                .spawn(move || {
                    for signal in signals.forever() {
                        log::debug!("Received {}", signal_name(signal));
                        if tx.send(signal).is_err() {
                            break;
                        }
                    }
                })?;

            Ok((
                Self {
                    handle,
                    thread: Some(thread),
                },
                rx,
            ))
        }

        /// Stop listening and wait for the forwarding thread.
        pub fn close(mut self) {
            self.shutdown();
        }

        fn shutdown(&mut self) {
            self.handle.close();
            if let Some(thread) = self.thread.take() {
                let _ = thread.join();
            }
        }
    }

    impl Drop for SignalForwarder {
        fn drop(&mut self) {
            self.shutdown();
        }
    }
}

#[cfg(not(unix))]
mod imp {
    use super::*;

    /// No signal interception on this platform; console events reach the
    /// child directly.
    pub struct SignalForwarder;

    impl SignalForwarder {
        pub fn install() -> io::Result<(Self, Receiver<i32>)> {
            Ok((Self, crossbeam_channel::never()))
        }

        pub fn close(self) {}
    }
}
