use std::io::Write;
use std::process;
use std::sync::Arc;

use anyhow::Context;
use streamtap::args::{Mode, classify, supervised_args};
use streamtap::config::StreamtapConfig;
use streamtap::error::{StreamtapError, exit_code};
use streamtap::launch::{ChildSpec, exec_direct, resolve_binary};
use streamtap::signals::SignalForwarder;
use streamtap::sink::{LogSink, SinkOptions};
use streamtap::supervisor::{ParentStreams, Supervisor, SupervisorOptions};

fn main() {
    init_logging();

    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            // Error messages are already formatted with emoji and colors.
            // stderr may be closed; the exit code still has to come through.
            let _ = writeln!(anstream::stderr(), "{e:#}");
            exit_code(&e)
        }
    };
    process::exit(code);
}

/// Diagnostics go to stderr, filtered by `STREAMTAP_LOG` (default: warnings only).
///
/// Kept quiet by default since stderr also carries the child's relayed output.
fn init_logging() {
    let env = env_logger::Env::new()
        .filter_or("STREAMTAP_LOG", "warn")
        .write_style("STREAMTAP_LOG_STYLE");
    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .init();
}

fn run() -> anyhow::Result<i32> {
    let config = StreamtapConfig::load().map_err(|e| StreamtapError::Config {
        message: e.to_string(),
    })?;

    let classified = classify(std::env::args_os().skip(1));
    let program = resolve_binary(&config.binary)?;

    match classified.mode {
        Mode::Direct => {
            let spec = ChildSpec::new(program, classified.passthrough);
            Err(exec_direct(&spec).into())
        }
        Mode::Supervised => {
            let args = supervised_args(&config.stream_format, &classified.passthrough);
            let spec = ChildSpec::new(program, args);
            supervise(spec, &config)
        }
    }
}

fn supervise(spec: ChildSpec, config: &StreamtapConfig) -> anyhow::Result<i32> {
    let log_dir = config.log_dir();
    let sink = LogSink::create(&log_dir, SinkOptions { fsync: config.fsync }).map_err(|e| {
        StreamtapError::LogOpenFailed {
            dir: log_dir.clone(),
            error: e.to_string(),
        }
    })?;

    // Installed before spawning so no signal slips through to us unforwarded
    let (forwarder, signals) =
        SignalForwarder::install().context("failed to install signal handlers")?;

    let options = SupervisorOptions {
        grace_period: config.grace_period(),
        ..SupervisorOptions::default()
    };
    let result = Supervisor::new(spec, Arc::new(sink), options).run(ParentStreams::inherit(), signals);
    forwarder.close();
    result
}
