mod passthrough;
#[cfg(unix)]
mod signals;
