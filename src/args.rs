//! Splitting the invocation into supervisor directives and the target's own arguments.
//!
//! The supervisor has no argument vocabulary of its own beyond two things:
//!
//! - a mode flag, `--passthrough` (or `-pt`), selecting direct exec;
//! - the stream-format options `--output-format` / `--input-format`, which are
//!   always stripped because supervised runs inject their own values.
//!
//! Everything else reaches the target untouched and in order.

use std::ffi::{OsStr, OsString};

/// Mode flag spellings.
pub const PASSTHROUGH_FLAGS: [&str; 2] = ["--passthrough", "-pt"];

/// Stream-format options the supervisor owns.
pub const FORMAT_FLAGS: [&str; 2] = ["--output-format", "--input-format"];

/// How the target is run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Replace this process with the target; nothing is logged.
    Direct,
    /// Spawn the target behind relays and log all traffic.
    Supervised,
}

/// Result of classifying an invocation.
///
/// Tokens are kept as the OS handed them over, so arguments that are not
/// UTF-8 reach the target byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub mode: Mode,
    pub passthrough: Vec<OsString>,
}

/// Classify the invocation in a single pass.
///
/// A format flag given as two tokens always consumes the next token as its
/// value, even when that token looks like a flag. A format flag at the very
/// end has no value to consume and is dropped like any other format flag.
///
/// # Examples
/// ```
/// use streamtap::args::{Mode, classify};
///
/// let classified = classify(["--passthrough", "foo", "--output-format", "json"]);
/// assert_eq!(classified.mode, Mode::Direct);
/// assert_eq!(classified.passthrough, vec!["foo"]);
/// ```
pub fn classify<I, S>(invocation: I) -> Classified
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    let mut mode = Mode::Supervised;
    let mut passthrough = Vec::new();
    let mut tokens = invocation.into_iter().map(Into::into);

    while let Some(token) = tokens.next() {
        if is_passthrough_flag(&token) {
            mode = Mode::Direct;
            continue;
        }
        if is_format_flag(&token) {
            // The value belongs to the flag, but a mode flag is still a mode flag
            if let Some(value) = tokens.next()
                && is_passthrough_flag(&value)
            {
                mode = Mode::Direct;
            }
            continue;
        }
        if is_inline_format_flag(&token) {
            continue;
        }
        passthrough.push(token);
    }

    Classified { mode, passthrough }
}

/// Arguments for a supervised child: forced stream formats, then pass-through.
pub fn supervised_args(stream_format: &str, passthrough: &[OsString]) -> Vec<OsString> {
    FORMAT_FLAGS
        .iter()
        .flat_map(|flag| [OsString::from(flag), OsString::from(stream_format)])
        .chain(passthrough.iter().cloned())
        .collect()
}

fn is_passthrough_flag(token: &OsStr) -> bool {
    PASSTHROUGH_FLAGS.iter().any(|flag| token == OsStr::new(flag))
}

fn is_format_flag(token: &OsStr) -> bool {
    FORMAT_FLAGS.iter().any(|flag| token == OsStr::new(flag))
}

/// `--output-format=...` and friends, whatever bytes follow the `=`.
fn is_inline_format_flag(token: &OsStr) -> bool {
    let bytes = token.as_encoded_bytes();
    FORMAT_FLAGS.iter().any(|flag| {
        bytes
            .strip_prefix(flag.as_bytes())
            .is_some_and(|rest| rest.first() == Some(&b'='))
    })
}
