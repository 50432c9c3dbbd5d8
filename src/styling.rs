//! Message emojis for user-facing output.
//!
//! Messages are styled with `color-print` tags and printed through `anstream`,
//! which strips the escapes when stderr is not a terminal:
//!
//! ```rust,ignore
//! use color_print::cformat;
//!
//! cformat!("{ERROR_EMOJI} <red>Failed to open <bold>{path}</></>")
//! ```
//!
//! | Semantic | color-print tag |
//! |----------|-----------------|
//! | Error | `<red>` |
//! | Hint | `<dim>` |

/// Error emoji: `cformat!("{ERROR_EMOJI} <red>message</>")`
pub const ERROR_EMOJI: &str = "❌";

/// Hint emoji: `cformat!("{HINT_EMOJI} <dim>message</>")`
pub const HINT_EMOJI: &str = "💡";
