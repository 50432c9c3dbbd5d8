use std::path::{Path, PathBuf};

/// Format a filesystem path for user-facing output.
///
/// When the path lives under the user's home directory, it is shown with a
/// leading `~` (e.g., `/home/alex/streamtap-logs/a.log` -> `~/streamtap-logs/a.log`).
/// Paths outside home are returned unchanged.
pub fn format_path_for_display(path: &Path) -> String {
    if let Some(home) = dirs::home_dir()
        && let Ok(stripped) = path.strip_prefix(&home)
    {
        if stripped.as_os_str().is_empty() {
            return "~".to_string();
        }

        let mut display_path = PathBuf::from("~");
        display_path.push(stripped);
        return display_path.display().to_string();
    }

    path.display().to_string()
}

/// Expand a leading `~` (alone or followed by a separator) to the home directory.
///
/// Config files written by hand commonly say `log_dir = "~/streamtap-logs"`;
/// anything else, including `~user`, is returned as-is.
pub fn expand_home(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&raw).into_owned())
}
