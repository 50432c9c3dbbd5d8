use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::path::expand_home;

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV_VAR: &str = "STREAMTAP_CONFIG";

/// Supervisor configuration.
///
/// # Examples
///
/// ```toml
/// # Target program; bare names are looked up on PATH
/// binary = "/opt/claude/bin/claude"
///
/// # Where run logs are written (one file per run)
/// log_dir = "~/streamtap-logs"
///
/// # How long relays may keep draining after the child exits
/// grace_period_ms = 500
///
/// # Value injected for --output-format / --input-format
/// stream_format = "stream-json"
/// ```
///
/// Config file location (unless `STREAMTAP_CONFIG` names one):
/// - Linux: `~/.config/streamtap/config.toml`
/// - macOS: `~/Library/Application Support/streamtap/config.toml`
/// - Windows: `%APPDATA%\streamtap\config.toml`
///
/// Environment variables: `STREAMTAP_BINARY`, `STREAMTAP_LOG_DIR`,
/// `STREAMTAP_GRACE_PERIOD_MS`, `STREAMTAP_STREAM_FORMAT`, `STREAMTAP_FSYNC`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamtapConfig {
    pub binary: String,

    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    pub grace_period_ms: u64,

    pub stream_format: String,

    /// `sync_data` after every record instead of only flushing.
    #[serde(default)]
    pub fsync: bool,
}

impl Default for StreamtapConfig {
    fn default() -> Self {
        Self {
            binary: "claude".to_string(),
            log_dir: None,
            grace_period_ms: 500,
            stream_format: "stream-json".to_string(),
            fsync: false,
        }
    }
}

impl StreamtapConfig {
    /// Load configuration from config file and environment variables.
    ///
    /// Configuration is loaded in the following order (later sources override earlier ones):
    /// 1. Default values
    /// 2. Config file (`$STREAMTAP_CONFIG`, else the platform config dir)
    /// 3. Environment variables (STREAMTAP_*)
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let mut builder = Config::builder()
            .set_default("binary", defaults.binary)?
            .set_default("grace_period_ms", defaults.grace_period_ms)?
            .set_default("stream_format", defaults.stream_format)?
            .set_default("fsync", defaults.fsync)?;

        if let Some(config_path) = get_config_path()
            && config_path.exists()
        {
            builder = builder.add_source(File::from(config_path));
        }

        // `__` nests, so STREAMTAP_LOG_DIR maps to the flat `log_dir` key
        builder = builder.add_source(
            Environment::with_prefix("STREAMTAP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Directory receiving run logs, with `~` expanded.
    pub fn log_dir(&self) -> PathBuf {
        match &self.log_dir {
            Some(dir) => expand_home(dir),
            None => dirs::home_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("streamtap-logs"),
        }
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.binary.trim().is_empty() {
            return Err(ConfigError::Message("binary cannot be empty".to_string()));
        }
        if self.stream_format.trim().is_empty() {
            return Err(ConfigError::Message(
                "stream_format cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn get_config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV_VAR) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join("streamtap").join("config.toml"))
}
