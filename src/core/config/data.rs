use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// User configuration. Every key is optional; accessors in `defaults`
/// resolve missing values.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    /// Server used when a command is given no URL.
    pub default_server: Option<String>,
    /// Store and look up tokens in the system keyring.
    pub use_keyring: Option<bool>,
    pub connect_timeout_secs: Option<u64>,
    /// Bound on each attempt to get response headers from a tool call.
    pub attempt_timeout_secs: Option<u64>,
    /// Bound on each endpoint probe.
    pub probe_timeout_secs: Option<u64>,
    pub retry_initial_delay_ms: Option<u64>,
    pub retry_max_delay_ms: Option<u64>,
    pub max_recent_servers: Option<usize>,
    pub max_executions: Option<usize>,
    /// Where the public server directory is downloaded from.
    pub directory_url: Option<String>,
    pub directory_cache_hours: Option<u64>,
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
///
/// # Examples
/// - Unix: `/home/user/.config/mcp-browser` → `~/.config/mcp-browser`
/// - macOS: `/Users/user/Library/Application Support/...` → `~/Library/Application Support/...`
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
