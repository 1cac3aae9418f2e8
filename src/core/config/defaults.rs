use std::time::Duration;

use crate::core::config::data::Config;
use crate::mcp::client::{ClientOptions, DEFAULT_CONNECT_TIMEOUT};
use crate::mcp::endpoints::DEFAULT_PROBE_TIMEOUT;
use crate::mcp::transport::reconnect::{
    Backoff, DEFAULT_ATTEMPT_TIMEOUT, DEFAULT_INITIAL_DELAY, DEFAULT_MAX_DELAY,
};

pub const DEFAULT_MAX_RECENT_SERVERS: usize = 10;
pub const DEFAULT_MAX_EXECUTIONS: usize = 50;
pub const DEFAULT_DIRECTORY_URL: &str =
    "https://raw.githubusercontent.com/punkpeye/awesome-mcp-servers/main/servers.json";
pub const DEFAULT_DIRECTORY_CACHE_HOURS: u64 = 24;

impl Config {
    pub fn use_keyring(&self) -> bool {
        self.use_keyring.unwrap_or(true)
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout_secs
            .map_or(DEFAULT_CONNECT_TIMEOUT, Duration::from_secs)
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout_secs
            .map_or(DEFAULT_ATTEMPT_TIMEOUT, Duration::from_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout_secs
            .map_or(DEFAULT_PROBE_TIMEOUT, Duration::from_secs)
    }

    /// Retry delays. A maximum below the initial delay is raised to it.
    pub fn backoff(&self) -> Backoff {
        let initial = self
            .retry_initial_delay_ms
            .map_or(DEFAULT_INITIAL_DELAY, Duration::from_millis);
        let max = self
            .retry_max_delay_ms
            .map_or(DEFAULT_MAX_DELAY, Duration::from_millis);
        Backoff::new(initial, max.max(initial))
    }

    pub fn max_recent_servers(&self) -> usize {
        self.max_recent_servers.unwrap_or(DEFAULT_MAX_RECENT_SERVERS)
    }

    pub fn max_executions(&self) -> usize {
        self.max_executions.unwrap_or(DEFAULT_MAX_EXECUTIONS)
    }

    pub fn directory_url(&self) -> &str {
        self.directory_url.as_deref().unwrap_or(DEFAULT_DIRECTORY_URL)
    }

    pub fn directory_cache_max_age(&self) -> Duration {
        let hours = self
            .directory_cache_hours
            .unwrap_or(DEFAULT_DIRECTORY_CACHE_HOURS);
        Duration::from_secs(hours.saturating_mul(60 * 60))
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            connect_timeout: self.connect_timeout(),
            attempt_timeout: self.attempt_timeout(),
            probe_timeout: self.probe_timeout(),
            backoff: self.backoff(),
        }
    }

    pub fn set_default_server(&mut self, url: String) {
        self.default_server = Some(crate::utils::url::normalize_base_url(url.trim()));
    }

    pub fn unset_default_server(&mut self) {
        self.default_server = None;
    }
}
