//! Diagnostic logging via `tracing`.
//!
//! Tool output goes to stdout; diagnostics go to stderr or a log file.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV_VAR: &str = "MCP_BROWSER_LOG";

fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "mcp_browser=debug,warn"
    } else {
        "warn"
    }
}

/// Filter from `MCP_BROWSER_LOG` when it parses, otherwise the default for
/// the verbosity level.
pub fn build_filter(env_value: Option<String>, verbose: bool) -> EnvFilter {
    env_value
        .filter(|value| !value.trim().is_empty())
        .and_then(|value| EnvFilter::try_new(value).ok())
        .unwrap_or_else(|| EnvFilter::new(default_directives(verbose)))
}

pub fn init_tracing(log_file: Option<&Path>, verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let filter = build_filter(std::env::var(LOG_ENV_VAR).ok(), verbose);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
                .map_err(|err| err.to_string())?;
        }
        None => {
            builder
                .with_writer(std::io::stderr)
                .try_init()
                .map_err(|err| err.to_string())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_enables_crate_debug() {
        assert!(build_filter(None, true)
            .to_string()
            .contains("mcp_browser=debug"));
        assert!(!build_filter(None, false).to_string().contains("debug"));
    }

    #[test]
    fn environment_filter_wins_when_valid() {
        let filter = build_filter(Some("mcp_browser=trace".to_string()), false);
        assert!(filter.to_string().contains("mcp_browser=trace"));
    }

    #[test]
    fn invalid_or_blank_environment_filter_is_ignored() {
        let filter = build_filter(Some("mcp_browser=loud".to_string()), false);
        assert!(!filter.to_string().contains("loud"));
        let filter = build_filter(Some("  ".to_string()), true);
        assert!(filter.to_string().contains("mcp_browser=debug"));
    }
}
