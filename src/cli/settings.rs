//! `set` and `unset` for the editable configuration keys.

use std::fmt;

use crate::core::config::ConfigOrchestrator;

pub const DEFAULT_SERVER_KEY: &str = "default-server";
pub const USE_KEYRING_KEY: &str = "use-keyring";

/// Errors that can occur when modifying configuration settings.
#[derive(Debug)]
pub enum SettingError {
    /// The provided setting key is not recognized.
    UnknownKey(String),
    /// The provided value could not be parsed as a boolean.
    InvalidBoolean(String),
    /// Required arguments are missing.
    MissingArgs {
        hint: &'static str,
        example: &'static str,
    },
    /// An error occurred while persisting the configuration.
    ConfigError(String),
}

impl SettingError {
    /// Print the error message to stderr with appropriate formatting.
    pub fn print(&self) {
        match self {
            SettingError::UnknownKey(key) => {
                eprintln!("❌ Unknown config key: {key}");
                eprintln!("   Known keys: {DEFAULT_SERVER_KEY}, {USE_KEYRING_KEY}");
            }
            SettingError::InvalidBoolean(input) => {
                eprintln!("❌ Invalid boolean value: {input}");
                eprintln!("   Use 'on' or 'off' (also accepts true/false, yes/no)");
            }
            SettingError::MissingArgs { hint, example } => {
                eprintln!("⚠️  {hint}");
                eprintln!("Example: {example}");
            }
            SettingError::ConfigError(msg) => {
                eprintln!("❌ Failed to save configuration: {msg}");
            }
        }
    }

    pub fn exit_code(&self) -> i32 {
        1
    }
}

impl fmt::Display for SettingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingError::UnknownKey(key) => write!(f, "Unknown config key: {key}"),
            SettingError::InvalidBoolean(input) => write!(f, "Invalid boolean value: {input}"),
            SettingError::MissingArgs { hint, .. } => write!(f, "{hint}"),
            SettingError::ConfigError(msg) => write!(f, "Config error: {msg}"),
        }
    }
}

impl std::error::Error for SettingError {}

/// Parse a boolean value from user input.
pub fn parse_bool(input: &str) -> Option<bool> {
    match input.trim().to_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Some(true),
        "off" | "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

pub fn format_bool(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

fn canonical_key(key: &str) -> String {
    key.trim().to_lowercase().replace('_', "-")
}

pub fn set_setting(
    orchestrator: &ConfigOrchestrator,
    key: &str,
    value: Option<&str>,
) -> Result<String, SettingError> {
    let value = value.map(str::trim).filter(|value| !value.is_empty());

    match canonical_key(key).as_str() {
        DEFAULT_SERVER_KEY => {
            let url = value.ok_or(SettingError::MissingArgs {
                hint: "To set a default server, give its URL:",
                example: "mcp-browser set default-server http://localhost:3000",
            })?;
            let stored = mutate(orchestrator, |config| {
                config.set_default_server(url.to_string());
                config.default_server.clone().unwrap_or_default()
            })?;
            Ok(format!("✅ Set {DEFAULT_SERVER_KEY} to: {stored}"))
        }
        USE_KEYRING_KEY => {
            let input = value.ok_or(SettingError::MissingArgs {
                hint: "To change keyring use, give on or off:",
                example: "mcp-browser set use-keyring off",
            })?;
            let enabled =
                parse_bool(input).ok_or_else(|| SettingError::InvalidBoolean(input.to_string()))?;
            mutate(orchestrator, |config| config.use_keyring = Some(enabled))?;
            Ok(format!("✅ Set {USE_KEYRING_KEY} to: {}", format_bool(enabled)))
        }
        _ => Err(SettingError::UnknownKey(key.to_string())),
    }
}

pub fn unset_setting(orchestrator: &ConfigOrchestrator, key: &str) -> Result<String, SettingError> {
    match canonical_key(key).as_str() {
        DEFAULT_SERVER_KEY => {
            mutate(orchestrator, |config| config.unset_default_server())?;
            Ok(format!("✅ Unset {DEFAULT_SERVER_KEY}"))
        }
        USE_KEYRING_KEY => {
            mutate(orchestrator, |config| config.use_keyring = None)?;
            Ok(format!("✅ Unset {USE_KEYRING_KEY} (will use default: on)"))
        }
        _ => Err(SettingError::UnknownKey(key.to_string())),
    }
}

fn mutate<T>(
    orchestrator: &ConfigOrchestrator,
    edit: impl FnOnce(&mut crate::core::config::Config) -> T,
) -> Result<T, SettingError> {
    orchestrator
        .mutate(|config| Ok(edit(config)))
        .map_err(|err| SettingError::ConfigError(err.to_string()))
}
