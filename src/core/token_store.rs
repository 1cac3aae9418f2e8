//! Saved server tokens, kept in the system keyring and keyed by server URL.

use crate::core::keyring::TokenStoreError;
use crate::utils::url::normalize_base_url;
use keyring::Entry;
use std::fmt;
use tracing::{debug, warn};

const KEYRING_SERVICE: &str = "mcp-browser";
pub const TOKEN_ENV_VAR: &str = "MCP_BROWSER_TOKEN";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Flag,
    Keyring,
    Environment,
}

impl fmt::Display for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TokenSource::Flag => "--token",
            TokenSource::Keyring => "keyring",
            TokenSource::Environment => TOKEN_ENV_VAR,
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TokenStore {
    use_keyring: bool,
}

impl TokenStore {
    pub fn new_with_keyring(use_keyring: bool) -> Self {
        Self { use_keyring }
    }

    pub fn get_token(&self, server_url: &str) -> Result<Option<String>, Box<dyn std::error::Error>> {
        if !self.use_keyring {
            return Ok(None);
        }

        let entry = Entry::new(KEYRING_SERVICE, &account(server_url))?;
        match entry.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(Box::new(TokenStoreError::from(err))),
        }
    }

    pub fn set_token(
        &self,
        server_url: &str,
        token: &str,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if !self.use_keyring {
            return Err("the keyring is disabled (use_keyring = off)".into());
        }

        let entry = Entry::new(KEYRING_SERVICE, &account(server_url))?;
        entry
            .set_password(token)
            .map_err(|err| Box::new(TokenStoreError::from(err)) as Box<dyn std::error::Error>)
    }

    pub fn remove_token(&self, server_url: &str) -> Result<bool, Box<dyn std::error::Error>> {
        if !self.use_keyring {
            return Ok(false);
        }

        let entry = Entry::new(KEYRING_SERVICE, &account(server_url))?;
        match entry.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(err) => Err(Box::new(TokenStoreError::from(err))),
        }
    }
}

fn account(server_url: &str) -> String {
    normalize_base_url(server_url.trim())
}

/// Pick the token for `server_url`: an explicit flag first, then the saved
/// token, then the environment. Keyring failures are logged and skipped.
pub fn resolve_token(
    flag: Option<&str>,
    server_url: &str,
    store: &TokenStore,
    env_value: Option<String>,
) -> Option<(String, TokenSource)> {
    if let Some(token) = non_empty(flag.map(str::to_string)) {
        return Some((token, TokenSource::Flag));
    }

    match store.get_token(server_url) {
        Ok(saved) => {
            if let Some(token) = non_empty(saved) {
                return Some((token, TokenSource::Keyring));
            }
        }
        Err(err) => {
            let unavailable = err
                .downcast_ref::<TokenStoreError>()
                .is_some_and(TokenStoreError::is_backend_unavailable);
            if unavailable {
                debug!(server = %server_url, error = %err, "Keyring unavailable, skipping saved token");
            } else {
                warn!(server = %server_url, error = %err, "Could not read saved token");
            }
        }
    }

    non_empty(env_value).map(|token| (token, TokenSource::Environment))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|token| !token.trim().is_empty())
}
