//! Authentication headers for manifest and tool requests
//!
//! Headers are derived from the manifest's declared auth scheme and a
//! caller-supplied credential. Nothing here enforces `required`: when a
//! credential is missing the request goes out without one and the server's
//! response status is the authority.

use crate::mcp::manifest::{AuthDescriptor, AuthType};
use std::fmt;

pub const AUTHORIZATION_HEADER: &str = "Authorization";
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";
pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const DEFAULT_API_KEY_HEADER: &str = "X-API-Key";

/// An opaque token. The scheme it satisfies is the one the current manifest
/// declares, so it is applied per request by [`build_auth_headers`].
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
}

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn is_empty(&self) -> bool {
        self.token.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Build the auth headers for a request.
///
/// | auth            | credential | header                                   |
/// |-----------------|------------|------------------------------------------|
/// | absent          | yes        | `Authorization: Bearer <credential>`     |
/// | bearer / pkce   | yes        | `Authorization: Bearer <credential>`     |
/// | api_key         | yes        | `<name or header or X-API-Key>: <cred>`  |
/// | anything else   | any        | none                                     |
pub fn build_auth_headers(
    auth: Option<&AuthDescriptor>,
    credential: Option<&Credential>,
) -> Vec<(String, String)> {
    let Some(credential) = credential.filter(|credential| !credential.is_empty()) else {
        return Vec::new();
    };

    let Some(auth) = auth else {
        return vec![bearer(credential)];
    };

    match auth.kind {
        AuthType::Bearer | AuthType::OauthPkce => vec![bearer(credential)],
        AuthType::ApiKey => {
            let name = non_blank(auth.name.as_deref())
                .or_else(|| non_blank(auth.header.as_deref()))
                .unwrap_or(DEFAULT_API_KEY_HEADER);
            vec![(name.to_string(), credential.token().to_string())]
        }
        AuthType::None | AuthType::Unknown(_) => Vec::new(),
    }
}

/// Auth headers plus a JSON content type when the request carries a body.
pub fn request_headers(
    auth: Option<&AuthDescriptor>,
    credential: Option<&Credential>,
    has_body: bool,
) -> Vec<(String, String)> {
    let mut headers = Vec::new();
    if has_body {
        headers.push((CONTENT_TYPE_HEADER.to_string(), JSON_CONTENT_TYPE.to_string()));
    }
    headers.extend(build_auth_headers(auth, credential));
    headers
}

fn non_blank(name: Option<&str>) -> Option<&str> {
    name.filter(|name| !name.trim().is_empty())
}

fn bearer(credential: &Credential) -> (String, String) {
    (
        AUTHORIZATION_HEADER.to_string(),
        format!("Bearer {}", credential.token()),
    )
}
