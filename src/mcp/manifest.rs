//! Manifest and tool descriptors published by a server.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

/// Authentication scheme declared by a manifest.
///
/// Unrecognized scheme names are kept verbatim so they round-trip, but they
/// never produce request headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthType {
    None,
    Bearer,
    ApiKey,
    OauthPkce,
    Unknown(String),
}

impl AuthType {
    pub fn as_str(&self) -> &str {
        match self {
            AuthType::None => "none",
            AuthType::Bearer => "bearer",
            AuthType::ApiKey => "api_key",
            AuthType::OauthPkce => "oauth_pkce",
            AuthType::Unknown(other) => other,
        }
    }
}

impl From<String> for AuthType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "none" => AuthType::None,
            "bearer" => AuthType::Bearer,
            "api_key" => AuthType::ApiKey,
            "oauth_pkce" => AuthType::OauthPkce,
            _ => AuthType::Unknown(value),
        }
    }
}

impl Serialize for AuthType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AuthType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(AuthType::from)
    }
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthDescriptor {
    #[serde(rename = "type")]
    pub kind: AuthType,
    #[serde(default)]
    pub required: bool,
    /// Header name for `api_key` auth. Takes precedence over `header`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// JSON schema describing accepted inputs.
    #[serde(rename = "inputs", alias = "inputSchema", default)]
    pub input_schema: Value,
    #[serde(
        rename = "outputs",
        alias = "outputSchema",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub output_schema: Option<Value>,
}

impl Tool {
    fn matches_query(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle)
            || self.slug.to_lowercase().contains(needle)
            || self
                .description
                .as_deref()
                .is_some_and(|description| description.to_lowercase().contains(needle))
    }

    fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|own| own.eq_ignore_ascii_case(tag))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthDescriptor>,
    #[serde(default)]
    pub tools: Vec<Tool>,
}

impl Manifest {
    pub fn tool(&self, slug: &str) -> Option<&Tool> {
        self.tools.iter().find(|tool| tool.slug == slug)
    }

    /// True when the server declares that a credential is mandatory.
    pub fn requires_auth(&self) -> bool {
        self.auth.as_ref().is_some_and(|auth| auth.required)
    }

    /// Sorted, de-duplicated tag names across every tool.
    pub fn all_tags(&self) -> Vec<String> {
        self.tools
            .iter()
            .flat_map(|tool| tool.tags.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Tools whose name, slug, or description contain `query`
    /// (case-insensitive) and that carry every tag in `tags`.
    pub fn filter_tools(&self, query: &str, tags: &[String]) -> Vec<&Tool> {
        let needle = query.trim().to_lowercase();
        self.tools
            .iter()
            .filter(|tool| needle.is_empty() || tool.matches_query(&needle))
            .filter(|tool| tags.iter().all(|tag| tool.has_tag(tag)))
            .collect()
    }
}
