//! Public server directory, downloaded as JSON and cached on disk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::config::io::write_atomically;
use crate::mcp::endpoints::LEGACY_MANIFEST_PATH;
use crate::utils::url::construct_api_url;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryServer {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DirectoryCache {
    timestamp: DateTime<Utc>,
    data: Vec<DirectoryServer>,
}

pub struct ServerDirectory {
    client: reqwest::Client,
    source_url: String,
    cache_path: PathBuf,
    max_age: Duration,
}

impl ServerDirectory {
    pub fn new(
        client: reqwest::Client,
        source_url: impl Into<String>,
        cache_path: PathBuf,
        max_age: Duration,
    ) -> Self {
        Self {
            client,
            source_url: source_url.into(),
            cache_path,
            max_age,
        }
    }

    /// The directory listing. A fresh cache is used unless `force_refresh`;
    /// when the download fails the stale cache (or nothing) is returned.
    pub async fn get_servers(&self, force_refresh: bool) -> Vec<DirectoryServer> {
        let cached = self.load_cache();
        if !force_refresh {
            if let Some(cache) = cached.as_ref().filter(|cache| self.is_fresh(cache)) {
                debug!(servers = cache.data.len(), "Using cached server directory");
                return cache.data.clone();
            }
        }

        match self.fetch().await {
            Ok(servers) => {
                if !servers.is_empty() {
                    if let Err(err) = self.save_cache(&servers) {
                        warn!(error = %err, "Failed to cache server directory");
                    }
                }
                servers
            }
            Err(err) => {
                warn!(url = %self.source_url, error = %err, "Failed to fetch server directory");
                cached.map(|cache| cache.data).unwrap_or_default()
            }
        }
    }

    async fn fetch(&self) -> Result<Vec<DirectoryServer>, String> {
        let response = self
            .client
            .get(&self.source_url)
            .send()
            .await
            .map_err(|err| err.to_string())?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("Failed to fetch directory: {}", status.as_u16()));
        }
        response
            .json::<Vec<DirectoryServer>>()
            .await
            .map_err(|err| err.to_string())
    }

    fn is_fresh(&self, cache: &DirectoryCache) -> bool {
        let age = Utc::now().signed_duration_since(cache.timestamp);
        age.to_std().map_or(true, |age| age < self.max_age)
    }

    fn load_cache(&self) -> Option<DirectoryCache> {
        let contents = fs::read_to_string(&self.cache_path).ok()?;
        serde_json::from_str(&contents)
            .map_err(|err| debug!(error = %err, "Ignoring unreadable directory cache"))
            .ok()
    }

    fn save_cache(&self, servers: &[DirectoryServer]) -> Result<(), Box<dyn std::error::Error>> {
        let cache = DirectoryCache {
            timestamp: Utc::now(),
            data: servers.to_vec(),
        };
        write_atomically(&self.cache_path, &serde_json::to_vec(&cache)?)
    }
}

/// True when `<url>/manifest` answers with a success status within `timeout`.
pub async fn ping_server(client: &reqwest::Client, url: &str, timeout: Duration) -> bool {
    let manifest_url = construct_api_url(url, LEGACY_MANIFEST_PATH);
    match tokio::time::timeout(timeout, client.get(&manifest_url).send()).await {
        Ok(Ok(response)) => response.status().is_success(),
        Ok(Err(err)) => {
            debug!(url = %manifest_url, error = %err, "Ping failed");
            false
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::{MockResponse, MockServer};
    use serde_json::json;
    use tempfile::TempDir;

    fn listing() -> serde_json::Value {
        json!([
            { "name": "Weather", "url": "https://weather.example", "tags": ["forecast"] },
            { "name": "Echo", "url": "https://echo.example", "description": "Echoes input" }
        ])
    }

    fn directory(server: &MockServer, dir: &TempDir, max_age: Duration) -> ServerDirectory {
        ServerDirectory::new(
            server.http_client(),
            format!("{}/servers.json", server.url()),
            dir.path().join("directory-cache.json"),
            max_age,
        )
    }

    #[tokio::test]
    async fn fetches_then_serves_from_cache() {
        let server =
            MockServer::start(vec![("GET", "/servers.json", MockResponse::json(200, listing()))])
                .await;
        let dir = TempDir::new().expect("temp dir");
        let directory = directory(&server, &dir, Duration::from_secs(3600));

        let first = directory.get_servers(false).await;
        assert_eq!(first.len(), 2);
        assert_eq!(first[1].description.as_deref(), Some("Echoes input"));

        let second = directory.get_servers(false).await;
        assert_eq!(second, first);
        assert_eq!(server.requests_to("GET", "/servers.json").len(), 1);

        directory.get_servers(true).await;
        assert_eq!(server.requests_to("GET", "/servers.json").len(), 2);
    }

    #[tokio::test]
    async fn expired_cache_is_refetched() {
        let server =
            MockServer::start(vec![("GET", "/servers.json", MockResponse::json(200, listing()))])
                .await;
        let dir = TempDir::new().expect("temp dir");
        let directory = directory(&server, &dir, Duration::ZERO);

        directory.get_servers(false).await;
        directory.get_servers(false).await;
        assert_eq!(server.requests_to("GET", "/servers.json").len(), 2);
    }

    #[tokio::test]
    async fn failed_fetch_without_cache_is_empty() {
        let server =
            MockServer::start(vec![("GET", "/servers.json", MockResponse::status(500))]).await;
        let dir = TempDir::new().expect("temp dir");
        let directory = directory(&server, &dir, Duration::from_secs(3600));

        assert!(directory.get_servers(false).await.is_empty());
        assert!(!dir.path().join("directory-cache.json").exists());
    }

    #[tokio::test]
    async fn failed_refresh_falls_back_to_stale_cache() {
        let dir = TempDir::new().expect("temp dir");
        let good =
            MockServer::start(vec![("GET", "/servers.json", MockResponse::json(200, listing()))])
                .await;
        directory(&good, &dir, Duration::ZERO).get_servers(false).await;

        let broken =
            MockServer::start(vec![("GET", "/servers.json", MockResponse::text(200, "<html>"))])
                .await;
        let servers = directory(&broken, &dir, Duration::ZERO).get_servers(true).await;
        assert_eq!(servers.len(), 2);
    }

    #[tokio::test]
    async fn ping_checks_manifest_route() {
        let server = MockServer::start(vec![(
            "GET",
            "/manifest",
            MockResponse::json(200, json!({ "name": "x" })),
        )])
        .await;
        let client = server.http_client();
        assert!(ping_server(&client, &format!("{}/", server.url()), Duration::from_secs(5)).await);

        let missing = MockServer::start(Vec::new()).await;
        assert!(!ping_server(&client, missing.url(), Duration::from_secs(5)).await);
    }
}
