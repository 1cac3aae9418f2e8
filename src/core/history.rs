//! Local history: recently connected servers and past tool executions.
//!
//! Stored as one JSON file. Both lists are newest first and capped; the
//! oldest entries fall off the end.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::core::config::io::write_atomically;
use crate::core::config::Config;
use crate::mcp::execution::ExecutionRecord;
use crate::mcp::manifest::{AuthType, Manifest};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentServer {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_type: Option<AuthType>,
    pub last_connected: DateTime<Utc>,
}

impl RecentServer {
    pub fn from_manifest(url: &str, manifest: &Manifest) -> Self {
        Self {
            url: url.to_string(),
            name: Some(manifest.name.clone()),
            version: manifest.version.clone(),
            auth_type: manifest.auth.as_ref().map(|auth| auth.kind.clone()),
            last_connected: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppHistory {
    #[serde(default)]
    pub recent_servers: Vec<RecentServer>,
    #[serde(default)]
    pub executions: Vec<ExecutionRecord>,
}

impl AppHistory {
    /// Put `server` at the front, replacing any entry with the same URL.
    pub fn remember_server(&mut self, server: RecentServer, cap: usize) {
        self.recent_servers.retain(|existing| existing.url != server.url);
        self.recent_servers.insert(0, server);
        self.recent_servers.truncate(cap);
    }

    pub fn remember_execution(&mut self, record: ExecutionRecord, cap: usize) {
        self.executions.insert(0, record);
        self.executions.truncate(cap);
    }
}

pub struct HistoryStore {
    path: PathBuf,
    max_recent_servers: usize,
    max_executions: usize,
}

impl HistoryStore {
    pub fn new(path: PathBuf, max_recent_servers: usize, max_executions: usize) -> Self {
        Self {
            path,
            max_recent_servers,
            max_executions,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Config::history_path(),
            config.max_recent_servers(),
            config.max_executions(),
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or unreadable history is treated as empty.
    pub fn load(&self) -> AppHistory {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return AppHistory::default(),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "Failed to read history");
                return AppHistory::default();
            }
        };

        serde_json::from_str(&contents).unwrap_or_else(|err| {
            warn!(path = %self.path.display(), error = %err, "Ignoring malformed history");
            AppHistory::default()
        })
    }

    pub fn save_server(&self, server: RecentServer) -> Result<(), Box<dyn std::error::Error>> {
        let mut history = self.load();
        history.remember_server(server, self.max_recent_servers);
        self.write(&history)
    }

    pub fn save_execution(&self, record: ExecutionRecord) -> Result<(), Box<dyn std::error::Error>> {
        let mut history = self.load();
        history.remember_execution(record, self.max_executions);
        self.write(&history)
    }

    pub fn clear(&self) -> Result<(), Box<dyn std::error::Error>> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Box::new(err)),
        }
    }

    fn write(&self, history: &AppHistory) -> Result<(), Box<dyn std::error::Error>> {
        let contents = serde_json::to_vec_pretty(history)?;
        write_atomically(&self.path, &contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::execution::{complete_execution, create_execution, ExecutionStatus};
    use serde_json::json;
    use tempfile::TempDir;

    fn server(url: &str) -> RecentServer {
        RecentServer {
            url: url.to_string(),
            name: None,
            version: None,
            auth_type: None,
            last_connected: Utc::now(),
        }
    }

    fn store(dir: &TempDir, servers: usize, executions: usize) -> HistoryStore {
        HistoryStore::new(dir.path().join("history.json"), servers, executions)
    }

    #[test]
    fn reconnecting_moves_server_to_front_without_duplicates() {
        let mut history = AppHistory::default();
        history.remember_server(server("http://a"), 10);
        history.remember_server(server("http://b"), 10);
        history.remember_server(server("http://a"), 10);

        let urls: Vec<&str> = history
            .recent_servers
            .iter()
            .map(|server| server.url.as_str())
            .collect();
        assert_eq!(urls, vec!["http://a", "http://b"]);
    }

    #[test]
    fn lists_are_capped_and_oldest_evicted() {
        let mut history = AppHistory::default();
        for index in 0..12 {
            history.remember_server(server(&format!("http://s{index}")), 10);
        }
        assert_eq!(history.recent_servers.len(), 10);
        assert_eq!(history.recent_servers[0].url, "http://s11");
        assert_eq!(history.recent_servers[9].url, "http://s2");

        for index in 0..3 {
            let record = create_execution(&format!("t{index}"), "T", "http://a", json!({}));
            history.remember_execution(record, 2);
        }
        let slugs: Vec<&str> = history
            .executions
            .iter()
            .map(|record| record.tool_slug.as_str())
            .collect();
        assert_eq!(slugs, vec!["t2", "t1"]);
    }

    #[test]
    fn store_round_trips_through_disk() {
        let dir = TempDir::new().expect("temp dir");
        let store = store(&dir, 10, 50);
        assert_eq!(store.load(), AppHistory::default());

        store.save_server(server("http://a")).expect("save server");
        let record = create_execution("echo", "Echo", "http://a", json!({ "x": 1 }));
        let record = complete_execution(&record, true, Some(json!("ok")), None);
        store.save_execution(record.clone()).expect("save execution");

        let loaded = store.load();
        assert_eq!(loaded.recent_servers.len(), 1);
        assert_eq!(loaded.executions.len(), 1);
        let saved = &loaded.executions[0];
        assert_eq!(saved.id, record.id);
        assert_eq!(saved.status, ExecutionStatus::Completed);
        assert_eq!(saved.outputs, Some(json!("ok")));
        assert_eq!(saved.start_time, record.start_time);

        let raw = fs::read_to_string(store.path()).expect("read");
        assert!(raw.contains("\"recentServers\""));
        assert!(raw.contains("\"lastConnected\""));
    }

    #[test]
    fn malformed_file_loads_as_empty_and_clear_removes_it() {
        let dir = TempDir::new().expect("temp dir");
        let store = store(&dir, 10, 50);
        fs::write(store.path(), "{ not json").expect("write");
        assert_eq!(store.load(), AppHistory::default());

        store.clear().expect("clear");
        assert!(!store.path().exists());
        store.clear().expect("clearing twice is fine");
    }
}
