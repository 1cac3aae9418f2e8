use std::error::Error;

use chrono::Local;

use crate::cli::Session;
use crate::mcp::execution::ExecutionRecord;

pub fn show_history(session: &Session, limit: usize, clear: bool) -> Result<(), Box<dyn Error>> {
    if clear {
        session.history.clear()?;
        println!("✅ Cleared history");
        return Ok(());
    }

    let history = session.history.load();
    if history.executions.is_empty() {
        println!("No executions recorded yet.");
        return Ok(());
    }

    for record in history.executions.iter().take(limit) {
        println!("{}", format_execution(record));
    }
    Ok(())
}

pub fn show_servers(session: &Session) -> Result<(), Box<dyn Error>> {
    let history = session.history.load();
    if history.recent_servers.is_empty() {
        println!("No servers connected yet.");
        return Ok(());
    }

    for server in &history.recent_servers {
        let when = server.last_connected.with_timezone(&Local);
        let name = server.name.as_deref().unwrap_or("(unnamed)");
        match &server.auth_type {
            Some(auth) => println!(
                "{}  {name} [{auth}]  {}",
                server.url,
                when.format("%Y-%m-%d %H:%M")
            ),
            None => println!("{}  {name}  {}", server.url, when.format("%Y-%m-%d %H:%M")),
        }
    }
    Ok(())
}

fn format_execution(record: &ExecutionRecord) -> String {
    let started = record.start_time.with_timezone(&Local);
    let duration = record
        .duration
        .map(|seconds| format!("{seconds:.2}s"))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{}  {:<9} {:>8}  {} on {}",
        started.format("%Y-%m-%d %H:%M:%S"),
        record.status,
        duration,
        record.tool_slug,
        record.server_url
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::execution::{complete_execution, create_execution};
    use serde_json::json;

    #[test]
    fn execution_lines_show_status_duration_and_target() {
        let record = create_execution("echo", "Echo", "http://mcp.test", json!({}));
        let line = format_execution(&record);
        assert!(line.contains("running"));
        assert!(line.contains("echo on http://mcp.test"));

        let finished = complete_execution(&record, false, None, Some("boom"));
        let line = format_execution(&finished);
        assert!(line.contains("error"));
        assert!(line.contains("s  echo on http://mcp.test"));
    }
}
