//! Execution records: bookkeeping for one tool invocation.
//!
//! A record starts `running`, accumulates logs and the latest output while a
//! run streams, and ends in exactly one of `completed` or `error`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use crate::mcp::client::{ResponseStage, ToolResponse, ToolRun};

pub const CANCELLED_MESSAGE: &str = "execution cancelled";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Error,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ExecutionStatus::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Error => "error",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub id: String,
    pub tool_slug: String,
    pub tool_name: String,
    pub server_url: String,
    pub inputs: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Value>,
    pub status: ExecutionStatus,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Seconds between `start_time` and `end_time`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default)]
    pub logs: Vec<String>,
}

pub fn create_execution(
    tool_slug: &str,
    tool_name: &str,
    server_url: &str,
    inputs: Value,
) -> ExecutionRecord {
    ExecutionRecord {
        id: new_execution_id(),
        tool_slug: tool_slug.to_string(),
        tool_name: tool_name.to_string(),
        server_url: server_url.to_string(),
        inputs,
        outputs: None,
        status: ExecutionStatus::Running,
        start_time: Utc::now(),
        end_time: None,
        duration: None,
        logs: Vec::new(),
    }
}

/// Return a finished copy of `record`. A record that has already finished
/// is returned unchanged.
pub fn complete_execution(
    record: &ExecutionRecord,
    success: bool,
    result: Option<Value>,
    error: Option<&str>,
) -> ExecutionRecord {
    let mut finished = record.clone();
    if record.status.is_terminal() {
        return finished;
    }

    let end_time = Utc::now();
    let elapsed = end_time.signed_duration_since(record.start_time);
    finished.end_time = Some(end_time);
    finished.duration = Some((elapsed.num_milliseconds().max(0) as f64) / 1000.0);
    finished.status = if success {
        ExecutionStatus::Completed
    } else {
        ExecutionStatus::Error
    };
    finished.outputs = result;
    if let Some(message) = error {
        finished.logs.push(format!("Error: {message}"));
    }
    finished
}

/// Drive `run` to completion, folding each response into `record`.
///
/// `on_update` sees the record after every response, including the terminal
/// one. A run that stops without a terminal response was cancelled.
pub async fn record_run<F>(
    mut record: ExecutionRecord,
    mut run: ToolRun,
    mut on_update: F,
) -> ExecutionRecord
where
    F: FnMut(&ExecutionRecord, &ToolResponse),
{
    while let Some(response) = run.next_response().await {
        if response.logs.len() >= record.logs.len() {
            record.logs.clone_from(&response.logs);
        }

        match response.stage {
            ResponseStage::Log => {}
            ResponseStage::Partial => record.outputs.clone_from(&response.result),
            ResponseStage::Final => {
                record = complete_execution(&record, true, response.result.clone(), None);
            }
            ResponseStage::Failed => {
                let outputs = record.outputs.clone();
                record = complete_execution(&record, false, outputs, None);
            }
        }

        on_update(&record, &response);
        if response.is_terminal() {
            return record;
        }
    }

    let outputs = record.outputs.clone();
    complete_execution(&record, false, outputs, Some(CANCELLED_MESSAGE))
}

fn new_execution_id() -> String {
    Uuid::new_v4().to_string()
}
