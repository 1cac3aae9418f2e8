use std::error::Error;
use std::fs;
use std::path::PathBuf;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cli::Session;
use crate::mcp::client::{ResponseStage, ToolResponse};
use crate::mcp::execution::{create_execution, record_run, ExecutionStatus};
use crate::mcp::inputs::{default_inputs, merge_inputs, validate_inputs};

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub input: Option<String>,
    pub input_file: Option<PathBuf>,
    pub validate: bool,
    pub json: bool,
}

pub async fn run_tool(
    session: &Session,
    url: &str,
    slug: &str,
    options: &RunOptions,
) -> Result<(), Box<dyn Error>> {
    let client = session.client_for(url)?;
    let manifest = client.fetch_manifest().await?;
    let tool = manifest
        .tool(slug)
        .ok_or_else(|| format!("Tool '{slug}' not found on {}", client.base_url()))?;

    let inputs = merge_inputs(default_inputs(&tool.input_schema), read_inputs(options)?);
    if options.validate {
        validate_inputs(&tool.input_schema, &inputs)?;
    }

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Interrupted");
            interrupt.cancel();
        }
    });

    let record = create_execution(&tool.slug, &tool.name, client.base_url(), inputs.clone());
    let run = client.execute_tool(&tool.slug, inputs, cancel.clone());
    let mut failure: Option<String> = None;
    let record = record_run(record, run, |_, response| {
        if let Some(error) = &response.error {
            failure = Some(error.clone());
        }
        print_response(response, options.json);
    })
    .await;

    if let Err(err) = session.history.save_execution(record.clone()) {
        warn!(error = %err, "Failed to record execution in history");
    }

    match record.status {
        ExecutionStatus::Completed => Ok(()),
        _ if cancel.is_cancelled() => Err("Execution cancelled".into()),
        _ => Err(failure
            .unwrap_or_else(|| "Execution failed".to_string())
            .into()),
    }
}

/// User inputs from `--input` or `--input-file`; an empty object otherwise.
pub fn read_inputs(options: &RunOptions) -> Result<Value, Box<dyn Error>> {
    let (source, text) = match (&options.input, &options.input_file) {
        (Some(text), _) => ("--input".to_string(), text.clone()),
        (None, Some(path)) => (path.display().to_string(), fs::read_to_string(path)?),
        (None, None) => return Ok(json!({})),
    };

    serde_json::from_str(&text)
        .map_err(|err| format!("Invalid JSON in {source}: {err}").into())
}

fn print_response(response: &ToolResponse, as_json: bool) {
    if as_json {
        match serde_json::to_string(response) {
            Ok(line) => println!("{line}"),
            Err(err) => warn!(error = %err, "Failed to serialize response"),
        }
        return;
    }

    match response.stage {
        ResponseStage::Log => {
            if let Some(line) = response.logs.last() {
                eprintln!("· {line}");
            }
        }
        ResponseStage::Partial => {
            if let Some(result) = &response.result {
                println!("… {result}");
            }
        }
        ResponseStage::Final => {
            if let Some(result) = &response.result {
                let rendered = serde_json::to_string_pretty(result)
                    .unwrap_or_else(|_| result.to_string());
                println!("{rendered}");
            }
        }
        ResponseStage::Failed => {}
    }
}
