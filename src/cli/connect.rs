use std::error::Error;

use tracing::warn;

use crate::cli::Session;
use crate::core::history::RecentServer;
use crate::mcp::manifest::{Manifest, Tool};

pub async fn connect(
    session: &Session,
    url: &str,
    search: Option<&str>,
    tags: &[String],
    json: bool,
) -> Result<(), Box<dyn Error>> {
    let client = session.client_for(url)?;
    let manifest = client.fetch_manifest().await?;

    if let Err(err) = session
        .history
        .save_server(RecentServer::from_manifest(client.base_url(), &manifest))
    {
        warn!(error = %err, "Failed to record server in history");
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&*manifest)?);
        return Ok(());
    }

    print_manifest_header(&manifest, client.base_url());
    if manifest.requires_auth() && !client.has_credential() {
        eprintln!("⚠️  This server requires authentication.");
        eprintln!(
            "   Pass --token or run 'mcp-browser token set {} <token>'.",
            client.base_url()
        );
    }

    let tools = manifest.filter_tools(search.unwrap_or_default(), tags);
    if tools.is_empty() {
        println!("No matching tools.");
        return Ok(());
    }

    println!("Tools:");
    for tool in tools {
        print_tool(tool);
    }

    let all_tags = manifest.all_tags();
    if !all_tags.is_empty() {
        println!();
        println!("Tags: {}", all_tags.join(", "));
    }
    Ok(())
}

fn print_manifest_header(manifest: &Manifest, url: &str) {
    match &manifest.version {
        Some(version) => println!("{} v{version} ({url})", manifest.name),
        None => println!("{} ({url})", manifest.name),
    }
    if let Some(description) = &manifest.description {
        println!("{description}");
    }
    if let Some(auth) = &manifest.auth {
        let required = if auth.required { "required" } else { "optional" };
        println!("Auth: {} ({required})", auth.kind);
    }
    println!();
}

fn print_tool(tool: &Tool) {
    match &tool.description {
        Some(description) => println!("  {:<24} {}: {description}", tool.slug, tool.name),
        None => println!("  {:<24} {}", tool.slug, tool.name),
    }
    if !tool.tags.is_empty() {
        println!("  {:<24} [{}]", "", tool.tags.join(", "));
    }
}
