use std::error::Error;

use futures_util::future::join_all;

use crate::core::config::Config;
use crate::core::directory::{ping_server, ServerDirectory};
use crate::mcp::endpoints::DEFAULT_PROBE_TIMEOUT;
use crate::mcp::transport::build_http_client;

pub async fn show_directory(config: &Config, refresh: bool, ping: bool) -> Result<(), Box<dyn Error>> {
    let client = build_http_client(config.connect_timeout())?;
    let directory = ServerDirectory::new(
        client.clone(),
        config.directory_url(),
        Config::directory_cache_path(),
        config.directory_cache_max_age(),
    );

    let servers = directory.get_servers(refresh).await;
    if servers.is_empty() {
        println!("The server directory is unavailable right now.");
        return Ok(());
    }

    let reachable: Vec<Option<bool>> = if ping {
        join_all(
            servers
                .iter()
                .map(|server| ping_server(&client, &server.url, DEFAULT_PROBE_TIMEOUT)),
        )
        .await
        .into_iter()
        .map(Some)
        .collect()
    } else {
        vec![None; servers.len()]
    };

    for (server, up) in servers.iter().zip(reachable) {
        let marker = match up {
            Some(true) => "✅ ",
            Some(false) => "❌ ",
            None => "",
        };
        println!("{marker}{}  {}", server.name, server.url);
        if let Some(description) = &server.description {
            println!("    {description}");
        }
        if !server.tags.is_empty() {
            println!("    [{}]", server.tags.join(", "));
        }
    }
    Ok(())
}
