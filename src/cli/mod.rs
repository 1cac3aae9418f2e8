//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod connect;
pub mod directory;
pub mod history;
pub mod run;
pub mod settings;
pub mod token;

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::debug;

use crate::cli::run::RunOptions;
use crate::cli::settings::{set_setting, unset_setting};
use crate::core::config::{path_display, Config, ConfigOrchestrator};
use crate::core::history::HistoryStore;
use crate::core::token_store::{resolve_token, TokenStore, TOKEN_ENV_VAR};
use crate::mcp::auth::Credential;
use crate::mcp::client::McpClient;
use crate::utils::logging::init_tracing;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("VERGEN_GIT_DESCRIBE"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "mcp-browser")]
#[command(version = VERSION)]
#[command(about = "Discover, inspect, and run tools on MCP servers")]
#[command(
    long_about = "mcp-browser connects to servers that publish a tool manifest, lists their tools, \
and runs them. Tool output may arrive as a single JSON reply or as a live event stream of logs, \
partial results, and a final result.\n\n\
Authentication:\n\
  Use 'mcp-browser token set <url> <token>' to keep a token in your system keyring.\n\n\
Environment Variables:\n\
  MCP_BROWSER_TOKEN   Token used when none is given with --token or saved\n\
  MCP_BROWSER_LOG     Log filter (for example 'debug' or 'mcp_browser=trace')"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Write logs to this file instead of stderr
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Log request and stream activity
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Token to send to the server (overrides saved tokens)
    #[arg(short = 't', long, global = true, value_name = "TOKEN")]
    pub token: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch a server's manifest and list its tools
    Connect {
        /// Server base URL (defaults to default-server)
        url: Option<String>,
        /// Only list tools whose name, slug, or description contain this text
        #[arg(short = 's', long)]
        search: Option<String>,
        /// Only list tools carrying this tag (repeatable)
        #[arg(long = "tag", value_name = "TAG")]
        tags: Vec<String>,
        /// Print the manifest as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run a tool and stream its output
    Run {
        /// [URL] SLUG; the URL defaults to default-server
        #[arg(required = true, num_args = 1..=2, value_names = ["URL", "SLUG"])]
        target: Vec<String>,
        /// Tool inputs as a JSON document
        #[arg(short = 'i', long, conflicts_with = "input_file")]
        input: Option<String>,
        /// Read tool inputs from a JSON file
        #[arg(short = 'f', long, value_name = "PATH")]
        input_file: Option<PathBuf>,
        /// Send inputs without checking them against the tool's schema
        #[arg(long)]
        no_validate: bool,
        /// Print every response as a JSON line
        #[arg(long)]
        json: bool,
    },
    /// Show past tool executions
    History {
        /// Number of executions to show
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,
        /// Delete all history
        #[arg(long)]
        clear: bool,
    },
    /// List recently connected servers
    Servers,
    /// Manage saved server tokens
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },
    /// Browse the public server directory
    Directory {
        /// Ignore the cached copy
        #[arg(long)]
        refresh: bool,
        /// Check which servers answer
        #[arg(long)]
        ping: bool,
    },
    /// Set configuration values
    Set {
        /// Configuration key to set
        key: String,
        /// Value to set for the key
        value: Option<String>,
    },
    /// Unset configuration values
    Unset {
        /// Configuration key to unset
        key: String,
    },
    /// Show the current configuration
    Config,
}

#[derive(Subcommand, Debug)]
pub enum TokenCommands {
    /// Save a token for a server
    Set { url: String, token: String },
    /// Forget the saved token for a server
    Remove { url: String },
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(args.log.as_deref(), args.verbose)?;

    tokio::runtime::Runtime::new()?.block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<(), Box<dyn Error>> {
    let orchestrator = ConfigOrchestrator::new(Config::get_config_path());
    let config = orchestrator.load_with_cache()?;
    debug!(path = %path_display(orchestrator.path()), "Loaded configuration");
    let session = Session::new(config, args.token);

    match args.command {
        Commands::Connect {
            url,
            search,
            tags,
            json,
        } => {
            let url = session.server_url(url)?;
            connect::connect(&session, &url, search.as_deref(), &tags, json).await
        }
        Commands::Run {
            target,
            input,
            input_file,
            no_validate,
            json,
        } => {
            let (url, slug) = split_run_target(target)?;
            let url = session.server_url(url)?;
            let options = RunOptions {
                input,
                input_file,
                validate: !no_validate,
                json,
            };
            run::run_tool(&session, &url, &slug, &options).await
        }
        Commands::History { limit, clear } => history::show_history(&session, limit, clear),
        Commands::Servers => history::show_servers(&session),
        Commands::Token { command } => token::handle(&session, command),
        Commands::Directory { refresh, ping } => {
            directory::show_directory(&session.config, refresh, ping).await
        }
        Commands::Set { key, value } => match set_setting(&orchestrator, &key, value.as_deref()) {
            Ok(message) => {
                println!("{message}");
                Ok(())
            }
            Err(err) => {
                err.print();
                std::process::exit(err.exit_code());
            }
        },
        Commands::Unset { key } => match unset_setting(&orchestrator, &key) {
            Ok(message) => {
                println!("{message}");
                Ok(())
            }
            Err(err) => {
                err.print();
                std::process::exit(err.exit_code());
            }
        },
        Commands::Config => {
            session.config.print_all();
            println!();
            println!("  config file: {}", path_display(orchestrator.path()));
            println!("  history file: {}", path_display(session.history.path()));
            Ok(())
        }
    }
}

/// `[URL] SLUG` from the positional arguments of `run`.
fn split_run_target(mut target: Vec<String>) -> Result<(Option<String>, String), Box<dyn Error>> {
    let slug = target.pop().ok_or("A tool slug is required")?;
    Ok((target.pop(), slug))
}

/// Everything a command needs besides its own arguments.
pub struct Session {
    pub config: Config,
    pub tokens: TokenStore,
    pub history: HistoryStore,
    token_flag: Option<String>,
}

impl Session {
    pub fn new(config: Config, token_flag: Option<String>) -> Self {
        let tokens = TokenStore::new_with_keyring(config.use_keyring());
        let history = HistoryStore::from_config(&config);
        Self {
            config,
            tokens,
            history,
            token_flag,
        }
    }

    /// The explicit URL, or the configured default server.
    pub fn server_url(&self, explicit: Option<String>) -> Result<String, Box<dyn Error>> {
        explicit
            .or_else(|| self.config.default_server.clone())
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                "No server URL given. Pass one or run 'mcp-browser set default-server <url>'."
                    .into()
            })
    }

    pub fn credential_for(&self, url: &str) -> Option<Credential> {
        let env_value = std::env::var(TOKEN_ENV_VAR).ok();
        resolve_token(self.token_flag.as_deref(), url, &self.tokens, env_value).map(
            |(token, source)| {
                debug!(server = %url, source = %source, "Using token");
                Credential::new(token)
            },
        )
    }

    pub fn client_for(&self, url: &str) -> Result<McpClient, Box<dyn Error>> {
        let credential = self.credential_for(url);
        Ok(McpClient::new(url, credential, self.config.client_options())?)
    }
}
