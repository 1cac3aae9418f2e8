use std::error::Error;

use crate::cli::{Session, TokenCommands};
use crate::utils::url::normalize_base_url;

pub fn handle(session: &Session, command: TokenCommands) -> Result<(), Box<dyn Error>> {
    match command {
        TokenCommands::Set { url, token } => {
            let url = normalize_base_url(url.trim());
            if token.trim().is_empty() {
                return Err("Token must not be empty".into());
            }
            session.tokens.set_token(&url, token.trim())?;
            println!("✅ Saved token for {url}");
        }
        TokenCommands::Remove { url } => {
            let url = normalize_base_url(url.trim());
            if session.tokens.remove_token(&url)? {
                println!("✅ Removed token for {url}");
            } else {
                println!("No saved token for {url}");
            }
        }
    }
    Ok(())
}
