pub mod config;
pub mod directory;
pub mod history;
pub mod keyring;
pub mod token_store;
