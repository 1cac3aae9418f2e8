use crate::core::config::data::{path_display, Config};
use directories::ProjectDirs;
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A config file that exists but could not be used.
#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Not valid TOML, or a key holds a value of the wrong type.
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (action, path) = match self {
            ConfigError::Read { path, .. } => ("read", path),
            ConfigError::Parse { path, .. } => ("parse", path),
        };
        write!(f, "Failed to {action} config at {}: ", path_display(path))?;
        match self {
            ConfigError::Read { source, .. } => write!(f, "{source}"),
            ConfigError::Parse { source, .. } => write!(f, "{source}"),
        }
    }
}

impl StdError for ConfigError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}

const CONFIG_FILE_NAME: &str = "config.toml";
const HISTORY_FILE_NAME: &str = "history.json";
const DIRECTORY_CACHE_FILE_NAME: &str = "directory-cache.json";

impl Config {
    pub fn load_from_path(config_path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
        if !config_path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
            path: config_path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: config_path.to_path_buf(),
            source,
        })?;
        Ok(config)
    }

    pub fn save_to_path(&self, config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)?;
        write_atomically(config_path, contents.as_bytes())
    }

    pub fn get_config_path() -> PathBuf {
        project_dirs().config_dir().join(CONFIG_FILE_NAME)
    }

    pub fn history_path() -> PathBuf {
        project_dirs().data_dir().join(HISTORY_FILE_NAME)
    }

    pub fn directory_cache_path() -> PathBuf {
        project_dirs().cache_dir().join(DIRECTORY_CACHE_FILE_NAME)
    }
}

fn project_dirs() -> ProjectDirs {
    ProjectDirs::from("org", "mcp-browser", "mcp-browser")
        .expect("Failed to determine config directory")
}

/// Write `contents` to a temp file next to `path`, then rename it into place.
pub(crate) fn write_atomically(
    path: &Path,
    contents: &[u8],
) -> Result<(), Box<dyn std::error::Error>> {
    let parent = path.parent().filter(|dir| !dir.as_os_str().is_empty());

    if let Some(dir) = parent {
        fs::create_dir_all(dir)?;
    }

    let mut temp_file = match parent {
        Some(dir) => NamedTempFile::new_in(dir)?,
        None => NamedTempFile::new()?,
    };

    temp_file.write_all(contents)?;
    temp_file.as_file_mut().sync_all()?;
    temp_file
        .persist(path)
        .map_err(|err| -> Box<dyn std::error::Error> { Box::new(err) })?;
    Ok(())
}
