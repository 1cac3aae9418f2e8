use crate::core::config::data::Config;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

#[derive(Default)]
struct ConfigCacheState {
    config: Option<Config>,
    modified: Option<SystemTime>,
}

/// Owns one config file: caches the parsed value until the file changes on
/// disk and applies edits as load, mutate, save.
pub struct ConfigOrchestrator {
    path: PathBuf,
    state: Mutex<ConfigCacheState>,
}

impl ConfigOrchestrator {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            state: Mutex::new(ConfigCacheState::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load_with_cache(&self) -> Result<Config, Box<dyn std::error::Error>> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.refresh(&mut state)?;
        Ok(state.config.clone().unwrap_or_default())
    }

    pub fn mutate<F, T>(&self, mutator: F) -> Result<T, Box<dyn std::error::Error>>
    where
        F: FnOnce(&mut Config) -> Result<T, Box<dyn std::error::Error>>,
    {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.refresh(&mut state)?;

        let mut working = state.config.clone().unwrap_or_default();
        let result = mutator(&mut working)?;
        working.save_to_path(&self.path)?;

        state.modified = modified_time(&self.path);
        state.config = Some(working);
        Ok(result)
    }

    fn refresh(&self, state: &mut ConfigCacheState) -> Result<(), Box<dyn std::error::Error>> {
        let disk_modified = modified_time(&self.path);
        if state.config.is_none() || state.modified != disk_modified {
            state.config = Some(Config::load_from_path(&self.path)?);
            state.modified = disk_modified;
        }
        Ok(())
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).ok()?.modified().ok()
}
