//! Key-value persistence adapters
//!
//! The core only needs `get`/`set` of strings. `FileStore` keeps one JSON
//! file per key under the user's config directory; `MemoryStore` keeps
//! everything in process (tests, `--no-persist`).

use anyhow::Context;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::constants::config;
use crate::error::{CoreError, CoreResult};

pub trait KeyValueStore {
    fn get(&self, key: &str) -> CoreResult<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> CoreResult<()>;
}

/// One `<key>.json` file per key
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// `~/.config/ontime` (or `./ontime` when there is no config dir)
    pub fn default_dir() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(config::APP_DIR);
        path
    }

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn open_default() -> Self {
        Self::new(Self::default_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.{}", config::STORE_EXTENSION))
    }

    fn write(&self, key: &str, value: &str) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create store directory {}", self.dir.display()))?;
        let path = self.path_for(key);
        // Write then rename so a crash never leaves a half-written file
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, value).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &path).with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> CoreResult<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(contents) => {
                debug!(path = %path.display(), "Read stored value");
                Ok(Some(contents))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CoreError::Persistence(format!(
                "Failed to read {}: {e}",
                path.display()
            ))),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> CoreResult<()> {
        self.write(key, value)
            .map_err(|e| CoreError::Persistence(format!("{e:#}")))?;
        info!(key = %key, path = %self.path_for(key).display(), "Saved value");
        Ok(())
    }
}

/// In-process store; can be told to fail writes
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }

    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    pub fn raw(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> CoreResult<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> CoreResult<()> {
        if self.fail_writes {
            return Err(CoreError::Persistence(format!("write to '{key}' rejected")));
        }
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
