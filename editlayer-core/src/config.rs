use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Per-root settings, read from `.editlayer/config.toml` when present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ignore_patterns: Vec<String>,
    pub rename_retention_secs: u64,
    pub rename_capacity: usize,
    pub debounce_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ignore_patterns: vec![
                ".git".to_string(),
                "target".to_string(),
                "node_modules".to_string(),
                ".editlayer".to_string(),
            ],
            rename_retention_secs: 24 * 60 * 60,
            rename_capacity: 200,
            debounce_ms: 500,
        }
    }
}

impl Config {
    pub const DIR: &'static str = ".editlayer";
    pub const FILE: &'static str = "config.toml";
    pub const DB_FILE: &'static str = "editlayer.db";

    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(Self::DIR).join(Self::FILE);
        match std::fs::read_to_string(&path) {
            Ok(raw) => Self::from_toml(&raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn default_db_path(root: &Path) -> PathBuf {
        root.join(Self::DIR).join(Self::DB_FILE)
    }

    pub fn rename_retention(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.rename_retention_secs as i64)
    }

    pub fn debounce(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.debounce_ms)
    }
}
