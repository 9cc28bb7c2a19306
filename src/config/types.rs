//! Configuration types and structures.

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::api::DEFAULT_MAX_UPLOAD_BYTES;
use crate::db::DEFAULT_SESSION_TTL_HOURS;
use crate::position::DensityPolicy;

/// Default port for the REST API.
pub const DEFAULT_PORT: u16 = 3000;

/// Which store the server runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Durable SQLite database (default).
    #[default]
    Sqlite,
    /// Demo data held in memory, optionally snapshotted to a file.
    Memory,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Sqlite => "sqlite",
            StorageBackend::Memory => "memory",
        }
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(StorageBackend::Sqlite),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(anyhow!(
                "Unknown storage backend '{}' (expected sqlite or memory)",
                other
            )),
        }
    }
}

/// HTTP server and file locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Directory attachment files are written to.
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: PathBuf,

    /// Largest accepted attachment, in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            db_path: default_db_path(),
            uploads_dir: default_uploads_dir(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_path() -> PathBuf {
    PathBuf::from("kanban/kanban.db")
}

fn default_uploads_dir() -> PathBuf {
    PathBuf::from("kanban/uploads")
}

fn default_max_upload_bytes() -> usize {
    DEFAULT_MAX_UPLOAD_BYTES
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Snapshot file for the memory backend. Without one, demo data is
    /// lost on exit.
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_hours: default_session_ttl_hours(),
        }
    }
}

fn default_session_ttl_hours() -> u64 {
    DEFAULT_SESSION_TTL_HOURS
}

/// Ordering behaviour.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PositionsConfig {
    /// Whether reorder batches must leave each touched column densely
    /// numbered.
    #[serde(default)]
    pub density: DensityPolicy,
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub positions: PositionsConfig,
}

impl Config {
    /// Load configuration from a single YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        // Empty or comment-only files parse as null.
        let config: Option<Config> = serde_yaml::from_str(&content)?;
        Ok(config.unwrap_or_default())
    }
}
