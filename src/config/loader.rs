//! Configuration loader with tier-based merging.
//!
//! Loads configuration from multiple tiers and merges them field-by-field.

use super::merge::deep_merge_all;
use super::types::{Config, StorageBackend};
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Configuration tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigTier {
    /// Embedded defaults (lowest priority)
    Defaults = 0,
    /// Project-level config ($CWD/kanban/)
    Project = 1,
    /// User-level config (~/.kanban-tracker/)
    User = 2,
    /// Environment variables (highest priority)
    Environment = 3,
}

impl std::fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTier::Defaults => write!(f, "defaults"),
            ConfigTier::Project => write!(f, "project"),
            ConfigTier::User => write!(f, "user"),
            ConfigTier::Environment => write!(f, "environment"),
        }
    }
}

/// Paths for each configuration tier.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    /// Project-level config directory
    pub project_dir: Option<PathBuf>,
    /// User-level config directory
    pub user_dir: Option<PathBuf>,
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self::discover()
    }
}

impl ConfigPaths {
    /// Discover configuration paths from environment and defaults.
    pub fn discover() -> Self {
        // User dir: KANBAN_USER_DIR or ~/.kanban-tracker
        let user_dir = std::env::var("KANBAN_USER_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(".kanban-tracker")));

        // Project dir: KANBAN_PROJECT_DIR or $CWD/kanban
        let project_dir = std::env::var("KANBAN_PROJECT_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| Some(PathBuf::from("kanban")));

        Self {
            project_dir,
            user_dir,
        }
    }

    /// Create paths with explicit directories.
    pub fn with_dirs(project_dir: Option<PathBuf>, user_dir: Option<PathBuf>) -> Self {
        Self {
            project_dir,
            user_dir,
        }
    }
}

/// Read one tier's `config.yaml`, if present. Unparseable files are skipped
/// with a warning.
fn read_tier(dir: Option<&Path>, tier: ConfigTier) -> Option<(Value, PathBuf)> {
    let config_file = dir?.join("config.yaml");
    if !config_file.exists() {
        return None;
    }
    let content = match std::fs::read_to_string(&config_file) {
        Ok(content) => content,
        Err(e) => {
            warn!(path = %config_file.display(), %tier, error = %e, "Failed to read config file");
            return None;
        }
    };
    match serde_yaml::from_str::<Value>(&content) {
        Ok(value) => {
            debug!(path = %config_file.display(), %tier, "Loaded config tier");
            Some((value, config_file))
        }
        Err(e) => {
            warn!(path = %config_file.display(), %tier, error = %e, "Ignoring invalid config file");
            None
        }
    }
}

/// Configuration loader that handles tier-based merging.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Paths for each tier
    pub paths: ConfigPaths,
    /// Loaded configuration
    config: Config,
    /// Config files that contributed, lowest tier first
    sources: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Load configuration from all tiers with proper merging.
    pub fn load() -> Result<Self> {
        Self::load_with_paths(ConfigPaths::discover())
    }

    /// Load configuration with explicit paths.
    pub fn load_with_paths(paths: ConfigPaths) -> Result<Self> {
        // An explicit config file replaces the file tiers.
        if let Ok(explicit_path) = std::env::var("KANBAN_CONFIG_PATH") {
            let path = PathBuf::from(&explicit_path);
            let mut config = Config::load(&path)
                .with_context(|| format!("Failed to load config file {}", path.display()))?;
            Self::apply_env_overrides(&mut config)?;
            return Ok(Self {
                paths,
                config,
                sources: vec![path],
            });
        }

        let mut configs: Vec<Value> = Vec::new();
        let mut sources = Vec::new();

        // Tier 1: Defaults (embedded)
        configs.push(serde_json::to_value(Config::default())?);

        // Tier 2: Project config, then Tier 3: User config
        for (dir, tier) in [
            (paths.project_dir.as_deref(), ConfigTier::Project),
            (paths.user_dir.as_deref(), ConfigTier::User),
        ] {
            if let Some((value, path)) = read_tier(dir, tier) {
                configs.push(value);
                sources.push(path);
            }
        }

        let merged = deep_merge_all(configs);
        let mut config: Config = serde_json::from_value(merged)?;

        // Tier 4: Environment variable overrides
        Self::apply_env_overrides(&mut config)?;

        Ok(Self {
            paths,
            config,
            sources,
        })
    }

    /// Apply environment variable overrides to config.
    fn apply_env_overrides(config: &mut Config) -> Result<()> {
        if let Ok(db_path) = std::env::var("KANBAN_DB_PATH") {
            config.server.db_path = PathBuf::from(db_path);
        }

        if let Ok(uploads_dir) = std::env::var("KANBAN_UPLOADS_DIR") {
            config.server.uploads_dir = PathBuf::from(uploads_dir);
        }

        if let Ok(port) = std::env::var("KANBAN_PORT") {
            config.server.port = port
                .parse()
                .with_context(|| format!("KANBAN_PORT is not a valid port: {}", port))?;
        }

        if let Ok(storage) = std::env::var("KANBAN_STORAGE") {
            config.storage.backend = storage.parse::<StorageBackend>()?;
        }

        Ok(())
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get mutable access to the configuration.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Config files that were merged, lowest tier first.
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }
}
