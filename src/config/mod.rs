//! Unified configuration system.
//!
//! Consolidates configuration from tiers with field-by-field YAML merging:
//! 1. **Defaults** - Embedded in the binary
//! 2. **Project** - `$CWD/kanban/config.yaml`
//! 3. **User** - `~/.kanban-tracker/config.yaml`
//! 4. **Environment** - individual overrides
//!
//! CLI flags are applied on top by the binary.
//!
//! ## Environment Variables
//! - `KANBAN_CONFIG_PATH` - Explicit config file (replaces the file tiers)
//! - `KANBAN_DB_PATH` - Database path
//! - `KANBAN_UPLOADS_DIR` - Attachment directory
//! - `KANBAN_PORT` - API port
//! - `KANBAN_STORAGE` - `sqlite` or `memory`
//! - `KANBAN_USER_DIR` - User config dir (default: `~/.kanban-tracker`)
//! - `KANBAN_PROJECT_DIR` - Project config dir (default: `./kanban`)

mod loader;
mod merge;
mod types;

pub use loader::{ConfigLoader, ConfigPaths, ConfigTier};
pub use merge::{deep_merge, deep_merge_all};
pub use types::*;
