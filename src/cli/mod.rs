//! CLI command definitions for kanban-tracker
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

pub mod commands;

use clap::{Args, Parser, Subcommand};

use crate::config::StorageBackend;
use crate::format::OutputFormat;

/// Kanban project tracker: REST API server and board tools
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// API port (overrides config)
    #[arg(short, long, global = true)]
    pub port: Option<u16>,

    /// Storage backend: sqlite or memory (overrides config)
    #[arg(long, global = true, value_parser = parse_backend)]
    pub storage: Option<StorageBackend>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

fn parse_backend(s: &str) -> Result<StorageBackend, String> {
    s.parse().map_err(|e: anyhow::Error| e.to_string())
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the REST API server (default if no subcommand given)
    Serve,

    /// Create an admin user and a sample project in the database
    Seed(SeedArgs),

    /// Print a project board
    Board(BoardArgs),

    /// Move a task to a column and index, as a drag and drop would
    Move(MoveArgs),

    /// List projects
    Projects(ProjectsArgs),
}

/// Connection to a running tracker instead of the local store.
#[derive(Args, Debug, Clone, Default)]
pub struct RemoteArgs {
    /// Base URL of a running tracker, e.g. http://127.0.0.1:3000
    #[arg(long)]
    pub remote: Option<String>,

    /// Bearer token for the remote tracker
    #[arg(long, requires = "remote")]
    pub token: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct SeedArgs {
    #[arg(long, default_value = "admin@example.com")]
    pub email: String,

    #[arg(long, default_value = "Admin")]
    pub name: String,

    #[arg(long)]
    pub password: String,
}

#[derive(Args, Debug, Clone)]
pub struct BoardArgs {
    pub project_id: String,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Markdown)]
    pub format: OutputFormat,

    #[command(flatten)]
    pub remote: RemoteArgs,
}

#[derive(Args, Debug, Clone)]
pub struct MoveArgs {
    pub task_id: String,

    /// Destination column id
    #[arg(long)]
    pub column: String,

    /// Zero-based index in the destination column
    #[arg(long)]
    pub index: usize,

    #[command(flatten)]
    pub remote: RemoteArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ProjectsArgs {
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Markdown)]
    pub format: OutputFormat,

    #[command(flatten)]
    pub remote: RemoteArgs,
}
