//! Kanban Tracker
//!
//! REST API server for kanban project boards, plus CLI tools for seeding,
//! printing and moving tasks against a local store or a running server.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};

use kanban_tracker::api::{ApiServer, start_server};
use kanban_tracker::cli::commands::{move_task, seed_database};
use kanban_tracker::cli::{Cli, Command, RemoteArgs};
use kanban_tracker::config::{Config, ConfigLoader, StorageBackend};
use kanban_tracker::db::Database;
use kanban_tracker::format::{render_board, render_projects};
use kanban_tracker::logging::{self, LogTarget};
use kanban_tracker::store::demo::demo_user;
use kanban_tracker::store::{BoardStore, MemoryStore, RemoteStore};
use kanban_tracker::uploads::UploadDir;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(&LogTarget::parse(&cli.log), cli.verbose)?;

    // If explicit config path given, set it as env var for ConfigLoader to pick up
    // SAFETY: This is safe at program startup before any other threads are spawned
    if let Some(config_path) = &cli.config {
        unsafe {
            std::env::set_var("KANBAN_CONFIG_PATH", config_path);
        }
    }
    let mut loader = ConfigLoader::load()?;
    for source in loader.sources() {
        info!("Config loaded from {:?}", source);
    }

    // Override settings from CLI arguments
    let config = loader.config_mut();
    if let Some(db_path) = &cli.database {
        config.server.db_path = db_path.into();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(backend) = cli.storage {
        config.storage.backend = backend;
    }
    let config = loader.into_config();

    match cli.command {
        Some(Command::Serve) | None => run_server(config).await?,
        Some(Command::Seed(args)) => {
            let db = open_database(&config)?;
            let report = seed_database(&db, &args.email, &args.name, &args.password)?;
            if report.created_user {
                println!("Created admin {} ({})", report.user.email, report.user.id);
            } else {
                println!("Admin {} already exists", report.user.email);
            }
            if let Some(project_id) = report.project_id {
                println!("Created sample project {}", project_id);
            }
        }
        Some(Command::Board(args)) => {
            let store = open_store(&config, &args.remote)?;
            let board = store.get_project(&args.project_id).await?;
            println!("{}", render_board(&board, args.format)?);
        }
        Some(Command::Projects(args)) => {
            let store = open_store(&config, &args.remote)?;
            let projects = store.list_projects().await?;
            println!("{}", render_projects(&projects, args.format)?);
        }
        Some(Command::Move(args)) => {
            let store = open_store(&config, &args.remote)?;
            let batch = move_task(store.as_ref(), &args.task_id, &args.column, args.index).await?;
            for placement in batch {
                println!(
                    "{} -> {} @ {}",
                    placement.id, placement.container_id, placement.position
                );
            }
        }
    }

    Ok(())
}

fn open_database(config: &Config) -> Result<Database> {
    let db = Database::open(&config.server.db_path)?
        .with_uploads(UploadDir::new(&config.server.uploads_dir))
        .with_density_policy(config.positions.density)
        .with_session_ttl_hours(config.auth.session_ttl_hours);
    Ok(db)
}

fn open_memory_store(config: &Config) -> Result<MemoryStore> {
    let store = match &config.storage.snapshot_path {
        Some(path) => MemoryStore::open_snapshot(path)?,
        None => MemoryStore::demo(),
    };
    Ok(store
        .with_density_policy(config.positions.density)
        .with_session_ttl_hours(config.auth.session_ttl_hours))
}

/// The store a CLI command works against: the remote tracker when
/// `--remote` is given, otherwise the configured local backend.
fn open_store(config: &Config, remote: &RemoteArgs) -> Result<Arc<dyn BoardStore>> {
    if let Some(url) = &remote.remote {
        let mut store = RemoteStore::new(url);
        if let Some(token) = &remote.token {
            store = store.with_token(token);
        }
        return Ok(Arc::new(store));
    }

    match config.storage.backend {
        StorageBackend::Sqlite => Ok(Arc::new(open_database(config)?)),
        StorageBackend::Memory => {
            if config.storage.snapshot_path.is_none() {
                warn!("Memory backend without a snapshot path; changes will not persist");
            }
            Ok(Arc::new(open_memory_store(config)?))
        }
    }
}

/// Run the REST API server until Ctrl-C.
async fn run_server(config: Config) -> Result<()> {
    info!("Starting Kanban Tracker v{}", env!("CARGO_PKG_VERSION"));
    info!("Storage backend: {}", config.storage.backend.as_str());
    info!("Position density: {:?}", config.positions.density);

    let state = match config.storage.backend {
        StorageBackend::Sqlite => {
            info!("Database: {:?}", config.server.db_path);
            info!("Uploads dir: {:?}", config.server.uploads_dir);
            std::fs::create_dir_all(&config.server.uploads_dir)?;
            ApiServer::new(Arc::new(open_database(&config)?))
        }
        StorageBackend::Memory => {
            if let Some(path) = &config.storage.snapshot_path {
                info!("Snapshot: {:?}", path);
            }
            info!("Demo mode: unauthenticated requests act as the demo user");
            ApiServer::new(Arc::new(open_memory_store(&config)?)).with_fallback_user(demo_user())
        }
    };
    let state = state.with_max_upload_bytes(config.server.max_upload_bytes);

    let handle = start_server(state, &config.server.host, config.server.port).await?;
    info!("Listening on {}", handle.url());

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    handle.shutdown().await;

    Ok(())
}
