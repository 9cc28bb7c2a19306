//! Database layer for the kanban tracker.

pub mod attachments;
pub mod checklists;
pub mod comments;
pub mod projects;
mod store;
pub mod tasks;
pub mod time_entries;
pub mod users;

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Row, params};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::position::DensityPolicy;
use crate::uploads::UploadDir;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Default session lifetime for logins against this database.
pub const DEFAULT_SESSION_TTL_HOURS: u64 = 720;

/// Database handle wrapping a SQLite connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    uploads: Option<UploadDir>,
    density: DensityPolicy,
    session_ttl_hours: u64,
}

impl Database {
    /// Open or create the database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for concurrent access
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;",
        )?;

        Self::from_connection(conn)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
            uploads: None,
            density: DensityPolicy::default(),
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
        };

        db.run_migrations()?;

        Ok(db)
    }

    /// Store attachment files under `uploads`.
    pub fn with_uploads(mut self, uploads: UploadDir) -> Self {
        self.uploads = Some(uploads);
        self
    }

    pub fn with_density_policy(mut self, density: DensityPolicy) -> Self {
        self.density = density;
        self
    }

    pub fn with_session_ttl_hours(mut self, hours: u64) -> Self {
        self.session_ttl_hours = hours;
        self
    }

    pub fn density_policy(&self) -> DensityPolicy {
        self.density
    }

    /// Run database migrations.
    fn run_migrations(&self) -> Result<()> {
        self.with_conn_mut(|conn| {
            embedded::migrations::runner().run(conn)?;
            Ok(())
        })
    }

    /// Execute a function with exclusive access to the connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow!("database connection lock poisoned"))?;
        f(&conn)
    }

    /// Execute a function with mutable access to the connection (for transactions).
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| anyhow!("database connection lock poisoned"))?;
        f(&mut conn)
    }

    pub(crate) fn uploads(&self) -> Option<&UploadDir> {
        self.uploads.as_ref()
    }
}

/// Get the current timestamp in milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Convert stored milliseconds back into a timestamp.
pub(crate) fn from_ms(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

pub(crate) fn to_ms(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

/// Generate a new row identifier.
pub(crate) fn new_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

/// Whether a row with `id` exists in `table`.
pub(crate) fn row_exists(conn: &Connection, table: &str, id: &str) -> Result<bool> {
    let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1)", table);
    Ok(conn.query_row(&sql, params![id], |row| row.get(0))?)
}

#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} {value:?}")]
struct UnknownValue {
    kind: &'static str,
    value: String,
}

/// Read a text column holding an enum name, failing on names `parse` rejects.
pub(crate) fn enum_column<T>(
    row: &Row,
    column: &str,
    kind: &'static str,
    parse: impl Fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    let value: String = row.get(column)?;
    parse(&value).ok_or_else(|| {
        let index = row.as_ref().column_index(column).unwrap_or_default();
        rusqlite::Error::FromSqlConversionFailure(
            index,
            Type::Text,
            Box::new(UnknownValue { kind, value }),
        )
    })
}
