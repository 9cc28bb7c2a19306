//! Router construction and server lifecycle.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    response::{IntoResponse, Json},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::{attachments, auth, checklists, comments, projects, tasks, time_entries, users};
use crate::store::BoardStore;
use crate::types::User;

/// Default upload limit (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Room for multipart framing on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// API server state shared across handlers.
#[derive(Clone)]
pub struct ApiServer {
    store: Arc<dyn BoardStore>,
    max_upload_bytes: usize,
    /// User that unauthenticated requests act as (demo mode only).
    fallback_user: Option<User>,
}

impl ApiServer {
    pub fn new(store: Arc<dyn BoardStore>) -> Self {
        Self {
            store,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            fallback_user: None,
        }
    }

    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    pub fn with_fallback_user(mut self, user: User) -> Self {
        self.fallback_user = Some(user);
        self
    }

    pub fn store(&self) -> &Arc<dyn BoardStore> {
        &self.store
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    pub fn fallback_user(&self) -> Option<&User> {
        self.fallback_user.as_ref()
    }
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Health check endpoint.
async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Body returned by deletes and other operations without a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Success {
    pub success: bool,
}

pub(super) fn success() -> Json<Success> {
    Json(Success { success: true })
}

/// Build the router with all routes.
pub fn build_router(state: ApiServer) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = state
        .max_upload_bytes()
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .route("/api/health", get(health))
        // Authentication
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/users", get(users::list_users))
        // Projects
        .route(
            "/api/projects",
            get(projects::list_projects).post(projects::create_project),
        )
        .route(
            "/api/projects/{id}",
            get(projects::get_project)
                .put(projects::update_project)
                .delete(projects::delete_project),
        )
        // Tasks
        .route(
            "/api/tasks",
            post(tasks::create_task).put(tasks::reorder_tasks),
        )
        .route(
            "/api/tasks/{id}",
            get(tasks::get_task)
                .put(tasks::update_task)
                .delete(tasks::delete_task),
        )
        // Checklists
        .route("/api/checklists", post(checklists::create_checklist))
        .route(
            "/api/checklists/{id}",
            put(checklists::rename_checklist).delete(checklists::delete_checklist),
        )
        .route(
            "/api/checklist-items",
            post(checklists::create_checklist_item),
        )
        .route(
            "/api/checklist-items/{id}",
            put(checklists::update_checklist_item)
                .delete(checklists::delete_checklist_item),
        )
        // Comments
        .route("/api/comments", post(comments::create_comment))
        .route(
            "/api/comments/{id}",
            put(comments::update_comment).delete(comments::delete_comment),
        )
        // Time tracking
        .route(
            "/api/time-entries",
            get(time_entries::list_time_entries).post(time_entries::create_time_entry),
        )
        .route(
            "/api/time-entries/{id}",
            put(time_entries::update_time_entry)
                .delete(time_entries::delete_time_entry),
        )
        // Attachments
        .route("/api/attachments", post(attachments::upload_attachment))
        .route(
            "/api/attachments/{id}",
            get(attachments::download_attachment).delete(attachments::delete_attachment),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handle for a running API server.
pub struct ServerHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    join: JoinHandle<()>,
    addr: SocketAddr,
}

impl ServerHandle {
    /// Address the server is bound to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL for clients, e.g. `http://127.0.0.1:3000`.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Signal shutdown and wait for in-flight requests to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = self.join.await;
    }
}

/// Bind `host:port` and serve the API in a background task.
///
/// Port 0 binds an ephemeral port; the actual address is available from the
/// returned handle.
pub async fn start_server(state: ApiServer, host: &str, port: u16) -> anyhow::Result<ServerHandle> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on http://{}", addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let join = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("API server shutting down");
            })
            .await
        {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(ServerHandle {
        shutdown_tx: Some(shutdown_tx),
        join,
        addr,
    })
}
